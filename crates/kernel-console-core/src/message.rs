//! Kernel message model.
//!
//! Every message the console consumes is decoded into a [`KernelMessage`]
//! whose content is a closed sum type, so the output dispatch table is an
//! exhaustive `match` rather than a comparison over type strings.

use std::fmt;

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value, json};
use thiserror::Error;
use uuid::Uuid;

use crate::media::MimeBundle;

/// Opaque token linking a request to its replies and broadcasts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Wrap an id issued by the transport.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh random id.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Borrow the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Channel a message travelled on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Request/reply pairs (`execute`, `is_complete`, `kernel_info`).
    Control,
    /// Unsolicited output, status and error messages.
    Broadcast,
    /// Synchronous input prompts issued by the kernel.
    Stdin,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Control => "control",
            Self::Broadcast => "broadcast",
            Self::Stdin => "stdin",
        };
        f.write_str(name)
    }
}

/// Execution state reported by `status` broadcasts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KernelStatus {
    Starting,
    Busy,
    Idle,
    Restarting,
    Terminating,
    Dead,
    #[serde(other)]
    Unknown,
}

impl KernelStatus {
    /// Parse a wire status string; unrecognized values map to `Unknown`.
    #[must_use]
    pub fn from_wire(state: &str) -> Self {
        match state {
            "starting" => Self::Starting,
            "busy" => Self::Busy,
            "idle" => Self::Idle,
            "restarting" => Self::Restarting,
            "terminating" => Self::Terminating,
            "dead" => Self::Dead,
            _ => Self::Unknown,
        }
    }
}

/// Output stream of a `stream` message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamName {
    Stdout,
    Stderr,
}

/// Completeness verdict for a candidate code fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompletenessStatus {
    Complete,
    Incomplete,
    Invalid,
    #[serde(other)]
    Unknown,
}

/// Status carried by a control-channel reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplyStatus {
    Ok,
    Error,
    Aborted,
    #[serde(other)]
    Unknown,
}

impl ReplyStatus {
    /// Whether the reply reports success.
    #[must_use]
    pub const fn is_ok(self) -> bool {
        matches!(self, Self::Ok)
    }
}

/// Identity reported by the kernel in its `kernel_info` reply.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KernelInfo {
    /// Kernel implementation name (e.g. `ipython`).
    pub implementation: String,
    /// Language the kernel executes, if reported.
    pub language: Option<String>,
    /// Free-form banner text.
    pub banner: String,
}

/// Decoded content of a kernel message.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageContent {
    /// Kernel execution state changed.
    Status { state: KernelStatus },
    /// Text written to stdout or stderr.
    Stream { name: StreamName, text: String },
    /// Value of the last expression (`result`).
    ExecuteResult {
        execution_count: Option<u32>,
        data: MimeBundle,
    },
    /// Explicitly displayed rich output (`display`).
    DisplayData { data: MimeBundle },
    /// Execution raised an error.
    Error {
        ename: String,
        evalue: String,
        traceback: Vec<String>,
    },
    /// Request to clear output, optionally deferred until the next write.
    ClearOutput { wait: bool },
    /// Kernel asks for a line of input.
    InputRequest { prompt: String, password: bool },
    /// Answer to a completeness query.
    IsCompleteReply {
        status: CompletenessStatus,
        indent: String,
    },
    /// Final reply to an execute request.
    ExecuteReply {
        status: ReplyStatus,
        execution_count: Option<u32>,
    },
    /// Answer to a `kernel_info` request.
    KernelInfoReply(KernelInfo),
    /// Any message kind the console does not act on.
    Other { msg_type: String },
}

/// Message decode error.
#[derive(Debug, Error)]
pub enum MessageError {
    #[error("Malformed {msg_type} content: {source}")]
    Malformed {
        msg_type: String,
        #[source]
        source: serde_json::Error,
    },
}

/// A message received from the kernel on one of the three channels.
#[derive(Debug, Clone, PartialEq)]
pub struct KernelMessage {
    /// Channel the message arrived on.
    pub channel: Channel,
    /// Correlation id of the request this message answers.
    pub parent: Option<CorrelationId>,
    /// Decoded content.
    pub content: MessageContent,
}

#[derive(Deserialize)]
struct StatusWire {
    execution_state: String,
}

#[derive(Deserialize)]
struct StreamWire {
    name: StreamName,
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct DataWire {
    #[serde(default)]
    data: Map<String, Value>,
    #[serde(default)]
    execution_count: Option<u32>,
}

#[derive(Deserialize)]
struct ErrorWire {
    #[serde(default)]
    ename: String,
    #[serde(default)]
    evalue: String,
    #[serde(default)]
    traceback: Vec<String>,
}

#[derive(Deserialize)]
struct ClearWire {
    #[serde(default)]
    wait: bool,
}

#[derive(Deserialize)]
struct InputRequestWire {
    #[serde(default)]
    prompt: String,
    #[serde(default)]
    password: bool,
}

#[derive(Deserialize)]
struct IsCompleteWire {
    status: CompletenessStatus,
    #[serde(default)]
    indent: String,
}

#[derive(Deserialize)]
struct ExecuteReplyWire {
    status: ReplyStatus,
    #[serde(default)]
    execution_count: Option<u32>,
}

#[derive(Deserialize)]
struct LanguageInfoWire {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Deserialize)]
struct KernelInfoWire {
    #[serde(default)]
    implementation: String,
    #[serde(default)]
    language_info: Option<LanguageInfoWire>,
    #[serde(default)]
    banner: String,
}

fn decode<T: DeserializeOwned>(msg_type: &str, content: Value) -> Result<T, MessageError> {
    serde_json::from_value(content).map_err(|source| MessageError::Malformed {
        msg_type: msg_type.to_string(),
        source,
    })
}

impl KernelMessage {
    /// Create a message.
    #[must_use]
    pub const fn new(
        channel: Channel,
        parent: Option<CorrelationId>,
        content: MessageContent,
    ) -> Self {
        Self {
            channel,
            parent,
            content,
        }
    }

    /// Whether this message belongs to the request identified by `id`.
    #[must_use]
    pub fn is_child_of(&self, id: &CorrelationId) -> bool {
        self.parent.as_ref() == Some(id)
    }

    /// Wire name of the message kind.
    #[must_use]
    pub fn msg_type(&self) -> &str {
        match &self.content {
            MessageContent::Status { .. } => "status",
            MessageContent::Stream { .. } => "stream",
            MessageContent::ExecuteResult { .. } => "execute_result",
            MessageContent::DisplayData { .. } => "display_data",
            MessageContent::Error { .. } => "error",
            MessageContent::ClearOutput { .. } => "clear_output",
            MessageContent::InputRequest { .. } => "input_request",
            MessageContent::IsCompleteReply { .. } => "is_complete_reply",
            MessageContent::ExecuteReply { .. } => "execute_reply",
            MessageContent::KernelInfoReply(_) => "kernel_info_reply",
            MessageContent::Other { msg_type } => msg_type,
        }
    }

    /// Decode a message from its wire type tag and JSON content.
    ///
    /// # Errors
    /// Returns error if the content does not match the shape of `msg_type`.
    pub fn from_wire(
        channel: Channel,
        msg_type: &str,
        parent: Option<CorrelationId>,
        content: Value,
    ) -> Result<Self, MessageError> {
        let content = match msg_type {
            "status" => {
                let wire: StatusWire = decode(msg_type, content)?;
                MessageContent::Status {
                    state: KernelStatus::from_wire(&wire.execution_state),
                }
            }
            "stream" => {
                let wire: StreamWire = decode(msg_type, content)?;
                MessageContent::Stream {
                    name: wire.name,
                    text: wire.text,
                }
            }
            "execute_result" => {
                let wire: DataWire = decode(msg_type, content)?;
                MessageContent::ExecuteResult {
                    execution_count: wire.execution_count,
                    data: MimeBundle::from_json(&wire.data),
                }
            }
            "display_data" | "update_display_data" => {
                let wire: DataWire = decode(msg_type, content)?;
                MessageContent::DisplayData {
                    data: MimeBundle::from_json(&wire.data),
                }
            }
            "error" => {
                let wire: ErrorWire = decode(msg_type, content)?;
                MessageContent::Error {
                    ename: wire.ename,
                    evalue: wire.evalue,
                    traceback: wire.traceback,
                }
            }
            "clear_output" => {
                let wire: ClearWire = decode(msg_type, content)?;
                MessageContent::ClearOutput { wait: wire.wait }
            }
            "input_request" => {
                let wire: InputRequestWire = decode(msg_type, content)?;
                MessageContent::InputRequest {
                    prompt: wire.prompt,
                    password: wire.password,
                }
            }
            "is_complete_reply" => {
                let wire: IsCompleteWire = decode(msg_type, content)?;
                MessageContent::IsCompleteReply {
                    status: wire.status,
                    indent: wire.indent,
                }
            }
            "execute_reply" => {
                let wire: ExecuteReplyWire = decode(msg_type, content)?;
                MessageContent::ExecuteReply {
                    status: wire.status,
                    execution_count: wire.execution_count,
                }
            }
            "kernel_info_reply" => {
                let wire: KernelInfoWire = decode(msg_type, content)?;
                MessageContent::KernelInfoReply(KernelInfo {
                    implementation: wire.implementation,
                    language: wire.language_info.and_then(|info| info.name),
                    banner: wire.banner,
                })
            }
            other => MessageContent::Other {
                msg_type: other.to_string(),
            },
        };

        Ok(Self::new(channel, parent, content))
    }
}

/// Request issued by the console to the kernel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KernelRequest {
    /// Execute a unit of code.
    Execute {
        code: String,
        silent: bool,
        store_history: bool,
        allow_stdin: bool,
    },
    /// Ask whether a fragment is a complete unit.
    IsComplete { code: String },
    /// Ask for the kernel identity.
    KernelInfo,
    /// Answer an `input_request`.
    InputReply { value: String },
    /// Interrupt the running execution.
    Interrupt,
    /// Shut the kernel down.
    Shutdown { restart: bool },
}

impl KernelRequest {
    /// Execute request with the interactive defaults.
    #[must_use]
    pub fn execute(code: impl Into<String>) -> Self {
        Self::Execute {
            code: code.into(),
            silent: false,
            store_history: true,
            allow_stdin: true,
        }
    }

    /// Wire message type of the request.
    #[must_use]
    pub const fn msg_type(&self) -> &'static str {
        match self {
            Self::Execute { .. } => "execute_request",
            Self::IsComplete { .. } => "is_complete_request",
            Self::KernelInfo => "kernel_info_request",
            Self::InputReply { .. } => "input_reply",
            Self::Interrupt => "interrupt_request",
            Self::Shutdown { .. } => "shutdown_request",
        }
    }

    /// Channel the request travels on.
    #[must_use]
    pub const fn channel(&self) -> Channel {
        match self {
            Self::InputReply { .. } => Channel::Stdin,
            _ => Channel::Control,
        }
    }

    /// Whether the request belongs on the out-of-band control socket rather
    /// than the request/reply socket.
    #[must_use]
    pub const fn is_out_of_band(&self) -> bool {
        matches!(self, Self::Interrupt | Self::Shutdown { .. })
    }

    /// JSON content of the request.
    #[must_use]
    pub fn content(&self) -> Value {
        match self {
            Self::Execute {
                code,
                silent,
                store_history,
                allow_stdin,
            } => json!({
                "code": code,
                "silent": silent,
                "store_history": store_history,
                "user_expressions": {},
                "allow_stdin": allow_stdin,
                "stop_on_error": true,
            }),
            Self::IsComplete { code } => json!({ "code": code }),
            Self::KernelInfo | Self::Interrupt => json!({}),
            Self::InputReply { value } => json!({ "value": value, "status": "ok" }),
            Self::Shutdown { restart } => json!({ "restart": restart }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_decoding() {
        let parent = Some(CorrelationId::new("abc"));
        let msg = KernelMessage::from_wire(
            Channel::Broadcast,
            "status",
            parent,
            json!({ "execution_state": "idle" }),
        )
        .unwrap();

        assert_eq!(
            msg.content,
            MessageContent::Status {
                state: KernelStatus::Idle
            }
        );
        assert!(msg.is_child_of(&CorrelationId::new("abc")));
        assert!(!msg.is_child_of(&CorrelationId::new("other")));
    }

    #[test]
    fn test_unknown_status_strings() {
        assert_eq!(KernelStatus::from_wire("starting"), KernelStatus::Starting);
        assert_eq!(KernelStatus::from_wire("weird"), KernelStatus::Unknown);
    }

    #[test]
    fn test_is_complete_reply_decoding() {
        let msg = KernelMessage::from_wire(
            Channel::Control,
            "is_complete_reply",
            None,
            json!({ "status": "incomplete", "indent": "    " }),
        )
        .unwrap();

        assert_eq!(
            msg.content,
            MessageContent::IsCompleteReply {
                status: CompletenessStatus::Incomplete,
                indent: "    ".to_string(),
            }
        );
    }

    #[test]
    fn test_is_complete_reply_without_indent() {
        let msg = KernelMessage::from_wire(
            Channel::Control,
            "is_complete_reply",
            None,
            json!({ "status": "something-new" }),
        )
        .unwrap();

        assert_eq!(
            msg.content,
            MessageContent::IsCompleteReply {
                status: CompletenessStatus::Unknown,
                indent: String::new(),
            }
        );
    }

    #[test]
    fn test_execute_reply_null_count() {
        let msg = KernelMessage::from_wire(
            Channel::Control,
            "execute_reply",
            None,
            json!({ "status": "error", "execution_count": null }),
        )
        .unwrap();

        assert_eq!(
            msg.content,
            MessageContent::ExecuteReply {
                status: ReplyStatus::Error,
                execution_count: None,
            }
        );
    }

    #[test]
    fn test_kernel_info_reply() {
        let msg = KernelMessage::from_wire(
            Channel::Control,
            "kernel_info_reply",
            None,
            json!({
                "implementation": "ipython",
                "language_info": { "name": "python", "version": "3.12" },
                "banner": "IPython 9",
            }),
        )
        .unwrap();

        let MessageContent::KernelInfoReply(info) = msg.content else {
            panic!("Wrong message type");
        };
        assert_eq!(info.implementation, "ipython");
        assert_eq!(info.language.as_deref(), Some("python"));
    }

    #[test]
    fn test_malformed_content_is_an_error() {
        let result = KernelMessage::from_wire(
            Channel::Broadcast,
            "stream",
            None,
            json!({ "name": 42 }),
        );
        assert!(matches!(result, Err(MessageError::Malformed { .. })));
    }

    #[test]
    fn test_unhandled_kinds_are_kept_as_other() {
        let msg = KernelMessage::from_wire(
            Channel::Broadcast,
            "execute_input",
            None,
            json!({ "code": "1+1" }),
        )
        .unwrap();
        assert_eq!(msg.msg_type(), "execute_input");
    }

    #[test]
    fn test_request_routing() {
        assert_eq!(KernelRequest::execute("x").channel(), Channel::Control);
        assert_eq!(
            KernelRequest::InputReply {
                value: "v".into()
            }
            .channel(),
            Channel::Stdin
        );
        assert!(KernelRequest::Interrupt.is_out_of_band());
        assert!(!KernelRequest::KernelInfo.is_out_of_band());
    }

    #[test]
    fn test_execute_request_content() {
        let content = KernelRequest::execute("1+1").content();
        assert_eq!(content["code"], "1+1");
        assert_eq!(content["allow_stdin"], true);
        assert_eq!(content["silent"], false);
    }
}
