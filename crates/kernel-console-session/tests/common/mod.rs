//! Stub kernel and engine fixtures shared by the scenario tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use kernel_console_core::{
    CompletenessStatus, CorrelationId, InterruptFlag, KernelInfo, KernelRequest, KernelStatus,
    MediaPayload, MessageContent, MimeBundle, ReplyStatus, StreamName,
};
use kernel_console_session::testing::{RecordingMedia, RecordingOutput};
use kernel_console_session::{EngineConfig, ExecutionEngine, OutputRenderer};
use kernel_console_transport::memory::{self, KernelSide, MemoryClient};

pub const PNG_BASE64: &str = "iVBORw0KGgo=";

/// Requests the stub kernel has seen, in arrival order.
#[derive(Clone, Default)]
pub struct RequestLog(Arc<Mutex<Vec<KernelRequest>>>);

impl RequestLog {
    pub fn all(&self) -> Vec<KernelRequest> {
        self.0.lock().unwrap().clone()
    }

    pub fn executed(&self) -> Vec<String> {
        self.all()
            .into_iter()
            .filter_map(|request| match request {
                KernelRequest::Execute { code, .. } => Some(code),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, predicate: impl Fn(&KernelRequest) -> bool) -> usize {
        self.all().iter().filter(|request| predicate(request)).count()
    }

    fn push(&self, request: KernelRequest) {
        self.0.lock().unwrap().push(request);
    }

    /// Wait until the kernel has seen a matching request.
    pub async fn wait_for(&self, predicate: impl Fn(&KernelRequest) -> bool) -> bool {
        for _ in 0..100 {
            if self.count(&predicate) > 0 {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }
}

pub struct Fixture {
    pub engine: ExecutionEngine<MemoryClient>,
    pub output: RecordingOutput,
    pub media: RecordingMedia,
    pub interrupt: InterruptFlag,
    pub requests: RequestLog,
}

/// Engine connected to a scripted stub kernel.
pub fn fixture() -> Fixture {
    let (client, channels, kernel) = memory::pair();
    let requests = RequestLog::default();
    tokio::spawn(run_stub_kernel(kernel, requests.clone()));
    fixture_with(client, channels, requests)
}

/// Engine connected to a kernel that never answers anything.
pub fn silent_fixture() -> (Fixture, KernelSide) {
    let (client, channels, kernel) = memory::pair();
    (fixture_with(client, channels, RequestLog::default()), kernel)
}

fn fixture_with(
    client: MemoryClient,
    channels: kernel_console_transport::ChannelSet,
    requests: RequestLog,
) -> Fixture {
    let output = RecordingOutput::default();
    let media = RecordingMedia::default();
    let interrupt = InterruptFlag::new();
    let renderer = OutputRenderer::new(output.clone(), media.clone());
    let engine = ExecutionEngine::new(
        client,
        channels,
        renderer,
        interrupt.clone(),
        EngineConfig::default(),
    );

    Fixture {
        engine,
        output,
        media,
        interrupt,
        requests,
    }
}

fn stream(name: StreamName, text: &str) -> MessageContent {
    MessageContent::Stream {
        name,
        text: text.to_string(),
    }
}

fn reply(status: ReplyStatus, count: u32) -> MessageContent {
    MessageContent::ExecuteReply {
        status,
        execution_count: Some(count),
    }
}

/// A kernel that understands a handful of fixed programs.
async fn run_stub_kernel(mut kernel: KernelSide, log: RequestLog) {
    let mut count = 0;

    while let Some((id, request)) = kernel.next_request().await {
        log.push(request.clone());

        match request {
            KernelRequest::KernelInfo => kernel.reply(
                &id,
                MessageContent::KernelInfoReply(KernelInfo {
                    implementation: "stub".into(),
                    language: Some("python".into()),
                    banner: "Stub kernel".into(),
                }),
            ),
            KernelRequest::IsComplete { code } => {
                let incomplete = code
                    .lines()
                    .last()
                    .is_some_and(|line| line.trim_end().ends_with(':'));
                let (status, indent) = if incomplete {
                    (CompletenessStatus::Incomplete, "    ")
                } else {
                    (CompletenessStatus::Complete, "")
                };
                kernel.reply(
                    &id,
                    MessageContent::IsCompleteReply {
                        status,
                        indent: indent.into(),
                    },
                );
            }
            KernelRequest::Execute { code, .. } => {
                count += 1;
                kernel.status(&id, KernelStatus::Busy);
                let status = execute(&mut kernel, &log, &id, &code).await;
                if code == "die" {
                    continue;
                }
                kernel.status(&id, KernelStatus::Idle);
                kernel.reply(&id, reply(status, count));
            }
            KernelRequest::Shutdown { .. } => {
                kernel.status(&id, KernelStatus::Dead);
            }
            KernelRequest::InputReply { .. } | KernelRequest::Interrupt => {}
        }
    }
}

async fn execute(
    kernel: &mut KernelSide,
    log: &RequestLog,
    id: &CorrelationId,
    code: &str,
) -> ReplyStatus {
    match code {
        "1+1" => {
            let data = MimeBundle::new().with("text/plain", MediaPayload::Text("2".into()));
            kernel.publish(
                id,
                MessageContent::ExecuteResult {
                    execution_count: Some(1),
                    data,
                },
            );
            ReplyStatus::Ok
        }
        "print('a')" => {
            kernel.publish(id, stream(StreamName::Stdout, "a\n"));
            ReplyStatus::Ok
        }
        "plot()" => {
            let data = MimeBundle::new()
                .with("text/plain", MediaPayload::Text("<Figure>".into()))
                .with(
                    "image/png",
                    MediaPayload::Chunks(vec![
                        MediaPayload::Text(PNG_BASE64[..4].into()),
                        MediaPayload::Text(PNG_BASE64[4..].into()),
                    ]),
                );
            kernel.publish(id, MessageContent::DisplayData { data });
            ReplyStatus::Ok
        }
        "1/0" => {
            kernel.publish(
                id,
                MessageContent::Error {
                    ename: "ZeroDivisionError".into(),
                    evalue: "division by zero".into(),
                    traceback: vec![
                        "Traceback (most recent call last):".into(),
                        "ZeroDivisionError: division by zero".into(),
                    ],
                },
            );
            ReplyStatus::Error
        }
        "noisy" => {
            let stranger = CorrelationId::new("another-client");
            kernel.publish(&stranger, stream(StreamName::Stdout, "not mine\n"));
            kernel.status(&stranger, KernelStatus::Idle);
            kernel.publish(id, stream(StreamName::Stdout, "mine\n"));
            ReplyStatus::Ok
        }
        "name = input('Name: ')" | "input twice" => {
            kernel.request_input(id, "Name: ", false);
            if code == "input twice" {
                kernel.request_input(id, "Again: ", false);
            }
            loop {
                let Some((_, request)) = kernel.next_request().await else {
                    return ReplyStatus::Error;
                };
                log.push(request.clone());
                if let KernelRequest::InputReply { value } = request {
                    kernel.publish(id, stream(StreamName::Stdout, &format!("Hello {value}\n")));
                    return ReplyStatus::Ok;
                }
            }
        }
        "while True: pass" => loop {
            let Some((_, request)) = kernel.next_request().await else {
                return ReplyStatus::Error;
            };
            log.push(request.clone());
            if request == KernelRequest::Interrupt {
                kernel.publish(
                    id,
                    MessageContent::Error {
                        ename: "KeyboardInterrupt".into(),
                        evalue: String::new(),
                        traceback: vec!["KeyboardInterrupt".into()],
                    },
                );
                return ReplyStatus::Error;
            }
        },
        "die" => {
            kernel.kill();
            ReplyStatus::Error
        }
        _ => ReplyStatus::Ok,
    }
}
