//! Rich-media payloads carried by `result` and `display` messages.
//!
//! A mime payload may arrive as one text blob, one binary blob, or a
//! sequence of chunks of either kind. [`MediaPayload::normalize`] collapses
//! all shapes into one logical payload before anything is rendered.

use std::collections::BTreeMap;

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use bytes::{Bytes, BytesMut};
use serde_json::{Map, Value};

/// Plain-text mime type.
pub const TEXT_PLAIN: &str = "text/plain";

/// Raw payload as received for a single mime type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaPayload {
    /// A single text blob.
    Text(String),
    /// A single binary blob.
    Binary(Bytes),
    /// A sequence of chunks.
    Chunks(Vec<MediaPayload>),
}

/// A normalized payload: exactly one text or binary blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaData {
    Text(String),
    Binary(Bytes),
}

impl MediaData {
    /// Raw bytes of the payload.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Text(text) => text.as_bytes(),
            Self::Binary(bytes) => bytes,
        }
    }

    /// Payload size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    /// Whether the payload is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.as_bytes().is_empty()
    }

    fn into_text(self) -> Option<String> {
        match self {
            Self::Text(text) => Some(text),
            Self::Binary(bytes) => String::from_utf8(bytes.to_vec()).ok(),
        }
    }
}

impl MediaPayload {
    /// Build a payload from a JSON mime-bundle value.
    ///
    /// Strings become text, arrays become chunk sequences, anything else
    /// (e.g. an `application/json` object) is kept as its JSON text.
    #[must_use]
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::String(text) => Self::Text(text.clone()),
            Value::Array(items) => Self::Chunks(items.iter().map(Self::from_json).collect()),
            other => Self::Text(other.to_string()),
        }
    }

    /// Collapse the payload into one logical blob.
    ///
    /// Chunks of a single kind are concatenated; a mixed sequence falls back
    /// to its first chunk. Empty payloads normalize to `None`.
    #[must_use]
    pub fn normalize(&self) -> Option<MediaData> {
        let data = match self {
            Self::Text(text) => MediaData::Text(text.clone()),
            Self::Binary(bytes) => MediaData::Binary(bytes.clone()),
            Self::Chunks(chunks) => {
                let first = chunks.first()?;
                if chunks.iter().all(|c| matches!(c, Self::Text(_))) {
                    let text: String = chunks
                        .iter()
                        .filter_map(|c| match c {
                            Self::Text(t) => Some(t.as_str()),
                            _ => None,
                        })
                        .collect();
                    MediaData::Text(text)
                } else if chunks.iter().all(|c| matches!(c, Self::Binary(_))) {
                    let mut joined = BytesMut::new();
                    for chunk in chunks {
                        if let Self::Binary(b) = chunk {
                            joined.extend_from_slice(b);
                        }
                    }
                    MediaData::Binary(joined.freeze())
                } else {
                    return first.normalize();
                }
            }
        };

        (!data.is_empty()).then_some(data)
    }
}

/// Rich-media kinds the console can hand to an external renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MimeKind {
    Png,
    Jpeg,
    Svg,
}

impl MimeKind {
    /// Kinds in preference order.
    pub const PRIORITY: [Self; 3] = [Self::Png, Self::Jpeg, Self::Svg];

    /// Mime type string.
    #[must_use]
    pub const fn mime(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Svg => "image/svg+xml",
        }
    }

    /// File extension used for temp files.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpeg",
            Self::Svg => "svg",
        }
    }

    /// Look up a kind by mime type.
    #[must_use]
    pub fn from_mime(mime: &str) -> Option<Self> {
        Self::PRIORITY.into_iter().find(|kind| kind.mime() == mime)
    }

    /// Whether the payload of this kind travels base64 encoded.
    #[must_use]
    pub const fn is_base64(self) -> bool {
        matches!(self, Self::Png | Self::Jpeg)
    }
}

/// A media item ready for the external renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderableMedia {
    /// Kind of media.
    pub kind: MimeKind,
    /// Decoded payload: raw image bytes, or text for vector formats.
    pub data: MediaData,
}

impl RenderableMedia {
    /// Decode a normalized payload for `kind`.
    ///
    /// Raster formats are base64 decoded; a binary blob that is not base64
    /// text is taken as raw image bytes. Returns `None` for undecodable data.
    #[must_use]
    pub fn decode(kind: MimeKind, data: MediaData) -> Option<Self> {
        let data = if kind.is_base64() {
            match data {
                MediaData::Text(text) => MediaData::Binary(decode_base64(&text)?),
                MediaData::Binary(bytes) => {
                    let decoded = std::str::from_utf8(&bytes).ok().and_then(decode_base64);
                    MediaData::Binary(decoded.unwrap_or(bytes))
                }
            }
        } else {
            MediaData::Text(data.into_text()?)
        };

        (!data.is_empty()).then_some(Self { kind, data })
    }
}

fn decode_base64(text: &str) -> Option<Bytes> {
    let compact: String = text.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    BASE64.decode(compact).ok().map(Bytes::from)
}

/// Mime bundle of a `result` or `display` message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MimeBundle {
    entries: BTreeMap<String, MediaPayload>,
}

impl MimeBundle {
    /// Create an empty bundle.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a bundle from the `data` object of a message.
    #[must_use]
    pub fn from_json(data: &Map<String, Value>) -> Self {
        Self {
            entries: data
                .iter()
                .map(|(mime, value)| (mime.clone(), MediaPayload::from_json(value)))
                .collect(),
        }
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, mime: impl Into<String>, payload: MediaPayload) -> Self {
        self.insert(mime, payload);
        self
    }

    /// Insert a payload for a mime type.
    pub fn insert(&mut self, mime: impl Into<String>, payload: MediaPayload) {
        self.entries.insert(mime.into(), payload);
    }

    /// Payload for a mime type.
    #[must_use]
    pub fn get(&self, mime: &str) -> Option<&MediaPayload> {
        self.entries.get(mime)
    }

    /// Whether the bundle has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Highest-priority media kind present in the bundle.
    #[must_use]
    pub fn media_kind(&self) -> Option<MimeKind> {
        MimeKind::PRIORITY
            .into_iter()
            .find(|kind| self.entries.contains_key(kind.mime()))
    }

    /// Extract the highest-priority media item.
    ///
    /// Returns `None` when no media kind is present or its payload is
    /// malformed; callers fall back to [`MimeBundle::plain_text`].
    #[must_use]
    pub fn renderable(&self) -> Option<RenderableMedia> {
        let kind = self.media_kind()?;
        let media = self
            .get(kind.mime())
            .and_then(MediaPayload::normalize)
            .and_then(|data| RenderableMedia::decode(kind, data));

        if media.is_none() {
            tracing::debug!(mime = kind.mime(), "Dropping undecodable media payload");
        }
        media
    }

    /// Normalized `text/plain` representation, if any.
    #[must_use]
    pub fn plain_text(&self) -> Option<String> {
        self.get(TEXT_PLAIN)?.normalize()?.into_text()
    }
}
