use serde::{Deserialize, Serialize};

use crate::sideload::constants::MAX_META_LEN;

/// Declared properties of one transfer, immutable for its whole life.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferMetadata {
    pub name: String,
    pub size: u64,
    pub mime: String,
}

/// Wire form of the text frames a side-load channel may carry. Today that is
/// only the metadata announcement; the `type` tag is what lets a receiver
/// recognize it without guessing.
///
/// Wire example: `{"type":"meta","name":"tool.wasm","size":40000,"mime":"application/wasm"}`
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
enum ControlFrame {
    #[serde(rename = "meta")]
    Meta { name: String, size: u64, mime: String },
}

#[derive(Debug, PartialEq, Eq)]
pub enum MetadataError {
    /// The text frame exceeds [`MAX_META_LEN`].
    TooLarge { max: usize, actual: usize },
    /// Not valid JSON, or no recognized `type` marker.
    Malformed,
}

impl std::fmt::Display for MetadataError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetadataError::TooLarge { max, actual } => {
                write!(f, "metadata frame too large: {actual} bytes (max {max})")
            }
            MetadataError::Malformed => write!(f, "malformed metadata frame"),
        }
    }
}

/// Serializes the metadata announcement for the first frame of a channel.
pub fn encode_metadata(meta: &TransferMetadata) -> Result<String, MetadataError> {
    let frame = ControlFrame::Meta {
        name: meta.name.clone(),
        size: meta.size,
        mime: meta.mime.clone(),
    };
    serde_json::to_string(&frame).map_err(|_| MetadataError::Malformed)
}

/// Parses a text frame as a metadata announcement.
///
/// # Errors
/// [`MetadataError::TooLarge`] before any parsing if the frame is oversized,
/// [`MetadataError::Malformed`] when the JSON does not carry the `meta` type
/// marker or does not parse at all.
pub fn parse_metadata(text: &str) -> Result<TransferMetadata, MetadataError> {
    if text.len() > MAX_META_LEN {
        return Err(MetadataError::TooLarge {
            max: MAX_META_LEN,
            actual: text.len(),
        });
    }
    match serde_json::from_str::<ControlFrame>(text) {
        Ok(ControlFrame::Meta { name, size, mime }) => Ok(TransferMetadata { name, size, mime }),
        Err(_) => Err(MetadataError::Malformed),
    }
}
