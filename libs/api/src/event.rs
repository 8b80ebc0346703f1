use serde::{Deserialize, Serialize};

/// Live-update event pushed to every subscriber of a stream topic.
///
/// Serialized with a `type` tag, e.g.
/// `{"type":"transaction_updated","id":"abc123","field":"remark","value":"reviewed"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LiveEvent {
    /// Records newer than the stream watermark were observed.
    NewDataAvailable { stream: String },
    /// A single annotation field of a record was written.
    TransactionUpdated {
        id: String,
        field: String,
        value: serde_json::Value,
    },
}

impl LiveEvent {
    pub fn name(&self) -> &'static str {
        match self {
            LiveEvent::NewDataAvailable { .. } => "new_data_available",
            LiveEvent::TransactionUpdated { .. } => "transaction_updated",
        }
    }
}
