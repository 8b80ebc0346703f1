use serde::{Deserialize, Serialize};

/// Ordering timestamp (ISO-8601, UTC) inside the record source.
pub const TIMESTAMP_FIELD: &str = "@timestamp";
/// Reviewer flag, stored on the record itself.
pub const TICKBOX_FIELD: &str = "tickbox";
/// Reviewer free-text remark, stored on the record itself.
pub const REMARK_FIELD: &str = "remark";

/// Placeholder for a record whose source carries no usable timestamp.
pub const UNKNOWN_TIMESTAMP: &str = "unknown";

/// A single document as returned by the search index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hit {
    pub id: String,
    /// Full document payload, annotations included when already stored.
    pub source: serde_json::Value,
}

impl Hit {
    pub fn new(id: impl Into<String>, source: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            source,
        }
    }
}

/// Search result: total number of matches plus the requested window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub total: u64,
    pub hits: Vec<Hit>,
}

/// Uniform record shape handed to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormattedRecord {
    pub id: String,
    pub timestamp: String,
    pub data: serde_json::Value,
    pub tickbox: bool,
    pub remark: String,
}

impl FormattedRecord {
    /// False for records surfaced with the `"unknown"` placeholder.
    pub fn has_timestamp(&self) -> bool {
        self.timestamp != UNKNOWN_TIMESTAMP
    }

    pub fn annotations(&self) -> Annotations {
        Annotations {
            tickbox: self.tickbox,
            remark: self.remark.clone(),
        }
    }
}

/// One page of formatted records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub total: u64,
    pub transactions: Vec<FormattedRecord>,
    /// This page advanced the stream watermark.
    pub new_data: bool,
}

/// The two mutable fields of a record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotations {
    pub tickbox: bool,
    pub remark: String,
}

/// A single-field annotation write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "field", content = "value", rename_all = "snake_case")]
pub enum Annotation {
    Tickbox(bool),
    Remark(String),
}

impl Annotation {
    /// Name of the stored field this write touches.
    pub fn field(&self) -> &'static str {
        match self {
            Annotation::Tickbox(_) => TICKBOX_FIELD,
            Annotation::Remark(_) => REMARK_FIELD,
        }
    }

    pub fn value(&self) -> serde_json::Value {
        match self {
            Annotation::Tickbox(v) => serde_json::Value::Bool(*v),
            Annotation::Remark(text) => serde_json::Value::String(text.clone()),
        }
    }

    /// Apply this write to an annotation pair, leaving the other field alone.
    pub fn apply(&self, target: &mut Annotations) {
        match self {
            Annotation::Tickbox(v) => target.tickbox = *v,
            Annotation::Remark(text) => target.remark = text.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_touches_one_field() {
        let mut a = Annotations {
            tickbox: true,
            remark: "kept".into(),
        };
        Annotation::Remark("reviewed".into()).apply(&mut a);
        assert!(a.tickbox);
        assert_eq!(a.remark, "reviewed");

        Annotation::Tickbox(false).apply(&mut a);
        assert!(!a.tickbox);
        assert_eq!(a.remark, "reviewed");
    }

    #[test]
    fn annotation_field_and_value() {
        let a = Annotation::Tickbox(true);
        assert_eq!(a.field(), "tickbox");
        assert_eq!(a.value(), serde_json::json!(true));

        let a = Annotation::Remark("ok".into());
        assert_eq!(a.field(), "remark");
        assert_eq!(a.value(), serde_json::json!("ok"));
    }
}
