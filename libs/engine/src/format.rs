use txwatch_api::{
    Annotations, FormattedRecord, Hit, REMARK_FIELD, TICKBOX_FIELD, TIMESTAMP_FIELD,
    UNKNOWN_TIMESTAMP,
};

/// Normalize one raw hit.
///
/// Не падает: отсутствующий или не строковый timestamp становится
/// `"unknown"`, пустые поля аннотаций дают `false` / `""`.
pub fn format_hit(hit: &Hit) -> FormattedRecord {
    let source = &hit.source;
    let timestamp = source
        .get(TIMESTAMP_FIELD)
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .unwrap_or(UNKNOWN_TIMESTAMP)
        .to_string();

    FormattedRecord {
        id: hit.id.clone(),
        timestamp,
        data: source.clone(),
        tickbox: source
            .get(TICKBOX_FIELD)
            .and_then(|v| v.as_bool())
            .unwrap_or(false),
        remark: source
            .get(REMARK_FIELD)
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string(),
    }
}

pub fn format_hits(hits: &[Hit]) -> Vec<FormattedRecord> {
    hits.iter().map(format_hit).collect()
}

/// Overwrite the annotation fields of `record` with stored state.
///
/// Копия в `data` обновляется тоже, чтобы запись оставалась согласованной
/// при повторном прогоне через `format_hit`.
pub fn merge_annotations(record: &mut FormattedRecord, stored: &Annotations) {
    record.tickbox = stored.tickbox;
    record.remark = stored.remark.clone();
    if let Some(obj) = record.data.as_object_mut() {
        obj.insert(TICKBOX_FIELD.into(), serde_json::Value::Bool(stored.tickbox));
        obj.insert(REMARK_FIELD.into(), serde_json::Value::String(stored.remark.clone()));
    }
}

/// Newest valid timestamp in a page, ignoring `"unknown"` placeholders.
pub fn latest_timestamp(records: &[FormattedRecord]) -> Option<&str> {
    records
        .iter()
        .filter(|r| r.has_timestamp())
        .map(|r| r.timestamp.as_str())
        .max()
}
