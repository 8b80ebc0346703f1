use std::future::Future;
use std::pin::Pin;

use crate::{Annotation, FormattedRecord, SearchQuery, SearchResponse, StoreError};

/// Внешнее хранилище записей, один "index" на поток.
///
/// Единственный источник содержимого записей. Для index-backed
/// AnnotationStore это же и единственное хранилище аннотаций.
/// Реализации: memory index, Elasticsearch.
pub trait SearchIndex: Send + Sync {
    /// Выполнить запрос к `index`.
    fn search(
        &self,
        index: &str,
        query: &SearchQuery,
    ) -> Pin<Box<dyn Future<Output = Result<SearchResponse, StoreError>> + Send + '_>>;

    /// Whether `index` exists.
    fn exists(
        &self,
        index: &str,
    ) -> Pin<Box<dyn Future<Output = Result<bool, StoreError>> + Send + '_>>;

    /// Есть ли документ `id` в `index`. Нет индекса = `false`.
    fn contains(
        &self,
        index: &str,
        id: &str,
    ) -> Pin<Box<dyn Future<Output = Result<bool, StoreError>> + Send + '_>>;

    /// Имена всех видимых индексов.
    fn indices(&self) -> Pin<Box<dyn Future<Output = Result<Vec<String>, StoreError>> + Send + '_>>;

    /// Частичное обновление ровно одного поля документа `id`.
    fn update_field(
        &self,
        index: &str,
        id: &str,
        field: &str,
        value: serde_json::Value,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>>;
}

/// Хранение двух изменяемых полей записи.
///
/// Поля пишутся независимо: запись tickbox не трогает remark и наоборот.
/// Внутри одного поля побеждает последний писатель.
pub trait AnnotationStore: Send + Sync {
    /// Persist one annotation field of record `id` in `index`.
    fn write(
        &self,
        index: &str,
        id: &str,
        annotation: &Annotation,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>>;

    /// Наложить сохранённые аннотации на только что отформатированные записи.
    fn overlay(
        &self,
        index: &str,
        records: Vec<FormattedRecord>,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<FormattedRecord>, StoreError>> + Send + '_>>;
}
