use std::collections::HashMap;
use std::sync::Mutex;

/// Последний увиденный timestamp записи, по каждому потоку.
///
/// Timestamps в UTC ISO-8601 фиксированной ширины, поэтому строковый
/// порядок совпадает с временным. Состояние только в памяти: после рестарта
/// первое наблюдение по любому потоку считается новыми данными.
#[derive(Debug, Default)]
pub struct WatermarkTracker {
    marks: Mutex<HashMap<String, String>>,
}

impl WatermarkTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `latest` for `stream`.
    ///
    /// true только если `latest` строго больше сохранённого watermark
    /// (или его ещё нет); тогда `latest` становится новым watermark.
    /// Сравнение и запись под одной блокировкой.
    pub fn observe(&self, stream: &str, latest: &str) -> bool {
        let mut marks = self.lock();
        match marks.get_mut(stream) {
            Some(current) if latest <= current.as_str() => false,
            Some(current) => {
                *current = latest.to_string();
                true
            }
            None => {
                marks.insert(stream.to_string(), latest.to_string());
                true
            }
        }
    }

    pub fn current(&self, stream: &str) -> Option<String> {
        self.lock().get(stream).cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        match self.marks.lock() {
            Ok(g) => g,
            Err(poisoned) => {
                tracing::warn!("watermark lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }
}
