use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use crate::LiveEvent;

/// Стратегия при переполнении канала подписчика.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// try_send(): событие для этого подписчика теряется, пишем warn.
    Drop,
    /// Ждать места в канале, но не дольше send timeout публикатора.
    #[serde(alias = "backpressure")]
    BackPressure,
}

/// Подписка на topic: асинхронный поток событий.
pub trait EventSubscription: Send {
    /// Следующее событие. None = публикатор закрыт.
    fn recv(&mut self) -> Pin<Box<dyn Future<Output = Option<LiveEvent>> + Send + '_>>;
}

/// Рассылка live-событий всем текущим подписчикам topic'а.
///
/// Доставка best-effort: без повторов и без хранения. Возвращает число
/// подписчиков, которым событие было передано.
pub trait EventPublisher: Send + Sync {
    fn publish(&self, topic: &str, event: LiveEvent)
        -> Pin<Box<dyn Future<Output = usize> + Send + '_>>;
}

/// Регистрация слушателей live-обновлений.
pub trait EventSubscriber: Send + Sync {
    /// Подписаться на `topic`.
    ///
    /// - `buffer`: размер буфера канала
    /// - `overflow`: стратегия при переполнении (Drop или BackPressure)
    fn subscribe(
        &self,
        topic: &str,
        buffer: usize,
        overflow: OverflowPolicy,
    ) -> Pin<Box<dyn Future<Output = Box<dyn EventSubscription>> + Send + '_>>;
}
