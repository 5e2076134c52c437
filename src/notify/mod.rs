// src/notify/mod.rs
pub mod message;
pub mod telegram;

pub use message::{compose_group_message, split_message, AlertBatch, TELEGRAM_MAX_LEN};
pub use telegram::TelegramNotifier;

/// Delivers a formatted message to the single configured destination.
/// Returns whether the final attempt succeeded; retries are internal.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, message: &str) -> bool;
}
