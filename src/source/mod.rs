use crate::types::ChangeEvent;
use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;

pub mod lines;
pub use lines::JsonLinesSource;

#[async_trait]
pub trait EventSource {
    /// Start delivering change events.
    /// Events should be sent to the provided channel in the order they occur.
    async fn run(&self, event_tx: mpsc::Sender<ChangeEvent>) -> Result<()>;
}
