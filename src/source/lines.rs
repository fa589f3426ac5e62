use super::EventSource;
use crate::types::ChangeEvent;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use log::{debug, info, warn};
use std::path::PathBuf;
use tokio::fs::File;
use tokio::io::{self, AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

/// Reads change events encoded as one JSON object per line.
pub struct JsonLinesSource {
    path: Option<PathBuf>,
}

impl JsonLinesSource {
    /// Read from `path`, or from stdin when `None`.
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }
}

#[async_trait]
impl EventSource for JsonLinesSource {
    async fn run(&self, event_tx: mpsc::Sender<ChangeEvent>) -> Result<()> {
        let count = match &self.path {
            Some(path) => {
                info!("Reading change events from {}", path.display());
                let file = File::open(path)
                    .await
                    .map_err(|e| anyhow!("Failed to open {}: {}", path.display(), e))?;
                read_events(BufReader::new(file), &event_tx).await?
            }
            None => {
                info!("Reading change events from stdin");
                read_events(BufReader::new(io::stdin()), &event_tx).await?
            }
        };
        info!("Event source finished after {} events", count);
        Ok(())
    }
}

/// Decode events line by line and forward them.
///
/// Blank lines are ignored and lines that fail to decode are logged and
/// skipped. Returns the number of events sent.
pub async fn read_events<R>(reader: R, event_tx: &mpsc::Sender<ChangeEvent>) -> Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut sent = 0;
    let mut line_no = 0;
    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let event: ChangeEvent = match serde_json::from_str(line) {
            Ok(event) => event,
            Err(e) => {
                warn!("Skipping line {}: invalid change event: {}", line_no, e);
                continue;
            }
        };
        debug!("Read event for {} {}", event.key.kind, event.key.name);

        if event_tx.send(event).await.is_err() {
            return Err(anyhow!("Channel closed"));
        }
        sent += 1;
    }
    Ok(sent)
}
