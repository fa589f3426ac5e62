//! Translation loop between an event source and the record output.

use log::{debug, error, info, warn};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

use crate::processor::UpdateProcessor;
use crate::types::ChangeEvent;

/// Translate every received event and write the records as JSON lines.
///
/// Events the processor rejects are logged and skipped. Field failures are
/// logged as well, but the records of that event are still written. Returns
/// the number of records written once the channel closes.
pub async fn run_pipeline<P, W>(
    processor: &P,
    mut event_rx: mpsc::Receiver<ChangeEvent>,
    mut out: W,
) -> anyhow::Result<usize>
where
    P: UpdateProcessor + ?Sized,
    W: AsyncWrite + Unpin,
{
    let mut written = 0;
    while let Some(event) = event_rx.recv().await {
        let translation = match processor.process(&event) {
            Ok(t) => t,
            Err(e) => {
                error!(
                    "Dropping event for {} {}: {}",
                    event.key.kind, event.key.name, e
                );
                continue;
            }
        };
        if let Some(e) = translation.error() {
            warn!("Partial update for node {}: {}", event.key.name, e);
        }

        for record in &translation.records {
            let mut line = serde_json::to_vec(record)?;
            line.push(b'\n');
            out.write_all(&line).await?;
        }
        out.flush().await?;
        debug!(
            "Wrote {} records for revision {}",
            translation.records.len(),
            event.revision
        );
        written += translation.records.len();
    }
    info!("Event channel closed, shutting down");
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::NodeUpdateProcessor;
    use crate::types::{NodeDescriptor, ResourceKey};

    #[tokio::test]
    async fn test_pipeline_writes_json_lines() {
        let processor = NodeUpdateProcessor::default();
        let (tx, rx) = mpsc::channel(4);

        let mut node = NodeDescriptor::new("node1");
        node.status.pod_cidrs = vec!["10.244.0.0/24".into()];
        tx.send(ChangeEvent::node_update(node, "1")).await.unwrap();

        let mut bad = ChangeEvent::node_delete("x", "2");
        bad.key = ResourceKey::new("Profile", "x");
        tx.send(bad).await.unwrap();
        drop(tx);

        let mut out = Vec::new();
        let written = run_pipeline(&processor, rx, &mut out).await.unwrap();
        assert_eq!(written, 9);

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<serde_json::Value> = text
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 9);
        assert_eq!(lines[0]["key"]["type"], "host_ip");
        assert_eq!(lines[8]["key"]["type"], "block");
        assert_eq!(lines[8]["value"]["affinity"], "host:node1");
        assert!(lines.iter().all(|l| l["revision"] == "1"));
    }
}
