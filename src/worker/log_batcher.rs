//! Stdout/stderr capture into batched log shipments (§4.6, §9).
//!
//! Implemented as a per-task structured logger funneling into a bounded
//! channel rather than redirecting process-wide stdout, which would not
//! compose with concurrent execution; the global process stdio is never
//! touched.
//!
//! A background task ships a batch whenever it reaches ≥10 lines or ≥1s
//! has elapsed since the last flush, whichever comes first (§4.6); `flush`
//! forces an immediate drain on completion.

use std::time::Duration;

use chrono::Utc;
use tokio::sync::{mpsc, oneshot};
use tokio::time::interval;

use super::client::ControlPlaneClient;

const FLUSH_LINE_THRESHOLD: usize = 10;
const FLUSH_INTERVAL: Duration = Duration::from_secs(1);

enum Msg {
    Line(String),
    Flush(oneshot::Sender<()>),
}

#[derive(Clone)]
pub struct LogBatcher {
    tx: mpsc::UnboundedSender<Msg>,
}

impl LogBatcher {
    pub fn spawn(client: ControlPlaneClient, stage_run_id: String) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Msg>();
        tokio::spawn(async move {
            let mut buffer: Vec<(i64, chrono::DateTime<chrono::Utc>, String)> = Vec::new();
            let mut index = 0i64;
            let mut ticker = interval(FLUSH_INTERVAL);

            loop {
                tokio::select! {
                    msg = rx.recv() => {
                        match msg {
                            Some(Msg::Line(content)) => {
                                buffer.push((index, Utc::now(), content));
                                index += 1;
                                if buffer.len() >= FLUSH_LINE_THRESHOLD {
                                    flush(&client, &stage_run_id, &mut buffer).await;
                                }
                            }
                            Some(Msg::Flush(ack)) => {
                                flush(&client, &stage_run_id, &mut buffer).await;
                                let _ = ack.send(());
                            }
                            None => {
                                flush(&client, &stage_run_id, &mut buffer).await;
                                break;
                            }
                        }
                    }
                    _ = ticker.tick() => {
                        if !buffer.is_empty() {
                            flush(&client, &stage_run_id, &mut buffer).await;
                        }
                    }
                }
            }
        });
        Self { tx }
    }

    /// Buffer one log line. Never blocks or suspends the caller (§5).
    pub fn push(&self, line: String) {
        let _ = self.tx.send(Msg::Line(line));
    }

    /// Force an immediate flush and wait for it to land, draining whatever
    /// remains buffered (§4.6 "forced flush drains the queue").
    pub async fn flush(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.tx.send(Msg::Flush(ack_tx)).is_ok() {
            let _ = ack_rx.await;
        }
    }
}

async fn flush(client: &ControlPlaneClient, stage_run_id: &str, buffer: &mut Vec<(i64, chrono::DateTime<chrono::Utc>, String)>) {
    if buffer.is_empty() {
        return;
    }
    if let Err(e) = client.append_logs(stage_run_id, buffer).await {
        tracing::warn!(error = %e, stage_run_id, "failed to ship log batch, dropping");
    }
    buffer.clear();
}
