use std::path::PathBuf;

use chrono::Utc;
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use fgswarm_core::types::SwarmEvent;

/// JSONL trace of one swarm run.
///
/// Consumes `SwarmEvent`s and writes one JSON object per line to
/// `{log_dir}/{run_id}/{timestamp}.jsonl`. Every line is flushed as it is
/// written, so a crashed run still leaves a readable prefix.
pub struct RunLogger {
    log_dir: PathBuf,
}

/// A single log entry written to the JSONL file.
#[derive(Serialize)]
struct LogEntry {
    timestamp: String,
    run_id: String,
    event_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    agent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<serde_json::Value>,
}

impl RunLogger {
    pub fn new(log_dir: PathBuf) -> Self {
        Self { log_dir }
    }

    /// Run the logger as a background task.
    ///
    /// `rx` must be subscribed before the run starts. The file is opened on
    /// `RunStarted` and closed after `RunComplete` or `RunError`. Returns the
    /// trace path, or `None` if nothing was written.
    pub async fn run(
        self,
        mut rx: broadcast::Receiver<SwarmEvent>,
        cancel: CancellationToken,
    ) -> Option<PathBuf> {
        let started = loop {
            tokio::select! {
                _ = cancel.cancelled() => return None,
                result = rx.recv() => match result {
                    Ok(event @ SwarmEvent::RunStarted { .. }) => break event,
                    Ok(_) => continue,
                    Err(RecvError::Lagged(n)) => debug!(skipped = n, "RunLogger lagged, skipped events"),
                    Err(RecvError::Closed) => return None,
                },
            }
        };
        let rid = match &started {
            SwarmEvent::RunStarted { run_id, .. } => run_id.0.clone(),
            _ => return None,
        };

        let run_dir = self.log_dir.join(&rid);
        if let Err(e) = tokio::fs::create_dir_all(&run_dir).await {
            error!(error = %e, "Failed to create log directory");
            return None;
        }

        let timestamp = Utc::now().format("%Y%m%d_%H%M%S").to_string();
        let log_path = run_dir.join(format!("{}.jsonl", timestamp));

        let file = match tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .await
        {
            Ok(f) => f,
            Err(e) => {
                error!(error = %e, path = %log_path.display(), "Failed to open log file");
                return None;
            }
        };

        info!(path = %log_path.display(), "RunLogger started");

        let mut writer = tokio::io::BufWriter::new(file);
        let mut next = Some(started);

        loop {
            let event = match next.take() {
                Some(event) => event,
                None => tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("RunLogger cancelled");
                        break;
                    }
                    result = rx.recv() => match result {
                        Ok(event) => event,
                        Err(RecvError::Lagged(n)) => {
                            debug!(skipped = n, "RunLogger lagged, skipped events");
                            continue;
                        }
                        Err(RecvError::Closed) => {
                            debug!("EventBus closed, RunLogger stopping");
                            break;
                        }
                    },
                },
            };

            if let Some(entry) = event_to_entry(&rid, &event) {
                if let Ok(json) = serde_json::to_string(&entry) {
                    let line = format!("{}\n", json);
                    if let Err(e) = writer.write_all(line.as_bytes()).await {
                        error!(error = %e, "Failed to write log entry");
                        break;
                    }
                    if let Err(e) = writer.flush().await {
                        error!(error = %e, "Failed to flush log");
                    }
                }
            }

            // Stop logging after run completes or errors
            if matches!(event, SwarmEvent::RunComplete { .. } | SwarmEvent::RunError { .. }) {
                break;
            }
        }

        writer.flush().await.ok();
        debug!(path = %log_path.display(), "RunLogger finished");
        Some(log_path)
    }
}

/// Convert a `SwarmEvent` to a log entry. Text deltas are not logged.
fn event_to_entry(run_id: &str, event: &SwarmEvent) -> Option<LogEntry> {
    let entry = |event_type, agent: Option<&String>, detail| LogEntry {
        timestamp: Utc::now().to_rfc3339(),
        run_id: run_id.to_string(),
        event_type,
        agent: agent.cloned(),
        detail,
    };

    match event {
        SwarmEvent::RunStarted { initial_agent, .. } => {
            Some(entry("run_started", Some(initial_agent), None))
        }
        SwarmEvent::AgentActivated { agent } => Some(entry("agent_activated", Some(agent), None)),
        SwarmEvent::OperationStart { agent, op } => Some(entry(
            "operation_start",
            Some(agent),
            Some(serde_json::json!({ "op": op })),
        )),
        SwarmEvent::OperationEnd {
            agent,
            op,
            status,
            is_error,
        } => Some(entry(
            "operation_end",
            Some(agent),
            Some(serde_json::json!({
                "op": op,
                "is_error": is_error,
                "status_preview": truncate_str(status, 200),
            })),
        )),
        SwarmEvent::AgentComplete { agent, turns } => Some(entry(
            "agent_complete",
            Some(agent),
            Some(serde_json::json!({ "turns": turns })),
        )),
        SwarmEvent::Handoff { from, to } => Some(entry(
            "handoff",
            Some(from),
            Some(serde_json::json!({ "to": to })),
        )),
        SwarmEvent::RunComplete {
            last_agent,
            total_turns,
            input_tokens,
            output_tokens,
            ..
        } => Some(entry(
            "run_complete",
            Some(last_agent),
            Some(serde_json::json!({
                "total_turns": total_turns,
                "input_tokens": input_tokens,
                "output_tokens": output_tokens,
            })),
        )),
        SwarmEvent::RunError { error, .. } => Some(entry(
            "run_error",
            None,
            Some(serde_json::json!({ "error": error })),
        )),
        SwarmEvent::TextDelta(_) => None,
    }
}

/// Truncate a string for logging, on a char boundary.
fn truncate_str(s: &str, max_len: usize) -> &str {
    if s.len() <= max_len {
        return s;
    }
    let mut end = max_len;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
