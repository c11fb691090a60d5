//! Append-only audit log.
//!
//! One pipe-delimited line per terminal operation outcome, plus one per
//! cleanup failure. Audit writes themselves must never fail an operation.

use std::path::PathBuf;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditOutcome {
    Success,
    Fail,
}

impl AuditOutcome {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::Fail => "FAIL",
        }
    }
}

#[derive(Debug, Clone)]
pub struct AuditLog {
    enabled: bool,
    path: PathBuf,
}

impl AuditLog {
    pub fn new(enabled: bool, path: PathBuf) -> Self {
        Self { enabled, path }
    }

    /// Append `OPERATION|args…|SUCCESS/FAIL|detail`. Failures to write are
    /// logged and swallowed.
    pub async fn record(
        &self,
        operation: &str,
        args: &[&str],
        outcome: AuditOutcome,
        detail: &str,
    ) {
        if !self.enabled {
            return;
        }
        let mut line = String::from(operation);
        for arg in args {
            line.push('|');
            line.push_str(&sanitize(arg));
        }
        line.push('|');
        line.push_str(outcome.as_str());
        line.push('|');
        line.push_str(&sanitize(detail));
        line.push('\n');

        if let Err(e) = self.append(&line).await {
            warn!("Failed to write audit line: {e}");
        }
    }

    async fn append(&self, line: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await
    }
}

fn sanitize(field: &str) -> String {
    field.replace('|', "/").replace('\n', " ")
}
