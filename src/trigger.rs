//! Scheduled-trigger adapter
//!
//! Wraps one crawl session for a scheduler (for example a serverless cron
//! rule): logs the invocation, runs the session, and reports the outcome as
//! a structured response instead of an error.

use crate::config::Config;
use crate::crawler::run_session;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use std::path::Path;

/// Metadata about the invocation supplied by the scheduler runtime
#[derive(Debug, Clone)]
pub struct InvocationContext {
    pub request_id: String,
    pub function_name: String,
    pub memory_limit_mb: Option<u32>,
    pub invoked_at: DateTime<Utc>,
}

impl InvocationContext {
    /// Reads serverless runtime variables, falling back to local values
    pub fn from_env() -> Self {
        let invoked_at = Utc::now();
        Self {
            request_id: std::env::var("AWS_REQUEST_ID")
                .unwrap_or_else(|_| format!("local-{}", invoked_at.timestamp_millis())),
            function_name: std::env::var("AWS_LAMBDA_FUNCTION_NAME")
                .unwrap_or_else(|_| env!("CARGO_PKG_NAME").to_string()),
            memory_limit_mb: std::env::var("AWS_LAMBDA_FUNCTION_MEMORY_SIZE")
                .ok()
                .and_then(|v| v.parse().ok()),
            invoked_at,
        }
    }
}

/// The two possible outcomes of a scheduled run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerStatus {
    Success,
    Error,
}

impl TriggerStatus {
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Success => 200,
            Self::Error => 500,
        }
    }
}

/// Response handed back to the scheduler
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerResponse {
    pub status_code: u16,

    /// JSON-encoded body
    pub body: String,
}

impl TriggerResponse {
    fn new(status: TriggerStatus, body: Value) -> Self {
        Self {
            status_code: status.status_code(),
            body: body.to_string(),
        }
    }

    pub fn status(&self) -> TriggerStatus {
        if self.status_code == TriggerStatus::Success.status_code() {
            TriggerStatus::Success
        } else {
            TriggerStatus::Error
        }
    }
}

/// Runs one crawl session on behalf of a scheduler
///
/// Never fails: every error from the session becomes a 500 response.
pub async fn handle_scheduled(
    event: &Value,
    context: &InvocationContext,
    config: &Config,
) -> TriggerResponse {
    tracing::info!("Scheduled invocation with event: {}", event);
    tracing::info!(
        request_id = %context.request_id,
        function = %context.function_name,
        memory_limit_mb = ?context.memory_limit_mb,
        invoked_at = %context.invoked_at.to_rfc3339(),
        "Invocation metadata"
    );

    match run_session(config).await {
        Ok(summary) => {
            tracing::info!("Session collected {} new listings", summary.records.len());
            success_response(&summary.output_path, context)
        }
        Err(e) => {
            tracing::error!("Error running scraper: {}", e);
            TriggerResponse::new(
                TriggerStatus::Error,
                json!({
                    "message": "Error running scraper",
                    "error": e.to_string(),
                    "request_id": context.request_id,
                }),
            )
        }
    }
}

fn success_response(output_path: &Path, context: &InvocationContext) -> TriggerResponse {
    match std::fs::metadata(output_path) {
        Ok(meta) => {
            tracing::info!("Output file size: {} bytes", meta.len());
            TriggerResponse::new(
                TriggerStatus::Success,
                json!({
                    "message": "Scraper completed successfully",
                    "output_file": output_path.display().to_string(),
                    "file_size": meta.len(),
                    "request_id": context.request_id,
                }),
            )
        }
        Err(_) => {
            tracing::warn!("Output file {} not found", output_path.display());
            TriggerResponse::new(
                TriggerStatus::Success,
                json!({
                    "message": "Scraper completed but no output file found",
                    "request_id": context.request_id,
                }),
            )
        }
    }
}
