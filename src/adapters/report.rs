//! JSON file report sink.

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::info;

use crate::domain::errors::{EngineError, EngineResult};
use crate::domain::models::report::FinalReport;
use crate::domain::ports::ReportSink;

/// Writes the frozen report as pretty-printed JSON.
pub struct JsonFileReportSink {
    path: PathBuf,
}

impl JsonFileReportSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ReportSink for JsonFileReportSink {
    async fn persist(&self, report: &FinalReport) -> EngineResult<()> {
        let json = serde_json::to_vec_pretty(report)?;
        tokio::fs::write(&self.path, json)
            .await
            .map_err(|e| EngineError::adapter("report_sink", e.to_string()))?;
        info!(path = %self.path.display(), fingerprint = %report.fingerprint, "report persisted");
        Ok(())
    }
}
