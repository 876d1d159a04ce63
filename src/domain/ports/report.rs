//! Port for the persistence/report sink.

use async_trait::async_trait;

use crate::domain::errors::EngineResult;
use crate::domain::models::report::FinalReport;

/// Consumes the frozen result bundle. Format and storage are the adapter's
/// concern; the engine's output artifact is the immutable report itself.
#[async_trait]
pub trait ReportSink: Send + Sync {
    async fn persist(&self, report: &FinalReport) -> EngineResult<()>;
}

/// Sink that discards the report. Useful in tests and dry runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullReportSink;

#[async_trait]
impl ReportSink for NullReportSink {
    async fn persist(&self, _report: &FinalReport) -> EngineResult<()> {
        Ok(())
    }
}
