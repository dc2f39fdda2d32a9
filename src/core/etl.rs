use crate::domain::model::LoadSummary;
use crate::domain::ports::Pipeline;
use crate::utils::error::{EtlError, Result};
use crate::utils::monitor::SystemMonitor;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Phase a run starts from; later phases read the previous phase's files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum ResumePoint {
    #[default]
    Extract,
    Enrich,
    Load,
}

impl fmt::Display for ResumePoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResumePoint::Extract => "extract",
            ResumePoint::Enrich => "enrich",
            ResumePoint::Load => "load",
        };
        f.write_str(name)
    }
}

/// Set once (e.g. on Ctrl-C); checked between phases.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct EtlEngine<P: Pipeline> {
    pipeline: P,
    monitor: SystemMonitor,
    cancel: CancelFlag,
}

impl<P: Pipeline> EtlEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self::new_with_monitoring(pipeline, false)
    }

    pub fn new_with_monitoring(pipeline: P, monitor_enabled: bool) -> Self {
        Self {
            pipeline,
            monitor: SystemMonitor::new(monitor_enabled),
            cancel: CancelFlag::new(),
        }
    }

    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn pipeline(&self) -> &P {
        &self.pipeline
    }

    pub async fn run(&self) -> Result<LoadSummary> {
        self.run_from(ResumePoint::Extract).await
    }

    pub async fn run_from(&self, from: ResumePoint) -> Result<LoadSummary> {
        tracing::info!("🚀 Starting ETL run from '{}'", from);
        self.monitor.log_stats("Start");

        let transformed = if from == ResumePoint::Load {
            self.pipeline.read_transformed().await?
        } else {
            let extracted = if from == ResumePoint::Extract {
                self.checkpoint("extract")?;
                let extracted = self.pipeline.extract().await?;
                tracing::info!(
                    "📥 Extracted {} results, {} conditions ({} competitions skipped)",
                    extracted.results.len(),
                    extracted.conditions.len(),
                    extracted.skipped.len()
                );
                self.monitor.log_stats("Extract");
                extracted
            } else {
                self.pipeline.read_extracted().await?
            };

            self.checkpoint("enrich")?;
            let transformed = self.pipeline.transform(extracted).await?;
            tracing::info!(
                "🔄 Transformed {} results, {} conditions",
                transformed.results.len(),
                transformed.conditions.len()
            );
            self.monitor.log_stats("Transform");
            transformed
        };

        self.checkpoint("load")?;
        let summary = self.pipeline.load(transformed).await?;
        tracing::info!(
            "💾 Loaded {} results and {} conditions into {}",
            summary.results_rows,
            summary.conditions_rows,
            summary.destination
        );
        for failure in &summary.failures {
            tracing::warn!("⚠️ {}", failure);
        }
        self.monitor.log_stats("Load");
        self.monitor.log_final_stats();

        Ok(summary)
    }

    fn checkpoint(&self, phase: &str) -> Result<()> {
        if self.cancel.is_cancelled() {
            tracing::warn!("🛑 Cancelled before '{}'", phase);
            return Err(EtlError::CancelledError {
                phase: phase.to_string(),
            });
        }
        Ok(())
    }
}
