//! The orchestrator itself

use super::types::{RunState, RunSummary, WorkUnit};
use crate::error::{Error, Result};
use crate::pagination::Extractor;
use crate::pipeline::{PipelineDefinition, PipelineRegistry};
use crate::provider::{InsightsApi, PollConfig, ReportJobClient, ReportRequest};
use crate::sink::{SinkWriter, WriteHandle};
use crate::transform::Transformer;
use crate::types::JobId;
use futures::TryStreamExt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Composes job client, extractor, transformer and sink for one unit
pub struct RunOrchestrator {
    registry: PipelineRegistry,
    jobs: ReportJobClient,
    extractor: Extractor,
    transformer: Transformer,
    sink: SinkWriter,
}

/// Current state of one run, with transitions logged
struct Progress {
    state: RunState,
}

impl Progress {
    fn new() -> Self {
        Self {
            state: RunState::Idle,
        }
    }

    fn advance(&mut self, next: RunState) {
        if !self.state.can_transition_to(next) {
            warn!(from = %self.state, to = %next, "Unexpected run state transition");
        }
        info!(from = %self.state, to = %next, "Run state");
        self.state = next;
    }
}

impl RunOrchestrator {
    pub fn new(
        api: Arc<dyn InsightsApi>,
        registry: PipelineRegistry,
        poll: &PollConfig,
        sink: SinkWriter,
    ) -> Self {
        Self {
            registry,
            jobs: ReportJobClient::new(api.clone(), poll),
            extractor: Extractor::new(api),
            transformer: Transformer::new(),
            sink,
        }
    }

    /// Override the report poll interval
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.jobs = self.jobs.with_interval(interval);
        self
    }

    /// Run one unit to completion
    pub async fn run(&self, unit: &WorkUnit) -> Result<RunSummary> {
        let span = info_span!(
            "run",
            pipeline = %unit.pipeline,
            account_id = %unit.account_id,
            start = %unit.start,
            end = %unit.end,
        );

        async {
            let started = Instant::now();
            let mut progress = Progress::new();

            match self.execute(unit, &mut progress).await {
                Ok(summary) => {
                    progress.advance(RunState::Succeeded);
                    info!(
                        rows = summary.rows_written,
                        table = %summary.table,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Run succeeded"
                    );
                    Ok(summary)
                }
                Err(e) => {
                    let failed_in = progress.state;
                    progress.advance(RunState::Failed);
                    match &e {
                        Error::ReportFailed { report_id, payload } => error!(
                            state = %failed_in,
                            report_id = %report_id,
                            payload = %payload,
                            "Run failed: provider marked the report failed"
                        ),
                        _ => error!(
                            state = %failed_in,
                            kind = e.kind(),
                            transient = e.is_transient(),
                            error = %e,
                            "Run failed"
                        ),
                    }
                    Err(e)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn execute(&self, unit: &WorkUnit, progress: &mut Progress) -> Result<RunSummary> {
        let pipeline = self.registry.get(&unit.pipeline)?;
        let range = unit.range()?;

        progress.advance(RunState::RequestingReport);
        let request = ReportRequest::for_pipeline(&pipeline, &unit.account_id, range);
        let job_id = self.jobs.submit(&request).await?;

        progress.advance(RunState::Polling);
        let job_id = self.jobs.await_completion(&job_id).await?;

        progress.advance(RunState::ExtractingLoading);
        let table = pipeline.table_name(&unit.account_id);
        let mut handle = self.sink.open(&table, &pipeline.sink_schema()).await?;

        let loaded = self.load(&pipeline, job_id.clone(), &mut handle).await;
        let closed = handle.close().await;

        let rows_written = match (loaded, closed) {
            (Ok(()), Ok(rows)) => rows,
            (Ok(()), Err(e)) => return Err(e),
            (Err(e), Ok(rows)) => {
                warn!(table = %table, rows, "Rows before the failure were committed");
                return Err(e);
            }
            (Err(e), Err(close_err)) => {
                warn!(table = %table, error = %close_err, "Failed to finalize write after error");
                return Err(e);
            }
        };

        Ok(RunSummary {
            pipeline: pipeline.name.clone(),
            account_id: unit.account_id.clone(),
            job_id: job_id.to_string(),
            table,
            rows_written,
        })
    }

    /// Stream every record through the transformer into the handle
    async fn load(
        &self,
        pipeline: &PipelineDefinition,
        job_id: JobId,
        handle: &mut WriteHandle,
    ) -> Result<()> {
        let mut records = self.extractor.extract(job_id);
        while let Some(record) = records.try_next().await? {
            let enriched = self.transformer.transform(&record, pipeline)?;
            handle.write(&enriched).await?;
        }
        debug!(rows = handle.rows_written(), "Extraction finished");
        Ok(())
    }
}
