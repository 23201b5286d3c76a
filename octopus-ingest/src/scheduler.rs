//! Poll loop.
//!
//! Each cycle fetches the latest consumption pages for both meters
//! concurrently, then ingests electricity followed by gas. A failure for one
//! meter is logged and does not affect the other or the next cycle.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use futures::StreamExt;
use octopus_client::{
    domain::{MeasurementPoint, MeterKind, ReadingBatch},
    ConsumptionClient,
};
use time::OffsetDateTime;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::{
    config::AppConfig,
    pipeline::{ingest, IngestReport, PipelineError, Sink, Source},
    sources::OctopusConsumptionSource,
    transform::ConversionConstants,
};

/// Result of one poll cycle, per meter.
#[derive(Debug)]
pub struct CycleReport {
    pub electric: Result<IngestReport, PipelineError>,
    pub gas: Result<IngestReport, PipelineError>,
}

pub struct Poller<K> {
    cfg: AppConfig,
    client: Arc<ConsumptionClient>,
    sink: K,
}

fn build_client(cfg: &AppConfig) -> anyhow::Result<Arc<ConsumptionClient>> {
    let client = ConsumptionClient::new(
        cfg.octopus.base_url.clone(),
        cfg.octopus.api_key.clone(),
        Duration::from_secs(cfg.octopus.request_timeout_secs),
    )?;
    Ok(Arc::new(client))
}

async fn fetch_all(source: &OctopusConsumptionSource) -> Result<Vec<ReadingBatch>, PipelineError> {
    let mut stream = source.stream().await;
    let mut pages = Vec::new();
    while let Some(item) = stream.next().await {
        pages.push(item?.payload);
    }
    Ok(pages)
}

impl<K> Poller<K>
where
    K: Sink<MeasurementPoint>,
{
    pub fn new(cfg: AppConfig, sink: K) -> anyhow::Result<Self> {
        let client = build_client(&cfg)?;
        Ok(Self { cfg, client, sink })
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    /// Swap in a new configuration. Meter ids, credentials, rates and
    /// conversion constants apply from the next cycle; sink connection
    /// settings need a restart.
    pub fn reload(&mut self, cfg: AppConfig) -> anyhow::Result<()> {
        let client = build_client(&cfg)?;
        self.client = client;
        self.cfg = cfg;
        Ok(())
    }

    fn source(&self, kind: MeterKind) -> OctopusConsumptionSource {
        let meter = match kind {
            MeterKind::Electric => self.cfg.electricity_meter(),
            MeterKind::Gas => self.cfg.gas_meter(),
        };
        OctopusConsumptionSource::new(
            self.client.clone(),
            meter,
            self.cfg.octopus.page_size,
            self.cfg.octopus.max_pages,
        )
    }

    async fn ingest_pages(
        &self,
        kind: MeterKind,
        pages: Result<Vec<ReadingBatch>, PipelineError>,
        constants: ConversionConstants,
    ) -> Result<IngestReport, PipelineError> {
        let pages = pages.inspect_err(|e| {
            tracing::error!(meter = %kind, error = %e, "fetch failed, skipping meter this cycle");
        })?;

        let mut report = IngestReport::default();
        for batch in pages {
            tracing::info!(meter = %kind, count = batch.count, "record count");
            let page_report = ingest(batch, kind, constants, &self.sink)
                .await
                .inspect_err(|e| {
                    tracing::error!(meter = %kind, error = %e, "ingest failed");
                })?;
            report.merge(page_report);
        }
        Ok(report)
    }

    /// Run a single poll cycle.
    pub async fn run_once(&self) -> CycleReport {
        let electric_src = self.source(MeterKind::Electric);
        let gas_src = self.source(MeterKind::Gas);

        let (electric_pages, gas_pages) = tokio::join!(fetch_all(&electric_src), fetch_all(&gas_src));

        let electric = self
            .ingest_pages(MeterKind::Electric, electric_pages, self.cfg.electricity_constants())
            .await;
        let gas = self
            .ingest_pages(MeterKind::Gas, gas_pages, self.cfg.gas_constants())
            .await;

        CycleReport { electric, gas }
    }

    /// Poll until `shutdown` is cancelled. New configurations received on
    /// `reloads` are applied between cycles.
    pub async fn run(mut self, shutdown: CancellationToken, mut reloads: mpsc::Receiver<AppConfig>) {
        tracing::info!(
            interval_secs = self.cfg.schedule.interval_secs,
            "poller started"
        );

        loop {
            if shutdown.is_cancelled() {
                break;
            }

            let started = Instant::now();
            let report = self.run_once().await;
            metrics::histogram!("poll_cycle_duration_seconds").record(started.elapsed().as_secs_f64());
            if report.electric.is_err() || report.gas.is_err() {
                metrics::counter!("poll_cycle_errors_total").increment(1);
            }

            let interval = Duration::from_secs(self.cfg.schedule.interval_secs);
            tracing::info!(
                electric = ?report.electric.as_ref().ok(),
                gas = ?report.gas.as_ref().ok(),
                finished_at = %OffsetDateTime::now_utc(),
                sleep_secs = interval.as_secs(),
                "finished collection"
            );

            let sleep = tokio::time::sleep(interval);
            tokio::pin!(sleep);

            loop {
                tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => {
                        tracing::info!("shutdown requested");
                        return;
                    }
                    Some(cfg) = reloads.recv() => {
                        match self.reload(cfg) {
                            Ok(()) => tracing::info!("configuration reloaded"),
                            Err(e) => tracing::error!(error = %format!("{e:#}"), "failed to apply reloaded configuration"),
                        }
                    }
                    _ = &mut sleep => break,
                }
            }
        }

        tracing::info!("poller stopped");
    }
}
