use std::{pin::Pin, time::SystemTime};

use futures::Stream;
use octopus_client::domain::{MeasurementPoint, MeterKind, Reading, ReadingBatch};

use crate::transform::{ConversionConstants, PointBuilder};

#[derive(Debug, Clone)]
pub struct Envelope<T> {
    pub payload: T,
    pub received_at: SystemTime,
}

impl<T> Envelope<T> {
    pub fn new(payload: T) -> Self {
        Self {
            payload,
            received_at: SystemTime::now(),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("source error: {0}")]
    Source(String),
    #[error("transform error: {0}")]
    Transform(String),
    #[error("sink error: {0}")]
    Sink(String),
}

#[async_trait::async_trait]
pub trait Source<T>: Send + Sync {
    async fn stream(
        &self,
    ) -> Pin<Box<dyn Stream<Item = Result<Envelope<T>, PipelineError>> + Send>>;
}

#[async_trait::async_trait]
pub trait Transform<I, O>: Send + Sync {
    async fn apply(&self, input: Envelope<I>) -> Result<Envelope<O>, PipelineError>;
}

#[async_trait::async_trait]
pub trait Sink<T>: Send + Sync {
    async fn run<S>(&self, input: S) -> Result<(), PipelineError>
    where
        S: Stream<Item = Result<Envelope<T>, PipelineError>> + Send + Unpin + 'static;
}

/// Outcome of ingesting one or more batches for a single meter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub readings: usize,
    pub skipped: usize,
    pub points: usize,
}

impl IngestReport {
    pub fn merge(&mut self, other: IngestReport) {
        self.readings += other.readings;
        self.skipped += other.skipped;
        self.points += other.points;
    }
}

/// Turn every reading of `batch` into measurement points and hand them to
/// `sink` in batch order.
///
/// A batch whose `count` is zero is a no-op. Readings whose timestamp does not
/// parse are logged and skipped; the rest of the batch is still written.
pub async fn ingest<K>(
    batch: ReadingBatch,
    kind: MeterKind,
    constants: ConversionConstants,
    sink: &K,
) -> Result<IngestReport, PipelineError>
where
    K: Sink<MeasurementPoint>,
{
    let mut report = IngestReport::default();
    if batch.is_empty() {
        return Ok(report);
    }

    let builder = PointBuilder::new(kind, constants);
    let mut points: Vec<Envelope<MeasurementPoint>> =
        Vec::with_capacity(batch.results.len() * kind.points_per_reading());

    for reading in batch.results {
        report.readings += 1;
        let interval_end = reading.interval_end.clone();

        match builder.apply(Envelope::<Reading>::new(reading)).await {
            Ok(env) => {
                let received_at = env.received_at;
                points.extend(env.payload.into_iter().map(|payload| Envelope {
                    payload,
                    received_at,
                }));
            }
            Err(e) => {
                report.skipped += 1;
                metrics::counter!("readings_skipped_total", "meter" => kind.tag_value()).increment(1);
                tracing::warn!(meter = %kind, %interval_end, error = %e, "skipping reading");
            }
        }
    }

    report.points = points.len();
    metrics::counter!("points_built_total", "meter" => kind.tag_value()).increment(points.len() as u64);

    if !points.is_empty() {
        let stream = futures::stream::iter(points.into_iter().map(Ok::<_, PipelineError>));
        sink.run(stream).await?;
    }

    Ok(report)
}
