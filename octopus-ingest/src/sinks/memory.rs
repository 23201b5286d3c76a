use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
};

use futures::StreamExt;
use octopus_client::domain::MeasurementPoint;

use crate::{
    pipeline::{Envelope, PipelineError, Sink},
    sinks::line_protocol::ts_to_unix_nanos,
};

/// In-memory sink with the same upsert semantics as the time-series store:
/// a point replaces any earlier point with the same series key and timestamp.
#[derive(Default)]
pub struct MemorySink {
    points: Mutex<BTreeMap<(String, i128), MeasurementPoint>>,
    log: Mutex<Vec<MeasurementPoint>>,
    submissions: AtomicUsize,
}

impl MemorySink {
    /// Number of points handed to the sink, duplicates included.
    pub fn submissions(&self) -> usize {
        self.submissions.load(Ordering::SeqCst)
    }

    /// Number of distinct stored points.
    pub fn distinct_points(&self) -> usize {
        self.points.lock().map(|p| p.len()).unwrap_or(0)
    }

    /// Every submitted point, in submission order.
    pub fn submitted(&self) -> Vec<MeasurementPoint> {
        self.log.lock().map(|l| l.clone()).unwrap_or_default()
    }

    /// Stored points ordered by series key, then timestamp.
    pub fn stored(&self) -> Vec<MeasurementPoint> {
        self.points
            .lock()
            .map(|p| p.values().cloned().collect())
            .unwrap_or_default()
    }

    fn upsert(&self, point: MeasurementPoint) -> Result<(), PipelineError> {
        let key = (point.series_key(), ts_to_unix_nanos(point.ts));
        self.log
            .lock()
            .map_err(|_| PipelineError::Sink("memory sink poisoned".to_string()))?
            .push(point.clone());
        self.points
            .lock()
            .map_err(|_| PipelineError::Sink("memory sink poisoned".to_string()))?
            .insert(key, point);
        self.submissions.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait::async_trait]
impl Sink<MeasurementPoint> for MemorySink {
    async fn run<S>(&self, mut input: S) -> Result<(), PipelineError>
    where
        S: futures::Stream<Item = Result<Envelope<MeasurementPoint>, PipelineError>>
            + Send
            + Unpin
            + 'static,
    {
        while let Some(item) = input.next().await {
            match item {
                Ok(env) => self.upsert(env.payload)?,
                Err(e) => tracing::error!(error = %e, "error in upstream pipeline for MemorySink"),
            }
        }
        Ok(())
    }
}
