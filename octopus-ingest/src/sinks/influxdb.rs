use std::time::{Duration, SystemTime};

use futures::StreamExt;
use octopus_client::domain::MeasurementPoint;
use reqwest::{header, Url};

use crate::{
    config::InfluxDbConfig,
    pipeline::{Envelope, PipelineError, Sink},
    sinks::line_protocol::LineEncode,
};

/// Writes points to the InfluxDB v2 HTTP write API in line protocol.
///
/// The HTTP client is built once and shared across poll cycles; its pool
/// reconnects on its own when a keep-alive connection drops.
pub struct InfluxDbSink {
    client: reqwest::Client,
    write_url: Url,
    token: String,
    batch_size: usize,
}

impl InfluxDbSink {
    pub fn new(cfg: &InfluxDbConfig) -> Result<Self, PipelineError> {
        let raw = format!("{}/api/v2/write", cfg.url.trim_end_matches('/'));
        let mut write_url = Url::parse(&raw)
            .map_err(|e| PipelineError::Sink(format!("invalid influxdb url '{}': {e}", cfg.url)))?;
        write_url
            .query_pairs_mut()
            .append_pair("org", &cfg.org)
            .append_pair("bucket", &cfg.bucket)
            .append_pair("precision", "ns");

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .map_err(|e| PipelineError::Sink(format!("failed to build http client: {e}")))?;

        Ok(Self {
            client,
            write_url,
            token: cfg.token.clone(),
            batch_size: cfg.batch_size.max(1),
        })
    }

    /// Encoded body and the number of lines in it.
    fn encode_batch(&self, batch: &[Envelope<MeasurementPoint>]) -> (String, usize) {
        let mut s = String::with_capacity(batch.len().saturating_mul(80));
        let mut lines = 0;
        for env in batch {
            if !env.payload.is_encodable() {
                tracing::warn!(
                    measurement = %env.payload.measurement,
                    "dropping point with non-finite field"
                );
                metrics::counter!("influxdb_dropped_points_total").increment(1);
                continue;
            }
            env.payload.write_line(&mut s);
            s.push('\n');
            lines += 1;
        }
        (s, lines)
    }

    async fn flush_batch(&self, batch: &[Envelope<MeasurementPoint>]) -> Result<(), PipelineError> {
        if batch.is_empty() {
            return Ok(());
        }

        let (body, lines) = self.encode_batch(batch);
        if lines == 0 {
            return Ok(());
        }
        let bytes = body.len();

        let resp = self
            .client
            .post(self.write_url.clone())
            .header(header::AUTHORIZATION, format!("Token {}", self.token))
            .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(body)
            .send()
            .await
            .map_err(|e| {
                metrics::counter!("influxdb_sink_errors_total").increment(1);
                PipelineError::Sink(format!("influxdb write failed: {e}"))
            })?;

        let status = resp.status();
        if !status.is_success() {
            let detail = resp.text().await.unwrap_or_default();
            tracing::error!(status = status.as_u16(), %detail, "influxdb rejected write");
            metrics::counter!("influxdb_sink_errors_total").increment(1);
            return Err(PipelineError::Sink(format!(
                "influxdb write returned {status}: {detail}"
            )));
        }

        metrics::counter!("influxdb_written_points_total").increment(lines as u64);
        metrics::counter!("influxdb_written_bytes_total").increment(bytes as u64);
        if let Some(min_received) = batch.iter().map(|e| e.received_at).min() {
            if let Ok(dur) = SystemTime::now().duration_since(min_received) {
                metrics::histogram!("ingest_end_to_end_latency_seconds").record(dur.as_secs_f64());
            }
        }

        Ok(())
    }
}

#[async_trait::async_trait]
impl Sink<MeasurementPoint> for InfluxDbSink {
    async fn run<S>(&self, mut input: S) -> Result<(), PipelineError>
    where
        S: futures::Stream<Item = Result<Envelope<MeasurementPoint>, PipelineError>>
            + Send
            + Unpin
            + 'static,
    {
        let mut buffer: Vec<Envelope<MeasurementPoint>> = Vec::with_capacity(self.batch_size);

        while let Some(item) = input.next().await {
            let env = match item {
                Ok(env) => env,
                Err(e) => {
                    tracing::error!(error = %e, "error in upstream pipeline for InfluxDbSink");
                    continue;
                }
            };

            buffer.push(env);
            if buffer.len() >= self.batch_size {
                self.flush_batch(&buffer).await?;
                buffer.clear();
            }
        }

        if !buffer.is_empty() {
            self.flush_batch(&buffer).await?;
        }

        Ok(())
    }
}
