use std::{sync::Arc, time::SystemTime};

use async_stream::try_stream;
use futures::Stream;
use octopus_client::{
    domain::{MeterPoint, ReadingBatch},
    ConsumptionClient,
};

use crate::pipeline::{Envelope, PipelineError, Source};

/// Pages of consumption readings for one meter.
///
/// Yields the latest page first and follows `next` cursors until either the
/// API runs out of pages or `max_pages` pages were fetched. Cursors on a
/// different origin than the configured API are not followed. A failed
/// request ends the stream with a source error.
pub struct OctopusConsumptionSource {
    client: Arc<ConsumptionClient>,
    meter: MeterPoint,
    page_size: u32,
    max_pages: u32,
}

impl OctopusConsumptionSource {
    pub fn new(client: Arc<ConsumptionClient>, meter: MeterPoint, page_size: u32, max_pages: u32) -> Self {
        Self {
            client,
            meter,
            page_size,
            max_pages: max_pages.max(1),
        }
    }
}

#[async_trait::async_trait]
impl Source<ReadingBatch> for OctopusConsumptionSource {
    async fn stream(
        &self,
    ) -> std::pin::Pin<Box<dyn Stream<Item = Result<Envelope<ReadingBatch>, PipelineError>> + Send>> {
        let client = self.client.clone();
        let meter = self.meter.clone();
        let page_size = self.page_size;
        let max_pages = self.max_pages;

        let s = try_stream! {
            let kind = meter.kind;
            let first = client
                .consumption_url(&meter, page_size)
                .map_err(|e| PipelineError::Source(format!("{kind} meter: {e}")))?;

            let mut next = Some(first.to_string());
            let mut pages: u32 = 0;

            while let Some(url) = next.take() {
                if pages >= max_pages {
                    tracing::debug!(meter = %kind, pages, "page limit reached, not following next cursor");
                    break;
                }

                metrics::counter!("octopus_fetch_total", "meter" => kind.tag_value()).increment(1);
                let batch = match client.fetch_page(&url).await {
                    Ok(b) => b,
                    Err(e) => {
                        metrics::counter!("octopus_fetch_errors_total", "meter" => kind.tag_value()).increment(1);
                        Err(PipelineError::Source(format!("{kind} meter fetch failed: {e}")))?
                    }
                };

                pages += 1;
                next = match batch.next.as_deref() {
                    Some(cursor) if client.is_same_origin(cursor) => Some(cursor.to_string()),
                    Some(cursor) => {
                        tracing::warn!(meter = %kind, %cursor, "next cursor points at another host, not following");
                        None
                    }
                    None => None,
                };

                yield Envelope {
                    payload: batch,
                    received_at: SystemTime::now(),
                };
            }
        };

        Box::pin(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use mockito::{Matcher, Server};
    use std::time::Duration;

    const PATH: &str = "/v1/gas-meter-points/900/meters/G1/consumption";

    fn page(next: Option<String>, consumption: f32) -> String {
        let next = next.map(|n| format!("\"{n}\"")).unwrap_or_else(|| "null".to_string());
        format!(
            r#"{{"count": 3, "next": {next}, "previous": null, "results": [
                {{"consumption": {consumption}, "interval_start": "2023-01-01T00:00:00Z", "interval_end": "2023-01-01T00:30:00Z"}}
            ]}}"#
        )
    }

    fn source(base_url: String, max_pages: u32) -> OctopusConsumptionSource {
        let client = ConsumptionClient::new(base_url, "key", Duration::from_secs(5)).unwrap();
        OctopusConsumptionSource::new(Arc::new(client), MeterPoint::gas("900", "G1"), 1, max_pages)
    }

    #[tokio::test]
    async fn follows_next_cursor_up_to_max_pages() {
        let mut server = Server::new_async().await;
        let page2 = format!("{}{PATH}?page=2&page_size=1", server.url());
        let page3 = format!("{}{PATH}?page=3&page_size=1", server.url());

        let m1 = server
            .mock("GET", PATH)
            .match_query(Matcher::Exact("page_size=1".to_string()))
            .with_body(page(Some(page2), 1.0))
            .create_async()
            .await;
        let m2 = server
            .mock("GET", PATH)
            .match_query(Matcher::Exact("page=2&page_size=1".to_string()))
            .with_body(page(Some(page3), 2.0))
            .create_async()
            .await;
        let m3 = server
            .mock("GET", PATH)
            .match_query(Matcher::Exact("page=3&page_size=1".to_string()))
            .expect(0)
            .create_async()
            .await;

        let src = source(server.url(), 2);
        let pages: Vec<_> = src.stream().await.collect().await;

        assert_eq!(pages.len(), 2);
        let consumptions: Vec<f32> = pages
            .into_iter()
            .map(|p| p.unwrap().payload.results[0].consumption)
            .collect();
        assert_eq!(consumptions, vec![1.0, 2.0]);

        m1.assert_async().await;
        m2.assert_async().await;
        m3.assert_async().await;
    }

    #[tokio::test]
    async fn single_page_by_default() {
        let mut server = Server::new_async().await;
        let next = format!("{}{PATH}?page=2&page_size=1", server.url());
        let _m = server
            .mock("GET", PATH)
            .match_query(Matcher::Exact("page_size=1".to_string()))
            .with_body(page(Some(next), 1.0))
            .create_async()
            .await;

        let pages: Vec<_> = source(server.url(), 1).stream().await.collect().await;
        assert_eq!(pages.len(), 1);
        assert!(pages[0].is_ok());
    }

    #[tokio::test]
    async fn next_cursor_on_another_host_is_not_followed() {
        let mut server = Server::new_async().await;
        let foreign = format!("http://foreign.invalid{PATH}?page=2&page_size=1");
        let m1 = server
            .mock("GET", PATH)
            .match_query(Matcher::Exact("page_size=1".to_string()))
            .with_body(page(Some(foreign), 1.0))
            .expect(1)
            .create_async()
            .await;

        let pages: Vec<_> = source(server.url(), 5).stream().await.collect().await;

        assert_eq!(pages.len(), 1);
        assert!(pages[0].is_ok());
        m1.assert_async().await;
    }

    #[tokio::test]
    async fn failed_fetch_ends_stream_with_source_error() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", PATH)
            .match_query(Matcher::Any)
            .with_status(503)
            .create_async()
            .await;

        let pages: Vec<_> = source(server.url(), 3).stream().await.collect().await;
        assert_eq!(pages.len(), 1);
        assert!(matches!(pages[0], Err(PipelineError::Source(_))));
    }
}
