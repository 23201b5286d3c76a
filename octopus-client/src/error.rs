#[derive(thiserror::Error, Debug)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status {status} from {url}")]
    Status { status: u16, url: String },
    #[error("failed to decode consumption response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("invalid url: {0}")]
    InvalidUrl(String),
}

#[derive(thiserror::Error, Debug)]
pub enum TimestampError {
    #[error("not an RFC 3339 date-time: {0:?}")]
    Format(String),
    #[error(transparent)]
    Parse(#[from] time::error::Parse),
}
