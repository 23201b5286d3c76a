pub mod api;
pub mod domain;
pub mod error;

pub use api::ConsumptionClient;
pub use error::{ClientError, TimestampError};
