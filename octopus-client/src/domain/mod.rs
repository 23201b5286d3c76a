pub mod meter;
pub mod point;
pub mod reading;

pub use meter::{MeterKind, MeterPoint};
pub use point::MeasurementPoint;
pub use reading::{Reading, ReadingBatch};
