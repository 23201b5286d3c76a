pub mod influxdb;
pub mod line_protocol;
pub mod memory;

pub use influxdb::InfluxDbSink;
pub use memory::MemorySink;
