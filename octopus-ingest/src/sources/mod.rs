pub mod octopus;

pub use octopus::OctopusConsumptionSource;
