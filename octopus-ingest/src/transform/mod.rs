pub mod convert;

pub use convert::{to_cost, to_energy_kwh, ConversionConstants};

use octopus_client::domain::{MeasurementPoint, MeterKind, Reading};

use crate::pipeline::{Envelope, PipelineError, Transform};

const CONSUMPTION_TAG: &str = "consumption";

/// Build the measurement points for one reading.
///
/// Electricity yields `electricity` and `electricity_cost`; gas yields `gas`,
/// `gaskwh` and `gas_cost`. Every point carries the reading's `interval_end`
/// as its timestamp and a `consumption` tag naming the meter kind.
///
/// `electricity_cost` carries the raw consumption, not a converted cost. This
/// mirrors the series already stored by existing deployments.
pub fn build_points(
    reading: &Reading,
    kind: MeterKind,
    constants: &ConversionConstants,
) -> Result<Vec<MeasurementPoint>, PipelineError> {
    let ts = reading.parse_interval_end().map_err(|e| {
        PipelineError::Transform(format!("invalid interval_end '{}': {e}", reading.interval_end))
    })?;
    let tag = kind.tag_value();
    let raw = f64::from(reading.consumption);

    let points = match kind {
        MeterKind::Electric => vec![
            MeasurementPoint::new("electricity", ts)
                .tag(CONSUMPTION_TAG, tag)
                .field("consumption", raw),
            MeasurementPoint::new("electricity_cost", ts)
                .tag(CONSUMPTION_TAG, tag)
                .field("consumption", raw),
        ],
        MeterKind::Gas => {
            let kwh = to_energy_kwh(reading.consumption, constants);
            let cost = to_cost(kwh, constants);
            vec![
                MeasurementPoint::new("gas", ts)
                    .tag(CONSUMPTION_TAG, tag)
                    .field("consumption", raw),
                MeasurementPoint::new("gaskwh", ts)
                    .tag(CONSUMPTION_TAG, tag)
                    .field("consumption_kwh", f64::from(kwh)),
                MeasurementPoint::new("gas_cost", ts)
                    .tag(CONSUMPTION_TAG, tag)
                    .field("price", f64::from(cost)),
            ]
        }
    };

    Ok(points)
}

#[derive(Debug, Clone, Copy)]
pub struct PointBuilder {
    kind: MeterKind,
    constants: ConversionConstants,
}

impl PointBuilder {
    pub fn new(kind: MeterKind, constants: ConversionConstants) -> Self {
        Self { kind, constants }
    }
}

#[async_trait::async_trait]
impl Transform<Reading, Vec<MeasurementPoint>> for PointBuilder {
    async fn apply(
        &self,
        input: Envelope<Reading>,
    ) -> Result<Envelope<Vec<MeasurementPoint>>, PipelineError> {
        let points = build_points(&input.payload, self.kind, &self.constants)?;
        Ok(Envelope {
            payload: points,
            received_at: input.received_at,
        })
    }
}
