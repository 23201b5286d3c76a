//! Gas volume to energy and cost conversion.
//!
//! Arithmetic is single precision and evaluated left to right so results
//! match the supplier's own bill calculation. Inputs are not validated:
//! NaN and negative values flow straight through.

/// Constants for converting a gas reading into energy and cost.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConversionConstants {
    /// Temperature/pressure correction factor (dimensionless).
    pub volume_correction: f32,
    /// Energy content per unit volume, MJ/m3.
    pub calorific_value: f32,
    /// Divisor from MJ to kWh.
    pub joules_conversion: f32,
    /// Unit rate in pence per kWh.
    pub cost_per_unit: f32,
}

/// `consumption * volume_correction * calorific_value / joules_conversion`
pub fn to_energy_kwh(consumption: f32, c: &ConversionConstants) -> f32 {
    consumption * c.volume_correction * c.calorific_value / c.joules_conversion
}

/// `kwh * cost_per_unit / 100`, i.e. pence to pounds.
pub fn to_cost(kwh: f32, c: &ConversionConstants) -> f32 {
    kwh * c.cost_per_unit / 100.0
}
