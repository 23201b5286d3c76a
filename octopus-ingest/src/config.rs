use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context};
use octopus_client::{api::consumption::DEFAULT_BASE_URL, domain::MeterPoint};
use serde::Deserialize;

use crate::transform::ConversionConstants;

pub const CONFIG_ENV: &str = "OCTOPUS_INGEST_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "octopus-ingest.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct ElectricityMeterConfig {
    pub mpan: String,
    pub serial: String,
    /// Unit rate in pence per kWh.
    pub cost_per_unit: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GasMeterConfig {
    pub mprn: String,
    pub serial: String,
    /// Unit rate in pence per kWh.
    pub cost_per_unit: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OctopusConfig {
    pub account_number: String,
    pub api_key: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    pub page_size: u32,
    /// Upper bound on `next` cursors followed per meter and cycle.
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    pub electricity: ElectricityMeterConfig,
    pub gas: GasMeterConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConversionConfig {
    pub volume_correction: f32,
    pub calorific_value: f32,
    pub joules_conversion: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InfluxDbConfig {
    pub url: String,
    pub token: String,
    pub org: String,
    pub bucket: String,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_request_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    pub bind_addr: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub octopus: OctopusConfig,
    pub conversion: ConversionConfig,
    pub influxdb: InfluxDbConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    pub metrics: Option<MetricsConfig>,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_max_pages() -> u32 {
    1
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_batch_size() -> usize {
    500
}

fn default_interval_secs() -> u64 {
    24 * 60 * 60
}

impl AppConfig {
    /// Path from `OCTOPUS_INGEST_CONFIG`, falling back to `octopus-ingest.toml`.
    pub fn path() -> PathBuf {
        std::env::var(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
    }

    pub fn load_from(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_toml_str(&contents).with_context(|| format!("invalid config {}", path.display()))
    }

    pub fn from_toml_str(contents: &str) -> anyhow::Result<Self> {
        let cfg: AppConfig = toml::from_str(contents)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let o = &self.octopus;
        if o.api_key.trim().is_empty() {
            bail!("octopus.api_key must not be empty");
        }
        if o.page_size == 0 {
            bail!("octopus.page_size must be at least 1");
        }
        if o.max_pages == 0 {
            bail!("octopus.max_pages must be at least 1");
        }
        if o.electricity.mpan.trim().is_empty() || o.electricity.serial.trim().is_empty() {
            bail!("octopus.electricity requires mpan and serial");
        }
        if o.gas.mprn.trim().is_empty() || o.gas.serial.trim().is_empty() {
            bail!("octopus.gas requires mprn and serial");
        }
        if self.influxdb.batch_size == 0 {
            bail!("influxdb.batch_size must be at least 1");
        }
        if self.schedule.interval_secs == 0 {
            bail!("schedule.interval_secs must be at least 1");
        }
        Ok(())
    }

    pub fn electricity_meter(&self) -> MeterPoint {
        let e = &self.octopus.electricity;
        MeterPoint::electricity(e.mpan.clone(), e.serial.clone())
    }

    pub fn gas_meter(&self) -> MeterPoint {
        let g = &self.octopus.gas;
        MeterPoint::gas(g.mprn.clone(), g.serial.clone())
    }

    pub fn gas_constants(&self) -> ConversionConstants {
        self.constants_with_rate(self.octopus.gas.cost_per_unit)
    }

    /// Only the cost rate differs from the gas constants; the electricity
    /// points do not apply any conversion.
    pub fn electricity_constants(&self) -> ConversionConstants {
        self.constants_with_rate(self.octopus.electricity.cost_per_unit)
    }

    fn constants_with_rate(&self, cost_per_unit: f32) -> ConversionConstants {
        ConversionConstants {
            volume_correction: self.conversion.volume_correction,
            calorific_value: self.conversion.calorific_value,
            joules_conversion: self.conversion.joules_conversion,
            cost_per_unit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [octopus]
        account_number = "A-1234ABCD"
        api_key = "sk_live_abc"
        page_size = 48

        [octopus.electricity]
        mpan = "1200000000000"
        serial = "21L0000000"
        cost_per_unit = 27.03

        [octopus.gas]
        mprn = "9000000000"
        serial = "G4A00000000000"
        cost_per_unit = 6.89

        [conversion]
        volume_correction = 1.02264
        calorific_value = 39.5
        joules_conversion = 3.6

        [influxdb]
        url = "http://localhost:8086"
        token = "influx-token"
        org = "home"
        bucket = "energy"
    "#;

    #[test]
    fn minimal_config_gets_defaults() {
        let cfg = AppConfig::from_toml_str(MINIMAL).unwrap();

        assert_eq!(cfg.octopus.base_url, "https://api.octopus.energy");
        assert_eq!(cfg.octopus.max_pages, 1);
        assert_eq!(cfg.octopus.request_timeout_secs, 30);
        assert_eq!(cfg.influxdb.batch_size, 500);
        assert_eq!(cfg.schedule.interval_secs, 86_400);
        assert!(cfg.metrics.is_none());
    }

    #[test]
    fn meters_and_constants_come_from_config() {
        let cfg = AppConfig::from_toml_str(MINIMAL).unwrap();

        assert_eq!(cfg.electricity_meter(), MeterPoint::electricity("1200000000000", "21L0000000"));
        assert_eq!(cfg.gas_meter(), MeterPoint::gas("9000000000", "G4A00000000000"));

        let gas = cfg.gas_constants();
        assert_eq!(gas.volume_correction, 1.02264);
        assert_eq!(gas.calorific_value, 39.5);
        assert_eq!(gas.joules_conversion, 3.6);
        assert_eq!(gas.cost_per_unit, 6.89);
        assert_eq!(cfg.electricity_constants().cost_per_unit, 27.03);
    }

    #[test]
    fn zero_page_size_is_rejected() {
        let bad = MINIMAL.replace("page_size = 48", "page_size = 0");
        let err = AppConfig::from_toml_str(&bad).unwrap_err();
        assert!(err.to_string().contains("page_size"));
    }

    #[test]
    fn missing_section_is_rejected() {
        let bad = MINIMAL.replace("[conversion]", "[conversion_typo]");
        assert!(AppConfig::from_toml_str(&bad).is_err());
    }

    #[test]
    fn metrics_and_schedule_overrides() {
        let cfg = AppConfig::from_toml_str(&format!(
            "{MINIMAL}\n[schedule]\ninterval_secs = 3600\n\n[metrics]\nbind_addr = \"0.0.0.0:9100\"\n"
        ))
        .unwrap();

        assert_eq!(cfg.schedule.interval_secs, 3600);
        assert_eq!(cfg.metrics.unwrap().bind_addr, "0.0.0.0:9100");
    }

    #[test]
    fn load_from_missing_file_names_the_path() {
        let err = AppConfig::load_from("/nonexistent/octopus-ingest.toml").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/octopus-ingest.toml"));
    }
}
