use time::OffsetDateTime;

/// A single time-series point: measurement, tag set, numeric fields and a
/// timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementPoint {
    pub measurement: String,
    pub tags: Vec<(String, String)>,
    pub fields: Vec<(String, f64)>,
    pub ts: OffsetDateTime,
}

impl MeasurementPoint {
    pub fn new(measurement: impl Into<String>, ts: OffsetDateTime) -> Self {
        Self {
            measurement: measurement.into(),
            tags: Vec::new(),
            fields: Vec::new(),
            ts,
        }
    }

    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.push((key.into(), value.into()));
        self
    }

    pub fn field(mut self, key: impl Into<String>, value: f64) -> Self {
        self.fields.push((key.into(), value));
        self
    }

    pub fn field_value(&self, key: &str) -> Option<f64> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| *v)
    }

    /// Measurement plus tags sorted by key. Together with the timestamp this
    /// identifies a point in the store; writing the same key twice overwrites.
    pub fn series_key(&self) -> String {
        let mut tags: Vec<&(String, String)> = self.tags.iter().collect();
        tags.sort();

        let mut key = self.measurement.clone();
        for (k, v) in tags {
            key.push(',');
            key.push_str(k);
            key.push('=');
            key.push_str(v);
        }
        key
    }
}
