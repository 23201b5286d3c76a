use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MeterKind {
    Electric,
    Gas,
}

impl MeterKind {
    /// Value of the `consumption` tag on every point derived from this meter.
    pub fn tag_value(self) -> &'static str {
        match self {
            Self::Electric => "electric",
            Self::Gas => "gas",
        }
    }

    pub fn points_per_reading(self) -> usize {
        match self {
            Self::Electric => 2,
            Self::Gas => 3,
        }
    }

    fn path_segment(self) -> &'static str {
        match self {
            Self::Electric => "electricity-meter-points",
            Self::Gas => "gas-meter-points",
        }
    }
}

impl fmt::Display for MeterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag_value())
    }
}

/// A meter identified by its point id (MPAN for electricity, MPRN for gas)
/// and serial number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeterPoint {
    pub kind: MeterKind,
    pub point_id: String,
    pub serial: String,
}

impl MeterPoint {
    pub fn electricity(mpan: impl Into<String>, serial: impl Into<String>) -> Self {
        Self {
            kind: MeterKind::Electric,
            point_id: mpan.into(),
            serial: serial.into(),
        }
    }

    pub fn gas(mprn: impl Into<String>, serial: impl Into<String>) -> Self {
        Self {
            kind: MeterKind::Gas,
            point_id: mprn.into(),
            serial: serial.into(),
        }
    }

    pub fn consumption_path(&self) -> String {
        format!(
            "/v1/{}/{}/meters/{}/consumption",
            self.kind.path_segment(),
            self.point_id,
            self.serial
        )
    }
}
