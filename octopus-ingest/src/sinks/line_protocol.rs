use octopus_client::domain::MeasurementPoint;
use time::OffsetDateTime;

/// Escape a measurement name. Line protocol requires commas and spaces to be
/// escaped here; `=` is allowed.
fn escape_measurement(s: &str, out: &mut String) {
    for ch in s.chars() {
        match ch {
            ',' | ' ' => {
                out.push('\\');
                out.push(ch);
            }
            _ => out.push(ch),
        }
    }
}

/// Escape tag keys, tag values and field keys.
fn escape_ident(s: &str, out: &mut String) {
    for ch in s.chars() {
        match ch {
            ',' | ' ' | '=' => {
                out.push('\\');
                out.push(ch);
            }
            _ => out.push(ch),
        }
    }
}

fn push_tag(out: &mut String, key: &str, value: &str) {
    out.push(',');
    escape_ident(key, out);
    out.push('=');
    escape_ident(value, out);
}

fn push_field_f64(out: &mut String, first: &mut bool, key: &str, value: f64) {
    if *first {
        *first = false;
    } else {
        out.push(',');
    }

    escape_ident(key, out);
    out.push('=');
    out.push_str(&value.to_string());
}

pub(crate) fn ts_to_unix_nanos(ts: OffsetDateTime) -> i128 {
    ts.unix_timestamp_nanos()
}

pub trait LineEncode {
    /// Whether the value can be represented in line protocol at all.
    fn is_encodable(&self) -> bool;

    fn write_line(&self, out: &mut String);
}

impl LineEncode for MeasurementPoint {
    fn is_encodable(&self) -> bool {
        !self.fields.is_empty() && self.fields.iter().all(|(_, v)| v.is_finite())
    }

    fn write_line(&self, out: &mut String) {
        escape_measurement(&self.measurement, out);

        // Tags sorted by key, as recommended for write performance.
        let mut tags: Vec<&(String, String)> = self.tags.iter().collect();
        tags.sort();
        for (k, v) in tags {
            push_tag(out, k, v);
        }

        out.push(' ');
        let mut first = true;
        for (k, v) in &self.fields {
            push_field_f64(out, &mut first, k, *v);
        }

        out.push(' ');
        out.push_str(&ts_to_unix_nanos(self.ts).to_string());
    }
}
