use crate::error::{ModemError, ModemResult};
use chrono::{DateTime, NaiveDateTime, Utc};
use std::str::FromStr;

// `+UGNSINF` carries 20 comma-separated fields. Indices 9 and 13 are reserved.
const FIELD_COUNT: usize = 20;

// One positioning report as sent by the modem's GNSS engine.
// Empty fields keep their zero default; the session replaces its snapshot
// wholesale with each successfully parsed report.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GpsFix {
    pub run_status: u8,
    pub fix_status: u8,
    /// UTC as the integer `YYYYMMDDhhmmss`, 0 when absent.
    pub timestamp: u64,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
    /// Ground speed in km/h.
    pub speed: f64,
    /// Course over ground in degrees.
    pub course: f64,
    pub fix_mode: u8,
    pub hdop: f64,
    pub pdop: f64,
    pub vdop: f64,
    pub satellites_visible: u32,
    pub satellites_used: u32,
    pub glonass_visible: u32,
    pub cn0_max: f64,
    pub hpa: f64,
    pub vpa: f64,
}

impl GpsFix {
    // Parse the payload of a `+UGNSINF` line, header token already removed.
    pub fn parse(raw: &str) -> ModemResult<Self> {
        let fields: Vec<&str> = raw.trim().split(',').map(str::trim).collect();
        if fields.len() < FIELD_COUNT {
            return Err(ModemError::MalformedFixData(format!(
                "expected {FIELD_COUNT} fields, got {}: {raw}",
                fields.len()
            )));
        }

        // Run and fix status are the only mandatory fields.
        let mut fix = GpsFix {
            run_status: parse_required(fields[0], "run status")?,
            fix_status: parse_required(fields[1], "fix status")?,
            ..GpsFix::default()
        };

        if let Some(seconds) = parse_opt::<f64>(fields[2], "timestamp")? {
            fix.timestamp = seconds.round().max(0.0) as u64;
        }
        set(&mut fix.latitude, fields[3], "latitude")?;
        set(&mut fix.longitude, fields[4], "longitude")?;
        set(&mut fix.altitude, fields[5], "altitude")?;
        set(&mut fix.speed, fields[6], "speed")?;
        set(&mut fix.course, fields[7], "course")?;
        set(&mut fix.fix_mode, fields[8], "fix mode")?;
        set(&mut fix.hdop, fields[10], "hdop")?;
        set(&mut fix.pdop, fields[11], "pdop")?;
        set(&mut fix.vdop, fields[12], "vdop")?;
        set(&mut fix.satellites_visible, fields[14], "satellites in view")?;
        set(&mut fix.satellites_used, fields[15], "satellites used")?;
        set(&mut fix.glonass_visible, fields[16], "GLONASS satellites in view")?;
        set(&mut fix.cn0_max, fields[17], "C/N0 max")?;
        set(&mut fix.hpa, fields[18], "HPA")?;
        set(&mut fix.vpa, fields[19], "VPA")?;

        Ok(fix)
    }

    pub fn has_fix(&self) -> bool {
        self.run_status == 1 && self.fix_status == 1
    }

    // Convert the packed `YYYYMMDDhhmmss` timestamp into a UTC instant.
    pub fn utc(&self) -> Option<DateTime<Utc>> {
        if self.timestamp == 0 {
            return None;
        }
        let packed = format!("{:014}", self.timestamp);
        NaiveDateTime::parse_from_str(&packed, "%Y%m%d%H%M%S")
            .ok()
            .map(|naive| naive.and_utc())
    }
}

fn set<T: FromStr>(slot: &mut T, raw: &str, name: &str) -> ModemResult<()> {
    if let Some(value) = parse_opt(raw, name)? {
        *slot = value;
    }
    Ok(())
}

fn parse_required<T: FromStr>(raw: &str, name: &str) -> ModemResult<T> {
    parse_opt(raw, name)?
        .ok_or_else(|| ModemError::MalformedFixData(format!("missing {name}")))
}

fn parse_opt<T: FromStr>(raw: &str, name: &str) -> ModemResult<Option<T>> {
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse::<T>()
        .map(Some)
        .map_err(|_| ModemError::MalformedFixData(format!("invalid {name}: {raw:?}")))
}
