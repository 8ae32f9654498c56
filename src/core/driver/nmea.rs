//! Standard NMEA 0183 driver
//!
//! Supported sentences:
//! - GGA: Global Positioning System Fix Data
//! - RMC: Recommended Minimum Navigation Information
//! - VTG: Track Made Good and Ground Speed
//! - HDT: Heading True
//!
//! Every field is applied on its own: a field that fails to parse leaves
//! the matching part of the state untouched while its siblings from the
//! same sentence still go through.

use super::{DriverRegistry, RegistryError};
use crate::core::protocol::{FieldValue, InputLine};
use crate::core::telemetry::{FixQuality, GeoPoint, TelemetryState};
use chrono::NaiveTime;

type HandlerFn = fn(&mut InputLine<'_>, &mut TelemetryState) -> bool;

const SENTENCES: &[(&str, HandlerFn)] = &[
    ("$GPGGA", gga),
    ("$GNGGA", gga),
    ("$GPRMC", rmc),
    ("$GNRMC", rmc),
    ("$GPVTG", vtg),
    ("$GNVTG", vtg),
    ("$HEHDT", hdt),
    ("$GPHDT", hdt),
];

/// Build the `nmea` driver; every sentence requires a valid checksum
pub fn create() -> Result<DriverRegistry, RegistryError> {
    let mut registry = DriverRegistry::new("nmea");
    for (prefix, handler) in SENTENCES {
        registry.register(prefix, *handler)?;
    }
    Ok(registry)
}

/// Parse time from HHMMSS.sss format
fn parse_time(s: &str) -> Option<NaiveTime> {
    let hours: u32 = s.get(0..2)?.parse().ok()?;
    let minutes: u32 = s.get(2..4)?.parse().ok()?;
    let seconds = f64::parse_field(s.get(4..)?)?;
    if seconds < 0.0 {
        return None;
    }

    let secs = seconds.floor() as u32;
    let nanos = ((seconds - seconds.floor()) * 1_000_000_000.0) as u32;

    NaiveTime::from_hms_nano_opt(hours, minutes, secs, nanos)
}

/// Parse NMEA coordinate format (DDDMM.MMMM) plus hemisphere letter
fn parse_coordinate(
    value: &str,
    hemisphere: Option<char>,
    (positive, negative): (char, char),
    max_degrees: f64,
) -> Option<f64> {
    let raw = f64::parse_field(value)?;
    if raw < 0.0 {
        return None;
    }

    let degrees = (raw / 100.0).floor();
    let minutes = raw - degrees * 100.0;
    let decimal = degrees + minutes / 60.0;
    if minutes >= 60.0 || decimal > max_degrees {
        return None;
    }

    match hemisphere? {
        c if c == positive => Some(decimal),
        c if c == negative => Some(-decimal),
        _ => None,
    }
}

/// Read the four `lat,N/S,lon,E/W` fields; the cursor always moves past all four
fn read_location(line: &mut InputLine<'_>) -> Option<GeoPoint> {
    let lat = line.read();
    let lat_hemisphere = line.read_char();
    let lon = line.read();
    let lon_hemisphere = line.read_char();

    Some(GeoPoint {
        latitude: parse_coordinate(lat, lat_hemisphere, ('N', 'S'), 90.0)?,
        longitude: parse_coordinate(lon, lon_hemisphere, ('E', 'W'), 180.0)?,
    })
}

fn read_angle(line: &mut InputLine<'_>) -> Option<f64> {
    line.read_checked::<f64>()
        .filter(|v| (0.0..=360.0).contains(v))
}

fn read_speed(line: &mut InputLine<'_>) -> Option<f64> {
    line.read_checked::<f64>().filter(|v| *v >= 0.0)
}

/// `$GPGGA,time,lat,N,lon,E,quality,sats,hdop,alt,M,geoid,M,age,station`
pub fn gga(line: &mut InputLine<'_>, state: &mut TelemetryState) -> bool {
    let time = line.read_field().and_then(parse_time);
    let location = read_location(line);
    let quality = line.read_checked::<u8>().map(FixQuality::from);
    let satellites = line.read_checked::<u8>();
    let hdop = line.read_checked::<f64>().filter(|v| *v >= 0.0);
    let altitude = line.read_checked::<f64>();
    let altitude_unit = line.read_char();

    if time.is_some() {
        state.time = time;
    }
    if quality.is_some() {
        state.fix_quality = quality;
    }
    // no fix, no position
    if quality != Some(FixQuality::Invalid) && location.is_some() {
        state.location = location;
    }
    if satellites.is_some() {
        state.satellites_used = satellites;
    }
    if hdop.is_some() {
        state.hdop = hdop;
    }
    if altitude.is_some() && matches!(altitude_unit, Some('M') | None) {
        state.gps_altitude = altitude;
    }
    true
}

/// `$GPRMC,time,status,lat,N,lon,E,speed,track,date,magvar,E,mode`
pub fn rmc(line: &mut InputLine<'_>, state: &mut TelemetryState) -> bool {
    let time = line.read_field().and_then(parse_time);
    let status = line.read_char();
    let location = read_location(line);
    let speed = read_speed(line);
    let track = read_angle(line);

    if time.is_some() {
        state.time = time;
    }
    match status {
        Some('A') => {
            state.fix_valid = Some(true);
            if location.is_some() {
                state.location = location;
            }
        }
        Some('V') => state.fix_valid = Some(false),
        _ => {}
    }
    if speed.is_some() {
        state.ground_speed_knots = speed;
    }
    if track.is_some() {
        state.track = track;
    }
    true
}

/// `$GPVTG,track,T,magtrack,M,knots,N,kmh,K,mode`
pub fn vtg(line: &mut InputLine<'_>, state: &mut TelemetryState) -> bool {
    let track = read_angle(line);
    line.skip(3);
    let speed = read_speed(line);

    if track.is_some() {
        state.track = track;
    }
    if speed.is_some() {
        state.ground_speed_knots = speed;
    }
    true
}

/// `$HEHDT,heading,T`
pub fn hdt(line: &mut InputLine<'_>, state: &mut TelemetryState) -> bool {
    let heading = read_angle(line);
    if heading.is_some() {
        state.heading = heading;
    }
    true
}
