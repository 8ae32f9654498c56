//! Shared telemetry state updated by sentence handlers
//!
//! One `TelemetryState` is owned by the dispatch side and handed to each
//! handler as `&mut`. Handlers run one at a time, so the state itself
//! carries no synchronization.

use chrono::NaiveTime;
use serde::Serialize;

/// Number of remote key slots
pub const KEY_COUNT: usize = 20;

/// Flags raised by remote key sentences
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct KeyFlags([bool; KEY_COUNT]);

impl KeyFlags {
    /// Raise a key. Out-of-range indices are ignored and return false.
    pub fn set(&mut self, index: usize) -> bool {
        match self.0.get_mut(index) {
            Some(flag) => {
                *flag = true;
                true
            }
            None => false,
        }
    }

    /// Is the key raised?
    pub fn is_set(&self, index: usize) -> bool {
        self.0.get(index).copied().unwrap_or(false)
    }

    /// Read and clear a key
    pub fn take(&mut self, index: usize) -> bool {
        self.0
            .get_mut(index)
            .map(std::mem::take)
            .unwrap_or(false)
    }

    /// Clear every key
    pub fn clear(&mut self) {
        self.0 = [false; KEY_COUNT];
    }

    /// Indices of raised keys
    pub fn raised(&self) -> impl Iterator<Item = usize> + '_ {
        self.0.iter().enumerate().filter(|(_, f)| **f).map(|(i, _)| i)
    }

    /// Any key raised?
    pub fn any(&self) -> bool {
        self.0.iter().any(|&f| f)
    }
}

/// GPS fix quality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum FixQuality {
    /// No fix
    #[default]
    Invalid,
    /// Standard GPS fix
    Gps,
    /// Differential GPS
    Dgps,
    /// Precise positioning service
    Pps,
    /// Real-time kinematic, fixed integers
    Rtk,
    /// Real-time kinematic, float solution
    FloatRtk,
    /// Dead reckoning
    Estimated,
    /// Manual input
    Manual,
    /// Simulator
    Simulation,
}

impl From<u8> for FixQuality {
    fn from(v: u8) -> Self {
        match v {
            1 => Self::Gps,
            2 => Self::Dgps,
            3 => Self::Pps,
            4 => Self::Rtk,
            5 => Self::FloatRtk,
            6 => Self::Estimated,
            7 => Self::Manual,
            8 => Self::Simulation,
            _ => Self::Invalid,
        }
    }
}

/// Signed decimal-degree position
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GeoPoint {
    /// Degrees, north positive
    pub latitude: f64,
    /// Degrees, east positive
    pub longitude: f64,
}

impl GeoPoint {
    /// Format as human-readable string
    pub fn format(&self) -> String {
        let lat_dir = if self.latitude >= 0.0 { "N" } else { "S" };
        let lon_dir = if self.longitude >= 0.0 { "E" } else { "W" };
        format!(
            "{:.6}° {}, {:.6}° {}",
            self.latitude.abs(),
            lat_dir,
            self.longitude.abs(),
            lon_dir
        )
    }
}

/// Mutable record shared by all handlers
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TelemetryState {
    /// Remote key presses
    pub keys: KeyFlags,
    /// Last reported position
    pub location: Option<GeoPoint>,
    /// Whether the receiver reported a valid fix (RMC status `A`)
    pub fix_valid: Option<bool>,
    /// GGA fix quality
    pub fix_quality: Option<FixQuality>,
    /// Satellites used in the fix
    pub satellites_used: Option<u8>,
    /// Horizontal dilution of precision
    pub hdop: Option<f64>,
    /// Altitude above mean sea level in meters
    pub gps_altitude: Option<f64>,
    /// UTC time of the last fix
    pub time: Option<NaiveTime>,
    /// Speed over ground in knots
    pub ground_speed_knots: Option<f64>,
    /// True track over ground in degrees
    pub track: Option<f64>,
    /// True heading in degrees
    pub heading: Option<f64>,
}

impl TelemetryState {
    /// Empty state, nothing reported yet
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_set_and_take() {
        let mut keys = KeyFlags::default();
        assert!(keys.set(5));
        assert!(keys.is_set(5));
        assert!(keys.take(5));
        assert!(!keys.is_set(5));
        assert!(!keys.take(5));
    }

    #[test]
    fn test_key_out_of_range() {
        let mut keys = KeyFlags::default();
        assert!(!keys.set(KEY_COUNT));
        assert!(!keys.is_set(99));
        assert!(!keys.take(99));
        assert!(!keys.any());
    }

    #[test]
    fn test_raised_keys() {
        let mut keys = KeyFlags::default();
        keys.set(0);
        keys.set(19);
        assert_eq!(keys.raised().collect::<Vec<_>>(), vec![0, 19]);
        keys.clear();
        assert!(!keys.any());
    }

    #[test]
    fn test_new_state_is_empty() {
        let state = TelemetryState::new();
        assert_eq!(state, TelemetryState::default());
        assert!(!state.keys.any());
        assert_eq!(state.fix_quality, None);
        assert_eq!(state.ground_speed_knots, None);
    }

    #[test]
    fn test_fix_quality_from_u8() {
        assert_eq!(FixQuality::from(1), FixQuality::Gps);
        assert_eq!(FixQuality::from(42), FixQuality::Invalid);
    }

    #[test]
    fn test_format_position() {
        let p = GeoPoint { latitude: -33.5, longitude: 151.25 };
        assert_eq!(p.format(), "33.500000° S, 151.250000° E");
    }
}
