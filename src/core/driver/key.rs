//! Remote key driver
//!
//! Handles the proprietary `$PDKEY` sentence sent by external key pads:
//!
//! ```text
//! $PDKEY,5        raise key 5
//! ```
//!
//! Key numbers outside `0..KEY_COUNT` are ignored, but the sentence still
//! counts as handled.

use super::{DriverRegistry, RegistryError};
use crate::core::protocol::{ChecksumPolicy, InputLine};
use crate::core::telemetry::{TelemetryState, KEY_COUNT};

/// Sentence prefix
pub const PDKEY: &str = "$PDKEY";

/// Parse a `$PDKEY` sentence
pub fn pdkey(line: &mut InputLine<'_>, state: &mut TelemetryState) -> bool {
    if let Some(key) = line.read_checked::<i32>() {
        match usize::try_from(key) {
            Ok(index) if index < KEY_COUNT => {
                state.keys.set(index);
            }
            _ => tracing::debug!(key, "ignoring out-of-range key"),
        }
    }
    true
}

/// Build the `nmea-key` driver.
///
/// `$PDKEY` is [`ChecksumPolicy::IfPresent`]: key pads often send it bare.
/// A line whose `*` delimiter is damaged therefore counts as unchecksummed
/// and reaches [`pdkey`], where the leftover digits make the key field fail
/// to parse and no key is raised.
pub fn create() -> Result<DriverRegistry, RegistryError> {
    let mut registry = DriverRegistry::new("nmea-key");
    registry.register_with_policy(PDKEY, ChecksumPolicy::IfPresent, pdkey)?;
    Ok(registry)
}
