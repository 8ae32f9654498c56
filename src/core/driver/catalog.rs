//! Built-in driver catalog
//!
//! Drivers are looked up by name from configuration or the command line.

use super::{key, nmea, DriverRegistry, RegistryError};

/// A named driver factory
#[derive(Debug, Clone, Copy)]
pub struct DriverDescriptor {
    /// Name used in configuration files and on the command line
    pub name: &'static str,
    /// Human-readable name
    pub display_name: &'static str,
    create: fn() -> Result<DriverRegistry, RegistryError>,
}

impl DriverDescriptor {
    /// Build a fresh registry for this driver
    pub fn create(&self) -> Result<DriverRegistry, RegistryError> {
        (self.create)()
    }
}

static BUILTIN: [DriverDescriptor; 2] = [
    DriverDescriptor {
        name: "nmea-key",
        display_name: "NMEA Key",
        create: key::create,
    },
    DriverDescriptor {
        name: "nmea",
        display_name: "Generic NMEA 0183",
        create: nmea::create,
    },
];

/// All built-in drivers
pub fn builtin() -> &'static [DriverDescriptor] {
    &BUILTIN
}

/// Find a driver by name
pub fn find(name: &str) -> Option<&'static DriverDescriptor> {
    BUILTIN.iter().find(|d| d.name == name)
}

/// Names of the drivers enabled when nothing is configured
pub fn default_names() -> Vec<String> {
    BUILTIN.iter().map(|d| d.name.to_string()).collect()
}
