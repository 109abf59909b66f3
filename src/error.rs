use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type used throughout the crate.
pub type Result<T> = ::std::result::Result<T, Error>;

/// An error that can occur while talking to a display or resolving its
/// configuration.
#[derive(Debug, Error)]
pub enum Error {
    /// No openable bus, or no identifiable display.
    #[error("no display found at {}", .bus.display())]
    DeviceNotFound {
        /// Bus path that was tried
        bus: PathBuf,
    },
    /// The device node is not accessible to the caller
    #[error("permission denied opening {} (is the i2c-dev node writable by this user?)", .bus.display())]
    PermissionDenied {
        /// Bus path that was tried
        bus: PathBuf,
    },
    /// Any other failure opening the device node
    #[error("failed to open {}: {source}", .bus.display())]
    Open {
        /// Bus path that was tried
        bus: PathBuf,
        /// Underlying OS error
        source: io::Error,
    },
    /// Binding the handle to a slave address failed
    #[error("failed to address 0x{address:02x} on {}: {source}", .bus.display())]
    IoctlFailed {
        /// Bus path
        bus: PathBuf,
        /// 7-bit slave address
        address: u16,
        /// Underlying OS error
        source: io::Error,
    },
    /// Writing to the bus failed
    #[error("write to {} failed: {source}", .bus.display())]
    IoWrite {
        /// Bus path
        bus: PathBuf,
        /// Underlying OS error
        source: io::Error,
    },
    /// Reading from the bus failed
    #[error("read from {} failed: {source}", .bus.display())]
    IoRead {
        /// Bus path
        bus: PathBuf,
        /// Underlying OS error
        source: io::Error,
    },
    /// A VCP read produced no parseable reply
    #[error("no reply for VCP 0x{vcp:02x} from {}", .bus.display())]
    NoReply {
        /// Bus path
        bus: PathBuf,
        /// Requested VCP code
        vcp: u8,
    },
    /// The monitor configuration has no such feature
    #[error("feature {feature} is not defined for {model}")]
    UnknownFeature {
        /// Configured model label
        model: String,
        /// Requested feature name
        feature: String,
    },
    /// The feature has no such value label
    #[error("invalid value {label} for {feature}, options: {}", .options.join(", "))]
    UnknownValue {
        /// Feature name
        feature: String,
        /// Requested value label
        label: String,
        /// Valid value labels
        options: Vec<String>,
    },
    /// The monitor configuration has no such preset
    #[error("preset {preset} not found, options: {}", .options.join(", "))]
    UnknownPreset {
        /// Requested preset name
        preset: String,
        /// Valid preset names
        options: Vec<String>,
    },
    /// The display has no matching configuration entry
    #[error("no configuration matched monitor '{name}' at {}", .bus.display())]
    NoConfigMatched {
        /// Bus path
        bus: PathBuf,
        /// Identified display name
        name: String,
    },
    /// A configuration value is not valid hexadecimal
    #[error("invalid hex value '{0}'")]
    InvalidHex(String),
    /// The configuration file could not be found, read or parsed
    #[error("configuration {}: {source}", .path.display())]
    Config {
        /// Configuration file path
        path: PathBuf,
        /// Underlying error
        source: io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_value_lists_options() {
        let e = Error::UnknownValue {
            feature: "input_source".into(),
            label: "vga".into(),
            options: vec!["dp".into(), "hdmi1".into()],
        };
        assert_eq!(e.to_string(), "invalid value vga for input_source, options: dp, hdmi1");
    }

    #[test]
    fn transport_errors_name_the_bus() {
        let e = Error::PermissionDenied { bus: "/dev/i2c-3".into() };
        assert!(e.to_string().contains("/dev/i2c-3"));
        let e = Error::IoctlFailed {
            bus: "/dev/i2c-3".into(),
            address: 0x37,
            source: io::Error::new(io::ErrorKind::Other, "busy"),
        };
        assert_eq!(e.to_string(), "failed to address 0x37 on /dev/i2c-3: busy");
    }
}
