#![deny(missing_docs)]

//! Control displays using the DDC/CI protocol: switch inputs, picture-by-picture
//! layouts and USB routing from named presets.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::path::Path;
//! use ddc_control::Ddc;
//!
//! let mut ddc = Ddc::linux();
//! let bus = Path::new("/dev/i2c-4");
//! println!("Monitor: {}", ddc.identify(bus));
//! let input = ddc.get_vcp(bus, 0x60).unwrap();
//! println!("Monitor input: 0x{:04x}", input);
//! ```
//!
//! # Concurrency
//!
//! Each operation opens the device node, addresses the slave and closes it
//! again. Nothing prevents another process from using the same bus at the
//! same time; interleaved transfers will corrupt each other's frames.

/// EDID EEPROM I2C address
pub const I2C_ADDRESS_EDID: u16 = 0x50;

/// DDC/CI command and control I2C address
pub const I2C_ADDRESS_DDC_CI: u16 = 0x37;

/// DDC sub-address command prefix
pub const SUB_ADDRESS_DDC_CI: u8 = 0x51;

/// Raw bus access.
pub mod bus;
pub use bus::{BusHandle, I2cDevice, LinuxI2c, Open};

/// DDC/CI command framing and reply parsing.
pub mod commands;
pub use commands::{Command, DdcFrame, FeatureCode};

/// Monitor configuration files.
pub mod config;
pub use config::{FeatureConfig, MonitorConfig, Preset};

/// Retry and settle timing.
pub mod delay;
pub use delay::{RetryPolicy, Sleep, ThreadSleep};

/// Display identification from EDID.
pub mod edid;
pub use edid::MonitorIdentity;

/// Display discovery and target selection.
pub mod enumerate;
pub use enumerate::{Device, Enumerator};
#[cfg(feature = "udev")]
pub use enumerate::UdevEnumerator;

mod error;
pub use error::{Error, Result};

mod i2c_ddc;
pub use i2c_ddc::{Ddc, EDID_LEN, READ_RETRY, WRITE_RETRY};

pub mod preset;
pub use preset::{Report, Sequencer, SettleTimes};

/// Feature and value lookup.
pub mod registry;
pub use registry::{match_config, parse_hex_u16, parse_hex_u8};
