use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;
use crate::bus::Open;
use crate::config::MonitorConfig;
use crate::delay::Sleep;
use crate::edid::MonitorIdentity;
use crate::registry::match_config;
use crate::{Ddc, Error, Result};

/// Directory holding i2c-dev device nodes.
pub const DEV_DIR: &str = "/dev";

/// File name prefix of i2c-dev device nodes.
pub const DEV_PREFIX: &str = "i2c-";

/// Enumerate the I2C device nodes on the system. Implements an `Iterator`
/// over paths to be passed to the `Ddc` operations.
///
/// Only nodes named `i2c-<number>` are listed, ordered by bus number. Whether
/// a display answers on a bus is left to `discover`.
#[derive(Debug)]
pub struct Enumerator {
    inner: ::std::vec::IntoIter<PathBuf>,
}

impl Enumerator {
    /// Create a new enumerator over `/dev`.
    pub fn new() -> io::Result<Self> {
        Enumerator::in_dir(DEV_DIR)
    }

    /// Create a new enumerator over device nodes in `dir`.
    pub fn in_dir<P: AsRef<Path>>(dir: P) -> io::Result<Self> {
        let mut buses = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let number = entry.file_name().to_str()
                .and_then(|name| bus_number(name));
            if let Some(number) = number {
                buses.push((number, entry.path()));
            }
        }
        buses.sort();

        Ok(Enumerator {
            inner: buses.into_iter().map(|(_, path)| path).collect::<Vec<_>>().into_iter(),
        })
    }
}

fn bus_number(name: &str) -> Option<u32> {
    if !name.starts_with(DEV_PREFIX) {
        return None
    }
    let number = &name[DEV_PREFIX.len()..];
    if number.is_empty() || !number.bytes().all(|b| b.is_ascii_digit()) {
        return None
    }
    number.parse().ok()
}

impl Iterator for Enumerator {
    type Item = PathBuf;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }
}

/// Adapter name prefixes that never carry a display, from ddcutil's
/// `ignorable_i2c_device_sysfs_name`.
pub const IGNORED_ADAPTERS: &[&str] = &[
    "SMBus",
    "soc:i2cdsi",
    "smu",
    "mac-io",
    "u4",
];

/// Whether an adapter with this sysfs `name` should be skipped.
pub fn is_ignored_adapter(name: &[u8]) -> bool {
    IGNORED_ADAPTERS.iter().any(|p| name.starts_with(p.as_bytes()))
}

/// Enumerate i2c-dev nodes through udev, skipping adapters that never carry
/// a display (see `IGNORED_ADAPTERS`).
///
/// # udev dependency
///
/// Requires the `udev` feature enabled to use.
#[cfg(feature = "udev")]
#[derive(Debug)]
pub struct UdevEnumerator {
    inner: ::std::vec::IntoIter<PathBuf>,
}

#[cfg(feature = "udev")]
impl UdevEnumerator {
    /// Create a new enumerator over the `i2c-dev` subsystem.
    pub fn new() -> io::Result<Self> {
        use std::os::unix::ffi::OsStrExt;

        let udev = udev::Context::new()?;
        let mut en = udev::Enumerator::new(&udev)?;
        en.match_subsystem("i2c-dev")?;

        let mut buses = Vec::new();
        for dev in en.scan_devices()? {
            let (devnode, name) = match dev.devnode().and_then(|devnode| dev.attribute_value("name").map(|name| (devnode, name))) {
                Some(v) => v,
                None => continue,
            };

            if is_ignored_adapter(name.as_bytes()) {
                debug!(bus = %devnode.display(), "skipping adapter {:?}", name);
                continue
            }

            buses.push(devnode.to_path_buf());
        }

        Ok(UdevEnumerator {
            inner: buses.into_iter(),
        })
    }
}

#[cfg(feature = "udev")]
impl Iterator for UdevEnumerator {
    type Item = PathBuf;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }
}

/// A display found on a bus.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Device<'a> {
    /// Device node path.
    pub bus: PathBuf,
    /// Name reported by the display.
    pub identity: MonitorIdentity,
    /// Configuration matched against the display name.
    pub config: Option<&'a MonitorConfig>,
}

impl<'a> Device<'a> {
    /// A device on `bus` that was not identified.
    pub fn manual<P: Into<PathBuf>>(bus: P, config: Option<&'a MonitorConfig>) -> Self {
        Device {
            bus: bus.into(),
            identity: MonitorIdentity::new("Manual"),
            config: config,
        }
    }

    /// The bound configuration, or `NoConfigMatched`.
    pub fn config(&self) -> Result<&'a MonitorConfig> {
        self.config.ok_or_else(|| Error::NoConfigMatched {
            bus: self.bus.clone(),
            name: self.identity.name().into(),
        })
    }
}

/// Identify the display on every bus in `buses` and bind its configuration.
///
/// Buses without an identifiable display are skipped.
pub fn discover<'a, O, S, I>(ddc: &mut Ddc<O, S>, buses: I, configs: &'a [MonitorConfig]) -> Vec<Device<'a>> where
    O: Open,
    S: Sleep,
    I: IntoIterator<Item=PathBuf>,
{
    buses.into_iter().filter_map(|bus| {
        let identity = ddc.identify(&bus);
        if identity.is_unknown() {
            return None
        }
        let config = match_config(identity.name(), configs);
        debug!(bus = %bus.display(), name = %identity, model = ?config.map(|c| &c.model), "found display");

        Some(Device {
            bus: bus,
            identity: identity,
            config: config,
        })
    }).collect()
}

/// Choose the device to operate on.
///
/// With an explicit bus, the discovered device on that bus is used, or a
/// manual device bound to the first configuration. Otherwise the first device
/// with a matched configuration wins, then the first device at all, bound to
/// the first configuration.
pub fn select_target<'a>(devices: Vec<Device<'a>>, configs: &'a [MonitorConfig], bus: Option<&Path>) -> Result<Device<'a>> {
    if let Some(bus) = bus {
        let device = devices.into_iter().find(|d| d.bus == bus)
            .unwrap_or_else(|| Device::manual(bus, configs.first()));
        return Ok(device)
    }

    let matched = devices.iter().position(|d| d.config.is_some());
    let mut devices = devices;
    match matched {
        Some(i) => Ok(devices.swap_remove(i)),
        None if !devices.is_empty() => {
            let mut device = devices.swap_remove(0);
            device.config = configs.first();
            Ok(device)
        },
        None => Err(Error::DeviceNotFound {
            bus: PathBuf::from(DEV_DIR).join(format!("{}*", DEV_PREFIX)),
        }),
    }
}
