use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use i2c::{Address, ReadWrite};
use tracing::trace;
use crate::{Error, Result};

/// An I2C device usable as a DDC/CI transport.
///
/// Implemented for anything providing the `i2c` addressing and raw
/// read/write traits with `io::Error` failures.
pub trait I2cDevice: i2c::Address + i2c::ReadWrite + i2c::Master<Error = io::Error> { }

impl<T> I2cDevice for T where T: i2c::Address + i2c::ReadWrite + i2c::Master<Error = io::Error> { }

/// Opens I2C device nodes.
pub trait Open {
    /// The open device type.
    type Device: I2cDevice;

    /// Open the device node at `path` for reading and writing.
    fn open(&self, path: &Path) -> io::Result<Self::Device>;
}

impl<'a, O: Open + ?Sized> Open for &'a O {
    type Device = O::Device;

    fn open(&self, path: &Path) -> io::Result<Self::Device> {
        (**self).open(path)
    }
}

/// Opens Linux i2c-dev character devices.
#[derive(Copy, Clone, Debug, Default)]
pub struct LinuxI2c;

impl Open for LinuxI2c {
    type Device = i2c_linux::I2c<File>;

    fn open(&self, path: &Path) -> io::Result<Self::Device> {
        i2c_linux::I2c::from_path(path)
    }
}

/// An open, exclusively owned handle to one bus.
///
/// The device node is closed when the handle is dropped.
#[derive(Debug)]
pub struct BusHandle<D> {
    path: PathBuf,
    inner: D,
}

impl<D: I2cDevice> BusHandle<D> {
    /// Open the bus at `path`.
    pub fn open<O: Open<Device = D> + ?Sized>(opener: &O, path: &Path) -> Result<Self> {
        let inner = opener.open(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => Error::DeviceNotFound { bus: path.into() },
            io::ErrorKind::PermissionDenied => Error::PermissionDenied { bus: path.into() },
            _ => Error::Open { bus: path.into(), source: e },
        })?;
        trace!(bus = %path.display(), "opened");

        Ok(BusHandle {
            path: path.into(),
            inner: inner,
        })
    }

    /// The device node path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bind subsequent reads and writes to a 7-bit slave address.
    pub fn address(&mut self, address: u16) -> Result<()> {
        self.inner.set_slave_address(address, false).map_err(|e| Error::IoctlFailed {
            bus: self.path.clone(),
            address: address,
            source: e,
        })
    }

    /// Write raw bytes to the addressed slave.
    pub fn write(&mut self, data: &[u8]) -> Result<()> {
        trace!(bus = %self.path.display(), ?data, "write");
        self.inner.i2c_write(data).map_err(|e| Error::IoWrite {
            bus: self.path.clone(),
            source: e,
        })
    }

    /// Read up to `data.len()` bytes from the addressed slave.
    pub fn read(&mut self, data: &mut [u8]) -> Result<usize> {
        let len = self.inner.i2c_read(data).map_err(|e| Error::IoRead {
            bus: self.path.clone(),
            source: e,
        })?;
        trace!(bus = %self.path.display(), data = ?&data[..len], "read");
        Ok(len)
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use super::mock::MockBus;

    #[test]
    fn open_maps_missing_and_denied() {
        let bus = MockBus::new();
        bus.state.borrow_mut().missing.insert("/dev/i2c-9".into());
        bus.state.borrow_mut().denied.insert("/dev/i2c-8".into());

        match BusHandle::open(&bus, Path::new("/dev/i2c-9")) {
            Err(Error::DeviceNotFound { bus }) => assert_eq!(bus, Path::new("/dev/i2c-9")),
            other => panic!("unexpected {:?}", other),
        }
        match BusHandle::open(&bus, Path::new("/dev/i2c-8")) {
            Err(Error::PermissionDenied { .. }) => (),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn handle_released_on_drop() {
        let bus = MockBus::new();
        {
            let mut handle = BusHandle::open(&bus, Path::new("/dev/i2c-1")).unwrap();
            handle.address(crate::I2C_ADDRESS_DDC_CI).unwrap();
            handle.write(&[1, 2, 3]).unwrap();
            assert_eq!(bus.state.borrow().live, 1);
        }
        assert_eq!(bus.state.borrow().live, 0);
        assert_eq!(bus.written()[0].address, 0x37);
    }

    #[test]
    fn write_error_carries_path() {
        let bus = MockBus::new();
        bus.state.borrow_mut().write_failures = 1;
        let mut handle = BusHandle::open(&bus, Path::new("/dev/i2c-2")).unwrap();
        handle.address(crate::I2C_ADDRESS_DDC_CI).unwrap();
        match handle.write(&[0]) {
            Err(Error::IoWrite { bus, .. }) => assert_eq!(bus, Path::new("/dev/i2c-2")),
            other => panic!("unexpected {:?}", other),
        }
    }
}
