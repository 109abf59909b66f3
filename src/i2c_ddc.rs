use std::path::Path;
use std::time::Duration;
use tracing::debug;
use crate::bus::{BusHandle, LinuxI2c, Open};
use crate::commands::{self, FeatureCode};
use crate::delay::{RetryPolicy, Sleep, ThreadSleep};
use crate::{Error, Result, I2C_ADDRESS_DDC_CI, I2C_ADDRESS_EDID};

/// Attempts and spacing for SET writes.
pub const WRITE_RETRY: RetryPolicy = RetryPolicy {
    attempts: 3,
    delay: Duration::from_millis(200),
};

/// Read cycles after a GET request, each preceded by the delay.
pub const READ_RETRY: RetryPolicy = RetryPolicy {
    attempts: 2,
    delay: Duration::from_millis(150),
};

/// Bytes requested when reading a VCP reply.
pub const REPLY_BUFFER_LEN: usize = 16;

/// Length of the base EDID block.
pub const EDID_LEN: usize = 0x80;

/// DDC/CI operations over I2C device nodes.
///
/// Every operation opens the bus, addresses the slave, transfers and closes
/// it again. No handle outlives a single call.
#[derive(Clone, Debug)]
pub struct Ddc<O = LinuxI2c, S = ThreadSleep> {
    opener: O,
    sleep: S,
    write_retry: RetryPolicy,
    read_retry: RetryPolicy,
}

impl Ddc {
    /// DDC/CI over Linux i2c-dev nodes with real sleeps.
    pub fn linux() -> Self {
        Ddc::new(LinuxI2c, ThreadSleep)
    }
}

impl<O: Open, S: Sleep> Ddc<O, S> {
    /// Create a new DDC/CI driver with the default retry policies.
    pub fn new(opener: O, sleep: S) -> Self {
        Ddc {
            opener: opener,
            sleep: sleep,
            write_retry: WRITE_RETRY,
            read_retry: READ_RETRY,
        }
    }

    /// Replace the policy used for SET writes.
    pub fn with_write_retry(mut self, policy: RetryPolicy) -> Self {
        self.write_retry = policy;
        self
    }

    /// Replace the policy used for GET reply reads.
    pub fn with_read_retry(mut self, policy: RetryPolicy) -> Self {
        self.read_retry = policy;
        self
    }

    /// Borrow the sleeper.
    pub fn sleeper(&self) -> &S {
        &self.sleep
    }

    /// Block for `duration` using this driver's sleeper.
    pub fn sleep(&mut self, duration: Duration) {
        self.sleep.sleep(duration)
    }

    fn open(&self, bus: &Path, address: u16) -> Result<BusHandle<O::Device>> {
        let mut handle = BusHandle::open(&self.opener, bus)?;
        handle.address(address)?;
        Ok(handle)
    }

    /// Set a VCP feature.
    ///
    /// The write is retried per the write policy; no read-back verification
    /// is performed.
    pub fn set_vcp(&mut self, bus: &Path, code: FeatureCode, value: u16) -> Result<()> {
        let mut handle = self.open(bus, I2C_ADDRESS_DDC_CI)?;
        let frame = commands::encode_set(code, value);
        debug!(bus = %bus.display(), "writing VCP 0x{:02x} value 0x{:04x}: {:02x?}", code, value, frame.bytes());

        let policy = self.write_retry;
        policy.retry(&mut self.sleep, |attempt| {
            if attempt > 0 {
                debug!(bus = %bus.display(), "retrying write (attempt {})", attempt + 1);
            }
            handle.write(frame.bytes()).map_err(|e| {
                debug!(bus = %bus.display(), "write attempt {} failed: {}", attempt + 1, e);
                e
            })
        })
    }

    /// Read the current value of a VCP feature.
    pub fn get_vcp(&mut self, bus: &Path, code: FeatureCode) -> Result<u16> {
        let mut handle = self.open(bus, I2C_ADDRESS_DDC_CI)?;
        let frame = commands::encode_get(code);
        debug!(bus = %bus.display(), "requesting VCP 0x{:02x}: {:02x?}", code, frame.bytes());
        handle.write(frame.bytes())?;

        let policy = self.read_retry;
        policy.poll(&mut self.sleep, |attempt| {
            let mut reply = [0u8; REPLY_BUFFER_LEN];
            match handle.read(&mut reply) {
                Ok(len) => {
                    debug!(bus = %bus.display(), "reply {}: {:02x?}", attempt + 1, &reply[..len]);
                    commands::parse_vcp_reply(code, &reply[..len])
                },
                Err(e) => {
                    debug!(bus = %bus.display(), "reply {} failed: {}", attempt + 1, e);
                    None
                },
            }
        }).ok_or_else(|| Error::NoReply {
            bus: bus.into(),
            vcp: code,
        })
    }

    /// Read every code in `codes`, returning those that answered.
    ///
    /// Codes the display does not answer are skipped. Any other failure, such
    /// as a bus that cannot be opened, aborts the scan.
    pub fn scan<I: IntoIterator<Item=FeatureCode>>(&mut self, bus: &Path, codes: I) -> Result<Vec<(FeatureCode, u16)>> {
        let mut found = Vec::new();
        for code in codes {
            match self.get_vcp(bus, code) {
                Ok(value) => found.push((code, value)),
                Err(Error::NoReply { .. }) => (),
                Err(e) => return Err(e),
            }
        }
        Ok(found)
    }

    /// Read the base EDID block of the display on `bus`.
    pub fn read_edid(&mut self, bus: &Path) -> Result<Vec<u8>> {
        let mut handle = self.open(bus, I2C_ADDRESS_EDID)?;
        let mut edid = vec![0u8; EDID_LEN];
        let len = handle.read(&mut edid)?;
        edid.truncate(len);
        Ok(edid)
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use super::*;
    use crate::bus::mock::MockBus;
    use crate::delay::RecordSleep;

    fn ddc(bus: &MockBus) -> Ddc<MockBus, RecordSleep> {
        Ddc::new(bus.clone(), RecordSleep::default())
    }

    #[test]
    fn set_writes_frame_once() {
        let bus = MockBus::new();
        let mut ddc = ddc(&bus);
        ddc.set_vcp(Path::new("/dev/i2c-4"), 0x60, 0x0f11).unwrap();

        let written = bus.written();
        assert_eq!(written.len(), 1);
        assert_eq!(written[0].address, I2C_ADDRESS_DDC_CI);
        assert_eq!(written[0].data, commands::encode_set(0x60, 0x0f11).bytes());
        assert!(ddc.sleeper().slept.is_empty());
        assert_eq!(bus.state.borrow().live, 0);
    }

    #[test]
    fn set_retries_then_succeeds() {
        let bus = MockBus::new();
        bus.state.borrow_mut().write_failures = 2;
        let mut ddc = ddc(&bus);
        ddc.set_vcp(Path::new("/dev/i2c-4"), 0x60, 0x11).unwrap();

        assert_eq!(bus.written().len(), 3);
        assert_eq!(ddc.sleeper().slept, vec![Duration::from_millis(200); 2]);
        assert_eq!(bus.state.borrow().opened, 1);
    }

    #[test]
    fn set_gives_up_after_three_attempts() {
        let bus = MockBus::new();
        bus.state.borrow_mut().write_failures = 5;
        let mut ddc = ddc(&bus);
        match ddc.set_vcp(Path::new("/dev/i2c-4"), 0x60, 0x11) {
            Err(Error::IoWrite { .. }) => (),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(bus.written().len(), 3);
        assert_eq!(bus.state.borrow().live, 0);
    }

    #[test]
    fn get_parses_second_reply() {
        let bus = MockBus::new();
        bus.state.borrow_mut().replies.push_back(Err(io::Error::new(io::ErrorKind::Other, "busy")));
        bus.reply(vec![0x6e, 0x88, 0x02, 0x00, 0xe9, 0x00, 0x00, 0xff, 0x00, 0x24, 0x00]);
        let mut ddc = ddc(&bus);

        assert_eq!(ddc.get_vcp(Path::new("/dev/i2c-4"), 0xe9).unwrap(), 0x0024);
        assert_eq!(bus.written()[0].data, commands::encode_get(0xe9).bytes());
        assert_eq!(ddc.sleeper().slept, vec![Duration::from_millis(150); 2]);
    }

    #[test]
    fn get_layouts_agree() {
        let bus = MockBus::new();
        bus.reply(vec![0x6e, 0x88, 0x02, 0x00, 0x60, 0x00, 0x00, 0x12, 0x00, 0x0f, 0x00]);
        bus.reply(vec![0x88, 0x02, 0x00, 0x60, 0x00, 0x00, 0x12, 0x00, 0x0f, 0x00, 0x00]);
        let mut ddc = ddc(&bus);

        let with = ddc.get_vcp(Path::new("/dev/i2c-4"), 0x60).unwrap();
        let without = ddc.get_vcp(Path::new("/dev/i2c-4"), 0x60).unwrap();
        assert_eq!(with, 0x000f);
        assert_eq!(with, without);
    }

    #[test]
    fn get_without_reply() {
        let bus = MockBus::new();
        bus.reply(vec![0x00; 4]);
        let mut ddc = ddc(&bus);
        match ddc.get_vcp(Path::new("/dev/i2c-4"), 0x60) {
            Err(Error::NoReply { vcp: 0x60, .. }) => (),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn scan_skips_silent_codes() {
        let bus = MockBus::new();
        bus.reply(vec![0x6e, 0x88, 0x02, 0x00, 0xe0, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00]);
        let mut ddc = ddc(&bus);
        let found = ddc.scan(Path::new("/dev/i2c-4"), 0xe0..=0xe1).unwrap();
        assert_eq!(found, vec![(0xe0, 0x0001)]);
    }

    #[test]
    fn scan_reports_unopenable_bus() {
        let bus = MockBus::new();
        bus.state.borrow_mut().missing.insert("/dev/i2c-9".into());
        let mut ddc = ddc(&bus);
        match ddc.scan(Path::new("/dev/i2c-9"), 0xe0..=0xf2) {
            Err(Error::DeviceNotFound { .. }) => (),
            other => panic!("unexpected {:?}", other),
        }
        assert!(ddc.sleeper().slept.is_empty());
    }

    #[test]
    fn set_does_not_retry_address_failure() {
        let bus = MockBus::new();
        bus.state.borrow_mut().failing_address = true;
        let mut ddc = ddc(&bus);
        match ddc.set_vcp(Path::new("/dev/i2c-4"), 0x60, 0x11) {
            Err(Error::IoctlFailed { address, .. }) => assert_eq!(address, I2C_ADDRESS_DDC_CI),
            other => panic!("unexpected {:?}", other),
        }
        assert!(bus.written().is_empty());
        assert!(ddc.sleeper().slept.is_empty());
        assert_eq!(bus.state.borrow().opened, 1);
        assert_eq!(bus.state.borrow().live, 0);
    }

    #[test]
    fn set_does_not_retry_open_failure() {
        let bus = MockBus::new();
        bus.state.borrow_mut().denied.insert("/dev/i2c-4".into());
        let mut ddc = ddc(&bus);
        match ddc.set_vcp(Path::new("/dev/i2c-4"), 0x60, 0x11) {
            Err(Error::PermissionDenied { .. }) => (),
            other => panic!("unexpected {:?}", other),
        }
        assert!(ddc.sleeper().slept.is_empty());
        assert_eq!(bus.state.borrow().opened, 0);
    }

    #[test]
    fn get_does_not_retry_address_failure() {
        let bus = MockBus::new();
        bus.state.borrow_mut().failing_address = true;
        bus.reply(vec![0x6e, 0x88, 0x02, 0x00, 0x60, 0x00, 0x00, 0x12, 0x00, 0x0f, 0x00]);
        let mut ddc = ddc(&bus);
        match ddc.get_vcp(Path::new("/dev/i2c-4"), 0x60) {
            Err(Error::IoctlFailed { .. }) => (),
            other => panic!("unexpected {:?}", other),
        }
        assert!(bus.written().is_empty());
        assert!(ddc.sleeper().slept.is_empty());
        assert_eq!(bus.state.borrow().replies.len(), 1);
    }
}
