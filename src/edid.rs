use std::fmt;
use std::path::Path;
use tracing::debug;
use crate::bus::Open;
use crate::delay::Sleep;
use crate::Ddc;

/// Offsets of the four 18-byte display descriptors in a base EDID block.
pub const DESCRIPTOR_OFFSETS: [usize; 4] = [54, 72, 90, 108];

/// Length of a display descriptor.
pub const DESCRIPTOR_LEN: usize = 18;

/// Tag of the display product name descriptor.
pub const TAG_PRODUCT_NAME: u8 = 0xfc;

/// Substrings recognized in EDID blocks without a name descriptor, and the
/// name reported for each. Checked in order.
pub const KNOWN_MODELS: &[(&str, &str)] = &[
    ("U4021QW", "Dell U4021QW"),
    ("DELL", "DELL Monitor"),
];

/// The display name reported by a monitor. Empty when unknown.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct MonitorIdentity(String);

impl MonitorIdentity {
    /// An identity with the given name.
    pub fn new<S: Into<String>>(name: S) -> Self {
        MonitorIdentity(name.into())
    }

    /// The display name.
    pub fn name(&self) -> &str {
        &self.0
    }

    /// Whether no name could be determined.
    pub fn is_unknown(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for MonitorIdentity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Extract the monitor name from a raw EDID block.
///
/// Prefers the product name descriptor, falling back to searching the raw
/// bytes for `KNOWN_MODELS`.
pub fn monitor_name(edid: &[u8]) -> MonitorIdentity {
    let descriptor = DESCRIPTOR_OFFSETS.iter()
        .filter_map(|&offset| edid.get(offset..offset + DESCRIPTOR_LEN))
        .find(|d| d[..4] == [0x00, 0x00, 0x00, TAG_PRODUCT_NAME]);

    if let Some(d) = descriptor {
        let name = String::from_utf8_lossy(&d[5..]);
        let name = name.trim_matches(|c: char| c.is_whitespace() || c == '\0');
        if !name.is_empty() {
            return MonitorIdentity::new(name)
        }
    }

    KNOWN_MODELS.iter()
        .find(|&&(needle, _)| contains(edid, needle.as_bytes()))
        .map(|&(_, name)| MonitorIdentity::new(name))
        .unwrap_or_default()
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

impl<O: Open, S: Sleep> Ddc<O, S> {
    /// Identify the display on `bus` by its EDID.
    ///
    /// An absent or unreadable display is not an error; it yields an unknown
    /// identity.
    pub fn identify(&mut self, bus: &Path) -> MonitorIdentity {
        match self.read_edid(bus) {
            Ok(edid) => monitor_name(&edid),
            Err(e) => {
                debug!(bus = %bus.display(), "no EDID: {}", e);
                MonitorIdentity::default()
            },
        }
    }
}

#[cfg(test)]
pub(crate) fn edid_with_name(name: &str) -> Vec<u8> {
    let mut edid = vec![0u8; 128];
    edid[..8].copy_from_slice(&[0x00, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x00]);
    // serial number descriptor first, name in the second slot
    edid[54..58].copy_from_slice(&[0x00, 0x00, 0x00, 0xff]);
    let slot = 72;
    edid[slot..slot + 4].copy_from_slice(&[0x00, 0x00, 0x00, TAG_PRODUCT_NAME]);
    let text = &mut edid[slot + 5..slot + DESCRIPTOR_LEN];
    for b in text.iter_mut() {
        *b = b' ';
    }
    let len = name.len().min(13);
    text[..len].copy_from_slice(&name.as_bytes()[..len]);
    if len < 13 {
        text[len] = b'\n';
    }
    edid
}
