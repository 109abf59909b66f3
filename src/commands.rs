#![allow(missing_docs)]
use std::{fmt, iter};
use crate::{I2C_ADDRESS_DDC_CI, SUB_ADDRESS_DDC_CI};

/// A DDC/CI VCP feature code.
pub type FeatureCode = u8;

/// Largest command payload carried in a single frame.
pub const MAX_PAYLOAD_LEN: usize = 32;

/// XOR seed for outgoing frame checksums: the destination write address.
pub const CHECKSUM_SEED: u8 = (I2C_ADDRESS_DDC_CI as u8) << 1;

/// Opcode marking a VCP feature reply.
pub const VCP_REPLY_OPCODE: u8 = 0x02;

/// Minimum length of a reply worth inspecting.
pub const MIN_REPLY_LEN: usize = 10;

/// A DDC/CI command payload, before framing.
pub trait Command {
    /// Write the payload into `data`, returning the number of bytes written.
    fn encode(&self, data: &mut [u8]) -> usize;

    /// Frame this command for transmission.
    fn frame(&self) -> DdcFrame {
        let mut data = [0u8; MAX_PAYLOAD_LEN];
        let len = self.encode(&mut data);
        DdcFrame::new(&data[..len])
    }
}

/// Request the current value of a VCP feature.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct GetVcpFeature {
    pub code: FeatureCode,
}

impl GetVcpFeature {
    pub fn new(code: FeatureCode) -> Self {
        GetVcpFeature {
            code: code,
        }
    }
}

impl Command for GetVcpFeature {
    fn encode(&self, data: &mut [u8]) -> usize {
        assert!(data.len() >= 2);
        data[0] = 0x01;
        data[1] = self.code;

        2
    }
}

/// Set a VCP feature to a new value.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SetVcpFeature {
    pub code: FeatureCode,
    pub value: u16,
}

impl SetVcpFeature {
    pub fn new(code: FeatureCode, value: u16) -> Self {
        SetVcpFeature {
            code: code,
            value: value,
        }
    }
}

impl Command for SetVcpFeature {
    fn encode(&self, data: &mut [u8]) -> usize {
        assert!(data.len() >= 4);

        data[0] = 0x03;
        data[1] = self.code;
        data[2] = (self.value >> 8) as _;
        data[3] = self.value as _;

        4
    }
}

/// A framed command: `[0x51, 0x80 | len, payload.., checksum]`.
#[derive(Copy, Clone, PartialEq, Eq)]
pub struct DdcFrame {
    data: [u8; MAX_PAYLOAD_LEN + 3],
    len: u8,
}

impl DdcFrame {
    /// Frame a raw payload.
    pub fn new(payload: &[u8]) -> Self {
        assert!(payload.len() <= MAX_PAYLOAD_LEN);

        let mut data = [0u8; MAX_PAYLOAD_LEN + 3];
        data[0] = SUB_ADDRESS_DDC_CI;
        data[1] = 0x80 | payload.len() as u8;
        data[2..2 + payload.len()].copy_from_slice(payload);
        data[2 + payload.len()] = checksum(data[..2 + payload.len()].iter().cloned());

        DdcFrame {
            data: data,
            len: (3 + payload.len()) as u8,
        }
    }

    /// The bytes to put on the wire.
    pub fn bytes(&self) -> &[u8] {
        &self.data[..self.len as usize]
    }

    /// Whether the trailing checksum matches the preceding bytes.
    pub fn is_valid(bytes: &[u8]) -> bool {
        match bytes.split_last() {
            Some((&sum, rest)) => checksum(rest.iter().cloned()) == sum,
            None => false,
        }
    }
}

impl fmt::Debug for DdcFrame {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "DdcFrame({:02x?})", self.bytes())
    }
}

/// XOR fold of `bytes`, seeded with the destination address.
pub fn checksum<I: IntoIterator<Item=u8>>(bytes: I) -> u8 {
    iter::once(CHECKSUM_SEED).chain(bytes).fold(0u8, |sum, v| sum ^ v)
}

/// `[0x51, 0x84, 0x03, vcp, value_hi, value_lo, checksum]`
pub fn encode_set(code: FeatureCode, value: u16) -> DdcFrame {
    SetVcpFeature::new(code, value).frame()
}

/// `[0x51, 0x82, 0x01, vcp, checksum]`
pub fn encode_get(code: FeatureCode) -> DdcFrame {
    GetVcpFeature::new(code).frame()
}

/// Extract the current value of `code` from a VCP reply.
///
/// Firmware differs on whether the reply read back includes the leading
/// source address byte, so two layouts are accepted:
///
/// - a `0x02` reply opcode at some offset `i` with `code` at `i + 2`; the
///   value is big-endian at `i + 6`.
/// - a reply starting with `0x6e`; the value is big-endian at offset 8.
///
/// The opcode scan is tried first. On malformed input both may match, and the
/// scan wins.
pub fn parse_vcp_reply(code: FeatureCode, reply: &[u8]) -> Option<u16> {
    if reply.len() < MIN_REPLY_LEN {
        return None
    }

    let scanned = (0..reply.len() - 7)
        .find(|&i| reply[i] == VCP_REPLY_OPCODE && reply[i + 2] == code)
        .map(|i| be16(reply[i + 6], reply[i + 7]));

    scanned.or_else(|| if reply[0] == CHECKSUM_SEED {
        Some(be16(reply[8], reply[9]))
    } else {
        None
    })
}

fn be16(hi: u8, lo: u8) -> u16 {
    ((hi as u16) << 8) | lo as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_frame_layout() {
        let frame = encode_set(0x60, 0x0f11);
        let sum: u8 = 0x6e ^ 0x51 ^ 0x84 ^ 0x03 ^ 0x60 ^ 0x0f ^ 0x11;
        assert_eq!(frame.bytes(), &[0x51, 0x84, 0x03, 0x60, 0x0f, 0x11, sum]);
        assert!(DdcFrame::is_valid(frame.bytes()));
    }

    #[test]
    fn get_frame_layout() {
        let frame = encode_get(0x60);
        assert_eq!(frame.bytes(), &[0x51, 0x82, 0x01, 0x60, 0x6e ^ 0x51 ^ 0x82 ^ 0x01 ^ 0x60]);
    }

    #[test]
    fn checksum_detects_single_bit_flips() {
        let frame = encode_set(0xe9, 0x0024);
        let bytes = frame.bytes().to_vec();
        assert_eq!(checksum(bytes[..6].iter().cloned()), checksum(bytes[..6].iter().cloned()));

        for byte in 0..bytes.len() {
            for bit in 0..8 {
                let mut corrupt = bytes.clone();
                corrupt[byte] ^= 1 << bit;
                assert!(!DdcFrame::is_valid(&corrupt), "flip of byte {} bit {} accepted", byte, bit);
            }
        }
    }

    #[test]
    fn reply_with_source_address() {
        // 6e 88 02 rc vcp type mh ml sh sl chk
        let reply = [0x6e, 0x88, 0x02, 0x00, 0x60, 0x00, 0x00, 0x12, 0x0f, 0x11, 0x00];
        assert_eq!(parse_vcp_reply(0x60, &reply), Some(0x0f11));
    }

    #[test]
    fn reply_without_source_address() {
        let reply = [0x88, 0x02, 0x00, 0x60, 0x00, 0x00, 0x12, 0x0f, 0x11, 0x00, 0x00];
        assert_eq!(parse_vcp_reply(0x60, &reply), Some(0x0f11));
    }

    #[test]
    fn reply_fallback_on_leading_address() {
        // opcode scan finds nothing for 0x10, but the 0x6e layout still applies
        let reply = [0x6e, 0x88, 0x02, 0x00, 0x60, 0x00, 0x00, 0x12, 0x0f, 0x11];
        assert_eq!(parse_vcp_reply(0x10, &reply), Some(0x0f11));
    }

    #[test]
    fn reply_rejected() {
        assert_eq!(parse_vcp_reply(0x60, &[0x6e, 0x88, 0x02]), None);
        let noise = [0x51, 0x88, 0x02, 0x00, 0x61, 0x00, 0x00, 0x12, 0x0f, 0x11];
        assert_eq!(parse_vcp_reply(0x60, &noise), None);
    }
}
