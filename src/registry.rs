use crate::commands::FeatureCode;
use crate::config::{FeatureConfig, MonitorConfig};
use crate::{Error, Result};

/// Parse a hex string with or without a `0x` prefix as a VCP code.
///
/// Zero is a valid code, so malformed input is always an error.
pub fn parse_hex_u8(s: &str) -> Result<u8> {
    u8::from_str_radix(strip_radix(s)?, 16).map_err(|_| Error::InvalidHex(s.into()))
}

/// Parse a hex string with or without a `0x` prefix as a VCP value.
pub fn parse_hex_u16(s: &str) -> Result<u16> {
    u16::from_str_radix(strip_radix(s)?, 16).map_err(|_| Error::InvalidHex(s.into()))
}

fn strip_radix(s: &str) -> Result<&str> {
    let t = s.trim();
    let t = if t.starts_with("0x") || t.starts_with("0X") { &t[2..] } else { t };
    // from_str_radix would accept a sign
    if t.is_empty() || !t.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(Error::InvalidHex(s.into()))
    }
    Ok(t)
}

/// The first configuration whose match pattern occurs in `name`, ignoring
/// case.
pub fn match_config<'a>(name: &str, configs: &'a [MonitorConfig]) -> Option<&'a MonitorConfig> {
    let name = name.to_uppercase();
    configs.iter().find(|c| name.contains(&c.pattern.to_uppercase()))
}

impl MonitorConfig {
    /// Look up a feature by name.
    pub fn feature(&self, feature: &str) -> Result<&FeatureConfig> {
        self.features.get(feature).ok_or_else(|| Error::UnknownFeature {
            model: self.model.clone(),
            feature: feature.into(),
        })
    }

    /// Resolve a feature name and value label to a VCP code and value.
    ///
    /// The label is matched ignoring case.
    pub fn resolve(&self, feature: &str, label: &str) -> Result<(FeatureCode, u16)> {
        let config = self.feature(feature)?;
        let value = config.values.iter()
            .find(|&(l, _)| l.eq_ignore_ascii_case(label))
            .map(|(_, v)| v)
            .ok_or_else(|| Error::UnknownValue {
                feature: feature.into(),
                label: label.into(),
                options: config.values.keys().cloned().collect(),
            })?;

        Ok((parse_hex_u8(&config.vcp)?, parse_hex_u16(value)?))
    }

    /// The label configured for `value` of `feature`, if any.
    pub fn label_for(&self, feature: &str, value: u16) -> Option<&str> {
        self.features.get(feature)?.values.iter()
            .find(|&(_, v)| parse_hex_u16(v).ok() == Some(value))
            .map(|(l, _)| l.as_str())
    }
}
