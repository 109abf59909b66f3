use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};
use tracing::debug;
use crate::{Error, Result};

/// File name searched for in each configuration directory.
pub const CONFIG_FILE_NAME: &str = "monitors.json";

/// Application directory name under the user's configuration directory.
pub const CONFIG_DIR_NAME: &str = "ddc-control";

/// A preset: feature name to value label.
pub type Preset = BTreeMap<String, String>;

/// Configuration for one monitor model.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Human readable model label.
    #[serde(default)]
    pub model: String,
    /// Substring of the EDID display name that selects this entry.
    #[serde(default, rename = "match")]
    pub pattern: String,
    /// Controllable features by name.
    #[serde(default)]
    pub features: BTreeMap<String, FeatureConfig>,
    /// Named presets.
    #[serde(default)]
    pub presets: BTreeMap<String, Preset>,
}

/// A VCP feature and its named values.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureConfig {
    /// VCP code as a hex string, with or without `0x`.
    #[serde(default)]
    pub vcp: String,
    /// Value label to hex value string.
    #[serde(default)]
    pub values: BTreeMap<String, String>,
}

/// Parse a JSON array of monitor configurations.
pub fn parse_configs(data: &str) -> serde_json::Result<Vec<MonitorConfig>> {
    serde_json::from_str(data)
}

/// Load monitor configurations from a JSON file.
pub fn load_configs<P: AsRef<Path>>(path: P) -> Result<Vec<MonitorConfig>> {
    let path = path.as_ref();
    let config_error = |e: io::Error| Error::Config {
        path: path.into(),
        source: e,
    };

    let data = fs::read_to_string(path).map_err(config_error)?;
    let configs = parse_configs(&data).map_err(|e| config_error(e.into()))?;
    debug!(path = %path.display(), "loaded {} monitor configurations", configs.len());
    Ok(configs)
}

/// Locations searched for a configuration file, in order.
///
/// `./monitors.json`, then `ddc-control/monitors.json` under the user's
/// configuration directory (`$XDG_CONFIG_HOME`, usually `~/.config`), then
/// `~/.ddc-control/monitors.json`.
pub fn search_paths() -> Vec<PathBuf> {
    let home = dirs::home_dir();
    let config = dirs::config_dir();

    search_paths_in(home.as_ref().map(|p| p.as_path()), config.as_ref().map(|p| p.as_path()))
}

fn search_paths_in(home: Option<&Path>, xdg: Option<&Path>) -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(CONFIG_FILE_NAME)];
    if let Some(xdg) = xdg {
        paths.push(xdg.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME));
    }
    if let Some(home) = home {
        paths.push(home.join(format!(".{}", CONFIG_DIR_NAME)).join(CONFIG_FILE_NAME));
    }
    paths
}

/// Find the configuration file to load.
///
/// An explicit path must exist. Otherwise the first existing entry of
/// `search_paths` is used.
pub fn find_config_file(explicit: Option<&Path>) -> Result<PathBuf> {
    match explicit {
        Some(path) => first_existing(Some(path.to_path_buf())).ok_or_else(|| not_found(path)),
        None => first_existing(search_paths()).ok_or_else(|| not_found(Path::new(CONFIG_FILE_NAME))),
    }
}

fn first_existing<I: IntoIterator<Item=PathBuf>>(paths: I) -> Option<PathBuf> {
    paths.into_iter().find(|p| p.is_file())
}

fn not_found(path: &Path) -> Error {
    Error::Config {
        path: path.into(),
        source: io::Error::new(io::ErrorKind::NotFound, "configuration file not found"),
    }
}

#[cfg(test)]
pub(crate) fn sample_config() -> MonitorConfig {
    parse_configs(SAMPLE).unwrap().remove(0)
}

#[cfg(test)]
pub(crate) const SAMPLE: &str = r#"[
    {
        "model": "Dell U4021QW",
        "match": "U4021QW",
        "features": {
            "input_source": { "vcp": "0x60", "values": { "dp": "0x0f", "hdmi1": "0x11", "tb": "0x1b" } },
            "pbp_mode": { "vcp": "0xE9", "values": { "off": "0x00", "on": "0x24" } },
            "pbp_sub_input": { "vcp": "E8", "values": { "dp": "0F0F", "hdmi1": "0x0F11" } },
            "usb_selection": { "vcp": "0xE7", "values": { "usb1": "0x0000", "tb": "0x0001" } }
        },
        "presets": {
            "work": { "pbp_mode": "off", "input_source": "tb", "usb_selection": "tb" },
            "split": { "pbp_mode": "on", "input_source": "dp", "pbp_sub_input": "hdmi1" }
        }
    },
    {
        "model": "Generic Dell",
        "match": "dell"
    }
]"#;
