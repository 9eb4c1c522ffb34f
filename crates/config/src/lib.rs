//! Settings for OSC transports, read from a TOML file.
//!
//! Every key is optional:
//!
//! ```toml
//! [udp]
//! receive_buffer_size = 65536
//!
//! [tcp]
//! max_frame_size = 16777216
//!
//! [decode]
//! max_bundle_depth = 32
//! ```

use std::io::Read;
use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Errors while loading settings.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("reading settings: {0}")]
    Io(#[from] std::io::Error),

    #[error("parsing settings: {0}")]
    Toml(#[from] toml::de::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub udp: UdpSettings,
    pub tcp: TcpSettings,
    pub decode: DecodeSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UdpSettings {
    /// Largest datagram the receiver accepts. Longer datagrams are truncated
    /// by the socket and then fail to decode.
    pub receive_buffer_size: usize,
}

impl Default for UdpSettings {
    fn default() -> Self {
        Self {
            receive_buffer_size: 64 * 1024,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TcpSettings {
    /// Largest frame a stream connection accepts.
    pub max_frame_size: usize,
}

impl Default for TcpSettings {
    fn default() -> Self {
        Self {
            max_frame_size: 16 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DecodeSettings {
    pub max_bundle_depth: usize,
}

impl Default for DecodeSettings {
    fn default() -> Self {
        Self {
            max_bundle_depth: 32,
        }
    }
}

/// Parse settings from TOML text.
pub fn from_str(s: &str) -> Result<Settings, ConfigError> {
    Ok(toml::from_str(s)?)
}

/// Parse settings from a reader.
pub fn load(mut r: impl Read) -> Result<Settings, ConfigError> {
    let mut contents = String::new();
    r.read_to_string(&mut contents)?;
    from_str(&contents)
}

/// Read settings from the TOML file at `path`.
pub fn load_path(path: impl AsRef<Path>) -> Result<Settings, ConfigError> {
    let path = path.as_ref();
    tracing::debug!(path = %path.display(), "loading settings");
    let f = std::fs::File::open(path)?;
    load(f)
}

/// `<config dir>/oscwire/config.toml`, if the platform has a config directory.
pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("oscwire").join("config.toml"))
}

/// Load settings from [`default_path`], falling back to the defaults when
/// there is no such file.
pub fn load_default() -> Result<Settings, ConfigError> {
    match default_path() {
        Some(path) if path.is_file() => load_path(path),
        _ => {
            tracing::debug!("no settings file, using defaults");
            Ok(Settings::default())
        }
    }
}
