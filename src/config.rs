//! Resolver configuration loaded from `~/.config/streamres/config.toml`.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::model::MediaFormat;
use crate::selector::{DeviceCapabilities, AUDIO_FORMAT_ORDER, VIDEO_FORMAT_ORDER};
use crate::throttling::DEFAULT_BOOTSTRAP_ID;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TOML in {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Audio rendition preferences.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub preferred_format: MediaFormat,
    /// Formats the device can play; empty means all audio formats.
    pub supported_formats: Vec<MediaFormat>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    pub preferred_format: MediaFormat,
    pub supported_formats: Vec<MediaFormat>,
    /// Upper bound on rendition height.
    pub max_height: Option<u32>,
}

/// Top-level configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Opaque id of the embed page the player script is discovered from.
    pub bootstrap_id: String,
    /// Pre-fetched player script; skips the network fetch when set.
    pub player_script: Option<PathBuf>,
    pub audio: AudioConfig,
    pub video: VideoConfig,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            preferred_format: MediaFormat::M4a,
            supported_formats: Vec::new(),
        }
    }
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            preferred_format: MediaFormat::Mpeg4,
            supported_formats: Vec::new(),
            max_height: None,
        }
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            bootstrap_id: DEFAULT_BOOTSTRAP_ID.to_string(),
            player_script: None,
            audio: AudioConfig::default(),
            video: VideoConfig::default(),
        }
    }
}

impl ResolverConfig {
    /// Load from the default location.
    ///
    /// Returns defaults if the file doesn't exist.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&config_path())
    }

    /// Load from `path`; a missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Device capabilities for callers that do not supply their own.
    #[must_use]
    pub fn capabilities(&self) -> DeviceCapabilities {
        let mut supported = family_formats(&self.audio.supported_formats, &AUDIO_FORMAT_ORDER);
        for format in family_formats(&self.video.supported_formats, &VIDEO_FORMAT_ORDER) {
            if !supported.contains(&format) {
                supported.push(format);
            }
        }

        DeviceCapabilities {
            supported_formats: supported,
            preferred_audio_format: self.audio.preferred_format,
            preferred_video_format: self.video.preferred_format,
            max_height: self.video.max_height,
        }
    }
}

/// Empty means every known format of the family.
fn family_formats(configured: &[MediaFormat], all: &[MediaFormat]) -> Vec<MediaFormat> {
    if configured.is_empty() {
        all.to_vec()
    } else {
        configured.to_vec()
    }
}

/// Return the path to the config file.
#[must_use]
pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("streamres")
        .join("config.toml")
}
