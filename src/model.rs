//! Stream metadata types consumed by the resolver.
//!
//! A [`StreamMetadata`] is produced by an external extraction stage and is
//! read-only from the point of view of this crate. Each [`Rendition`] is
//! validated at construction time (including when deserialized), so the
//! resolver never sees an adaptive manifest without a base URL.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Transport mechanism used to fetch a rendition's media data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryProtocol {
    /// Plain progressive download over HTTP(S).
    ProgressiveHttp,
    /// Segmented HTTP streaming (HLS playlists).
    Hls,
    /// Adaptive manifest streaming (DASH MPD).
    Dash,
    /// Microsoft Smooth Streaming.
    SmoothStreaming,
    /// Peer-to-peer delivery. Never playable here.
    Torrent,
}

impl DeliveryProtocol {
    /// Returns `true` if the media data is fetched over HTTP(S).
    #[must_use]
    pub fn is_http(self) -> bool {
        !matches!(self, Self::Torrent)
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::ProgressiveHttp => "progressive-http",
            Self::Hls => "hls",
            Self::Dash => "dash",
            Self::SmoothStreaming => "smooth-streaming",
            Self::Torrent => "torrent",
        }
    }
}

impl fmt::Display for DeliveryProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Container/codec family of a rendition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaFormat {
    Mpeg4,
    #[serde(rename = "webm")]
    WebM,
    #[serde(rename = "3gpp")]
    ThreeGpp,
    M4a,
    #[serde(rename = "webma")]
    WebmAudio,
    Mp3,
    Opus,
}

impl MediaFormat {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Mpeg4 => "MPEG-4",
            Self::WebM => "WebM",
            Self::ThreeGpp => "3GPP",
            Self::M4a => "m4a",
            Self::WebmAudio => "WebM",
            Self::Mp3 => "MP3",
            Self::Opus => "opus",
        }
    }

    /// File suffix, also used as the format component of cache keys.
    #[must_use]
    pub fn suffix(self) -> &'static str {
        match self {
            Self::Mpeg4 => "mp4",
            Self::WebM => "webm",
            Self::ThreeGpp => "3gp",
            Self::M4a => "m4a",
            Self::WebmAudio => "webm",
            Self::Mp3 => "mp3",
            Self::Opus => "opus",
        }
    }

    #[must_use]
    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Mpeg4 => "video/mp4",
            Self::WebM => "video/webm",
            Self::ThreeGpp => "video/3gpp",
            Self::M4a => "audio/mp4",
            Self::WebmAudio => "audio/webm",
            Self::Mp3 => "audio/mpeg",
            Self::Opus => "audio/opus",
        }
    }

    #[must_use]
    pub fn is_audio(self) -> bool {
        matches!(self, Self::M4a | Self::WebmAudio | Self::Mp3 | Self::Opus)
    }
}

/// Live / on-demand classification of a stream item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamType {
    None,
    VideoStream,
    AudioStream,
    LiveStream,
    AudioLiveStream,
    PostLiveStream,
    PostLiveAudioStream,
}

impl StreamType {
    /// Live and live-only items take the manifest URL branch.
    ///
    /// Post-live items are finished recordings and resolve like on-demand.
    #[must_use]
    pub fn is_live(self) -> bool {
        matches!(self, Self::LiveStream | Self::AudioLiveStream)
    }
}

/// Quality descriptor used for selection and cache keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Quality {
    Audio {
        /// Average bitrate in kbit/s.
        bitrate_kbps: u32,
    },
    Video {
        height: u32,
        #[serde(default = "default_fps")]
        fps: u32,
    },
}

fn default_fps() -> u32 {
    30
}

impl Quality {
    /// Sort key: higher is better.
    #[must_use]
    pub fn rank(self) -> (u32, u32) {
        match self {
            Self::Audio { bitrate_kbps } => (bitrate_kbps, 0),
            Self::Video { height, fps } => (height, fps),
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Audio { bitrate_kbps } => write!(f, "{bitrate_kbps}kbps"),
            Self::Video { height, fps } if fps > 30 => write!(f, "{height}p{fps}"),
            Self::Video { height, .. } => write!(f, "{height}p"),
        }
    }
}

/// Where a rendition's data lives: behind a URL, or inline manifest text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Content {
    Url(String),
    Manifest(String),
}

impl Content {
    #[must_use]
    pub fn is_url(&self) -> bool {
        matches!(self, Self::Url(_))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Url(s) | Self::Manifest(s) => s,
        }
    }
}

/// Rendition construction errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenditionError {
    #[error("inline {0} manifest requires a base URL")]
    MissingBaseUrl(DeliveryProtocol),

    #[error("rendition content is empty")]
    EmptyContent,
}

/// One concrete encoded variant of a stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawRendition")]
pub struct Rendition {
    protocol: DeliveryProtocol,
    content: Content,
    base_url: Option<String>,
    format: MediaFormat,
    quality: Quality,
}

impl Rendition {
    /// Build a rendition, enforcing that inline DASH text carries a base URL.
    pub fn new(
        protocol: DeliveryProtocol,
        content: Content,
        base_url: Option<String>,
        format: MediaFormat,
        quality: Quality,
    ) -> Result<Self, RenditionError> {
        if content.as_str().trim().is_empty() {
            return Err(RenditionError::EmptyContent);
        }
        let base_url = base_url.filter(|b| !b.trim().is_empty());
        if protocol == DeliveryProtocol::Dash && !content.is_url() && base_url.is_none() {
            return Err(RenditionError::MissingBaseUrl(protocol));
        }

        Ok(Self {
            protocol,
            content,
            base_url,
            format,
            quality,
        })
    }

    /// Shorthand for a progressive HTTP rendition behind `url`.
    pub fn progressive(
        url: impl Into<String>,
        format: MediaFormat,
        quality: Quality,
    ) -> Result<Self, RenditionError> {
        Self::new(
            DeliveryProtocol::ProgressiveHttp,
            Content::Url(url.into()),
            None,
            format,
            quality,
        )
    }

    #[must_use]
    pub fn protocol(&self) -> DeliveryProtocol {
        self.protocol
    }

    #[must_use]
    pub fn content(&self) -> &Content {
        &self.content
    }

    #[must_use]
    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    #[must_use]
    pub fn format(&self) -> MediaFormat {
        self.format
    }

    #[must_use]
    pub fn quality(&self) -> Quality {
        self.quality
    }
}

#[derive(Deserialize)]
struct RawRendition {
    protocol: DeliveryProtocol,
    content: Content,
    #[serde(default)]
    base_url: Option<String>,
    format: MediaFormat,
    quality: Quality,
}

impl TryFrom<RawRendition> for Rendition {
    type Error = RenditionError;

    fn try_from(raw: RawRendition) -> Result<Self, Self::Error> {
        Self::new(raw.protocol, raw.content, raw.base_url, raw.format, raw.quality)
    }
}

/// Immutable description of one playable item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamMetadata {
    /// Stable identity (usually the canonical page URL), used for cache keys.
    pub id: String,
    #[serde(default)]
    pub title: String,
    pub stream_type: StreamType,
    #[serde(default)]
    pub audio_renditions: Vec<Rendition>,
    /// Renditions carrying both audio and video.
    #[serde(default)]
    pub video_renditions: Vec<Rendition>,
    #[serde(default)]
    pub dash_mpd_url: Option<String>,
    #[serde(default)]
    pub hls_url: Option<String>,
}

impl StreamMetadata {
    #[must_use]
    pub fn new(id: impl Into<String>, stream_type: StreamType) -> Self {
        Self {
            id: id.into(),
            title: String::new(),
            stream_type,
            audio_renditions: Vec::new(),
            video_renditions: Vec::new(),
            dash_mpd_url: None,
            hls_url: None,
        }
    }

    /// Cache key for one of this item's renditions.
    #[must_use]
    pub fn cache_key_of(&self, rendition: &Rendition) -> String {
        format!(
            "{} {} {}",
            self.id,
            rendition.quality(),
            rendition.format().suffix()
        )
    }
}
