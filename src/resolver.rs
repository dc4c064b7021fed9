//! Resolves stream metadata into a single ready-to-play transport.
//!
//! Live items take a manifest URL straight to a live transport. On-demand
//! items go through rendition selection, then dispatch on the chosen
//! rendition's delivery protocol. A rejected rendition fails the whole
//! resolve; no other candidate is tried.
//!
//! Resolving never blocks: on-demand items need a throttling decoder that
//! was initialized beforehand with [`ThrottlingDecoder::init`].

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};

use crate::manifest::{self, ParseError};
use crate::model::{Content, DeliveryProtocol, Rendition, StreamMetadata};
use crate::selector::{select_audio, select_video, DeviceCapabilities};
use crate::throttling::{InitError, ThrottlingDecoder};
use crate::transport::{MediaTag, ResolvedTransport, TransportFactory};

/// Terminal resolve failures. None are retried internally.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("no playable rendition")]
    NoPlayableRendition,

    #[error("unsupported delivery protocol: {0}")]
    UnsupportedDeliveryProtocol(DeliveryProtocol),

    #[error("{0} renditions given as inline manifest text are not supported")]
    UnsupportedInlineManifest(DeliveryProtocol),

    #[error("error when parsing inline DASH manifest")]
    ManifestParse(#[from] ParseError),

    #[error("throttling decoder unavailable")]
    ThrottlingInit(#[from] InitError),
}

/// Which rendition list on-demand items are resolved from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolverMode {
    /// Audio renditions only (background / audio player).
    Audio,
    /// Combined audio+video renditions, or audio when an item has no video.
    Video,
}

/// Stateless resolver; safe to share and call concurrently.
#[derive(Debug, Clone)]
pub struct Resolver {
    factory: TransportFactory,
    mode: ResolverMode,
}

impl Resolver {
    #[must_use]
    pub fn new(mode: ResolverMode, decoder: Arc<ThrottlingDecoder>) -> Self {
        Self {
            factory: TransportFactory::new(decoder),
            mode,
        }
    }

    #[must_use]
    pub fn audio(decoder: Arc<ThrottlingDecoder>) -> Self {
        Self::new(ResolverMode::Audio, decoder)
    }

    #[must_use]
    pub fn video(decoder: Arc<ThrottlingDecoder>) -> Self {
        Self::new(ResolverMode::Video, decoder)
    }

    #[must_use]
    pub fn mode(&self) -> ResolverMode {
        self.mode
    }

    /// Resolve `metadata` into a transport handle.
    pub fn resolve(
        &self,
        metadata: &Arc<StreamMetadata>,
        caps: &DeviceCapabilities,
    ) -> Result<ResolvedTransport, ResolveError> {
        if metadata.stream_type.is_live() {
            return self.resolve_live(metadata);
        }

        let (renditions, index) = self.select(metadata, caps)?;
        let rendition = &renditions[index];
        info!(
            "Resolving {} with rendition #{index}: {} {} {}",
            metadata.id,
            rendition.protocol(),
            rendition.format().name(),
            rendition.quality()
        );

        let tag = MediaTag::new(Arc::clone(metadata), Some(index));
        self.build(rendition, &metadata.cache_key_of(rendition), tag)
    }

    /// Adaptive manifest first, then segmented HTTP. The first present URL
    /// wins; the two are never compared.
    fn resolve_live(
        &self,
        metadata: &Arc<StreamMetadata>,
    ) -> Result<ResolvedTransport, ResolveError> {
        let tag = MediaTag::new(Arc::clone(metadata), None);

        if let Some(url) = non_empty(metadata.dash_mpd_url.as_deref()) {
            debug!("Live DASH manifest for {}", metadata.id);
            return Ok(self.factory.live_dash(url, &metadata.id, tag));
        }
        if let Some(url) = non_empty(metadata.hls_url.as_deref()) {
            debug!("Live HLS playlist for {}", metadata.id);
            return Ok(self.factory.live_hls(url, &metadata.id, tag));
        }

        Err(ResolveError::NoPlayableRendition)
    }

    fn select<'m>(
        &self,
        metadata: &'m StreamMetadata,
        caps: &DeviceCapabilities,
    ) -> Result<(&'m [Rendition], usize), ResolveError> {
        let (renditions, index) = match self.mode {
            ResolverMode::Video if !metadata.video_renditions.is_empty() => (
                metadata.video_renditions.as_slice(),
                select_video(&metadata.video_renditions, caps),
            ),
            _ => (
                metadata.audio_renditions.as_slice(),
                select_audio(&metadata.audio_renditions, caps),
            ),
        };

        match index {
            Some(index) if index < renditions.len() => Ok((renditions, index)),
            _ => Err(ResolveError::NoPlayableRendition),
        }
    }

    fn build(
        &self,
        rendition: &Rendition,
        cache_key: &str,
        tag: MediaTag,
    ) -> Result<ResolvedTransport, ResolveError> {
        let protocol = rendition.protocol();
        let factory = &self.factory;

        let transport = match (protocol, rendition.content()) {
            (DeliveryProtocol::Torrent, _) => {
                return Err(ResolveError::UnsupportedDeliveryProtocol(protocol))
            }
            (DeliveryProtocol::ProgressiveHttp, Content::Url(url)) => {
                factory.progressive(url, cache_key, tag)?
            }
            (DeliveryProtocol::Hls, Content::Url(url)) => factory.hls(url, cache_key, tag)?,
            (DeliveryProtocol::Dash, Content::Url(url)) => factory.dash(url, cache_key, tag)?,
            (DeliveryProtocol::Dash, Content::Manifest(text)) => {
                let base_url = rendition
                    .base_url()
                    .ok_or(ResolveError::UnsupportedInlineManifest(protocol))?;
                let parsed = manifest::parse(text, base_url)?;
                factory.dash_manifest(parsed, cache_key, tag)?
            }
            (DeliveryProtocol::SmoothStreaming, Content::Url(url)) => {
                factory.smooth_streaming(url, cache_key, tag)?
            }
            (
                DeliveryProtocol::ProgressiveHttp
                | DeliveryProtocol::Hls
                | DeliveryProtocol::SmoothStreaming,
                Content::Manifest(_),
            ) => return Err(ResolveError::UnsupportedInlineManifest(protocol)),
        };

        Ok(transport)
    }
}

fn non_empty(url: Option<&str>) -> Option<&str> {
    url.filter(|u| !u.trim().is_empty())
}
