//! Transport factory and resolved transport handles.
//!
//! Every retry budget, live-edge offset and throttling decision lives in
//! [`TransportFactory`]. Callers pick a builder; they never configure the
//! policy themselves.

use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::manifest::ManifestModel;
use crate::model::{DeliveryProtocol, StreamMetadata};
use crate::throttling::{InitError, ThrottlingDecoder, ThrottlingState};

/// Live manifests that keep failing mean a dead stream, not a blip.
pub const LIVE_MANIFEST_MIN_RETRIES: u32 = 5;

/// Default budget for on-demand segmented/adaptive loads.
pub const ON_DEMAND_MIN_RETRIES: u32 = 3;

/// Playback stays at least this far behind the live edge.
pub const LIVE_EDGE_OFFSET: Duration = Duration::from_millis(10_000);

/// How often a failed load is retried before the error surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RetryPolicy {
    Bounded { min_retries: u32 },
    /// Retry everything except permanent failures (404, out of data).
    Unlimited,
}

/// What the transport will fetch first.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportSource {
    Url(String),
    /// Inline manifest, already parsed; no manifest request is made.
    Manifest(Box<ManifestModel>),
}

/// Recovers which stream item (and which of its renditions) a transport
/// was built for.
#[derive(Debug, Clone)]
pub struct MediaTag {
    metadata: Arc<StreamMetadata>,
    rendition: Option<usize>,
}

impl MediaTag {
    #[must_use]
    pub fn new(metadata: Arc<StreamMetadata>, rendition: Option<usize>) -> Self {
        Self {
            metadata,
            rendition,
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.metadata.id
    }

    #[must_use]
    pub fn metadata(&self) -> &Arc<StreamMetadata> {
        &self.metadata
    }

    /// Index into the rendition list the selector chose from; `None` for
    /// live transports built from manifest URLs.
    #[must_use]
    pub fn rendition_index(&self) -> Option<usize> {
        self.rendition
    }
}

/// Configured, not yet started transport bound to exactly one rendition.
///
/// Immutable: re-resolving produces a new handle.
#[derive(Debug, Clone)]
pub struct ResolvedTransport {
    protocol: DeliveryProtocol,
    source: TransportSource,
    cache_key: String,
    retry: RetryPolicy,
    live_edge_offset: Option<Duration>,
    throttling: Option<Arc<ThrottlingState>>,
    tag: MediaTag,
}

impl ResolvedTransport {
    #[must_use]
    pub fn protocol(&self) -> DeliveryProtocol {
        self.protocol
    }

    #[must_use]
    pub fn source(&self) -> &TransportSource {
        &self.source
    }

    /// The fetch URL, for URL-backed transports.
    #[must_use]
    pub fn url(&self) -> Option<&str> {
        match &self.source {
            TransportSource::Url(url) => Some(url.as_str()),
            TransportSource::Manifest(_) => None,
        }
    }

    #[must_use]
    pub fn manifest(&self) -> Option<&ManifestModel> {
        match &self.source {
            TransportSource::Manifest(manifest) => Some(manifest.as_ref()),
            TransportSource::Url(_) => None,
        }
    }

    #[must_use]
    pub fn cache_key(&self) -> &str {
        &self.cache_key
    }

    /// Live transports bypass the response cache.
    #[must_use]
    pub fn is_cached(&self) -> bool {
        !self.is_live()
    }

    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    #[must_use]
    pub fn live_edge_offset(&self) -> Option<Duration> {
        self.live_edge_offset
    }

    #[must_use]
    pub fn is_live(&self) -> bool {
        self.live_edge_offset.is_some()
    }

    #[must_use]
    pub fn is_throttled(&self) -> bool {
        self.throttling.is_some()
    }

    #[must_use]
    pub fn tag(&self) -> &MediaTag {
        &self.tag
    }

    /// Rewrite a follow-up request URL (segment, byte range) the way the
    /// origin expects. Identity for live transports.
    pub fn request_url<'a>(&self, url: &'a str) -> Cow<'a, str> {
        match &self.throttling {
            Some(state) => state.decode(url),
            None => Cow::Borrowed(url),
        }
    }

    /// Flat, serializable description of this transport.
    #[must_use]
    pub fn summary(&self) -> TransportSummary<'_> {
        TransportSummary {
            id: self.tag.id(),
            protocol: self.protocol.name(),
            url: self.url(),
            manifest: self.manifest(),
            cache_key: &self.cache_key,
            cached: self.is_cached(),
            retry: self.retry,
            live_edge_offset_ms: self
                .live_edge_offset
                .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX)),
            throttled: self.is_throttled(),
            rendition_index: self.tag.rendition_index(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TransportSummary<'a> {
    pub id: &'a str,
    pub protocol: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manifest: Option<&'a ManifestModel>,
    pub cache_key: &'a str,
    pub cached: bool,
    pub retry: RetryPolicy,
    pub live_edge_offset_ms: Option<u64>,
    pub throttled: bool,
    pub rendition_index: Option<usize>,
}

/// Builds transports with the fixed per-protocol, per-liveness policy.
///
/// On-demand builders route every URL through the already initialized
/// throttling decoder and fail with [`InitError`] if it is not available.
/// No builder fetches or compiles anything. Live builders never touch the
/// decoder.
#[derive(Debug, Clone)]
pub struct TransportFactory {
    decoder: Arc<ThrottlingDecoder>,
}

impl TransportFactory {
    #[must_use]
    pub fn new(decoder: Arc<ThrottlingDecoder>) -> Self {
        Self { decoder }
    }

    #[must_use]
    pub fn decoder(&self) -> &Arc<ThrottlingDecoder> {
        &self.decoder
    }

    // ─── Live ──────────────────────────────────────────────────────────────

    #[must_use]
    pub fn live_dash(&self, url: &str, cache_key: &str, tag: MediaTag) -> ResolvedTransport {
        Self::live(DeliveryProtocol::Dash, url, cache_key, tag)
    }

    #[must_use]
    pub fn live_hls(&self, url: &str, cache_key: &str, tag: MediaTag) -> ResolvedTransport {
        Self::live(DeliveryProtocol::Hls, url, cache_key, tag)
    }

    #[must_use]
    pub fn live_smooth_streaming(
        &self,
        url: &str,
        cache_key: &str,
        tag: MediaTag,
    ) -> ResolvedTransport {
        Self::live(DeliveryProtocol::SmoothStreaming, url, cache_key, tag)
    }

    fn live(
        protocol: DeliveryProtocol,
        url: &str,
        cache_key: &str,
        tag: MediaTag,
    ) -> ResolvedTransport {
        ResolvedTransport {
            protocol,
            source: TransportSource::Url(url.to_string()),
            cache_key: cache_key.to_string(),
            retry: RetryPolicy::Bounded {
                min_retries: LIVE_MANIFEST_MIN_RETRIES,
            },
            live_edge_offset: Some(LIVE_EDGE_OFFSET),
            throttling: None,
            tag,
        }
    }

    // ─── On demand ─────────────────────────────────────────────────────────

    pub fn progressive(
        &self,
        url: &str,
        cache_key: &str,
        tag: MediaTag,
    ) -> Result<ResolvedTransport, InitError> {
        self.on_demand(
            DeliveryProtocol::ProgressiveHttp,
            url,
            cache_key,
            RetryPolicy::Unlimited,
            tag,
        )
    }

    pub fn hls(
        &self,
        url: &str,
        cache_key: &str,
        tag: MediaTag,
    ) -> Result<ResolvedTransport, InitError> {
        self.on_demand(DeliveryProtocol::Hls, url, cache_key, Self::manifest_retry(), tag)
    }

    pub fn dash(
        &self,
        url: &str,
        cache_key: &str,
        tag: MediaTag,
    ) -> Result<ResolvedTransport, InitError> {
        self.on_demand(DeliveryProtocol::Dash, url, cache_key, Self::manifest_retry(), tag)
    }

    pub fn smooth_streaming(
        &self,
        url: &str,
        cache_key: &str,
        tag: MediaTag,
    ) -> Result<ResolvedTransport, InitError> {
        self.on_demand(
            DeliveryProtocol::SmoothStreaming,
            url,
            cache_key,
            Self::manifest_retry(),
            tag,
        )
    }

    /// DASH transport over an already parsed inline manifest. Every
    /// representation URL is decoded up front.
    pub fn dash_manifest(
        &self,
        manifest: ManifestModel,
        cache_key: &str,
        tag: MediaTag,
    ) -> Result<ResolvedTransport, InitError> {
        let state = self.decoder.state()?;
        let manifest = manifest.map_urls(|url| state.decode(url).into_owned());

        Ok(ResolvedTransport {
            protocol: DeliveryProtocol::Dash,
            source: TransportSource::Manifest(Box::new(manifest)),
            cache_key: cache_key.to_string(),
            retry: Self::manifest_retry(),
            live_edge_offset: None,
            throttling: Some(state),
            tag,
        })
    }

    fn on_demand(
        &self,
        protocol: DeliveryProtocol,
        url: &str,
        cache_key: &str,
        retry: RetryPolicy,
        tag: MediaTag,
    ) -> Result<ResolvedTransport, InitError> {
        let state = self.decoder.state()?;
        let url = state.decode(url).into_owned();

        Ok(ResolvedTransport {
            protocol,
            source: TransportSource::Url(url),
            cache_key: cache_key.to_string(),
            retry,
            live_edge_offset: None,
            throttling: Some(state),
            tag,
        })
    }

    fn manifest_retry() -> RetryPolicy {
        RetryPolicy::Bounded {
            min_retries: ON_DEMAND_MIN_RETRIES,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::StreamType;
    use crate::throttling::{InitError, PlayerScriptSource};

    const PLAYER: &str = include_str!("../tests/fixtures/player.js");

    struct Unreachable;

    impl PlayerScriptSource for Unreachable {
        fn player_script(&self, _bootstrap_id: &str) -> Result<String, InitError> {
            Err(InitError::Source("offline".into()))
        }
    }

    fn tag() -> MediaTag {
        MediaTag::new(
            Arc::new(StreamMetadata::new("item-1", StreamType::VideoStream)),
            Some(0),
        )
    }

    fn factory() -> TransportFactory {
        let decoder = ThrottlingDecoder::from_script(PLAYER);
        decoder.init().unwrap();
        TransportFactory::new(Arc::new(decoder))
    }

    #[test]
    fn live_transports_have_edge_offset_and_bounded_retries() {
        let factory = TransportFactory::new(Arc::new(ThrottlingDecoder::new(
            "boot",
            Arc::new(Unreachable),
        )));
        let live = factory.live_hls("https://live.example.com/x.m3u8?n=abcdef", "item-1", tag());

        assert_eq!(live.protocol(), DeliveryProtocol::Hls);
        assert_eq!(live.live_edge_offset(), Some(Duration::from_secs(10)));
        assert_eq!(live.retry_policy(), RetryPolicy::Bounded { min_retries: 5 });
        assert!(!live.is_throttled());
        assert!(!live.is_cached());
        // Bypasses the decoder entirely, even though it could not initialize
        assert_eq!(live.url(), Some("https://live.example.com/x.m3u8?n=abcdef"));
        assert!(!factory.decoder().is_initialized());
    }

    #[test]
    fn progressive_is_unlimited_and_decoded() {
        let transport = factory()
            .progressive("https://cdn.example.com/v?n=abcdef&itag=18", "key", tag())
            .unwrap();
        assert_eq!(transport.retry_policy(), RetryPolicy::Unlimited);
        assert_eq!(transport.url(), Some("https://cdn.example.com/v?n=cedfba&itag=18"));
        assert_eq!(transport.cache_key(), "key");
        assert!(transport.is_cached());
        assert!(transport.live_edge_offset().is_none());
    }

    #[test]
    fn on_demand_requests_pass_through_decoder() {
        let transport = factory()
            .dash("https://cdn.example.com/m.mpd", "key", tag())
            .unwrap();
        assert!(transport.is_throttled());
        assert_eq!(
            transport.request_url("https://cdn.example.com/seg?n=abcdef"),
            "https://cdn.example.com/seg?n=cedfba"
        );
        assert_eq!(
            transport.request_url("https://cdn.example.com/seg/1"),
            "https://cdn.example.com/seg/1"
        );
        assert_eq!(
            transport.retry_policy(),
            RetryPolicy::Bounded {
                min_retries: ON_DEMAND_MIN_RETRIES
            }
        );
    }

    #[test]
    fn on_demand_fails_when_decoder_cannot_initialize() {
        let factory = TransportFactory::new(Arc::new(ThrottlingDecoder::new(
            "boot",
            Arc::new(Unreachable),
        )));
        let err = factory
            .progressive("https://cdn.example.com/v.mp4", "key", tag())
            .unwrap_err();
        assert_eq!(err, InitError::NotInitialized);

        assert!(factory.decoder().init().is_err());
        let err = factory
            .progressive("https://cdn.example.com/v.mp4", "key", tag())
            .unwrap_err();
        assert_eq!(err, InitError::Source("offline".into()));
    }

    #[test]
    fn live_smooth_streaming_matches_other_live_builders() {
        let factory = TransportFactory::new(Arc::new(ThrottlingDecoder::new(
            "boot",
            Arc::new(Unreachable),
        )));
        let live = factory.live_smooth_streaming(
            "https://live.example.com/x.ism/Manifest",
            "item-1",
            tag(),
        );

        assert_eq!(live.protocol(), DeliveryProtocol::SmoothStreaming);
        assert_eq!(
            live.retry_policy(),
            RetryPolicy::Bounded {
                min_retries: LIVE_MANIFEST_MIN_RETRIES
            }
        );
        assert_eq!(live.live_edge_offset(), Some(LIVE_EDGE_OFFSET));
        assert!(live.is_live());
        assert!(!live.is_throttled());
        assert_eq!(live.url(), Some("https://live.example.com/x.ism/Manifest"));
    }

    #[test]
    fn summary_serializes() {
        let transport = factory()
            .progressive("https://cdn.example.com/v.mp4", "key", tag())
            .unwrap();
        let json = serde_json::to_value(transport.summary()).unwrap();
        assert_eq!(json["protocol"], "progressive-http");
        assert_eq!(json["retry"]["kind"], "unlimited");
        assert_eq!(json["id"], "item-1");
        assert_eq!(json["rendition_index"], 0);
        assert!(json.get("manifest").is_none());
    }
}
