//! `streamres` - playback source resolution
//!
//! Turns extracted stream metadata into one configured, ready-to-play
//! transport handle.
//!
//! # Features
//!
//! - **Live / on-demand branching**: live items go straight to their
//!   manifest URL with a live-edge offset; on-demand items go through
//!   rendition selection
//! - **Rendition selection**: device format support, preferred family,
//!   highest quality within a height limit
//! - **Throttling decoder**: the origin's `n` challenge is decoded with a
//!   transform compiled once per process in `QuickJS`
//! - **Inline DASH manifests**: parsed into a typed model with cumulative
//!   `BaseURL` resolution
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use streamres::{DeviceCapabilities, Resolver, StreamMetadata, ThrottlingDecoder};
//! use streamres::throttling::{HttpPlayerScript, DEFAULT_BOOTSTRAP_ID};
//!
//! fn main() -> anyhow::Result<()> {
//!     let decoder = Arc::new(ThrottlingDecoder::new(
//!         DEFAULT_BOOTSTRAP_ID,
//!         Arc::new(HttpPlayerScript::new()?),
//!     ));
//!     // Blocking fetch and compile, done once before any on-demand resolve
//!     decoder.init()?;
//!     let resolver = Resolver::video(decoder);
//!
//!     let text = std::fs::read_to_string("item.json")?;
//!     let metadata: StreamMetadata = serde_json::from_str(&text)?;
//!     let transport = resolver.resolve(&Arc::new(metadata), &DeviceCapabilities::default())?;
//!     println!("{:?} via {}", transport.url(), transport.protocol());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod manifest;
pub mod model;
pub mod resolver;
pub mod selector;
pub mod throttling;
pub mod transport;

pub use config::{ConfigError, ResolverConfig};
pub use manifest::{ManifestModel, ParseError};
pub use model::{
    Content, DeliveryProtocol, MediaFormat, Quality, Rendition, RenditionError, StreamMetadata,
    StreamType,
};
pub use resolver::{ResolveError, Resolver, ResolverMode};
pub use selector::{select_audio, select_video, DeviceCapabilities};
pub use throttling::{InitError, ThrottlingDecoder};
pub use transport::{MediaTag, ResolvedTransport, RetryPolicy, TransportFactory, TransportSource};

/// Version of streamres
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
