//! Adaptive manifest (DASH MPD) parsing
//!
//! Used when the extraction stage hands over manifest text inline instead
//! of a manifest URL. A manifest that does not parse completely is an
//! error: dropping a representation could strand the player on a track
//! it cannot decode.

mod dash;
pub mod model;

use thiserror::Error;

pub use dash::{parse, parse_iso8601_duration};
pub use model::{
    AdaptationSet, ManifestModel, Period, PresentationType, Representation, SegmentInfo,
    TimelineEntry,
};

/// Manifest parse errors. Each carries the offending fragment.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("malformed manifest XML at byte {position}: {message}")]
    Xml { position: u64, message: String },

    #[error("missing <{element}> element in {fragment}")]
    MissingElement {
        element: &'static str,
        fragment: String,
    },

    #[error("missing mandatory attribute `{attribute}` in {fragment}")]
    MissingAttribute {
        attribute: &'static str,
        fragment: String,
    },

    #[error("invalid value `{value}` for `{attribute}` in {fragment}")]
    InvalidValue {
        attribute: &'static str,
        value: String,
        fragment: String,
    },

    #[error("cannot resolve `{reference}` as a URL: {message}")]
    BaseUrl { reference: String, message: String },
}
