//! Structured view of an adaptive (DASH) manifest.

use std::time::Duration;

use serde::Serialize;

/// `MPD@type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PresentationType {
    Static,
    Dynamic,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ManifestModel {
    pub presentation: PresentationType,
    /// `mediaPresentationDuration`; always present for static manifests.
    pub duration: Option<Duration>,
    pub min_buffer_time: Option<Duration>,
    /// Absolute base every relative reference was resolved against.
    pub base_url: String,
    pub periods: Vec<Period>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Period {
    pub id: Option<String>,
    pub start: Option<Duration>,
    pub adaptation_sets: Vec<AdaptationSet>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdaptationSet {
    pub id: Option<String>,
    pub content_type: Option<String>,
    pub mime_type: Option<String>,
    pub representations: Vec<Representation>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Representation {
    pub id: String,
    pub bandwidth: u64,
    pub codecs: Option<String>,
    pub mime_type: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub audio_sampling_rate: Option<u32>,
    /// Absolute URL of the representation's media.
    pub base_url: String,
    pub segments: Option<SegmentInfo>,
}

/// Segment addressing of a representation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SegmentInfo {
    /// Single file with byte-range index.
    Base {
        index_range: Option<String>,
        initialization_range: Option<String>,
    },
    /// `$Number$` / `$Time$` templated segment names, relative to `base_url`.
    Template {
        initialization: Option<String>,
        media: String,
        timescale: u64,
        duration: Option<u64>,
        start_number: u64,
        timeline: Vec<TimelineEntry>,
    },
    /// Explicit segment URLs, already absolute.
    List {
        initialization: Option<String>,
        media: Vec<String>,
    },
}

/// One `<S>` element of a `SegmentTimeline`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimelineEntry {
    pub start: Option<u64>,
    pub duration: u64,
    pub repeat: i64,
}

impl ManifestModel {
    /// Every representation across all periods.
    pub fn representations(&self) -> impl Iterator<Item = &Representation> {
        self.periods
            .iter()
            .flat_map(|p| &p.adaptation_sets)
            .flat_map(|a| &a.representations)
    }

    /// Apply `rewrite` to every absolute URL that will be requested.
    #[must_use]
    pub fn map_urls(mut self, mut rewrite: impl FnMut(&str) -> String) -> Self {
        for rep in self
            .periods
            .iter_mut()
            .flat_map(|p| &mut p.adaptation_sets)
            .flat_map(|a| &mut a.representations)
        {
            rep.base_url = rewrite(&rep.base_url);
            if let Some(SegmentInfo::List {
                initialization,
                media,
            }) = &mut rep.segments
            {
                if let Some(init) = initialization {
                    *init = rewrite(init);
                }
                for url in media.iter_mut() {
                    *url = rewrite(url);
                }
            }
        }
        self
    }
}
