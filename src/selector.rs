//! Rendition selection under device capability constraints.
//!
//! Candidates that cannot be fetched over HTTP or whose format the device
//! does not support are discarded first. The preferred format family is
//! tried before the fixed fallback order; within a family the highest
//! quality wins. Indices always refer to the caller's unfiltered list.

use serde::{Deserialize, Serialize};

use crate::model::{MediaFormat, Quality, Rendition};

/// Audio families in fallback order.
pub const AUDIO_FORMAT_ORDER: [MediaFormat; 4] = [
    MediaFormat::M4a,
    MediaFormat::WebmAudio,
    MediaFormat::Opus,
    MediaFormat::Mp3,
];

/// Video families in fallback order.
pub const VIDEO_FORMAT_ORDER: [MediaFormat; 3] =
    [MediaFormat::Mpeg4, MediaFormat::WebM, MediaFormat::ThreeGpp];

/// What the playing device can handle and what the user prefers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceCapabilities {
    pub supported_formats: Vec<MediaFormat>,
    pub preferred_audio_format: MediaFormat,
    pub preferred_video_format: MediaFormat,
    /// Upper bound on video height (data saving). Soft: when nothing fits,
    /// the smallest rendition of the chosen family is used.
    pub max_height: Option<u32>,
}

impl Default for DeviceCapabilities {
    fn default() -> Self {
        Self {
            supported_formats: AUDIO_FORMAT_ORDER
                .into_iter()
                .chain(VIDEO_FORMAT_ORDER)
                .collect(),
            preferred_audio_format: MediaFormat::M4a,
            preferred_video_format: MediaFormat::Mpeg4,
            max_height: None,
        }
    }
}

impl DeviceCapabilities {
    #[must_use]
    pub fn supports(&self, format: MediaFormat) -> bool {
        self.supported_formats.contains(&format)
    }
}

/// Pick the audio rendition to play. `None` if nothing is playable.
#[must_use]
pub fn select_audio(renditions: &[Rendition], caps: &DeviceCapabilities) -> Option<usize> {
    let order = family_order(caps.preferred_audio_format, &AUDIO_FORMAT_ORDER, caps);
    select(renditions, caps, &order, None)
}

/// Pick the combined audio+video rendition to play.
#[must_use]
pub fn select_video(renditions: &[Rendition], caps: &DeviceCapabilities) -> Option<usize> {
    let order = family_order(caps.preferred_video_format, &VIDEO_FORMAT_ORDER, caps);
    select(renditions, caps, &order, caps.max_height)
}

/// Preferred family, then the fixed order, then any other supported family.
fn family_order(
    preferred: MediaFormat,
    fallback: &[MediaFormat],
    caps: &DeviceCapabilities,
) -> Vec<MediaFormat> {
    let mut order = vec![preferred];
    for &format in fallback.iter().chain(&caps.supported_formats) {
        if !order.contains(&format) {
            order.push(format);
        }
    }
    order
}

fn select(
    renditions: &[Rendition],
    caps: &DeviceCapabilities,
    order: &[MediaFormat],
    max_height: Option<u32>,
) -> Option<usize> {
    let candidates: Vec<(usize, &Rendition)> = renditions
        .iter()
        .enumerate()
        .filter(|(_, r)| r.protocol().is_http() && caps.supports(r.format()))
        .collect();

    order.iter().find_map(|&family| {
        let in_family: Vec<(usize, &Rendition)> = candidates
            .iter()
            .copied()
            .filter(|(_, r)| r.format() == family)
            .collect();
        best_of(&in_family, max_height)
    })
}

/// Highest quality within the height limit, else the lowest overall.
/// Ties keep the earlier entry.
fn best_of(family: &[(usize, &Rendition)], max_height: Option<u32>) -> Option<usize> {
    let fits = |r: &Rendition| match (max_height, r.quality()) {
        (Some(limit), Quality::Video { height, .. }) => height <= limit,
        _ => true,
    };

    let mut best: Option<(usize, &Rendition)> = None;
    for &(index, rendition) in family.iter().filter(|(_, r)| fits(r)) {
        if best.is_none_or(|(_, b)| rendition.quality().rank() > b.quality().rank()) {
            best = Some((index, rendition));
        }
    }
    if best.is_some() {
        return best.map(|(index, _)| index);
    }

    let mut smallest: Option<(usize, &Rendition)> = None;
    for &(index, rendition) in family {
        if smallest.is_none_or(|(_, s)| rendition.quality().rank() < s.quality().rank()) {
            smallest = Some((index, rendition));
        }
    }
    smallest.map(|(index, _)| index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Content, DeliveryProtocol};

    fn audio(format: MediaFormat, kbps: u32) -> Rendition {
        Rendition::progressive(
            format!("https://cdn.example.com/{kbps}.{}", format.suffix()),
            format,
            Quality::Audio { bitrate_kbps: kbps },
        )
        .unwrap()
    }

    fn video(format: MediaFormat, height: u32) -> Rendition {
        Rendition::progressive(
            format!("https://cdn.example.com/{height}.{}", format.suffix()),
            format,
            Quality::Video { height, fps: 30 },
        )
        .unwrap()
    }

    fn torrent(format: MediaFormat, kbps: u32) -> Rendition {
        Rendition::new(
            DeliveryProtocol::Torrent,
            Content::Url("magnet:?xt=urn:btih:abc".into()),
            None,
            format,
            Quality::Audio { bitrate_kbps: kbps },
        )
        .unwrap()
    }

    #[test]
    fn picks_highest_bitrate_in_preferred_family() {
        let list = vec![
            audio(MediaFormat::WebmAudio, 160),
            audio(MediaFormat::M4a, 48),
            audio(MediaFormat::M4a, 128),
            audio(MediaFormat::Opus, 256),
        ];
        assert_eq!(select_audio(&list, &DeviceCapabilities::default()), Some(2));
    }

    #[test]
    fn falls_back_to_next_family() {
        let list = vec![audio(MediaFormat::Mp3, 320), audio(MediaFormat::WebmAudio, 70)];
        assert_eq!(select_audio(&list, &DeviceCapabilities::default()), Some(1));
    }

    #[test]
    fn unsupported_formats_are_skipped() {
        let caps = DeviceCapabilities {
            supported_formats: vec![MediaFormat::Opus],
            ..DeviceCapabilities::default()
        };
        let list = vec![audio(MediaFormat::M4a, 128), audio(MediaFormat::Opus, 64)];
        assert_eq!(select_audio(&list, &caps), Some(1));
    }

    #[test]
    fn torrent_entries_never_win_and_index_stays_original() {
        let list = vec![
            torrent(MediaFormat::M4a, 999),
            audio(MediaFormat::WebmAudio, 50),
            audio(MediaFormat::M4a, 64),
        ];
        assert_eq!(select_audio(&list, &DeviceCapabilities::default()), Some(2));
    }

    #[test]
    fn empty_filtered_set_is_none() {
        assert_eq!(select_audio(&[], &DeviceCapabilities::default()), None);
        let list = vec![torrent(MediaFormat::M4a, 128)];
        assert_eq!(select_audio(&list, &DeviceCapabilities::default()), None);
    }

    #[test]
    fn selected_quality_dominates_its_family() {
        let caps = DeviceCapabilities::default();
        let list = vec![
            audio(MediaFormat::M4a, 48),
            audio(MediaFormat::M4a, 256),
            audio(MediaFormat::M4a, 128),
            audio(MediaFormat::WebmAudio, 512),
        ];
        let index = select_audio(&list, &caps).unwrap();
        let chosen = &list[index];
        assert!(caps.supports(chosen.format()));
        assert!(list
            .iter()
            .filter(|r| r.format() == caps.preferred_audio_format)
            .all(|r| chosen.quality().rank() >= r.quality().rank()));
    }

    #[test]
    fn video_prefers_configured_family() {
        let caps = DeviceCapabilities {
            preferred_video_format: MediaFormat::WebM,
            ..DeviceCapabilities::default()
        };
        let list = vec![
            video(MediaFormat::Mpeg4, 1080),
            video(MediaFormat::WebM, 480),
            video(MediaFormat::WebM, 720),
        ];
        assert_eq!(select_video(&list, &caps), Some(2));
    }

    #[test]
    fn height_limit_is_respected() {
        let caps = DeviceCapabilities {
            max_height: Some(720),
            ..DeviceCapabilities::default()
        };
        let list = vec![
            video(MediaFormat::Mpeg4, 1080),
            video(MediaFormat::Mpeg4, 720),
            video(MediaFormat::Mpeg4, 360),
        ];
        assert_eq!(select_video(&list, &caps), Some(1));
    }

    #[test]
    fn height_limit_falls_back_to_smallest() {
        let caps = DeviceCapabilities {
            max_height: Some(144),
            ..DeviceCapabilities::default()
        };
        let list = vec![video(MediaFormat::Mpeg4, 1080), video(MediaFormat::Mpeg4, 360)];
        assert_eq!(select_video(&list, &caps), Some(1));
    }

    #[test]
    fn higher_frame_rate_breaks_height_ties() {
        let list = vec![
            video(MediaFormat::Mpeg4, 720),
            Rendition::progressive(
                "https://cdn.example.com/720p60.mp4",
                MediaFormat::Mpeg4,
                Quality::Video { height: 720, fps: 60 },
            )
            .unwrap(),
        ];
        assert_eq!(select_video(&list, &DeviceCapabilities::default()), Some(1));
    }
}
