//! DASH MPD parser built on quick-xml.
//!
//! The document is first read into a small element tree, then walked
//! top-down while `BaseURL` elements are resolved cumulatively. Every
//! structural problem aborts the parse; nothing is skipped.

use std::borrow::Cow;
use std::str::FromStr;
use std::time::Duration;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use url::Url;

use super::model::{
    AdaptationSet, ManifestModel, Period, PresentationType, Representation, SegmentInfo,
    TimelineEntry,
};
use super::ParseError;

/// Longest fragment quoted back in an error.
const FRAGMENT_LIMIT: usize = 160;

#[derive(Debug, Default)]
struct Node {
    name: String,
    attrs: Vec<(String, String)>,
    children: Vec<Node>,
    text: String,
}

impl Node {
    fn from_start(e: &BytesStart<'_>) -> Result<Self, ParseError> {
        let name = std::str::from_utf8(e.local_name().as_ref())
            .map_err(|err| ParseError::xml(0, format!("invalid UTF-8 in element name: {err}")))?
            .to_string();

        let mut attrs = Vec::new();
        for attr in e.attributes() {
            let attr = attr.map_err(|err| {
                ParseError::xml(0, format!("bad attribute in <{name}>: {err}"))
            })?;
            let key = std::str::from_utf8(attr.key.as_ref())
                .map_err(|err| {
                    ParseError::xml(0, format!("invalid UTF-8 in attribute name: {err}"))
                })?
                .to_string();
            let value = attr
                .unescape_value()
                .map_err(|err| {
                    ParseError::xml(0, format!("bad value for `{key}` in <{name}>: {err}"))
                })?
                .into_owned();
            attrs.push((key, value));
        }

        Ok(Self {
            name,
            attrs,
            ..Self::default()
        })
    }

    fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    fn children<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Node> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    fn child(&self, name: &str) -> Option<&Node> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Opening tag as written, shortened for error messages.
    fn fragment(&self) -> String {
        let mut out = format!("<{}", self.name);
        for (k, v) in &self.attrs {
            out.push_str(&format!(" {k}=\"{v}\""));
        }
        out.push('>');
        if out.len() > FRAGMENT_LIMIT {
            let mut cut = FRAGMENT_LIMIT;
            while !out.is_char_boundary(cut) {
                cut -= 1;
            }
            out.truncate(cut);
            out.push_str("…>");
        }
        out
    }

    fn required(&self, attribute: &'static str) -> Result<&str, ParseError> {
        self.attr(attribute)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ParseError::MissingAttribute {
                attribute,
                fragment: self.fragment(),
            })
    }

    fn number<T: FromStr>(&self, attribute: &'static str) -> Result<Option<T>, ParseError> {
        self.attr(attribute)
            .map(|raw| {
                raw.trim().parse().map_err(|_| ParseError::InvalidValue {
                    attribute,
                    value: raw.to_string(),
                    fragment: self.fragment(),
                })
            })
            .transpose()
    }

    fn duration(&self, attribute: &'static str) -> Result<Option<Duration>, ParseError> {
        self.attr(attribute)
            .map(|raw| {
                parse_iso8601_duration(raw).ok_or_else(|| ParseError::InvalidValue {
                    attribute,
                    value: raw.to_string(),
                    fragment: self.fragment(),
                })
            })
            .transpose()
    }
}

/// Read the whole document into a tree and return its root element.
fn read_tree(text: &str) -> Result<Node, ParseError> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Node> = Vec::new();
    let mut root: Option<Node> = None;

    loop {
        let position = reader.buffer_position() as u64;
        let event = reader
            .read_event()
            .map_err(|e| ParseError::xml(position, e.to_string()))?;

        match event {
            Event::Start(ref e) => {
                stack.push(Node::from_start(e).map_err(|err| err.at(position))?);
            }
            Event::Empty(ref e) => {
                let node = Node::from_start(e).map_err(|err| err.at(position))?;
                attach(&mut stack, &mut root, node);
            }
            Event::End(_) => {
                if let Some(node) = stack.pop() {
                    attach(&mut stack, &mut root, node);
                }
            }
            Event::Text(e) => {
                let chunk = e
                    .unescape()
                    .map_err(|err| ParseError::xml(position, err.to_string()))?;
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&chunk);
                }
            }
            Event::CData(e) => {
                let chunk = std::str::from_utf8(&e).map_err(|err| {
                    ParseError::xml(position, format!("invalid UTF-8 in CDATA: {err}"))
                })?;
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(chunk);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(ParseError::xml(
            reader.buffer_position() as u64,
            format!("unclosed element {}", open.fragment()),
        ));
    }

    root.ok_or_else(|| ParseError::MissingElement {
        element: "MPD",
        fragment: "<document>".to_string(),
    })
}

fn attach(stack: &mut [Node], root: &mut Option<Node>, node: Node) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None => {
            if root.is_none() {
                *root = Some(node);
            }
        }
    }
}

/// Parse manifest `text`, resolving relative references against `base_url`.
pub fn parse(text: &str, base_url: &str) -> Result<ManifestModel, ParseError> {
    let base = Url::parse(base_url).map_err(|e| ParseError::BaseUrl {
        reference: base_url.to_string(),
        message: e.to_string(),
    })?;

    let mpd = read_tree(text)?;
    if mpd.name != "MPD" {
        return Err(ParseError::MissingElement {
            element: "MPD",
            fragment: mpd.fragment(),
        });
    }

    let presentation = match mpd.attr("type").map(str::trim) {
        None | Some("static") => PresentationType::Static,
        Some("dynamic") => PresentationType::Dynamic,
        Some(other) => {
            return Err(ParseError::InvalidValue {
                attribute: "type",
                value: other.to_string(),
                fragment: mpd.fragment(),
            })
        }
    };

    let duration = mpd.duration("mediaPresentationDuration")?;
    if presentation == PresentationType::Static && duration.is_none() {
        return Err(ParseError::MissingAttribute {
            attribute: "mediaPresentationDuration",
            fragment: mpd.fragment(),
        });
    }
    let min_buffer_time = mpd.duration("minBufferTime")?;

    let mpd_base = join_base(&base, &mpd)?;
    let periods = mpd
        .children("Period")
        .map(|period| parse_period(period, &mpd_base))
        .collect::<Result<Vec<_>, _>>()?;
    if periods.is_empty() {
        return Err(ParseError::MissingElement {
            element: "Period",
            fragment: mpd.fragment(),
        });
    }

    Ok(ManifestModel {
        presentation,
        duration,
        min_buffer_time,
        base_url: mpd_base.to_string(),
        periods,
    })
}

fn parse_period(node: &Node, base: &Url) -> Result<Period, ParseError> {
    let base = join_base(base, node)?;
    let adaptation_sets = node
        .children("AdaptationSet")
        .map(|set| parse_adaptation_set(set, node, &base))
        .collect::<Result<Vec<_>, _>>()?;
    if adaptation_sets.is_empty() {
        return Err(ParseError::MissingElement {
            element: "AdaptationSet",
            fragment: node.fragment(),
        });
    }

    Ok(Period {
        id: node.attr("id").map(str::to_string),
        start: node.duration("start")?,
        adaptation_sets,
    })
}

fn parse_adaptation_set(
    node: &Node,
    period: &Node,
    base: &Url,
) -> Result<AdaptationSet, ParseError> {
    let base = join_base(base, node)?;
    let representations = node
        .children("Representation")
        .map(|rep| parse_representation(rep, node, period, &base))
        .collect::<Result<Vec<_>, _>>()?;
    if representations.is_empty() {
        return Err(ParseError::MissingElement {
            element: "Representation",
            fragment: node.fragment(),
        });
    }

    Ok(AdaptationSet {
        id: node.attr("id").map(str::to_string),
        content_type: node.attr("contentType").map(str::to_string),
        mime_type: node.attr("mimeType").map(str::to_string),
        representations,
    })
}

fn parse_representation(
    node: &Node,
    set: &Node,
    period: &Node,
    base: &Url,
) -> Result<Representation, ParseError> {
    let id = node.required("id")?.to_string();
    let bandwidth = node
        .number::<u64>("bandwidth")?
        .ok_or_else(|| ParseError::MissingAttribute {
            attribute: "bandwidth",
            fragment: node.fragment(),
        })?;
    let base = join_base(base, node)?;

    // Segment addressing is inherited from the set, then the period.
    let segments = match segment_info(node, &base)? {
        Some(info) => Some(info),
        None => match segment_info(set, &base)? {
            Some(info) => Some(info),
            None => segment_info(period, &base)?,
        },
    };

    Ok(Representation {
        id,
        bandwidth,
        codecs: node.attr("codecs").or_else(|| set.attr("codecs")).map(str::to_string),
        mime_type: node
            .attr("mimeType")
            .or_else(|| set.attr("mimeType"))
            .map(str::to_string),
        width: node.number("width")?,
        height: node.number("height")?,
        audio_sampling_rate: match node.number("audioSamplingRate")? {
            Some(rate) => Some(rate),
            None => set.number("audioSamplingRate")?,
        },
        base_url: base.to_string(),
        segments,
    })
}

fn segment_info(node: &Node, base: &Url) -> Result<Option<SegmentInfo>, ParseError> {
    if let Some(seg) = node.child("SegmentBase") {
        return Ok(Some(SegmentInfo::Base {
            index_range: seg.attr("indexRange").map(str::to_string),
            initialization_range: seg
                .child("Initialization")
                .and_then(|init| init.attr("range"))
                .map(str::to_string),
        }));
    }

    if let Some(seg) = node.child("SegmentTemplate") {
        let timeline = match seg.child("SegmentTimeline") {
            Some(timeline) => timeline
                .children("S")
                .map(|s| -> Result<TimelineEntry, ParseError> {
                    Ok(TimelineEntry {
                        start: s.number("t")?,
                        duration: s.number("d")?.ok_or_else(|| ParseError::MissingAttribute {
                            attribute: "d",
                            fragment: s.fragment(),
                        })?,
                        repeat: s.number("r")?.unwrap_or(0),
                    })
                })
                .collect::<Result<Vec<_>, _>>()?,
            None => Vec::new(),
        };

        return Ok(Some(SegmentInfo::Template {
            initialization: seg.attr("initialization").map(str::to_string),
            media: seg.required("media")?.to_string(),
            timescale: seg.number("timescale")?.unwrap_or(1),
            duration: seg.number("duration")?,
            start_number: seg.number("startNumber")?.unwrap_or(1),
            timeline,
        }));
    }

    if let Some(seg) = node.child("SegmentList") {
        let initialization = seg
            .child("Initialization")
            .and_then(|init| init.attr("sourceURL"))
            .map(|url| resolve(base, url))
            .transpose()?;
        let media = seg
            .children("SegmentURL")
            .map(|s| resolve(base, s.required("media")?))
            .collect::<Result<Vec<_>, _>>()?;
        if media.is_empty() {
            return Err(ParseError::MissingElement {
                element: "SegmentURL",
                fragment: seg.fragment(),
            });
        }
        return Ok(Some(SegmentInfo::List {
            initialization,
            media,
        }));
    }

    Ok(None)
}

/// Apply a node's first `BaseURL` child, if any, on top of `base`.
fn join_base(base: &Url, node: &Node) -> Result<Url, ParseError> {
    match node.child("BaseURL").map(|b| b.text.trim()) {
        Some(reference) if !reference.is_empty() => {
            base.join(reference).map_err(|e| ParseError::BaseUrl {
                reference: reference.to_string(),
                message: e.to_string(),
            })
        }
        _ => Ok(base.clone()),
    }
}

fn resolve(base: &Url, reference: &str) -> Result<String, ParseError> {
    base.join(reference.trim())
        .map(String::from)
        .map_err(|e| ParseError::BaseUrl {
            reference: reference.to_string(),
            message: e.to_string(),
        })
}

/// Parse an `xs:duration` restricted to days, hours, minutes and seconds
/// (`P1DT2H3M4.5S`). Years and months have no fixed length and are
/// rejected.
pub fn parse_iso8601_duration(raw: &str) -> Option<Duration> {
    let rest = raw.trim().strip_prefix('P')?;
    let (date, time) = match rest.split_once('T') {
        Some((date, time)) => (date, Some(time)),
        None => (rest, None),
    };

    let mut secs = 0f64;
    let mut components = 0;

    if !date.is_empty() {
        let days: f64 = date.strip_suffix('D')?.parse().ok()?;
        secs += days * 86_400.0;
        components += 1;
    }

    if let Some(time) = time {
        let mut number = String::new();
        let mut last_rank = 0;
        for c in time.chars() {
            let (rank, unit) = match c {
                '0'..='9' | '.' => {
                    number.push(c);
                    continue;
                }
                'H' => (1, 3_600.0),
                'M' => (2, 60.0),
                'S' => (3, 1.0),
                _ => return None,
            };
            if rank <= last_rank || number.is_empty() {
                return None;
            }
            secs += number.parse::<f64>().ok()? * unit;
            number.clear();
            last_rank = rank;
            components += 1;
        }
        if !number.is_empty() || last_rank == 0 {
            return None;
        }
    }

    if components == 0 || !secs.is_finite() || secs < 0.0 || secs > 1e12 {
        return None;
    }
    Some(Duration::from_secs_f64(secs))
}

impl ParseError {
    fn xml(position: u64, message: impl Into<Cow<'static, str>>) -> Self {
        Self::Xml {
            position,
            message: message.into().into_owned(),
        }
    }

    /// Fill in the byte offset for errors raised while decoding a tag.
    fn at(self, position: u64) -> Self {
        match self {
            Self::Xml { message, .. } => Self::Xml { position, message },
            other => other,
        }
    }
}
