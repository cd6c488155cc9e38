//! Reads the extent the imagery service actually rendered.
//!
//! The service pads or snaps the requested area to its tile grid, so the
//! image bounds come from the metadata document, not from the request. The
//! four values are the first four children of
//! `Response/ResourceSets/ResourceSet/Resources/StaticMapMetadata/BoundingBox`.
//! Tags are matched by local name; the document's namespace prefix, if any,
//! is ignored. The result is always EPSG:4326.

use std::path::{Path, PathBuf};

use quick_xml::events::Event;
use quick_xml::Reader;
use report_common::BoundingBox;
use tracing::{debug, instrument};

use crate::error::{ParseError, Result};

/// Element path from the root down to the bounds container.
const BOUNDS_PATH: [&str; 6] = [
    "Response",
    "ResourceSets",
    "ResourceSet",
    "Resources",
    "StaticMapMetadata",
    "BoundingBox",
];

/// Only this many leading children of the container are considered.
const BOUND_CHILDREN: usize = 4;

#[derive(Default)]
struct Bounds {
    west: Option<String>,
    south: Option<String>,
    east: Option<String>,
    north: Option<String>,
}

impl Bounds {
    fn slot(&mut self, tag: &[u8]) -> Option<&mut Option<String>> {
        match tag {
            b"WestLongitude" => Some(&mut self.west),
            b"SouthLatitude" => Some(&mut self.south),
            b"EastLongitude" => Some(&mut self.east),
            b"NorthLatitude" => Some(&mut self.north),
            _ => None,
        }
    }
}

/// Read and parse a metadata document from disk.
#[instrument(fields(path = %path.display()))]
pub async fn parse_file(path: &Path) -> Result<BoundingBox> {
    let xml = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ParseError::Read {
            path: path.to_path_buf(),
            source,
        })?;
    parse_str(&xml, path)
}

/// Parse a metadata document. `origin` is only used in error messages.
pub fn parse_str(xml: &str, origin: &Path) -> Result<BoundingBox> {
    let malformed = |source| ParseError::Malformed {
        path: origin.to_path_buf(),
        source,
    };

    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut stack: Vec<Vec<u8>> = Vec::new();
    let mut bounds = Bounds::default();
    let mut children_seen = 0usize;
    // Set while inside one of the leading bound children
    let mut current: Option<Vec<u8>> = None;

    loop {
        let event = match reader.read_event_into(&mut buf) {
            Ok(event) => event,
            Err(quick_xml::Error::UnexpectedEof(_)) if !stack.is_empty() => {
                return Err(ParseError::Truncated {
                    path: origin.to_path_buf(),
                }
                .into());
            }
            Err(e) => return Err(malformed(e).into()),
        };
        match event {
            Event::Start(e) => {
                let name = e.local_name().as_ref().to_vec();
                if in_bounds_container(&stack) {
                    children_seen += 1;
                    if children_seen <= BOUND_CHILDREN {
                        current = Some(name.clone());
                    }
                }
                stack.push(name);
            }
            Event::Empty(e) => {
                if in_bounds_container(&stack) {
                    children_seen += 1;
                    if children_seen <= BOUND_CHILDREN {
                        if let Some(slot) = bounds.slot(e.local_name().as_ref()) {
                            slot.get_or_insert_with(String::new);
                        }
                    }
                }
            }
            Event::Text(t) => {
                if let Some(tag) = current.as_deref() {
                    let text = t.unescape().map_err(malformed)?;
                    if let Some(slot) = bounds.slot(tag) {
                        slot.get_or_insert_with(String::new).push_str(&text);
                    }
                }
            }
            Event::End(_) => {
                stack.pop();
                if current.is_some() && in_bounds_container(&stack) {
                    if let Some(tag) = current.take() {
                        if let Some(slot) = bounds.slot(&tag) {
                            slot.get_or_insert_with(String::new);
                        }
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if !stack.is_empty() {
        return Err(ParseError::Truncated {
            path: origin.to_path_buf(),
        }
        .into());
    }

    let west = bound_value(origin, "WestLongitude", bounds.west)?;
    let south = bound_value(origin, "SouthLatitude", bounds.south)?;
    let east = bound_value(origin, "EastLongitude", bounds.east)?;
    let north = bound_value(origin, "NorthLatitude", bounds.north)?;

    let bbox = BoundingBox::from_4_values(west, south, east, north).map_err(|source| {
        ParseError::InvalidBounds {
            path: origin.to_path_buf(),
            source,
        }
    })?;

    debug!(bbox = %bbox, "Parsed imagery bounds");
    Ok(bbox)
}

fn in_bounds_container(stack: &[Vec<u8>]) -> bool {
    stack.len() == BOUNDS_PATH.len()
        && stack
            .iter()
            .zip(BOUNDS_PATH)
            .all(|(seen, expected)| seen.as_slice() == expected.as_bytes())
}

fn bound_value(origin: &Path, tag: &'static str, raw: Option<String>) -> Result<f64> {
    let missing = || ParseError::MissingTag {
        path: PathBuf::from(origin),
        tag,
    };
    let raw = raw.ok_or_else(missing)?;
    let trimmed = raw.trim();
    trimmed.parse::<f64>().map_err(|_| {
        ParseError::InvalidValue {
            path: origin.to_path_buf(),
            tag,
            value: trimmed.to_string(),
        }
        .into()
    })
}
