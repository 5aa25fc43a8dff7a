//! Event Loader module
//!
//! Reads flat event lists from JSON or XML files into [`Event`] values.
//! Records missing a usable time or action are dropped and counted;
//! whole-file problems (missing file, broken syntax) are fatal.

use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::Path;

use roxmltree::Node;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use gfe_core::{Event, EventSource, GfeError, Result};

// ============================================================================
// Loaded events
// ============================================================================

/// Events read from one source, plus the number of records that were skipped
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadedEvents {
    /// Well-formed events in file order
    pub events: Vec<Event>,
    /// Records dropped as malformed
    pub dropped: usize,
}

impl LoadedEvents {
    /// Wrap an in-memory list with no dropped records
    pub fn from_events(events: Vec<Event>) -> Self {
        Self { events, dropped: 0 }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// On-disk event file format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventFormat {
    Json,
    Xml,
}

impl EventFormat {
    /// Pick a format from the file extension, falling back to the content
    pub fn detect(path: &Path, content: &str) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .as_deref()
        {
            Some("json") => Self::Json,
            Some("xml") => Self::Xml,
            _ if content.trim_start().starts_with('<') => Self::Xml,
            _ => Self::Json,
        }
    }
}

// ============================================================================
// Entry points
// ============================================================================

/// Load an event list from a JSON or XML file
pub fn load_events(path: impl AsRef<Path>, source: EventSource) -> Result<LoadedEvents> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => GfeError::FileNotFound {
            path: path.to_path_buf(),
        },
        _ => GfeError::Io {
            path: path.to_path_buf(),
            source: e,
        },
    })?;

    let origin = path.display().to_string();
    let loaded = match EventFormat::detect(path, &content) {
        EventFormat::Json => parse_json(&content, source, &origin)?,
        EventFormat::Xml => parse_xml(&content, source, &origin)?,
    };

    debug!(
        "Loaded {} {} events from {} ({} dropped)",
        loaded.len(),
        source,
        origin,
        loaded.dropped
    );

    Ok(loaded)
}

/// Parse a JSON event list: a flat array, or an object with an `events` array
pub fn parse_json_events(content: &str, source: EventSource) -> Result<LoadedEvents> {
    parse_json(content, source, &format!("{source} JSON events"))
}

/// Parse an XML document of `<instance>` elements
pub fn parse_xml_events(content: &str, source: EventSource) -> Result<LoadedEvents> {
    parse_xml(content, source, &format!("{source} XML events"))
}

// ============================================================================
// JSON
// ============================================================================

fn parse_json(content: &str, source: EventSource, origin: &str) -> Result<LoadedEvents> {
    let root: Value = serde_json::from_str(content).map_err(|e| GfeError::Parse {
        origin: origin.to_string(),
        message: e.to_string(),
    })?;

    let records = match &root {
        Value::Array(items) => items,
        Value::Object(obj) => match obj.get("events") {
            Some(Value::Array(items)) => items,
            _ => {
                return Err(GfeError::Parse {
                    origin: origin.to_string(),
                    message: "expected an array of events or an object with an `events` array"
                        .to_string(),
                })
            }
        },
        _ => {
            return Err(GfeError::Parse {
                origin: origin.to_string(),
                message: "expected an array of events".to_string(),
            })
        }
    };

    let mut collector = Collector::new(source, origin);
    for (index, record) in records.iter().enumerate() {
        collector.push(index, json_record_to_event(record, index, source));
    }

    Ok(collector.finish())
}

fn json_record_to_event(
    record: &Value,
    index: usize,
    source: EventSource,
) -> std::result::Result<Event, String> {
    let obj = record
        .as_object()
        .ok_or_else(|| "record is not an object".to_string())?;

    let time = first_field(obj, &["time", "start_seconds"])
        .ok_or_else(|| "missing time".to_string())
        .and_then(|v| time_from_value(v).ok_or_else(|| format!("invalid time {v}")))?;
    check_time(time)?;

    let action = first_field(obj, &["action", "code"])
        .and_then(non_empty_str)
        .ok_or_else(|| "missing action".to_string())?;

    let id = first_field(obj, &["id", "ID"])
        .and_then(id_from_value)
        .unwrap_or_else(|| format!("{source}-{index}"));

    let mut event = Event::new(id, time, action).with_fields(obj.clone());
    event.team = obj.get("team").and_then(non_empty_str).map(str::to_string);
    event.outcome = first_field(obj, &["outcome", "tag"])
        .and_then(non_empty_str)
        .map(str::to_string);

    Ok(event)
}

fn first_field<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| obj.get(*k))
        .find(|v| !v.is_null())
}

fn non_empty_str(value: &Value) -> Option<&str> {
    value.as_str().map(str::trim).filter(|s| !s.is_empty())
}

fn id_from_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn time_from_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_clock(s),
        _ => None,
    }
}

// ============================================================================
// XML
// ============================================================================

fn parse_xml(content: &str, source: EventSource, origin: &str) -> Result<LoadedEvents> {
    let doc = roxmltree::Document::parse(content).map_err(|e| GfeError::Parse {
        origin: origin.to_string(),
        message: e.to_string(),
    })?;

    let mut collector = Collector::new(source, origin);
    let instances = doc
        .root_element()
        .descendants()
        .filter(|n| n.has_tag_name("instance"));
    for (index, node) in instances.enumerate() {
        collector.push(index, xml_instance_to_event(node, index, source));
    }

    Ok(collector.finish())
}

fn xml_instance_to_event(
    node: Node<'_, '_>,
    index: usize,
    source: EventSource,
) -> std::result::Result<Event, String> {
    let start = child_text(node, "start").ok_or_else(|| "missing <start>".to_string())?;
    let time = parse_clock(start).ok_or_else(|| format!("invalid <start> {start}"))?;
    check_time(time)?;

    let code = child_text(node, "code").ok_or_else(|| "missing <code>".to_string())?;
    let id = child_text(node, "ID")
        .map(str::to_string)
        .unwrap_or_else(|| format!("{source}-{index}"));

    let mut fields = Map::new();
    let mut labels = Vec::new();
    let mut team: Option<String> = None;
    let mut outcome: Option<String> = None;

    for child in node.children().filter(|c| c.is_element()) {
        let name = child.tag_name().name();
        if name == "label" {
            let group = child_text(child, "group");
            let text = child_text(child, "text");
            labels.push(json!({ "group": group, "text": text }));

            match (group, text) {
                (Some(g), Some(t)) if g.eq_ignore_ascii_case("team") => {
                    team.get_or_insert_with(|| t.to_string());
                }
                (_, Some(t)) => {
                    outcome.get_or_insert_with(|| t.to_string());
                }
                _ => {}
            }
        } else if let Some(text) = child.text().map(str::trim).filter(|s| !s.is_empty()) {
            fields.insert(name.to_string(), Value::String(text.to_string()));
        }
    }
    if !labels.is_empty() {
        fields.insert("labels".to_string(), Value::Array(labels));
    }

    let mut event = Event::new(id, time, code).with_fields(fields);
    event.team = team;
    event.outcome = outcome;

    Ok(event)
}

fn child_text<'a>(node: Node<'a, '_>, name: &str) -> Option<&'a str> {
    node.children()
        .find(|c| c.has_tag_name(name))
        .and_then(|c| c.text())
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

// ============================================================================
// Shared helpers
// ============================================================================

/// Parse seconds from `"75.5"`, `"MM:SS"` or `"HH:MM:SS"`
pub fn parse_clock(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    if !raw.contains(':') {
        return raw.parse::<f64>().ok();
    }

    let parts: Vec<&str> = raw.split(':').map(str::trim).collect();
    if !(2..=3).contains(&parts.len()) {
        return None;
    }

    let (seconds, leading) = parts.split_last()?;
    let seconds: f64 = seconds.parse().ok()?;
    if !(0.0..60.0).contains(&seconds) {
        return None;
    }

    let mut total = 0.0;
    for part in leading {
        let unit: u32 = part.parse().ok()?;
        total = total * 60.0 + f64::from(unit);
    }

    Some(total * 60.0 + seconds)
}

fn check_time(time: f64) -> std::result::Result<(), String> {
    if time.is_finite() && time >= 0.0 {
        Ok(())
    } else {
        Err(format!("time {time} is not a non-negative number"))
    }
}

/// Accumulates parsed records, logging and counting the ones that fail
struct Collector<'a> {
    source: EventSource,
    origin: &'a str,
    events: Vec<Event>,
    seen_ids: HashSet<String>,
    dropped: usize,
}

impl<'a> Collector<'a> {
    fn new(source: EventSource, origin: &'a str) -> Self {
        Self {
            source,
            origin,
            events: Vec::new(),
            seen_ids: HashSet::new(),
            dropped: 0,
        }
    }

    fn push(&mut self, index: usize, parsed: std::result::Result<Event, String>) {
        match parsed {
            Ok(event) => {
                if !self.seen_ids.insert(event.id.clone()) {
                    warn!(
                        "Duplicate {} event id {} in {}",
                        self.source, event.id, self.origin
                    );
                }
                self.events.push(event);
            }
            Err(reason) => {
                warn!(
                    "Dropping {} record {} in {}: {}",
                    self.source, index, self.origin, reason
                );
                self.dropped += 1;
            }
        }
    }

    fn finish(self) -> LoadedEvents {
        LoadedEvents {
            events: self.events,
            dropped: self.dropped,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
