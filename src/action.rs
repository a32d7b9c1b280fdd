//! Wire data model for the dynamic-update protocol.
//!
//! Everything that crosses the HTTP boundary lives here: the event request
//! the bridge POSTs, the snapshot it carries, and the update actions the
//! server answers with. The shapes are shared with the generated bridge
//! script and must not drift — `tests/protocol_tests.rs` freezes them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Path of the one JSON endpoint, shared between the router and the
/// generated bridge script.
pub const EVENT_ENDPOINT: &str = "/__dynamic__";

// ---------------------------------------------------------------------------
// Update Action
// ---------------------------------------------------------------------------

/// One declarative client-side mutation, tagged by `action` on the wire.
///
/// A dispatch responds with a JSON array of these; the bridge applies them
/// in array order. Unknown tags are ignored client-side, so the set can grow
/// without breaking pages served by an older build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum UpdateAction {
    /// Write `content` into the value/text of every element matching `selector`.
    Set { selector: String, content: String },
    /// Delete every element matching `selector`.
    Remove { selector: String },
    /// Log `message` to the browser console.
    Console { message: String },
    /// Cover the page with a full-screen image overlay, dismissed by click.
    Easteregg { url: String },
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Point-in-time mapping from selector to observed value, built entirely in
/// the browser on every triggered event.
///
/// Keys are `#id` for every element bearing an id and `.class` for the first
/// element per distinct class name in document order. Values are the
/// form-control value when the element has one, else trimmed text content.
/// Selectors are opaque lookup keys here, never validated as CSS.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot(BTreeMap<String, String>);

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Observed value for `selector`, if the browser saw it.
    pub fn get(&self, selector: &str) -> Option<&str> {
        self.0.get(selector).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Snapshot {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

// ---------------------------------------------------------------------------
// Event Request
// ---------------------------------------------------------------------------

/// POST body of one event round trip.
#[derive(Debug, Clone, Deserialize)]
pub struct EventRequest {
    /// `#id` or `.class` of the element the event fired on.
    pub selector: String,
    /// Event kind; the bridge currently produces only `"click"`.
    #[serde(rename = "type")]
    pub event: String,
    /// Full-page snapshot. Tolerated missing for older clients.
    #[serde(default)]
    pub snapshot: Snapshot,
}
