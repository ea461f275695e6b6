// Graph Types - Persisted blueprint graph format
//
// A blueprint graph is stored per sub-graph key ("onCreate", "onTick", ...).
// Each key owns an ordered node list and a link list; nodes are addressed by
// their index in that list, pins by their ordinal.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// Nodes
// ─────────────────────────────────────────────────────────────────────────────

/// Position in the graph editor (ignored by the runtime)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

/// One node slot: a function reference plus its parameter tokens
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeDescriptor {
    /// `self.<member>` for an owner-class member, otherwise a library path
    #[serde(alias = "function")]
    pub node_function: String,
    /// Parameter tokens, one per declared parameter, in schema order
    #[serde(default)]
    pub params: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pos: Option<Position>,
}

impl NodeDescriptor {
    pub fn new(function: impl Into<String>, params: &[&str]) -> Self {
        Self {
            node_function: function.into(),
            params: params.iter().map(|p| p.to_string()).collect(),
            pos: None,
        }
    }

    pub fn at(mut self, x: f32, y: f32) -> Self {
        self.pos = Some(Position { x, y });
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Links
// ─────────────────────────────────────────────────────────────────────────────

/// Whether a link carries a value or control flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LinkKind {
    /// Output value of `left` feeds input parameter of `right`
    #[serde(rename = "Params", alias = "data", alias = "Data")]
    Data,
    /// Exec pin of `left` continues into `right`
    #[serde(rename = "Exec", alias = "control", alias = "Control")]
    Control,
}

/// A wire between two node pins
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkRecord {
    pub left: usize,
    pub left_out_pin: usize,
    pub right: usize,
    pub right_in_pin: usize,
    pub link_type: LinkKind,
}

impl LinkRecord {
    /// Data link: `left[out_pin]` -> `right[in_pin]`
    pub fn data(left: usize, out_pin: usize, right: usize, in_pin: usize) -> Self {
        Self {
            left,
            left_out_pin: out_pin,
            right,
            right_in_pin: in_pin,
            link_type: LinkKind::Data,
        }
    }

    /// Control link from exec pin `out_pin` of `left` into `right`
    pub fn control(left: usize, out_pin: usize, right: usize) -> Self {
        Self {
            left,
            left_out_pin: out_pin,
            right,
            right_in_pin: 0,
            link_type: LinkKind::Control,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Graph Data
// ─────────────────────────────────────────────────────────────────────────────

/// Nodes and links of one sub-graph key
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphSection {
    #[serde(default)]
    pub nodes: Vec<NodeDescriptor>,
    #[serde(default)]
    pub links: Vec<LinkRecord>,
}

/// Complete persisted graph of one blueprint class
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphData {
    /// Class path of the blueprint's parent, when written by the editor
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(default)]
    pub node_graph: BTreeMap<String, GraphSection>,
    #[serde(default)]
    pub start_nodes: BTreeMap<String, usize>,
}

impl GraphData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a sub-graph key
    pub fn with_section(
        mut self,
        key: impl Into<String>,
        section: GraphSection,
        start: Option<usize>,
    ) -> Self {
        let key = key.into();
        if let Some(start) = start {
            self.start_nodes.insert(key.clone(), start);
        }
        self.node_graph.insert(key, section);
        self
    }

    pub fn section(&self, key: &str) -> Option<&GraphSection> {
        self.node_graph.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.node_graph.keys().map(String::as_str)
    }
}
