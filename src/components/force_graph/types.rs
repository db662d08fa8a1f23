use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type NodeId = u64;

/// A point in either screen or world space; which one is up to the caller.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Point {
	pub x: f64,
	pub y: f64,
}

impl Point {
	pub const fn new(x: f64, y: f64) -> Self {
		Self { x, y }
	}

	pub fn midpoint(self, other: Point) -> Point {
		Point::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
	}

	pub fn distance(self, other: Point) -> f64 {
		(self.x - other.x).hypot(self.y - other.y)
	}

	pub fn is_finite(self) -> bool {
		self.x.is_finite() && self.y.is_finite()
	}
}

/// Missing kinds on the wire load as `Child`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
	Root,
	#[default]
	Child,
	Breaker,
}

#[derive(Clone, Debug)]
pub struct GraphNode {
	pub id: NodeId,
	pub position: Point,
	/// Fixed override held while the node is being dragged.
	pub pinned: Option<Point>,
	pub kind: NodeKind,
	pub note: String,
	pub created_at: DateTime<Utc>,
	pub parent_id: Option<NodeId>,
	pub child_ids: Vec<NodeId>,
}

impl GraphNode {
	/// Where the node should be drawn: the pin if held, otherwise the simulated position.
	pub fn display_position(&self) -> Point {
		self.pinned.unwrap_or(self.position)
	}

	/// First non-empty line of the note, used as a canvas label.
	pub fn title(&self) -> Option<&str> {
		self.note
			.lines()
			.map(|line| line.trim().trim_start_matches('#').trim())
			.find(|line| !line.is_empty())
	}
}

/// Reconciliation key for a link, derived from its endpoint pair.
///
/// Parallel links between the same pair share a key.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct LinkId(String);

impl LinkId {
	pub fn between(source: NodeId, target: NodeId) -> Self {
		Self(format!("{source}-{target}"))
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for LinkId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

#[derive(Clone, Debug, PartialEq)]
pub struct GraphLink {
	pub id: LinkId,
	pub source: NodeId,
	pub target: NodeId,
	pub is_breaker_segment: bool,
}

impl GraphLink {
	pub fn new(source: NodeId, target: NodeId, is_breaker_segment: bool) -> Self {
		Self {
			id: LinkId::between(source, target),
			source,
			target,
			is_breaker_segment,
		}
	}

	pub fn touches(&self, id: NodeId) -> bool {
		self.source == id || self.target == id
	}
}

/// One entry of the hierarchy context shown next to the editor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContextEntry {
	pub label: String,
	pub text: String,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn link_id_is_deterministic_per_ordered_pair() {
		assert_eq!(LinkId::between(1, 2), GraphLink::new(1, 2, false).id);
		assert_ne!(LinkId::between(1, 2), LinkId::between(2, 1));
		assert_eq!(LinkId::between(4, 7).as_str(), "4-7");
	}

	#[test]
	fn title_skips_blank_lines_and_heading_marks() {
		let node = GraphNode {
			id: 1,
			position: Point::default(),
			pinned: None,
			kind: NodeKind::Root,
			note: "\n  \n# Ideas\nbody".into(),
			created_at: Utc::now(),
			parent_id: None,
			child_ids: Vec::new(),
		};
		assert_eq!(node.title(), Some("Ideas"));
	}
}
