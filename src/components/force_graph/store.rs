use std::collections::BTreeMap;

use chrono::Utc;
use log::{debug, warn};

use super::types::{ContextEntry, GraphLink, GraphNode, LinkId, NodeId, NodeKind, Point};

const ELLIPSIS: &str = "…";

/// Owns the nodes and links of the graph and keeps parent/child bookkeeping consistent.
///
/// Nodes are keyed by id, which doubles as creation order. The layout engine only
/// writes positions; every topological change goes through the methods here.
#[derive(Clone, Debug)]
pub struct GraphStore {
	nodes: BTreeMap<NodeId, GraphNode>,
	links: Vec<GraphLink>,
	next_id: NodeId,
	root_note_template: String,
}

impl GraphStore {
	pub fn new(root_note_template: impl Into<String>) -> Self {
		Self {
			nodes: BTreeMap::new(),
			links: Vec::new(),
			next_id: 1,
			root_note_template: root_note_template.into(),
		}
	}

	/// Builds a store from already reconciled parts. The id counter continues after the
	/// highest id present, or stays at its default for an empty node set.
	pub(super) fn from_parts(
		nodes: Vec<GraphNode>,
		links: Vec<GraphLink>,
		root_note_template: impl Into<String>,
	) -> Self {
		let mut store = Self::new(root_note_template);
		if let Some(max) = nodes.iter().map(|n| n.id).max() {
			store.next_id = max + 1;
		}
		store.nodes = nodes.into_iter().map(|n| (n.id, n)).collect();
		store.links = links;
		debug_assert!(store.hierarchy_is_consistent());
		store
	}

	pub fn nodes(&self) -> impl DoubleEndedIterator<Item = &GraphNode> {
		self.nodes.values()
	}

	pub(super) fn nodes_mut(&mut self) -> impl Iterator<Item = &mut GraphNode> {
		self.nodes.values_mut()
	}

	pub fn node(&self, id: NodeId) -> Option<&GraphNode> {
		self.nodes.get(&id)
	}

	pub fn node_mut(&mut self, id: NodeId) -> Option<&mut GraphNode> {
		self.nodes.get_mut(&id)
	}

	pub fn contains(&self, id: NodeId) -> bool {
		self.nodes.contains_key(&id)
	}

	pub fn links(&self) -> &[GraphLink] {
		&self.links
	}

	pub fn node_count(&self) -> usize {
		self.nodes.len()
	}

	pub fn link_count(&self) -> usize {
		self.links.len()
	}

	pub fn next_id(&self) -> NodeId {
		self.next_id
	}

	pub fn create_node(&mut self, position: Point, kind: NodeKind, parent_id: Option<NodeId>) -> NodeId {
		let id = self.next_id;
		self.next_id += 1;

		let note = match kind {
			NodeKind::Root => self.root_note_template.clone(),
			NodeKind::Child | NodeKind::Breaker => String::new(),
		};
		self.nodes.insert(
			id,
			GraphNode {
				id,
				position,
				pinned: None,
				kind,
				note,
				created_at: Utc::now(),
				parent_id: None,
				child_ids: Vec::new(),
			},
		);

		if let Some(parent) = parent_id {
			if !self.attach_child(parent, id) {
				warn!("node {id}: parent {parent} not found, created without a parent");
			}
		}
		debug!("created {kind:?} node {id} at ({:.1}, {:.1})", position.x, position.y);
		id
	}

	/// Records `child` as the last child of `parent`.
	///
	/// Refuses (returns `false`) when either node is missing, when both are the same node,
	/// or when `child` already belongs to another parent: re-parenting requires an explicit
	/// `detach_child` first.
	pub fn attach_child(&mut self, parent: NodeId, child: NodeId) -> bool {
		if parent == child || !self.contains(parent) {
			return false;
		}
		match self.nodes.get_mut(&child) {
			Some(node) if node.parent_id.is_none() || node.parent_id == Some(parent) => {
				node.parent_id = Some(parent);
			}
			Some(node) => {
				warn!(
					"node {child} already has parent {:?}; detach before attaching to {parent}",
					node.parent_id
				);
				return false;
			}
			None => return false,
		}
		if let Some(node) = self.nodes.get_mut(&parent) {
			if !node.child_ids.contains(&child) {
				node.child_ids.push(child);
			}
		}
		debug_assert!(self.hierarchy_is_consistent());
		true
	}

	pub fn detach_child(&mut self, parent: NodeId, child: NodeId) {
		if let Some(node) = self.nodes.get_mut(&parent) {
			node.child_ids.retain(|&id| id != child);
		}
		if let Some(node) = self.nodes.get_mut(&child) {
			if node.parent_id == Some(parent) {
				node.parent_id = None;
			}
		}
		debug_assert!(self.hierarchy_is_consistent());
	}

	/// Appends a link. Parallel links are allowed; self-loops and dangling endpoints are not.
	pub fn create_link(&mut self, source: NodeId, target: NodeId, is_breaker_segment: bool) -> Option<LinkId> {
		if source == target {
			warn!("refusing self-loop on node {source}");
			return None;
		}
		if !self.contains(source) || !self.contains(target) {
			warn!("link {source}-{target} references a missing node");
			return None;
		}
		let link = GraphLink::new(source, target, is_breaker_segment);
		let id = link.id.clone();
		self.links.push(link);
		debug!("created link {id}");
		Some(id)
	}

	/// Deletes a node with its links. Former children are orphaned, not deleted.
	pub fn delete_node(&mut self, id: NodeId) -> bool {
		let Some(node) = self.nodes.remove(&id) else {
			return false;
		};
		self.links.retain(|l| !l.touches(id));
		for other in self.nodes.values_mut() {
			if other.parent_id == Some(id) {
				other.parent_id = None;
			}
			other.child_ids.retain(|&c| c != id);
		}
		debug!(
			"deleted node {id} (parent {:?}, {} orphaned children)",
			node.parent_id,
			node.child_ids.len()
		);
		debug_assert!(self.hierarchy_is_consistent());
		true
	}

	/// Replaces a link with two breaker segments meeting at a new node placed on the
	/// midpoint of the original endpoints. Stale keys or endpoints make this a no-op.
	///
	/// Parallel links share a key; the topmost one is split, matching [`Self::link_at`].
	pub fn split_link(&mut self, id: &LinkId) -> Option<NodeId> {
		let Some(index) = self.links.iter().rposition(|l| &l.id == id) else {
			warn!("split of unknown link {id} ignored");
			return None;
		};
		let (source, target) = (self.links[index].source, self.links[index].target);
		let (Some(a), Some(b)) = (self.node(source), self.node(target)) else {
			warn!("split of link {id} ignored: endpoint missing");
			return None;
		};
		let midpoint = a.position.midpoint(b.position);

		self.links.remove(index);
		let breaker = self.create_node(midpoint, NodeKind::Breaker, None);
		self.links.push(GraphLink::new(source, breaker, true));
		self.links.push(GraphLink::new(breaker, target, true));
		debug!("split link {id} at breaker {breaker}");
		Some(breaker)
	}

	pub fn set_note(&mut self, id: NodeId, text: impl Into<String>) -> bool {
		match self.nodes.get_mut(&id) {
			Some(node) => {
				node.note = text.into();
				true
			}
			None => false,
		}
	}

	/// Hierarchy context of a node: the tail of its parent's note, then the head of each
	/// child's note in child order. Blank notes are skipped.
	pub fn context_of(&self, id: NodeId, max_chars: usize) -> Vec<ContextEntry> {
		let Some(node) = self.node(id) else {
			return Vec::new();
		};
		let mut entries = Vec::new();

		if let Some(parent) = node.parent_id.and_then(|p| self.node(p)) {
			let text = parent.note.trim();
			if !text.is_empty() {
				entries.push(ContextEntry {
					label: "Parent".into(),
					text: tail_chars(text, max_chars),
				});
			}
		}
		for (i, child) in node
			.child_ids
			.iter()
			.enumerate()
			.filter_map(|(i, &c)| self.node(c).map(|n| (i, n)))
		{
			let text = child.note.trim();
			if text.is_empty() {
				continue;
			}
			entries.push(ContextEntry {
				label: format!("Child {}", i + 1),
				text: text.chars().take(max_chars).collect(),
			});
		}
		entries
	}

	/// Topmost node whose center lies within `radius` of `point`.
	pub fn node_at(&self, point: Point, radius: f64) -> Option<NodeId> {
		self.nodes
			.values()
			.rev()
			.find(|n| n.display_position().distance(point) <= radius)
			.map(|n| n.id)
	}

	/// Topmost link passing within `tolerance` of `point`.
	pub fn link_at(&self, point: Point, tolerance: f64) -> Option<LinkId> {
		self.links
			.iter()
			.rev()
			.find(|link| {
				match (self.node(link.source), self.node(link.target)) {
					(Some(a), Some(b)) => {
						distance_to_segment(point, a.display_position(), b.display_position())
							<= tolerance
					}
					_ => false,
				}
			})
			.map(|link| link.id.clone())
	}

	/// Drops every node and link. The id counter keeps running so ids are never reused.
	pub fn clear(&mut self) {
		self.nodes.clear();
		self.links.clear();
	}

	pub fn hierarchy_is_consistent(&self) -> bool {
		let children_agree = self.nodes.values().all(|n| {
			n.child_ids
				.iter()
				.all(|c| self.nodes.get(c).is_some_and(|c| c.parent_id == Some(n.id)))
		});
		let parents_agree = self.nodes.values().all(|n| match n.parent_id {
			Some(p) => self.nodes.get(&p).is_some_and(|p| p.child_ids.contains(&n.id)),
			None => true,
		});
		let links_resolve = self
			.links
			.iter()
			.all(|l| self.contains(l.source) && self.contains(l.target));
		children_agree && parents_agree && links_resolve
	}
}

fn tail_chars(text: &str, max_chars: usize) -> String {
	let count = text.chars().count();
	if count <= max_chars {
		return text.to_string();
	}
	let tail: String = text.chars().skip(count - max_chars).collect();
	format!("{ELLIPSIS}{tail}")
}

fn distance_to_segment(p: Point, a: Point, b: Point) -> f64 {
	let (dx, dy) = (b.x - a.x, b.y - a.y);
	let len2 = dx * dx + dy * dy;
	if len2 == 0.0 {
		return p.distance(a);
	}
	let t = (((p.x - a.x) * dx + (p.y - a.y) * dy) / len2).clamp(0.0, 1.0);
	p.distance(Point::new(a.x + t * dx, a.y + t * dy))
}

#[cfg(test)]
mod tests {
	use super::*;

	fn store() -> GraphStore {
		GraphStore::new("# New note\n")
	}

	#[test]
	fn ids_are_monotonic_and_never_reused() {
		let mut s = store();
		let a = s.create_node(Point::default(), NodeKind::Root, None);
		let b = s.create_node(Point::default(), NodeKind::Root, None);
		assert!(s.delete_node(b));
		let c = s.create_node(Point::default(), NodeKind::Root, None);
		assert_eq!((a, b, c), (1, 2, 3));
		s.clear();
		assert_eq!(s.create_node(Point::default(), NodeKind::Root, None), 4);
	}

	#[test]
	fn root_nodes_get_the_template_note() {
		let mut s = store();
		let root = s.create_node(Point::default(), NodeKind::Root, None);
		let child = s.create_node(Point::default(), NodeKind::Child, Some(root));
		assert_eq!(s.node(root).unwrap().note, "# New note\n");
		assert!(s.node(child).unwrap().note.is_empty());
	}

	#[test]
	fn create_with_parent_attaches_in_order() {
		let mut s = store();
		let p = s.create_node(Point::default(), NodeKind::Root, None);
		let c1 = s.create_node(Point::default(), NodeKind::Child, Some(p));
		let c2 = s.create_node(Point::default(), NodeKind::Child, Some(p));
		assert_eq!(s.node(p).unwrap().child_ids, vec![c1, c2]);
		assert_eq!(s.node(c2).unwrap().parent_id, Some(p));
	}

	#[test]
	fn create_with_missing_parent_still_creates() {
		let mut s = store();
		let id = s.create_node(Point::default(), NodeKind::Child, Some(42));
		assert_eq!(s.node(id).unwrap().parent_id, None);
		assert!(s.hierarchy_is_consistent());
	}

	#[test]
	fn attach_refuses_silent_reparenting() {
		let mut s = store();
		let a = s.create_node(Point::default(), NodeKind::Root, None);
		let b = s.create_node(Point::default(), NodeKind::Root, None);
		let c = s.create_node(Point::default(), NodeKind::Child, Some(a));
		assert!(!s.attach_child(b, c));
		s.detach_child(a, c);
		assert!(s.attach_child(b, c));
		assert!(s.node(a).unwrap().child_ids.is_empty());
		assert_eq!(s.node(b).unwrap().child_ids, vec![c]);
	}

	#[test]
	fn detach_is_idempotent() {
		let mut s = store();
		let a = s.create_node(Point::default(), NodeKind::Root, None);
		let b = s.create_node(Point::default(), NodeKind::Child, Some(a));
		s.detach_child(a, b);
		s.detach_child(a, b);
		assert!(s.node(a).unwrap().child_ids.is_empty());
		assert_eq!(s.node(b).unwrap().parent_id, None);
	}

	#[test]
	fn links_allow_parallels_but_not_self_loops() {
		let mut s = store();
		let a = s.create_node(Point::default(), NodeKind::Root, None);
		let b = s.create_node(Point::default(), NodeKind::Root, None);
		assert!(s.create_link(a, b, false).is_some());
		assert!(s.create_link(a, b, false).is_some());
		assert!(s.create_link(a, a, false).is_none());
		assert!(s.create_link(a, 99, false).is_none());
		assert_eq!(s.link_count(), 2);
		assert!(s.node(a).unwrap().child_ids.is_empty());
	}

	#[test]
	fn delete_cascades_links_and_orphans_children() {
		let mut s = store();
		let grand = s.create_node(Point::default(), NodeKind::Root, None);
		let parent = s.create_node(Point::default(), NodeKind::Child, Some(grand));
		let c1 = s.create_node(Point::default(), NodeKind::Child, Some(parent));
		let c2 = s.create_node(Point::default(), NodeKind::Child, Some(parent));
		s.create_link(grand, parent, false);
		s.create_link(parent, c1, false);
		s.create_link(c2, grand, false);

		assert!(s.delete_node(parent));
		assert!(!s.contains(parent));
		assert!(s.links().iter().all(|l| !l.touches(parent)));
		assert_eq!(s.link_count(), 1);
		assert!(s.node(grand).unwrap().child_ids.is_empty());
		assert_eq!(s.node(c1).unwrap().parent_id, None);
		assert_eq!(s.node(c2).unwrap().parent_id, None);
		assert!(s.context_of(grand, 400).iter().all(|e| e.label == "Parent"));
		assert!(!s.delete_node(parent));
	}

	#[test]
	fn hierarchy_stays_consistent_under_random_mutation() {
		let mut s = store();
		let mut seed: u64 = 0x2545_F491_4F6C_DD1D;
		let mut next = move |n: u64| {
			seed ^= seed << 13;
			seed ^= seed >> 7;
			seed ^= seed << 17;
			seed % n.max(1)
		};
		for _ in 0..500 {
			let ids: Vec<NodeId> = s.nodes().map(|n| n.id).collect();
			let pick = |r: u64| ids.get(r as usize % ids.len().max(1)).copied();
			match next(4) {
				0 => {
					let parent = if next(2) == 0 { pick(next(64)) } else { None };
					s.create_node(Point::default(), NodeKind::Child, parent);
				}
				1 => {
					if let Some(id) = pick(next(64)) {
						s.delete_node(id);
					}
				}
				2 => {
					if let (Some(p), Some(c)) = (pick(next(64)), pick(next(64))) {
						s.attach_child(p, c);
					}
				}
				_ => {
					if let (Some(p), Some(c)) = (pick(next(64)), pick(next(64))) {
						s.detach_child(p, c);
					}
				}
			}
			assert!(s.hierarchy_is_consistent());
		}
	}

	#[test]
	fn split_link_inserts_breaker_at_midpoint() {
		let mut s = store();
		let a = s.create_node(Point::new(100.0, 100.0), NodeKind::Root, None);
		let b = s.create_node(Point::new(300.0, -50.0), NodeKind::Root, None);
		let link = s.create_link(a, b, false).unwrap();

		let breaker = s.split_link(&link).unwrap();
		let node = s.node(breaker).unwrap();
		assert_eq!(node.kind, NodeKind::Breaker);
		assert_eq!(node.position, Point::new(200.0, 25.0));
		assert_eq!(s.link_count(), 2);
		assert!(s.links().iter().all(|l| l.is_breaker_segment));
		assert_eq!((s.links()[0].source, s.links()[0].target), (a, breaker));
		assert_eq!((s.links()[1].source, s.links()[1].target), (breaker, b));
	}

	#[test]
	fn split_takes_the_topmost_parallel_link() {
		let mut s = store();
		let a = s.create_node(Point::new(0.0, 0.0), NodeKind::Root, None);
		let b = s.create_node(Point::new(200.0, 0.0), NodeKind::Root, None);
		s.create_link(a, b, false).unwrap();
		s.create_link(a, b, true).unwrap();

		let hit = s.link_at(Point::new(100.0, 2.0), 6.0).unwrap();
		let breaker = s.split_link(&hit).unwrap();
		assert_eq!(s.link_count(), 3);
		let plain = &s.links()[0];
		assert_eq!((plain.source, plain.target), (a, b));
		assert!(!plain.is_breaker_segment);
		assert!(s.links()[1..].iter().all(|l| l.touches(breaker)));
	}

	#[test]
	fn split_of_stale_link_is_noop() {
		let mut s = store();
		let a = s.create_node(Point::default(), NodeKind::Root, None);
		let b = s.create_node(Point::default(), NodeKind::Root, None);
		let link = s.create_link(a, b, false).unwrap();
		s.delete_node(b);
		assert!(s.split_link(&link).is_none());
		assert_eq!(s.node_count(), 1);
	}

	#[test]
	fn context_truncates_parent_tail_and_child_head() {
		let mut s = store();
		let p = s.create_node(Point::default(), NodeKind::Root, None);
		let n = s.create_node(Point::default(), NodeKind::Child, Some(p));
		let c1 = s.create_node(Point::default(), NodeKind::Child, Some(n));
		let c2 = s.create_node(Point::default(), NodeKind::Child, Some(n));
		let c3 = s.create_node(Point::default(), NodeKind::Child, Some(n));
		s.set_note(p, "  abcdefghij  ");
		s.set_note(c1, "0123456789");
		s.set_note(c2, "   \n ");
		s.set_note(c3, "xyz");

		let context = s.context_of(n, 4);
		assert_eq!(
			context,
			vec![
				ContextEntry { label: "Parent".into(), text: "…ghij".into() },
				ContextEntry { label: "Child 1".into(), text: "0123".into() },
				ContextEntry { label: "Child 3".into(), text: "xyz".into() },
			]
		);
	}

	#[test]
	fn context_counts_characters_not_bytes() {
		let mut s = store();
		let p = s.create_node(Point::default(), NodeKind::Root, None);
		let n = s.create_node(Point::default(), NodeKind::Child, Some(p));
		s.set_note(p, "привет мир");
		assert_eq!(s.context_of(n, 3)[0].text, "…мир");
		assert!(s.context_of(999, 3).is_empty());
	}

	#[test]
	fn hit_testing_prefers_topmost() {
		let mut s = store();
		let a = s.create_node(Point::new(0.0, 0.0), NodeKind::Root, None);
		let b = s.create_node(Point::new(5.0, 0.0), NodeKind::Root, None);
		let c = s.create_node(Point::new(200.0, 0.0), NodeKind::Root, None);
		assert_eq!(s.node_at(Point::new(2.0, 0.0), 20.0), Some(b));
		assert_eq!(s.node_at(Point::new(-16.0, 0.0), 20.0), Some(a));
		assert_eq!(s.node_at(Point::new(100.0, 0.0), 20.0), None);

		let link = s.create_link(a, c, false).unwrap();
		assert_eq!(s.link_at(Point::new(100.0, 4.0), 6.0), Some(link));
		assert_eq!(s.link_at(Point::new(100.0, 9.0), 6.0), None);
		assert_eq!(s.link_at(Point::new(260.0, 0.0), 6.0), None);
	}
}
