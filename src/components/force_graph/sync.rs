//! Persistence gateway: the JSON wire format, conversions to and from the store, the
//! save debouncer, and the HTTP exchange with the graph endpoint.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::{Request, RequestInit, Response};

use super::error::{Result, SyncError};
use super::store::GraphStore;
use super::types::{GraphLink, GraphNode, NodeId, NodeKind, Point};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphDocument {
	#[serde(default)]
	pub nodes: Vec<WireNode>,
	#[serde(default)]
	pub links: Vec<WireLink>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireNode {
	pub id: NodeId,
	#[serde(rename = "type", default)]
	pub kind: NodeKind,
	#[serde(default)]
	pub note: String,
	#[serde(default)]
	pub x: f64,
	#[serde(default)]
	pub y: f64,
	#[serde(default = "Utc::now")]
	pub created_at: DateTime<Utc>,
	#[serde(default)]
	pub parent_id: Option<NodeId>,
	#[serde(default)]
	pub children: Vec<NodeId>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireLink {
	pub source: NodeId,
	pub target: NodeId,
	#[serde(default)]
	pub is_breaker_link: bool,
}

impl GraphDocument {
	pub fn from_json(text: &str) -> Result<Self> {
		serde_json::from_str(text).map_err(SyncError::Decode)
	}

	pub fn to_json(&self) -> Result<String> {
		serde_json::to_string(self).map_err(SyncError::Encode)
	}
}

/// Snapshot of the store in wire form. A held pin is saved as the node's position.
pub fn to_document(store: &GraphStore) -> GraphDocument {
	GraphDocument {
		nodes: store
			.nodes()
			.map(|n| {
				let at = n.display_position();
				WireNode {
					id: n.id,
					kind: n.kind,
					note: n.note.clone(),
					x: at.x,
					y: at.y,
					created_at: n.created_at,
					parent_id: n.parent_id,
					children: n.child_ids.clone(),
				}
			})
			.collect(),
		links: store
			.links()
			.iter()
			.map(|l| WireLink {
				source: l.source,
				target: l.target,
				is_breaker_link: l.is_breaker_segment,
			})
			.collect(),
	}
}

/// Rebuilds a store from a loaded document, reconciling it on the way in:
///
/// - duplicate node ids keep the first occurrence;
/// - non-finite coordinates fall back to the origin;
/// - a `parentId` that does not resolve is cleared, and every resolving one is mirrored
///   in the parent's `children`;
/// - `children` entries that do not point back at their parent are dropped;
/// - links with an unresolved endpoint, or looping on one node, are dropped.
pub fn from_document(doc: GraphDocument, root_note_template: &str) -> GraphStore {
	let mut seen = HashSet::new();
	let mut nodes: Vec<GraphNode> = Vec::with_capacity(doc.nodes.len());
	for wire in doc.nodes {
		if !seen.insert(wire.id) {
			warn!("duplicate node id {} dropped on load", wire.id);
			continue;
		}
		let position = Point::new(wire.x, wire.y);
		nodes.push(GraphNode {
			id: wire.id,
			position: if position.is_finite() { position } else { Point::default() },
			pinned: None,
			kind: wire.kind,
			note: wire.note,
			created_at: wire.created_at,
			parent_id: wire.parent_id.filter(|p| *p != wire.id),
			child_ids: wire.children,
		});
	}

	let parents: HashMap<NodeId, Option<NodeId>> = nodes
		.iter()
		.map(|n| {
			let parent = n.parent_id.filter(|p| seen.contains(p));
			(n.id, parent)
		})
		.collect();
	for node in nodes.iter_mut() {
		node.parent_id = parents[&node.id];
		let id = node.id;
		let mut kept = Vec::with_capacity(node.child_ids.len());
		for child in node.child_ids.drain(..) {
			if parents.get(&child) == Some(&Some(id)) && !kept.contains(&child) {
				kept.push(child);
			}
		}
		node.child_ids = kept;
	}
	let mut missing: Vec<(NodeId, NodeId)> = Vec::new();
	for node in &nodes {
		if let Some(parent) = node.parent_id {
			let listed = nodes
				.iter()
				.find(|p| p.id == parent)
				.is_some_and(|p| p.child_ids.contains(&node.id));
			if !listed {
				missing.push((parent, node.id));
			}
		}
	}
	for (parent, child) in missing {
		if let Some(p) = nodes.iter_mut().find(|p| p.id == parent) {
			p.child_ids.push(child);
		}
	}

	let total_links = doc.links.len();
	let links: Vec<GraphLink> = doc
		.links
		.into_iter()
		.filter(|l| l.source != l.target && seen.contains(&l.source) && seen.contains(&l.target))
		.map(|l| GraphLink::new(l.source, l.target, l.is_breaker_link))
		.collect();
	if links.len() < total_links {
		warn!("dropped {} unresolved links on load", total_links - links.len());
	}
	info!("loaded graph: {} nodes, {} links", nodes.len(), links.len());
	GraphStore::from_parts(nodes, links, root_note_template)
}

/// Clock-driven save debouncer. Times are milliseconds on any monotonic clock.
///
/// Edits arm (or re-arm) a deadline; `poll` fires once the deadline passes. A forced
/// save cancels the pending deadline so that a stale debounced write never follows it.
#[derive(Clone, Debug)]
pub struct SaveScheduler {
	debounce_ms: f64,
	deadline: Option<f64>,
}

impl SaveScheduler {
	pub fn new(debounce_ms: f64) -> Self {
		Self {
			debounce_ms,
			deadline: None,
		}
	}

	pub fn schedule(&mut self, now_ms: f64) {
		self.deadline = Some(now_ms + self.debounce_ms);
	}

	pub fn force(&mut self) {
		self.deadline = None;
	}

	pub fn is_pending(&self) -> bool {
		self.deadline.is_some()
	}

	/// Returns `true` exactly once per armed deadline, when `now_ms` reaches it.
	pub fn poll(&mut self, now_ms: f64) -> bool {
		match self.deadline {
			Some(deadline) if now_ms >= deadline => {
				self.deadline = None;
				true
			}
			_ => false,
		}
	}
}

fn js_error(value: JsValue) -> SyncError {
	SyncError::Network(value.as_string().unwrap_or_else(|| format!("{value:?}")))
}

async fn send(request: Request) -> Result<Response> {
	let window = web_sys::window().ok_or(SyncError::NoWindow)?;
	let value = JsFuture::from(window.fetch_with_request(&request))
		.await
		.map_err(js_error)?;
	let response: Response = value.dyn_into().map_err(js_error)?;
	if !response.ok() {
		return Err(SyncError::Status(response.status()));
	}
	Ok(response)
}

/// `GET` the persisted graph.
pub async fn fetch_graph(endpoint: &str) -> Result<GraphDocument> {
	let init = RequestInit::new();
	init.set_method("GET");
	let request = Request::new_with_str_and_init(endpoint, &init).map_err(js_error)?;
	let response = send(request).await?;
	let text = JsFuture::from(response.text().map_err(js_error)?)
		.await
		.map_err(js_error)?;
	GraphDocument::from_json(&text.as_string().unwrap_or_default())
}

/// `POST` a snapshot. Failures are returned to the caller, never retried.
pub async fn post_graph(endpoint: &str, doc: &GraphDocument) -> Result<()> {
	let body = doc.to_json()?;
	let init = RequestInit::new();
	init.set_method("POST");
	init.set_body(&JsValue::from_str(&body));
	let request = Request::new_with_str_and_init(endpoint, &init).map_err(js_error)?;
	request
		.headers()
		.set("Content-Type", "application/json")
		.map_err(js_error)?;
	send(request).await?;
	Ok(())
}
