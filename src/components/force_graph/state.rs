use log::{debug, info, warn};

use super::config::GraphConfig;
use super::controller::{Controller, Effect, InputEvent, Mode, Scene};
use super::layout::Simulation;
use super::store::GraphStore;
use super::sync::{self, GraphDocument, SaveScheduler};
use super::types::{ContextEntry, NodeId};
use super::viewport::Viewport;

/// What the external note editor is showing.
#[derive(Clone, Debug, PartialEq)]
pub struct EditorState {
	pub node_id: NodeId,
	pub text: String,
	pub context: Vec<ContextEntry>,
}

/// One editing session: the graph, its layout, the view onto it and the interaction state.
///
/// Input events and simulation ticks both go through here and each runs to completion,
/// so a tick never observes a half-applied mutation. Methods that return a
/// [`GraphDocument`] hand back a snapshot the caller must persist now.
pub struct GraphSession {
	pub store: GraphStore,
	pub layout: Simulation,
	pub viewport: Viewport,
	pub controller: Controller,
	saves: SaveScheduler,
	editor: Option<EditorState>,
	config: GraphConfig,
	loaded: bool,
}

impl GraphSession {
	pub fn new(config: GraphConfig, width: f64, height: f64, seed: u64) -> Self {
		let viewport = Viewport::new(config.viewport.clone(), width, height);
		Self {
			store: GraphStore::new(config.interaction.root_note_template.clone()),
			layout: Simulation::new(config.layout.clone(), viewport.center()),
			viewport,
			controller: Controller::new(config.interaction.clone(), &config.layout, seed),
			saves: SaveScheduler::new(config.sync.debounce_ms),
			editor: None,
			config,
			loaded: false,
		}
	}

	pub fn config(&self) -> &GraphConfig {
		&self.config
	}

	pub fn editor(&self) -> Option<&EditorState> {
		self.editor.as_ref()
	}

	pub fn mode(&self) -> Mode {
		self.controller.mode()
	}

	/// `false` until the persisted graph has been loaded or its load has failed.
	/// Until then nothing is written and input that would change the graph is dropped.
	pub fn is_loaded(&self) -> bool {
		self.loaded
	}

	pub fn save_pending(&self) -> bool {
		self.saves.is_pending()
	}

	pub fn snapshot(&self) -> GraphDocument {
		sync::to_document(&self.store)
	}

	/// Replaces the graph with a loaded document and restarts the layout.
	pub fn load(&mut self, doc: GraphDocument) {
		self.store = sync::from_document(doc, &self.config.interaction.root_note_template);
		self.controller.reset();
		self.editor = None;
		self.saves.force();
		self.layout.set_link_count(self.store.link_count());
		self.layout.restart();
		self.loaded = true;
	}

	/// Starts editing from an empty graph after the persisted copy could not be read.
	pub fn load_failed(&mut self) {
		warn!("continuing without a persisted graph");
		self.loaded = true;
	}

	/// Clears the graph and returns the empty snapshot to persist. Ignored before load.
	pub fn reset(&mut self) -> Option<GraphDocument> {
		if !self.loaded {
			return None;
		}
		info!("resetting graph ({} nodes)", self.store.node_count());
		self.store.clear();
		self.controller.reset();
		self.editor = None;
		self.saves.force();
		self.layout.set_link_count(0);
		self.layout.restart();
		Some(self.snapshot())
	}

	pub fn handle(&mut self, event: InputEvent, now_ms: f64) -> Option<GraphDocument> {
		if !self.loaded && !is_view_only(&event) {
			debug!("input ignored until the graph is loaded");
			return None;
		}
		let mut scene = Scene {
			store: &mut self.store,
			viewport: &mut self.viewport,
			layout: &mut self.layout,
		};
		let effects = self.controller.handle(event, &mut scene);

		let mut save_now = false;
		for effect in effects {
			match effect {
				Effect::OpenEditor(id) => self.open_editor(id),
				Effect::CloseEditor => self.editor = None,
				Effect::ScheduleSave => self.saves.schedule(now_ms),
				Effect::SaveNow => {
					self.saves.force();
					save_now = true;
				}
			}
		}
		self.refresh_editor();
		save_now.then(|| self.snapshot())
	}

	/// Advances the zoom transition and the simulation by one frame, and fires a
	/// debounced save whose window has elapsed.
	pub fn tick(&mut self, dt_ms: f64, now_ms: f64) -> Option<GraphDocument> {
		if self.viewport.advance(dt_ms) {
			self.layout.reheat();
		}
		self.layout.tick(&mut self.store);
		(self.saves.poll(now_ms) && self.loaded).then(|| self.snapshot())
	}

	fn open_editor(&mut self, id: NodeId) {
		let Some(node) = self.store.node(id) else {
			return;
		};
		debug!("editing node {id}");
		self.editor = Some(EditorState {
			node_id: id,
			text: node.note.clone(),
			context: self.store.context_of(id, self.config.interaction.context_max_chars),
		});
	}

	fn refresh_editor(&mut self) {
		let Some(editor) = self.editor.as_mut() else {
			return;
		};
		match self.store.node(editor.node_id) {
			Some(node) if node.note != editor.text => editor.text = node.note.clone(),
			Some(_) => {}
			None => self.editor = None,
		}
	}
}

/// Events that only move the view and never touch the graph.
fn is_view_only(event: &InputEvent) -> bool {
	matches!(
		event,
		InputEvent::PointerDown { .. }
			| InputEvent::PointerMove { .. }
			| InputEvent::PointerUp { .. }
			| InputEvent::PointerLeave
			| InputEvent::Wheel { .. }
			| InputEvent::Resize { .. }
	)
}
