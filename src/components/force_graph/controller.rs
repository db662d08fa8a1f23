//! Pointer/keyboard state machine.
//!
//! The controller consumes typed [`InputEvent`]s, mutates the store and viewport, pokes
//! the simulation, and reports what the editor and persistence layers must do as
//! [`Effect`]s. Every handler runs to completion before the next tick, so a drag pin is
//! always set and cleared within a single call.

use std::f64::consts::TAU;

use log::{debug, info};

use super::config::{InteractionConfig, LayoutConfig};
use super::layout::Simulation;
use super::store::GraphStore;
use super::types::{NodeId, NodeKind, Point};
use super::viewport::Viewport;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointerButton {
	Primary,
	Secondary,
}

/// Held modifier keys. Ctrl and Cmd are interchangeable.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Modifiers {
	pub ctrl: bool,
	pub meta: bool,
}

impl Modifiers {
	pub const NONE: Modifiers = Modifiers { ctrl: false, meta: false };
	pub const CTRL: Modifiers = Modifiers { ctrl: true, meta: false };

	pub fn any(self) -> bool {
		self.ctrl || self.meta
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Key {
	Escape,
	Delete,
	Save,
}

/// Input in screen coordinates, as delivered by the canvas.
#[derive(Clone, Debug, PartialEq)]
pub enum InputEvent {
	PointerDown { at: Point, button: PointerButton, modifiers: Modifiers },
	PointerMove { at: Point },
	PointerUp { at: Point },
	PointerLeave,
	/// Primary click, delivered after the matching `PointerUp`.
	Click { at: Point, modifiers: Modifiers },
	ContextMenu { at: Point, modifiers: Modifiers },
	Wheel { at: Point, delta_y: f64 },
	Key(Key),
	Resize { width: f64, height: f64 },
	NoteEdited(String),
	CloseEditor,
}

/// Side effects the session applies after a handler returns.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Effect {
	OpenEditor(NodeId),
	CloseEditor,
	ScheduleSave,
	SaveNow,
}

/// Mutually exclusive interaction modes, as observed from outside.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Mode {
	Idle,
	PanningBackground,
	DraggingNode(NodeId),
	AwaitingConnectionTarget(NodeId),
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Gesture {
	Idle,
	Panning { last: Point, origin: Point, moved: bool },
	Dragging { id: NodeId, origin: Point, moved: bool },
}

/// Seeded xorshift64* generator for spawn angles.
#[derive(Clone, Debug)]
pub struct SpawnRng {
	state: u64,
}

impl SpawnRng {
	pub fn new(seed: u64) -> Self {
		Self { state: seed.max(1) }
	}

	fn next_u64(&mut self) -> u64 {
		let mut x = self.state;
		x ^= x >> 12;
		x ^= x << 25;
		x ^= x >> 27;
		self.state = x;
		x.wrapping_mul(0x2545F4914F6CDD1D_u64)
	}

	/// Uniform in [0, 1).
	pub fn next_unit(&mut self) -> f64 {
		(self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
	}
}

pub struct Controller {
	config: InteractionConfig,
	spawn_distance: f64,
	gesture: Gesture,
	suppress_click: bool,
	selected: Option<NodeId>,
	pending_source: Option<NodeId>,
	hovered: Option<NodeId>,
	rng: SpawnRng,
}

/// Mutable parts of the session a handler may touch.
pub struct Scene<'a> {
	pub store: &'a mut GraphStore,
	pub viewport: &'a mut Viewport,
	pub layout: &'a mut Simulation,
}

impl Controller {
	pub fn new(config: InteractionConfig, layout: &LayoutConfig, seed: u64) -> Self {
		Self {
			config,
			spawn_distance: layout.link_distance,
			gesture: Gesture::Idle,
			suppress_click: false,
			selected: None,
			pending_source: None,
			hovered: None,
			rng: SpawnRng::new(seed),
		}
	}

	pub fn mode(&self) -> Mode {
		match self.gesture {
			Gesture::Panning { .. } => Mode::PanningBackground,
			Gesture::Dragging { id, .. } => Mode::DraggingNode(id),
			Gesture::Idle => match self.pending_source {
				Some(id) => Mode::AwaitingConnectionTarget(id),
				None => Mode::Idle,
			},
		}
	}

	pub fn selected(&self) -> Option<NodeId> {
		self.selected
	}

	pub fn pending_source(&self) -> Option<NodeId> {
		self.pending_source
	}

	pub fn hovered(&self) -> Option<NodeId> {
		self.hovered
	}

	/// Forgets every reference into the graph, e.g. after the store was replaced.
	pub fn reset(&mut self) {
		self.gesture = Gesture::Idle;
		self.suppress_click = false;
		self.selected = None;
		self.pending_source = None;
		self.hovered = None;
	}

	pub fn handle(&mut self, event: InputEvent, scene: &mut Scene<'_>) -> Vec<Effect> {
		match event {
			InputEvent::PointerDown { at, button: PointerButton::Primary, modifiers } => {
				self.pointer_down(at, modifiers, scene);
				Vec::new()
			}
			InputEvent::PointerDown { .. } => Vec::new(),
			InputEvent::PointerMove { at } => {
				self.pointer_move(at, scene);
				Vec::new()
			}
			InputEvent::PointerUp { .. } => self.pointer_up(scene),
			InputEvent::PointerLeave => {
				self.hovered = None;
				self.pointer_up(scene)
			}
			InputEvent::Click { at, modifiers } => self.click(at, modifiers, scene),
			InputEvent::ContextMenu { at, modifiers } => self.context_menu(at, modifiers, scene),
			InputEvent::Wheel { at, delta_y } => {
				self.wheel(at, delta_y, scene);
				Vec::new()
			}
			InputEvent::Key(key) => self.key(key, scene),
			InputEvent::Resize { width, height } => {
				scene.viewport.resize(width, height);
				scene.layout.set_center(scene.viewport.center());
				scene.layout.reheat();
				Vec::new()
			}
			InputEvent::NoteEdited(text) => {
				let Some(id) = self.selected else {
					return Vec::new();
				};
				if scene.store.set_note(id, text) {
					vec![Effect::ScheduleSave]
				} else {
					Vec::new()
				}
			}
			InputEvent::CloseEditor => self.close_editor(),
		}
	}

	fn pointer_down(&mut self, at: Point, modifiers: Modifiers, scene: &mut Scene<'_>) {
		self.suppress_click = false;
		// Modifier presses are reserved for clicks: no drag, no pan.
		if modifiers.any() || self.gesture != Gesture::Idle {
			return;
		}
		match self.node_at(at, scene) {
			Some(id) => {
				if let Some(node) = scene.store.node_mut(id) {
					node.pinned = Some(node.position);
				}
				scene.layout.hold();
				self.gesture = Gesture::Dragging {
					id,
					origin: at,
					moved: false,
				};
			}
			None => {
				self.gesture = Gesture::Panning {
					last: at,
					origin: at,
					moved: false,
				};
			}
		}
	}

	fn pointer_move(&mut self, at: Point, scene: &mut Scene<'_>) {
		if self.gesture == Gesture::Idle {
			self.hovered = self.node_at(at, scene);
			return;
		}
		let slop = self.config.click_slop;
		match &mut self.gesture {
			Gesture::Idle => {}
			Gesture::Panning { last, origin, moved } => {
				scene.viewport.pan_by(at.x - last.x, at.y - last.y);
				*last = at;
				*moved |= at.distance(*origin) > slop;
			}
			Gesture::Dragging { id, origin, moved } => {
				let world = scene.viewport.screen_to_world(at);
				if let Some(node) = scene.store.node_mut(*id) {
					node.pinned = Some(world);
					node.position = world;
				}
				*moved |= at.distance(*origin) > slop;
			}
		}
	}

	fn pointer_up(&mut self, scene: &mut Scene<'_>) -> Vec<Effect> {
		let gesture = std::mem::replace(&mut self.gesture, Gesture::Idle);
		match gesture {
			Gesture::Idle => Vec::new(),
			Gesture::Panning { moved, .. } => {
				self.suppress_click = moved;
				Vec::new()
			}
			Gesture::Dragging { id, moved, .. } => {
				if let Some(node) = scene.store.node_mut(id) {
					if let Some(pin) = node.pinned.take() {
						node.position = pin;
					}
				}
				scene.layout.release();
				self.suppress_click = moved;
				if moved { vec![Effect::ScheduleSave] } else { Vec::new() }
			}
		}
	}

	fn click(&mut self, at: Point, modifiers: Modifiers, scene: &mut Scene<'_>) -> Vec<Effect> {
		if std::mem::take(&mut self.suppress_click) {
			return Vec::new();
		}
		let world = scene.viewport.screen_to_world(at);
		match (self.node_at(at, scene), modifiers.any()) {
			(Some(id), false) => self.select(id),
			(Some(id), true) => self.connect(id, scene),
			(None, true) => {
				if let Some(link) = scene.store.link_at(world, self.config.link_hit_tolerance) {
					if scene.store.split_link(&link).is_some() {
						scene.layout.set_link_count(scene.store.link_count());
						scene.layout.restart();
						return vec![Effect::ScheduleSave];
					}
					return Vec::new();
				}
				self.create_root(world, scene)
			}
			(None, false) => self.close_editor(),
		}
	}

	fn context_menu(&mut self, at: Point, modifiers: Modifiers, scene: &mut Scene<'_>) -> Vec<Effect> {
		if let Some(parent) = self.node_at(at, scene) {
			return self.spawn_child(parent, scene);
		}
		if !modifiers.any() || self.gesture != Gesture::Idle {
			return Vec::new();
		}
		let world = scene.viewport.screen_to_world(at);
		self.create_root(world, scene)
	}

	fn wheel(&mut self, at: Point, delta_y: f64, scene: &mut Scene<'_>) {
		if delta_y == 0.0 || !delta_y.is_finite() {
			return;
		}
		let step = scene.viewport.zoom_step();
		let factor = if delta_y < 0.0 { step } else { 1.0 / step };
		scene.viewport.zoom_by(at, factor);
	}

	fn key(&mut self, key: Key, scene: &mut Scene<'_>) -> Vec<Effect> {
		match key {
			Key::Escape => {
				self.pending_source = None;
				self.close_editor()
			}
			Key::Delete => {
				let Some(id) = self.selected.take() else {
					return Vec::new();
				};
				if self.pending_source == Some(id) {
					self.pending_source = None;
				}
				if self.hovered == Some(id) {
					self.hovered = None;
				}
				if scene.store.delete_node(id) {
					info!("deleted node {id}");
					scene.layout.set_link_count(scene.store.link_count());
					scene.layout.restart();
				}
				vec![Effect::CloseEditor, Effect::SaveNow]
			}
			Key::Save => vec![Effect::SaveNow],
		}
	}

	fn select(&mut self, id: NodeId) -> Vec<Effect> {
		self.selected = Some(id);
		vec![Effect::OpenEditor(id)]
	}

	fn close_editor(&mut self) -> Vec<Effect> {
		match self.selected.take() {
			Some(_) => vec![Effect::CloseEditor, Effect::SaveNow],
			None => Vec::new(),
		}
	}

	fn connect(&mut self, id: NodeId, scene: &mut Scene<'_>) -> Vec<Effect> {
		match self.pending_source {
			None => {
				debug!("connection source {id}");
				self.pending_source = Some(id);
				Vec::new()
			}
			Some(source) if source == id => {
				self.pending_source = None;
				Vec::new()
			}
			Some(source) => {
				self.pending_source = None;
				if scene.store.create_link(source, id, false).is_none() {
					return Vec::new();
				}
				scene.layout.set_link_count(scene.store.link_count());
				scene.layout.restart();
				vec![Effect::ScheduleSave]
			}
		}
	}

	fn create_root(&mut self, world: Point, scene: &mut Scene<'_>) -> Vec<Effect> {
		scene.store.create_node(world, NodeKind::Root, None);
		scene.layout.restart();
		vec![Effect::ScheduleSave]
	}

	fn spawn_child(&mut self, parent: NodeId, scene: &mut Scene<'_>) -> Vec<Effect> {
		let Some(origin) = scene.store.node(parent).map(|n| n.display_position()) else {
			return Vec::new();
		};
		let angle = self.rng.next_unit() * TAU;
		let at = Point::new(
			origin.x + angle.cos() * self.spawn_distance,
			origin.y + angle.sin() * self.spawn_distance,
		);
		let child = scene.store.create_node(at, NodeKind::Child, Some(parent));
		scene.store.create_link(parent, child, false);
		scene.layout.set_link_count(scene.store.link_count());
		scene.layout.restart();
		vec![Effect::ScheduleSave]
	}

	fn node_at(&self, at: Point, scene: &Scene<'_>) -> Option<NodeId> {
		let world = scene.viewport.screen_to_world(at);
		scene.store.node_at(world, self.config.hit_radius)
	}
}
