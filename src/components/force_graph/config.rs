//! Tunables for the layout, viewport, interaction and persistence layers.
//!
//! Every field has a default, so a partial JSON object is a valid config.

use serde::Deserialize;

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
	pub layout: LayoutConfig,
	pub viewport: ViewportConfig,
	pub interaction: InteractionConfig,
	pub sync: SyncConfig,
}

impl GraphConfig {
	pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
		serde_json::from_str(text)
	}
}

/// Force parameters of the layout simulation.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
	/// Many-body charge; negative values repel.
	pub repulsion_strength: f64,
	/// Rest length of every link, also the spawn distance of child nodes.
	pub link_distance: f64,
	pub link_strength: f64,
	/// Pull of every node toward the logical center of the viewport.
	pub gravity_strength: f64,
	/// Minimum separation radius per node.
	pub collision_radius: f64,
	/// Relaxation passes of the collision constraint per tick.
	pub collision_iterations: u32,
	/// Fraction of the remaining distance to `alpha_target` covered per tick.
	pub alpha_decay: f64,
	/// Below this alpha the simulation is considered settled and stops ticking.
	pub alpha_min: f64,
	/// Fraction of velocity lost per tick.
	pub velocity_decay: f64,
	/// Alpha a minor perturbation (resize, zoom end) raises the simulation to.
	pub alpha_boost: f64,
	/// Decay floor held while a node is dragged.
	pub drag_alpha_target: f64,
}

impl Default for LayoutConfig {
	fn default() -> Self {
		Self {
			repulsion_strength: -500.0,
			link_distance: 150.0,
			link_strength: 0.5,
			gravity_strength: 0.05,
			collision_radius: 50.0,
			collision_iterations: 3,
			alpha_decay: 1.0 - 0.001_f64.powf(1.0 / 300.0),
			alpha_min: 0.001,
			velocity_decay: 0.4,
			alpha_boost: 0.3,
			drag_alpha_target: 0.3,
		}
	}
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ViewportConfig {
	pub zoom_min: f64,
	pub zoom_max: f64,
	/// Scale factor applied per wheel notch.
	pub zoom_step: f64,
	/// Duration of the eased zoom transition; zero snaps.
	pub zoom_transition_ms: f64,
}

impl Default for ViewportConfig {
	fn default() -> Self {
		Self {
			zoom_min: 0.1,
			zoom_max: 5.0,
			zoom_step: 1.1,
			zoom_transition_ms: 250.0,
		}
	}
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct InteractionConfig {
	/// World-space radius within which a pointer hits a node.
	pub hit_radius: f64,
	/// World-space distance within which a pointer hits a link.
	pub link_hit_tolerance: f64,
	/// Screen-space movement after which a press counts as a drag, not a click.
	pub click_slop: f64,
	pub context_max_chars: usize,
	pub root_note_template: String,
}

impl Default for InteractionConfig {
	fn default() -> Self {
		Self {
			hit_radius: 20.0,
			link_hit_tolerance: 6.0,
			click_slop: 3.0,
			context_max_chars: 400,
			root_note_template: "# New note\n\n".into(),
		}
	}
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
	pub endpoint: String,
	pub debounce_ms: f64,
}

impl Default for SyncConfig {
	fn default() -> Self {
		Self {
			endpoint: "/api/graph".into(),
			debounce_ms: 500.0,
		}
	}
}
