//! Alpha-scheduled force simulation.
//!
//! Each tick accumulates repulsion, link springs and centering gravity into per-node
//! velocities scaled by alpha, integrates them, then relaxes the collision constraint.
//! Pinned nodes take their pin as position and are never displaced.

use std::collections::HashMap;

use log::trace;

use super::config::LayoutConfig;
use super::store::GraphStore;
use super::types::{NodeId, Point};

/// Squared distance below which repulsion is evaluated at this floor instead.
const MIN_DISTANCE_SQ: f64 = 1.0;
/// Cap on per-tick speed so that extreme configurations cannot overflow.
const MAX_SPEED: f64 = 1.0e4;

pub struct Simulation {
	config: LayoutConfig,
	alpha: f64,
	alpha_target: f64,
	charge_scale: f64,
	center: Point,
	velocities: HashMap<NodeId, Point>,
}

struct Body {
	id: NodeId,
	position: Point,
	velocity: Point,
	fixed: bool,
}

impl Simulation {
	pub fn new(config: LayoutConfig, center: Point) -> Self {
		Self {
			config,
			alpha: 1.0,
			alpha_target: 0.0,
			charge_scale: 1.0,
			center,
			velocities: HashMap::new(),
		}
	}

	pub fn config(&self) -> &LayoutConfig {
		&self.config
	}

	pub fn alpha(&self) -> f64 {
		self.alpha
	}

	pub fn alpha_target(&self) -> f64 {
		self.alpha_target
	}

	pub fn center(&self) -> Point {
		self.center
	}

	pub fn repulsion_strength(&self) -> f64 {
		self.config.repulsion_strength * self.charge_scale
	}

	pub fn is_active(&self) -> bool {
		self.alpha >= self.config.alpha_min
	}

	/// Full restart after a structural change.
	pub fn restart(&mut self) {
		self.alpha = 1.0;
	}

	/// Minor perturbation: raises alpha to the boost level without lowering it.
	pub fn reheat(&mut self) {
		self.alpha = self.alpha.max(self.config.alpha_boost);
	}

	/// Raises the decay floor while a node is held so the rest of the graph keeps moving.
	pub fn hold(&mut self) {
		self.alpha_target = self.config.drag_alpha_target;
		self.reheat();
	}

	pub fn release(&mut self) {
		self.alpha_target = 0.0;
	}

	pub fn set_center(&mut self, center: Point) {
		self.center = center;
	}

	/// Spreads the layout out as the graph densifies, up to twice the base repulsion.
	pub fn set_link_count(&mut self, link_count: usize) {
		self.charge_scale = (link_count as f64 / 5.0).clamp(1.0, 2.0);
	}

	/// Advances the simulation one step. Returns `false` when already settled.
	pub fn tick(&mut self, store: &mut GraphStore) -> bool {
		if !self.is_active() {
			return false;
		}
		self.alpha += (self.alpha_target - self.alpha) * self.config.alpha_decay;

		let mut bodies: Vec<Body> = store
			.nodes()
			.map(|n| Body {
				id: n.id,
				position: n.pinned.unwrap_or(n.position),
				velocity: self.velocities.get(&n.id).copied().unwrap_or_default(),
				fixed: n.pinned.is_some(),
			})
			.collect();
		let index: HashMap<NodeId, usize> = bodies.iter().enumerate().map(|(i, b)| (b.id, i)).collect();

		self.apply_repulsion(&mut bodies);
		self.apply_links(store, &index, &mut bodies);
		self.apply_gravity(&mut bodies);

		let retain = 1.0 - self.config.velocity_decay;
		for body in bodies.iter_mut() {
			if body.fixed {
				body.velocity = Point::default();
				continue;
			}
			body.velocity = clamp_speed(Point::new(body.velocity.x * retain, body.velocity.y * retain));
			let next = Point::new(body.position.x + body.velocity.x, body.position.y + body.velocity.y);
			if next.is_finite() {
				body.position = next;
			} else {
				body.velocity = Point::default();
			}
		}

		self.resolve_collisions(&mut bodies);

		for node in store.nodes_mut() {
			if let Some(&i) = index.get(&node.id) {
				if !bodies[i].fixed {
					node.position = bodies[i].position;
				}
			}
		}
		self.velocities = bodies.iter().map(|b| (b.id, b.velocity)).collect();
		trace!("tick alpha={:.4} nodes={}", self.alpha, bodies.len());
		true
	}

	fn apply_repulsion(&self, bodies: &mut [Body]) {
		let strength = self.repulsion_strength() * self.alpha;
		for i in 0..bodies.len() {
			for j in (i + 1)..bodies.len() {
				let (dx, dy) = separation(bodies[i].position, bodies[j].position, i, j);
				let l2 = (dx * dx + dy * dy).max(MIN_DISTANCE_SQ);
				// Negative strength pushes the pair apart along their separation.
				let (fx, fy) = (dx * strength / l2, dy * strength / l2);
				if !bodies[i].fixed {
					bodies[i].velocity.x += fx;
					bodies[i].velocity.y += fy;
				}
				if !bodies[j].fixed {
					bodies[j].velocity.x -= fx;
					bodies[j].velocity.y -= fy;
				}
			}
		}
	}

	fn apply_links(&self, store: &GraphStore, index: &HashMap<NodeId, usize>, bodies: &mut [Body]) {
		let mut degree = vec![0usize; bodies.len()];
		let resolved: Vec<(usize, usize)> = store
			.links()
			.iter()
			.filter_map(|l| Some((*index.get(&l.source)?, *index.get(&l.target)?)))
			.filter(|(s, t)| s != t)
			.collect();
		for &(s, t) in &resolved {
			degree[s] += 1;
			degree[t] += 1;
		}

		for &(s, t) in &resolved {
			let source = Point::new(
				bodies[s].position.x + bodies[s].velocity.x,
				bodies[s].position.y + bodies[s].velocity.y,
			);
			let target = Point::new(
				bodies[t].position.x + bodies[t].velocity.x,
				bodies[t].position.y + bodies[t].velocity.y,
			);
			let (dx, dy) = separation(source, target, s, t);
			let len = (dx * dx + dy * dy).sqrt().max(f64::EPSILON);
			let k = (len - self.config.link_distance) / len * self.alpha * self.config.link_strength;
			let (fx, fy) = (dx * k, dy * k);
			// Lower-degree endpoints move more.
			let bias = degree[s] as f64 / (degree[s] + degree[t]) as f64;
			if !bodies[t].fixed {
				bodies[t].velocity.x -= fx * bias;
				bodies[t].velocity.y -= fy * bias;
			}
			if !bodies[s].fixed {
				bodies[s].velocity.x += fx * (1.0 - bias);
				bodies[s].velocity.y += fy * (1.0 - bias);
			}
		}
	}

	fn apply_gravity(&self, bodies: &mut [Body]) {
		let k = self.config.gravity_strength * self.alpha;
		for body in bodies.iter_mut().filter(|b| !b.fixed) {
			body.velocity.x += (self.center.x - body.position.x) * k;
			body.velocity.y += (self.center.y - body.position.y) * k;
		}
	}

	fn resolve_collisions(&self, bodies: &mut [Body]) {
		let min_dist = self.config.collision_radius * 2.0;
		if min_dist <= 0.0 {
			return;
		}
		for _ in 0..self.config.collision_iterations {
			for i in 0..bodies.len() {
				for j in (i + 1)..bodies.len() {
					let (dx, dy) = separation(bodies[i].position, bodies[j].position, i, j);
					let dist = (dx * dx + dy * dy).sqrt();
					if dist >= min_dist {
						continue;
					}
					let dist = dist.max(f64::EPSILON);
					let overlap = min_dist - dist;
					let (ux, uy) = (dx / dist, dy / dist);
					let (wi, wj) = match (bodies[i].fixed, bodies[j].fixed) {
						(true, true) => continue,
						(true, false) => (0.0, 1.0),
						(false, true) => (1.0, 0.0),
						(false, false) => (0.5, 0.5),
					};
					bodies[i].position.x -= ux * overlap * wi;
					bodies[i].position.y -= uy * overlap * wi;
					bodies[j].position.x += ux * overlap * wj;
					bodies[j].position.y += uy * overlap * wj;
				}
			}
		}
	}
}

/// Vector from `a` to `b`, with a deterministic nudge when the two coincide so that
/// stacked nodes still get pushed apart.
fn separation(a: Point, b: Point, i: usize, j: usize) -> (f64, f64) {
	let (dx, dy) = (b.x - a.x, b.y - a.y);
	if dx == 0.0 && dy == 0.0 {
		let angle = (i * 31 + j * 17) as f64;
		return (angle.cos() * 1.0e-3, angle.sin() * 1.0e-3);
	}
	(dx, dy)
}

fn clamp_speed(v: Point) -> Point {
	if !v.is_finite() {
		return Point::default();
	}
	let speed = v.x.hypot(v.y);
	if speed <= MAX_SPEED {
		return v;
	}
	Point::new(v.x / speed * MAX_SPEED, v.y / speed * MAX_SPEED)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::components::force_graph::types::NodeKind;

	fn simulation() -> Simulation {
		Simulation::new(LayoutConfig::default(), Point::new(400.0, 300.0))
	}

	fn run(sim: &mut Simulation, store: &mut GraphStore, ticks: usize) {
		for _ in 0..ticks {
			sim.tick(store);
		}
	}

	#[test]
	fn empty_graph_ticks_and_settles() {
		let mut store = GraphStore::new("");
		let mut sim = simulation();
		assert!(sim.tick(&mut store));
		run(&mut sim, &mut store, 400);
		assert!(!sim.is_active());
		assert!(!sim.tick(&mut store));
	}

	#[test]
	fn alpha_decays_geometrically() {
		let mut store = GraphStore::new("");
		let mut sim = simulation();
		sim.tick(&mut store);
		let first = sim.alpha();
		sim.tick(&mut store);
		let second = sim.alpha();
		assert!(first < 1.0 && second < first);
		let ratio = (1.0 - sim.config().alpha_decay).powi(2);
		assert!((second - ratio).abs() < 1e-12);
	}

	#[test]
	fn restart_and_reheat() {
		let mut store = GraphStore::new("");
		let mut sim = simulation();
		run(&mut sim, &mut store, 400);
		sim.reheat();
		assert_eq!(sim.alpha(), sim.config().alpha_boost);
		sim.restart();
		assert_eq!(sim.alpha(), 1.0);
		sim.reheat();
		assert_eq!(sim.alpha(), 1.0);
	}

	#[test]
	fn hold_keeps_simulation_alive_until_release() {
		let mut store = GraphStore::new("");
		let mut sim = simulation();
		sim.hold();
		run(&mut sim, &mut store, 2000);
		assert!(sim.is_active());
		assert!((sim.alpha() - sim.config().drag_alpha_target).abs() < 1e-3);
		sim.release();
		assert_eq!(sim.alpha_target(), 0.0);
		run(&mut sim, &mut store, 2000);
		assert!(!sim.is_active());
	}

	#[test]
	fn coincident_nodes_are_separated_without_nan() {
		let mut store = GraphStore::new("");
		for _ in 0..5 {
			store.create_node(Point::new(10.0, 10.0), NodeKind::Root, None);
		}
		let mut sim = simulation();
		run(&mut sim, &mut store, 300);
		let positions: Vec<Point> = store.nodes().map(|n| n.position).collect();
		assert!(positions.iter().all(|p| p.is_finite()));
		for (i, a) in positions.iter().enumerate() {
			for b in &positions[i + 1..] {
				assert!(a.distance(*b) > 1.0);
			}
		}
	}

	#[test]
	fn linked_pair_settles_near_rest_length() {
		let mut store = GraphStore::new("");
		let a = store.create_node(Point::new(0.0, 0.0), NodeKind::Root, None);
		let b = store.create_node(Point::new(600.0, 0.0), NodeKind::Root, None);
		store.create_link(a, b, false);
		let mut sim = simulation();
		run(&mut sim, &mut store, 600);
		let d = store.node(a).unwrap().position.distance(store.node(b).unwrap().position);
		assert!(d > 100.0 && d < 400.0, "distance {d}");
	}

	#[test]
	fn pinned_node_does_not_move() {
		let mut store = GraphStore::new("");
		let a = store.create_node(Point::new(0.0, 0.0), NodeKind::Root, None);
		let b = store.create_node(Point::new(5.0, 0.0), NodeKind::Root, None);
		store.create_link(a, b, false);
		store.node_mut(a).unwrap().pinned = Some(Point::new(-50.0, 20.0));
		let mut sim = simulation();
		run(&mut sim, &mut store, 50);
		assert_eq!(store.node(a).unwrap().position, Point::new(0.0, 0.0));
		assert_eq!(store.node(a).unwrap().display_position(), Point::new(-50.0, 20.0));
		assert!(store.node(b).unwrap().position.distance(Point::new(-50.0, 20.0)) >= 99.0);
	}

	#[test]
	fn collision_keeps_minimum_separation() {
		let mut store = GraphStore::new("");
		store.create_node(Point::new(0.0, 0.0), NodeKind::Root, None);
		store.create_node(Point::new(10.0, 0.0), NodeKind::Root, None);
		let mut config = LayoutConfig::default();
		config.repulsion_strength = 0.0;
		config.gravity_strength = 0.0;
		let mut sim = Simulation::new(config, Point::default());
		sim.tick(&mut store);
		let p: Vec<Point> = store.nodes().map(|n| n.position).collect();
		assert!((p[0].distance(p[1]) - 100.0).abs() < 1e-6);
	}

	#[test]
	fn repulsion_scales_with_link_count_up_to_double() {
		let mut sim = simulation();
		sim.set_link_count(0);
		assert_eq!(sim.repulsion_strength(), -500.0);
		sim.set_link_count(7);
		assert!((sim.repulsion_strength() + 700.0).abs() < 1e-9);
		sim.set_link_count(50);
		assert_eq!(sim.repulsion_strength(), -1000.0);
	}

	#[test]
	fn gravity_pulls_lone_node_toward_center() {
		let mut store = GraphStore::new("");
		let id = store.create_node(Point::new(1000.0, 1000.0), NodeKind::Root, None);
		let mut sim = simulation();
		let before = store.node(id).unwrap().position.distance(sim.center());
		run(&mut sim, &mut store, 100);
		let after = store.node(id).unwrap().position.distance(sim.center());
		assert!(after < before);
	}
}
