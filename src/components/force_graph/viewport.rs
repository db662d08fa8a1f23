use super::config::ViewportConfig;
use super::types::Point;

/// Screen = world * k + (x, y).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewTransform {
	pub x: f64,
	pub y: f64,
	pub k: f64,
}

impl Default for ViewTransform {
	fn default() -> Self {
		Self { x: 0.0, y: 0.0, k: 1.0 }
	}
}

impl ViewTransform {
	pub fn apply(&self, world: Point) -> Point {
		Point::new(world.x * self.k + self.x, world.y * self.k + self.y)
	}

	pub fn invert(&self, screen: Point) -> Point {
		Point::new((screen.x - self.x) / self.k, (screen.y - self.y) / self.k)
	}

	fn lerp(&self, other: &ViewTransform, t: f64) -> ViewTransform {
		ViewTransform {
			x: self.x + (other.x - self.x) * t,
			y: self.y + (other.y - self.y) * t,
			k: self.k + (other.k - self.k) * t,
		}
	}
}

#[derive(Clone, Debug)]
struct ZoomTransition {
	from: ViewTransform,
	to: ViewTransform,
	elapsed_ms: f64,
}

/// Pan/zoom state between pointer (screen) space and graph (world) space.
///
/// Zooming eases toward a target transform; `transform()` is always the currently
/// displayed one, and every conversion uses it.
#[derive(Clone, Debug)]
pub struct Viewport {
	config: ViewportConfig,
	current: ViewTransform,
	transition: Option<ZoomTransition>,
	width: f64,
	height: f64,
}

impl Viewport {
	pub fn new(config: ViewportConfig, width: f64, height: f64) -> Self {
		Self {
			config,
			current: ViewTransform::default(),
			transition: None,
			width,
			height,
		}
	}

	pub fn transform(&self) -> ViewTransform {
		self.current
	}

	/// The transform the viewport will rest at once any running zoom transition ends.
	pub fn target(&self) -> ViewTransform {
		self.transition.as_ref().map_or(self.current, |t| t.to)
	}

	pub fn scale(&self) -> f64 {
		self.current.k
	}

	pub fn zoom_step(&self) -> f64 {
		self.config.zoom_step
	}

	pub fn size(&self) -> (f64, f64) {
		(self.width, self.height)
	}

	/// Logical center the layout gravitates toward.
	pub fn center(&self) -> Point {
		Point::new(self.width / 2.0, self.height / 2.0)
	}

	pub fn is_animating(&self) -> bool {
		self.transition.is_some()
	}

	pub fn screen_to_world(&self, screen: Point) -> Point {
		self.current.invert(screen)
	}

	pub fn world_to_screen(&self, world: Point) -> Point {
		self.current.apply(world)
	}

	/// Zooms to `new_scale` keeping the world point under `anchor` fixed on screen.
	///
	/// The anchor is resolved against the target transform so that wheel notches arriving
	/// mid-transition compound instead of fighting the animation.
	pub fn zoom_at(&mut self, anchor: Point, new_scale: f64) {
		let base = self.target();
		let k = new_scale.clamp(self.config.zoom_min, self.config.zoom_max);
		let world = base.invert(anchor);
		let to = ViewTransform {
			x: anchor.x - world.x * k,
			y: anchor.y - world.y * k,
			k,
		};
		if to == base {
			return;
		}
		if self.config.zoom_transition_ms <= 0.0 {
			self.current = to;
			self.transition = None;
			return;
		}
		self.transition = Some(ZoomTransition {
			from: self.current,
			to,
			elapsed_ms: 0.0,
		});
	}

	pub fn zoom_by(&mut self, anchor: Point, factor: f64) {
		let k = self.target().k * factor;
		self.zoom_at(anchor, k);
	}

	/// Screen-space pan; also shifts any running transition so the zoom anchor follows.
	pub fn pan_by(&mut self, dx: f64, dy: f64) {
		self.current.x += dx;
		self.current.y += dy;
		if let Some(t) = self.transition.as_mut() {
			for transform in [&mut t.from, &mut t.to] {
				transform.x += dx;
				transform.y += dy;
			}
		}
	}

	/// Steps the zoom transition. Returns `true` on the step the transition ends.
	pub fn advance(&mut self, dt_ms: f64) -> bool {
		let Some(t) = self.transition.as_mut() else {
			return false;
		};
		t.elapsed_ms += dt_ms;
		let progress = (t.elapsed_ms / self.config.zoom_transition_ms).min(1.0);
		self.current = t.from.lerp(&t.to, ease_out_cubic(progress));
		if progress >= 1.0 {
			self.current = t.to;
			self.transition = None;
			return true;
		}
		false
	}

	/// Updates the logical size. The transform itself is left alone.
	pub fn resize(&mut self, width: f64, height: f64) {
		self.width = width;
		self.height = height;
	}
}

fn ease_out_cubic(t: f64) -> f64 {
	1.0 - (1.0 - t).powi(3)
}

#[cfg(test)]
mod tests {
	use super::*;

	const EPS: f64 = 1e-9;

	fn close(a: Point, b: Point) -> bool {
		(a.x - b.x).abs() < EPS && (a.y - b.y).abs() < EPS
	}

	fn snapping() -> Viewport {
		let config = ViewportConfig {
			zoom_transition_ms: 0.0,
			..ViewportConfig::default()
		};
		Viewport::new(config, 800.0, 600.0)
	}

	#[test]
	fn screen_world_round_trip() {
		let mut vp = snapping();
		vp.pan_by(-37.5, 120.25);
		vp.zoom_at(Point::new(13.0, 400.0), 2.75);
		for p in [Point::new(0.0, 0.0), Point::new(-1234.5, 987.25), Point::new(1e6, -1e-3)] {
			let back = vp.screen_to_world(vp.world_to_screen(p));
			assert!((back.x - p.x).abs() < 1e-6 * p.x.abs().max(1.0));
			assert!((back.y - p.y).abs() < 1e-6 * p.y.abs().max(1.0));
		}
	}

	#[test]
	fn zoom_keeps_anchor_fixed() {
		let mut vp = snapping();
		vp.pan_by(50.0, -20.0);
		let anchor = Point::new(300.0, 200.0);
		let world = vp.screen_to_world(anchor);
		vp.zoom_at(anchor, 3.0);
		assert_eq!(vp.scale(), 3.0);
		assert!(close(vp.world_to_screen(world), anchor));
	}

	#[test]
	fn zoom_is_clamped() {
		let mut vp = snapping();
		vp.zoom_at(Point::new(10.0, 10.0), 100.0);
		assert_eq!(vp.scale(), 5.0);
		vp.zoom_at(Point::new(10.0, 10.0), 0.0001);
		assert_eq!(vp.scale(), 0.1);
		vp.zoom_by(Point::new(10.0, 10.0), 0.5);
		assert_eq!(vp.scale(), 0.1);
	}

	#[test]
	fn repeated_zoom_at_same_scale_is_idempotent() {
		let mut vp = snapping();
		let anchor = Point::new(123.0, 456.0);
		vp.zoom_at(anchor, 1.7);
		let once = vp.transform();
		vp.zoom_at(anchor, 1.7);
		vp.zoom_at(anchor, 1.7);
		let thrice = vp.transform();
		assert!((once.x - thrice.x).abs() < EPS);
		assert!((once.y - thrice.y).abs() < EPS);
		assert!((once.k - thrice.k).abs() < EPS);
	}

	#[test]
	fn pan_translates_in_screen_space() {
		let mut vp = snapping();
		vp.zoom_at(Point::new(0.0, 0.0), 2.0);
		let before = vp.screen_to_world(Point::new(100.0, 100.0));
		vp.pan_by(20.0, -10.0);
		let after = vp.screen_to_world(Point::new(100.0, 100.0));
		assert!(close(after, Point::new(before.x - 10.0, before.y + 5.0)));
	}

	#[test]
	fn zoom_transition_eases_then_reports_end() {
		let mut vp = Viewport::new(ViewportConfig::default(), 800.0, 600.0);
		let anchor = Point::new(400.0, 300.0);
		vp.zoom_at(anchor, 2.0);
		assert!(vp.is_animating());
		assert_eq!(vp.scale(), 1.0);
		assert_eq!(vp.target().k, 2.0);

		assert!(!vp.advance(100.0));
		let mid = vp.scale();
		assert!(mid > 1.0 && mid < 2.0);

		assert!(vp.advance(200.0));
		assert!(!vp.is_animating());
		assert_eq!(vp.scale(), 2.0);
		assert!(!vp.advance(16.0));
		assert!(close(vp.world_to_screen(Point::new(400.0, 300.0)), anchor));
	}

	#[test]
	fn wheel_notches_compound_against_target() {
		let mut vp = Viewport::new(ViewportConfig::default(), 800.0, 600.0);
		let anchor = Point::new(10.0, 10.0);
		vp.zoom_by(anchor, 2.0);
		vp.advance(50.0);
		vp.zoom_by(anchor, 2.0);
		assert_eq!(vp.target().k, 4.0);
		vp.advance(1000.0);
		assert_eq!(vp.scale(), 4.0);
	}

	#[test]
	fn resize_moves_center_but_not_transform() {
		let mut vp = snapping();
		vp.pan_by(5.0, 5.0);
		let t = vp.transform();
		vp.resize(1000.0, 200.0);
		assert_eq!(vp.transform(), t);
		assert_eq!(vp.center(), Point::new(500.0, 100.0));
	}
}
