use std::f64::consts::PI;

use wasm_bindgen::JsValue;
use web_sys::CanvasRenderingContext2d;

use super::state::GraphSession;
use super::types::{GraphNode, NodeKind};

const BACKGROUND: &str = "#1a1a2e";
const LABEL_CHARS: usize = 24;

fn node_radius(kind: NodeKind) -> f64 {
	match kind {
		NodeKind::Root => 14.0,
		NodeKind::Child => 10.0,
		NodeKind::Breaker => 6.0,
	}
}

fn node_color(kind: NodeKind) -> &'static str {
	match kind {
		NodeKind::Root => "#1f77b4",
		NodeKind::Child => "#2ca02c",
		NodeKind::Breaker => "#d62728",
	}
}

pub fn render(session: &GraphSession, ctx: &CanvasRenderingContext2d) {
	let (width, height) = session.viewport.size();
	let t = session.viewport.transform();
	ctx.set_fill_style_str(BACKGROUND);
	ctx.fill_rect(0.0, 0.0, width, height);
	ctx.save();
	let _ = ctx.translate(t.x, t.y);
	let _ = ctx.scale(t.k, t.k);
	draw_links(session, ctx, t.k);
	draw_nodes(session, ctx, t.k);
	ctx.restore();
}

fn draw_links(session: &GraphSession, ctx: &CanvasRenderingContext2d, k: f64) {
	let (line_width, arrow_size) = (1.5 / k, 8.0 / k);
	let store = &session.store;

	for link in store.links() {
		let (Some(a), Some(b)) = (store.node(link.source), store.node(link.target)) else {
			continue;
		};
		let (p1, p2) = (a.display_position(), b.display_position());
		let (dx, dy) = (p2.x - p1.x, p2.y - p1.y);
		let dist = (dx * dx + dy * dy).sqrt();
		if dist < 0.001 {
			continue;
		}
		let (r1, r2) = (node_radius(a.kind), node_radius(b.kind));
		let (ux, uy) = (dx / dist, dy / dist);

		ctx.set_stroke_style_str("rgba(100, 180, 255, 0.6)");
		ctx.set_line_width(line_width);
		if link.is_breaker_segment {
			let _ = ctx.set_line_dash(&js_sys::Array::of2(
				&JsValue::from_f64(6.0 / k),
				&JsValue::from_f64(4.0 / k),
			));
		}
		ctx.begin_path();
		ctx.move_to(p1.x + ux * r1, p1.y + uy * r1);
		ctx.line_to(p2.x - ux * (r2 + arrow_size), p2.y - uy * (r2 + arrow_size));
		ctx.stroke();
		let _ = ctx.set_line_dash(&js_sys::Array::new());

		ctx.set_fill_style_str("rgba(100, 180, 255, 0.8)");
		let (tip_x, tip_y) = (p2.x - ux * r2, p2.y - uy * r2);
		let (back_x, back_y) = (tip_x - ux * arrow_size, tip_y - uy * arrow_size);
		let (px, py) = (-uy * arrow_size * 0.5, ux * arrow_size * 0.5);
		ctx.begin_path();
		ctx.move_to(tip_x, tip_y);
		ctx.line_to(back_x + px, back_y + py);
		ctx.line_to(back_x - px, back_y - py);
		ctx.close_path();
		ctx.fill();
	}
}

fn draw_nodes(session: &GraphSession, ctx: &CanvasRenderingContext2d, k: f64) {
	let controller = &session.controller;
	for node in session.store.nodes() {
		let p = node.display_position();
		let radius = node_radius(node.kind);

		if controller.hovered() == Some(node.id) {
			draw_glow(ctx, node, radius);
		}

		ctx.begin_path();
		if node.kind == NodeKind::Breaker {
			ctx.rect(p.x - radius, p.y - radius, radius * 2.0, radius * 2.0);
		} else {
			let _ = ctx.arc(p.x, p.y, radius, 0.0, 2.0 * PI);
		}
		ctx.set_fill_style_str(node_color(node.kind));
		ctx.fill();

		if controller.selected() == Some(node.id) {
			ring(ctx, node, radius + 3.0 / k, "rgba(255, 255, 255, 0.9)", 2.0 / k);
		}
		if controller.pending_source() == Some(node.id) {
			let _ = ctx.set_line_dash(&js_sys::Array::of2(
				&JsValue::from_f64(4.0 / k),
				&JsValue::from_f64(3.0 / k),
			));
			ring(ctx, node, radius + 6.0 / k, "#ff7f0e", 2.0 / k);
			let _ = ctx.set_line_dash(&js_sys::Array::new());
		}

		if let Some(title) = node.title() {
			let label: String = title.chars().take(LABEL_CHARS).collect();
			ctx.set_fill_style_str("rgba(255, 255, 255, 0.8)");
			ctx.set_font(&format!("{}px sans-serif", 11.0 / k.max(0.5)));
			let _ = ctx.fill_text(&label, p.x + radius + 4.0, p.y + 4.0);
		}
	}
}

fn ring(ctx: &CanvasRenderingContext2d, node: &GraphNode, radius: f64, color: &str, width: f64) {
	let p = node.display_position();
	ctx.begin_path();
	let _ = ctx.arc(p.x, p.y, radius, 0.0, 2.0 * PI);
	ctx.set_stroke_style_str(color);
	ctx.set_line_width(width);
	ctx.stroke();
}

fn draw_glow(ctx: &CanvasRenderingContext2d, node: &GraphNode, radius: f64) {
	let p = node.display_position();
	let glow_radius = radius * 2.4;
	let Ok(gradient) = ctx.create_radial_gradient(p.x, p.y, radius * 0.3, p.x, p.y, glow_radius) else {
		return;
	};
	let _ = gradient.add_color_stop(0.0, "rgba(255, 255, 255, 0.35)");
	let _ = gradient.add_color_stop(0.6, "rgba(200, 220, 255, 0.1)");
	let _ = gradient.add_color_stop(1.0, "rgba(255, 255, 255, 0)");
	ctx.begin_path();
	let _ = ctx.arc(p.x, p.y, glow_radius, 0.0, 2.0 * PI);
	#[allow(deprecated)]
	ctx.set_fill_style(&gradient);
	ctx.fill();
}
