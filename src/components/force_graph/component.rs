use std::cell::{Cell, RefCell};
use std::rc::Rc;

use leptos::prelude::*;
use leptos::task::spawn_local;
use log::{error, info, warn};
use wasm_bindgen::prelude::*;
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement, KeyboardEvent, MouseEvent, WheelEvent, Window};

use super::config::GraphConfig;
use super::controller::{InputEvent, Key, Modifiers, PointerButton};
use super::render;
use super::state::{EditorState, GraphSession};
use super::sync::{self, GraphDocument};
use super::types::Point;

type SharedSession = Rc<RefCell<Option<GraphSession>>>;

/// Longest frame step fed to the zoom transition, so a backgrounded tab does not jump.
const MAX_FRAME_MS: f64 = 100.0;

fn persist(endpoint: String, doc: GraphDocument) {
	spawn_local(async move {
		match sync::post_graph(&endpoint, &doc).await {
			Ok(()) => info!("saved graph: {} nodes, {} links", doc.nodes.len(), doc.links.len()),
			Err(e) => error!("failed to save graph: {e}"),
		}
	});
}

fn local_point(canvas_ref: NodeRef<leptos::html::Canvas>, ev: &MouseEvent) -> Option<Point> {
	let canvas: HtmlCanvasElement = canvas_ref.get()?.into();
	let rect = canvas.get_bounding_client_rect();
	Some(Point::new(
		ev.client_x() as f64 - rect.left(),
		ev.client_y() as f64 - rect.top(),
	))
}

fn modifiers(ev: &MouseEvent) -> Modifiers {
	Modifiers {
		ctrl: ev.ctrl_key(),
		meta: ev.meta_key(),
	}
}

fn is_typing(ev: &KeyboardEvent) -> bool {
	ev.target()
		.and_then(|t| t.dyn_into::<web_sys::Element>().ok())
		.is_some_and(|el| matches!(el.tag_name().as_str(), "TEXTAREA" | "INPUT"))
}

/// Routes input into the session and hands forced saves to the network.
#[derive(Clone)]
struct Dispatcher {
	session: SharedSession,
	editor: RwSignal<Option<EditorState>>,
	endpoint: String,
}

impl Dispatcher {
	fn send(&self, event: InputEvent) {
		let save = {
			let mut guard = self.session.borrow_mut();
			let Some(session) = guard.as_mut() else {
				return;
			};
			let save = session.handle(event, js_sys::Date::now());
			self.sync_editor(session);
			save
		};
		if let Some(doc) = save {
			persist(self.endpoint.clone(), doc);
		}
	}

	fn reset(&self) {
		let doc = {
			let mut guard = self.session.borrow_mut();
			let Some(session) = guard.as_mut() else {
				return;
			};
			let doc = session.reset();
			self.sync_editor(session);
			doc
		};
		if let Some(doc) = doc {
			persist(self.endpoint.clone(), doc);
		}
	}

	/// Only reopening or closing touches the signal; edits stay in the textarea.
	fn sync_editor(&self, session: &GraphSession) {
		let next = session.editor();
		let changed = self
			.editor
			.with_untracked(|current| current.as_ref().map(|e| e.node_id) != next.map(|e| e.node_id));
		if changed {
			self.editor.set(next.cloned());
		}
	}
}

#[component]
pub fn GraphNotesCanvas(
	#[prop(optional)] config: GraphConfig,
	#[prop(default = false)] fullscreen: bool,
	#[prop(default = None)] width: Option<f64>,
	#[prop(default = None)] height: Option<f64>,
) -> impl IntoView {
	let canvas_ref = NodeRef::<leptos::html::Canvas>::new();
	let state: SharedSession = Rc::new(RefCell::new(None));
	let editor = RwSignal::new(None::<EditorState>);
	let dispatcher = Dispatcher {
		session: state.clone(),
		editor,
		endpoint: config.sync.endpoint.clone(),
	};
	let animate: Rc<RefCell<Option<Closure<dyn FnMut()>>>> = Rc::new(RefCell::new(None));
	let resize_cb: Rc<RefCell<Option<Closure<dyn FnMut()>>>> = Rc::new(RefCell::new(None));
	let keydown_cb: Rc<RefCell<Option<Closure<dyn FnMut(KeyboardEvent)>>>> = Rc::new(RefCell::new(None));
	let (state_init, animate_init, resize_cb_init, keydown_init, dispatch_init) = (
		state.clone(),
		animate.clone(),
		resize_cb.clone(),
		keydown_cb.clone(),
		dispatcher.clone(),
	);

	Effect::new(move |_| {
		let Some(canvas) = canvas_ref.get() else {
			return;
		};
		if state_init.borrow().is_some() {
			return;
		}
		let canvas: HtmlCanvasElement = canvas.into();
		let Some(window) = web_sys::window() else {
			error!("no window; graph canvas not started");
			return;
		};

		let (w, h) = if fullscreen {
			window_size(&window)
		} else {
			(
				width.unwrap_or_else(|| {
					canvas
						.parent_element()
						.map(|p| p.client_width() as f64)
						.unwrap_or(800.0)
				}),
				height.unwrap_or_else(|| {
					canvas
						.parent_element()
						.map(|p| p.client_height() as f64)
						.unwrap_or(600.0)
				}),
			)
		};
		canvas.set_width(w as u32);
		canvas.set_height(h as u32);

		let Some(ctx) = canvas
			.get_context("2d")
			.ok()
			.flatten()
			.and_then(|c| c.dyn_into::<CanvasRenderingContext2d>().ok())
		else {
			error!("canvas 2d context unavailable");
			return;
		};
		let seed = js_sys::Date::now() as u64;
		*state_init.borrow_mut() = Some(GraphSession::new(config.clone(), w, h, seed));

		let (state_load, endpoint) = (state_init.clone(), config.sync.endpoint.clone());
		spawn_local(async move {
			match sync::fetch_graph(&endpoint).await {
				Ok(doc) => {
					if let Some(ref mut s) = *state_load.borrow_mut() {
						s.load(doc);
					}
				}
				Err(e) => {
					error!("failed to load graph: {e}");
					if let Some(ref mut s) = *state_load.borrow_mut() {
						s.load_failed();
					}
				}
			}
		});

		if fullscreen {
			let (dispatch_resize, canvas_resize) = (dispatch_init.clone(), canvas.clone());
			*resize_cb_init.borrow_mut() = Some(Closure::new(move || {
				let Some(win) = web_sys::window() else {
					return;
				};
				let (nw, nh) = window_size(&win);
				canvas_resize.set_width(nw as u32);
				canvas_resize.set_height(nh as u32);
				dispatch_resize.send(InputEvent::Resize {
					width: nw,
					height: nh,
				});
			}));
			if let Some(ref cb) = *resize_cb_init.borrow() {
				let _ = window.add_event_listener_with_callback("resize", cb.as_ref().unchecked_ref());
			}
		}

		let dispatch_key = dispatch_init.clone();
		*keydown_init.borrow_mut() = Some(Closure::new(move |ev: KeyboardEvent| {
			let key = match ev.key().as_str() {
				"Escape" => Some(Key::Escape),
				"Delete" if !is_typing(&ev) => Some(Key::Delete),
				"s" | "S" if ev.ctrl_key() || ev.meta_key() => {
					ev.prevent_default();
					Some(Key::Save)
				}
				_ => None,
			};
			if let Some(key) = key {
				dispatch_key.send(InputEvent::Key(key));
			}
		}));
		if let Some(ref cb) = *keydown_init.borrow() {
			let _ = window.add_event_listener_with_callback("keydown", cb.as_ref().unchecked_ref());
		}

		let (state_anim, animate_inner, endpoint) =
			(state_init.clone(), animate_init.clone(), config.sync.endpoint.clone());
		let last_frame = Rc::new(Cell::new(js_sys::Date::now()));
		*animate_init.borrow_mut() = Some(Closure::new(move || {
			let now = js_sys::Date::now();
			let dt = (now - last_frame.replace(now)).clamp(0.0, MAX_FRAME_MS);
			let save = if let Some(ref mut s) = *state_anim.borrow_mut() {
				let save = s.tick(dt, now);
				render::render(s, &ctx);
				save
			} else {
				None
			};
			if let Some(doc) = save {
				persist(endpoint.clone(), doc);
			}
			if let (Some(win), Some(cb)) = (web_sys::window(), animate_inner.borrow().as_ref()) {
				let _ = win.request_animation_frame(cb.as_ref().unchecked_ref());
			}
		}));
		if let Some(ref cb) = *animate_init.borrow() {
			let _ = window.request_animation_frame(cb.as_ref().unchecked_ref());
		}
	});

	let dispatch_md = dispatcher.clone();
	let on_mousedown = move |ev: MouseEvent| {
		let button = match ev.button() {
			0 => PointerButton::Primary,
			2 => PointerButton::Secondary,
			_ => return,
		};
		if let Some(at) = local_point(canvas_ref, &ev) {
			dispatch_md.send(InputEvent::PointerDown {
				at,
				button,
				modifiers: modifiers(&ev),
			});
		}
	};

	let dispatch_mm = dispatcher.clone();
	let on_mousemove = move |ev: MouseEvent| {
		if let Some(at) = local_point(canvas_ref, &ev) {
			dispatch_mm.send(InputEvent::PointerMove { at });
		}
	};

	let dispatch_mu = dispatcher.clone();
	let on_mouseup = move |ev: MouseEvent| {
		if let Some(at) = local_point(canvas_ref, &ev) {
			dispatch_mu.send(InputEvent::PointerUp { at });
		}
	};

	let dispatch_ml = dispatcher.clone();
	let on_mouseleave = move |_: MouseEvent| dispatch_ml.send(InputEvent::PointerLeave);

	let dispatch_click = dispatcher.clone();
	let on_click = move |ev: MouseEvent| {
		if let Some(at) = local_point(canvas_ref, &ev) {
			dispatch_click.send(InputEvent::Click {
				at,
				modifiers: modifiers(&ev),
			});
		}
	};

	let dispatch_ctx = dispatcher.clone();
	let on_contextmenu = move |ev: MouseEvent| {
		ev.prevent_default();
		if let Some(at) = local_point(canvas_ref, &ev) {
			dispatch_ctx.send(InputEvent::ContextMenu {
				at,
				modifiers: modifiers(&ev),
			});
		}
	};

	let dispatch_wh = dispatcher.clone();
	let on_wheel = move |ev: WheelEvent| {
		ev.prevent_default();
		if let Some(at) = local_point(canvas_ref, &ev) {
			dispatch_wh.send(InputEvent::Wheel {
				at,
				delta_y: ev.delta_y(),
			});
		}
	};

	let dispatch_reset = dispatcher.clone();
	let on_reset = move |_: MouseEvent| {
		let confirmed = web_sys::window()
			.and_then(|w| w.confirm_with_message("Delete every note in the graph?").ok())
			.unwrap_or(false);
		if confirmed {
			warn!("graph reset requested");
			dispatch_reset.reset();
		}
	};

	let dispatch_editor = StoredValue::new_local(dispatcher.clone());
	let editor_panel = move || {
		editor.get().map(|state| {
			view! {
				<aside class="note-editor">
					<header>
						<span class="note-editor-title">{format!("Note #{}", state.node_id)}</span>
						<button
							class="note-editor-close"
							on:click=move |_| dispatch_editor.with_value(|d| d.send(InputEvent::CloseEditor))
						>
							"×"
						</button>
					</header>
					<ul class="note-context">
						{state
							.context
							.into_iter()
							.map(|entry| {
								view! {
									<li>
										<strong>{entry.label}</strong>
										<p>{entry.text}</p>
									</li>
								}
							})
							.collect_view()}
					</ul>
					<textarea
						class="note-editor-text"
						prop:value=state.text
						on:input=move |ev| {
							let text = event_target_value(&ev);
							dispatch_editor.with_value(|d| d.send(InputEvent::NoteEdited(text)));
						}
					/>
				</aside>
			}
		})
	};

	view! {
		<div class="graph-notes">
			<canvas
				node_ref=canvas_ref
				class="force-graph-canvas"
				on:mousedown=on_mousedown
				on:mousemove=on_mousemove
				on:mouseup=on_mouseup
				on:mouseleave=on_mouseleave
				on:click=on_click
				on:contextmenu=on_contextmenu
				on:wheel=on_wheel
				style="display: block; cursor: grab;"
			/>
			<button class="graph-reset" on:click=on_reset>
				"Reset"
			</button>
			{editor_panel}
		</div>
	}
}

fn window_size(window: &Window) -> (f64, f64) {
	let read = |v: Result<JsValue, JsValue>, fallback: f64| v.ok().and_then(|v| v.as_f64()).unwrap_or(fallback);
	(read(window.inner_width(), 800.0), read(window.inner_height(), 600.0))
}
