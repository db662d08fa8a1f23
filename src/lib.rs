//! Leptos client-side app for a spatial note graph.

use leptos::prelude::*;
use leptos_meta::*;
use leptos_router::components::*;
use leptos_router::path;
use log::{Level, info, warn};
use wasm_bindgen::JsCast;
use web_sys::HtmlScriptElement;

// Modules
mod components;
mod pages;

// Top-Level pages
use crate::components::force_graph::GraphConfig;
use crate::pages::home::Home;
use crate::pages::not_found::NotFound;

/// Initialize logging and panic hooks for the WASM target.
pub fn init_logging() {
	let _ = console_log::init_with_level(Level::Debug);
	console_error_panic_hook::set_once();
	info!("Logging initialized");
}

/// Reads overrides from a `<script id="graph-config">` JSON block, falling back to defaults.
fn load_config() -> GraphConfig {
	let text = web_sys::window()
		.and_then(|w| w.document())
		.and_then(|d| d.get_element_by_id("graph-config"))
		.and_then(|el| el.dyn_into::<HtmlScriptElement>().ok())
		.and_then(|script| script.text().ok());
	let Some(text) = text else {
		return GraphConfig::default();
	};
	match GraphConfig::from_json(&text) {
		Ok(config) => {
			info!("loaded graph config, endpoint {}", config.sync.endpoint);
			config
		}
		Err(e) => {
			warn!("failed to parse graph config: {e}");
			GraphConfig::default()
		}
	}
}

/// An app router which renders the note graph and handles 404's
#[component]
pub fn App() -> impl IntoView {
	provide_meta_context();
	let config = load_config();

	view! {
		<Html attr:lang="en" attr:dir="ltr" attr:data-theme="dark" />

		<Title text="Graph Notes" />

		<Meta charset="UTF-8" />
		<Meta name="viewport" content="width=device-width, initial-scale=1.0" />

		<Router>
			<Routes fallback=|| view! { <NotFound /> }>
				<Route path=path!("/") view=move || view! { <Home config=config.clone() /> } />
			</Routes>
		</Router>
	}
}
