use leptos::prelude::*;

use crate::components::force_graph::{GraphConfig, GraphNotesCanvas};

const CONTROLS: [(&str, &str); 8] = [
	("Click", "open a note"),
	("Ctrl/Cmd + click background", "new note"),
	("Right-click note", "spawn a child note"),
	("Ctrl/Cmd + click two notes", "link them"),
	("Ctrl/Cmd + click link", "insert a breaker"),
	("Drag", "move a note or pan"),
	("Wheel", "zoom"),
	("Ctrl/Cmd + S, Delete, Esc", "save, delete note, close"),
];

/// Full-window note graph with a control legend.
#[component]
pub fn Home(config: GraphConfig) -> impl IntoView {
	view! {
		<ErrorBoundary fallback=|errors| {
			view! {
				<h1>"Uh oh! Something went wrong!"</h1>

				<p>"Errors: "</p>
				<ul>
					{move || {
						errors
							.get()
							.into_iter()
							.map(|(_, e)| view! { <li>{e.to_string()}</li> })
							.collect_view()
					}}
				</ul>
			}
		}>

			<div class="fullscreen-graph">
				<GraphNotesCanvas config=config fullscreen=true />
				<div class="graph-overlay">
					<h1>"Graph Notes"</h1>
					<ul class="controls">
						{CONTROLS
							.iter()
							.map(|(keys, action)| view! { <li><kbd>{*keys}</kbd>" "{*action}</li> })
							.collect_view()}
					</ul>
				</div>
			</div>
		</ErrorBoundary>
	}
}
