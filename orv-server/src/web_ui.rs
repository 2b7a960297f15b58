//! Embedded viewer UI
//!
//! `ui.html` is assembled by the build script from the sources in `src/ui/`.

use axum::response::Html;

/// Serve the embedded viewer page
pub async fn serve_ui() -> Html<&'static str> {
    Html(include_str!("ui.html"))
}
