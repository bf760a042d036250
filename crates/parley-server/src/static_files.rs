//! Static file responder for the browser client.

use std::path::{Component, Path, PathBuf};

use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use tracing::{debug, warn};

/// File served for `/`.
pub const INDEX_FILE: &str = "index.html";

/// Content type by extension: `.html` and `.js` are recognised, anything
/// else is plain text.
pub fn content_type_for(file: &str) -> &'static str {
    match Path::new(file).extension().and_then(|e| e.to_str()) {
        Some("html") => "text/html",
        Some("js") => "text/javascript",
        _ => "text/plain",
    }
}

/// Map a request path onto `root`.
///
/// The empty path maps to [`INDEX_FILE`]. Anything that is not a plain
/// relative path (`..`, absolute roots, prefixes) is refused.
pub fn resolve(root: &Path, request_path: &str) -> Option<PathBuf> {
    let relative = Path::new(request_path);
    let plain = relative
        .components()
        .all(|c| matches!(c, Component::Normal(_)));
    (plain && !request_path.is_empty()).then(|| root.join(relative))
}

/// Serve `request_path` (without its leading `/`) from `root`.
pub async fn serve(root: &Path, request_path: &str) -> Response {
    let file = if request_path.is_empty() {
        INDEX_FILE
    } else {
        request_path
    };

    let Some(path) = resolve(root, file) else {
        warn!(file, "refusing static path");
        return load_error(file);
    };

    match tokio::fs::read(&path).await {
        Ok(body) => {
            debug!(file, bytes = body.len(), "serving static file");
            ([(header::CONTENT_TYPE, content_type_for(file))], body).into_response()
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to load static file");
            load_error(file)
        }
    }
}

fn load_error(file: &str) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        format!("Error loading {file}"),
    )
        .into_response()
}
