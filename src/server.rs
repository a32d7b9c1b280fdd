//! HTTP surface: the JSON event endpoint plus static file delivery with
//! bridge injection.
//!
//! Static delivery is deliberately plain — bytes off disk and an
//! extension-derived content type. The one piece of magic is that HTML
//! documents get the bridge script injected before they leave the server.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, StatusCode, Uri};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};

use crate::action::{EventRequest, UpdateAction, EVENT_ENDPOINT};
use crate::bridge::inject_bridge;
use crate::dispatch::DispatchEngine;
use crate::{ServeError, ServeOptions};

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Shared state of the HTTP handlers.
#[derive(Clone)]
struct AppState {
    engine: Arc<DispatchEngine>,
    root: Arc<PathBuf>,
}

/// Build the router: the event endpoint plus a static fallback over `root`.
pub fn router(engine: Arc<DispatchEngine>, root: PathBuf) -> Router {
    Router::new()
        .route(EVENT_ENDPOINT, get(poll_events).post(handle_event))
        .fallback(get(serve_file))
        .with_state(AppState {
            engine,
            root: Arc::new(root),
        })
}

/// Serve `opts.root` on `opts.port` until the process ends.
pub async fn serve(engine: Arc<DispatchEngine>, opts: ServeOptions) -> Result<(), ServeError> {
    let root = resolve_root(opts.root);

    if opts.watch {
        tracing::warn!("file watching restarts the whole process on change; never enable it in production");
        tokio::spawn(crate::watch::watch(root.clone(), opts.watch_interval));
    }

    let app = router(engine, root.clone());
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", opts.port))
        .await
        .map_err(|source| ServeError::Bind {
            port: opts.port,
            source,
        })?;

    tracing::info!(root = %root.display(), port = opts.port, "serving");
    axum::serve(listener, app).await?;
    Ok(())
}

/// A root that is not a directory falls back to the current working
/// directory, with a warning rather than an error.
fn resolve_root(root: PathBuf) -> PathBuf {
    if root.is_dir() {
        return root;
    }
    tracing::warn!(root = %root.display(), "serve root is not a directory, using the current directory");
    std::env::current_dir().unwrap_or(root)
}

// ---------------------------------------------------------------------------
// Event endpoint
// ---------------------------------------------------------------------------

/// GET on the event endpoint: nothing is queued for pull, answer an empty
/// action array. Kept for clients probing the endpoint.
async fn poll_events() -> Json<Vec<UpdateAction>> {
    Json(Vec::new())
}

/// POST on the event endpoint: parse, dispatch, answer the queued actions.
async fn handle_event(State(state): State<AppState>, body: Bytes) -> Response {
    let request: EventRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(error) => {
            tracing::warn!(%error, "rejecting malformed event payload");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Dynamic handler error: {error}"),
            )
                .into_response();
        }
    };

    tracing::debug!(
        selector = %request.selector,
        event = %request.event,
        snapshot_len = request.snapshot.len(),
        "dispatching event"
    );

    // Handlers are synchronous user code; keep them off the async workers. A
    // panicking handler surfaces here as a join error instead of taking the
    // connection task down.
    let engine = Arc::clone(&state.engine);
    let dispatched = tokio::task::spawn_blocking(move || {
        engine.dispatch(&request.selector, &request.event, request.snapshot)
    })
    .await;

    match dispatched {
        Ok(actions) => Json(actions).into_response(),
        Err(error) => {
            tracing::error!(%error, "handler task aborted");
            (StatusCode::INTERNAL_SERVER_ERROR, "Dynamic handler error").into_response()
        }
    }
}

// ---------------------------------------------------------------------------
// Static files
// ---------------------------------------------------------------------------

async fn serve_file(State(state): State<AppState>, uri: Uri) -> Response {
    let Some(file_path) = resolve_request_path(&state.root, uri.path()) else {
        return not_found();
    };

    let bytes = match tokio::fs::read(&file_path).await {
        Ok(bytes) => bytes,
        Err(_) => return not_found(),
    };

    let content_type = content_type_for(&file_path);
    if content_type == "text/html" {
        // Injection needs text; HTML that is not valid UTF-8 goes out untouched.
        return match String::from_utf8(bytes) {
            Ok(html) => Html(inject_bridge(&html)).into_response(),
            Err(raw) => ([(header::CONTENT_TYPE, content_type)], raw.into_bytes()).into_response(),
        };
    }

    ([(header::CONTENT_TYPE, content_type)], bytes).into_response()
}

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, "File Not Found").into_response()
}

/// Map a request path onto the served root. `/` resolves to `index.html`;
/// absolute paths and paths with non-normal components (`..`, `.`) resolve
/// to nothing.
fn resolve_request_path(root: &Path, request_path: &str) -> Option<PathBuf> {
    if request_path == "/" {
        return Some(root.join("index.html"));
    }

    let relative = request_path.trim_start_matches('/');
    let candidate = Path::new(relative);
    if candidate.as_os_str().is_empty()
        || candidate
            .components()
            .any(|component| !matches!(component, Component::Normal(_)))
    {
        return None;
    }
    Some(root.join(candidate))
}

/// Content type by file extension, octet-stream for anything unknown.
fn content_type_for(path: &Path) -> &'static str {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("html") | Some("htm") => "text/html",
        Some("css") => "text/css",
        Some("js") => "application/javascript",
        Some("json") => "application/json",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        Some("ico") => "image/x-icon",
        Some("txt") => "text/plain",
        Some("wasm") => "application/wasm",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_maps_to_index() {
        let resolved = resolve_request_path(Path::new("/site"), "/");
        assert_eq!(resolved, Some(PathBuf::from("/site/index.html")));
    }

    #[test]
    fn nested_path_resolves_under_root() {
        let resolved = resolve_request_path(Path::new("/site"), "/css/app.css");
        assert_eq!(resolved, Some(PathBuf::from("/site/css/app.css")));
    }

    #[test]
    fn parent_escapes_resolve_to_nothing() {
        assert_eq!(resolve_request_path(Path::new("/site"), "/../secret"), None);
        assert_eq!(
            resolve_request_path(Path::new("/site"), "/a/../../secret"),
            None
        );
        assert_eq!(resolve_request_path(Path::new("/site"), "/./a"), None);
    }

    #[test]
    fn content_types_by_extension() {
        assert_eq!(content_type_for(Path::new("a.html")), "text/html");
        assert_eq!(content_type_for(Path::new("a.css")), "text/css");
        assert_eq!(content_type_for(Path::new("a.js")), "application/javascript");
        assert_eq!(content_type_for(Path::new("a.bin")), "application/octet-stream");
        assert_eq!(content_type_for(Path::new("noext")), "application/octet-stream");
    }
}
