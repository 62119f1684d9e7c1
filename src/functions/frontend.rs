use axum::http::{Method, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};

const INDEX: &str = "index.html";

#[cfg(feature = "embedded-frontend")]
#[derive(rust_embed::Embed)]
#[folder = "frontend"]
struct Assets;

/// Serves the UI shell at `/` and the files next to it. Paths without an
/// extension get the shell; a missing file with an extension is a 404.
pub async fn serve_frontend(method: Method, uri: Uri) -> Response {
    if method != Method::GET && method != Method::HEAD {
        return not_found();
    }

    let requested = uri.path().trim_start_matches('/');
    let wants_file = requested.rsplit('/').next().is_some_and(|name| name.contains('.'));
    let name = if wants_file { requested } else { INDEX };

    match lookup(name) {
        Some((content_type, body)) => ([(header::CONTENT_TYPE, content_type)], body).into_response(),
        None => not_found(),
    }
}

#[cfg(feature = "embedded-frontend")]
fn lookup(name: &str) -> Option<(String, Vec<u8>)> {
    let file = Assets::get(name)?;
    let content_type = mime_guess::from_path(name).first_or_octet_stream().to_string();
    Some((content_type, file.data.into_owned()))
}

#[cfg(not(feature = "embedded-frontend"))]
fn lookup(name: &str) -> Option<(String, Vec<u8>)> {
    (name == INDEX).then(|| {
        let page = "<!doctype html><title>hookstore</title>\
                    <p>Frontend not embedded in this build. Recent events: \
                    <a href=\"/api/events\">/api/events</a></p>";
        ("text/html".to_string(), page.as_bytes().to_vec())
    })
}

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, "not found").into_response()
}
