use axum::{
    http::{StatusCode, Uri, header},
    response::{Html, IntoResponse, Response},
};
use rust_embed::RustEmbed;

#[derive(RustEmbed)]
#[folder = "assets/"]
#[include = "*.html"]
#[include = "*.css"]
#[include = "*.js"]
#[include = "*.svg"]
pub struct Assets;

/// Served when the embedded dashboard is missing from the build.
const FALLBACK_INDEX: &str = r#"<!doctype html>
<html><head><title>ChatRelay</title></head>
<body><h1>ChatRelay</h1><p>Status is available at <a href="/api/status">/api/status</a>.</p></body>
</html>"#;

pub async fn static_handler(uri: Uri) -> Response {
    let path = uri.path().trim_start_matches('/');

    if let Some(content) = Assets::get(path) {
        let mime = mime_guess::from_path(path).first_or_octet_stream();
        (
            [(header::CONTENT_TYPE, mime.as_ref().to_string())],
            content.data.into_owned(),
        )
            .into_response()
    } else if path.is_empty() || !path.contains('.') {
        match Assets::get("index.html") {
            Some(content) => Html(content.data.into_owned()).into_response(),
            None => Html(FALLBACK_INDEX).into_response(),
        }
    } else {
        (StatusCode::NOT_FOUND, "404 Not Found").into_response()
    }
}
