// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Read-only HTTP front end over the output tree.
//!
//! The server only reads what the sync loop has already published. Feeds and
//! media are replaced by rename, so a request sees either the old or the new
//! file and never a partial one.

use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use tokio::net::TcpListener;
use tower_http::services::ServeDir;
use url::Url;

use crate::config::CollectionConfig;
use crate::feed::{FEED_FILENAME, FEED_MIME_TYPE, public_url};

/// What the HTTP handlers need to know
#[derive(Debug, Clone)]
pub struct ServerState {
    pub base_url: Url,
    pub collections: Vec<CollectionConfig>,
    pub output_root: PathBuf,
}

/// Build the router: index at `/`, feeds with their content type, and every
/// other path served straight from the output tree.
pub fn router(state: ServerState) -> Router {
    let media = ServeDir::new(&state.output_root);

    Router::new()
        .route("/", get(index))
        .route(&format!("/{{collection_id}}/{FEED_FILENAME}"), get(feed))
        .fallback_service(media)
        .with_state(Arc::new(state))
}

/// Serve until the listener fails
pub async fn serve(listener: TcpListener, state: ServerState) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(%addr, "serving feeds");
    }
    axum::serve(listener, router(state)).await
}

async fn index(State(state): State<Arc<ServerState>>) -> Html<String> {
    let mut html = String::from(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>Feeds</title>\n\
         <style>\n\
         body { font-family: Arial, sans-serif; max-width: 800px; margin: 0 auto; padding: 20px; }\n\
         ul { list-style-type: none; padding: 0; }\n\
         li { font-size: 24px; margin-bottom: 10px; }\n\
         a { color: #1DB954; text-decoration: none; }\n\
         a:hover { text-decoration: underline; }\n\
         </style>\n</head>\n<body>\n<h1>Available RSS Feeds:</h1>\n<ul>\n",
    );

    for collection in &state.collections {
        let feed_url = public_url(&state.base_url, &collection.id, FEED_FILENAME);
        html.push_str(&format!(
            "<li><a href=\"{}\">{}</a></li>\n",
            html_escape::encode_double_quoted_attribute(&feed_url),
            html_escape::encode_text(&collection.name)
        ));
    }

    html.push_str("</ul>\n</body>\n</html>\n");
    Html(html)
}

async fn feed(
    State(state): State<Arc<ServerState>>,
    Path(collection_id): Path<String>,
) -> Response {
    if !state.collections.iter().any(|c| c.id == collection_id) {
        return StatusCode::NOT_FOUND.into_response();
    }

    let path = state.output_root.join(&collection_id).join(FEED_FILENAME);
    match tokio::fs::read(&path).await {
        Ok(bytes) => ([(header::CONTENT_TYPE, FEED_MIME_TYPE)], bytes).into_response(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => StatusCode::NOT_FOUND.into_response(),
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "failed to read feed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
