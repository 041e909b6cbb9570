use crate::AppState;
use axum::{
    extract::{Path, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use std::sync::Arc;

/// GET /*alias
///
/// 1. Look the alias up in the store.
/// 2. Found: 302 to the link's URL.
/// 3. Missing: 302 to the configured not-found URL, or a plain 404.
pub async fn redirect(State(state): State<Arc<AppState>>, Path(alias): Path<String>) -> Response {
    match state.store.get(&alias).await {
        Ok(link) => found(&link.url),
        Err(e) if e.is_not_found() => match state.config.not_found_url.as_deref() {
            Some(url) => found(url),
            None => (
                StatusCode::NOT_FOUND,
                format!("Go link not found: {alias}"),
            )
                .into_response(),
        },
        Err(e) => {
            tracing::error!("Store error looking up alias '{}': {}", alias, e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal error").into_response()
        }
    }
}

/// 302 Found pointing at `url`.
fn found(url: &str) -> Response {
    match HeaderValue::try_from(url) {
        Ok(location) => (StatusCode::FOUND, [(header::LOCATION, location)]).into_response(),
        Err(_) => {
            tracing::error!("Refusing to redirect to invalid URL '{}'", url);
            (StatusCode::INTERNAL_SERVER_ERROR, "Invalid target URL").into_response()
        }
    }
}
