//! Per-request store scoping: middleware that borrows a session for each
//! request and the extractor handlers use to reach it.

use crate::error::AppError;
use crate::store::{SharedStore, StoreHandle};
use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::{IntoResponse, Response},
    Router,
};

/// Acquire a session, expose it to the handler through request extensions,
/// and release it once the handler has produced its response.
pub async fn provide_store(State(store): State<SharedStore>, mut request: Request, next: Next) -> Response {
    let session = match store.session().await {
        Ok(session) => session,
        Err(e) => {
            tracing::error!(error = %e, "could not acquire store session");
            return AppError::StoreUnavailable(e.to_string()).into_response();
        }
    };
    let handle = StoreHandle::new(session);
    request.extensions_mut().insert(handle.clone());
    tracing::debug!(method = %request.method(), uri = %request.uri(), "store session acquired");

    let response = next.run(request).await;

    // A panic in the handler unwinds past this point; the last clone's Drop releases it then.
    handle.release().await;
    tracing::debug!(status = %response.status(), "store session released");
    response
}

/// Install [`provide_store`] on every route of `router`.
pub fn with_store<S>(router: Router<S>, store: SharedStore) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router.layer(axum::middleware::from_fn_with_state(store, provide_store))
}

#[async_trait]
impl<S> FromRequestParts<S> for StoreHandle
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<StoreHandle>()
            .cloned()
            .ok_or_else(|| AppError::Internal("store middleware is not installed".into()))
    }
}
