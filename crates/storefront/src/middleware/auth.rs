//! Principal loading and authentication extractors.
//!
//! The login flow stores a [`Principal`] in the session. [`load_principal`]
//! copies it into the request extensions once per request; the extractors
//! below read it from there, so handlers receive the caller explicitly.

use axum::{
    extract::{FromRequestParts, Request},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use tower_sessions::Session;
use tracing::{Span, warn};

use crate::error::{AppError, set_sentry_user};
use crate::models::{Principal, session_keys};

/// Middleware that resolves the session principal into a request extension.
///
/// A session that cannot be read is treated as anonymous.
pub async fn load_principal(mut request: Request, next: Next) -> Response {
    if request.extensions().get::<Principal>().is_none()
        && let Some(session) = request.extensions().get::<Session>().cloned()
    {
        match session.get::<Principal>(session_keys::PRINCIPAL).await {
            Ok(Some(principal)) => {
                Span::current().record("user_id", principal.user_id.to_string());
                set_sentry_user(&principal.user_id);
                request.extensions_mut().insert(principal);
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Failed to read session principal"),
        }
    }

    next.run(request).await
}

/// Extractor that requires an authenticated caller.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(
///     RequirePrincipal(principal): RequirePrincipal,
/// ) -> impl IntoResponse {
///     format!("Hello, {}!", principal.user_id)
/// }
/// ```
pub struct RequirePrincipal(pub Principal);

impl<S> FromRequestParts<S> for RequirePrincipal
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Principal>()
            .copied()
            .map(Self)
            .ok_or_else(|| AppError::Unauthorized("login required".to_string()))
    }
}

/// Extractor that optionally gets the caller.
///
/// Unlike `RequirePrincipal`, this does not reject anonymous requests.
pub struct OptionalPrincipal(pub Option<Principal>);

impl<S> FromRequestParts<S> for OptionalPrincipal
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(parts.extensions.get::<Principal>().copied()))
    }
}

/// Extractor that requires an admin caller.
pub struct RequireAdmin(pub Principal);

impl<S> FromRequestParts<S> for RequireAdmin
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let RequirePrincipal(principal) = RequirePrincipal::from_request_parts(parts, state).await?;
        if !principal.is_admin() {
            warn!(user_id = %principal.user_id, path = %parts.uri.path(), "Admin route refused");
            return Err(AppError::Forbidden("admin access required".to_string()));
        }
        Ok(Self(principal))
    }
}
