// src/utils/identity.rs

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::{error::AppError, models::role::ADMIN, services::roles, store::SharedGateway};

/// Header carrying the caller's user id, set by the upstream auth gateway.
pub const LOGGED_IN_USER_HEADER: &str = "x-logged-in-user-id";

/// The caller of the current request.
#[derive(Debug, Clone, Copy)]
pub struct CurrentUser {
    pub id: Uuid,
}

/// Axum Middleware: Identity.
///
/// Reads the logged-in user id header and injects `CurrentUser` into the
/// request extensions. Missing or malformed ids get 401 Unauthorized.
pub async fn identity_middleware(mut req: Request<Body>, next: Next) -> Result<Response, StatusCode> {
    let user_id = req
        .headers()
        .get(LOGGED_IN_USER_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<Uuid>().ok());

    match user_id {
        Some(id) => {
            req.extensions_mut().insert(CurrentUser { id });
            Ok(next.run(req).await)
        }
        None => Err(StatusCode::UNAUTHORIZED),
    }
}

/// Axum Middleware: Admin Authorization.
///
/// Must be used AFTER `identity_middleware`. Looks up the caller's roles and
/// rejects anyone without the 'admin' role.
pub async fn admin_middleware(
    State(store): State<SharedGateway>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let user = req
        .extensions()
        .get::<CurrentUser>()
        .copied()
        .ok_or_else(|| AppError::Forbidden("Missing caller identity".to_string()))?;

    let allowed = match roles::has_any_role(store.as_ref(), user.id, &[ADMIN]).await {
        Ok(allowed) => allowed,
        // no roles at all is the same as not being an admin here
        Err(AppError::NotFound(_)) => false,
        Err(e) => return Err(e),
    };

    if !allowed {
        tracing::warn!(user_id = %user.id, "admin route refused");
        return Err(AppError::Forbidden("Admin role required".to_string()));
    }

    Ok(next.run(req).await)
}
