use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};

use crate::error::AppError;
use crate::AppState;

/// Middleware: requires `Authorization: Bearer <HACKATHON_ADMIN_TOKEN>`.
pub async fn require_admin(
    State(state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let expected = state
        .config
        .admin
        .token
        .as_deref()
        .ok_or_else(|| AppError::Configuration("Admin not configured".into()))?;

    match bearer {
        Some(TypedHeader(auth)) if auth.token() == expected => Ok(next.run(req).await),
        _ => Err(AppError::Unauthorized("Unauthorized".into())),
    }
}
