//! Caller context extractor.
//!
//! Identity headers are set by the API gateway after authenticating the
//! user and resolving their role and school membership. They are trusted
//! only because the gateway terminates authentication upstream.

use crate::models::{Caller, Role};
use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use mealpay_core::error::AppError;
use uuid::Uuid;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";
pub const SCHOOL_ID_HEADER: &str = "x-school-id";

/// Caller identity extracted from trusted request headers.
#[derive(Debug, Clone)]
pub struct CallerContext(pub Caller);

#[async_trait]
impl<S> FromRequestParts<S> for CallerContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::AuthError(anyhow::anyhow!("Missing X-User-Id header")))?;
        let user_id = Uuid::parse_str(user_id)
            .map_err(|_| AppError::AuthError(anyhow::anyhow!("Invalid X-User-Id header")))?;

        let role = parts
            .headers
            .get(USER_ROLE_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::AuthError(anyhow::anyhow!("Missing X-User-Role header")))?;
        let role = Role::parse(role)
            .ok_or_else(|| AppError::AuthError(anyhow::anyhow!("Unknown role '{}'", role)))?;

        let school_id = parts
            .headers
            .get(SCHOOL_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(Uuid::parse_str)
            .transpose()
            .map_err(|_| AppError::AuthError(anyhow::anyhow!("Invalid X-School-Id header")))?;

        Ok(CallerContext(Caller {
            user_id,
            role,
            school_id,
        }))
    }
}
