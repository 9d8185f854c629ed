//! Admin user management.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use tracing::instrument;

use threadline_core::{UserId, UserRole};

use super::PageQuery;
use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::models::{Page, User};
use crate::services::auth::{AuthError, AuthService};
use crate::state::AppState;

pub async fn index(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Query(query): Query<PageQuery>,
) -> Result<Json<Page<User>>> {
    Ok(Json(state.stores().users.list((&query).into()).await?))
}

#[derive(Debug, Deserialize)]
pub struct RoleInput {
    pub role: UserRole,
}

/// Change a user's role. Takes effect at the user's next sign-in.
///
/// Admins cannot demote themselves, so the back-office always keeps at least
/// the acting admin.
#[instrument(skip_all, fields(admin_id = %admin.id, user_id = %id, role = %input.role))]
pub async fn set_role(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<UserId>,
    Json(input): Json<RoleInput>,
) -> Result<Json<User>> {
    if id == admin.id && input.role != UserRole::Admin {
        return Err(AppError::Conflict("cannot remove your own admin role".into()));
    }

    let user = AuthService::new(state.stores().users.as_ref())
        .set_role(id, input.role)
        .await
        .map_err(|e| match e {
            AuthError::UserNotFound => AppError::NotFound(format!("user {id}")),
            other => other.into(),
        })?;
    Ok(Json(user))
}
