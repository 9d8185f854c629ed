//! Authentication route handlers.
//!
//! Email/password accounts. A successful login or registration moves any
//! guest cart in the session into the account's server cart.

use axum::{Json, extract::State};
use serde::Deserialize;
use serde_json::{Value, json};
use tower_sessions::Session;
use tracing::instrument;

use crate::error::{Result, clear_sentry_user, set_sentry_user};
use crate::middleware::{RequireAuth, clear_current_user, set_current_user};
use crate::models::{CurrentUser, User};
use crate::services::auth::AuthService;
use crate::services::cart::CartService;
use crate::state::AppState;

/// Login and registration payload. Has no `Debug` impl.
#[derive(Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// Register a customer account and sign in.
#[instrument(skip_all)]
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    Json(credentials): Json<Credentials>,
) -> Result<Json<CurrentUser>> {
    let user = AuthService::new(state.stores().users.as_ref())
        .register_with_password(&credentials.email, &credentials.password)
        .await?;

    sign_in(&state, &session, &user).await.map(Json)
}

/// Sign in with email and password.
#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Json(credentials): Json<Credentials>,
) -> Result<Json<CurrentUser>> {
    let user = AuthService::new(state.stores().users.as_ref())
        .login_with_password(&credentials.email, &credentials.password)
        .await
        .inspect_err(|_| tracing::info!("Failed login attempt"))?;

    sign_in(&state, &session, &user).await.map(Json)
}

/// Sign out. The session (and any guest cart) is discarded.
#[instrument(skip_all)]
pub async fn logout(session: Session) -> Result<Json<Value>> {
    clear_current_user(&session).await?;
    session.flush().await?;
    clear_sentry_user();
    Ok(Json(json!({ "ok": true })))
}

/// The signed-in user.
pub async fn me(RequireAuth(user): RequireAuth) -> Json<CurrentUser> {
    Json(user)
}

async fn sign_in(state: &AppState, session: &Session, user: &User) -> Result<CurrentUser> {
    let current = CurrentUser::from(user);
    set_current_user(session, &current).await?;

    CartService::new(state.stores())
        .merge_guest_cart(session, user.id)
        .await?;

    set_sentry_user(&user.id, Some(user.email.as_str()));
    tracing::info!(user_id = %user.id, "User signed in");
    Ok(current)
}
