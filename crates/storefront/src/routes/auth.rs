//! Sign-up, sign-in and sign-out.

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use tower_sessions::Session;
use tracing::instrument;

use golzar_core::{Email, RoleSet, UserId};

use super::JsonBody;
use crate::error::AppError;
use crate::middleware::{OptionalAuth, RequireAuth};
use crate::models::CurrentUser;
use crate::services::auth::{AuthService, SignUp};
use crate::state::AppState;
use crate::validation::{LoginForm, SignupForm, Validate};

/// The signed-in user as returned to the client. Tokens stay server-side.
#[derive(Debug, Serialize)]
pub struct UserView {
    pub id: UserId,
    pub email: Email,
    pub full_name: Option<String>,
    pub roles: RoleSet,
}

impl From<&CurrentUser> for UserView {
    fn from(user: &CurrentUser) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            full_name: user.full_name.clone(),
            roles: user.roles.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SignUpResponse {
    SignedIn { user: UserView },
    ConfirmationPending { email: Email, message: &'static str },
}

/// Register a new account.
#[instrument(skip(state, session, form))]
pub async fn signup(
    State(state): State<AppState>,
    session: Session,
    JsonBody(form): JsonBody<SignupForm>,
) -> Result<impl IntoResponse, AppError> {
    let form = form.validate()?;
    let outcome = AuthService::new(state.auth(), state.data())
        .sign_up(&session, form)
        .await?;

    let body = match outcome {
        SignUp::SignedIn(user) => SignUpResponse::SignedIn {
            user: UserView::from(&user),
        },
        SignUp::ConfirmationPending(email) => SignUpResponse::ConfirmationPending {
            email,
            message: "لطفاً ایمیل خود را برای تأیید حساب بررسی کنید",
        },
    };
    Ok((StatusCode::CREATED, Json(body)))
}

/// Sign in with email and password.
#[instrument(skip(state, session, form))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    JsonBody(form): JsonBody<LoginForm>,
) -> Result<Json<UserView>, AppError> {
    let form = form.validate()?;
    let user = AuthService::new(state.auth(), state.data())
        .sign_in(&session, form)
        .await?;
    Ok(Json(UserView::from(&user)))
}

/// Sign out. Succeeds for signed-out sessions too.
#[instrument(skip(state, session, user))]
pub async fn logout(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
) -> Result<StatusCode, AppError> {
    if let Some(user) = user {
        AuthService::new(state.auth(), state.data())
            .sign_out(&session, &user)
            .await?;
    }
    Ok(StatusCode::NO_CONTENT)
}

/// The signed-in user with roles re-read from the backend.
#[instrument(skip(state, session, user), fields(user_id = %user.id))]
pub async fn me(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
) -> Result<Json<UserView>, AppError> {
    let user = AuthService::new(state.auth(), state.data())
        .refresh_roles(&session, user)
        .await?;
    Ok(Json(UserView::from(&user)))
}
