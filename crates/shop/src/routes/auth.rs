//! Account route handlers: registration, login, logout and profile.

use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Deserializer};
use serde_json::{Value, json};
use tower_sessions::Session;
use tracing::{info, instrument};

use shoppingify_core::ValidationErrors;
use shoppingify_core::validation::REQUIRED;

use crate::db::UserRepository;
use crate::db::users::ProfileUpdate;
use crate::error::{AppError, Result, clear_sentry_user, set_sentry_user};
use crate::middleware::{
    ApiJson, OptionalAuth, RequireAuth, clear_current_user, pinned_guest, set_current_user,
    take_guest,
};
use crate::models::CurrentUser;
use crate::routes::payloads::ProfileView;
use crate::services::auth::{AuthService, Registration};
use crate::services::merge::merge_guest_into_user;
use crate::state::AppState;

const MAX_NAME_LENGTH: usize = 100;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password1: String,
    #[serde(default)]
    pub password2: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

impl RegisterRequest {
    fn validate(&self) -> std::result::Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        for (field, value) in [
            ("email", &self.email),
            ("password1", &self.password1),
            ("password2", &self.password2),
        ] {
            if value.trim().is_empty() {
                errors.add(field, REQUIRED);
            }
        }
        for (field, value) in [("first_name", &self.first_name), ("last_name", &self.last_name)] {
            if let Err(message) = check_name(value) {
                errors.add(field, message);
            }
        }
        if !self.password1.is_empty()
            && !self.password2.is_empty()
            && self.password1 != self.password2
        {
            errors.add("non_field_errors", "The two password fields didn't match.");
        }

        errors.into_result()
    }
}

fn check_name(value: &str) -> std::result::Result<(), String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(REQUIRED.to_owned());
    }
    if value.chars().count() > MAX_NAME_LENGTH {
        return Err(format!(
            "Ensure this field has no more than {MAX_NAME_LENGTH} characters."
        ));
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProfileRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    /// `null` clears the photo; a missing key leaves it alone.
    #[serde(default, deserialize_with = "present")]
    pub profile_photo: Option<Option<String>>,
}

fn present<'de, D>(deserializer: D) -> std::result::Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

impl ProfileRequest {
    fn into_update(self) -> std::result::Result<ProfileUpdate, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        for (field, value) in [("first_name", &self.first_name), ("last_name", &self.last_name)] {
            if let Some(Err(message)) = value.as_deref().map(check_name) {
                errors.add(field, message);
            }
        }
        errors.into_result()?;

        Ok(ProfileUpdate {
            first_name: self.first_name.map(|s| s.trim().to_owned()),
            last_name: self.last_name.map(|s| s.trim().to_owned()),
            profile_photo: self
                .profile_photo
                .map(|photo| photo.filter(|url| !url.trim().is_empty())),
        })
    }
}

/// Create an account.
///
/// POST /api/auth/register
#[instrument(skip_all)]
pub async fn register(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, Json<ProfileView>)> {
    body.validate()?;

    let user = AuthService::new(state.pool())
        .register(&Registration {
            email: &body.email,
            password: &body.password1,
            first_name: &body.first_name,
            last_name: &body.last_name,
        })
        .await?;

    info!(user_id = %user.id, "User registered");
    Ok((StatusCode::CREATED, Json(ProfileView::from(&user))))
}

/// Log in and adopt the session's guest cart and chat.
///
/// POST /api/auth/login
#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    ApiJson(body): ApiJson<LoginRequest>,
) -> Result<Json<ProfileView>> {
    let user = AuthService::new(state.pool())
        .login(&body.email, &body.password)
        .await?;

    if let Some(guest) = pinned_guest(&session).await? {
        let outcome = merge_guest_into_user(state.pool(), guest, user.id).await?;
        take_guest(&session).await?;
        info!(
            user_id = %user.id,
            plan = ?outcome.plan,
            moved_lines = outcome.moved_lines,
            "Guest merged into user"
        );
    }

    let current = CurrentUser {
        id: user.id,
        email: user.email.clone(),
        is_staff: user.is_staff,
    };
    set_current_user(&session, &current).await?;
    set_sentry_user(&user.id, Some(user.email.as_str()));

    info!(user_id = %user.id, "User logged in");
    Ok(Json(ProfileView::from(&user)))
}

/// Log out.
///
/// POST /api/auth/logout
pub async fn logout(session: Session, OptionalAuth(user): OptionalAuth) -> Result<Json<Value>> {
    let Some(user) = user else {
        return Err(AppError::BadRequest("Not logged in.".to_owned()));
    };

    clear_current_user(&session).await?;
    clear_sentry_user();

    info!(user_id = %user.id, "User logged out");
    Ok(Json(json!({ "detail": "Successfully logged out." })))
}

/// Whether the session is logged in.
///
/// GET /api/auth/session
pub async fn session_status(RequireAuth(_user): RequireAuth) -> Json<Value> {
    Json(json!({ "isAuthenticated": true }))
}

/// Current user's profile.
///
/// GET /api/auth/profile
pub async fn profile(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
) -> Result<Json<ProfileView>> {
    let user = UserRepository::new(state.pool())
        .get_by_id(current.id)
        .await?
        .ok_or_else(|| AppError::NotFound("user".to_owned()))?;
    Ok(Json(ProfileView::from(&user)))
}

/// Update names or the profile photo URL.
///
/// PATCH /api/auth/profile
pub async fn update_profile(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
    ApiJson(body): ApiJson<ProfileRequest>,
) -> Result<Json<ProfileView>> {
    let update = body.into_update()?;
    let user = UserRepository::new(state.pool())
        .update_profile(current.id, &update)
        .await?;
    Ok(Json(ProfileView::from(&user)))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn registration(password2: &str) -> RegisterRequest {
        RegisterRequest {
            email: "ann@example.com".to_owned(),
            password1: "correct horse".to_owned(),
            password2: password2.to_owned(),
            first_name: "Ann".to_owned(),
            last_name: "Lee".to_owned(),
        }
    }

    #[test]
    fn test_register_requires_matching_passwords() {
        assert!(registration("correct horse").validate().is_ok());

        let errors = registration("battery staple").validate().unwrap_err();
        assert_eq!(
            errors.get("non_field_errors").unwrap(),
            ["The two password fields didn't match."]
        );
    }

    #[test]
    fn test_register_reports_missing_fields() {
        let body: RegisterRequest = serde_json::from_str(r#"{"email": "ann@example.com"}"#).unwrap();
        let errors = body.validate().unwrap_err();
        assert!(errors.get("password1").is_some());
        assert!(errors.get("first_name").is_some());
        assert!(errors.get("email").is_none());
    }

    #[test]
    fn test_profile_photo_null_clears() {
        let body: ProfileRequest = serde_json::from_str(r#"{"profile_photo": null}"#).unwrap();
        assert_eq!(body.into_update().unwrap().profile_photo, Some(None));

        let body: ProfileRequest = serde_json::from_str(r#"{"first_name": "Bo"}"#).unwrap();
        let update = body.into_update().unwrap();
        assert_eq!(update.profile_photo, None);
        assert_eq!(update.first_name.as_deref(), Some("Bo"));
    }

    #[test]
    fn test_profile_rejects_blank_name() {
        let body: ProfileRequest = serde_json::from_str(r#"{"last_name": "  "}"#).unwrap();
        let errors = body.into_update().unwrap_err();
        assert_eq!(errors.get("last_name").unwrap(), [REQUIRED]);
    }
}
