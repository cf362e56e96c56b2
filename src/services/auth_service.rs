use argon2::{
    Argon2, PasswordHasher,
    password_hash::{PasswordHash, PasswordVerifier, SaltString},
};
use chrono::{DateTime, Utc};
use password_hash::rand_core::OsRng;
use uuid::Uuid;

use crate::{
    dto::auth::{Landing, LoginRequest, LoginResponse, RegisterRequest, SessionInfo, UpdateProfileRequest},
    error::{AppError, AppResult, CredentialFailure},
    middleware::auth::{AuthUser, issue_token},
    models::{Role, User},
    response::{ApiResponse, Meta},
    services::{current_session, required, required_opt, signed_in},
    session::Session,
    state::AppState,
    storefront::{Draft, Storefront},
};

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))
}

pub fn verify_password(password: &str, password_hash: &str) -> AppResult<bool> {
    let parsed_hash = PasswordHash::new(password_hash)
        .map_err(|_| AppError::Internal(anyhow::anyhow!("Invalid password hash")))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Normalized `(email, password)`; both must be present.
pub fn credentials(email: &str, password: &str) -> AppResult<(String, String)> {
    let email = normalize_email(email);
    let password = password.trim().to_string();
    if email.is_empty() || password.is_empty() {
        return Err(AppError::validation("Email and password are required"));
    }
    Ok((email, password))
}

pub fn ensure_email_free(storefront: &Storefront, email: &str) -> AppResult<()> {
    if storefront.user_by_email(email).is_some() {
        return Err(AppError::DuplicateEmail);
    }
    Ok(())
}

/// Adds an account. `password_hash` must already be hashed.
pub fn create_user(
    draft: &mut Draft,
    email: String,
    password_hash: String,
    role: Role,
    now: DateTime<Utc>,
) -> AppResult<User> {
    ensure_email_free(draft.storefront(), &email)?;
    let user = User {
        id: Uuid::new_v4(),
        email,
        password_hash,
        role,
        name: None,
        phone: None,
        address: None,
        created_at: now,
    };
    draft.users_mut().push(user.clone());
    Ok(user)
}

/// Checks a sign-in attempt against the account found for its email.
/// Both failures share one error kind.
pub fn authenticate(candidate: Option<&User>, password: &str) -> AppResult<User> {
    let user = candidate.ok_or(AppError::InvalidCredentials(CredentialFailure::UnknownEmail))?;
    if !verify_password(password, &user.password_hash)? {
        return Err(AppError::InvalidCredentials(CredentialFailure::WrongPassword));
    }
    Ok(user.clone())
}

/// Replaces the draft's session with a fresh one for `user`.
///
/// A cart left in the previous session follows a customer sign-in and is
/// dropped for admin and shop accounts.
pub fn begin_session(draft: &mut Draft, user: &User, now: DateTime<Utc>) -> Session {
    let carried = match draft.end_session() {
        Some(previous) if user.role.is_customer() => previous.cart,
        _ => Vec::new(),
    };
    let mut session = Session::start(user, now);
    session.cart = carried;
    draft.start_session(session.clone());
    session
}

pub fn apply_profile(
    draft: &mut Draft,
    user_id: Uuid,
    payload: UpdateProfileRequest,
    password_hash: Option<String>,
) -> AppResult<User> {
    let email = payload
        .email
        .as_deref()
        .map(|email| required("email", &normalize_email(email)))
        .transpose()?;
    let name = required_opt("name", payload.name.as_deref())?;
    let phone = required_opt("phone", payload.phone.as_deref())?;
    let address = required_opt("address", payload.address.as_deref())?;

    if let Some(email) = &email {
        let taken = draft
            .storefront()
            .user_by_email(email)
            .is_some_and(|other| other.id != user_id);
        if taken {
            return Err(AppError::DuplicateEmail);
        }
    }

    let user = draft
        .users_mut()
        .iter_mut()
        .find(|u| u.id == user_id)
        .ok_or(AppError::NotFound)?;
    if let Some(email) = email {
        user.email = email;
    }
    if name.is_some() {
        user.name = name;
    }
    if phone.is_some() {
        user.phone = phone;
    }
    if address.is_some() {
        user.address = address;
    }
    if let Some(hash) = password_hash {
        user.password_hash = hash;
    }
    let user = user.clone();

    if let Some(session) = draft.session_mut() {
        session.refresh_user(&user);
    }
    Ok(user)
}

pub async fn register_user(
    state: &AppState,
    payload: RegisterRequest,
) -> AppResult<ApiResponse<User>> {
    let (email, password) = credentials(&payload.email, &payload.password)?;
    let password_hash = hash_password(&password)?;

    let user = state
        .transact(None, |draft| {
            create_user(draft, email, password_hash, Role::Customer, Utc::now())
        })
        .await?;

    tracing::info!(user_id = %user.id, "user registered");
    Ok(ApiResponse::success("User created", user.redacted(), None))
}

/// `current` is the session the request was made with, if any; it is replaced.
pub async fn login_user(
    state: &AppState,
    current: Option<&AuthUser>,
    payload: LoginRequest,
) -> AppResult<ApiResponse<LoginResponse>> {
    let (email, password) = credentials(&payload.email, &payload.password)?;
    // Hash verification runs outside the state lock.
    let candidate = state.read(|s| s.user_by_email(&email).cloned()).await;
    let user = authenticate(candidate.as_ref(), &password)?;

    let session = state
        .transact(current.map(|c| c.session_id), |draft| {
            if draft.storefront().user(user.id).is_none() {
                return Err(AppError::InvalidCredentials(CredentialFailure::UnknownEmail));
            }
            Ok(begin_session(draft, &user, Utc::now()))
        })
        .await?;

    let token = issue_token(
        &session.user,
        &state.config.jwt_secret,
        state.config.session_ttl_hours,
    )?;

    tracing::info!(user_id = %user.id, role = %user.role.bucket(), "user logged in");
    Ok(ApiResponse::success(
        "Logged in",
        LoginResponse {
            token: format!("Bearer {}", token),
            landing: Landing::for_role(&session.user.role),
            user: session.user,
        },
        Some(Meta::empty()),
    ))
}

pub async fn logout_user(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let ended = state
        .transact(Some(user.session_id), |draft| Ok(draft.end_session().is_some()))
        .await?;
    if ended {
        tracing::info!(user_id = %user.user_id, "user logged out");
    }
    Ok(ApiResponse::success(
        "Logged out",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

pub async fn session_info(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<SessionInfo>> {
    let session = current_session(state, user).await?;
    Ok(ApiResponse::success(
        "OK",
        SessionInfo {
            cart_items: session.cart.len(),
            user: session.user,
        },
        None,
    ))
}

pub async fn update_profile(
    state: &AppState,
    user: &AuthUser,
    mut payload: UpdateProfileRequest,
) -> AppResult<ApiResponse<User>> {
    let password_hash = match payload.password.take() {
        Some(password) => Some(hash_password(&required("password", &password)?)?),
        None => None,
    };

    let updated = state
        .transact(Some(user.session_id), |draft| {
            let user_id = signed_in(draft)?.user.user_id;
            apply_profile(draft, user_id, payload, password_hash)
        })
        .await?;

    tracing::info!(user_id = %updated.id, "profile updated");
    Ok(ApiResponse::success("Profile updated", updated.redacted(), None))
}

/// Creates the admin account if the email is unused; returns its id either way.
pub async fn ensure_admin(state: &AppState, email: &str, password: &str) -> AppResult<Uuid> {
    let (email, password) = credentials(email, password)?;
    if let Some(existing) = state.read(|s| s.user_by_email(&email).cloned()).await {
        if existing.role != Role::Admin {
            return Err(AppError::validation(format!(
                "{email} already belongs to a non-admin account"
            )));
        }
        return Ok(existing.id);
    }

    let password_hash = hash_password(&password)?;
    let admin = state
        .transact(None, |draft| {
            create_user(draft, email, password_hash, Role::Admin, Utc::now())
        })
        .await?;
    tracing::info!(user_id = %admin.id, "admin account created");
    Ok(admin.id)
}
