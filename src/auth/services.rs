use std::sync::Arc;

use axum::extract::FromRef;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, warn};

use crate::{
    auth::{
        dto::SignupRequest,
        jwt::JwtKeys,
        password::{hash_password, verify_password},
        repo::UserStore,
        repo_types::{NewUser, UserRecord},
        throttle::{Decision, LoginThrottle},
    },
    clock::Clock,
    error::{AppError, AuthError, ValidationError},
    state::AppState,
};

lazy_static! {
    static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    // Verified against when the account does not exist, so both failure paths cost the same.
    static ref DUMMY_HASH: String = hash_password("timing-equalizer-Passw0rd").unwrap_or_default();
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// At least 8 characters with an uppercase letter, a lowercase letter and a digit.
pub(crate) fn is_strong_password(password: &str) -> bool {
    password.chars().count() >= 8
        && password.chars().any(|c| c.is_ascii_uppercase())
        && password.chars().any(|c| c.is_ascii_lowercase())
        && password.chars().any(|c| c.is_ascii_digit())
}

/// Throttle key and email lookup value for a login identifier.
pub(crate) fn normalize_identifier(identifier: &str) -> String {
    let trimmed = identifier.trim();
    if is_valid_email(trimmed) {
        trimmed.to_lowercase()
    } else {
        trimmed.to_string()
    }
}

fn required<'a>(value: Option<&'a str>, field: &'static str) -> Result<&'a str, ValidationError> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ValidationError::MissingField(field)),
    }
}

/// Signup, login and session resolution over a [`UserStore`].
#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserStore>,
    keys: JwtKeys,
    throttle: LoginThrottle,
    clock: Arc<dyn Clock>,
}

impl FromRef<AppState> for AuthService {
    fn from_ref(state: &AppState) -> Self {
        Self::new(
            state.users.clone(),
            JwtKeys::from_ref(state),
            state.throttle.clone(),
            state.clock.clone(),
        )
    }
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserStore>,
        keys: JwtKeys,
        throttle: LoginThrottle,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            users,
            keys,
            throttle,
            clock,
        }
    }

    pub async fn signup(&self, req: SignupRequest) -> Result<UserRecord, AppError> {
        let username = required(req.username.as_deref(), "username")?;
        let email = required(req.email.as_deref(), "email")?.to_lowercase();
        // Passwords are taken verbatim; only presence is checked on the trimmed form.
        required(req.password.as_deref(), "password")?;
        let password = req.password.as_deref().unwrap_or_default();

        if self.users.find_by_username(username).await?.is_some()
            || self.users.find_by_email(&email).await?.is_some()
        {
            warn!(username = %username, email = %email, "identity already registered");
            return Err(ValidationError::DuplicateIdentity.into());
        }

        if !is_strong_password(password) {
            warn!(username = %username, "weak password");
            return Err(ValidationError::WeakPassword.into());
        }
        if !is_valid_email(&email) {
            warn!(email = %email, "invalid email");
            return Err(ValidationError::InvalidEmailFormat.into());
        }

        let password_hash = hash_password(password)?;
        let user = self
            .users
            .insert(NewUser {
                username: username.to_string(),
                email,
                password_hash,
            })
            .await?;

        info!(user_id = user.id, username = %user.username, "user registered");
        Ok(user)
    }

    /// Returns a fresh session token and the user on success.
    pub async fn login(
        &self,
        identifier: &str,
        password: &str,
    ) -> Result<(String, UserRecord), AppError> {
        required(Some(identifier), "username or email")?;
        if password.is_empty() {
            return Err(ValidationError::MissingField("password").into());
        }
        let key = normalize_identifier(identifier);

        // Held until the outcome is recorded: check-then-record is atomic per identifier.
        let mut attempt = self.throttle.acquire(&key).await;
        let now = self.clock.now();
        if let Decision::Deny { retry_after } = attempt.check(now) {
            warn!(identifier = %key, retry_after, "login rate limited");
            return Err(AuthError::RateLimited { retry_after }.into());
        }

        // Usernames match as typed; only the email lookup uses the lower-cased key.
        let user = match self.users.find_by_username(identifier.trim()).await? {
            Some(u) => Some(u),
            None if is_valid_email(&key) => self.users.find_by_email(&key).await?,
            None => None,
        };

        let verified = match &user {
            Some(u) => verify_password(password, &u.password_hash),
            None => {
                verify_password(password, &DUMMY_HASH);
                false
            }
        };

        let user = match user {
            Some(u) if verified => u,
            _ => {
                attempt.record_failure(now);
                warn!(identifier = %key, failures = attempt.failures(), "login invalid credentials");
                return Err(AuthError::InvalidCredentials.into());
            }
        };

        attempt.record_success(now);
        drop(attempt);

        let token = self.keys.sign_at(user.id, now)?;
        info!(user_id = user.id, username = %user.username, "user logged in");
        Ok((token, user))
    }

    pub async fn authenticate(&self, token: &str) -> Result<UserRecord, AppError> {
        let claims = self.keys.verify_at(token, self.clock.now())?;
        match self.users.find_by_id(claims.sub).await? {
            Some(user) => Ok(user),
            None => {
                warn!(user_id = claims.sub, "token for unknown user");
                Err(AuthError::UserNotFound.into())
            }
        }
    }

    pub async fn update_profile(
        &self,
        mut user: UserRecord,
        profile_photo: Option<String>,
    ) -> Result<UserRecord, AppError> {
        user.profile_photo = profile_photo
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty());
        match self.users.update(&user).await? {
            Some(updated) => {
                info!(user_id = updated.id, "profile updated");
                Ok(updated)
            }
            None => Err(AuthError::UserNotFound.into()),
        }
    }
}
