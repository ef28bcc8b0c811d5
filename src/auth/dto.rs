use serde::{Deserialize, Serialize};

use crate::auth::repo_types::UserRecord;

/// Request body for `/signup`. Fields are optional so absence maps to a 400, not a 422.
#[derive(Debug, Default, Deserialize)]
pub struct SignupRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Request body for `/login`: one of `username`, `email` or `identifier`, plus `password`.
#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub identifier: Option<String>,
    pub password: Option<String>,
}

impl LoginRequest {
    pub fn login_identifier(&self) -> Option<&str> {
        [&self.identifier, &self.username, &self.email]
            .into_iter()
            .filter_map(|f| f.as_deref())
            .find(|v| !v.trim().is_empty())
    }
}

#[derive(Debug, Deserialize)]
pub struct ProfileUpdateRequest {
    pub profile_photo: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub message: String,
    pub token: String,
    pub user: PublicUser,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Public part of the user returned to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublicUser {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub is_active: bool,
    pub profile_photo: Option<String>,
}

impl From<UserRecord> for PublicUser {
    fn from(u: UserRecord) -> Self {
        Self {
            id: u.id,
            username: u.username,
            email: u.email,
            is_active: u.is_active,
            profile_photo: u.profile_photo,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::OffsetDateTime;

    #[test]
    fn public_user_never_carries_the_hash() {
        let record = UserRecord {
            id: 1,
            username: "alice".into(),
            email: "alice@example.com".into(),
            password_hash: "$argon2id$v=19$secret".into(),
            is_active: true,
            profile_photo: None,
            created_at: OffsetDateTime::now_utc(),
        };
        let raw = serde_json::to_string(&record).unwrap();
        assert!(!raw.contains("argon2"));

        let json = serde_json::to_string(&PublicUser::from(record)).unwrap();
        assert!(json.contains("alice@example.com"));
        assert!(!json.contains("password"));
    }

    #[test]
    fn login_identifier_prefers_explicit_then_username() {
        let req: LoginRequest =
            serde_json::from_str(r#"{"email":"a@b.co","username":"  ","password":"x"}"#).unwrap();
        assert_eq!(req.login_identifier(), Some("a@b.co"));

        let req: LoginRequest =
            serde_json::from_str(r#"{"email":"a@b.co","username":"alice"}"#).unwrap();
        assert_eq!(req.login_identifier(), Some("alice"));

        let req: LoginRequest = serde_json::from_str(r#"{"password":"x"}"#).unwrap();
        assert_eq!(req.login_identifier(), None);
    }
}
