use std::sync::Arc;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;

use crate::auth::{
    repo::UserStore,
    repo_types::{NewUser, StoreError, UserRecord},
};

/// Process-local user store, used when no database is configured.
#[derive(Clone, Default)]
pub struct MemoryUserStore {
    users: Arc<RwLock<Vec<UserRecord>>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn clashes(users: &[UserRecord], id: Option<i64>, username: &str, email: &str) -> bool {
        users
            .iter()
            .filter(|u| Some(u.id) != id)
            .any(|u| u.username == username || u.email == email)
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, StoreError> {
        let users = self.users.read().await;
        Ok(users.iter().find(|u| u.username == username).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        let users = self.users.read().await;
        Ok(users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<UserRecord>, StoreError> {
        let users = self.users.read().await;
        Ok(users.iter().find(|u| u.id == id).cloned())
    }

    async fn insert(&self, user: NewUser) -> Result<UserRecord, StoreError> {
        let mut users = self.users.write().await;
        if Self::clashes(&users, None, &user.username, &user.email) {
            return Err(StoreError::Conflict);
        }
        let id = users.iter().map(|u| u.id).max().unwrap_or(0) + 1;
        let record = UserRecord {
            id,
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
            is_active: true,
            profile_photo: None,
            created_at: OffsetDateTime::now_utc(),
        };
        users.push(record.clone());
        Ok(record)
    }

    async fn update(&self, user: &UserRecord) -> Result<Option<UserRecord>, StoreError> {
        let mut users = self.users.write().await;
        if Self::clashes(&users, Some(user.id), &user.username, &user.email) {
            return Err(StoreError::Conflict);
        }
        match users.iter_mut().find(|u| u.id == user.id) {
            Some(slot) => {
                let created_at = slot.created_at;
                *slot = UserRecord {
                    created_at,
                    ..user.clone()
                };
                Ok(Some(slot.clone()))
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(username: &str, email: &str) -> NewUser {
        NewUser {
            username: username.into(),
            email: email.into(),
            password_hash: "hash".into(),
        }
    }

    #[tokio::test]
    async fn insert_assigns_ids_and_finds() {
        let store = MemoryUserStore::new();
        let a = store.insert(new_user("alice", "alice@example.com")).await.unwrap();
        let b = store.insert(new_user("bob", "bob@example.com")).await.unwrap();
        assert_eq!(a.id, 1);
        assert_eq!(b.id, 2);
        assert!(a.is_active);

        assert_eq!(store.find_by_username("bob").await.unwrap().unwrap().id, 2);
        assert_eq!(store.find_by_email("alice@example.com").await.unwrap().unwrap().id, 1);
        assert!(store.find_by_id(3).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unique_constraints_are_enforced() {
        let store = MemoryUserStore::new();
        store.insert(new_user("alice", "alice@example.com")).await.unwrap();
        let dup_name = store.insert(new_user("alice", "other@example.com")).await;
        assert!(matches!(dup_name, Err(StoreError::Conflict)));
        let dup_mail = store.insert(new_user("other", "alice@example.com")).await;
        assert!(matches!(dup_mail, Err(StoreError::Conflict)));
    }

    #[tokio::test]
    async fn update_replaces_fields_but_not_identity() {
        let store = MemoryUserStore::new();
        let mut alice = store.insert(new_user("alice", "alice@example.com")).await.unwrap();
        store.insert(new_user("bob", "bob@example.com")).await.unwrap();

        alice.profile_photo = Some("https://cdn.example.com/a.png".into());
        let updated = store.update(&alice).await.unwrap().unwrap();
        assert_eq!(updated.profile_photo.as_deref(), Some("https://cdn.example.com/a.png"));

        alice.email = "bob@example.com".into();
        assert!(matches!(store.update(&alice).await, Err(StoreError::Conflict)));

        let ghost = UserRecord {
            id: 99,
            username: "ghost".into(),
            email: "ghost@example.com".into(),
            ..alice
        };
        assert!(store.update(&ghost).await.unwrap().is_none());
    }
}
