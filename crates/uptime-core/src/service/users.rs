use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use super::{or_not_found, AuthService, OwnerLocks};
use crate::crypto::PasswordHasher;
use crate::error::{LinkFailure, PartialFailure, ServiceError};
use crate::input::{NewUser, Phone, UserChanges};
use crate::model::{User, UserProfile};
use crate::store::{create_record, read_record, update_record, Collection, RecordStore, StoreError};

/// Outcome of a fully successful user removal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRemoval {
    pub phone: String,
    pub deleted_checks: Vec<String>,
}

#[derive(Clone)]
pub struct UserService {
    store: Arc<dyn RecordStore>,
    auth: AuthService,
    hasher: PasswordHasher,
    locks: OwnerLocks,
}

impl UserService {
    pub fn new(
        store: Arc<dyn RecordStore>,
        auth: AuthService,
        hasher: PasswordHasher,
        locks: OwnerLocks,
    ) -> Self {
        Self {
            store,
            auth,
            hasher,
            locks,
        }
    }

    pub async fn register(&self, new_user: NewUser) -> Result<UserProfile, ServiceError> {
        let user = User {
            phone: new_user.phone.as_str().to_string(),
            first_name: new_user.first_name,
            last_name: new_user.last_name,
            hashed_password: self.hasher.hash(new_user.password.as_str()),
            checks: Vec::new(),
        };

        match create_record(self.store.as_ref(), Collection::Users, &user.phone, &user).await {
            Ok(()) => {}
            Err(StoreError::AlreadyExists { .. }) => {
                return Err(ServiceError::Conflict(
                    "a user with that phone number already exists".into(),
                ))
            }
            Err(e) => return Err(e.into()),
        }

        info!(phone = %user.phone, "User registered");
        Ok(user.into())
    }

    pub async fn fetch(&self, phone: &Phone, token: Option<&str>) -> Result<UserProfile, ServiceError> {
        self.auth.authorize(token, phone.as_str()).await?;
        let user = self.read(phone).await?;
        Ok(user.into())
    }

    pub async fn update(
        &self,
        phone: &Phone,
        token: Option<&str>,
        changes: UserChanges,
    ) -> Result<UserProfile, ServiceError> {
        self.auth.authorize(token, phone.as_str()).await?;
        let _guard = self.locks.lock(phone.as_str()).await;

        let mut user = self.read(phone).await?;
        if let Some(first_name) = changes.first_name {
            user.first_name = first_name;
        }
        if let Some(last_name) = changes.last_name {
            user.last_name = last_name;
        }
        if let Some(password) = changes.password {
            user.hashed_password = self.hasher.hash(password.as_str());
        }

        update_record(self.store.as_ref(), Collection::Users, phone.as_str(), &user)
            .await
            .map_err(|e| or_not_found(e, || "the specified user does not exist".into()))?;

        debug!(%phone, "User updated");
        Ok(user.into())
    }

    /// Delete the user, then each of its checks.
    ///
    /// Once the user record is gone the call never fails outright: check
    /// deletions that fail are reported as a partial failure listing the
    /// checks that may be orphaned.
    pub async fn remove(&self, phone: &Phone, token: Option<&str>) -> Result<UserRemoval, ServiceError> {
        self.auth.authorize(token, phone.as_str()).await?;
        let _guard = self.locks.lock(phone.as_str()).await;

        let user = self.read(phone).await?;
        self.store
            .delete(Collection::Users, phone.as_str())
            .await
            .map_err(|e| or_not_found(e, || "could not find the specified user".into()))?;
        info!(%phone, checks = user.checks.len(), "User deleted");

        let mut deleted = Vec::with_capacity(user.checks.len());
        let mut failed = Vec::new();
        for check_id in &user.checks {
            match self.store.delete(Collection::Checks, check_id).await {
                Ok(()) => deleted.push(check_id.clone()),
                Err(e) if e.is_not_found() => {
                    debug!(%phone, check_id, "Listed check was already gone");
                }
                Err(e) => {
                    warn!(%phone, check_id, error = %e, "Failed to delete check of removed user");
                    failed.push(check_id.clone());
                }
            }
        }

        if failed.is_empty() {
            return Ok(UserRemoval {
                phone: user.phone,
                deleted_checks: deleted,
            });
        }

        Err(PartialFailure {
            committed: format!("user {phone} deleted"),
            cause: LinkFailure::ChecksNotDeleted {
                failed: failed.len(),
                total: user.checks.len(),
            },
            orphans: failed,
        }
        .into())
    }

    async fn read(&self, phone: &Phone) -> Result<User, ServiceError> {
        read_record(self.store.as_ref(), Collection::Users, phone.as_str())
            .await
            .map_err(|e| or_not_found(e, || "could not find the specified user".into()))
    }
}
