use std::sync::Arc;

use tracing::{debug, info, warn};

use super::or_not_found;
use crate::clock::Clock;
use crate::crypto::{random_id, PasswordHasher, RECORD_ID_LEN};
use crate::error::ServiceError;
use crate::input::{Credentials, RecordId};
use crate::model::{Token, User};
use crate::store::{create_record, read_record, update_record, Collection, RecordStore};

/// Issues, verifies and extends session tokens.
#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn RecordStore>,
    clock: Arc<dyn Clock>,
    hasher: PasswordHasher,
    ttl: chrono::Duration,
}

impl AuthService {
    pub fn new(
        store: Arc<dyn RecordStore>,
        clock: Arc<dyn Clock>,
        hasher: PasswordHasher,
        ttl: chrono::Duration,
    ) -> Self {
        Self {
            store,
            clock,
            hasher,
            ttl,
        }
    }

    /// Exchange a phone and password for a fresh token.
    pub async fn issue(&self, credentials: &Credentials) -> Result<Token, ServiceError> {
        let phone = credentials.phone.as_str();
        let user: User = match read_record(self.store.as_ref(), Collection::Users, phone).await {
            Ok(user) => user,
            Err(e) if e.is_not_found() => {
                return Err(ServiceError::AuthFailed(
                    "could not find the specified user".into(),
                ))
            }
            Err(e) => return Err(e.into()),
        };

        if !self
            .hasher
            .matches(credentials.password.as_str(), &user.hashed_password)
        {
            warn!(phone, "Password mismatch on token request");
            return Err(ServiceError::AuthFailed(
                "password did not match the specified user's stored password".into(),
            ));
        }

        let token = Token {
            id: random_id(RECORD_ID_LEN),
            phone: phone.to_string(),
            expires: self.clock.now() + self.ttl,
        };
        create_record(self.store.as_ref(), Collection::Tokens, &token.id, &token).await?;

        info!(phone, expires = %token.expires, "Token issued");
        Ok(token)
    }

    /// True iff the token exists, belongs to `phone` and has not expired.
    pub async fn verify(&self, token_id: &str, phone: &str) -> bool {
        match read_record::<Token>(self.store.as_ref(), Collection::Tokens, token_id).await {
            Ok(token) => token.phone == phone && token.is_active_at(self.clock.now()),
            Err(e) => {
                if !e.is_not_found() {
                    warn!(error = %e, "Token lookup failed during verification");
                }
                false
            }
        }
    }

    /// Require a token that is valid for `phone`.
    pub async fn authorize(&self, token: Option<&str>, phone: &str) -> Result<(), ServiceError> {
        match token {
            Some(id) if self.verify(id, phone).await => Ok(()),
            _ => {
                debug!(phone, "Rejected request with missing or invalid token");
                Err(ServiceError::forbidden())
            }
        }
    }

    /// The phone a valid token was issued to.
    pub async fn subject(&self, token: Option<&str>) -> Result<String, ServiceError> {
        let id = token.ok_or_else(ServiceError::forbidden)?;
        match read_record::<Token>(self.store.as_ref(), Collection::Tokens, id).await {
            Ok(token) if token.is_active_at(self.clock.now()) => Ok(token.phone),
            Ok(_) => Err(ServiceError::forbidden()),
            Err(e) if e.is_not_found() => Err(ServiceError::forbidden()),
            Err(e) => Err(e.into()),
        }
    }

    /// Push expiry to now + ttl. Expired tokens stay expired.
    pub async fn extend(&self, id: &RecordId) -> Result<Token, ServiceError> {
        let mut token = self.lookup(id).await?;
        let now = self.clock.now();
        if !token.is_active_at(now) {
            return Err(ServiceError::Expired(
                "the token has already expired and cannot be extended".into(),
            ));
        }

        token.expires = token.expires.max(now + self.ttl);
        update_record(self.store.as_ref(), Collection::Tokens, &token.id, &token)
            .await
            .map_err(|e| or_not_found(e, || "specified token does not exist".into()))?;

        debug!(phone = %token.phone, expires = %token.expires, "Token extended");
        Ok(token)
    }

    pub async fn lookup(&self, id: &RecordId) -> Result<Token, ServiceError> {
        read_record(self.store.as_ref(), Collection::Tokens, id.as_str())
            .await
            .map_err(|e| or_not_found(e, || "specified token does not exist".into()))
    }

    pub async fn revoke(&self, id: &RecordId) -> Result<(), ServiceError> {
        self.store
            .delete(Collection::Tokens, id.as_str())
            .await
            .map_err(|e| or_not_found(e, || "could not find the specified token".into()))?;
        info!("Token revoked");
        Ok(())
    }

    /// Delete every expired token, returning how many were removed.
    pub async fn purge_expired(&self) -> Result<usize, ServiceError> {
        let now = self.clock.now();
        let mut purged = 0;
        for id in self.store.list(Collection::Tokens).await? {
            let token: Token = match read_record(self.store.as_ref(), Collection::Tokens, &id).await
            {
                Ok(token) => token,
                Err(e) => {
                    warn!(token_id = %id, error = %e, "Skipping unreadable token");
                    continue;
                }
            };
            if token.is_active_at(now) {
                continue;
            }
            match self.store.delete(Collection::Tokens, &id).await {
                Ok(()) => purged += 1,
                Err(e) if e.is_not_found() => {}
                Err(e) => warn!(token_id = %id, error = %e, "Failed to purge expired token"),
            }
        }
        info!(purged, "Expired tokens purged");
        Ok(purged)
    }
}
