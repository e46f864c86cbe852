use std::sync::Arc;

use tracing::{debug, info, warn};

use super::{or_not_found, AuthService, OwnerLocks};
use crate::crypto::{random_id, RECORD_ID_LEN};
use crate::error::{LinkFailure, PartialFailure, ServiceError};
use crate::input::{CheckChanges, CheckSpec, Phone, RecordId};
use crate::model::{Check, User};
use crate::store::{
    create_record, read_record, update_record, Collection, RecordStore, StoreError,
};

#[derive(Clone)]
pub struct CheckService {
    store: Arc<dyn RecordStore>,
    auth: AuthService,
    locks: OwnerLocks,
    max_checks: usize,
}

fn link_failure(phone: &str, err: StoreError) -> LinkFailure {
    if err.is_not_found() {
        LinkFailure::OwnerMissing {
            phone: phone.to_string(),
        }
    } else {
        LinkFailure::Store {
            message: err.to_string(),
        }
    }
}

impl CheckService {
    pub fn new(
        store: Arc<dyn RecordStore>,
        auth: AuthService,
        locks: OwnerLocks,
        max_checks: usize,
    ) -> Self {
        Self {
            store,
            auth,
            locks,
            max_checks,
        }
    }

    pub fn max_checks(&self) -> usize {
        self.max_checks
    }

    /// Create a check owned by the token's subject and link it to the owner.
    ///
    /// The check is persisted before the owner's list is rewritten. If the
    /// link fails the check stays behind and is reported as orphaned.
    pub async fn create(&self, token: Option<&str>, spec: CheckSpec) -> Result<Check, ServiceError> {
        let phone = self.auth.subject(token).await?;
        let _guard = self.locks.lock(&phone).await;

        let mut owner: User = match read_record(self.store.as_ref(), Collection::Users, &phone).await
        {
            Ok(user) => user,
            Err(e) if e.is_not_found() => return Err(ServiceError::forbidden()),
            Err(e) => return Err(e.into()),
        };

        if owner.checks.len() >= self.max_checks {
            debug!(phone, max = self.max_checks, "Check quota reached");
            return Err(ServiceError::QuotaExceeded {
                max: self.max_checks,
            });
        }

        let check = Check {
            id: random_id(RECORD_ID_LEN),
            user_phone: phone.clone(),
            protocol: spec.protocol,
            url: spec.url,
            method: spec.method,
            success_codes: spec.success_codes,
            timeout_seconds: spec.timeout_seconds,
        };
        create_record(self.store.as_ref(), Collection::Checks, &check.id, &check).await?;

        owner.checks.push(check.id.clone());
        if let Err(e) = update_record(self.store.as_ref(), Collection::Users, &phone, &owner).await {
            warn!(phone, check_id = %check.id, error = %e, "Check created but not linked to owner");
            return Err(PartialFailure {
                committed: format!("check {} created", check.id),
                cause: link_failure(&phone, e),
                orphans: vec![check.id],
            }
            .into());
        }

        info!(phone, check_id = %check.id, url = %check.url, "Check created");
        Ok(check)
    }

    pub async fn fetch(&self, id: &RecordId, token: Option<&str>) -> Result<Check, ServiceError> {
        let check = self.read(id).await?;
        self.auth.authorize(token, &check.user_phone).await?;
        Ok(check)
    }

    /// Apply changes on behalf of the check's stored owner.
    ///
    /// Runs under the owner lock and re-reads the check, so it cannot
    /// rewrite a check that a concurrent removal already deleted.
    pub async fn update(
        &self,
        id: &RecordId,
        token: Option<&str>,
        changes: CheckChanges,
    ) -> Result<Check, ServiceError> {
        let phone = self.read(id).await?.user_phone;
        self.auth.authorize(token, &phone).await?;
        let _guard = self.locks.lock(&phone).await;
        let mut check = self.read(id).await?;

        if let Some(protocol) = changes.protocol {
            check.protocol = protocol;
        }
        if let Some(url) = changes.url {
            check.url = url;
        }
        if let Some(method) = changes.method {
            check.method = method;
        }
        if let Some(codes) = changes.success_codes {
            check.success_codes = codes;
        }
        if let Some(timeout) = changes.timeout_seconds {
            check.timeout_seconds = timeout;
        }

        update_record(self.store.as_ref(), Collection::Checks, id.as_str(), &check)
            .await
            .map_err(|e| or_not_found(e, || "check id did not exist".into()))?;

        debug!(check_id = %id, "Check updated");
        Ok(check)
    }

    /// Delete the check, then unlink it from its owner.
    pub async fn remove(&self, id: &RecordId, token: Option<&str>) -> Result<(), ServiceError> {
        let check = self.read(id).await?;
        let phone = check.user_phone;
        self.auth.authorize(token, &phone).await?;
        let _guard = self.locks.lock(&phone).await;

        self.store
            .delete(Collection::Checks, id.as_str())
            .await
            .map_err(|e| or_not_found(e, || "the specified check does not exist".into()))?;
        info!(phone, check_id = %id, "Check deleted");

        let committed = format!("check {id} deleted");
        let mut owner: User = match read_record(self.store.as_ref(), Collection::Users, &phone).await
        {
            Ok(user) => user,
            Err(e) => {
                warn!(phone, check_id = %id, error = %e, "Deleted check has no readable owner");
                return Err(PartialFailure {
                    committed,
                    cause: link_failure(&phone, e),
                    orphans: Vec::new(),
                }
                .into());
            }
        };

        let Some(position) = owner.checks.iter().position(|c| c == id.as_str()) else {
            warn!(phone, check_id = %id, "Deleted check was not listed on its owner");
            return Err(PartialFailure {
                committed,
                cause: LinkFailure::NotLinked {
                    check_id: id.to_string(),
                    phone,
                },
                orphans: Vec::new(),
            }
            .into());
        };
        owner.checks.remove(position);

        if let Err(e) = update_record(self.store.as_ref(), Collection::Users, &phone, &owner).await {
            warn!(phone, check_id = %id, error = %e, "Failed to unlink deleted check");
            return Err(PartialFailure {
                committed,
                cause: link_failure(&phone, e),
                orphans: vec![id.to_string()],
            }
            .into());
        }
        Ok(())
    }

    /// Every check listed on the owner. Ids that no longer resolve are skipped.
    pub async fn owned(&self, phone: &Phone, token: Option<&str>) -> Result<Vec<Check>, ServiceError> {
        self.auth.authorize(token, phone.as_str()).await?;
        let owner: User = read_record(self.store.as_ref(), Collection::Users, phone.as_str())
            .await
            .map_err(|e| or_not_found(e, || "could not find the specified user".into()))?;

        let mut checks = Vec::with_capacity(owner.checks.len());
        for check_id in &owner.checks {
            match read_record::<Check>(self.store.as_ref(), Collection::Checks, check_id).await {
                Ok(check) if check.user_phone == owner.phone => checks.push(check),
                Ok(_) => warn!(%phone, check_id, "Listed check belongs to another user"),
                Err(e) if e.is_not_found() => debug!(%phone, check_id, "Skipping dangling check id"),
                Err(e) => return Err(e.into()),
            }
        }
        Ok(checks)
    }

    async fn read(&self, id: &RecordId) -> Result<Check, ServiceError> {
        read_record(self.store.as_ref(), Collection::Checks, id.as_str())
            .await
            .map_err(|e| or_not_found(e, || "the specified check does not exist".into()))
    }
}
