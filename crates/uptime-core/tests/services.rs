use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};
use uptime_core::{
    Collection, CreateCheckRequest, CreateTokenRequest, FileStore, LinkFailure, ManualClock,
    MemoryStore,
    Phone, RecordId, RecordStore, RegisterUserRequest, ServiceConfig, ServiceError, Services,
    StoreError, Token, UpdateCheckRequest, UpdateUserRequest, User,
};

const PHONE: &str = "5551234567";
const OTHER_PHONE: &str = "5559876543";

/// Wraps a store and fails chosen operations on demand.
#[derive(Default)]
struct FlakyStore {
    inner: MemoryStore,
    failing_deletes: Mutex<HashSet<String>>,
    failing_user_updates: Mutex<bool>,
}

impl FlakyStore {
    fn fail_delete_of(&self, id: &str) {
        self.failing_deletes.lock().unwrap().insert(id.to_string());
    }

    fn fail_user_updates(&self) {
        *self.failing_user_updates.lock().unwrap() = true;
    }

    fn injected(collection: Collection) -> StoreError {
        StoreError::Io {
            collection,
            context: "injected".into(),
            source: std::io::Error::other("disk on fire"),
        }
    }
}

#[async_trait]
impl RecordStore for FlakyStore {
    async fn create(&self, c: Collection, id: &str, record: Value) -> Result<(), StoreError> {
        self.inner.create(c, id, record).await
    }

    async fn read(&self, c: Collection, id: &str) -> Result<Value, StoreError> {
        self.inner.read(c, id).await
    }

    async fn update(&self, c: Collection, id: &str, record: Value) -> Result<(), StoreError> {
        if c == Collection::Users && *self.failing_user_updates.lock().unwrap() {
            return Err(Self::injected(c));
        }
        self.inner.update(c, id, record).await
    }

    async fn delete(&self, c: Collection, id: &str) -> Result<(), StoreError> {
        if self.failing_deletes.lock().unwrap().contains(id) {
            return Err(Self::injected(c));
        }
        self.inner.delete(c, id).await
    }

    async fn list(&self, c: Collection) -> Result<Vec<String>, StoreError> {
        self.inner.list(c).await
    }
}

fn services() -> Services {
    Services::new(Arc::new(MemoryStore::new()), ServiceConfig::default())
}

async fn register(services: &Services, phone: &str) {
    let request: RegisterUserRequest = serde_json::from_value(json!({
        "firstName": "Ada",
        "lastName": "Lovelace",
        "phone": phone,
        "password": "hunter22",
        "tosAgreement": true
    }))
    .unwrap();
    services.users.register(request.validate().unwrap()).await.unwrap();
}

async fn login(services: &Services, phone: &str) -> Token {
    let request: CreateTokenRequest =
        serde_json::from_value(json!({ "phone": phone, "password": "hunter22" })).unwrap();
    services
        .auth
        .issue(&request.validate().unwrap())
        .await
        .unwrap()
}

fn check_spec(url: &str) -> uptime_core::CheckSpec {
    let request: CreateCheckRequest = serde_json::from_value(json!({
        "protocol": "https",
        "url": url,
        "method": "get",
        "successCodes": [200, 201],
        "timeoutSeconds": 3
    }))
    .unwrap();
    request.validate().unwrap()
}

fn phone(raw: &str) -> Phone {
    Phone::parse(raw).unwrap()
}

fn record_id(raw: &str) -> RecordId {
    RecordId::parse(raw).unwrap()
}

async fn stored_user(services: &Services, phone: &str) -> User {
    let value = services.store.read(Collection::Users, phone).await.unwrap();
    serde_json::from_value(value).unwrap()
}

#[tokio::test]
async fn created_check_is_linked_to_its_owner() {
    let services = services();
    register(&services, PHONE).await;
    let token = login(&services, PHONE).await;

    let check = services
        .checks
        .create(Some(&token.id), check_spec("example.com/health"))
        .await
        .unwrap();
    assert_eq!(check.id.len(), 20);
    assert_eq!(check.user_phone, PHONE);

    let profile = services
        .users
        .fetch(&phone(PHONE), Some(&token.id))
        .await
        .unwrap();
    assert_eq!(profile.checks, vec![check.id.clone()]);

    let fetched = services
        .checks
        .fetch(&record_id(&check.id), Some(&token.id))
        .await
        .unwrap();
    assert_eq!(fetched, check);
}

#[tokio::test]
async fn sixth_check_exceeds_quota() {
    let services = services();
    register(&services, PHONE).await;
    let token = login(&services, PHONE).await;

    for i in 0..5 {
        services
            .checks
            .create(Some(&token.id), check_spec(&format!("example.com/{i}")))
            .await
            .unwrap();
    }

    let err = services
        .checks
        .create(Some(&token.id), check_spec("example.com/6"))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::QuotaExceeded { max: 5 }));
    assert_eq!(stored_user(&services, PHONE).await.checks.len(), 5);
    assert_eq!(services.store.list(Collection::Checks).await.unwrap().len(), 5);
}

#[tokio::test]
async fn tokens_expire_after_an_hour() {
    let start = chrono::DateTime::from_timestamp(1_700_000_000, 0).unwrap();
    let clock = ManualClock::new(start);
    let services = Services::with_clock(
        Arc::new(MemoryStore::new()),
        ServiceConfig::default(),
        Arc::new(clock.clone()),
    );
    register(&services, PHONE).await;
    let token = login(&services, PHONE).await;
    assert_eq!(token.expires, start + chrono::Duration::hours(1));
    assert!(services.auth.verify(&token.id, PHONE).await);

    clock.advance(chrono::Duration::seconds(3599));
    assert!(services.auth.verify(&token.id, PHONE).await);

    clock.set(token.expires);
    assert!(!services.auth.verify(&token.id, PHONE).await);

    let id = record_id(&token.id);
    let before = services.auth.lookup(&id).await.unwrap().expires;
    let err = services.auth.extend(&id).await.unwrap_err();
    assert!(matches!(err, ServiceError::Expired(_)));
    assert_eq!(services.auth.lookup(&id).await.unwrap().expires, before);

    clock.advance(chrono::Duration::seconds(1));
    assert!(!services.auth.verify(&token.id, PHONE).await);
}

#[tokio::test]
async fn extend_pushes_expiry_forward() {
    let clock = ManualClock::default();
    let services = Services::with_clock(
        Arc::new(MemoryStore::new()),
        ServiceConfig::default(),
        Arc::new(clock.clone()),
    );
    register(&services, PHONE).await;
    let token = login(&services, PHONE).await;

    clock.advance(chrono::Duration::minutes(30));
    let extended = services.auth.extend(&record_id(&token.id)).await.unwrap();
    assert_eq!(
        extended.expires - token.expires,
        chrono::Duration::minutes(30)
    );

    clock.advance(chrono::Duration::minutes(45));
    assert!(services.auth.verify(&token.id, PHONE).await);
}

#[tokio::test]
async fn purge_removes_only_expired_tokens() {
    let clock = ManualClock::default();
    let services = Services::with_clock(
        Arc::new(MemoryStore::new()),
        ServiceConfig::default(),
        Arc::new(clock.clone()),
    );
    register(&services, PHONE).await;
    let old = login(&services, PHONE).await;
    clock.advance(chrono::Duration::minutes(90));
    let fresh = login(&services, PHONE).await;

    assert_eq!(services.auth.purge_expired().await.unwrap(), 1);
    let remaining = services.store.list(Collection::Tokens).await.unwrap();
    assert_eq!(remaining, vec![fresh.id]);
    assert!(services.auth.lookup(&record_id(&old.id)).await.is_err());
}

#[tokio::test]
async fn deleting_user_cascades_to_checks() {
    let services = services();
    register(&services, PHONE).await;
    let token = login(&services, PHONE).await;
    let a = services
        .checks
        .create(Some(&token.id), check_spec("example.com/a"))
        .await
        .unwrap();
    let b = services
        .checks
        .create(Some(&token.id), check_spec("example.com/b"))
        .await
        .unwrap();

    let removal = services
        .users
        .remove(&phone(PHONE), Some(&token.id))
        .await
        .unwrap();
    assert_eq!(removal.deleted_checks, vec![a.id.clone(), b.id.clone()]);

    assert!(services.store.list(Collection::Checks).await.unwrap().is_empty());
    assert!(services.store.read(Collection::Users, PHONE).await.is_err());
}

#[tokio::test]
async fn failed_check_deletes_are_reported_as_orphans() {
    let store = Arc::new(FlakyStore::default());
    let services = Services::new(store.clone(), ServiceConfig::default());
    register(&services, PHONE).await;
    let token = login(&services, PHONE).await;
    let a = services
        .checks
        .create(Some(&token.id), check_spec("example.com/a"))
        .await
        .unwrap();
    let b = services
        .checks
        .create(Some(&token.id), check_spec("example.com/b"))
        .await
        .unwrap();
    store.fail_delete_of(&b.id);

    let err = services
        .users
        .remove(&phone(PHONE), Some(&token.id))
        .await
        .unwrap_err();
    let ServiceError::PartialFailure(partial) = err else {
        panic!("expected a partial failure, got {err:?}");
    };
    assert_eq!(partial.orphans, vec![b.id.clone()]);
    assert_eq!(
        partial.cause,
        LinkFailure::ChecksNotDeleted {
            failed: 1,
            total: 2
        }
    );

    // The user is gone and the first check with it.
    assert!(store.read(Collection::Users, PHONE).await.is_err());
    assert!(store.read(Collection::Checks, &a.id).await.is_err());
    assert!(store.read(Collection::Checks, &b.id).await.is_ok());
}

#[tokio::test]
async fn unlinked_check_creation_reports_orphan() {
    let store = Arc::new(FlakyStore::default());
    let services = Services::new(store.clone(), ServiceConfig::default());
    register(&services, PHONE).await;
    let token = login(&services, PHONE).await;
    store.fail_user_updates();

    let err = services
        .checks
        .create(Some(&token.id), check_spec("example.com"))
        .await
        .unwrap_err();
    let ServiceError::PartialFailure(partial) = err else {
        panic!("expected a partial failure, got {err:?}");
    };
    assert!(matches!(partial.cause, LinkFailure::Store { .. }));
    assert_eq!(partial.orphans.len(), 1);
    assert!(store.read(Collection::Checks, &partial.orphans[0]).await.is_ok());
}

#[tokio::test]
async fn removing_a_check_nobody_lists_is_a_partial_failure() {
    let services = services();
    register(&services, PHONE).await;
    let token = login(&services, PHONE).await;
    let check = services
        .checks
        .create(Some(&token.id), check_spec("example.com"))
        .await
        .unwrap();

    let mut owner = stored_user(&services, PHONE).await;
    owner.checks.clear();
    services
        .store
        .update(Collection::Users, PHONE, serde_json::to_value(&owner).unwrap())
        .await
        .unwrap();

    let err = services
        .checks
        .remove(&record_id(&check.id), Some(&token.id))
        .await
        .unwrap_err();
    let ServiceError::PartialFailure(partial) = err else {
        panic!("expected a partial failure, got {err:?}");
    };
    assert!(matches!(partial.cause, LinkFailure::NotLinked { .. }));
    assert!(partial.orphans.is_empty());
    assert!(services.store.read(Collection::Checks, &check.id).await.is_err());
}

#[tokio::test]
async fn removing_a_check_unlinks_it() {
    let services = services();
    register(&services, PHONE).await;
    let token = login(&services, PHONE).await;
    let keep = services
        .checks
        .create(Some(&token.id), check_spec("example.com/keep"))
        .await
        .unwrap();
    let gone = services
        .checks
        .create(Some(&token.id), check_spec("example.com/drop"))
        .await
        .unwrap();

    services
        .checks
        .remove(&record_id(&gone.id), Some(&token.id))
        .await
        .unwrap();

    assert_eq!(stored_user(&services, PHONE).await.checks, vec![keep.id.clone()]);
    let owned = services
        .checks
        .owned(&phone(PHONE), Some(&token.id))
        .await
        .unwrap();
    assert_eq!(owned, vec![keep]);
}

#[tokio::test]
async fn other_users_token_is_forbidden() {
    let services = services();
    register(&services, PHONE).await;
    register(&services, OTHER_PHONE).await;
    let owner_token = login(&services, PHONE).await;
    let other_token = login(&services, OTHER_PHONE).await;

    let check = services
        .checks
        .create(Some(&owner_token.id), check_spec("example.com"))
        .await
        .unwrap();

    let err = services
        .users
        .fetch(&phone(PHONE), Some(&other_token.id))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Forbidden(_)));

    let err = services
        .checks
        .fetch(&record_id(&check.id), Some(&other_token.id))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Forbidden(_)));

    let err = services
        .checks
        .remove(&record_id(&check.id), None)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Forbidden(_)));
    assert!(services.store.read(Collection::Checks, &check.id).await.is_ok());
}

#[tokio::test]
async fn duplicate_registration_conflicts() {
    let services = services();
    register(&services, PHONE).await;
    let request: RegisterUserRequest = serde_json::from_value(json!({
        "firstName": "Grace",
        "lastName": "Hopper",
        "phone": PHONE,
        "password": "cobol",
        "tosAgreement": true
    }))
    .unwrap();
    let err = services
        .users
        .register(request.validate().unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)));
    assert_eq!(stored_user(&services, PHONE).await.first_name, "Ada");
}

#[tokio::test]
async fn wrong_password_fails_authentication() {
    let services = services();
    register(&services, PHONE).await;
    let request: CreateTokenRequest =
        serde_json::from_value(json!({ "phone": PHONE, "password": "nope" })).unwrap();
    let err = services
        .auth
        .issue(&request.validate().unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::AuthFailed(_)));
    assert!(services.store.list(Collection::Tokens).await.unwrap().is_empty());
}

#[tokio::test]
async fn password_change_takes_effect() {
    let services = services();
    register(&services, PHONE).await;
    let token = login(&services, PHONE).await;

    let request: UpdateUserRequest =
        serde_json::from_value(json!({ "phone": PHONE, "password": "correct horse" })).unwrap();
    let (who, changes) = request.validate().unwrap();
    services
        .users
        .update(&who, Some(&token.id), changes)
        .await
        .unwrap();

    let old: CreateTokenRequest =
        serde_json::from_value(json!({ "phone": PHONE, "password": "hunter22" })).unwrap();
    assert!(services.auth.issue(&old.validate().unwrap()).await.is_err());
    let new: CreateTokenRequest =
        serde_json::from_value(json!({ "phone": PHONE, "password": "correct horse" })).unwrap();
    assert!(services.auth.issue(&new.validate().unwrap()).await.is_ok());
}

#[tokio::test]
async fn check_update_touches_only_supplied_fields() {
    let services = services();
    register(&services, PHONE).await;
    let token = login(&services, PHONE).await;
    let check = services
        .checks
        .create(Some(&token.id), check_spec("example.com"))
        .await
        .unwrap();

    let request: UpdateCheckRequest =
        serde_json::from_value(json!({ "id": check.id, "timeoutSeconds": 5 })).unwrap();
    let (id, changes) = request.validate().unwrap();
    let updated = services
        .checks
        .update(&id, Some(&token.id), changes)
        .await
        .unwrap();

    assert_eq!(updated.timeout_seconds, 5);
    assert_eq!(updated.success_codes, check.success_codes);
    assert_eq!(updated.url, check.url);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_creates_keep_every_link() {
    let services = services();
    register(&services, PHONE).await;
    let token = login(&services, PHONE).await;

    let handles: Vec<_> = (0..5)
        .map(|i| {
            let services = services.clone();
            let token = token.id.clone();
            tokio::spawn(async move {
                services
                    .checks
                    .create(Some(&token), check_spec(&format!("example.com/{i}")))
                    .await
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let owner = stored_user(&services, PHONE).await;
    assert_eq!(owner.checks.len(), 5);
    let mut listed = owner.checks.clone();
    listed.sort();
    let mut stored = services.store.list(Collection::Checks).await.unwrap();
    stored.sort();
    assert_eq!(listed, stored);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn update_racing_removal_never_leaves_an_unlisted_check() {
    let root = std::env::temp_dir().join(format!("uptime-race-{}", uuid::Uuid::new_v4()));
    let store = FileStore::new(&root);
    store.init().await.unwrap();
    let services = Services::new(Arc::new(store), ServiceConfig::default());
    register(&services, PHONE).await;
    let token = login(&services, PHONE).await;

    for _ in 0..50 {
        let check = services
            .checks
            .create(Some(&token.id), check_spec("example.com"))
            .await
            .unwrap();
        let id = record_id(&check.id);
        let request: UpdateCheckRequest =
            serde_json::from_value(json!({ "id": check.id, "timeoutSeconds": 5 })).unwrap();
        let (_, changes) = request.validate().unwrap();

        let updater = {
            let services = services.clone();
            let (id, token) = (id.clone(), token.id.clone());
            tokio::spawn(async move { services.checks.update(&id, Some(&token), changes).await })
        };
        let remover = {
            let services = services.clone();
            let (id, token) = (id.clone(), token.id.clone());
            tokio::spawn(async move { services.checks.remove(&id, Some(&token)).await })
        };

        remover.await.unwrap().unwrap();
        if let Err(e) = updater.await.unwrap() {
            assert!(matches!(e, ServiceError::NotFound(_)), "{e}");
        }

        let err = services
            .store
            .read(Collection::Checks, &check.id)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(stored_user(&services, PHONE).await.checks.is_empty());
    }

    std::fs::remove_dir_all(&root).ok();
}
