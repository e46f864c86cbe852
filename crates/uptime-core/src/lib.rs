#![forbid(unsafe_code)]

pub mod clock;
pub mod config;
pub mod crypto;
pub mod error;
pub mod input;
pub mod model;
pub mod scanner;
pub mod service;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::ServiceConfig;
pub use crypto::{random_id, PasswordHasher, RECORD_ID_LEN};
pub use error::{LinkFailure, PartialFailure, ServiceError};
pub use input::{
    CheckChanges, CheckSpec, CreateCheckRequest, CreateTokenRequest, Credentials,
    ExtendTokenRequest, NewUser, Password, Phone, RecordId, RegisterUserRequest,
    UpdateCheckRequest, UpdateUserRequest, UserChanges,
};
pub use model::{Check, HttpMethod, Protocol, Token, User, UserProfile};
pub use scanner::{
    validate, CheckProcessor, LoggingProcessor, MonitorScanner, ScanReport, ScannedCheck,
    ScannerState,
};
pub use service::{AuthService, CheckService, OwnerLocks, Services, UserRemoval, UserService};
pub use store::{Collection, FileStore, MemoryStore, RecordStore, StoreError};
