//! Request shapes as they arrive from callers, and the typed values they
//! validate into.
//!
//! Every `*Request` is deserialized leniently (all fields optional) and then
//! turned into a pre-validated value with `validate()`. Services only accept
//! the validated values and never re-check shape.

use std::collections::BTreeSet;
use std::fmt;

use serde::Deserialize;

use crate::crypto::RECORD_ID_LEN;
use crate::error::ServiceError;
use crate::model::{HttpMethod, Protocol};

const PHONE_LEN: usize = 10;
const MIN_TIMEOUT_SECS: u8 = 1;
const MAX_TIMEOUT_SECS: u8 = 5;

/// A 10-digit phone number identifying a user.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Phone(String);

impl Phone {
    pub fn parse(raw: &str) -> Result<Self, ServiceError> {
        let trimmed = raw.trim();
        if trimmed.len() == PHONE_LEN && trimmed.bytes().all(|b| b.is_ascii_digit()) {
            Ok(Self(trimmed.to_string()))
        } else {
            Err(ServiceError::Validation(
                "phone must be exactly 10 digits".into(),
            ))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Phone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A 20-character token or check id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordId(String);

impl RecordId {
    pub fn parse(raw: &str) -> Result<Self, ServiceError> {
        let trimmed = raw.trim();
        if trimmed.len() == RECORD_ID_LEN && trimmed.bytes().all(|b| b.is_ascii_alphanumeric()) {
            Ok(Self(trimmed.to_string()))
        } else {
            Err(ServiceError::Validation(format!(
                "id must be {RECORD_ID_LEN} alphanumeric characters"
            )))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A non-empty plaintext password. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct Password(String);

impl Password {
    pub fn parse(raw: &str) -> Result<Self, ServiceError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            Err(ServiceError::Validation("password must not be empty".into()))
        } else {
            Ok(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Password(***)")
    }
}

fn non_empty(raw: Option<String>) -> Option<String> {
    raw.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

fn missing(fields: &[&str]) -> ServiceError {
    ServiceError::Validation(format!(
        "missing or invalid required fields: {}",
        fields.join(", ")
    ))
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterUserRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub password: Option<String>,
    pub tos_agreement: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub first_name: String,
    pub last_name: String,
    pub phone: Phone,
    pub password: Password,
}

impl RegisterUserRequest {
    pub fn validate(self) -> Result<NewUser, ServiceError> {
        let first_name = non_empty(self.first_name);
        let last_name = non_empty(self.last_name);
        let phone = self.phone.as_deref().and_then(|p| Phone::parse(p).ok());
        let password = self.password.as_deref().and_then(|p| Password::parse(p).ok());
        let tos = self.tos_agreement == Some(true);

        match (first_name, last_name, phone, password, tos) {
            (Some(first_name), Some(last_name), Some(phone), Some(password), true) => Ok(NewUser {
                first_name,
                last_name,
                phone,
                password,
            }),
            (first_name, last_name, phone, password, tos) => {
                let mut bad = Vec::new();
                if first_name.is_none() {
                    bad.push("firstName");
                }
                if last_name.is_none() {
                    bad.push("lastName");
                }
                if phone.is_none() {
                    bad.push("phone");
                }
                if password.is_none() {
                    bad.push("password");
                }
                if !tos {
                    bad.push("tosAgreement");
                }
                Err(missing(&bad))
            }
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    pub phone: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub password: Option<String>,
}

/// At least one profile field to change.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub password: Option<Password>,
}

impl UpdateUserRequest {
    pub fn validate(self) -> Result<(Phone, UserChanges), ServiceError> {
        let phone = Phone::parse(self.phone.as_deref().unwrap_or_default())
            .map_err(|_| missing(&["phone"]))?;
        let changes = UserChanges {
            first_name: non_empty(self.first_name),
            last_name: non_empty(self.last_name),
            password: self.password.as_deref().map(Password::parse).transpose()?,
        };
        if changes.first_name.is_none() && changes.last_name.is_none() && changes.password.is_none()
        {
            return Err(ServiceError::Validation("missing fields to update".into()));
        }
        Ok((phone, changes))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTokenRequest {
    pub phone: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Credentials {
    pub phone: Phone,
    pub password: Password,
}

impl CreateTokenRequest {
    pub fn validate(self) -> Result<Credentials, ServiceError> {
        let phone = self.phone.as_deref().and_then(|p| Phone::parse(p).ok());
        let password = self.password.as_deref().and_then(|p| Password::parse(p).ok());
        match (phone, password) {
            (Some(phone), Some(password)) => Ok(Credentials { phone, password }),
            (phone, _) => Err(missing(if phone.is_none() {
                &["phone"]
            } else {
                &["password"]
            })),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtendTokenRequest {
    pub id: Option<String>,
    pub extend: Option<bool>,
}

impl ExtendTokenRequest {
    pub fn validate(self) -> Result<RecordId, ServiceError> {
        let id = self.id.as_deref().and_then(|id| RecordId::parse(id).ok());
        match (id, self.extend) {
            (Some(id), Some(true)) => Ok(id),
            _ => Err(missing(&["id", "extend"])),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCheckRequest {
    pub protocol: Option<String>,
    pub url: Option<String>,
    pub method: Option<String>,
    pub success_codes: Option<Vec<i64>>,
    pub timeout_seconds: Option<f64>,
}

/// A fully specified check definition, ready to persist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckSpec {
    pub protocol: Protocol,
    pub url: String,
    pub method: HttpMethod,
    pub success_codes: BTreeSet<u16>,
    pub timeout_seconds: u8,
}

impl CreateCheckRequest {
    pub fn validate(self) -> Result<CheckSpec, ServiceError> {
        let protocol = self.protocol.as_deref().map(parse_protocol).transpose()?;
        let url = self.url.as_deref().map(parse_url).transpose()?;
        let method = self.method.as_deref().map(parse_method).transpose()?;
        let success_codes = self.success_codes.as_deref().map(parse_codes).transpose()?;
        let timeout_seconds = self.timeout_seconds.map(parse_timeout).transpose()?;

        match (protocol, url, method, success_codes, timeout_seconds) {
            (Some(protocol), Some(url), Some(method), Some(success_codes), Some(timeout_seconds)) => {
                Ok(CheckSpec {
                    protocol,
                    url,
                    method,
                    success_codes,
                    timeout_seconds,
                })
            }
            (protocol, url, method, codes, timeout) => {
                let mut bad = Vec::new();
                if protocol.is_none() {
                    bad.push("protocol");
                }
                if url.is_none() {
                    bad.push("url");
                }
                if method.is_none() {
                    bad.push("method");
                }
                if codes.is_none() {
                    bad.push("successCodes");
                }
                if timeout.is_none() {
                    bad.push("timeoutSeconds");
                }
                Err(missing(&bad))
            }
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCheckRequest {
    pub id: Option<String>,
    pub protocol: Option<String>,
    pub url: Option<String>,
    pub method: Option<String>,
    pub success_codes: Option<Vec<i64>>,
    pub timeout_seconds: Option<f64>,
}

/// At least one check field to change.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckChanges {
    pub protocol: Option<Protocol>,
    pub url: Option<String>,
    pub method: Option<HttpMethod>,
    pub success_codes: Option<BTreeSet<u16>>,
    pub timeout_seconds: Option<u8>,
}

impl UpdateCheckRequest {
    pub fn validate(self) -> Result<(RecordId, CheckChanges), ServiceError> {
        let id = RecordId::parse(self.id.as_deref().unwrap_or_default())
            .map_err(|_| missing(&["id"]))?;
        let changes = CheckChanges {
            protocol: self.protocol.as_deref().map(parse_protocol).transpose()?,
            url: self.url.as_deref().map(parse_url).transpose()?,
            method: self.method.as_deref().map(parse_method).transpose()?,
            success_codes: self.success_codes.as_deref().map(parse_codes).transpose()?,
            timeout_seconds: self.timeout_seconds.map(parse_timeout).transpose()?,
        };
        if changes == CheckChanges::default() {
            return Err(ServiceError::Validation("missing fields to update".into()));
        }
        Ok((id, changes))
    }
}

fn parse_protocol(raw: &str) -> Result<Protocol, ServiceError> {
    raw.parse().map_err(ServiceError::Validation)
}

fn parse_method(raw: &str) -> Result<HttpMethod, ServiceError> {
    raw.parse().map_err(ServiceError::Validation)
}

/// Host and path only; the scheme travels separately as the protocol.
fn parse_url(raw: &str) -> Result<String, ServiceError> {
    let trimmed = raw.trim();
    let invalid = || ServiceError::Validation(format!("invalid url '{trimmed}'"));
    if trimmed.is_empty() || trimmed.contains("://") || trimmed.contains(char::is_whitespace) {
        return Err(invalid());
    }
    let parsed = url::Url::parse(&format!("http://{trimmed}")).map_err(|_| invalid())?;
    if parsed.host_str().map_or(true, str::is_empty) {
        return Err(invalid());
    }
    Ok(trimmed.to_string())
}

fn parse_codes(raw: &[i64]) -> Result<BTreeSet<u16>, ServiceError> {
    if raw.is_empty() {
        return Err(ServiceError::Validation(
            "successCodes must not be empty".into(),
        ));
    }
    raw.iter()
        .map(|&code| match u16::try_from(code) {
            Ok(c) if (100..=599).contains(&c) => Ok(c),
            _ => Err(ServiceError::Validation(format!(
                "invalid HTTP status code {code}"
            ))),
        })
        .collect()
}

fn parse_timeout(raw: f64) -> Result<u8, ServiceError> {
    if raw.fract() == 0.0 && raw >= MIN_TIMEOUT_SECS as f64 && raw <= MAX_TIMEOUT_SECS as f64 {
        Ok(raw as u8)
    } else {
        Err(ServiceError::Validation(format!(
            "timeoutSeconds must be a whole number between {MIN_TIMEOUT_SECS} and {MAX_TIMEOUT_SECS}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn register() -> RegisterUserRequest {
        RegisterUserRequest {
            first_name: Some(" Ada ".into()),
            last_name: Some("Lovelace".into()),
            phone: Some("5551234567".into()),
            password: Some("hunter2".into()),
            tos_agreement: Some(true),
        }
    }

    fn create_check() -> CreateCheckRequest {
        CreateCheckRequest {
            protocol: Some("http".into()),
            url: Some("example.com".into()),
            method: Some("get".into()),
            success_codes: Some(vec![200, 201, 200]),
            timeout_seconds: Some(3.0),
        }
    }

    #[test]
    fn phone_requires_ten_digits() {
        assert_eq!(Phone::parse(" 5551234567 ").unwrap().as_str(), "5551234567");
        assert!(Phone::parse("555123456").is_err());
        assert!(Phone::parse("55512345678").is_err());
        assert!(Phone::parse("555123456a").is_err());
    }

    #[test]
    fn record_id_requires_twenty_alphanumerics() {
        assert!(RecordId::parse("abcdefghij0123456789").is_ok());
        assert!(RecordId::parse("short").is_err());
        assert!(RecordId::parse("abcdefghij012345678/").is_err());
    }

    #[test]
    fn password_debug_is_redacted() {
        let pw = Password::parse("secret").unwrap();
        assert_eq!(format!("{pw:?}"), "Password(***)");
    }

    #[test]
    fn register_trims_and_accepts() {
        let user = register().validate().unwrap();
        assert_eq!(user.first_name, "Ada");
        assert_eq!(user.phone.as_str(), "5551234567");
    }

    #[test]
    fn register_requires_tos() {
        let mut req = register();
        req.tos_agreement = Some(false);
        let err = req.validate().unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
        assert!(err.to_string().contains("tosAgreement"));
    }

    #[test]
    fn register_lists_every_missing_field() {
        let err = RegisterUserRequest::default().validate().unwrap_err();
        let msg = err.to_string();
        for field in ["firstName", "lastName", "phone", "password", "tosAgreement"] {
            assert!(msg.contains(field), "{msg}");
        }
    }

    #[test]
    fn update_user_needs_a_field() {
        let req = UpdateUserRequest {
            phone: Some("5551234567".into()),
            first_name: Some("   ".into()),
            ..Default::default()
        };
        let err = req.validate().unwrap_err();
        assert_eq!(err.to_string(), "missing fields to update");
    }

    #[test]
    fn update_user_keeps_only_supplied_fields() {
        let (phone, changes) = UpdateUserRequest {
            phone: Some("5551234567".into()),
            last_name: Some("Byron".into()),
            ..Default::default()
        }
        .validate()
        .unwrap();
        assert_eq!(phone.as_str(), "5551234567");
        assert_eq!(changes.last_name.as_deref(), Some("Byron"));
        assert!(changes.first_name.is_none());
        assert!(changes.password.is_none());
    }

    #[test]
    fn update_user_rejects_blank_password() {
        let err = UpdateUserRequest {
            phone: Some("5551234567".into()),
            first_name: Some("Ada".into()),
            password: Some("  ".into()),
            ..Default::default()
        }
        .validate()
        .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
        assert_eq!(err.to_string(), "password must not be empty");
    }

    #[test]
    fn token_request_needs_phone_and_password() {
        let err = CreateTokenRequest {
            phone: Some("5551234567".into()),
            password: None,
        }
        .validate()
        .unwrap_err();
        assert!(err.to_string().contains("password"));
    }

    #[test]
    fn extend_requires_flag() {
        let req = ExtendTokenRequest {
            id: Some("abcdefghij0123456789".into()),
            extend: Some(false),
        };
        assert!(req.validate().is_err());
        let req = ExtendTokenRequest {
            id: Some("abcdefghij0123456789".into()),
            extend: Some(true),
        };
        assert_eq!(req.validate().unwrap().as_str(), "abcdefghij0123456789");
    }

    #[test]
    fn create_check_dedupes_codes() {
        let spec = create_check().validate().unwrap();
        assert_eq!(spec.protocol, Protocol::Http);
        assert_eq!(spec.method, HttpMethod::Get);
        assert_eq!(spec.success_codes.len(), 2);
        assert_eq!(spec.timeout_seconds, 3);
    }

    #[test]
    fn create_check_rejects_bad_timeout() {
        for t in [0.0, 6.0, 2.5] {
            let mut req = create_check();
            req.timeout_seconds = Some(t);
            assert!(req.validate().is_err(), "timeout {t} accepted");
        }
    }

    #[test]
    fn create_check_rejects_bad_fields() {
        let mut req = create_check();
        req.protocol = Some("ftp".into());
        assert!(req.validate().is_err());

        let mut req = create_check();
        req.success_codes = Some(vec![]);
        assert!(req.validate().is_err());

        let mut req = create_check();
        req.success_codes = Some(vec![99]);
        assert!(req.validate().is_err());

        let mut req = create_check();
        req.url = Some("http://example.com".into());
        assert!(req.validate().is_err());
    }

    #[test]
    fn create_check_reports_missing_fields() {
        let mut req = create_check();
        req.method = None;
        let err = req.validate().unwrap_err();
        assert!(err.to_string().contains("method"));
    }

    #[test]
    fn url_with_path_is_accepted() {
        let mut req = create_check();
        req.url = Some("example.com/health?full=1".into());
        assert_eq!(req.validate().unwrap().url, "example.com/health?full=1");
    }

    #[test]
    fn update_check_needs_a_field() {
        let req = UpdateCheckRequest {
            id: Some("abcdefghij0123456789".into()),
            ..Default::default()
        };
        assert_eq!(req.validate().unwrap_err().to_string(), "missing fields to update");
    }

    #[test]
    fn update_check_parses_supplied_fields() {
        let (id, changes) = UpdateCheckRequest {
            id: Some("abcdefghij0123456789".into()),
            timeout_seconds: Some(5.0),
            ..Default::default()
        }
        .validate()
        .unwrap();
        assert_eq!(id.as_str(), "abcdefghij0123456789");
        assert_eq!(changes.timeout_seconds, Some(5));
        assert!(changes.success_codes.is_none());
    }
}
