use std::collections::BTreeSet;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::crypto::RECORD_ID_LEN;
use crate::model::{Check, HttpMethod, Protocol};

/// A stored check as the scanner sees it. `None` marks a field that was
/// missing or had the wrong shape.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScannedCheck {
    pub id: Option<String>,
    pub user_phone: Option<String>,
    pub protocol: Option<Protocol>,
    pub url: Option<String>,
    pub method: Option<HttpMethod>,
    pub success_codes: Option<BTreeSet<u16>>,
    pub timeout_seconds: Option<u8>,
}

impl ScannedCheck {
    pub fn invalid_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.id.is_none() {
            fields.push("id");
        }
        if self.user_phone.is_none() {
            fields.push("userPhone");
        }
        if self.protocol.is_none() {
            fields.push("protocol");
        }
        if self.url.is_none() {
            fields.push("url");
        }
        if self.method.is_none() {
            fields.push("method");
        }
        if self.success_codes.is_none() {
            fields.push("successCodes");
        }
        if self.timeout_seconds.is_none() {
            fields.push("timeoutSeconds");
        }
        fields
    }

    pub fn is_well_formed(&self) -> bool {
        self.invalid_fields().is_empty()
    }

    pub fn into_check(self) -> Option<Check> {
        Some(Check {
            id: self.id?,
            user_phone: self.user_phone?,
            protocol: self.protocol?,
            url: self.url?,
            method: self.method?,
            success_codes: self.success_codes?,
            timeout_seconds: self.timeout_seconds?,
        })
    }
}

fn trimmed_of_len(value: Option<&Value>, len: usize) -> Option<String> {
    let s = value?.as_str()?.trim();
    (s.len() == len).then(|| s.to_string())
}

/// Check each field of a raw record independently.
///
/// Never fails: a record of any shape (even a non-object) yields a
/// `ScannedCheck` whose bad fields are `None`.
pub fn validate(record: &Value) -> ScannedCheck {
    let field = |name: &'static str| record.get(name);

    let url = field("url")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    let success_codes = field("successCodes")
        .and_then(Value::as_array)
        .filter(|codes| !codes.is_empty())
        .and_then(|codes| {
            codes
                .iter()
                .map(|c| c.as_u64().and_then(|c| u16::try_from(c).ok()))
                .collect::<Option<BTreeSet<u16>>>()
        });

    let timeout_seconds = field("timeoutSeconds")
        .and_then(Value::as_u64)
        .filter(|t| (1..=5).contains(t))
        .map(|t| t as u8);

    ScannedCheck {
        id: trimmed_of_len(field("id"), RECORD_ID_LEN),
        user_phone: trimmed_of_len(field("userPhone"), 10),
        protocol: field("protocol")
            .and_then(Value::as_str)
            .and_then(|s| s.parse().ok()),
        url,
        method: field("method")
            .and_then(Value::as_str)
            .and_then(|s| s.parse().ok()),
        success_codes,
        timeout_seconds,
    }
}

/// Receives every check the scanner reads.
///
/// This is where probing an endpoint, recording its outcome and deciding on
/// alerts belong. None of that exists yet.
#[async_trait]
pub trait CheckProcessor: Send + Sync {
    async fn process(&self, check: ScannedCheck);
}

/// Logs each scanned check and does nothing else.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingProcessor;

#[async_trait]
impl CheckProcessor for LoggingProcessor {
    async fn process(&self, check: ScannedCheck) {
        let invalid = check.invalid_fields();
        if invalid.is_empty() {
            debug!(
                check_id = check.id.as_deref().unwrap_or_default(),
                url = check.url.as_deref().unwrap_or_default(),
                "Check scanned"
            );
        } else {
            warn!(
                check_id = check.id.as_deref().unwrap_or("<invalid>"),
                invalid = ?invalid,
                "Scanned check is malformed"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn good() -> Value {
        json!({
            "id": "abcdefghij0123456789",
            "userPhone": "5551234567",
            "protocol": "http",
            "url": "example.com",
            "method": "get",
            "successCodes": [200, 201],
            "timeoutSeconds": 3
        })
    }

    #[test]
    fn well_formed_record() {
        let scanned = validate(&good());
        assert!(scanned.is_well_formed());
        let check = scanned.into_check().unwrap();
        assert_eq!(check.protocol, Protocol::Http);
        assert_eq!(check.success_codes.len(), 2);
    }

    #[test]
    fn each_bad_field_is_flagged_independently() {
        let mut record = good();
        record["protocol"] = json!("ftp");
        record["timeoutSeconds"] = json!(9);
        let scanned = validate(&record);
        assert_eq!(scanned.invalid_fields(), vec!["protocol", "timeoutSeconds"]);
        assert_eq!(scanned.url.as_deref(), Some("example.com"));
        assert!(scanned.into_check().is_none());
    }

    #[test]
    fn mistyped_fields_are_invalid() {
        let mut record = good();
        record["id"] = json!(42);
        record["userPhone"] = json!("123");
        record["successCodes"] = json!(["200"]);
        let scanned = validate(&record);
        assert_eq!(scanned.invalid_fields(), vec!["id", "userPhone", "successCodes"]);
    }

    #[test]
    fn empty_codes_are_invalid() {
        let mut record = good();
        record["successCodes"] = json!([]);
        assert!(validate(&record).success_codes.is_none());
    }

    #[test]
    fn non_object_record_has_every_field_invalid() {
        let scanned = validate(&json!("garbage"));
        assert_eq!(scanned.invalid_fields().len(), 7);
        assert_eq!(scanned, ScannedCheck::default());
    }
}
