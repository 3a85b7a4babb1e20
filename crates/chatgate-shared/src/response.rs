//! The `{ status, message, data }` envelope every endpoint answers with.

use serde::{Deserialize, Serialize};

/// Outcome carried in [`Envelope::status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnvelopeStatus {
    Success,
    Fail,
    Unauthorized,
}

/// Standard response wrapper. `data` is always present on the wire, `null`
/// when there is nothing to return.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T = serde_json::Value> {
    pub status: EnvelopeStatus,
    pub message: String,
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    pub fn success(message: impl Into<String>, data: Option<T>) -> Self {
        Self {
            status: EnvelopeStatus::Success,
            message: message.into(),
            data,
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            status: EnvelopeStatus::Fail,
            message: message.into(),
            data: None,
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self {
            status: EnvelopeStatus::Unauthorized,
            message: message.into(),
            data: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fail_serializes_null_data() {
        let json = serde_json::to_value(Envelope::<()>::fail("nope")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "status": "Fail", "message": "nope", "data": null })
        );
    }

    #[test]
    fn test_unauthorized_status_name() {
        let json = serde_json::to_string(&Envelope::<()>::unauthorized("x")).unwrap();
        assert!(json.contains(r#""status":"Unauthorized""#));
    }
}
