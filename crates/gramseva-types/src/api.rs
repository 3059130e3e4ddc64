//! Request and response bodies for the `/api` surface.
//!
//! Collection reads and writes carry bare arrays and need no wrapper; the
//! types here cover auth, settlement, health, errors, and realtime frames.

use serde::{Deserialize, Serialize};

use crate::account::{Account, Department, Role};
use crate::billing::{Bill, Payment, Transaction};
use crate::collection::Collection;

/// `POST /api/auth/login`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<Department>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LoginResponse {
    pub success: bool,
    pub account: Account,
}

/// `POST /api/auth/register`: the account fields plus credentials, flat.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[serde(flatten)]
    pub account: Account,
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub officer_key: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub success: bool,
    pub account: Account,
    pub accounts: Vec<Account>,
}

/// `{"success": true}`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub success: bool,
}

impl SuccessResponse {
    pub const OK: SuccessResponse = SuccessResponse { success: true };
}

/// `{"error": "..."}`, returned with every non-2xx status.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

/// `POST /api/bills/{id}/settle` body.
pub type SettleBillRequest = Payment;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SettleBillResponse {
    pub success: bool,
    pub bill: Bill,
    pub transaction: Transaction,
}

/// One realtime frame: `{"event": "data-update-<c>", "payload": [...]}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChannelMessage {
    pub event: String,
    pub payload: serde_json::Value,
}

impl ChannelMessage {
    pub fn update(collection: Collection, payload: serde_json::Value) -> Self {
        Self {
            event: collection.event_name(),
            payload,
        }
    }

    /// Collection this frame replaces, if the event name is one we know.
    pub fn collection(&self) -> Option<Collection> {
        Collection::from_event_name(&self.event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::LocationStamp;

    #[test]
    fn test_register_request_is_flat() {
        let account = Account::new(
            "Vikram",
            "vikram@example.in",
            Role::Officer,
            LocationStamp::new("Maharashtra", "Pune", "Haveli", "Wagholi", "412207"),
        )
        .with_department(Department::Gas);
        let req = RegisterRequest {
            account,
            password: "secret".into(),
            officer_key: Some("OFFICER01".into()),
        };
        let v = serde_json::to_value(&req).unwrap();
        assert_eq!(v["email"], "vikram@example.in");
        assert_eq!(v["officerKey"], "OFFICER01");
        assert_eq!(v["village"], "Wagholi");
        assert!(v.get("account").is_none());

        let back: RegisterRequest = serde_json::from_value(v).unwrap();
        assert_eq!(back.account.department, Some(Department::Gas));
    }

    #[test]
    fn test_login_request_without_department() {
        let json = r#"{"email":"a@x.in","password":"p","role":"resident"}"#;
        let req: LoginRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.role, Role::Resident);
        assert!(req.department.is_none());
    }

    #[test]
    fn test_channel_message_collection() {
        let msg = ChannelMessage::update(Collection::Notices, serde_json::json!([]));
        assert_eq!(msg.event, "data-update-notices");
        assert_eq!(msg.collection(), Some(Collection::Notices));

        let unknown = ChannelMessage { event: "hello".into(), payload: serde_json::Value::Null };
        assert_eq!(unknown.collection(), None);
    }
}
