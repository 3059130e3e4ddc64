//! Accounts, roles, and departments.
//!
//! An `Account` is the identity record for every actor. Credentials are not
//! part of it: the server keeps them in a separate store and never returns
//! them, so an account list can be broadcast to every client.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

use crate::collection::{Collection, Record};
use crate::ids::IdKind;
use crate::location::LocationStamp;

/// Who an actor is.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    Resident,
    Officer,
    Developer,
}

impl Role {
    /// Id prefix for accounts of this role.
    pub fn id_kind(self) -> IdKind {
        match self {
            Role::Resident => IdKind::Resident,
            Role::Officer => IdKind::Officer,
            Role::Developer => IdKind::Developer,
        }
    }
}

/// Approval state of an account.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AccountStatus {
    #[default]
    Approved,
    Pending,
    Rejected,
}

/// Officer department. Decides which bill types an officer issues and sees.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
)]
pub enum Department {
    #[serde(rename = "Gram Panchayat")]
    #[strum(serialize = "Gram Panchayat")]
    GramPanchayat,
    Electricity,
    #[serde(rename = "Water Supply")]
    #[strum(serialize = "Water Supply")]
    WaterSupply,
    Gas,
    Health,
    Revenue,
}

/// Identity record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mobile: Option<String>,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<Department>,
    #[serde(flatten)]
    pub location: LocationStamp,
    #[serde(default)]
    pub status: AccountStatus,
    #[serde(default)]
    pub joined_at: String,
    /// Resident → officer reference. Set once at registration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_officer_id: Option<String>,
}

impl Account {
    /// A new account with a fresh role-prefixed id, joined now.
    ///
    /// Residents start approved; officers and developers start pending.
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        role: Role,
        location: LocationStamp,
    ) -> Self {
        let status = match role {
            Role::Resident => AccountStatus::Approved,
            Role::Officer | Role::Developer => AccountStatus::Pending,
        };
        Self {
            id: role.id_kind().fresh(),
            name: name.into(),
            email: email.into(),
            mobile: None,
            role,
            department: None,
            location,
            status,
            joined_at: crate::display_today(),
            assigned_officer_id: None,
        }
    }

    pub fn with_mobile(mut self, mobile: impl Into<String>) -> Self {
        self.mobile = Some(mobile.into());
        self
    }

    pub fn with_department(mut self, department: Department) -> Self {
        self.department = Some(department);
        self
    }

    pub fn with_status(mut self, status: AccountStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_assigned_officer(mut self, officer_id: impl Into<String>) -> Self {
        self.assigned_officer_id = Some(officer_id.into());
        self
    }

    /// Case-insensitive email comparison.
    pub fn email_matches(&self, email: &str) -> bool {
        self.email.trim().eq_ignore_ascii_case(email.trim())
    }

    /// Mobile comparison ignoring surrounding whitespace. Absent never matches.
    pub fn mobile_matches(&self, mobile: Option<&str>) -> bool {
        match (self.mobile.as_deref(), mobile) {
            (Some(a), Some(b)) => {
                let (a, b) = (a.trim(), b.trim());
                !a.is_empty() && a == b
            }
            _ => false,
        }
    }

    /// Why this account may not log in, if anything blocks it.
    pub fn login_block_reason(&self) -> Option<&'static str> {
        match (self.status, self.role) {
            (AccountStatus::Approved, _) => None,
            (AccountStatus::Rejected, _) => Some(
                "Your registration has been rejected. Please contact your village office for details.",
            ),
            (AccountStatus::Pending, Role::Resident) => Some(
                "Your resident account is awaiting approval from your village officer.",
            ),
            (AccountStatus::Pending, Role::Officer | Role::Developer) => Some(
                "Your officer account is pending verification by the administration.",
            ),
        }
    }
}

/// Officer-key pool membership: trimmed, case-insensitive.
pub fn officer_key_matches(pool: &[String], candidate: &str) -> bool {
    let candidate = candidate.trim();
    !candidate.is_empty() && pool.iter().any(|k| k.trim().eq_ignore_ascii_case(candidate))
}

impl Record for Account {
    const COLLECTION: Collection = Collection::Accounts;

    fn id(&self) -> &str {
        &self.id
    }
}
