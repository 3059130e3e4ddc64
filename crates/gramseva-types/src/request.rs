//! Service requests and their status machine.
//!
//! ```text
//!            ┌──────────────┐
//!            │   Pending    │──────────────┐
//!            └──────┬───────┘              │
//!                   │                      │
//!                   ▼                      ▼
//!            ┌──────────────┐       ┌─────────────┐
//!            │ In Progress  │──────▶│  Resolved   │ (terminal)
//!            └──────┬───────┘       └─────────────┘
//!                   │
//!                   ▼
//!            ┌──────────────┐
//!            │  Cancelled   │ (terminal, also reachable from Pending)
//!            └──────────────┘
//! ```

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

use crate::account::Department;
use crate::collection::{Collection, Record};
use crate::ids::IdKind;
use crate::location::LocationStamp;

#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRefStr,
)]
pub enum RequestStatus {
    #[default]
    Pending,
    #[serde(rename = "In Progress")]
    #[strum(serialize = "In Progress")]
    InProgress,
    Resolved,
    Cancelled,
}

/// Rejected status change.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("request is already {0} and cannot change")]
    Terminal(RequestStatus),
    #[error("cannot move a request from {from} to {to}")]
    Illegal { from: RequestStatus, to: RequestStatus },
}

impl RequestStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, RequestStatus::Resolved | RequestStatus::Cancelled)
    }

    /// Validate a move to `next`. Re-applying the current status is allowed.
    pub fn transition(self, next: RequestStatus) -> Result<RequestStatus, TransitionError> {
        use RequestStatus::*;

        if self == next {
            return Ok(next);
        }
        if self.is_terminal() {
            return Err(TransitionError::Terminal(self));
        }
        match (self, next) {
            (Pending, InProgress | Resolved | Cancelled) | (InProgress, Resolved | Cancelled) => {
                Ok(next)
            }
            (from, to) => Err(TransitionError::Illegal { from, to }),
        }
    }
}

/// Who raised a request.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestSource {
    #[default]
    User,
    Admin,
}

/// Service the request is about.
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
pub enum ServiceCategory {
    Certificate,
    #[serde(rename = "NOC")]
    #[strum(serialize = "NOC")]
    Noc,
    Electricity,
    Gas,
    Health,
    Chavdi,
    Water,
    Other,
}

impl ServiceCategory {
    /// Department that triages requests of this category.
    pub fn department(self) -> Department {
        match self {
            ServiceCategory::Electricity => Department::Electricity,
            ServiceCategory::Gas => Department::Gas,
            ServiceCategory::Health => Department::Health,
            ServiceCategory::Chavdi => Department::Revenue,
            ServiceCategory::Water => Department::WaterSupply,
            ServiceCategory::Certificate | ServiceCategory::Noc | ServiceCategory::Other => {
                Department::GramPanchayat
            }
        }
    }
}

/// A ticket raised by a citizen or issued by an officer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceRequest {
    pub id: String,
    pub requester_id: String,
    pub requester_name: String,
    #[serde(flatten)]
    pub location: LocationStamp,
    pub category: ServiceCategory,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: RequestStatus,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub source: RequestSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub officer_report: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub officer_document: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub citizen_document: Option<String>,
}

impl ServiceRequest {
    /// New pending request with a fresh id, created now.
    pub fn new(
        requester_id: impl Into<String>,
        requester_name: impl Into<String>,
        location: LocationStamp,
        category: ServiceCategory,
        title: impl Into<String>,
        description: impl Into<String>,
        source: RequestSource,
    ) -> Self {
        Self {
            id: IdKind::Request.fresh(),
            requester_id: requester_id.into(),
            requester_name: requester_name.into(),
            location,
            category,
            title: title.into(),
            description: description.into(),
            status: RequestStatus::Pending,
            created_at: crate::display_now(),
            source,
            officer_report: None,
            officer_document: None,
            citizen_document: None,
        }
    }
}

impl Record for ServiceRequest {
    const COLLECTION: Collection = Collection::Requests;

    fn id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use RequestStatus::*;

    #[test]
    fn test_forward_transitions() {
        assert_eq!(Pending.transition(InProgress), Ok(InProgress));
        assert_eq!(Pending.transition(Resolved), Ok(Resolved));
        assert_eq!(InProgress.transition(Resolved), Ok(Resolved));
        assert_eq!(InProgress.transition(Cancelled), Ok(Cancelled));
        assert_eq!(Pending.transition(Cancelled), Ok(Cancelled));
    }

    #[test]
    fn test_terminal_states() {
        assert_eq!(Resolved.transition(Pending), Err(TransitionError::Terminal(Resolved)));
        assert_eq!(Cancelled.transition(InProgress), Err(TransitionError::Terminal(Cancelled)));
        // Same status is a no-op, even when terminal.
        assert_eq!(Resolved.transition(Resolved), Ok(Resolved));
    }

    #[test]
    fn test_backward_is_illegal() {
        assert_eq!(
            InProgress.transition(Pending),
            Err(TransitionError::Illegal { from: InProgress, to: Pending })
        );
    }

    #[test]
    fn test_status_wire_names() {
        assert_eq!(serde_json::to_string(&InProgress).unwrap(), r#""In Progress""#);
        let s: RequestStatus = serde_json::from_str(r#""Cancelled""#).unwrap();
        assert_eq!(s, Cancelled);
    }

    #[test]
    fn test_category_department() {
        assert_eq!(ServiceCategory::Chavdi.department(), Department::Revenue);
        assert_eq!(ServiceCategory::Noc.department(), Department::GramPanchayat);
        assert_eq!(serde_json::to_string(&ServiceCategory::Noc).unwrap(), r#""NOC""#);
    }
}
