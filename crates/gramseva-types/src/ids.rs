//! Record identifiers.
//!
//! Ids are opaque strings on the wire. Generated ids carry a short kind
//! prefix (`RES-`, `REQ-`, `BILL-` …) followed by a UUIDv7 in simple hex, so
//! they sort by creation time and read well in logs. Ids from other clients
//! are never parsed; only equality matters.

use strum::{AsRefStr, Display};

/// Prefix family for generated ids.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, AsRefStr)]
pub enum IdKind {
    #[strum(serialize = "RES")]
    Resident,
    #[strum(serialize = "OFF")]
    Officer,
    #[strum(serialize = "DEV")]
    Developer,
    #[strum(serialize = "REQ")]
    Request,
    #[strum(serialize = "BILL")]
    Bill,
    #[strum(serialize = "TXN")]
    Transaction,
    #[strum(serialize = "NOTICE")]
    Notice,
    #[strum(serialize = "NOTIF")]
    Notification,
    #[strum(serialize = "BIZ")]
    Business,
}

impl IdKind {
    /// Generate a fresh id of this kind.
    pub fn fresh(self) -> String {
        format!("{}-{}", self.as_ref(), uuid::Uuid::now_v7().as_simple())
    }
}

/// Payment reference shown to the payer: `REF` plus 10 upper-case hex digits.
pub fn reference_id() -> String {
    let hex = uuid::Uuid::new_v4().as_simple().to_string().to_uppercase();
    format!("REF{}", &hex[..10])
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_has_prefix() {
        let id = IdKind::Resident.fresh();
        assert!(id.starts_with("RES-"));
        assert_eq!(id.len(), "RES-".len() + 32);
    }

    #[test]
    fn test_fresh_unique() {
        assert_ne!(IdKind::Bill.fresh(), IdKind::Bill.fresh());
    }

    #[test]
    fn test_reference_id_shape() {
        let r = reference_id();
        assert!(r.starts_with("REF"));
        assert_eq!(r.len(), 13);
        assert!(r[3..].chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase()));
    }
}
