//! Scoping & visibility: which records an actor sees.
//!
//! The rule, per record:
//!
//! 1. Developers see everything.
//! 2. Residents see owned records (requests, bills, transactions) only when
//!    they own them, regardless of location.
//! 3. Otherwise every enabled location field must match: the viewer's value
//!    is `"All"`, or (pincode only) `"000000"`, or equal to the record's
//!    value (case-sensitive).
//! 4. Officers additionally see bill-typed records (bills, transactions)
//!    only for bill types their department issues.
//!
//! Records without a location (notifications) pass step 3.

use crate::account::{Account, Department, Role};
use crate::billing::{Bill, BillType, Transaction};
use crate::business::LocalBusiness;
use crate::location::{LocationStamp, field_matches, pincode_matches};
use crate::notice::{AppNotification, VillageNotice};
use crate::request::ServiceRequest;

/// The viewer.
#[derive(Clone, Debug, PartialEq)]
pub struct Actor {
    pub id: String,
    pub role: Role,
    pub department: Option<Department>,
    pub location: LocationStamp,
}

impl From<&Account> for Actor {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id.clone(),
            role: account.role,
            department: account.department,
            location: account.location.clone(),
        }
    }
}

/// Which location fields take part in matching.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScopeFields {
    pub state: bool,
    pub district: bool,
    pub sub_district: bool,
    pub village: bool,
    pub pincode: bool,
}

impl ScopeFields {
    pub const ALL: ScopeFields = ScopeFields {
        state: true,
        district: true,
        sub_district: true,
        village: true,
        pincode: true,
    };
}

impl Default for ScopeFields {
    fn default() -> Self {
        Self::ALL
    }
}

/// Record-side hooks for the filter.
pub trait Scoped {
    /// Location stamp, if the record is location-scoped.
    fn location(&self) -> Option<&LocationStamp>;

    /// Owning account for self-service records.
    fn owner_id(&self) -> Option<&str> {
        None
    }

    /// Bill type for department filtering.
    fn bill_type(&self) -> Option<BillType> {
        None
    }
}

/// AND over the enabled fields.
pub fn location_matches(viewer: &LocationStamp, record: &LocationStamp, fields: ScopeFields) -> bool {
    (!fields.state || field_matches(&viewer.state, &record.state))
        && (!fields.district || field_matches(&viewer.district, &record.district))
        && (!fields.sub_district || field_matches(&viewer.sub_district, &record.sub_district))
        && (!fields.village || field_matches(&viewer.village, &record.village))
        && (!fields.pincode || pincode_matches(&viewer.pincode, &record.pincode))
}

pub fn is_visible<T: Scoped>(record: &T, actor: &Actor, fields: ScopeFields) -> bool {
    if actor.role == Role::Developer {
        return true;
    }

    if actor.role == Role::Resident {
        if let Some(owner) = record.owner_id() {
            return owner == actor.id;
        }
    }

    if let Some(location) = record.location() {
        if !location_matches(&actor.location, location, fields) {
            return false;
        }
    }

    if actor.role == Role::Officer {
        if let Some(bill_type) = record.bill_type() {
            return actor.department.is_some_and(|d| d.issues(bill_type));
        }
    }

    true
}

/// Records visible to `actor`, matching on every location field.
pub fn visible<'a, T: Scoped>(records: &'a [T], actor: &Actor) -> Vec<&'a T> {
    visible_with(records, actor, ScopeFields::ALL)
}

pub fn visible_with<'a, T: Scoped>(records: &'a [T], actor: &Actor, fields: ScopeFields) -> Vec<&'a T> {
    records
        .iter()
        .filter(|r| is_visible(*r, actor, fields))
        .collect()
}

// ============================================================================
// Record impls
// ============================================================================

impl Scoped for Account {
    fn location(&self) -> Option<&LocationStamp> {
        Some(&self.location)
    }
}

impl Scoped for ServiceRequest {
    fn location(&self) -> Option<&LocationStamp> {
        Some(&self.location)
    }

    fn owner_id(&self) -> Option<&str> {
        Some(&self.requester_id)
    }
}

impl Scoped for Bill {
    fn location(&self) -> Option<&LocationStamp> {
        Some(&self.location)
    }

    fn owner_id(&self) -> Option<&str> {
        Some(&self.account_id)
    }

    fn bill_type(&self) -> Option<BillType> {
        Some(self.bill_type)
    }
}

impl Scoped for Transaction {
    fn location(&self) -> Option<&LocationStamp> {
        Some(&self.location)
    }

    fn owner_id(&self) -> Option<&str> {
        Some(&self.payer_id)
    }

    fn bill_type(&self) -> Option<BillType> {
        Some(self.bill_type)
    }
}

impl Scoped for VillageNotice {
    fn location(&self) -> Option<&LocationStamp> {
        Some(&self.location)
    }
}

impl Scoped for LocalBusiness {
    fn location(&self) -> Option<&LocationStamp> {
        Some(&self.location)
    }
}

impl Scoped for AppNotification {
    fn location(&self) -> Option<&LocationStamp> {
        None
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::{PINCODE_WILDCARD, WILDCARD};
    use crate::notice::NoticeCategory;
    use crate::request::{RequestSource, ServiceCategory};
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::{Rng, SeedableRng};

    fn wagholi() -> LocationStamp {
        LocationStamp::new("Maharashtra", "Pune", "Haveli", "Wagholi", "412207")
    }

    fn actor(role: Role, location: LocationStamp) -> Actor {
        Actor { id: "ME".into(), role, department: None, location }
    }

    fn notice_at(location: LocationStamp) -> VillageNotice {
        VillageNotice::new(location, "t", "b", NoticeCategory::General)
    }

    #[test]
    fn test_exact_match_and_mismatch() {
        let a = actor(Role::Resident, wagholi());
        let mut elsewhere = wagholi();
        elsewhere.village = "Lonikand".into();

        let notices = vec![notice_at(wagholi()), notice_at(elsewhere)];
        let seen = visible(&notices, &a);
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].location.village, "Wagholi");
    }

    #[test]
    fn test_case_sensitive() {
        let mut lower = wagholi();
        lower.village = "wagholi".into();
        let a = actor(Role::Resident, lower);
        assert!(visible(&[notice_at(wagholi())], &a).is_empty());
    }

    #[test]
    fn test_disabled_fields_are_ignored() {
        let mut other_pin = wagholi();
        other_pin.pincode = "412208".into();
        let a = actor(Role::Officer, wagholi());
        let fields = ScopeFields { pincode: false, ..ScopeFields::ALL };
        assert_eq!(visible_with(&[notice_at(other_pin.clone())], &a, fields).len(), 1);
        assert!(visible(&[notice_at(other_pin)], &a).is_empty());
    }

    #[test]
    fn test_resident_ownership_trumps_location() {
        let mut far = wagholi();
        far.state = "Goa".into();
        let mine = ServiceRequest::new("ME", "Me", far, ServiceCategory::Water, "t", "d", RequestSource::User);
        let theirs = ServiceRequest::new(
            "OTHER",
            "Other",
            wagholi(),
            ServiceCategory::Water,
            "t",
            "d",
            RequestSource::User,
        );
        let a = actor(Role::Resident, wagholi());
        let requests = vec![mine, theirs];
        let seen = visible(&requests, &a);
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].requester_id, "ME");
    }

    #[test]
    fn test_officer_department_filter() {
        let gas = Bill::issue(Department::Gas, "R1", wagholi(), BillType::GasBill, 10.0, "d").unwrap();
        let power = Bill::issue(
            Department::Electricity,
            "R1",
            wagholi(),
            BillType::ElectricityBill,
            10.0,
            "d",
        )
        .unwrap();
        let bills = vec![gas, power];

        let mut officer = actor(Role::Officer, wagholi());
        officer.department = Some(Department::Gas);
        let seen = visible(&bills, &officer);
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].bill_type, BillType::GasBill);

        officer.department = None;
        assert!(visible(&bills, &officer).is_empty());
    }

    #[test]
    fn test_developer_sees_all() {
        let mut far = wagholi();
        far.state = "Goa".into();
        let a = actor(Role::Developer, wagholi());
        assert_eq!(visible(&[notice_at(far)], &a).len(), 1);
    }

    #[test]
    fn test_notifications_unscoped() {
        let n = AppNotification::new(Default::default(), "t", "m");
        let a = actor(Role::Resident, wagholi());
        assert_eq!(visible(&[n], &a).len(), 1);
    }

    // ========================================================================
    // Randomized property: AND over wildcard-aware field matches
    // ========================================================================

    fn pick(rng: &mut StdRng, opts: &[&str], wildcard: Option<&str>) -> String {
        if let Some(w) = wildcard {
            if rng.gen_bool(0.25) {
                return w.to_string();
            }
        }
        opts.choose(rng).unwrap().to_string()
    }

    fn random_stamp(rng: &mut StdRng, viewer: bool) -> LocationStamp {
        let wild = |w: &'static str| if viewer { Some(w) } else { None };
        let pin_wild = if rng.gen_bool(0.5) { PINCODE_WILDCARD } else { WILDCARD };

        LocationStamp {
            state: pick(rng, &["Maharashtra", "Goa"], wild(WILDCARD)),
            district: pick(rng, &["Pune", "Satara"], wild(WILDCARD)),
            sub_district: pick(rng, &["Haveli", "Mulshi"], wild(WILDCARD)),
            village: pick(rng, &["Wagholi", "Lonikand"], wild(WILDCARD)),
            pincode: pick(rng, &["412207", "412216"], wild(pin_wild)),
        }
    }

    fn expected(viewer: &LocationStamp, record: &LocationStamp) -> bool {
        let ok = |v: &str, r: &str| v == "All" || v == r;
        ok(&viewer.state, &record.state)
            && ok(&viewer.district, &record.district)
            && ok(&viewer.sub_district, &record.sub_district)
            && ok(&viewer.village, &record.village)
            && (viewer.pincode == "000000" || ok(&viewer.pincode, &record.pincode))
    }

    #[test]
    fn test_random_stamps_follow_and_rule() {
        let mut rng = StdRng::seed_from_u64(0x6752_414d);
        let mut seen_included = 0;
        let mut seen_excluded = 0;

        for _ in 0..2_000 {
            let viewer = random_stamp(&mut rng, true);
            let record = random_stamp(&mut rng, false);
            let a = actor(Role::Officer, viewer.clone());
            let got = is_visible(&notice_at(record.clone()), &a, ScopeFields::ALL);
            assert_eq!(got, expected(&viewer, &record), "viewer={viewer:?} record={record:?}");
            if got {
                seen_included += 1;
            } else {
                seen_excluded += 1;
            }
        }

        assert!(seen_included > 0 && seen_excluded > 0);
    }
}
