//! Shared record and policy types for GramSeva.
//!
//! This crate is the leaf of the workspace: the seven synchronized
//! collections, their record types, the wire types spoken over `/api`, and
//! the pure policy functions (department bill types, request status machine,
//! location scoping). It has **no internal gramseva dependencies**.
//!
//! # Collections
//!
//! ```text
//! Account ──┬── raises ServiceRequest (requesterId)
//!           ├── owes Bill (accountId) ── settles into ── Transaction (billId)
//!           ├── owns LocalBusiness (ownerName)
//!           └── assignedOfficerId ──▶ Account (officer)
//!
//! VillageNotice, AppNotification: free-standing
//! ```
//!
//! Every collection is replaced as a whole on every write; records carry a
//! denormalized [`LocationStamp`] used only for filtering.
//!
//! |--------------------|-----------------------------------------------|
//! | Type               | Purpose                                       |
//! |--------------------|-----------------------------------------------|
//! | [`Collection`]     | Catalog of synchronized collection names      |
//! | [`Record`]         | Ties a record type to its collection          |
//! | [`Account`]        | Identity (resident, officer, developer)       |
//! | [`ServiceRequest`] | Citizen or officer ticket with status machine |
//! | [`Bill`]           | Amount owed, department-scoped bill type      |
//! | [`Transaction`]    | Immutable settlement record                   |
//! | [`Actor`]          | Who is looking, for [`visible`]               |
//! |--------------------|-----------------------------------------------|

pub mod account;
pub mod api;
pub mod billing;
pub mod business;
pub mod collection;
pub mod ids;
pub mod location;
pub mod notice;
pub mod request;
pub mod visibility;

pub use account::{Account, AccountStatus, Department, Role, officer_key_matches};
pub use api::ChannelMessage;
pub use billing::{
    Bill, BillStatus, BillType, Payment, PaymentMethod, PolicyError, Transaction, TransactionStatus,
};
pub use business::{BusinessStatus, LocalBusiness};
pub use collection::{Collection, OFFICER_KEYS, Record};
pub use ids::IdKind;
pub use location::{LocationStamp, PINCODE_WILDCARD, WILDCARD};
pub use notice::{AppNotification, NoticeCategory, NotificationKind, VillageNotice};
pub use request::{RequestSource, RequestStatus, ServiceCategory, ServiceRequest, TransitionError};
pub use visibility::{Actor, ScopeFields, Scoped, is_visible, visible, visible_with};

/// Current local time as a display string, e.g. `18/10/2026, 14:05:09`.
///
/// Timestamps on records are for display only and never compared.
pub fn display_now() -> String {
    chrono::Local::now().format("%d/%m/%Y, %H:%M:%S").to_string()
}

/// Today's date as `YYYY-MM-DD`, used for issued/published dates.
pub fn display_today() -> String {
    chrono::Local::now().format("%Y-%m-%d").to_string()
}
