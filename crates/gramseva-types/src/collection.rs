//! The catalog of synchronized collections.
//!
//! A collection is the unit of consistency: the server stores it as one
//! file, clients push it as one replacement array, and broadcasts carry it
//! whole under the event name `data-update-<name>`.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

/// Name of the officer-key pool. Readable like a collection but never
/// pushed or broadcast.
pub const OFFICER_KEYS: &str = "officer-keys";

/// Prefix of realtime event names.
pub const EVENT_PREFIX: &str = "data-update-";

/// A named, server-persisted array of records.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
    IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Collection {
    Accounts,
    Requests,
    Bills,
    Transactions,
    Notices,
    Notifications,
    Businesses,
}

impl Collection {
    /// Every collection, in load order.
    pub fn all() -> impl Iterator<Item = Collection> {
        Collection::iter()
    }

    /// Path segment and file stem, e.g. `"bills"`.
    pub fn name(self) -> &'static str {
        self.into()
    }

    /// Realtime event name, e.g. `"data-update-bills"`.
    pub fn event_name(self) -> String {
        format!("{EVENT_PREFIX}{}", self.name())
    }

    /// Inverse of [`Collection::event_name`].
    pub fn from_event_name(event: &str) -> Option<Collection> {
        event.strip_prefix(EVENT_PREFIX)?.parse().ok()
    }

    /// File name inside the server data directory.
    pub fn file_name(self) -> String {
        format!("{}.json", self.name())
    }
}

/// A record type stored in exactly one collection.
pub trait Record: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// The collection holding records of this type.
    const COLLECTION: Collection;

    /// Stable record id.
    fn id(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names() {
        assert_eq!(Collection::Businesses.name(), "businesses");
        assert_eq!(Collection::Accounts.to_string(), "accounts");
        assert_eq!("notices".parse::<Collection>().unwrap(), Collection::Notices);
        assert!("officer-keys".parse::<Collection>().is_err());
    }

    #[test]
    fn test_event_name_roundtrip() {
        for c in Collection::all() {
            assert_eq!(Collection::from_event_name(&c.event_name()), Some(c));
        }
        assert_eq!(Collection::event_name(Collection::Bills), "data-update-bills");
        assert_eq!(Collection::from_event_name("bills"), None);
        assert_eq!(Collection::from_event_name("data-update-widgets"), None);
    }

    #[test]
    fn test_all_has_seven() {
        assert_eq!(Collection::all().count(), 7);
    }
}
