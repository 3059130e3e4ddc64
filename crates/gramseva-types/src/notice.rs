//! Village notices and in-app notifications.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use crate::collection::{Collection, Record};
use crate::ids::IdKind;
use crate::location::LocationStamp;

#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
pub enum NoticeCategory {
    #[default]
    General,
    Meeting,
    Health,
    Agriculture,
    Emergency,
    Event,
}

/// An announcement posted by an officer for a location.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VillageNotice {
    pub id: String,
    #[serde(flatten)]
    pub location: LocationStamp,
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub category: NoticeCategory,
    #[serde(default)]
    pub published_at: String,
}

impl VillageNotice {
    pub fn new(
        location: LocationStamp,
        title: impl Into<String>,
        body: impl Into<String>,
        category: NoticeCategory,
    ) -> Self {
        Self {
            id: IdKind::Notice.fresh(),
            location,
            title: title.into(),
            body: body.into(),
            category,
            published_at: crate::display_today(),
        }
    }
}

impl Record for VillageNotice {
    const COLLECTION: Collection = Collection::Notices;

    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    #[default]
    Info,
    Success,
    Alert,
}

/// Ephemeral in-app alert raised by a client in response to an action.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppNotification {
    pub id: String,
    pub title: String,
    pub message: String,
    #[serde(rename = "type", default)]
    pub kind: NotificationKind,
    #[serde(default)]
    pub time: String,
    #[serde(default)]
    pub read: bool,
}

impl AppNotification {
    pub fn new(kind: NotificationKind, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: IdKind::Notification.fresh(),
            title: title.into(),
            message: message.into(),
            kind,
            time: crate::display_now(),
            read: false,
        }
    }
}

impl Record for AppNotification {
    const COLLECTION: Collection = Collection::Notifications;

    fn id(&self) -> &str {
        &self.id
    }
}
