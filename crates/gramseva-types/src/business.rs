//! Local business directory listings.

use serde::{Deserialize, Serialize};

use crate::collection::{Collection, Record};
use crate::ids::IdKind;
use crate::location::LocationStamp;

/// Self-registered listings start `Pending`; officer-added ones start `Approved`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BusinessStatus {
    #[default]
    Pending,
    Approved,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalBusiness {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub contact: String,
    #[serde(default)]
    pub hours: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub owner_name: String,
    #[serde(flatten)]
    pub location: LocationStamp,
    #[serde(default)]
    pub status: BusinessStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proof_document: Option<String>,
}

impl LocalBusiness {
    pub fn new(
        name: impl Into<String>,
        category: impl Into<String>,
        owner_name: impl Into<String>,
        location: LocationStamp,
        status: BusinessStatus,
    ) -> Self {
        Self {
            id: IdKind::Business.fresh(),
            name: name.into(),
            category: category.into(),
            contact: String::new(),
            hours: String::new(),
            description: String::new(),
            owner_name: owner_name.into(),
            location,
            status,
            proof_document: None,
        }
    }

    pub fn with_details(
        mut self,
        contact: impl Into<String>,
        hours: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        self.contact = contact.into();
        self.hours = hours.into();
        self.description = description.into();
        self
    }
}

impl Record for LocalBusiness {
    const COLLECTION: Collection = Collection::Businesses;

    fn id(&self) -> &str {
        &self.id
    }
}
