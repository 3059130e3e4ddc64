//! Location stamps and wildcard matching.

use serde::{Deserialize, Serialize};

/// Matches any value of a location field when set on the viewer's side.
pub const WILDCARD: &str = "All";

/// Pincode-only wildcard.
pub const PINCODE_WILDCARD: &str = "000000";

/// Denormalized (state, district, taluka, village, pincode) tuple.
///
/// Flattened into every scoped record on the wire. `taluka` is accepted as
/// an input alias for `subDistrict`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationStamp {
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub district: String,
    #[serde(default, alias = "taluka")]
    pub sub_district: String,
    #[serde(default)]
    pub village: String,
    #[serde(default)]
    pub pincode: String,
}

impl LocationStamp {
    pub fn new(
        state: impl Into<String>,
        district: impl Into<String>,
        sub_district: impl Into<String>,
        village: impl Into<String>,
        pincode: impl Into<String>,
    ) -> Self {
        Self {
            state: state.into(),
            district: district.into(),
            sub_district: sub_district.into(),
            village: village.into(),
            pincode: pincode.into(),
        }
    }

    /// A stamp that sees everything (every field wildcarded).
    pub fn everywhere() -> Self {
        Self::new(WILDCARD, WILDCARD, WILDCARD, WILDCARD, PINCODE_WILDCARD)
    }
}

/// Match one viewer field against one record field.
pub(crate) fn field_matches(viewer: &str, record: &str) -> bool {
    viewer == WILDCARD || viewer == record
}

/// Pincode matching additionally honours [`PINCODE_WILDCARD`].
pub(crate) fn pincode_matches(viewer: &str, record: &str) -> bool {
    viewer == PINCODE_WILDCARD || field_matches(viewer, record)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_taluka_alias() {
        let json = r#"{"state":"MH","district":"Pune","taluka":"Haveli","village":"Wagholi","pincode":"412207"}"#;
        let stamp: LocationStamp = serde_json::from_str(json).unwrap();
        assert_eq!(stamp.sub_district, "Haveli");
        let out = serde_json::to_string(&stamp).unwrap();
        assert!(out.contains(r#""subDistrict":"Haveli""#));
    }

    #[test]
    fn test_field_matching_is_case_sensitive() {
        assert!(field_matches("Pune", "Pune"));
        assert!(!field_matches("pune", "Pune"));
        assert!(field_matches(WILDCARD, "anything"));
    }

    #[test]
    fn test_pincode_wildcards() {
        assert!(pincode_matches(PINCODE_WILDCARD, "412207"));
        assert!(pincode_matches(WILDCARD, "412207"));
        assert!(!pincode_matches("412208", "412207"));
    }
}
