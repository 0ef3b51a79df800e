use serde::{Deserialize, Serialize};

use crate::ids::Outpoint;

/// Application-level state reconstructed from an output by an external
/// interpreter.
///
/// Keyed by `location`; re-deriving the same location overwrites the record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedObjectRecord {
    pub location: Outpoint,
    pub kind: String,
    pub type_name: String,
    pub origin: String,
    pub owner: String,
    pub is_origin: bool,
    pub observed_at_seq: u64,
}

/// Selects derived objects by a single field.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "by", content = "value")]
pub enum DerivedObjectFilter {
    Location(Outpoint),
    Kind(String),
    Origin(String),
    Owner(String),
}

impl DerivedObjectFilter {
    /// Returns `true` if the record matches this filter.
    pub fn matches(&self, record: &DerivedObjectRecord) -> bool {
        match self {
            Self::Location(location) => record.location == *location,
            Self::Kind(kind) => record.kind == *kind,
            Self::Origin(origin) => record.origin == *origin,
            Self::Owner(owner) => record.owner == *owner,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::TransactionId;

    fn record() -> DerivedObjectRecord {
        DerivedObjectRecord {
            location: Outpoint::new(TransactionId::from_raw(b"t"), 1),
            kind: "Sword".into(),
            type_name: "Item".into(),
            origin: "origin-1".into(),
            owner: "A1".into(),
            is_origin: true,
            observed_at_seq: 4,
        }
    }

    #[test]
    fn filter_matches_single_field() {
        let r = record();
        assert!(DerivedObjectFilter::Location(r.location).matches(&r));
        assert!(DerivedObjectFilter::Kind("Sword".into()).matches(&r));
        assert!(DerivedObjectFilter::Origin("origin-1".into()).matches(&r));
        assert!(DerivedObjectFilter::Owner("A1".into()).matches(&r));

        assert!(!DerivedObjectFilter::Kind("Shield".into()).matches(&r));
        assert!(!DerivedObjectFilter::Owner("A2".into()).matches(&r));
    }

    #[test]
    fn filter_serde_shape() {
        let json = serde_json::to_string(&DerivedObjectFilter::Kind("Sword".into())).unwrap();
        assert_eq!(json, r#"{"by":"kind","value":"Sword"}"#);
    }
}
