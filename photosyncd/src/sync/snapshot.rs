use photosync_core::StorageObject;
use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;

/// Comparable view of one object's listing metadata, either taken live from
/// storage or reconstructed from a persisted record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub size: Option<i64>,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    pub metadata_hash: Option<String>,
}

impl Snapshot {
    /// Normalizes the three listing fields and fingerprints them. The hash is
    /// `None` only when all three are absent; the diff engine treats that as
    /// trivially matching.
    pub fn compute(size: Option<i64>, etag: Option<&str>, last_modified: Option<&str>) -> Self {
        let etag = etag.filter(|value| !value.is_empty());
        let last_modified = last_modified.filter(|value| !value.is_empty());
        let metadata_hash = if size.is_none() && etag.is_none() && last_modified.is_none() {
            None
        } else {
            // Newline cannot appear in an etag, a decimal size, or an
            // RFC 3339 stamp, so joined fields cannot collide.
            let joined = format!(
                "{}\n{}\n{}",
                etag.unwrap_or_default(),
                size.map(|value| value.to_string()).unwrap_or_default(),
                last_modified.unwrap_or_default(),
            );
            Some(format!("{:x}", md5::compute(joined.as_bytes())))
        };
        Self {
            size,
            etag: etag.map(str::to_string),
            last_modified: last_modified.map(str::to_string),
            metadata_hash,
        }
    }

    pub fn from_object(object: &StorageObject) -> Result<Self, time::error::Format> {
        let last_modified = match object.last_modified {
            Some(stamp) => Some(stamp.format(&Rfc3339)?),
            None => None,
        };
        Ok(Self::compute(
            object.size,
            object.etag.as_deref(),
            last_modified.as_deref(),
        ))
    }
}

/// `None` on either side means there is nothing to compare, so the pair
/// counts as matching.
pub fn hashes_match(a: Option<&str>, b: Option<&str>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a == b,
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::OffsetDateTime;

    #[test]
    fn identical_inputs_hash_identically() {
        let a = Snapshot::compute(Some(100), Some("abc"), Some("2024-01-01T00:00:00Z"));
        let b = Snapshot::compute(Some(100), Some("abc"), Some("2024-01-01T00:00:00Z"));
        assert!(a.metadata_hash.is_some());
        assert_eq!(a.metadata_hash, b.metadata_hash);
    }

    #[test]
    fn any_single_field_change_changes_the_hash() {
        let base = Snapshot::compute(Some(100), Some("abc"), Some("2024-01-01T00:00:00Z"));
        let bumped_stamp = Snapshot::compute(Some(100), Some("abc"), Some("2024-01-01T00:00:01Z"));
        let bumped_size = Snapshot::compute(Some(101), Some("abc"), Some("2024-01-01T00:00:00Z"));
        let bumped_etag = Snapshot::compute(Some(100), Some("abd"), Some("2024-01-01T00:00:00Z"));

        assert_ne!(base.metadata_hash, bumped_stamp.metadata_hash);
        assert_ne!(base.metadata_hash, bumped_size.metadata_hash);
        assert_ne!(base.metadata_hash, bumped_etag.metadata_hash);
    }

    #[test]
    fn shifting_content_across_the_separator_changes_the_hash() {
        let a = Snapshot::compute(None, Some("ab"), Some("c"));
        let b = Snapshot::compute(None, Some("a"), Some("bc"));
        assert_ne!(a.metadata_hash, b.metadata_hash);
    }

    #[test]
    fn hash_is_none_only_when_every_field_is_absent() {
        assert!(Snapshot::compute(None, None, None).metadata_hash.is_none());
        assert!(
            Snapshot::compute(None, Some(""), Some(""))
                .metadata_hash
                .is_none()
        );
        assert!(Snapshot::compute(Some(0), None, None).metadata_hash.is_some());
        assert!(
            Snapshot::compute(None, Some("x"), None)
                .metadata_hash
                .is_some()
        );
    }

    #[test]
    fn from_object_matches_compute_on_the_same_fields() {
        let object = StorageObject {
            key: "a.jpg".into(),
            size: Some(5),
            etag: Some("e".into()),
            last_modified: Some(OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap()),
        };

        let from_object = Snapshot::from_object(&object).unwrap();
        let computed = Snapshot::compute(Some(5), Some("e"), Some("2023-11-14T22:13:20Z"));

        assert_eq!(from_object, computed);
    }

    #[test]
    fn one_sided_hashes_match_trivially() {
        assert!(hashes_match(Some("a"), Some("a")));
        assert!(!hashes_match(Some("a"), Some("b")));
        assert!(hashes_match(None, Some("a")));
        assert!(hashes_match(None, None));
    }
}
