//! Exact-id and by-name volume lookups with duplicate detection.
//!
//! Both lookups issue exactly one `DescribeVolumes` call. Zero matches is not
//! an error; more than one is, so no caller ever acts on an arbitrary pick
//! from a non-unique namespace.

use std::fmt;

use thiserror::Error;
use tracing::debug;

use crate::backend::{StoreError, VolumeQuery, VolumeStore};
use crate::volume::{Volume, VolumeStatus};

/// Which key a lookup searched by.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LookupKey {
    /// Volume identifier.
    Id,
    /// Volume name.
    Name,
}

impl fmt::Display for LookupKey {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(match self {
            Self::Id => "volume id",
            Self::Name => "volume name",
        })
    }
}

/// Errors raised by volume lookups.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum LookupError {
    /// The describe call failed.
    #[error("describe {key} failed in zone {zone}: {source}")]
    Store {
        /// Id or name searched for.
        key: String,
        /// Zone searched.
        zone: String,
        /// Underlying failure.
        #[source]
        source: StoreError,
    },
    /// More than one volume matched.
    #[error("found {count} duplicate volumes for {kind} {key} in zone {zone}")]
    Duplicate {
        /// Kind of key searched.
        kind: LookupKey,
        /// Id or name searched for.
        key: String,
        /// Zone searched.
        zone: String,
        /// Number of matches reported.
        count: usize,
    },
}

/// Lookup front-end over a [`VolumeStore`].
#[derive(Debug)]
pub struct VolumeLookup<'a, S: ?Sized> {
    store: &'a S,
}

impl<'a, S> VolumeLookup<'a, S>
where
    S: VolumeStore + ?Sized,
{
    /// Wraps `store`.
    #[must_use]
    pub const fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Finds a volume by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError`] when the describe call fails or reports more
    /// than one match.
    pub async fn find_by_id(&self, volume_id: &str) -> Result<Option<Volume>, LookupError> {
        let query = VolumeQuery::ById(volume_id.to_owned());
        self.find_one(&query, LookupKey::Id, volume_id).await
    }

    /// Finds a live volume by exact name.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError`] when the describe call fails or reports more
    /// than one match.
    pub async fn find_by_name(&self, name: &str) -> Result<Option<Volume>, LookupError> {
        let query = VolumeQuery::ByName {
            name: name.to_owned(),
            statuses: VolumeStatus::LIVE.to_vec(),
        };
        self.find_one(&query, LookupKey::Name, name).await
    }

    async fn find_one(
        &self,
        query: &VolumeQuery,
        kind: LookupKey,
        key: &str,
    ) -> Result<Option<Volume>, LookupError> {
        let zone = self.store.zone();
        let set = self
            .store
            .describe_volumes(query)
            .await
            .map_err(|source| LookupError::Store {
                key: key.to_owned(),
                zone: zone.to_owned(),
                source,
            })?;

        let count = set.total_count.max(set.volumes.len());
        debug!(%kind, key, count, "describe volumes");
        if count > 1 {
            return Err(LookupError::Duplicate {
                kind,
                key: key.to_owned(),
                zone: zone.to_owned(),
                count,
            });
        }
        Ok(set.volumes.into_iter().next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::StoreAction;
    use crate::test_support::{FakeStore, volume};

    #[tokio::test]
    async fn missing_volume_is_absent_not_an_error() {
        let store = FakeStore::new();
        let found = VolumeLookup::new(&store).find_by_id("vol-missing").await;
        assert_eq!(found, Ok(None));
        assert_eq!(store.calls(StoreAction::DescribeVolumes), 1);
    }

    #[tokio::test]
    async fn single_match_is_returned() {
        let store = FakeStore::new();
        store.insert_volume(volume("vol-1", "pvc-1", 20));
        let found = VolumeLookup::new(&store)
            .find_by_name("pvc-1")
            .await
            .unwrap_or_else(|err| panic!("lookup should succeed: {err}"));
        assert_eq!(found.map(|v| v.id), Some(String::from("vol-1")));
    }

    #[tokio::test]
    async fn duplicate_names_are_an_internal_error() {
        let store = FakeStore::new();
        store.insert_volume(volume("vol-1", "pvc-1", 20));
        store.insert_volume(volume("vol-2", "pvc-1", 20));
        let err = VolumeLookup::new(&store)
            .find_by_name("pvc-1")
            .await
            .expect_err("two volumes share the name");
        assert_eq!(
            err,
            LookupError::Duplicate {
                kind: LookupKey::Name,
                key: String::from("pvc-1"),
                zone: String::from(crate::test_support::FAKE_ZONE),
                count: 2,
            }
        );
    }

    #[tokio::test]
    async fn name_lookup_skips_deleted_volumes() {
        let store = FakeStore::new();
        let mut gone = volume("vol-1", "pvc-1", 20);
        gone.status = VolumeStatus::Ceased;
        store.insert_volume(gone);
        let found = VolumeLookup::new(&store).find_by_name("pvc-1").await;
        assert_eq!(found, Ok(None));
    }

    #[tokio::test]
    async fn describe_failures_carry_key_and_zone() {
        let store = FakeStore::new();
        store.push_failure(
            StoreAction::DescribeVolumes,
            StoreError::business(StoreAction::DescribeVolumes, 1400, "bad request"),
        );
        let err = VolumeLookup::new(&store)
            .find_by_id("vol-1")
            .await
            .expect_err("describe fails");
        assert!(matches!(err, LookupError::Store { ref key, .. } if key == "vol-1"));
    }
}
