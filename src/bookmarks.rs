//! Bookmark sets on top of a [`KvStore`].
//!
//! A set is spread over three keys: `{id}` holds the encrypted payload,
//! `{id}_version` the client format version and `{id}_lastUpdated` the
//! timestamp that doubles as the optimistic-lock token. Writes that touch more
//! than one of these keys go through the store's atomic operations.

use std::sync::Arc;

use chrono::{DateTime, Duration, SecondsFormat, Utc};

use crate::error::{Result, SyncError};
use crate::model::{BookmarkSet, CreatedSet};
use crate::store::KvStore;

fn version_key(id: &str) -> String {
    format!("{id}_version")
}

fn last_updated_key(id: &str) -> String {
    format!("{id}_lastUpdated")
}

/// 128 random bits, lowercase hex.
pub fn new_sync_id() -> String {
    hex::encode(rand::random::<[u8; 16]>())
}

fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn now_timestamp() -> String {
    format_timestamp(Utc::now())
}

/// Returns a timestamp strictly later than `previous`.
///
/// Falls back to `previous + 1ms` when the clock has not moved past it, so
/// two updates inside the same millisecond still produce distinct tokens.
pub fn next_timestamp(previous: &str) -> String {
    let now = Utc::now();
    match DateTime::parse_from_rfc3339(previous) {
        Ok(prev) => {
            let prev = prev.with_timezone(&Utc);
            if now > prev {
                format_timestamp(now)
            } else {
                format_timestamp(prev + Duration::milliseconds(1))
            }
        }
        Err(_) => format_timestamp(now),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

#[derive(Clone)]
pub struct Bookmarks {
    store: Arc<dyn KvStore>,
}

impl Bookmarks {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    pub async fn create(&self, version: &str) -> Result<CreatedSet> {
        let id = new_sync_id();
        let last_updated = now_timestamp();
        let version_key = version_key(&id);
        let last_updated_key = last_updated_key(&id);

        self.store
            .put_all(&[
                (version_key.as_str(), version),
                (last_updated_key.as_str(), last_updated.as_str()),
            ])
            .await?;

        tracing::info!(id = %id, version = %version, "created bookmark set");
        Ok(CreatedSet {
            id,
            last_updated,
            version: version.to_string(),
        })
    }

    /// Replaces the payload of `id` if `expected_last_updated` is still current.
    pub async fn update(&self, id: &str, bookmarks: &str, expected_last_updated: &str) -> Result<String> {
        let guard_key = last_updated_key(id);
        let new_last_updated = next_timestamp(expected_last_updated);

        let written = self
            .store
            .put_if(
                &guard_key,
                expected_last_updated,
                &[(id, bookmarks), (guard_key.as_str(), new_last_updated.as_str())],
            )
            .await?;

        if written {
            tracing::info!(id = %id, last_updated = %new_last_updated, "updated bookmark set");
            return Ok(new_last_updated);
        }

        // The write was already refused atomically; this read only picks the error.
        self.last_updated(id).await?;
        tracing::warn!(id = %id, "sync conflict detected");
        Err(SyncError::Conflict)
    }

    pub async fn last_updated(&self, id: &str) -> Result<String> {
        non_empty(self.store.get(&last_updated_key(id)).await?).ok_or(SyncError::NotFound)
    }

    pub async fn version(&self, id: &str) -> Result<String> {
        // Every created set has a lastUpdated; use it as the existence check.
        self.last_updated(id).await?;
        Ok(self.store.get(&version_key(id)).await?.unwrap_or_default())
    }

    pub async fn get(&self, id: &str) -> Result<BookmarkSet> {
        let last_updated = self.last_updated(id).await?;
        let version = self.store.get(&version_key(id)).await?.unwrap_or_default();
        let bookmarks = non_empty(self.store.get(id).await?);

        Ok(BookmarkSet {
            version,
            last_updated,
            bookmarks,
        })
    }
}
