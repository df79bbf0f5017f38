//! The exclusive processing lock, backed by a single Firestore document.
//!
//! Acquisition is a plain atomic create: `create_document` either succeeds
//! (we now hold the lock) or comes back `AlreadyExists` (someone else does).
//! There is no read-then-write window. Extending a held lock and releasing
//! it both go through `update_document_with_precondition`, so a worker that
//! thinks it still owns the lock but has in fact been timed out and
//! preempted gets a `PreconditionFailed` instead of silently clobbering the
//! new owner's document.

use std::collections::HashMap;

use chrono::Utc;
use reelforge_models::{ProcessingLock, VideoId, DEFAULT_LOCK_TTL_SECS};
use tracing::{info, warn};

use crate::client::FirestoreClient;
use crate::error::{FirestoreError, FirestoreResult};
use crate::types::{Document, FromFirestoreValue, ToFirestoreValue};

const COLLECTION: &str = "locks";

/// Repository for the single exclusive processing lock document.
pub struct ProcessingLockRepository {
    client: FirestoreClient,
}

impl ProcessingLockRepository {
    pub fn new(client: FirestoreClient) -> Self {
        Self { client }
    }

    /// Attempt to acquire the lock for `video_id` under `owner`. Returns
    /// `Ok(Some(lock))` if acquired, `Ok(None)` if already held by someone
    /// else and not yet expired.
    pub async fn try_acquire(
        &self,
        key: &str,
        video_id: &VideoId,
        owner: &str,
        ttl_secs: Option<i64>,
    ) -> FirestoreResult<Option<ProcessingLock>> {
        let ttl = ttl_secs.unwrap_or(DEFAULT_LOCK_TTL_SECS);
        let lock = ProcessingLock::new(key, video_id.clone(), owner, ttl);
        let fields = lock_to_fields(&lock);

        match self.client.create_document(COLLECTION, key, fields).await {
            Ok(_) => {
                info!(key, owner, video_id = %video_id, "acquired processing lock");
                Ok(Some(lock))
            }
            Err(FirestoreError::AlreadyExists(_)) => {
                match self.reclaim_if_expired(key, video_id, owner, ttl).await? {
                    Some(lock) => Ok(Some(lock)),
                    None => Ok(None),
                }
            }
            Err(e) => Err(e),
        }
    }

    /// A lazy-expire path: if the document that blocked `try_acquire` has
    /// actually expired, overwrite it with a precondition on its current
    /// `updateTime` so a racing reclaimer cannot double-win.
    async fn reclaim_if_expired(
        &self,
        key: &str,
        video_id: &VideoId,
        owner: &str,
        ttl_secs: i64,
    ) -> FirestoreResult<Option<ProcessingLock>> {
        let Some(doc) = self.client.get_document(COLLECTION, key).await? else {
            // Vanished between the failed create and this read; try create again.
            let lock = ProcessingLock::new(key, video_id.clone(), owner, ttl_secs);
            return match self
                .client
                .create_document(COLLECTION, key, lock_to_fields(&lock))
                .await
            {
                Ok(_) => Ok(Some(lock)),
                Err(_) => Ok(None),
            };
        };

        let existing = document_to_lock(&doc)?;
        if !existing.is_expired() {
            return Ok(None);
        }

        warn!(key, previous_owner = %existing.owner, "reclaiming expired processing lock");
        let lock = ProcessingLock::new(key, video_id.clone(), owner, ttl_secs);
        let fields = lock_to_fields(&lock);
        match self
            .client
            .update_document_with_precondition(
                COLLECTION,
                key,
                fields,
                None,
                doc.update_time.as_deref(),
            )
            .await
        {
            Ok(_) => Ok(Some(lock)),
            Err(FirestoreError::PreconditionFailed(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Extend the TTL of a lock this worker currently believes it holds.
    /// Fails with `PreconditionFailed` if it has since been reclaimed.
    pub async fn extend(&self, key: &str, owner: &str, ttl_secs: i64) -> FirestoreResult<()> {
        let Some(doc) = self.client.get_document(COLLECTION, key).await? else {
            return Err(FirestoreError::not_found(key));
        };
        let existing = document_to_lock(&doc)?;
        if existing.owner != owner {
            return Err(FirestoreError::PreconditionFailed(format!(
                "lock {key} is held by {}, not {owner}",
                existing.owner
            )));
        }

        let mut fields = HashMap::new();
        let new_expiry = Utc::now() + chrono::Duration::seconds(ttl_secs);
        fields.insert("expires_at".to_string(), new_expiry.to_firestore_value());

        self.client
            .update_document_with_precondition(
                COLLECTION,
                key,
                fields,
                Some(vec!["expires_at".to_string()]),
                doc.update_time.as_deref(),
            )
            .await?;
        Ok(())
    }

    /// Release a lock this worker holds. A missing document or one already
    /// owned by someone else is not an error -- the goal state is "not held
    /// by us", which is already true.
    pub async fn release(&self, key: &str, owner: &str) -> FirestoreResult<()> {
        let Some(doc) = self.client.get_document(COLLECTION, key).await? else {
            return Ok(());
        };
        let existing = document_to_lock(&doc)?;
        if existing.owner != owner {
            return Ok(());
        }

        self.clear_document(key, &doc).await
    }

    /// Current lock status, for `GET /system/status`. Lazy-expires on read:
    /// a lock whose `expires_at` has passed is cleared before this returns,
    /// so a stale row never lingers just because nothing has tried to
    /// acquire it since.
    pub async fn status(&self, key: &str) -> FirestoreResult<Option<ProcessingLock>> {
        match self.client.get_document(COLLECTION, key).await? {
            Some(doc) => {
                let existing = document_to_lock(&doc)?;
                if existing.is_expired() {
                    self.clear_document(key, &doc).await?;
                    Ok(None)
                } else {
                    Ok(Some(existing))
                }
            }
            None => Ok(None),
        }
    }

    /// Bulk-clear every expired lock document in the collection. Called
    /// periodically (and at worker startup) so an abandoned lock doesn't
    /// wait for the next `try_acquire`/`status` call to be swept.
    pub async fn sweep(&self) -> FirestoreResult<u32> {
        let mut cleared = 0;
        let mut page_token: Option<String> = None;

        loop {
            let page = self
                .client
                .list_documents(COLLECTION, Some(100), page_token.as_deref())
                .await?;

            for doc in page.documents.unwrap_or_default() {
                let Ok(existing) = document_to_lock(&doc) else {
                    continue;
                };
                if !existing.is_expired() {
                    continue;
                }
                match self.clear_document(&existing.key, &doc).await {
                    Ok(()) => {
                        cleared += 1;
                        info!(key = %existing.key, previous_owner = %existing.owner, "swept expired processing lock");
                    }
                    Err(e) => warn!(key = %existing.key, error = %e, "failed to clear expired lock during sweep"),
                }
            }

            page_token = page.next_page_token;
            if page_token.is_none() {
                break;
            }
        }

        Ok(cleared)
    }

    /// Clear a lock document with a precondition on its last-known
    /// `update_time`, so a concurrent reclaimer that has since replaced it
    /// isn't clobbered. A precondition failure means someone else already
    /// acquired or cleared it, which is an equally fine outcome for a
    /// caller whose goal is "this row is no longer stale".
    async fn clear_document(&self, key: &str, doc: &Document) -> FirestoreResult<()> {
        match self
            .client
            .update_document_with_precondition(
                COLLECTION,
                key,
                HashMap::new(),
                None,
                doc.update_time.as_deref(),
            )
            .await
        {
            Err(FirestoreError::PreconditionFailed(_)) => return Ok(()),
            Err(e) => return Err(e),
            Ok(_) => {}
        }
        self.client.delete_document(COLLECTION, key).await
    }
}

fn lock_to_fields(lock: &ProcessingLock) -> HashMap<String, crate::types::Value> {
    let mut fields = HashMap::new();
    fields.insert("video_id".to_string(), lock.video_id.as_str().to_firestore_value());
    fields.insert("owner".to_string(), lock.owner.to_firestore_value());
    fields.insert("acquired_at".to_string(), lock.acquired_at.to_firestore_value());
    fields.insert("expires_at".to_string(), lock.expires_at.to_firestore_value());
    fields
}

fn document_to_lock(doc: &Document) -> FirestoreResult<ProcessingLock> {
    let fields = doc
        .fields
        .as_ref()
        .ok_or_else(|| FirestoreError::InvalidResponse("lock document has no fields".into()))?;

    let get_str = |name: &str| -> FirestoreResult<String> {
        fields
            .get(name)
            .and_then(String::from_firestore_value)
            .ok_or_else(|| FirestoreError::InvalidResponse(format!("lock document missing {name}")))
    };
    let get_time = |name: &str| -> FirestoreResult<chrono::DateTime<Utc>> {
        fields
            .get(name)
            .and_then(chrono::DateTime::<Utc>::from_firestore_value)
            .ok_or_else(|| FirestoreError::InvalidResponse(format!("lock document missing {name}")))
    };

    let key = doc
        .name
        .as_deref()
        .and_then(|n| n.rsplit('/').next())
        .unwrap_or_default()
        .to_string();

    Ok(ProcessingLock {
        key,
        video_id: VideoId::from_string(get_str("video_id")?),
        owner: get_str("owner")?,
        acquired_at: get_time("acquired_at")?,
        expires_at: get_time("expires_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_round_trips_through_fields() {
        let lock = ProcessingLock::new("k", VideoId::from_string("v1"), "worker-a", 900);
        let fields = lock_to_fields(&lock);
        let doc = Document {
            name: Some("projects/p/databases/(default)/documents/locks/k".to_string()),
            fields: Some(fields),
            create_time: None,
            update_time: Some("2026-01-01T00:00:00Z".to_string()),
        };
        let round_tripped = document_to_lock(&doc).unwrap();
        assert_eq!(round_tripped.owner, "worker-a");
        assert_eq!(round_tripped.video_id.as_str(), "v1");
        assert_eq!(round_tripped.key, "k");
    }
}
