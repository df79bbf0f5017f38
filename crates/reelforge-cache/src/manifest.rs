//! The single JSON manifest document backing the segment cache.
//!
//! `{entries: {hash -> CacheEntry}, lastCleanup}`, rewritten after every
//! mutating operation via write-temp-then-rename so a crash mid-write never
//! leaves a half-written manifest behind -- the self-heal in `Manifest::load`
//! treats a missing *or corrupt* file as an empty manifest rather than
//! surfacing an error, since the cache is an optimization: losing it just
//! means the next lookup is a miss, never a hard failure.

use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use reelforge_models::CacheEntry;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::warn;

use crate::error::CacheResult;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Manifest {
    pub entries: HashMap<String, CacheEntry>,
    pub last_cleanup: Option<DateTime<Utc>>,
}

impl Manifest {
    /// Load the manifest from disk. A missing or corrupt file self-heals
    /// to an empty manifest rather than erroring.
    pub async fn load(path: &Path) -> Self {
        match fs::read(path).await {
            Ok(bytes) => match serde_json::from_slice::<Manifest>(&bytes) {
                Ok(manifest) => manifest,
                Err(e) => {
                    warn!(error = %e, path = %path.display(), "cache manifest corrupt, starting empty");
                    Manifest::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Manifest::default(),
            Err(e) => {
                warn!(error = %e, path = %path.display(), "cache manifest unreadable, starting empty");
                Manifest::default()
            }
        }
    }

    /// Write the manifest atomically: serialize to a sibling `.tmp` file,
    /// then rename over the target.
    pub async fn save(&self, path: &Path) -> CacheResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let tmp = path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(self)?;
        fs::write(&tmp, bytes).await?;
        fs::rename(&tmp, path).await?;
        Ok(())
    }
}
