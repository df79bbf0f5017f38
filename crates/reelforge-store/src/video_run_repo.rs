//! Persistence for `VideoRun` documents.
//!
//! Scalar, frequently-filtered fields (`phase`, `user_id`, timestamps) are
//! written as individual Firestore fields so a future console query or
//! index can reach them directly. The nested `segments`, `files` and
//! `metadata` collections are serialized as a single JSON blob field --
//! same tradeoff the segment cache manifest makes, and for the same
//! reason: Firestore's typed value model makes representing a
//! `Vec<Segment>` field by field painful for no query benefit, since
//! nothing ever filters on segment contents directly.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use reelforge_models::{RunPhase, VideoId, VideoRun};
use tracing::info;

use crate::client::FirestoreClient;
use crate::error::{FirestoreError, FirestoreResult};
use crate::types::{Document, FromFirestoreValue, ToFirestoreValue, Value};

const COLLECTION: &str = "video_runs";

/// Nested fields of `VideoRun` that are stored as one JSON blob.
#[derive(serde::Serialize, serde::Deserialize)]
struct RunState {
    segments: Vec<reelforge_models::Segment>,
    #[serde(default)]
    narration_script: Option<String>,
    files: HashMap<reelforge_models::ArtifactKind, reelforge_models::ArtifactInfo>,
    metadata: reelforge_models::RunMetadata,
}

/// Repository for `VideoRun` documents, keyed by video ID.
pub struct VideoRunRepository {
    client: FirestoreClient,
}

impl VideoRunRepository {
    pub fn new(client: FirestoreClient) -> Self {
        Self { client }
    }

    pub async fn get(&self, video_id: &VideoId) -> FirestoreResult<Option<VideoRun>> {
        match self.client.get_document(COLLECTION, video_id.as_str()).await? {
            Some(doc) => Ok(Some(document_to_run(&doc)?)),
            None => Ok(None),
        }
    }

    /// Returns the Firestore `updateTime` alongside the run, for callers
    /// that need to issue a follow-up precondition update (the
    /// orchestrator's persist-after-every-phase loop).
    pub async fn get_with_version(
        &self,
        video_id: &VideoId,
    ) -> FirestoreResult<Option<(VideoRun, Option<String>)>> {
        match self.client.get_document(COLLECTION, video_id.as_str()).await? {
            Some(doc) => {
                let update_time = doc.update_time.clone();
                Ok(Some((document_to_run(&doc)?, update_time)))
            }
            None => Ok(None),
        }
    }

    pub async fn create(&self, run: &VideoRun) -> FirestoreResult<()> {
        let fields = run_to_fields(run)?;
        self.client
            .create_document(COLLECTION, run.video_id.as_str(), fields)
            .await?;
        info!(video_id = %run.video_id, "created video run record");
        Ok(())
    }

    /// Persist the full run, optionally guarded by a prior `updateTime` so
    /// a stale in-memory copy can't clobber a newer write (e.g. one made by
    /// a recovery sweep that took over this run while we were stalled).
    pub async fn put(&self, run: &VideoRun, expected_update_time: Option<&str>) -> FirestoreResult<()> {
        let fields = run_to_fields(run)?;
        match expected_update_time {
            Some(ts) => {
                self.client
                    .update_document_with_precondition(
                        COLLECTION,
                        run.video_id.as_str(),
                        fields,
                        None,
                        Some(ts),
                    )
                    .await?;
            }
            None => {
                self.client
                    .update_document(COLLECTION, run.video_id.as_str(), fields, None)
                    .await?;
            }
        }
        Ok(())
    }

    /// List runs whose last-persisted phase is not terminal, for recovery
    /// on restart. Firestore's REST `list` endpoint doesn't support
    /// arbitrary filters without the structured-query endpoint, so this
    /// paginates the whole collection and filters client-side -- acceptable
    /// for a single-worker deployment where the collection stays small.
    pub async fn list_active(&self) -> FirestoreResult<Vec<VideoRun>> {
        let mut active = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let page = self
                .client
                .list_documents(COLLECTION, Some(100), page_token.as_deref())
                .await?;

            for doc in page.documents.unwrap_or_default() {
                let run = document_to_run(&doc)?;
                if !run.phase.is_terminal() {
                    active.push(run);
                }
            }

            page_token = page.next_page_token.filter(|t| !t.is_empty());
            if page_token.is_none() {
                break;
            }
        }

        Ok(active)
    }

    pub async fn delete(&self, video_id: &VideoId) -> FirestoreResult<()> {
        self.client.delete_document(COLLECTION, video_id.as_str()).await
    }
}

fn run_to_fields(run: &VideoRun) -> FirestoreResult<HashMap<String, Value>> {
    let state = RunState {
        segments: run.segments.clone(),
        narration_script: run.narration_script.clone(),
        files: run.files.clone(),
        metadata: run.metadata.clone(),
    };
    let state_json = serde_json::to_string(&state).map_err(|e| FirestoreError::SerializationError(e.to_string()))?;

    let mut fields = HashMap::new();
    fields.insert("user_id".to_string(), run.user_id.to_firestore_value());
    fields.insert("prompt".to_string(), run.prompt.to_firestore_value());
    fields.insert("phase".to_string(), run.phase.as_str().to_firestore_value());
    fields.insert("title".to_string(), run.title.clone().to_firestore_value());
    fields.insert("error_message".to_string(), run.error_message.clone().to_firestore_value());
    fields.insert("created_at".to_string(), run.created_at.to_firestore_value());
    fields.insert("updated_at".to_string(), run.updated_at.to_firestore_value());
    fields.insert("version".to_string(), run.version.to_firestore_value());
    fields.insert("state_json".to_string(), state_json.to_firestore_value());
    Ok(fields)
}

fn document_to_run(doc: &Document) -> FirestoreResult<VideoRun> {
    let fields = doc
        .fields
        .as_ref()
        .ok_or_else(|| FirestoreError::InvalidResponse("video run document has no fields".into()))?;

    let video_id = doc
        .name
        .as_deref()
        .and_then(|n| n.rsplit('/').next())
        .map(VideoId::from_string)
        .ok_or_else(|| FirestoreError::InvalidResponse("video run document has no name".into()))?;

    let get_str = |name: &str| -> Option<String> { fields.get(name).and_then(String::from_firestore_value) };
    let get_time = |name: &str| -> Option<DateTime<Utc>> {
        fields.get(name).and_then(DateTime::<Utc>::from_firestore_value)
    };

    let phase_str = get_str("phase").unwrap_or_else(|| "decomposing".to_string());
    let phase = parse_phase(&phase_str);

    let state_json = get_str("state_json").unwrap_or_default();
    let state: RunState = if state_json.is_empty() {
        RunState {
            segments: Vec::new(),
            narration_script: None,
            files: HashMap::new(),
            metadata: Default::default(),
        }
    } else {
        serde_json::from_str(&state_json).map_err(|e| FirestoreError::SerializationError(e.to_string()))?
    };

    Ok(VideoRun {
        video_id,
        user_id: get_str("user_id").unwrap_or_default(),
        prompt: get_str("prompt").unwrap_or_default(),
        phase,
        title: get_str("title"),
        segments: state.segments,
        narration_script: state.narration_script,
        files: state.files,
        metadata: state.metadata,
        error_message: get_str("error_message"),
        created_at: get_time("created_at").unwrap_or_else(Utc::now),
        updated_at: get_time("updated_at").unwrap_or_else(Utc::now),
        version: fields
            .get("version")
            .and_then(u64::from_firestore_value)
            .unwrap_or(0),
    })
}

fn parse_phase(s: &str) -> RunPhase {
    match s {
        "decomposing" => RunPhase::Decomposing,
        "generating" => RunPhase::Generating,
        "stitching" => RunPhase::Stitching,
        "audio" => RunPhase::Audio,
        "merging" => RunPhase::Merging,
        "transcoding" => RunPhase::Transcoding,
        "completed" => RunPhase::Completed,
        _ => RunPhase::Failed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_round_trips_through_fields_and_document() {
        let mut run = VideoRun::new(VideoId::from_string("vid-1"), "user-1", "a dog runs in the park");
        run.title = Some("Dog Run".to_string());
        run.advance();

        let fields = run_to_fields(&run).unwrap();
        let doc = Document {
            name: Some("projects/p/databases/(default)/documents/video_runs/vid-1".to_string()),
            fields: Some(fields),
            create_time: None,
            update_time: Some("2026-01-01T00:00:00Z".to_string()),
        };
        let round_tripped = document_to_run(&doc).unwrap();

        assert_eq!(round_tripped.video_id.as_str(), "vid-1");
        assert_eq!(round_tripped.user_id, "user-1");
        assert_eq!(round_tripped.phase, RunPhase::Generating);
        assert_eq!(round_tripped.title.as_deref(), Some("Dog Run"));
    }

    #[test]
    fn unknown_phase_string_falls_back_to_failed() {
        assert_eq!(parse_phase("nonsense"), RunPhase::Failed);
    }
}
