//! `GET /files/:id/video?quality={720p|480p}`: HTTP range-enabled streaming
//! of a run's `final_*.mp4`. `reelforge-storage`'s `StorageLayout` only
//! computes paths -- this handler is the thing that actually reads and
//! serves the bytes.

use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;

use reelforge_storage::Quality;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct VideoQuery {
    #[serde(default)]
    pub quality: Option<String>,
}

fn parse_quality(raw: Option<&str>) -> ApiResult<Quality> {
    match raw.unwrap_or("720p") {
        "720p" => Ok(Quality::P720),
        "480p" => Ok(Quality::P480),
        other => Err(ApiError::bad_request(format!("unknown quality '{other}', expected 720p or 480p"))),
    }
}

/// Parsed `Range: bytes=start-end` header, half-open on either side.
struct ByteRange {
    start: u64,
    end: u64,
}

fn parse_range(header_value: &str, file_len: u64) -> Option<ByteRange> {
    let spec = header_value.strip_prefix("bytes=")?;
    let (start_s, end_s) = spec.split_once('-')?;

    if start_s.is_empty() {
        // suffix range: last N bytes
        let suffix_len: u64 = end_s.parse().ok()?;
        let suffix_len = suffix_len.min(file_len);
        return Some(ByteRange {
            start: file_len.saturating_sub(suffix_len),
            end: file_len.saturating_sub(1),
        });
    }

    let start: u64 = start_s.parse().ok()?;
    let end: u64 = if end_s.is_empty() {
        file_len.saturating_sub(1)
    } else {
        end_s.parse().ok()?
    };
    if start > end || start >= file_len {
        return None;
    }
    Some(ByteRange { start, end: end.min(file_len - 1) })
}

/// `GET /files/:id/video?quality=`.
pub async fn stream_video(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<VideoQuery>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let quality = parse_quality(query.quality.as_deref())?;
    let video_id = reelforge_models::VideoId::from_string(id.clone());

    let run = state
        .run_repo
        .get(&video_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("video {id} not found")))?;

    let path = state.storage.layout().final_path(&run.user_id, video_id.as_str(), quality);

    let mut file = tokio::fs::File::open(&path)
        .await
        .map_err(|_| ApiError::not_found(format!("no {} render available for video {id}", quality.as_str())))?;
    let file_len = file
        .metadata()
        .await
        .map_err(|e| ApiError::internal(e.to_string()))?
        .len();

    let range = headers
        .get(header::RANGE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| parse_range(v, file_len));

    let content_type = HeaderValue::from_static("video/mp4");

    match range {
        Some(ByteRange { start, end }) => {
            file.seek(std::io::SeekFrom::Start(start))
                .await
                .map_err(|e| ApiError::internal(e.to_string()))?;
            let chunk_len = end - start + 1;
            let limited = file.take(chunk_len);
            let stream = ReaderStream::new(limited);
            let body = Body::from_stream(stream);

            let mut response = Response::new(body);
            *response.status_mut() = StatusCode::PARTIAL_CONTENT;
            let h = response.headers_mut();
            h.insert(header::CONTENT_TYPE, content_type);
            h.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
            h.insert(
                header::CONTENT_RANGE,
                HeaderValue::from_str(&format!("bytes {start}-{end}/{file_len}")).unwrap(),
            );
            h.insert(header::CONTENT_LENGTH, HeaderValue::from_str(&chunk_len.to_string()).unwrap());
            Ok(response)
        }
        None => {
            let stream = ReaderStream::new(file);
            let body = Body::from_stream(stream);

            let mut response = Response::new(body);
            let h = response.headers_mut();
            h.insert(header::CONTENT_TYPE, content_type);
            h.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
            h.insert(header::CONTENT_LENGTH, HeaderValue::from_str(&file_len.to_string()).unwrap());
            Ok(response.into_response())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_standard_byte_range() {
        let r = parse_range("bytes=100-199", 1000).unwrap();
        assert_eq!(r.start, 100);
        assert_eq!(r.end, 199);
    }

    #[test]
    fn parses_open_ended_range() {
        let r = parse_range("bytes=900-", 1000).unwrap();
        assert_eq!(r.start, 900);
        assert_eq!(r.end, 999);
    }

    #[test]
    fn parses_suffix_range() {
        let r = parse_range("bytes=-100", 1000).unwrap();
        assert_eq!(r.start, 900);
        assert_eq!(r.end, 999);
    }

    #[test]
    fn rejects_out_of_bounds_start() {
        assert!(parse_range("bytes=5000-5010", 1000).is_none());
    }
}
