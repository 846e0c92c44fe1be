use futures_util::TryStreamExt;
use percent_encoding::percent_decode_str;
use serde::Serialize;
use warp::{
    hyper::body::Bytes, multipart::FormData, path::Tail, reply::Response, Buf, Rejection, Reply,
};

use super::reply::{error_reply, json_reply};
use super::AppState;
use crate::entity::{self, Entity};
use crate::error::{Result, ServiceError};
use crate::ingest::{IngestOutcome, Upload};

/// Multipart field carrying the uploaded file.
const FILE_FIELD: &str = "file";

#[derive(Serialize)]
struct Message {
    message: String,
}

#[derive(Serialize)]
struct InputError {
    error: &'static str,
}

/// Run blocking store work on tokio's blocking pool.
async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ServiceError::Database(format!("store task failed: {e}")))?
}

fn message(text: impl Into<String>) -> Response {
    json_reply(&Message {
        message: text.into(),
    })
}

/// Percent-decode one path segment as UTF-8.
fn decode_segment(raw: &str) -> Result<String> {
    percent_decode_str(raw)
        .decode_utf8()
        .map(|s| s.into_owned())
        .map_err(|e| ServiceError::Parse(format!("path segment `{raw}` is not valid UTF-8: {e}")))
}

fn outcome_reply(result: Result<IngestOutcome>) -> Response {
    match result {
        Ok(IngestOutcome::Materialized(done)) => message(done.message()),
        Ok(IngestOutcome::Rejected(rejection)) => json_reply(&InputError {
            error: rejection.message(),
        }),
        Err(e) => error_reply(&e),
    }
}

pub(super) async fn health() -> std::result::Result<Response, Rejection> {
    Ok(warp::reply::json(&serde_json::json!({
        "status": "healthy",
        "service": "microbiome-store"
    }))
    .into_response())
}

pub(super) async fn add_csv(
    form: FormData,
    state: AppState,
) -> std::result::Result<Response, Rejection> {
    let upload = match read_upload(form).await {
        Ok(upload) => upload,
        Err(e) => return Ok(error_reply(&e)),
    };
    let materializer = state.materializer.clone();
    let result = blocking(move || materializer.ingest_from_upload(&upload)).await;
    Ok(outcome_reply(result))
}

pub(super) async fn add_str(
    tail: Tail,
    body: Bytes,
    state: AppState,
) -> std::result::Result<Response, Rejection> {
    let table = match decode_segment(tail.as_str()) {
        Ok(table) => table,
        Err(e) => return Ok(error_reply(&e)),
    };
    // The table name is a single path segment.
    if table.contains('/') {
        return Ok(error_reply(&ServiceError::NotFound("route not found".into())));
    }
    let text = match String::from_utf8(body.to_vec()) {
        Ok(text) => text,
        Err(e) => {
            let err = ServiceError::Parse(format!("payload is not valid UTF-8: {e}"));
            return Ok(error_reply(&err));
        }
    };
    let materializer = state.materializer.clone();
    let result = blocking(move || materializer.ingest_from_text(&table, &text)).await;
    Ok(outcome_reply(result))
}

pub(super) async fn get_taxon(
    taxon: String,
    state: AppState,
) -> std::result::Result<Response, Rejection> {
    let taxon = match decode_segment(&taxon) {
        Ok(taxon) => taxon,
        Err(e) => return Ok(error_reply(&e)),
    };
    let refresher = state.refresher.clone();
    let result = blocking(move || refresher.read_tasks(Some(taxon.as_str()))).await;
    Ok(match result {
        Ok(tasks) => json_reply(&tasks),
        Err(e) => error_reply(&e),
    })
}

pub(super) async fn get_all(state: AppState) -> std::result::Result<Response, Rejection> {
    let refresher = state.refresher.clone();
    let result = blocking(move || refresher.read_tasks(None)).await;
    Ok(match result {
        Ok(tasks) => json_reply(&tasks),
        Err(e) => error_reply(&e),
    })
}

pub(super) async fn get_entity<E: Entity>(
    id: i64,
    state: AppState,
) -> std::result::Result<Response, Rejection> {
    let store = state.store.clone();
    let result = blocking(move || entity::get::<E>(&store, id)).await;
    Ok(match result {
        Ok(record) => json_reply(&record),
        Err(e) => error_reply(&e),
    })
}

pub(super) async fn delete_entity<E: Entity>(
    id: i64,
    state: AppState,
) -> std::result::Result<Response, Rejection> {
    let store = state.store.clone();
    let result = blocking(move || entity::delete::<E>(&store, id)).await;
    Ok(match result {
        Ok(()) => message("Data deleted successfully"),
        Err(e) => error_reply(&e),
    })
}

pub(super) async fn update_entity<E: Entity>(
    record: E,
    state: AppState,
) -> std::result::Result<Response, Rejection> {
    let store = state.store.clone();
    let result = blocking(move || entity::update::<E>(&store, &record)).await;
    Ok(match result {
        Ok(()) => message("Data updated successfully"),
        Err(e) => error_reply(&e),
    })
}

/// Pull the `file` part out of a multipart form and buffer its contents.
async fn read_upload(mut form: FormData) -> Result<Upload> {
    while let Some(part) = form
        .try_next()
        .await
        .map_err(|e| ServiceError::Parse(format!("reading multipart form: {e}")))?
    {
        if part.name() != FILE_FIELD {
            continue;
        }
        let filename = part.filename().unwrap_or_default().to_string();
        let bytes = part
            .stream()
            .try_fold(Vec::new(), |mut acc, mut buf| async move {
                while buf.has_remaining() {
                    let chunk = buf.chunk();
                    let n = chunk.len();
                    acc.extend_from_slice(chunk);
                    buf.advance(n);
                }
                Ok::<_, warp::Error>(acc)
            })
            .await
            .map_err(|e| ServiceError::Parse(format!("reading upload `{filename}`: {e}")))?;
        return Ok(Upload { filename, bytes });
    }

    Err(ServiceError::Parse(format!(
        "multipart field `{FILE_FIELD}` is required"
    )))
}
