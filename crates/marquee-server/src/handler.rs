use std::collections::BTreeMap;

use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use marquee_core::{Cms, DeleteReport, ListQuery, MediaRecord};
use marquee_types::{KindSchema, RecordKind, Upload, UpsertRequest};
use serde::Serialize;
use serde_json::json;

use crate::error::ApiError;

/// Multipart text parts carrying the record identifier.
const ID_PARTS: [&str; 2] = ["id", "_id"];
/// Prefix of text parts carrying an existing-URL hint for a slot.
const EXISTING_PREFIX: &str = "existing.";
/// Text part naming slots to clear, comma separated.
const CLEAR_PART: &str = "clear";

#[derive(Debug, Serialize)]
pub struct RecordList {
    pub count: usize,
    pub records: Vec<MediaRecord>,
}

#[derive(Debug, Serialize)]
pub struct KindInfo {
    pub route: &'static str,
    #[serde(flatten)]
    pub schema: &'static KindSchema,
}

fn resolve_kind(segment: &str) -> Result<RecordKind, ApiError> {
    RecordKind::from_route(segment).map_err(|e| ApiError::not_found(e.to_string()))
}

pub async fn health_handler(State(cms): State<Cms>) -> Result<Json<serde_json::Value>, ApiError> {
    let mut records = BTreeMap::new();
    for kind in RecordKind::ALL {
        records.insert(kind.as_str(), cms.count(kind).await?);
    }
    Ok(Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "records": records,
    })))
}

pub async fn info_handler(State(cms): State<Cms>) -> Json<serde_json::Value> {
    let (record_store, asset_store) = cms.backends();
    Json(json!({
        "name": "marquee-server",
        "version": env!("CARGO_PKG_VERSION"),
        "recordStore": record_store,
        "assetStore": asset_store,
    }))
}

pub async fn kinds_handler() -> Json<Vec<KindInfo>> {
    Json(
        RecordKind::ALL
            .into_iter()
            .map(|kind| KindInfo {
                route: kind.route(),
                schema: kind.schema(),
            })
            .collect(),
    )
}

pub async fn list_handler(
    State(cms): State<Cms>,
    Path(kind): Path<String>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Json<RecordList>, ApiError> {
    let kind = resolve_kind(&kind)?;
    let query = ListQuery::from_params(params);
    let records = cms.list(kind, &query).await?;
    Ok(Json(RecordList {
        count: records.len(),
        records,
    }))
}

pub async fn show_handler(
    State(cms): State<Cms>,
    Path((kind, id)): Path<(String, String)>,
) -> Result<Json<MediaRecord>, ApiError> {
    let kind = resolve_kind(&kind)?;
    Ok(Json(cms.get(kind, &id).await?))
}

/// `POST /api/{kind}`: create, or update when the form names an id.
pub async fn upsert_handler(
    State(cms): State<Cms>,
    Path(kind): Path<String>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<MediaRecord>), ApiError> {
    let kind = resolve_kind(&kind)?;
    let request = read_upsert(kind.schema(), multipart).await?;
    let status = if request.identifier().is_some() {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    let record = cms.upsert(kind, request).await?;
    Ok((status, Json(record)))
}

/// `PUT /api/{kind}/{id}`: update; the path id overrides any form id.
pub async fn update_handler(
    State(cms): State<Cms>,
    Path((kind, id)): Path<(String, String)>,
    multipart: Multipart,
) -> Result<Json<MediaRecord>, ApiError> {
    let kind = resolve_kind(&kind)?;
    let mut request = read_upsert(kind.schema(), multipart).await?;
    if id.trim().is_empty() {
        return Err(ApiError::bad_request("record identifier must not be empty"));
    }
    request.id = Some(id);
    Ok(Json(cms.upsert(kind, request).await?))
}

pub async fn delete_handler(
    State(cms): State<Cms>,
    Path((kind, id)): Path<(String, String)>,
) -> Result<Json<DeleteReport>, ApiError> {
    let kind = resolve_kind(&kind)?;
    Ok(Json(cms.delete(kind, &id).await?))
}

/// Decode a multipart form into an [`UpsertRequest`].
///
/// File parts are uploads for the slot they are named after. Text parts are
/// scalar fields, except `id`/`_id`, `existing.<slot>` hints, `clear`, and a
/// text part named after a slot, which is read as a hint for that slot.
///
/// Hint precedence does not depend on part order: a non-empty hint beats an
/// empty one, and `existing.<slot>` beats a bare slot-named part.
pub async fn read_upsert(
    schema: &KindSchema,
    mut multipart: Multipart,
) -> Result<UpsertRequest, ApiError> {
    let mut request = UpsertRequest::new();
    let mut bare_hints = BTreeMap::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("malformed multipart body: {e}")))?
    {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        if let Some(filename) = field.file_name().map(str::to_string) {
            let content_type = field.content_type().map(str::to_string);
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::bad_request(format!("could not read part `{name}`: {e}")))?;
            let mut upload = Upload::new(bytes);
            if !filename.is_empty() {
                upload = upload.with_filename(filename);
            }
            if let Some(content_type) = content_type {
                upload = upload.with_content_type(content_type);
            }
            if !upload.is_empty() {
                request.uploads.insert(name, upload);
            }
            continue;
        }

        let text = field
            .text()
            .await
            .map_err(|e| ApiError::bad_request(format!("could not read part `{name}`: {e}")))?;
        if ID_PARTS.contains(&name.as_str()) {
            request.offer_id(&text);
        } else if let Some(slot) = name.strip_prefix(EXISTING_PREFIX) {
            if !text.trim().is_empty() || !request.existing.contains_key(slot) {
                request.existing.insert(slot.to_string(), text);
            }
        } else if name == CLEAR_PART {
            request.clear.extend(
                text.split(',')
                    .map(str::trim)
                    .filter(|slot| !slot.is_empty())
                    .map(str::to_string),
            );
        } else if schema.slot(&name).is_some() {
            if !text.trim().is_empty() {
                bare_hints.insert(name, text);
            }
        } else {
            request.fields.insert(name, text);
        }
    }
    for (slot, text) in bare_hints {
        if request.hint(&slot).is_none() {
            request.existing.insert(slot, text);
        }
    }
    Ok(request)
}
