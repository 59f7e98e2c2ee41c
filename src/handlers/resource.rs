//! Resource CRUD handlers: create, list, get, replace, patch, delete.
//! Each handler is generic over the record type; the descriptor is the router state.

use crate::error::AppError;
use crate::query::Query as ListQuery;
use crate::resource::{Resource, ResourceDescriptor};
use crate::service::crud::{check_field_set, decode_field_set, decode_record, parse_id};
use crate::service::CrudService;
use crate::store::StoreHandle;
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

type Descriptor<R> = State<Arc<ResourceDescriptor<R>>>;

/// POST /: 201 with an empty body; `Location` carries the new id relative to the collection.
pub async fn create<R: Resource>(
    State(desc): Descriptor<R>,
    store: StoreHandle,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let mut record: R = decode_record(&body)?;
    desc.hooks().pre_create(&mut record)?;
    let coll = store.collection(desc.namespace());
    let id = CrudService::create(&coll, &mut record).await?;
    desc.hooks().post_create(&record)?;
    Ok((StatusCode::CREATED, [(header::LOCATION, id.to_string())]))
}

/// GET /: JSON array, `[]` when nothing matches.
pub async fn list<R: Resource>(
    State(desc): Descriptor<R>,
    store: StoreHandle,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<impl IntoResponse, AppError> {
    let query = ListQuery::from_params(params)?.with_id_field(R::ID_FIELD);
    let coll = store.collection(desc.namespace());
    let records: Vec<R> = CrudService::list(&coll, &query).await?;
    Ok((StatusCode::OK, Json(records)))
}

/// GET /:id
pub async fn read<R: Resource>(
    State(desc): Descriptor<R>,
    store: StoreHandle,
    Path(id_str): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let id = parse_id(&id_str)?;
    let coll = store.collection(desc.namespace());
    let record: R = CrudService::read_existing(&coll, &id).await?;
    Ok((StatusCode::OK, Json(record)))
}

/// PUT /:id: full replacement. `post_update` sees the value sent for replacement.
pub async fn replace<R: Resource>(
    State(desc): Descriptor<R>,
    store: StoreHandle,
    Path(id_str): Path<String>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let id = parse_id(&id_str)?;
    let mut record: R = decode_record(&body)?;
    record.set_id(id);
    desc.hooks().pre_update(&mut record)?;
    let coll = store.collection(desc.namespace());
    CrudService::replace(&coll, &id, &record).await?;
    let updated: R = CrudService::read_existing(&coll, &id).await?;
    desc.hooks().post_update(&updated, &record)?;
    Ok((StatusCode::OK, Json(updated)))
}

/// PATCH /:id: set only the fields present in the body.
/// Fetch and write are separate store calls; a concurrent writer between them is not detected.
pub async fn patch<R: Resource>(
    State(desc): Descriptor<R>,
    store: StoreHandle,
    Path(id_str): Path<String>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let id = parse_id(&id_str)?;
    let coll = store.collection(desc.namespace());
    let mut current: R = CrudService::read_existing(&coll, &id).await?;
    let fields = decode_field_set::<R>(&body)?;
    check_field_set(&current, &fields)?;
    let snapshot = current.clone();
    desc.hooks().pre_update(&mut current)?;
    CrudService::patch(&coll, &id, &fields).await?;
    let updated: R = CrudService::read_existing(&coll, &id).await?;
    desc.hooks().post_update(&updated, &snapshot)?;
    Ok((StatusCode::OK, Json(updated)))
}

/// PUT, PATCH or DELETE on the collection path: the id segment is empty.
pub async fn empty_id() -> AppError {
    AppError::NotFound("empty id".into())
}

/// DELETE /:id: the record is fetched first so both delete hooks can see it.
pub async fn delete<R: Resource>(
    State(desc): Descriptor<R>,
    store: StoreHandle,
    Path(id_str): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let id = parse_id(&id_str)?;
    let coll = store.collection(desc.namespace());
    let record: R = CrudService::read_existing(&coll, &id).await?;
    desc.hooks().pre_delete(&record)?;
    CrudService::delete(&coll, &id).await?;
    desc.hooks().post_delete(&record)?;
    Ok(StatusCode::NO_CONTENT)
}
