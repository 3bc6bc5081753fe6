//! Clusters, categories and services.
//!
//! Public listings are rendered in the request language; administrators manage the
//! translations directly.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use utoipa::IntoParams;
use uuid::Uuid;
use validator::Validate;

use crate::auth::AdminUser;
use crate::error::{HttpAppError, ValidatedJson};
use crate::middleware::RequestLanguage;
use crate::state::AppState;
use firmhub_core::models::{Category, Cluster, LocalizedNode, Service, UpsertTaxonomyRequest};
use firmhub_core::{AppError, Language};
use firmhub_infra::ProblemDetails;

#[derive(Debug, Deserialize, IntoParams)]
pub struct CategoryFilter {
    pub cluster_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ServiceFilter {
    pub category_id: Option<Uuid>,
}

fn localize_cluster(c: &Cluster, lang: Language, fallback: Language) -> LocalizedNode {
    LocalizedNode::build(c.id, None, &c.slug, c.position, &c.translations, lang, fallback)
}

fn localize_category(c: &Category, lang: Language, fallback: Language) -> LocalizedNode {
    LocalizedNode::build(
        c.id,
        Some(c.cluster_id),
        &c.slug,
        c.position,
        &c.translations,
        lang,
        fallback,
    )
}

fn localize_service(s: &Service, lang: Language, fallback: Language) -> LocalizedNode {
    LocalizedNode::build(
        s.id,
        Some(s.category_id),
        &s.slug,
        0,
        &s.translations,
        lang,
        fallback,
    )
}

fn require_parent(request: &UpsertTaxonomyRequest, field: &str) -> Result<Uuid, AppError> {
    request
        .parent_id
        .ok_or_else(|| AppError::field("parent_id", format!("{} is required", field)))
}

#[utoipa::path(
    get,
    path = "/api/clusters",
    responses((status = 200, description = "Localized clusters", body = Vec<LocalizedNode>)),
    tag = "taxonomy"
)]
#[tracing::instrument(skip(state))]
pub async fn list_clusters(
    State(state): State<Arc<AppState>>,
    RequestLanguage(lang): RequestLanguage,
) -> Result<Json<Vec<LocalizedNode>>, HttpAppError> {
    let clusters = state.db.taxonomy.list_clusters().await?;
    Ok(Json(
        clusters
            .iter()
            .map(|c| localize_cluster(c, lang, state.default_language))
            .collect(),
    ))
}

#[utoipa::path(
    get,
    path = "/api/categories",
    params(CategoryFilter),
    responses((status = 200, description = "Localized categories", body = Vec<LocalizedNode>)),
    tag = "taxonomy"
)]
#[tracing::instrument(skip(state))]
pub async fn list_categories(
    State(state): State<Arc<AppState>>,
    RequestLanguage(lang): RequestLanguage,
    Query(filter): Query<CategoryFilter>,
) -> Result<Json<Vec<LocalizedNode>>, HttpAppError> {
    let categories = state.db.taxonomy.list_categories(filter.cluster_id).await?;
    Ok(Json(
        categories
            .iter()
            .map(|c| localize_category(c, lang, state.default_language))
            .collect(),
    ))
}

#[utoipa::path(
    get,
    path = "/api/categories/{id}",
    params(("id" = Uuid, Path, description = "Category ID")),
    responses(
        (status = 200, description = "Localized category", body = LocalizedNode),
        (status = 404, description = "Category not found", body = ProblemDetails)
    ),
    tag = "taxonomy"
)]
#[tracing::instrument(skip(state))]
pub async fn get_category(
    State(state): State<Arc<AppState>>,
    RequestLanguage(lang): RequestLanguage,
    Path(id): Path<Uuid>,
) -> Result<Json<LocalizedNode>, HttpAppError> {
    let category = state
        .db
        .taxonomy
        .get_category(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Category not found".to_string()))?;
    Ok(Json(localize_category(
        &category,
        lang,
        state.default_language,
    )))
}

#[utoipa::path(
    get,
    path = "/api/services",
    params(ServiceFilter),
    responses((status = 200, description = "Localized services", body = Vec<LocalizedNode>)),
    tag = "taxonomy"
)]
#[tracing::instrument(skip(state))]
pub async fn list_services(
    State(state): State<Arc<AppState>>,
    RequestLanguage(lang): RequestLanguage,
    Query(filter): Query<ServiceFilter>,
) -> Result<Json<Vec<LocalizedNode>>, HttpAppError> {
    let services = state.db.taxonomy.list_services(filter.category_id).await?;
    Ok(Json(
        services
            .iter()
            .map(|s| localize_service(s, lang, state.default_language))
            .collect(),
    ))
}

// ----- Administration -----

#[utoipa::path(
    post,
    path = "/api/admin/clusters",
    request_body = UpsertTaxonomyRequest,
    responses(
        (status = 201, description = "Cluster created", body = LocalizedNode),
        (status = 400, description = "Invalid cluster", body = ProblemDetails),
        (status = 409, description = "Slug already used", body = ProblemDetails)
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
#[tracing::instrument(skip(state, _admin, request))]
pub async fn create_cluster(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    RequestLanguage(lang): RequestLanguage,
    ValidatedJson(request): ValidatedJson<UpsertTaxonomyRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    request.validate()?;
    let cluster = state
        .db
        .taxonomy
        .create_cluster(request.slug.trim(), request.position, &request.translations)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(localize_cluster(&cluster, lang, state.default_language)),
    ))
}

#[utoipa::path(
    put,
    path = "/api/admin/clusters/{id}",
    params(("id" = Uuid, Path, description = "Cluster ID")),
    request_body = UpsertTaxonomyRequest,
    responses(
        (status = 200, description = "Cluster updated", body = LocalizedNode),
        (status = 404, description = "Cluster not found", body = ProblemDetails)
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
#[tracing::instrument(skip(state, _admin, request))]
pub async fn update_cluster(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    RequestLanguage(lang): RequestLanguage,
    Path(id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<UpsertTaxonomyRequest>,
) -> Result<Json<LocalizedNode>, HttpAppError> {
    request.validate()?;
    let cluster = state
        .db
        .taxonomy
        .update_cluster(id, request.slug.trim(), request.position, &request.translations)
        .await?
        .ok_or_else(|| AppError::NotFound("Cluster not found".to_string()))?;
    Ok(Json(localize_cluster(&cluster, lang, state.default_language)))
}

#[utoipa::path(
    delete,
    path = "/api/admin/clusters/{id}",
    params(("id" = Uuid, Path, description = "Cluster ID")),
    responses(
        (status = 204, description = "Cluster deleted"),
        (status = 404, description = "Cluster not found", body = ProblemDetails)
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
#[tracing::instrument(skip(state, _admin))]
pub async fn delete_cluster(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, HttpAppError> {
    if !state.db.taxonomy.delete_cluster(id).await? {
        return Err(AppError::NotFound("Cluster not found".to_string()).into());
    }
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/api/admin/categories",
    request_body = UpsertTaxonomyRequest,
    responses(
        (status = 201, description = "Category created", body = LocalizedNode),
        (status = 400, description = "Invalid category", body = ProblemDetails)
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
#[tracing::instrument(skip(state, _admin, request))]
pub async fn create_category(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    RequestLanguage(lang): RequestLanguage,
    ValidatedJson(request): ValidatedJson<UpsertTaxonomyRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    request.validate()?;
    let cluster_id = require_parent(&request, "cluster")?;
    let category = state
        .db
        .taxonomy
        .create_category(
            cluster_id,
            request.slug.trim(),
            request.position,
            &request.translations,
        )
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(localize_category(&category, lang, state.default_language)),
    ))
}

#[utoipa::path(
    put,
    path = "/api/admin/categories/{id}",
    params(("id" = Uuid, Path, description = "Category ID")),
    request_body = UpsertTaxonomyRequest,
    responses(
        (status = 200, description = "Category updated", body = LocalizedNode),
        (status = 404, description = "Category not found", body = ProblemDetails)
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
#[tracing::instrument(skip(state, _admin, request))]
pub async fn update_category(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    RequestLanguage(lang): RequestLanguage,
    Path(id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<UpsertTaxonomyRequest>,
) -> Result<Json<LocalizedNode>, HttpAppError> {
    request.validate()?;
    let cluster_id = require_parent(&request, "cluster")?;
    let category = state
        .db
        .taxonomy
        .update_category(
            id,
            cluster_id,
            request.slug.trim(),
            request.position,
            &request.translations,
        )
        .await?
        .ok_or_else(|| AppError::NotFound("Category not found".to_string()))?;
    Ok(Json(localize_category(
        &category,
        lang,
        state.default_language,
    )))
}

#[utoipa::path(
    delete,
    path = "/api/admin/categories/{id}",
    params(("id" = Uuid, Path, description = "Category ID")),
    responses(
        (status = 204, description = "Category deleted"),
        (status = 404, description = "Category not found", body = ProblemDetails)
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
#[tracing::instrument(skip(state, _admin))]
pub async fn delete_category(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, HttpAppError> {
    if !state.db.taxonomy.delete_category(id).await? {
        return Err(AppError::NotFound("Category not found".to_string()).into());
    }
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/api/admin/services",
    request_body = UpsertTaxonomyRequest,
    responses(
        (status = 201, description = "Service created", body = LocalizedNode),
        (status = 400, description = "Invalid service", body = ProblemDetails)
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
#[tracing::instrument(skip(state, _admin, request))]
pub async fn create_service(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    RequestLanguage(lang): RequestLanguage,
    ValidatedJson(request): ValidatedJson<UpsertTaxonomyRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    request.validate()?;
    let category_id = require_parent(&request, "category")?;
    let service = state
        .db
        .taxonomy
        .create_service(category_id, request.slug.trim(), &request.translations)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(localize_service(&service, lang, state.default_language)),
    ))
}

#[utoipa::path(
    put,
    path = "/api/admin/services/{id}",
    params(("id" = Uuid, Path, description = "Service ID")),
    request_body = UpsertTaxonomyRequest,
    responses(
        (status = 200, description = "Service updated", body = LocalizedNode),
        (status = 404, description = "Service not found", body = ProblemDetails)
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
#[tracing::instrument(skip(state, _admin, request))]
pub async fn update_service(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    RequestLanguage(lang): RequestLanguage,
    Path(id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<UpsertTaxonomyRequest>,
) -> Result<Json<LocalizedNode>, HttpAppError> {
    request.validate()?;
    let category_id = require_parent(&request, "category")?;
    let service = state
        .db
        .taxonomy
        .update_service(id, category_id, request.slug.trim(), &request.translations)
        .await?
        .ok_or_else(|| AppError::NotFound("Service not found".to_string()))?;
    Ok(Json(localize_service(&service, lang, state.default_language)))
}

#[utoipa::path(
    delete,
    path = "/api/admin/services/{id}",
    params(("id" = Uuid, Path, description = "Service ID")),
    responses(
        (status = 204, description = "Service deleted"),
        (status = 404, description = "Service not found", body = ProblemDetails)
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
#[tracing::instrument(skip(state, _admin))]
pub async fn delete_service(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, HttpAppError> {
    if !state.db.taxonomy.delete_service(id).await? {
        return Err(AppError::NotFound("Service not found".to_string()).into());
    }
    Ok(StatusCode::NO_CONTENT)
}
