// handlers/resources.rs - admin table pages (/admin/dataakun, /admin/dataguru, ...)

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{dashboard::client_for, AppState};
use crate::api::{PortalClient, Resource, ResourceRecord};
use crate::auth::SessionToken;
use crate::error::ApiError;
use crate::list::{ListController, ListOptions};
use crate::middleware::{ApiResponse, ApiResult};
use crate::models::{MataPelajaran, MataPelajaranInput, Student, StudentInput, Teacher, UserAccount};

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub page: Option<u32>,
    pub search: Option<String>,
}

impl ListQuery {
    fn options(&self, resource: Resource) -> ListOptions {
        ListOptions::labeled(resource.path())
            .page(self.page.unwrap_or(1))
            .search(self.search.clone().unwrap_or_default())
    }
}

fn resource_for(slug: &str) -> Result<Resource, ApiError> {
    Resource::from_page_slug(slug).ok_or_else(|| ApiError::not_found(format!("Page '{}' not found", slug)))
}

/// Load the requested page through a list controller and render its state
async fn render_list<R: ResourceRecord>(client: &PortalClient, options: ListOptions) -> Result<Value, ApiError> {
    let list = ListController::<R>::mount(client.fetcher::<R>(), options).await;
    let state = list.snapshot();
    list.unmount();

    if state.session_rejected() {
        let message = state.error.unwrap_or_else(|| "Session rejected by the backend".to_string());
        return Err(ApiError::unauthorized(message));
    }

    serde_json::to_value(&state).map_err(|e| ApiError::internal_server_error(format!("Failed to render list: {}", e)))
}

async fn render_page(client: &PortalClient, resource: Resource, options: ListOptions) -> Result<Value, ApiError> {
    let list = match resource {
        Resource::Users => render_list::<UserAccount>(client, options).await?,
        Resource::Teachers => render_list::<Teacher>(client, options).await?,
        Resource::Students => render_list::<Student>(client, options).await?,
        Resource::MataPelajaran => render_list::<MataPelajaran>(client, options).await?,
    };

    let mut page = json!({ "page": resource.page_slug(), "list": list });
    if resource == Resource::MataPelajaran {
        // The subject form needs the teacher picker; a failure here leaves it empty
        let teachers = match client.teacher_options().await {
            Ok(teachers) => teachers,
            Err(e) => {
                tracing::warn!("Failed to load teacher options: {}", e);
                Vec::new()
            }
        };
        page["teachers"] = json!(teachers);
    }
    Ok(page)
}

/// GET /admin/:page?page=&search=
pub async fn list(
    State(state): State<AppState>,
    Extension(session): Extension<SessionToken>,
    Path(slug): Path<String>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Value> {
    let resource = resource_for(&slug)?;
    let client = client_for(&state, &session)?;
    let page = render_page(&client, resource, query.options(resource)).await?;
    Ok(ApiResponse::success(page))
}

fn parse_input<R: ResourceRecord>(body: Value) -> Result<R::Input, ApiError> {
    serde_json::from_value(body).map_err(|e| ApiError::bad_request(format!("Invalid {} payload: {}", R::RESOURCE.noun(), e)))
}

fn check_student(input: &StudentInput) -> Result<(), ApiError> {
    if input.has_known_kelas() {
        Ok(())
    } else {
        Err(ApiError::validation_error(format!("Unknown kelas '{}'", input.kelas), None))
    }
}

fn check_subject(input: &MataPelajaranInput) -> Result<(), ApiError> {
    if !input.has_known_kategori() {
        return Err(ApiError::validation_error(format!("Unknown kategori '{}'", input.kategori), None));
    }
    if input.guru.trim().is_empty() {
        return Err(ApiError::validation_error("A teacher must be assigned", None));
    }
    Ok(())
}

async fn create_record<R: ResourceRecord>(client: &PortalClient, body: Value) -> Result<Value, ApiError> {
    let input = parse_input::<R>(body)?;
    let record = client.create::<R>(&input).await?;
    tracing::info!("Created {} {}", R::RESOURCE.noun(), record.id());
    Ok(json!(record))
}

async fn update_record<R: ResourceRecord>(client: &PortalClient, id: &str, body: Value) -> Result<Value, ApiError> {
    let input = parse_input::<R>(body)?;
    let record = client.update::<R>(id, &input).await?;
    tracing::info!("Updated {} {}", R::RESOURCE.noun(), id);
    Ok(json!(record))
}

/// POST /admin/:page
pub async fn create(
    State(state): State<AppState>,
    Extension(session): Extension<SessionToken>,
    Path(slug): Path<String>,
    Json(body): Json<Value>,
) -> ApiResult<Value> {
    let resource = resource_for(&slug)?;
    let client = client_for(&state, &session)?;

    let record = match resource {
        Resource::Users => create_record::<UserAccount>(&client, body).await?,
        Resource::Teachers => create_record::<Teacher>(&client, body).await?,
        Resource::Students => {
            check_student(&parse_input::<Student>(body.clone())?)?;
            create_record::<Student>(&client, body).await?
        }
        Resource::MataPelajaran => {
            check_subject(&parse_input::<MataPelajaran>(body.clone())?)?;
            create_record::<MataPelajaran>(&client, body).await?
        }
    };
    Ok(ApiResponse::with_status(record, StatusCode::CREATED))
}

/// PUT /admin/:page/:id
pub async fn update(
    State(state): State<AppState>,
    Extension(session): Extension<SessionToken>,
    Path((slug, id)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> ApiResult<Value> {
    let resource = resource_for(&slug)?;
    let client = client_for(&state, &session)?;

    let record = match resource {
        Resource::Users => update_record::<UserAccount>(&client, &id, body).await?,
        Resource::Teachers => update_record::<Teacher>(&client, &id, body).await?,
        Resource::Students => {
            check_student(&parse_input::<Student>(body.clone())?)?;
            update_record::<Student>(&client, &id, body).await?
        }
        Resource::MataPelajaran => {
            check_subject(&parse_input::<MataPelajaran>(body.clone())?)?;
            update_record::<MataPelajaran>(&client, &id, body).await?
        }
    };
    Ok(ApiResponse::success(record))
}

/// DELETE /admin/:page/:id?page=&search=
///
/// Answers with the reloaded table. Deleting the last row of the last page
/// falls back to the page before it.
pub async fn delete(
    State(state): State<AppState>,
    Extension(session): Extension<SessionToken>,
    Path((slug, id)): Path<(String, String)>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Value> {
    let resource = resource_for(&slug)?;
    let client = client_for(&state, &session)?;

    client.delete(resource, &id).await?;
    tracing::info!("Deleted {} {}", resource.noun(), id);

    let page = render_page(&client, resource, query.options(resource)).await?;
    Ok(ApiResponse::success(page))
}
