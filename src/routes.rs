use std::sync::Arc;

use axum::{
    body::Body,
    extract::{
        multipart::MultipartRejection,
        DefaultBodyLimit,
        MatchedPath,
        Multipart,
        Path,
        Request,
        State,
    },
    http::{header, Method, Response, StatusCode},
    response::IntoResponse,
    routing::{get, put},
    Json,
    Router,
};
use blob_store::ContainerStore;
use bytes::Bytes;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;
use utoipa::{OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    http_objects::{BlobName, ContentFilesAPIError, ErrorResponse},
    validation::{missing_file_payload, validate_request},
};

/// Container names containing this substring get anonymous blob-read access
/// on creation.
const PUBLIC_NAME_MARKER: &str = "public";

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(OpenApi)]
#[openapi(
        paths(put_file, update_file, delete_file, get_file, list_files),
        components(schemas(ErrorResponse, BlobName, FileUpload)),
        tags(
            (name = "content-files", description = "Content files API")
        )
    )]
struct ApiDoc;

#[derive(Clone)]
pub struct RouteState {
    pub container_store: Arc<ContainerStore>,
    pub resource_segment: String,
}

pub fn create_routes(route_state: RouteState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_origin(Any)
        .allow_headers(Any);

    let file_route = format!(
        "/api/v1/{{container_name}}/{}/{{file_name}}",
        route_state.resource_segment
    );
    let collection_route = format!(
        "/api/v1/{{container_name}}/{}",
        route_state.resource_segment
    );

    Router::new()
        .merge(SwaggerUi::new("/docs/swagger").url("/docs/openapi.json", ApiDoc::openapi()))
        .route("/", get(index))
        .route(
            &file_route,
            put(put_file)
                .patch(update_file)
                .delete(delete_file)
                .get(get_file)
                .with_state(route_state.clone()),
        )
        .route(
            &collection_route,
            get(list_files).with_state(route_state.clone()),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &Request| {
                    let method = req.method();
                    let uri = req.uri();

                    let matched_path = req
                        .extensions()
                        .get::<MatchedPath>()
                        .map(|matched_path| matched_path.as_str());

                    tracing::debug_span!("request", %method, %uri, matched_path)
                })
                .on_failure(()),
        )
        .layer(cors)
        .layer(DefaultBodyLimit::max(usize::MAX))
}

async fn index() -> &'static str {
    "Content Files Server"
}

#[allow(dead_code)]
#[derive(ToSchema)]
struct FileUpload {
    #[schema(format = "binary")]
    file: String,
}

struct FilePayload {
    data: Bytes,
    content_type: String,
}

/// Pulls the uploaded file out of the multipart body. The first part carries
/// the payload; a non-multipart or empty body counts as a missing payload.
async fn read_payload(multipart: Result<Multipart, MultipartRejection>) -> Option<FilePayload> {
    let mut multipart = multipart.ok()?;
    while let Ok(Some(field)) = multipart.next_field().await {
        let content_type = field
            .content_type()
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string();
        if let Ok(data) = field.bytes().await {
            return Some(FilePayload { data, content_type });
        }
    }
    None
}

fn empty_response(status: StatusCode) -> Result<Response<Body>, ContentFilesAPIError> {
    Response::builder()
        .status(status)
        .body(Body::empty())
        .map_err(|e| ContentFilesAPIError::internal_error_str(&e.to_string()))
}

/// Create a container and file if they do not exist; replace the file's
/// content if it does.
#[utoipa::path(
    put,
    path = "/api/v1/{container_name}/contentfiles/{file_name}",
    tag = "content-files",
    request_body(content_type = "multipart/form-data", content = inline(FileUpload)),
    responses(
        (status = 201, description = "File created, Location header set"),
        (status = 204, description = "Existing file replaced"),
        (status = BAD_REQUEST, description = "Invalid parameters", body = ErrorResponse)
    ),
)]
async fn put_file(
    Path((container_name, file_name)): Path<(String, String)>,
    State(state): State<RouteState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response<Body>, ContentFilesAPIError> {
    let payload = read_payload(multipart).await;
    validate_request(&container_name, Some(&file_name), payload.is_none())
        .map_err(ContentFilesAPIError::bad_request)?;
    let payload = payload
        .ok_or_else(|| ContentFilesAPIError::bad_request(missing_file_payload()))?;

    let store = &state.container_store;
    store
        .create_container_if_absent(&container_name)
        .await
        .map_err(ContentFilesAPIError::internal_error)?;
    if container_name.contains(PUBLIC_NAME_MARKER) {
        store
            .set_public_read(&container_name)
            .await
            .map_err(ContentFilesAPIError::internal_error)?;
    }

    let file_already_exists = store
        .blob_exists(&container_name, &file_name)
        .await
        .map_err(ContentFilesAPIError::internal_error)?;
    store
        .put_blob(
            &container_name,
            &file_name,
            payload.data,
            &payload.content_type,
        )
        .await
        .map_err(ContentFilesAPIError::internal_error)?;

    if file_already_exists {
        return empty_response(StatusCode::NO_CONTENT);
    }

    let location = if container_name.contains(PUBLIC_NAME_MARKER) {
        store.blob_url(&container_name, &file_name)
    } else {
        format!("/api/v1/{}/{}", container_name, state.resource_segment)
    };
    info!("created file {}/{}", container_name, file_name);
    Response::builder()
        .status(StatusCode::CREATED)
        .header(header::LOCATION, location)
        .body(Body::empty())
        .map_err(|e| ContentFilesAPIError::internal_error_str(&e.to_string()))
}

/// Replace the content of an existing file. Never creates the container.
#[utoipa::path(
    patch,
    path = "/api/v1/{container_name}/contentfiles/{file_name}",
    tag = "content-files",
    request_body(content_type = "multipart/form-data", content = inline(FileUpload)),
    responses(
        (status = 204, description = "File updated"),
        (status = BAD_REQUEST, description = "Invalid parameters", body = ErrorResponse),
        (status = NOT_FOUND, description = "Container or file not found", body = ErrorResponse)
    ),
)]
async fn update_file(
    Path((container_name, file_name)): Path<(String, String)>,
    State(state): State<RouteState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response<Body>, ContentFilesAPIError> {
    let payload = read_payload(multipart).await;
    validate_request(&container_name, Some(&file_name), payload.is_none())
        .map_err(ContentFilesAPIError::bad_request)?;
    let payload = payload
        .ok_or_else(|| ContentFilesAPIError::bad_request(missing_file_payload()))?;

    let store = &state.container_store;
    if !store
        .container_exists(&container_name)
        .await
        .map_err(ContentFilesAPIError::internal_error)?
    {
        return Err(ContentFilesAPIError::container_not_found(&container_name));
    }
    if !store
        .blob_exists(&container_name, &file_name)
        .await
        .map_err(ContentFilesAPIError::internal_error)?
    {
        return Err(ContentFilesAPIError::file_not_found(&file_name));
    }

    store
        .put_blob(
            &container_name,
            &file_name,
            payload.data,
            &payload.content_type,
        )
        .await
        .map_err(ContentFilesAPIError::internal_error)?;
    empty_response(StatusCode::NO_CONTENT)
}

/// Delete an existing file.
#[utoipa::path(
    delete,
    path = "/api/v1/{container_name}/contentfiles/{file_name}",
    tag = "content-files",
    responses(
        (status = 204, description = "File deleted"),
        (status = BAD_REQUEST, description = "Invalid parameters", body = ErrorResponse),
        (status = NOT_FOUND, description = "Container or file not found", body = ErrorResponse)
    ),
)]
async fn delete_file(
    Path((container_name, file_name)): Path<(String, String)>,
    State(state): State<RouteState>,
) -> Result<Response<Body>, ContentFilesAPIError> {
    validate_request(&container_name, Some(&file_name), false)
        .map_err(ContentFilesAPIError::bad_request)?;

    let store = &state.container_store;
    if !store
        .container_exists(&container_name)
        .await
        .map_err(ContentFilesAPIError::internal_error)?
    {
        return Err(ContentFilesAPIError::container_not_found(&container_name));
    }
    if !store
        .blob_exists(&container_name, &file_name)
        .await
        .map_err(ContentFilesAPIError::internal_error)?
    {
        return Err(ContentFilesAPIError::file_not_found(&file_name));
    }

    store
        .delete_blob(&container_name, &file_name)
        .await
        .map_err(ContentFilesAPIError::internal_error)?;
    info!("deleted file {}/{}", container_name, file_name);
    empty_response(StatusCode::NO_CONTENT)
}

/// Retrieve a file's content with its stored content type.
#[utoipa::path(
    get,
    path = "/api/v1/{container_name}/contentfiles/{file_name}",
    tag = "content-files",
    responses(
        (status = 200, description = "File content"),
        (status = BAD_REQUEST, description = "Invalid parameters", body = ErrorResponse),
        (status = NOT_FOUND, description = "Container or file not found", body = ErrorResponse)
    ),
)]
async fn get_file(
    Path((container_name, file_name)): Path<(String, String)>,
    State(state): State<RouteState>,
) -> Result<Response<Body>, ContentFilesAPIError> {
    validate_request(&container_name, Some(&file_name), false)
        .map_err(ContentFilesAPIError::bad_request)?;

    let store = &state.container_store;
    if !store
        .container_exists(&container_name)
        .await
        .map_err(ContentFilesAPIError::internal_error)?
    {
        return Err(ContentFilesAPIError::container_not_found(&container_name));
    }
    if !store
        .blob_exists(&container_name, &file_name)
        .await
        .map_err(ContentFilesAPIError::internal_error)?
    {
        return Err(ContentFilesAPIError::file_not_found(&file_name));
    }

    let download = store
        .get_blob(&container_name, &file_name)
        .await
        .map_err(ContentFilesAPIError::internal_error)?;
    Response::builder()
        .header(header::CONTENT_TYPE, download.content_type)
        .header(header::CONTENT_LENGTH, download.size_bytes.to_string())
        .body(Body::from_stream(download.stream))
        .map_err(|e| ContentFilesAPIError::internal_error_str(&e.to_string()))
}

/// List the names of every file in a container.
#[utoipa::path(
    get,
    path = "/api/v1/{container_name}/contentfiles",
    tag = "content-files",
    responses(
        (status = 200, description = "File names, or an empty body for an empty container", body = Vec<BlobName>),
        (status = BAD_REQUEST, description = "Invalid parameters", body = ErrorResponse),
        (status = NOT_FOUND, description = "Container not found", body = ErrorResponse)
    ),
)]
async fn list_files(
    Path(container_name): Path<String>,
    State(state): State<RouteState>,
) -> Result<Response<Body>, ContentFilesAPIError> {
    validate_request(&container_name, None, false)
        .map_err(ContentFilesAPIError::bad_request)?;

    let store = &state.container_store;
    if !store
        .container_exists(&container_name)
        .await
        .map_err(ContentFilesAPIError::internal_error)?
    {
        return Err(ContentFilesAPIError::container_not_found(&container_name));
    }

    let blob_names: Vec<BlobName> = store
        .list_blobs(&container_name)
        .await
        .map_err(ContentFilesAPIError::internal_error)?
        .into_iter()
        .map(|name| BlobName { name })
        .collect();
    // An empty container answers 200 with no body, not an empty array.
    if blob_names.is_empty() {
        return empty_response(StatusCode::OK);
    }
    Ok(Json(blob_names).into_response())
}
