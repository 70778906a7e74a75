//! HTTP endpoints for the file API.

use axum::body::Body;
use axum::extract::{Multipart, Path, State};
use axum::http::header::{ACCEPT_RANGES, CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE, RANGE};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use bytes::Bytes;
use filestore_service::{ObjectSummary, WriteReceipt};
use serde::Deserialize;

use crate::error::{ApiError, ApiResult};
use crate::state::ServiceState;

/// The multipart form field carrying the uploaded file.
const UPLOAD_FIELD: &str = "file";

/// Builds the router for all file endpoints.
pub fn routes() -> Router<ServiceState> {
    Router::new()
        .route("/health", get(health))
        .route("/files", get(files_list).delete(files_delete))
        .route(
            "/files/{name}",
            axum::routing::post(file_post).get(file_get).delete(file_delete),
        )
}

async fn health() -> StatusCode {
    StatusCode::OK
}

async fn file_post(
    State(state): State<ServiceState>,
    Path(name): Path<String>,
    mut multipart: Multipart,
) -> ApiResult<Response> {
    let mut payload: Option<Bytes> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| ApiError::BadRequest(err.to_string()))?
    {
        if field.name() == Some(UPLOAD_FIELD) {
            payload = Some(
                field
                    .bytes()
                    .await
                    .map_err(|err| ApiError::BadRequest(err.to_string()))?,
            );
        }
    }

    let Some(payload) = payload else {
        return Err(ApiError::BadRequest(format!(
            "missing `{UPLOAD_FIELD}` form field"
        )));
    };
    if payload.is_empty() {
        return Err(ApiError::BadRequest("uploaded file is empty".into()));
    }

    let receipt: WriteReceipt = state.store.write(&name, payload, &state.tier_options).await?;
    Ok((StatusCode::CREATED, Json(receipt)).into_response())
}

async fn file_get(
    State(state): State<ServiceState>,
    Path(name): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let range = headers.get(RANGE).and_then(|value| value.to_str().ok());
    let delivery = state.store.read(&name, range).await?;

    let status = if delivery.plan.is_partial() {
        StatusCode::PARTIAL_CONTENT
    } else {
        StatusCode::OK
    };

    let mut headers = HeaderMap::new();
    headers.insert(
        CONTENT_TYPE,
        delivery
            .mime_type
            .parse()
            .expect("mime types are valid header values"),
    );
    headers.insert(CONTENT_LENGTH, delivery.plan.content_length().into());
    if let Some(content_range) = delivery.plan.content_range() {
        headers.insert(
            CONTENT_RANGE,
            content_range
                .parse()
                .expect("content ranges are valid header values"),
        );
        headers.insert(ACCEPT_RANGES, HeaderValue::from_static("bytes"));
    }

    Ok((status, headers, Body::from_stream(delivery.stream)).into_response())
}

/// Body of a batch delete request.
#[derive(Debug, Deserialize)]
struct DeleteRequest {
    names: Vec<String>,
}

async fn files_delete(
    State(state): State<ServiceState>,
    Json(request): Json<DeleteRequest>,
) -> ApiResult<StatusCode> {
    if request.names.is_empty() {
        return Err(ApiError::BadRequest("no names provided".into()));
    }
    state
        .store
        .delete(&request.names, &state.tier_options)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn file_delete(
    State(state): State<ServiceState>,
    Path(name): Path<String>,
) -> ApiResult<StatusCode> {
    state
        .store
        .delete(std::slice::from_ref(&name), &state.tier_options)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn files_list(State(state): State<ServiceState>) -> ApiResult<Json<Vec<ObjectSummary>>> {
    Ok(Json(state.store.list().await?))
}

#[cfg(test)]
mod tests {
    use axum::body::to_bytes;
    use axum::http::Request;
    use filestore_service::remote::InMemoryRemote;
    use filestore_service::transform::{Encryption, TransformKeys};
    use filestore_service::{StoreConfig, TierOptions, TieredStore};
    use tower::ServiceExt;

    use super::*;

    const BUCKET: &str = "test-bucket";

    fn make_state(cache_dir: &std::path::Path) -> ServiceState {
        let store = TieredStore::new(StoreConfig {
            cache_dir: Some(cache_dir.into()),
            remote: Some(Box::new(InMemoryRemote::new(BUCKET))),
            bucket_folder: "files".into(),
            keys: TransformKeys::derive(Encryption::ChaCha20, "endpoint test secret"),
            multipart: Default::default(),
        });
        ServiceState {
            store,
            tier_options: TierOptions {
                use_local: true,
                use_remote: true,
                bucket: Some(BUCKET.into()),
            },
        }
    }

    fn upload_request(name: &str, content: &str) -> Request<Body> {
        let boundary = "test-boundary";
        let body = format!(
            "--{boundary}\r\n\
             Content-Disposition: form-data; name=\"file\"; filename=\"{name}\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n\
             {content}\r\n\
             --{boundary}--\r\n"
        );
        Request::builder()
            .method("POST")
            .uri(format!("/files/{name}"))
            .header(
                CONTENT_TYPE,
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn body_bytes(response: Response) -> Bytes {
        to_bytes(response.into_body(), usize::MAX).await.unwrap()
    }

    #[tokio::test]
    async fn upload_then_download_round_trips() {
        let tempdir = tempfile::tempdir().unwrap();
        let app = routes().with_state(make_state(tempdir.path()));

        let response = app
            .clone()
            .oneshot(upload_request("example.txt", "this is just an example"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/files/example.txt")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(CONTENT_TYPE).unwrap(),
            "text/plain"
        );
        assert_eq!(response.headers().get(CONTENT_LENGTH).unwrap(), "23");
        assert_eq!(body_bytes(response).await, "this is just an example");
    }

    #[tokio::test]
    async fn range_requests_yield_partial_content() {
        let tempdir = tempfile::tempdir().unwrap();
        let app = routes().with_state(make_state(tempdir.path()));

        let content = "0123456789".repeat(100); // 1000 bytes
        let response = app
            .clone()
            .oneshot(upload_request("ranged.txt", &content))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/files/ranged.txt")
                    .header(RANGE, "bytes=0-99")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(
            response.headers().get(CONTENT_RANGE).unwrap(),
            "bytes 0-99/1000"
        );
        assert_eq!(response.headers().get(ACCEPT_RANGES).unwrap(), "bytes");
        assert_eq!(response.headers().get(CONTENT_LENGTH).unwrap(), "100");
        assert_eq!(body_bytes(response).await, &content.as_bytes()[..100]);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/files/ranged.txt")
                    .header(RANGE, "bytes=500-1500")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::RANGE_NOT_SATISFIABLE);
    }

    #[tokio::test]
    async fn download_of_missing_file_is_404() {
        let tempdir = tempfile::tempdir().unwrap();
        let app = routes().with_state(make_state(tempdir.path()));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/files/missing.txt")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn upload_without_file_field_is_400() {
        let tempdir = tempfile::tempdir().unwrap();
        let app = routes().with_state(make_state(tempdir.path()));

        let boundary = "test-boundary";
        let body = format!(
            "--{boundary}\r\n\
             Content-Disposition: form-data; name=\"action\"\r\n\r\n\
             upload\r\n\
             --{boundary}--\r\n"
        );
        let request = Request::builder()
            .method("POST")
            .uri("/files/example.txt")
            .header(
                CONTENT_TYPE,
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(body))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn list_and_batch_delete() {
        let tempdir = tempfile::tempdir().unwrap();
        let app = routes().with_state(make_state(tempdir.path()));

        for name in ["a.txt", "b.txt"] {
            let response = app
                .clone()
                .oneshot(upload_request(name, "contents"))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::CREATED);
        }

        let response = app
            .clone()
            .oneshot(Request::builder().uri("/files").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let listing: Vec<serde_json::Value> =
            serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(listing.len(), 2);

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri("/files")
                    .header(CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"names": ["a.txt", "b.txt"]}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/files/a.txt")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
