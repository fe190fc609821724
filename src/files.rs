//! Handlers for namespace listing, file fetch, upload, and deletion.

use axum::extract::{Extension, Multipart, Path};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Json as JsonResponse, Response};
use tracing::info;

use crate::access::Capability;
use crate::error::ApiError;
use crate::storage::{SharedStorage, Stats, StorageError};

/// Capability attached by the access middleware; a request that never passed
/// through it gets no access at all.
fn capability(ext: Option<Extension<Capability>>) -> Capability {
    ext.map(|Extension(capability)| capability)
        .unwrap_or_default()
}

/// GET /{ns} — lists files in the namespace.
pub async fn list_namespace(
    Path(ns): Path<String>,
    capability_ext: Option<Extension<Capability>>,
    Extension(storage): Extension<SharedStorage>,
) -> Result<JsonResponse<Stats>, ApiError> {
    if !capability(capability_ext).read {
        return Err(ApiError::Forbidden);
    }

    let stats = storage.stat(&ns).await.map_err(|_| ApiError::NotFound)?;
    info!(ns, count = stats.files.len(), "list namespace");
    Ok(JsonResponse(stats))
}

/// GET /{ns}/{file} — returns the raw file content.
pub async fn fetch_file(
    Path((ns, file)): Path<(String, String)>,
    capability_ext: Option<Extension<Capability>>,
    Extension(storage): Extension<SharedStorage>,
) -> Result<Response, ApiError> {
    if !capability(capability_ext).read {
        return Err(ApiError::Forbidden);
    }

    let (bytes, mime) = storage
        .fetch(&ns, &file)
        .await
        .map_err(|_| ApiError::NotFound)?;
    let mime = mime.unwrap_or_else(|| {
        mime_guess::from_path(&file)
            .first_or_octet_stream()
            .essence_str()
            .to_string()
    });

    info!(ns, file, size = bytes.len(), "fetch file");
    Ok(([(header::CONTENT_TYPE, mime)], bytes).into_response())
}

/// POST /{ns}/{file} — stores the multipart form field named `file`.
pub async fn upload_file(
    Path((ns, file)): Path<(String, String)>,
    capability_ext: Option<Extension<Capability>>,
    Extension(storage): Extension<SharedStorage>,
    mut multipart: Multipart,
) -> Result<StatusCode, ApiError> {
    if !capability(capability_ext).write {
        return Err(ApiError::Forbidden);
    }
    if ns.is_empty() || file.is_empty() {
        return Err(ApiError::BadRequest(
            "namespace and filename are required".into(),
        ));
    }

    let bytes = loop {
        let field = multipart
            .next_field()
            .await
            .map_err(|err| ApiError::BadRequest(format!("malformed multipart body: {err}")))?;
        let Some(field) = field else {
            return Err(ApiError::BadRequest(
                "file must be present as a form field named 'file'".into(),
            ));
        };
        if field.name() == Some("file") {
            // A client disconnect mid-upload surfaces here; nothing has been
            // written yet, so the operation just fails.
            break field
                .bytes()
                .await
                .map_err(|err| ApiError::Internal(format!("failed to read upload: {err}")))?;
        }
    };

    match storage.upload(&ns, &file, &bytes).await {
        Ok(()) => {
            info!(ns, file, size = bytes.len(), "upload file");
            Ok(StatusCode::OK)
        }
        Err(StorageError::TooLarge { limit, size }) => Err(ApiError::TooLarge { limit, size }),
        Err(StorageError::InvalidName) => Err(ApiError::BadRequest(
            "invalid namespace or file name".into(),
        )),
        Err(err) => Err(ApiError::Internal(err.to_string())),
    }
}

/// DELETE /{ns}/{file} — removes one file.
pub async fn delete_file(
    Path((ns, file)): Path<(String, String)>,
    capability_ext: Option<Extension<Capability>>,
    Extension(storage): Extension<SharedStorage>,
) -> Result<StatusCode, ApiError> {
    if !capability(capability_ext).write {
        return Err(ApiError::Forbidden);
    }

    storage
        .delete(&ns, &file)
        .await
        .map_err(|_| ApiError::NotFound)?;
    info!(ns, file, "delete file");
    Ok(StatusCode::OK)
}

/// DELETE /{ns} — removes the namespace and all its contents.
pub async fn delete_namespace(
    Path(ns): Path<String>,
    capability_ext: Option<Extension<Capability>>,
    Extension(storage): Extension<SharedStorage>,
) -> Result<StatusCode, ApiError> {
    if !capability(capability_ext).write {
        return Err(ApiError::Forbidden);
    }

    storage
        .delete_namespace(&ns)
        .await
        .map_err(|_| ApiError::NotFound)?;
    info!(ns, "delete namespace");
    Ok(StatusCode::OK)
}
