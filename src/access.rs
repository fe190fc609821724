//! Access-control middleware: resolves a per-request capability from the
//! bearer token and the namespace registry, and attaches it to the request.

use axum::extract::{Extension, Request};
use axum::http::header;
use axum::middleware::Next;
use axum::response::Response;
use percent_encoding::percent_decode_str;
use std::sync::Arc;
use tracing::debug;

use crate::authz::{AccessLevel, NamespaceRegistry};
use crate::error::ApiError;

/// Per-request read/write permission pair. Never persisted or shared across
/// requests.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Capability {
    pub read: bool,
    pub write: bool,
}

/// Derives the capability for one request and stores it in the request
/// extensions for the handlers.
///
/// Without a token, individual files are readable but the namespace overview
/// is not, and nothing is writable. With a token the registry decides: a
/// level below `READ` (or no record at all) is forbidden outright, `READ` and
/// up grants read, `ADMIN` and up additionally grants write.
pub async fn access_middleware(
    Extension(registry): Extension<Arc<dyn NamespaceRegistry>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let bearer = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("")
        .to_string();
    // Route shapes are /{ns} and /{ns}/{file}, so the first path segment is
    // the namespace and a second one means the request addresses a file.
    // The raw URI is still percent-encoded; the handlers see decoded path
    // params, so the namespace must be decoded here as well or the registry
    // would be asked about a different string than the resource accessed.
    let (ns, file_scoped) = {
        let mut segments = req
            .uri()
            .path()
            .trim_start_matches('/')
            .split('/')
            .filter(|segment| !segment.is_empty());
        let ns = segments.next().map(str::to_string);
        (ns, segments.next().is_some())
    };
    let ns = match ns {
        Some(raw) => match percent_decode_str(&raw).decode_utf8() {
            Ok(decoded) => Some(decoded.into_owned()),
            Err(_) => {
                return Err(ApiError::BadRequest(
                    "invalid percent-encoding in path".into(),
                ));
            }
        },
        None => None,
    };
    debug!(ns = ns.as_deref(), file_scoped, unauthorized = bearer.is_empty(), "resolving access");

    // Files are public by default; the namespace overview is not.
    let mut capability = Capability {
        read: file_scoped,
        write: false,
    };

    if bearer.is_empty() {
        req.extensions_mut().insert(capability);
        return Ok(next.run(req).await);
    }

    let Some(ns) = ns else {
        return Err(ApiError::BadRequest("namespace is required".into()));
    };

    match registry.get(&ns, &bearer).await? {
        Some(level) if level >= AccessLevel::READ => {
            capability.read = true;
            capability.write = level >= AccessLevel::ADMIN;
        }
        _ => return Err(ApiError::Forbidden),
    }

    req.extensions_mut().insert(capability);
    Ok(next.run(req).await)
}
