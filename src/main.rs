//! nsfs server binary.
//!
//! This crate wires together the storage backend, the namespace authorization
//! client, the access middleware, and the HTTP route table. The main entry
//! point builds the axum router and serves it until shutdown.

mod access;
mod app;
mod atomic;
mod authz;
mod config;
mod error;
mod files;
mod http;
mod localfs;
mod logging;
mod storage;

use axum::Router;
use axum::extract::connect_info::ConnectInfo;
use axum::http::Request;
use clap::Parser;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tower_http::trace::{DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::{Level, info, info_span};

use crate::authz::{HttpNamespaceRegistry, NamespaceRegistry};
use crate::config::Args;
use crate::localfs::LocalStorage;
use crate::storage::{SharedStorage, Storage};

/// Starts the nsfs server and blocks until shutdown.
#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    logging::init_logging();

    let args = Args::parse();
    let mut local = LocalStorage::new(PathBuf::from(&args.storage_dir));
    local.set_limit(args.upload_max_size);
    local.ensure_root().await?;
    let storage: SharedStorage = Arc::new(local);

    let registry: Arc<dyn NamespaceRegistry> = Arc::new(
        HttpNamespaceRegistry::connect(&args.registry_addr)
            .await
            .map_err(|err| std::io::Error::other(err.to_string()))?,
    );

    let app: Router = app::build_app(storage, registry, args.cors_origins.as_deref()).layer(
        TraceLayer::new_for_http()
            .make_span_with(|request: &Request<_>| {
                let client_ip = request
                    .extensions()
                    .get::<ConnectInfo<SocketAddr>>()
                    .map(|ConnectInfo(addr)| addr.to_string())
                    .unwrap_or_else(|| "unknown".to_string());

                info_span!(
                    env!("CARGO_CRATE_NAME"),
                    client_ip,
                    method = ?request.method(),
                    path = ?request.uri().path(),
                )
            })
            .on_request(DefaultOnRequest::new().level(Level::DEBUG))
            .on_response(DefaultOnResponse::new().level(Level::DEBUG)),
    );

    let host = args
        .host
        .parse::<IpAddr>()
        .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidInput, err.to_string()))?;
    let addr = SocketAddr::new(host, args.port);

    info!(%addr, storage_dir = args.storage_dir, "starting HTTP file server");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("received termination signal, shutting down");
}
