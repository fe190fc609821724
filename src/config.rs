//! CLI arguments and server configuration defaults.

use clap::Parser;

pub const DEFAULT_STORAGE_DIR: &str = "static";
pub const REGISTRY_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const REGISTRY_REQUEST_TIMEOUT_SECS: u64 = 5;

/// CLI arguments and environment configuration for the server.
#[derive(Parser, Debug)]
#[command(name = "nsfs", version, about = "Namespaced HTTP file server")]
pub struct Args {
    #[arg(
        short = 'b',
        long,
        env = "NSFS_BIND",
        default_value = "0.0.0.0",
        help = "Bind address"
    )]
    pub host: String,
    #[arg(
        short = 'p',
        long,
        env = "NSFS_PORT",
        default_value_t = 8000,
        help = "Listen port"
    )]
    pub port: u16,
    #[arg(
        short = 's',
        long,
        env = "NSFS_STORAGE_DIR",
        default_value = DEFAULT_STORAGE_DIR,
        help = "Root directory for namespace storage"
    )]
    pub storage_dir: String,
    #[arg(
        long,
        env = "NSFS_REGISTRY_ADDR",
        help = "Base URL of the namespace authorization service"
    )]
    pub registry_addr: String,
    #[arg(
        long,
        env = "NSFS_UPLOAD_MAX_SIZE",
        default_value_t = 0,
        help = "Max upload size in bytes (0 to disable)"
    )]
    pub upload_max_size: u64,
    #[arg(long, env = "NSFS_CORS_ORIGINS", help = "Comma separated CORS origins")]
    pub cors_origins: Option<String>,
}
