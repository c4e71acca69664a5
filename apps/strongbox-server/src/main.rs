//! Strongbox S3 Server - self-hosted S3-compatible object store.
//!
//! This binary wires together the metadata store, the filesystem object
//! store, the api-key cache, and `strongbox-http`'s hyper service into a
//! single S3-compatible server process.
//!
//! # Usage
//!
//! ```text
//! STRONGBOX_LISTEN=0.0.0.0:9000 strongbox-server
//! ```
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `STRONGBOX_LISTEN` | `0.0.0.0:9000` | Bind address |
//! | `STRONGBOX_DATA_DIR` | `/var/lib/strongbox` | Bucket data + database directory |
//! | `STRONGBOX_DATABASE_PATH` | `metadata.db` | Metadata database file, relative to the data dir unless absolute |
//! | `STRONGBOX_LOG_LEVEL` | `info` | Log level filter |
//! | `RUST_LOG` | *(unset)* | Fine-grained tracing filter (overrides `STRONGBOX_LOG_LEVEL`) |
//!
//! The S3 protocol's runtime-changeable settings (region, admin account)
//! live in the metadata store's `settings` table and are seeded on first
//! run rather than read from the environment — see `strongbox_metadata::settings`.

mod handler;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as HttpConnBuilder;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use strongbox_auth::CredentialProvider;
use strongbox_auth::permission::{ApiKeyCache, ApiKeyEntry, PermissionEntry};
use strongbox_core::StrongboxConfig;
use strongbox_http::dispatch::S3Handler;
use strongbox_http::service::{S3HttpConfig, S3HttpService};
use strongbox_metadata::MetadataStore;
use strongbox_store::FileStore;

use crate::handler::StrongboxHandler;

/// Server version reported in health check responses.
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The `server.region` setting key, seeded on first run if absent.
const SETTING_SERVER_REGION: &str = "server.region";
/// Default region seeded into a fresh installation's settings table.
const DEFAULT_REGION: &str = "us-east-1";
/// Virtual-hosted-style addressing domain. Not a runtime setting: Strongbox
/// is addressed path-style by every documented client, so this only matters
/// for callers that happen to send a `Host: <bucket>.<domain>` header.
const DEFAULT_DOMAIN: &str = "s3.localhost";

/// Initialize the tracing subscriber.
///
/// Uses `RUST_LOG` if set, otherwise falls back to the `STRONGBOX_LOG_LEVEL` config value.
fn init_tracing(log_level: &str) -> Result<()> {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::try_new(log_level).with_context(|| format!("invalid log level filter: {log_level}"))?
    };

    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).init();

    Ok(())
}

/// Load every enabled api key and its permission grants from the metadata
/// store and hand them to the cache. Mirrors the mapping the admin core
/// does privately after any api-key mutation; this is the bootstrap case.
fn reload_api_key_cache(metadata: &MetadataStore, cache: &ApiKeyCache) -> Result<()> {
    let loaded = metadata.load_all_api_keys_with_permissions().context("loading api keys for cache warmup")?;
    let entries = loaded
        .into_iter()
        .map(|(key, permissions)| ApiKeyEntry {
            access_key_id: key.access_key_id,
            secret_access_key: key.secret_access_key,
            enabled: key.enabled,
            permissions: permissions
                .into_iter()
                .map(|p| PermissionEntry { bucket_name: p.bucket_name, can_read: p.can_read, can_write: p.can_write })
                .collect(),
        })
        .collect();
    cache.reload(entries);
    Ok(())
}

/// Read the region this server advertises for SigV4 verification, seeding
/// the default into the settings table the first time it is missing.
fn resolve_region(metadata: &MetadataStore) -> Result<String> {
    if let Some(region) = metadata.get_setting(SETTING_SERVER_REGION).context("reading server.region setting")? {
        return Ok(region);
    }
    metadata.set_setting(SETTING_SERVER_REGION, DEFAULT_REGION).context("seeding server.region setting")?;
    Ok(DEFAULT_REGION.to_owned())
}

/// Run the accept loop, serving connections until a shutdown signal is received.
async fn serve<H: S3Handler>(listener: TcpListener, service: S3HttpService<H>) -> Result<()> {
    let graceful = hyper_util::server::graceful::GracefulShutdown::new();
    let http = HttpConnBuilder::new(TokioExecutor::new());

    let shutdown = async {
        tokio::signal::ctrl_c().await.ok();
        info!("received shutdown signal, draining connections");
    };

    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = listener.accept() => {
                let (stream, peer_addr) = match result {
                    Ok(conn) => conn,
                    Err(e) => {
                        warn!(error = %e, "failed to accept connection");
                        continue;
                    }
                };

                let svc = service.clone();
                let conn = http.serve_connection(TokioIo::new(stream), svc);
                let conn = graceful.watch(conn.into_owned());

                tokio::spawn(async move {
                    if let Err(e) = conn.await {
                        error!(peer_addr = %peer_addr, error = %e, "connection error");
                    }
                });
            }

            () = &mut shutdown => {
                info!("shutting down gracefully");
                break;
            }
        }
    }

    // Wait for in-flight requests to complete.
    graceful.shutdown().await;
    info!("all connections drained, exiting");

    Ok(())
}

/// Perform a health check by connecting to the server and requesting the health endpoint.
///
/// Exits with code 0 if healthy, 1 otherwise.
async fn run_health_check(addr: &str) -> Result<()> {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    let stream = TcpStream::connect(addr).await.with_context(|| format!("cannot connect to {addr}"))?;

    let (mut reader, mut writer) = stream.into_split();

    let request = format!("GET /_localstack/health HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\r\n");
    writer.write_all(request.as_bytes()).await?;
    writer.shutdown().await?;

    let mut response = String::new();
    reader.read_to_string(&mut response).await?;

    if response.contains("200 OK") && response.contains("\"status\":\"running\"") {
        Ok(())
    } else {
        anyhow::bail!("unhealthy response from {addr}")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = StrongboxConfig::from_env();

    // Handle --health-check flag for Docker HEALTHCHECK.
    if std::env::args().any(|a| a == "--health-check") {
        let addr = config.listen.replace("0.0.0.0", "127.0.0.1");
        let healthy = run_health_check(&addr).await.is_ok();
        std::process::exit(i32::from(!healthy));
    }

    init_tracing(&config.log_level)?;

    info!(
        listen = %config.listen,
        data_dir = %config.data_dir,
        version = VERSION,
        "starting Strongbox S3 Server",
    );

    tokio::fs::create_dir_all(&config.data_dir)
        .await
        .with_context(|| format!("failed to create data directory {}", config.data_dir))?;

    let metadata = MetadataStore::open(&config.resolved_database_path())
        .with_context(|| format!("failed to open metadata store at {}", config.resolved_database_path().display()))?;
    let store = FileStore::new(&config.data_dir);

    let api_key_cache = Arc::new(ApiKeyCache::new());
    reload_api_key_cache(&metadata, &api_key_cache)?;

    let region = resolve_region(&metadata)?;

    let handler = StrongboxHandler::new(metadata, store, Arc::clone(&api_key_cache));
    let http_config = S3HttpConfig {
        domain: DEFAULT_DOMAIN.to_owned(),
        virtual_hosting: true,
        skip_signature_validation: false,
        region,
        credential_provider: Some(api_key_cache as Arc<dyn CredentialProvider>),
    };
    let service = S3HttpService::new(handler, http_config);

    let addr: SocketAddr = config.listen.parse().with_context(|| format!("invalid bind address: {}", config.listen))?;

    let listener = TcpListener::bind(addr).await.with_context(|| format!("failed to bind to {addr}"))?;

    info!(%addr, "listening for connections");

    serve(listener, service).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_resolve_region_and_seed_default_on_first_run() {
        let metadata = MetadataStore::open_with_read_pool_size(std::path::Path::new(":memory:"), 1).unwrap();
        let region = resolve_region(&metadata).unwrap();
        assert_eq!(region, DEFAULT_REGION);
        assert_eq!(metadata.get_setting(SETTING_SERVER_REGION).unwrap().as_deref(), Some(DEFAULT_REGION));
    }

    #[test]
    fn test_should_respect_an_already_seeded_region() {
        let metadata = MetadataStore::open_with_read_pool_size(std::path::Path::new(":memory:"), 1).unwrap();
        metadata.set_setting(SETTING_SERVER_REGION, "eu-central-1").unwrap();
        assert_eq!(resolve_region(&metadata).unwrap(), "eu-central-1");
    }

    #[test]
    fn test_should_reload_cache_with_no_keys_without_error() {
        let metadata = MetadataStore::open_with_read_pool_size(std::path::Path::new(":memory:"), 1).unwrap();
        let cache = ApiKeyCache::new();
        reload_api_key_cache(&metadata, &cache).unwrap();
    }
}
