//! HTTP server wiring for woahlife (API, handlers, sync worker, shared state).

/// HTTP error mapping for API handlers.
pub mod error;
/// HTTP handlers for entry, search, export, and event endpoints.
pub mod handlers;
/// Background change-log drain feeding the search index.
pub mod sync_worker;

pub use sync_worker::SyncWorker;
pub use woahlife_core::{
    config, db, maintenance, models, AppError, Config, Database, DEFAULT_PORT,
};

use axum::{
    extract::DefaultBodyLimit,
    http::header,
    routing::{get, post},
    Router,
};
use hyper::HeaderMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::Notify;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};
use woahlife_core::{
    EntryWriter, EnvelopeCipher, IndexSync, JournalStore, PayloadCipher, QueryPath, SearchIndex,
};

/// Request bodies may carry a full day of base64-encoded entries.
const BODY_LIMIT_FACTOR: usize = 4;

/// Shared state passed to HTTP handlers and the sync worker.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub store: Arc<dyn JournalStore>,
    pub config: Arc<Config>,
    pub cipher: Arc<dyn PayloadCipher>,
    pub writer: EntryWriter,
    pub sync: IndexSync,
    pub query: QueryPath,
    pub sync_notify: Arc<Notify>,
}

impl AppState {
    /// Construct shared application state with the configured master key reference.
    ///
    /// # Arguments
    /// - `config`: Loaded configuration.
    /// - `db`: Open database handle.
    pub fn new(config: Config, db: Database) -> Self {
        let cipher = Arc::new(EnvelopeCipher::from_reference(&config.master_key));
        Self::with_cipher(config, db, cipher)
    }

    /// Construct shared application state around an explicit cipher.
    ///
    /// # Arguments
    /// - `config`: Loaded configuration.
    /// - `db`: Open database handle.
    /// - `cipher`: Cipher used for encrypted entries on both write and sync paths.
    pub fn with_cipher(config: Config, db: Database, cipher: Arc<dyn PayloadCipher>) -> Self {
        let store: Arc<dyn JournalStore> = Arc::new(db.entries.clone());
        let index: Arc<dyn SearchIndex> = Arc::new(db.index.clone());
        let write_cipher = config.encrypt_entries.then(|| cipher.clone());
        Self {
            writer: EntryWriter::new(store.clone(), write_cipher, config.max_entry_size),
            store,
            sync: IndexSync::new(index.clone(), cipher.clone(), config.max_document_bytes),
            query: QueryPath::new(index),
            sync_notify: Arc::new(Notify::new()),
            db: Arc::new(db),
            config: Arc::new(config),
            cipher,
        }
    }
}

/// Create the application router with all routes and middleware.
///
/// # Arguments
/// - `state`: Shared application state.
/// - `allow_public_access`: Whether to allow cross-origin requests from any origin.
///
/// # Panics
/// Panics if static header values fail to parse (should not happen).
pub fn create_app(state: AppState, allow_public_access: bool) -> Router {
    let cors_port = state.config.port;
    create_app_with_cors_port(state, allow_public_access, cors_port)
}

/// Resolve the listener address from env var overrides and security policy.
///
/// # Returns
/// A validated socket address that enforces loopback when public access is disabled.
pub fn resolve_bind_address(config: &Config, allow_public_access: bool) -> SocketAddr {
    let default_bind = SocketAddr::from(([127, 0, 0, 1], config.port));
    let requested = match std::env::var("BIND") {
        Ok(value) => match value.trim().parse::<SocketAddr>() {
            Ok(addr) => addr,
            Err(err) => {
                tracing::warn!(
                    "Invalid BIND='{}': {}. Falling back to {}",
                    value,
                    err,
                    default_bind
                );
                default_bind
            }
        },
        Err(_) => default_bind,
    };

    if allow_public_access || requested.ip().is_loopback() {
        return requested;
    }

    tracing::warn!(
        "Non-loopback bind {} requested without ALLOW_PUBLIC_ACCESS; forcing 127.0.0.1",
        requested
    );
    SocketAddr::from(([127, 0, 0, 1], requested.port()))
}

fn request_body_limit(config: &Config) -> usize {
    config
        .max_entry_size
        .max(config.max_document_bytes)
        .saturating_mul(BODY_LIMIT_FACTOR)
}

fn create_app_with_cors_port(state: AppState, allow_public_access: bool, cors_port: u16) -> Router {
    let mut default_headers = HeaderMap::new();
    default_headers.insert(header::X_CONTENT_TYPE_OPTIONS, "nosniff".parse().unwrap());
    default_headers.insert(header::X_FRAME_OPTIONS, "DENY".parse().unwrap());
    default_headers.insert(
        header::CONTENT_SECURITY_POLICY,
        "default-src 'none'; frame-ancestors 'none'; base-uri 'none'"
            .parse()
            .unwrap(),
    );

    let methods = [axum::http::Method::GET, axum::http::Method::POST];
    let cors = if allow_public_access {
        CorsLayer::new()
            .allow_origin(tower_http::cors::Any)
            .allow_methods(methods)
            .allow_headers(tower_http::cors::Any)
    } else {
        CorsLayer::new()
            .allow_origin([
                format!("http://localhost:{}", cors_port).parse().unwrap(),
                format!("http://127.0.0.1:{}", cors_port).parse().unwrap(),
            ])
            .allow_methods(methods)
            .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
    };

    let body_limit = request_body_limit(&state.config);
    Router::new()
        .route("/api/entries", post(handlers::entry::create_entry))
        .route("/api/entries/:id", get(handlers::entry::get_entry))
        .route("/api/search", get(handlers::entry::search_entries))
        .route("/api/export/:year", get(handlers::entry::export_year))
        .route("/api/events", post(handlers::event::ingest_event))
        .with_state(state)
        .layer(
            tower::ServiceBuilder::new()
                .layer(DefaultBodyLimit::max(body_limit))
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(cors)
                .layer(SetResponseHeaderLayer::overriding(
                    header::CONTENT_SECURITY_POLICY,
                    default_headers
                        .get(header::CONTENT_SECURITY_POLICY)
                        .unwrap()
                        .clone(),
                ))
                .layer(SetResponseHeaderLayer::overriding(
                    header::X_CONTENT_TYPE_OPTIONS,
                    default_headers
                        .get(header::X_CONTENT_TYPE_OPTIONS)
                        .unwrap()
                        .clone(),
                ))
                .layer(SetResponseHeaderLayer::overriding(
                    header::X_FRAME_OPTIONS,
                    default_headers
                        .get(header::X_FRAME_OPTIONS)
                        .unwrap()
                        .clone(),
                )),
        )
}

fn listener_cors_port(listener: &tokio::net::TcpListener, fallback_port: u16) -> u16 {
    listener
        .local_addr()
        .map(|addr| addr.port())
        .unwrap_or(fallback_port)
}

/// Run the Axum server with graceful shutdown support.
///
/// # Errors
/// Returns any I/O error produced by `axum::serve`.
pub async fn serve_router(
    listener: tokio::net::TcpListener,
    state: AppState,
    allow_public_access: bool,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<(), std::io::Error> {
    let cors_port = listener_cors_port(&listener, state.config.port);
    let app = create_app_with_cors_port(state, allow_public_access, cors_port);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await
}

#[cfg(test)]
mod tests {
    use super::{listener_cors_port, request_body_limit, resolve_bind_address};
    use std::net::SocketAddr;
    use woahlife_core::env::{env_lock, EnvGuard};
    use woahlife_core::{Config, DEFAULT_PORT};

    fn config_on_port(port: u16) -> Config {
        Config {
            port,
            ..Config::with_db_path("/tmp/woahlife-db")
        }
    }

    #[tokio::test]
    async fn listener_cors_port_uses_bound_listener_port() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("listener");
        let expected = listener.local_addr().expect("listener addr").port();
        assert_eq!(listener_cors_port(&listener, DEFAULT_PORT), expected);
    }

    #[test]
    fn resolve_bind_address_enforces_loopback_when_public_access_disabled() {
        let _lock = env_lock().lock().expect("env lock");
        let _bind = EnvGuard::set("BIND", "0.0.0.0:4040");
        let resolved = resolve_bind_address(&config_on_port(4040), false);
        assert_eq!(resolved, SocketAddr::from(([127, 0, 0, 1], 4040)));

        let public = resolve_bind_address(&config_on_port(4040), true);
        assert_eq!(public, SocketAddr::from(([0, 0, 0, 0], 4040)));
    }

    #[test]
    fn resolve_bind_address_falls_back_on_invalid_override() {
        let _lock = env_lock().lock().expect("env lock");
        let _bind = EnvGuard::set("BIND", "bad:host");
        let fallback = resolve_bind_address(&config_on_port(4041), false);
        assert_eq!(fallback, SocketAddr::from(([127, 0, 0, 1], 4041)));
    }

    #[test]
    fn body_limit_covers_the_larger_size_ceiling() {
        let config = Config {
            max_entry_size: 100,
            max_document_bytes: 10_000,
            ..Config::with_db_path("/tmp/woahlife-db")
        };
        assert_eq!(request_body_limit(&config), 40_000);
    }
}
