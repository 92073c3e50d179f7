use crate::{
    password::PasswordHasher,
    store::{MemoryStore, PgStore, SessionStore, UserStore},
};
use anyhow::{Context, Result};
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{HeaderName, HeaderValue, Request},
    middleware,
    routing::{get, post},
    Extension, Router,
};
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, services::ServeDir, set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{info, info_span, Span};
use ulid::Ulid;

pub mod h5p;
pub mod handlers;
pub mod state;
mod views;

pub use state::{AppConfig, AppState};

use handlers::{
    auth::{self, require_authenticated, require_not_authenticated},
    health, registration, root,
};

/// Where users and sessions live.
#[derive(Clone, Debug)]
pub enum Storage {
    Postgres(String),
    Memory,
}

/// Build the application router.
pub fn router(state: Arc<AppState>) -> Router {
    let config = state.config();

    let guest = Router::new()
        .route(
            "/registration",
            get(registration::registration_form).post(registration::register),
        )
        .route("/login", get(auth::login::login_form).post(auth::login::login))
        .route_layer(middleware::from_fn(require_not_authenticated));

    let member = Router::new()
        .route(
            "/logout",
            post(auth::login::logout).delete(auth::login::logout),
        )
        .route_layer(middleware::from_fn(require_authenticated));

    Router::new()
        .route("/", get(root::index))
        .route("/demo", get(root::demo))
        .route("/health", get(health::health).head(health::health))
        .merge(guest)
        .merge(member)
        // Mounted as a service so both `{base}` and `{base}/` reach its root route.
        .nest_service(config.h5p_base_url(), h5p::router(config))
        .nest_service("/public", ServeDir::new(config.public_path()))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(Extension(state.clone())),
        )
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(
    port: u16,
    storage: Storage,
    config: AppConfig,
    bcrypt_cost: u32,
) -> Result<()> {
    let (users, sessions): (Arc<dyn UserStore>, Arc<dyn SessionStore>) = match storage {
        Storage::Postgres(dsn) => {
            // Connect to database
            let pool = PgPoolOptions::new()
                .min_connections(1)
                .max_connections(5)
                .max_lifetime(Duration::from_secs(60 * 2))
                .test_before_acquire(true)
                .connect(&dsn)
                .await
                .context("Failed to connect to database")?;

            let store = Arc::new(PgStore::new(pool));
            store.apply_schema().await?;
            let users: Arc<dyn UserStore> = store.clone();
            let sessions: Arc<dyn SessionStore> = store;
            (users, sessions)
        }
        Storage::Memory => {
            info!("Using in-memory storage, data is lost on shutdown");
            let store = Arc::new(MemoryStore::new());
            let users: Arc<dyn UserStore> = store.clone();
            let sessions: Arc<dyn SessionStore> = store;
            (users, sessions)
        }
    };

    // The salt is generated once and shared by every request.
    let hasher = PasswordHasher::generate(bcrypt_cost)?;

    let state = Arc::new(AppState::new(config, hasher, users, sessions));
    let app = router(state);

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for ctrl-c: {err}");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!("Failed to listen for SIGTERM: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Gracefully shutdown");
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}
