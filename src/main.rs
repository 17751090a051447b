use actix_web::{web, App, HttpServer, middleware::Compress};
use actix_cors::Cors;
use utoipa_swagger_ui::SwaggerUi;

mod accounts;
mod admin;
mod auth;
mod error;
mod models;
mod openapi;
mod ownership;
mod rate_limit;
mod repo;
mod routes;
mod security;

#[cfg(feature = "inmem-store")]
use repo::inmem::InMemRepo;
use routes::{config, AppState};
use security::SecurityHeaders;
use openapi::ApiDoc;
use utoipa::OpenApi; // bring trait into scope for ApiDoc::openapi()
use rate_limit::{InMemoryRateLimiter, RateLimitConfig, RateLimiterFacade};
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;
use tracing_actix_web::TracingLogger;

/// JSON bodies carry inline base64 photos; leave headroom above the 10 MB
/// decoded photo cap.
const JSON_BODY_LIMIT: usize = 16 * 1024 * 1024;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Environment variables must be set externally (shell, systemd, Docker, etc.)
    // Load .env automatically only in debug builds to reduce manual setup overhead.
    if cfg!(debug_assertions) {
        let _ = dotenv::dotenv();
    }

    // Validate required environment variables
    validate_env_vars();

    // Structured logging initialisation
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .init();

    info!("Bootstrapping Lost & Found registry server");
    info!(
        "Frontend URL: {}",
        std::env::var("FRONTEND_URL").unwrap_or_else(|_| "http://localhost:5173".to_string())
    );

    #[cfg(all(feature = "inmem-store", not(feature = "postgres-store")))]
    let repo = InMemRepo::new();
    #[cfg(all(feature = "inmem-store", not(feature = "postgres-store")))]
    info!("Using in-memory repository backend");

    #[cfg(feature = "postgres-store")]
    let repo = {
        use sqlx::postgres::PgPoolOptions;
        let db_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for postgres-store");
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect_lazy(&db_url)
            .expect("Failed to create Pg pool");
        info!("Using Postgres repository backend");
        repo::pg::PgRepo::new(pool)
    };

    // Admin account must exist before the first admin-login
    if let Err(e) = admin::ensure_admin_seed(&repo).await {
        eprintln!("Failed to seed admin account: {e}");
        std::process::exit(1);
    }

    let openapi = ApiDoc::openapi();
    info!("OpenAPI spec generated");

    let rate_limiter = {
        let enabled = std::env::var("LAF_RL_ENABLED")
            .map(|v| v != "0" && !v.eq_ignore_ascii_case("false"))
            .unwrap_or(true);
        RateLimiterFacade::new(InMemoryRateLimiter::new(enabled), RateLimitConfig::from_env())
    };

    let server = HttpServer::new(move || {
        let cors = {
            let mut c = Cors::default()
                // during local dev allow React/Vite default ports
                .allowed_origin("http://localhost:5173")
                .allowed_origin("http://127.0.0.1:5173")
                // containerized nginx frontend (served on 3000)
                .allowed_origin("http://localhost:3000")
                .allowed_origin("http://127.0.0.1:3000")
                .allow_any_header()
                .allowed_methods(["GET", "POST", "PUT", "DELETE", "OPTIONS"])
                .supports_credentials()
                .max_age(3600);
            // If FRONTEND_URL env var is provided and not already covered, add it.
            if let Ok(front) = std::env::var("FRONTEND_URL") {
                c = c.allowed_origin(&front);
            }
            c
        };

        App::new()
            .wrap(TracingLogger::default())
            .wrap(Compress::default())
            .wrap(SecurityHeaders::from_env())
            .wrap(cors)
            .app_data(web::JsonConfig::default().limit(JSON_BODY_LIMIT))
            .app_data(web::Data::new(AppState {
                repo: Arc::new(repo.clone()),
                rate_limiter: Some(rate_limiter.clone()),
            }))
            .configure(config)
            .service(SwaggerUi::new("/docs/{_:.*}").url("/docs/openapi.json", openapi.clone()))
    })
    .bind(("0.0.0.0", 9090))?;

    info!("Listening on http://0.0.0.0:9090 (all interfaces)");

    server.run().await
}

/// Validate that required environment variables are set
fn validate_env_vars() {
    use std::env;

    let required = vec!["JWT_SECRET"];

    let mut missing = Vec::new();
    for var in required {
        if env::var(var).is_err() {
            missing.push(var);
        }
    }

    if !missing.is_empty() {
        eprintln!("Missing required environment variables: {:?}", missing);
        eprintln!("Please copy .env.example to .env and configure it");
        std::process::exit(1);
    }

    // Validate JWT_SECRET is sufficiently long
    if let Ok(secret) = env::var("JWT_SECRET") {
        if secret.len() < 32 {
            eprintln!("JWT_SECRET must be at least 32 characters long for security");
            std::process::exit(1);
        }
    }
}
