use recipe_suggest::cohere_client::{ChatModel, CohereClient};
use recipe_suggest::config::AppConfig;
use recipe_suggest::services::{PgRecipeStore, PgUsageStore};
use recipe_suggest::{app, db, AppState};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    init_logging()?;

    let config = AppConfig::from_env()?;

    let db_pool = db::create_pool(&config.database).await?;
    tracing::info!(max_connections = config.database.max_connections, "database pool ready");

    // Generation endpoints answer 500 until a key is configured
    let chat_model: Option<Arc<dyn ChatModel>> = match config.cohere.api_key.clone() {
        Some(api_key) => {
            let client = CohereClient::new(api_key, &config.cohere);
            tracing::info!(model = %client.model(), "Cohere chat client initialized");
            Some(Arc::new(client) as Arc<dyn ChatModel>)
        }
        None => {
            tracing::warn!("COHERE_API_KEY not found. Recipe generation and search are disabled.");
            None
        }
    };

    let shared_state = Arc::new(AppState::new(
        Arc::new(PgRecipeStore::new(db_pool.clone())),
        Arc::new(PgUsageStore::new(db_pool.clone())),
        chat_model,
        config.limits,
    ));

    tracing::info!(
        recipe_limit = config.limits.recipe,
        search_limit = config.limits.recipe_search,
        "daily usage limits"
    );

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(
        listener,
        app(shared_state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    db_pool.close().await;
    tracing::info!("server stopped");
    Ok(())
}

fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cfg!(debug_assertions) {
            "debug,recipe_suggest=trace,sqlx=info,reqwest=info,hyper=info,tower=info".to_string()
        } else {
            "info,recipe_suggest=info,sqlx=warn,reqwest=warn,hyper=warn,tower=warn".to_string()
        }
    });

    let env_filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&log_level))?;

    // JSON for log aggregation, human-readable otherwise
    let fmt_layer = if std::env::var("LOG_FORMAT").as_deref() == Ok("json") {
        fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .with_target(true)
            .boxed()
    } else {
        fmt::layer()
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;

    tracing::info!("recipe_suggest starting up");
    tracing::info!("Version: {}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        "Build mode: {}",
        if cfg!(debug_assertions) { "development" } else { "production" }
    );
    tracing::info!("Log level: {}", log_level);

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
