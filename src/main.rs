use axum::http::{header, HeaderValue, Method};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use chatllm_backend::config::Settings;
use chatllm_backend::state::AppState;

fn build_app(state: AppState) -> axum::Router {
    // CORS -- the configured frontend origin only
    let mut cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .max_age(std::time::Duration::from_secs(86_400));
    if let Some(front_url) = state.settings.front_url.as_deref() {
        match front_url.parse::<HeaderValue>() {
            Ok(origin) => cors = cors.allow_origin(origin),
            Err(e) => tracing::warn!("Ignoring invalid FRONT_URL '{}': {}", front_url, e),
        }
    }

    chatllm_backend::create_router(state)
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                    )
                })
        )
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    use tracing_subscriber::EnvFilter;

    dotenvy::dotenv().ok();

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    if std::env::var("RUST_LOG_FORMAT").as_deref() == Ok("json") {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .init();
    }

    let settings = Settings::from_env()?;
    let port = settings.port;
    let app_name = settings.app_name.clone();

    // ── Non-blocking startup: MCP handshake runs in the background ──
    let state = AppState::new(settings)?;

    let startup_state = state.clone();
    tokio::spawn(async move {
        match startup_state.mcp.wait_ready().await {
            Ok(()) => {
                if let Err(e) = startup_state.refresh_tools().await {
                    tracing::error!("startup: tool registry refresh failed: {}", e);
                }
            }
            Err(e) => tracing::error!(
                "startup: MCP session not ready ({}) -- serving without tools",
                e
            ),
        }
    });

    let app = build_app(state.clone());
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!("{} listening on http://{}", app_name, addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    state.mcp.shutdown().await;
    tracing::info!("MCP client stopped, bye");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {},
                    _ = sigterm.recv() => {},
                }
            }
            Err(e) => {
                tracing::warn!("failed to install SIGTERM handler: {}", e);
                ctrl_c.await.ok();
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
    }
    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
