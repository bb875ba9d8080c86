use std::net::SocketAddr;
use std::sync::Arc;

use api_server::http::{self, AppState};
use shared::config::{ApiConfig, load_dotenv};
use shared::llm::{LlmReliabilityConfig, OpenAiGateway, OpenAiGatewayConfig};
use shared::postcard::{MAX_PHOTOS, PostcardPipeline, build_session_store};
use tokio::signal;
use tracing::{error, info};

const DEFAULT_LOG_FILTER: &str = "api_server=debug,shared=info,axum=info";
const FORM_FIELDS_HEADROOM_BYTES: usize = 64 * 1024;

#[tokio::main]
async fn main() {
    load_dotenv();
    init_tracing();

    let config = match ApiConfig::from_env() {
        Ok(cfg) => cfg,
        Err(err) => {
            error!(error = %err, "failed to read config");
            std::process::exit(1);
        }
    };
    let gateway_config = match OpenAiGatewayConfig::from_env() {
        Ok(cfg) => cfg,
        Err(err) => {
            error!(error = %err, "failed to read OpenAI gateway config");
            std::process::exit(1);
        }
    };
    let reliability = match LlmReliabilityConfig::from_env() {
        Ok(cfg) => cfg,
        Err(err) => {
            error!(error = %err, "failed to read upstream reliability config");
            std::process::exit(1);
        }
    };

    let gateway = match OpenAiGateway::new(gateway_config) {
        Ok(gateway) => Arc::new(gateway),
        Err(err) => {
            error!(error = %err, "failed to initialize OpenAI gateway");
            std::process::exit(1);
        }
    };

    let sessions = match build_session_store(
        config.session_store_url.as_deref(),
        config.session_ttl_seconds,
    )
    .await
    {
        Ok(sessions) => sessions,
        Err(err) => {
            error!(error = %err, "failed to initialize session store");
            std::process::exit(1);
        }
    };

    let pipeline = PostcardPipeline::new(
        gateway.clone(),
        gateway,
        sessions,
        reliability,
        config.max_photo_bytes,
    );

    let app = http::build_router(AppState {
        pipeline: Arc::new(pipeline),
        max_request_bytes: config
            .max_photo_bytes
            .saturating_mul(MAX_PHOTOS)
            .saturating_add(FORM_FIELDS_HEADROOM_BYTES),
    });

    let addr: SocketAddr = match config.bind_addr.parse() {
        Ok(addr) => addr,
        Err(err) => {
            error!(error = %err, bind_addr = %config.bind_addr, "invalid bind address");
            std::process::exit(1);
        }
    };

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(err) => {
            error!(error = %err, "failed to bind listener");
            std::process::exit(1);
        }
    };

    info!(
        "postcard api listening on {}",
        listener.local_addr().unwrap_or(addr)
    );
    if let Err(err) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!(error = %err, "server exited with error");
        std::process::exit(1);
    }
}

fn init_tracing() {
    let builder = tracing_subscriber::fmt().with_env_filter(
        std::env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_LOG_FILTER.to_string()),
    );

    let json = std::env::var("LOG_FORMAT").is_ok_and(|format| format.eq_ignore_ascii_case("json"));
    if json {
        builder
            .json()
            .flatten_event(true)
            .with_current_span(true)
            .init();
    } else {
        builder.init();
    }
}

async fn shutdown_signal() {
    if let Err(err) = signal::ctrl_c().await {
        error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
