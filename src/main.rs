use roomcast::{
    app, AppState, Gateway, Hub, RealtimeConfig, RelayBridge, RelayPublisher, TokenConfig,
};
use roomcast::session::ClaimsIdentityResolver;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "roomcast=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = RealtimeConfig::from_env().expect("LISTEN_ADDR must be a socket address");
    info!(
        listen_addr = %config.listen_addr,
        relay = config.redis_url.is_some(),
        "Starting roomcast"
    );

    // The relay is optional; without a broker the instance serves its own clients only
    let bridge = match config.redis_url.as_deref() {
        Some(url) => match RelayBridge::new(url, config.relay_channel.clone(), config.backoff()) {
            Ok(bridge) => Some(bridge),
            Err(e) => {
                error!(error = %e, "Invalid REDIS_URL, running without relay");
                None
            }
        },
        None => None,
    };

    let (publisher, outbound) = match bridge {
        Some(_) => {
            let (publisher, outbound) =
                RelayPublisher::channel(Uuid::new_v4().to_string(), config.relay_queue_capacity);
            (Some(publisher), Some(outbound))
        }
        None => (None, None),
    };

    let (hub, _hub_task) = Hub::spawn(config.hub_config(), publisher);

    let relay_tasks = match (bridge, outbound) {
        (Some(bridge), Some(outbound)) => Some(bridge.start(outbound, hub.clone())),
        _ => None,
    };

    let gateway = Gateway::new(
        TokenConfig::new(config.jwt_secret.clone()),
        Arc::new(ClaimsIdentityResolver),
    );
    let app_state = AppState::new(hub, Arc::new(gateway));

    let app = app(app_state).layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(config.listen_addr).await.unwrap();
    info!("Server running on http://{}", config.listen_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap();

    if let Some(tasks) = relay_tasks {
        tasks.abort();
    }
    info!("Server stopped");
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut terminate =
            signal(SignalKind::terminate()).expect("Failed to install SIGTERM handler");

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = terminate.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    }
}
