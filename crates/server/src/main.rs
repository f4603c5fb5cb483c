//! Pollen server entry point.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{Router, middleware};
use pollen_api::{middleware::AppState, router as api_router};
use pollen_common::{Config, config::LoggingConfig};
use pollen_core::{
    DeviceService, EventBus, FollowingService, NotificationDispatcher, NotificationService,
    PollService, PushService, UserService, VoteService,
};
use pollen_db::repositories::{
    DeviceTokenRepository, FollowerRepository, NotificationRepository, PollRepository,
    UserRepository, VoteRepository,
};
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Waits for a shutdown signal (SIGINT or SIGTERM).
///
/// On Unix systems, this listens for both SIGINT (Ctrl+C) and SIGTERM.
/// On Windows, this only listens for Ctrl+C.
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
        () = ctrl_c => {
            info!("Received SIGINT, initiating graceful shutdown...");
        },
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "pollen=debug,tower_http=debug".into());
    let registry = tracing_subscriber::registry().with(filter);

    if logging.json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Deletes notifications older than the retention period, forever.
fn spawn_prune_task(service: NotificationService, retention_days: i64, interval_secs: u64) {
    let retention = chrono::Duration::days(retention_days);

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
        loop {
            interval.tick().await;
            if let Err(e) = service.prune_expired(retention).await {
                tracing::error!(error = %e, "Notification pruning failed");
            }
        }
    });
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load()?;

    init_tracing(&config.logging);
    info!("Starting pollen server...");

    // Connect to database
    let db = Arc::new(pollen_db::init(&config).await?);
    info!("Connected to database");

    // Run migrations
    info!("Running database migrations...");
    pollen_db::migrate(&db).await?;
    info!("Migrations completed");

    // Initialize repositories
    let user_repo = UserRepository::new(Arc::clone(&db));
    let follower_repo = FollowerRepository::new(Arc::clone(&db));
    let device_repo = DeviceTokenRepository::new(Arc::clone(&db));
    let poll_repo = PollRepository::new(Arc::clone(&db));
    let vote_repo = VoteRepository::new(Arc::clone(&db));
    let notification_repo = NotificationRepository::new(Arc::clone(&db));

    // Event bus: services publish, the dispatcher consumes
    let bus = EventBus::new();

    // Initialize services
    let user_service = UserService::new(user_repo.clone());
    let poll_service = PollService::new(poll_repo.clone(), user_repo.clone(), bus.sender());
    let vote_service = VoteService::new(
        vote_repo,
        poll_repo.clone(),
        user_repo.clone(),
        poll_service.clone(),
    );
    let following_service =
        FollowingService::new(follower_repo.clone(), user_repo.clone(), bus.sender());
    let device_service = DeviceService::new(device_repo.clone());
    let notification_service =
        NotificationService::new(notification_repo, user_repo, poll_repo);

    let push_service = PushService::from_config(device_repo, &config.push)?;
    info!(
        apns = config.push.apns.is_some(),
        fcm = config.push.fcm.is_some(),
        "Push providers configured"
    );

    let dispatcher = NotificationDispatcher::new(
        notification_service.clone(),
        push_service,
        follower_repo,
        config.notifications.fanout_concurrency,
    );
    let _consumer = bus.start(Arc::new(dispatcher));
    info!("Notification dispatcher started");

    spawn_prune_task(
        notification_service.clone(),
        config.notifications.retention_days,
        config.notifications.prune_interval_secs,
    );

    let state = AppState {
        user_service,
        poll_service,
        vote_service,
        following_service,
        device_service,
        notification_service,
    };

    let app = Router::new()
        .nest("/api", api_router())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            pollen_api::middleware::auth_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    // Start server with graceful shutdown
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}
