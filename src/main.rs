use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::AppState;
use wardflow_core::{
    Clock, CoreEnv, FanoutSink, Hospital, NotificationSink, RecordingSink, SystemClock,
    TracingSink,
};
use wardflow_scheduler::{
    DecisionOracle, HttpOracle, Orchestrator, RuleBasedOracle, SchedulerEnv,
};

/// Notifications kept for `GET /notifications`.
const NOTIFICATION_HISTORY: usize = 200;

/// Main entry point for the WardFlow service
///
/// Loads (or seeds) the hospital from the data directory, then runs the REST server and the
/// orchestrator's decision and sweep ticks until Ctrl-C.
///
/// # Environment Variables
/// - `WARDFLOW_REST_ADDR`: REST server address (default: "0.0.0.0:3000")
/// - `WARDFLOW_DATA_DIR`: Directory for hospital snapshots
/// - `WARDFLOW_ORACLE_URL`: Remote decision service; the built-in rules are used when unset
/// - `WARDFLOW_DECISION_INTERVAL_SECS`, `WARDFLOW_SWEEP_INTERVAL_SECS`,
///   `WARDFLOW_ORACLE_TIMEOUT_SECS`: orchestrator cadence
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("wardflow_run=info".parse()?)
                .add_directive("wardflow_core=info".parse()?)
                .add_directive("wardflow_scheduler=info".parse()?)
                .add_directive("api_rest=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let rest_addr: SocketAddr = std::env::var("WARDFLOW_REST_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:3000".into())
        .parse()?;

    let core_cfg = CoreEnv::from_process_env().resolve()?;
    let scheduler_cfg = SchedulerEnv::from_process_env().resolve()?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    tracing::info!("++ Loading hospital from {}", core_cfg.data_dir().display());
    let hospital = Hospital::open(core_cfg, clock.now())?.into_shared();

    let notifications = Arc::new(RecordingSink::new(NOTIFICATION_HISTORY));
    let sink: Arc<dyn NotificationSink> = Arc::new(
        FanoutSink::new()
            .with(Arc::new(TracingSink))
            .with(notifications.clone()),
    );

    let oracle: Arc<dyn DecisionOracle> = match scheduler_cfg.oracle_url() {
        Some(url) => Arc::new(HttpOracle::new(url)?),
        None => Arc::new(RuleBasedOracle),
    };

    let orchestrator = Arc::new(Orchestrator::new(
        hospital.clone(),
        oracle,
        sink.clone(),
        clock.clone(),
        scheduler_cfg,
    ));

    let rest_app = api_rest::router(AppState {
        hospital,
        orchestrator: orchestrator.clone(),
        sink,
        notifications,
        clock,
    });

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let wait_for = |mut rx: watch::Receiver<bool>| async move {
        let _ = rx.wait_for(|stopped| *stopped).await;
    };

    tracing::info!("++ Starting WardFlow REST on {}", rest_addr);
    let listener = tokio::net::TcpListener::bind(rest_addr).await?;
    let rest_shutdown = wait_for(shutdown_rx.clone());
    let rest_server = tokio::spawn(async move {
        axum::serve(listener, rest_app)
            .with_graceful_shutdown(rest_shutdown)
            .await
    });
    let scheduler = tokio::spawn(orchestrator.run(wait_for(shutdown_rx)));

    tokio::signal::ctrl_c().await?;
    tracing::info!("-- Shutting down");
    shutdown_tx.send(true)?;

    let (rest_result, scheduler_result) = tokio::join!(rest_server, scheduler);
    rest_result??;
    scheduler_result?;

    Ok(())
}
