use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use boxoffice::checkout::Checkout;
use boxoffice::config::AppConfig;
use boxoffice::notify::{LogNotifier, Notifier};
use boxoffice::proofs::FileProofStorage;
use boxoffice::sched;
use boxoffice::server::{AppState, build_router};
use boxoffice::store::MarketStore;
use boxoffice::worker::ExpiryWorker;

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "boxoffice=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env();

    let store = Arc::new(MarketStore::open(&config.data_dir).expect("failed to open store"));
    let proofs = Arc::new(
        FileProofStorage::new(config.data_dir.join("proofs"))
            .expect("failed to create proof storage"),
    );
    let notifier: Arc<dyn Notifier> = Arc::new(LogNotifier);

    let shutdown = CancellationToken::new();
    let worker = Arc::new(ExpiryWorker::new(store.clone(), notifier.clone()));
    let (scheduler, runner) = sched::pair(worker, config.retry, shutdown.clone());
    let runner_task = tokio::spawn(runner.run());

    let checkout = Arc::new(Checkout::new(
        store.clone(),
        Arc::new(scheduler),
        proofs,
        notifier,
        config.payment_window,
    ));

    // A restart must not orphan in-flight reservations.
    checkout.resume_pending();

    let app = build_router(AppState::new(checkout, store.clone()));

    let listener = tokio::net::TcpListener::bind(config.addr).await.unwrap();
    tracing::info!("listening on {}", config.addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await
        .unwrap();

    shutdown.cancel();
    let _ = runner_task.await;

    if let Err(e) = store.save_snapshot() {
        tracing::error!(error = %e, "failed to save shutdown snapshot");
    }
}

async fn shutdown_signal(shutdown: CancellationToken) {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
    shutdown.cancel();
}
