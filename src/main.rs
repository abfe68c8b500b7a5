use std::sync::Arc;

use tokio::sync::broadcast;

use vidgate::api::api_routes;
use vidgate::config::Config;
use vidgate::jobs::JobEvent;
use vidgate::payment::{KeySigner, PaymentSigner};
use vidgate::poller::StatusPoller;
use vidgate::provider::Dispatcher;
use vidgate::store::{JobStore, LibSqlBackend};

/// Capacity of the job-event broadcast channel.
const EVENT_CAPACITY: usize = 256;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = Config::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        eprintln!("  export VIDGATE_PROVIDER_URL=https://provider.example/api");
        std::process::exit(1);
    });

    eprintln!("🎬 Vidgate v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Provider: {}", config.provider.base_url);
    eprintln!("   API: http://0.0.0.0:{}/api/videos", config.port);
    eprintln!("   Updates WS: ws://0.0.0.0:{}/ws", config.port);

    // ── Job ledger ───────────────────────────────────────────────────────
    let store: Arc<dyn JobStore> = Arc::new(
        LibSqlBackend::new_local(&config.db_path)
            .await
            .unwrap_or_else(|e| {
                eprintln!(
                    "Error: Failed to open database at {}: {}",
                    config.db_path.display(),
                    e
                );
                std::process::exit(1);
            }),
    );
    eprintln!("   Database: {}", config.db_path.display());

    // ── Auth mode ────────────────────────────────────────────────────────
    let signer: Option<Arc<dyn PaymentSigner>> = match &config.provider.signer_key_path {
        Some(path) => {
            let signer = KeySigner::load_or_generate(path).unwrap_or_else(|e| {
                eprintln!("Error: Failed to load signing key at {}: {}", path.display(), e);
                std::process::exit(1);
            });
            eprintln!("   Auth: payment proofs (key: {})", path.display());
            Some(Arc::new(signer))
        }
        None => {
            if config.provider.bearer_token.is_some() {
                eprintln!("   Auth: bearer token");
            } else {
                eprintln!("   Auth: none — submissions will be rejected");
            }
            None
        }
    };

    let dispatcher = Arc::new(Dispatcher::new(&config.provider, signer));

    // ── Poller ───────────────────────────────────────────────────────────
    let (events_tx, _) = broadcast::channel::<JobEvent>(EVENT_CAPACITY);
    let poller = StatusPoller::new(
        Arc::clone(&store),
        Arc::clone(&dispatcher),
        events_tx.clone(),
        config.poller.clone(),
    );
    let poller_handle = poller.spawn();
    eprintln!(
        "   Poller: every {}s\n",
        config.poller.interval.as_secs()
    );

    // ── API server ───────────────────────────────────────────────────────
    let app = api_routes(store, dispatcher, events_tx);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;
    tracing::info!(port = config.port, "API server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    // Let the in-flight tick settle before exiting.
    poller.shutdown();
    let _ = poller_handle.await;

    Ok(())
}
