use anyhow::Context;
use cinebox_api::{app, worker, AppState, Backends};
use cinebox_core::{MockReceiptVerifier, ReceiptVerifier};
use cinebox_order::{InMemorySeatLedger, SeatLedger};
use cinebox_store::app_config::{Config, LedgerBackend, PaymentProvider};
use cinebox_store::{BootPayVerifier, DbClient, RedisSeatLedger, StoreCatalogRepository, StoreReservationRepository};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cinebox_api=debug,cinebox_order=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting Cinebox API on port {}", config.server.port);

    // Postgres
    let db = DbClient::new(&config.database.url)
        .await
        .context("Failed to connect to Postgres")?;
    db.migrate().await.context("Failed to run migrations")?;
    let business_rules = db
        .fetch_business_rules(config.business_rules.clone())
        .await
        .context("Failed to load business rules")?;

    let ledger: Arc<dyn SeatLedger> = match config.ledger.backend {
        LedgerBackend::Redis => {
            tracing::info!("Seat ledger: redis at {}", config.redis.url);
            Arc::new(RedisSeatLedger::new(&config.redis.url).context("Failed to open Redis client")?)
        }
        LedgerBackend::Memory => {
            tracing::warn!("Seat ledger: in-memory, run a single API instance only");
            Arc::new(InMemorySeatLedger::new())
        }
    };

    let verifier: Arc<dyn ReceiptVerifier> = match config.payment.provider {
        PaymentProvider::Bootpay => Arc::new(
            BootPayVerifier::new(
                &config.payment.base_url,
                &config.payment.application_id,
                config.payment.private_key.clone(),
            )
            .context("Failed to build payment client")?,
        ),
        PaymentProvider::Mock => {
            tracing::warn!("Payment provider: mock, receipts are never verified against a gateway");
            Arc::new(MockReceiptVerifier::new())
        }
    };

    let catalog = Arc::new(StoreCatalogRepository::new(db.pool.clone()));
    let backends = Backends {
        schedules: catalog.clone(),
        members: catalog,
        reservations: Arc::new(StoreReservationRepository::new(db.pool.clone())),
        ledger,
        verifier,
    };

    let sweep_every = Duration::from_secs(business_rules.expiry_sweep_seconds.max(1));
    let state = AppState::new(backends, business_rules, config.auth.jwt_secret.clone());

    tokio::spawn(worker::start_expiry_worker(
        state.sweeper.clone(),
        state.events.clone(),
        sweep_every,
    ));

    let app = app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
