use std::net::SocketAddr;
use std::sync::Arc;

use creneau_api::{app, AppState};
use creneau_availability::AvailabilityReader;
use creneau_booking::{HoldSweeper, ReservationCoordinator};
use creneau_core::notify::LogNotifier;
use creneau_core::payment::MockPaymentAdapter;
use creneau_core::ReservationStore;
use creneau_recommend::DemandSignals;
use creneau_store::{EventBus, MemoryStore, PgStore};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "creneau_api=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = creneau_store::app_config::Config::load().expect("Failed to load config");
    tracing::info!("Starting Creneau API on port {}", config.server.port);

    // Event bus feeds the availability cache invalidation
    let bus = EventBus::default();

    let store: Arc<dyn ReservationStore> = match config.store.backend.as_str() {
        "postgres" => {
            let url = config
                .store
                .url
                .as_deref()
                .expect("store.url is required for the postgres backend");
            Arc::new(
                PgStore::connect(url, bus.clone())
                    .await
                    .expect("Failed to connect to Postgres"),
            )
        }
        _ => Arc::new(MemoryStore::new(bus.clone())),
    };

    let reader = Arc::new(AvailabilityReader::new(
        store.clone(),
        config.booking_rules.availability_max_age(),
    ));
    tokio::spawn(creneau_availability::watch(reader.clone(), bus.subscribe()));

    let coordinator = Arc::new(ReservationCoordinator::new(
        store.clone(),
        config.booking_rules.clone(),
    ));

    let sweeper = HoldSweeper::new(store.clone(), config.booking_rules.sweep_interval());
    tokio::spawn(sweeper.run());

    let signals =
        DemandSignals::from_config(&config.recommend).expect("invalid recommend configuration");

    let app_state = AppState {
        store,
        reader,
        coordinator,
        signals,
        max_recommendations: config.recommend.max_results,
        payment: Arc::new(MockPaymentAdapter),
        notifier: Arc::new(LogNotifier),
    };

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
