use std::sync::Arc;

use creneau_availability::AvailabilityReader;
use creneau_booking::ReservationCoordinator;
use creneau_core::notify::NotificationSink;
use creneau_core::payment::PaymentAdapter;
use creneau_core::ReservationStore;
use creneau_recommend::DemandSignals;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ReservationStore>,
    pub reader: Arc<AvailabilityReader>,
    pub coordinator: Arc<ReservationCoordinator>,
    pub signals: DemandSignals,
    pub max_recommendations: usize,
    pub payment: Arc<dyn PaymentAdapter>,
    pub notifier: Arc<dyn NotificationSink>,
}
