use cinebox_core::{MemberRepository, ReceiptVerifier, ScheduleRepository};
use cinebox_order::{
    CancellationHandler, ExpirySweeper, PaymentReconciler, ReservationHistory, ReservationManager,
    ReservationRepository, SeatLedger,
};
use cinebox_shared::Masked;
use cinebox_store::app_config::BusinessRules;
use cinebox_store::EventBus;
use std::sync::Arc;

use crate::middleware::ResiliencyState;

#[derive(Clone)]
pub struct AuthConfig {
    pub jwt_secret: Masked<String>,
}

/// Storage and gateway implementations the handlers run against
pub struct Backends {
    pub schedules: Arc<dyn ScheduleRepository>,
    pub members: Arc<dyn MemberRepository>,
    pub reservations: Arc<dyn ReservationRepository>,
    pub ledger: Arc<dyn SeatLedger>,
    pub verifier: Arc<dyn ReceiptVerifier>,
}

#[derive(Clone)]
pub struct AppState {
    pub schedules: Arc<dyn ScheduleRepository>,
    pub ledger: Arc<dyn SeatLedger>,
    pub manager: Arc<ReservationManager>,
    pub reconciler: Arc<PaymentReconciler>,
    pub cancellation: Arc<CancellationHandler>,
    pub history: Arc<ReservationHistory>,
    pub sweeper: Arc<ExpirySweeper>,
    pub events: EventBus,
    pub auth: AuthConfig,
    pub business_rules: BusinessRules,
    pub resiliency: Arc<ResiliencyState>,
}

impl AppState {
    pub fn new(backends: Backends, business_rules: BusinessRules, jwt_secret: Masked<String>) -> Self {
        let policy = business_rules.to_policy();
        let Backends {
            schedules,
            members,
            reservations,
            ledger,
            verifier,
        } = backends;

        Self {
            manager: Arc::new(ReservationManager::new(
                schedules.clone(),
                reservations.clone(),
                ledger.clone(),
                policy.clone(),
            )),
            reconciler: Arc::new(PaymentReconciler::new(
                reservations.clone(),
                ledger.clone(),
                verifier.clone(),
                members.clone(),
                policy.clone(),
            )),
            cancellation: Arc::new(CancellationHandler::new(
                schedules.clone(),
                reservations.clone(),
                ledger.clone(),
                verifier,
                policy.clone(),
            )),
            history: Arc::new(ReservationHistory::new(
                schedules.clone(),
                members,
                reservations.clone(),
                policy.saving_rates,
            )),
            sweeper: Arc::new(ExpirySweeper::new(reservations, ledger.clone())),
            schedules,
            ledger,
            events: EventBus::default(),
            auth: AuthConfig { jwt_secret },
            business_rules,
            resiliency: Arc::new(ResiliencyState::default()),
        }
    }
}
