use chrono::Utc;
use cinebox_order::ExpirySweeper;
use cinebox_shared::SeatEventKind;
use cinebox_store::EventBus;
use std::sync::Arc;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{error, info};

/// Periodically cancel pending reservations whose seat hold expired
pub async fn start_expiry_worker(sweeper: Arc<ExpirySweeper>, events: EventBus, every: Duration) {
    info!("Expiry worker started, sweeping every {:?}", every);

    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        run_sweep(&sweeper, &events).await;
    }
}

async fn run_sweep(sweeper: &ExpirySweeper, events: &EventBus) {
    match sweeper.sweep(Utc::now()).await {
        Ok(canceled) => {
            for reservation in canceled {
                events.seats_changed(
                    reservation.schedule_id,
                    &reservation.seat_ids,
                    reservation.id,
                    SeatEventKind::Released,
                );
            }
        }
        Err(e) => error!("Expiry sweep failed: {}", e),
    }
}
