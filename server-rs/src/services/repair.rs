//! Background sweep that finishes payments whose team write was lost.
//!
//! The reconciler writes the payment before the team. If the team write
//! fails, the store is left with a SUCCESS payment and a PENDING team; this
//! sweep finds those pairs and marks the team PAID. A team an admin has
//! edited after the payment settled is left as the admin set it.

use std::sync::Arc;
use std::time::Duration;

use crate::models::TeamStatus;
use crate::store::{Store, StoreResult};

/// Runs one pass and returns how many teams were repaired.
pub async fn repair_unsettled_teams(store: &dyn Store) -> StoreResult<usize> {
    let payments = store.paid_payments_for_pending_teams().await?;
    let mut repaired = 0;
    for p in payments {
        if store.set_team_status(p.team_id, TeamStatus::Paid).await? {
            tracing::warn!(
                payment_id = %p.id,
                team_id = %p.team_id,
                "Repaired team left PENDING after successful payment"
            );
            repaired += 1;
        }
    }
    Ok(repaired)
}

pub async fn run(store: Arc<dyn Store>, every: Duration) {
    let mut ticker = tokio::time::interval(every);
    loop {
        ticker.tick().await;
        match repair_unsettled_teams(store.as_ref()).await {
            Ok(0) => {}
            Ok(n) => tracing::info!(repaired = n, "Repair sweep finished"),
            Err(e) => tracing::error!(error = %e, "Repair sweep failed"),
        }
    }
}
