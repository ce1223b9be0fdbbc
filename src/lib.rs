pub mod call;
pub mod credentials;
pub mod engine;
pub mod events;
pub mod models;
pub mod services;
pub mod state;

use std::sync::Arc;

use crate::call::readiness::ReadinessController;
use crate::call::CallParams;
use crate::state::ServiceContext;

/// Build the waiting room for a call attempt. The caller drives
/// `enter`/`retry` (so a failed device bring-up can offer retry-or-cancel),
/// then `confirm` to join or `cancel` to back out.
pub fn open_waiting_room(ctx: &ServiceContext, params: CallParams) -> ReadinessController {
    ReadinessController::new(Arc::clone(&ctx.engine), ctx.event_tx.clone(), params)
}
