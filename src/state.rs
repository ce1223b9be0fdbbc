use std::sync::Arc;

use crate::credentials::CredentialProvider;
use crate::engine::MediaEngine;
use crate::events::EventSender;

/// Shared context assembled once at app start and passed to whichever screen
/// is active. The media engine lives here for the whole process — its
/// `initialize`/`release` pair tracks app foreground/background, not call
/// entry/exit — and call controllers borrow it per call.
#[derive(Clone)]
pub struct ServiceContext {
    pub engine: Arc<dyn MediaEngine>,
    pub credentials: Arc<dyn CredentialProvider>,
    pub event_tx: EventSender,
    pub user_id: String,
    pub display_name: String,
}
