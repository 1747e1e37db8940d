pub mod server;
pub mod view;

use std::sync::Arc;

use crate::conversation::Conversation;

/// What the dashboard can show for the rest of the session.
pub enum DashboardState {
    Ready(Arc<Conversation>),
    /// Terminal: a dataset failed to load, nothing partial is shown.
    Unavailable { reason: String },
}
