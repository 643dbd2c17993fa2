pub mod callbacks;
pub mod health;

use crate::config::Config;
use crate::gateway::OffsiteGateway;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub gateway: Arc<OffsiteGateway>,
}
