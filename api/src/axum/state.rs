use parley::Orchestrator;
use std::sync::Arc;

pub struct State {
    pub orchestrator: Orchestrator,
}

#[allow(clippy::module_name_repetitions)]
pub type AppState = Arc<State>;

pub fn create(orchestrator: Orchestrator) -> AppState {
    Arc::new(State { orchestrator })
}
