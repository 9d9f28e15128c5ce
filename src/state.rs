use crate::store::SharedGateway;
use axum::extract::FromRef;

#[derive(Clone)]
pub struct AppState {
    pub store: SharedGateway,
}

impl FromRef<AppState> for SharedGateway {
    fn from_ref(state: &AppState) -> Self {
        state.store.clone()
    }
}
