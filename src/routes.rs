use crate::auth::{self, AuthService};
use crate::clients::{self, SharedClientStore};
use axum::{
    Router, middleware,
    routing::{get, post},
};
use std::sync::Arc;

/// Everything the routers need, built once in main
#[derive(Clone)]
pub struct AppState {
    pub auth_service: Arc<AuthService>,
    pub store: SharedClientStore,
    pub base_url: String,
}

/// Token endpoint, unauthenticated by definition
pub fn token_routes(state: &AppState) -> Router {
    Router::new()
        .route("/token", post(auth::token_handler))
        .with_state(auth_state(state))
}

pub fn metadata_routes(state: &AppState) -> Router {
    Router::new()
        .route(
            "/.well-known/oauth-authorization-server",
            get(auth::metadata_handler),
        )
        .with_state(auth_state(state))
}

/// Client management, bearer token required
pub fn client_routes(state: &AppState) -> Router {
    let auth_config = auth::AuthMiddlewareConfig {
        auth_service: state.auth_service.clone(),
        base_url: state.base_url.clone(),
    };

    Router::new()
        .route("/api/client", post(clients::create_client_handler))
        .route(
            "/api/client/{id}",
            get(clients::fetch_client_handler)
                .put(clients::update_client_handler)
                .delete(clients::delete_client_handler),
        )
        .layer(middleware::from_fn_with_state(
            auth_config,
            auth::bearer_auth_middleware,
        ))
        .with_state(clients::ClientsState {
            store: state.store.clone(),
        })
}

/// All routes, without rate limiting
pub fn router(state: &AppState) -> Router {
    token_routes(state)
        .merge(metadata_routes(state))
        .merge(client_routes(state))
}

fn auth_state(state: &AppState) -> auth::AuthAppState {
    auth::AuthAppState {
        auth_service: state.auth_service.clone(),
        base_url: state.base_url.clone(),
    }
}
