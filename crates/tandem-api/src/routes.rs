use axum::{
    Router, middleware,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::{self, AppState};
use crate::middleware::authenticate;
use crate::users;

/// Builds the HTTP surface with every route mounted under `prefix`.
pub fn router(state: AppState, prefix: &str) -> Router {
    let api = Router::new()
        .route("/login", post(auth::login))
        .route("/users", post(auth::register).get(users::list_users))
        .route("/auth_user", get(auth::auth_user))
        .route("/users/{username}", get(users::get_user))
        .route("/users/{username}/toggle_follow", post(users::toggle_follow))
        .layer(middleware::from_fn_with_state(state.clone(), authenticate))
        .with_state(state);

    let prefix = prefix.trim_end_matches('/');
    let app = if prefix.is_empty() {
        api
    } else {
        Router::new().nest(prefix, api)
    };

    app.layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
