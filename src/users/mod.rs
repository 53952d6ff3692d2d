use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::{auth::middleware::require_auth, state::AppState};

mod dto;
mod handlers;
pub mod model;
pub mod repo;
mod services;
pub mod validate;

pub fn router(state: AppState) -> Router<AppState> {
    let protected = Router::new()
        .route("/users/protected", get(handlers::protected))
        .route_layer(middleware::from_fn_with_state(state, require_auth));

    Router::new()
        .route("/users", get(handlers::list_users).post(handlers::register))
        .route("/users/login", post(handlers::login))
        .route(
            "/users/:id",
            get(handlers::get_user)
                .put(handlers::update_user)
                .delete(handlers::delete_user),
        )
        .merge(protected)
}
