//! HTTP surface of mediashelf: cached static pages and collection indexes,
//! the periodic cache invalidation task and the index sync trigger.

pub mod handlers;
pub mod infra;
pub mod routes;

pub use infra::app_state::AppState;
pub use routes::create_router;
