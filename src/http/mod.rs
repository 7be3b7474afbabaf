//! HTTP surface: the WebSocket capture endpoint plus artifact serving
//!
//! - GET /ws/capture - persistent capture connection (control + binary frames)
//! - GET /artifacts/* - finished artifacts (served from the storage root)
//! - GET /health - health check

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;
