pub mod handlers;
pub mod ip_extractor;
pub mod routes;

pub use handlers::{ApiError, AppState, LocationResponse};
pub use routes::create_router;
