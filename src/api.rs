//! Liveness endpoint for the hosting platform

mod handlers;

pub use handlers::create_router;
