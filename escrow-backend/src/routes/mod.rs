//! API Routes

pub mod health;
pub mod offers;

pub use health::health_router;
pub use offers::{offers_router, AppState};
