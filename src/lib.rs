pub mod api;
pub mod config;
pub mod errors;
pub mod middleware;
pub mod router;
pub mod signature;
pub mod store;
pub mod twiml;
pub mod utils;
