pub mod auth;
pub mod server;
pub mod upload;

pub use server::{AppState, router, run};
