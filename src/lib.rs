pub mod agent;
pub mod config;
pub mod documents;
pub mod gateway;
pub mod locations;
pub mod render;
pub mod types;
