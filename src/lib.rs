pub mod agents;
pub mod auth;
pub mod battleship;
pub mod clock;
pub mod config;
pub mod constants;
pub mod coordinator;
pub mod error;
pub mod guessing;
pub mod maze;
pub mod rng;
pub mod server_protocol;
pub mod session;
pub mod store;
pub mod strategy;
pub mod types;
