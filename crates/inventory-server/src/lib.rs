pub mod audit;
pub mod broadcast;
pub mod check;
pub mod cli;
pub mod config;
pub mod consumer;
pub mod delivery;
pub mod error;
pub mod metrics;
pub mod outbox;
pub mod resources;
pub mod service;
