// Inferload - Library root for testing

pub mod collector;
pub mod config;
pub mod corpus;
pub mod error;
pub mod executor;
pub mod mock_server;
pub mod pacing;
pub mod record;
pub mod report;
pub mod runner;
pub mod sampler;
pub mod summary;
