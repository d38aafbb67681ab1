// Library exports for influencer-ads crate
// This allows the binary and tests to use the modules

pub mod config;
pub mod error;
pub mod email;
pub mod query;
pub mod mail_source;
pub mod gmail_client;

// Classification service and batch driving
pub mod classifier;
pub mod rate_limit;
pub mod orchestrator;
pub mod aggregator;
pub mod pipeline;

// Review and export
pub mod session;
pub mod export;
pub mod report;
