//! HTTP node for Mockchain.
//!
//! Exposes the ledger queries, broadcast and message relay over REST, and channel
//! subscriptions over SSE and long-poll with cursor-based resume.

pub mod config;
pub mod error;
pub mod gateway;
pub mod handler;
pub mod router;
pub mod server;

pub use config::NodeConfig;
pub use error::{ServerError, ServerResult};
pub use gateway::PollResponse;
pub use handler::AppState;
pub use server::MockchainServer;
