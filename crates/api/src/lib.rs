//! Liquidator API clients for external services.
//!
//! This crate provides HTTP clients for:
//! - Aave subgraph: liquidatable position discovery
//! - Telegram: operator notifications

mod subgraph;
mod telegram;

pub use subgraph::{
    normalize_users, parse_users, FeedError, Position, SubgraphClient, SubgraphConfig,
    SubgraphUser, DEFAULT_SUBGRAPH_URL,
};
pub use telegram::{TelegramClient, TelegramError};
