//! Shared types for the PocketBase MCP bridge: the collection model the
//! backend speaks and the error classifications tool envelopes carry.

pub mod collections;
pub mod error;
