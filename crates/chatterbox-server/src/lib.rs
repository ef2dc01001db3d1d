//! # chatterbox-server
//!
//! Coordination core of the ChatterBox chat backend: the relationship model
//! over the Store Adapter, the friend and group request workflows, channel
//! messaging, and the axum HTTP and WebSocket surface that exposes them.

pub mod api;
pub mod clock;
pub mod config;
pub mod error;
pub mod fanout;
pub mod keys;
pub mod live;
pub mod messaging;
pub mod relations;
pub mod requests;
