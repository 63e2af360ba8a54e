#![cfg_attr(not(test), deny(clippy::panic))]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::too_many_arguments,
    clippy::too_many_lines
)]

//! # Watchsync Server
//!
//! A lightweight, in-memory coordination server for synchronized group video
//! playback: one member uploads a file, everyone in the room watches it in
//! lock-step with shared chat.
//!
//! No database, no cloud services. Just run the binary, share a room code,
//! and connect via WebSocket.

/// Viewer-side sync engine and session driver
pub mod client;

/// Server configuration and environment variables
pub mod config;

/// Structured logging configuration
pub mod logging;

/// Media store and byte-range streamer
pub mod media;

/// Wire protocol definitions and playback state
pub mod protocol;

/// Main server orchestration: rooms, membership, playback coordination
pub mod server;

/// WebSocket connection handling and HTTP routing
pub mod websocket;
