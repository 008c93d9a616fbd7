//! Soccer server library.
//!
//! This module exposes the server components for use in tests and binaries.

pub mod broadcast;
pub mod config;
pub mod engine;
pub mod game_loop;
pub mod gateway;
pub mod player;
pub mod registry;
pub mod state;
pub mod ws;
