//! Realtime gateway for the innovation lab platform, plus the client-side
//! connection manager used by its consumers.

pub mod auth;
pub mod client;
pub mod config;
pub mod docs;
pub mod error;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
pub mod utils;
pub mod websocket;
pub mod ws;
