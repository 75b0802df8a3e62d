//! The web module for the Axum control API.
//! This file declares the other files in this directory as sub-modules.

pub mod api;
pub mod engine_channel;
pub mod models;
