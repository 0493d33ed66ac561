//! ComfyUI WebSocket and REST client library.
//!
//! Provides typed status messages, WebSocket connection handling, HTTP API
//! wrappers, save-format workflow compilation and a job orchestrator that
//! turns a compiled job into output image bytes.

pub mod api;
pub mod client;
pub mod history;
pub mod messages;
pub mod orchestrator;
pub mod processor;
pub mod workflow;
