//! Domain logic for catalog image generation: catalog extraction,
//! translation lookup, per-item seeds and prompt composition.

pub mod catalog;
pub mod error;
pub mod prompt;
pub mod seed_store;
pub mod translation;
pub mod types;
