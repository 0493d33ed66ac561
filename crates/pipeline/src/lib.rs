//! Batch generation of catalog product images.
//!
//! [`run::RunController`] walks the catalog, skips items whose image
//! already exists, keeps seeds stable across runs and hands each
//! remaining item to a [`generator::ImageGenerator`].

pub mod artifact;
pub mod error;
pub mod generator;
pub mod run;
