//! # strand-server
//!
//! Exposes one registered function over HTTP so the platform can push record
//! batches through it.

pub mod server;
pub mod wire;

pub use server::{FunctionServer, build_app};
pub use wire::{ProcessRequest, ProcessResponse, WireRecord};
