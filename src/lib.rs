// Allow pre-existing clippy lints across the codebase
#![allow(
    clippy::collapsible_if,
    clippy::too_many_arguments,
    clippy::needless_lifetimes,
    clippy::io_other_error
)]

/// Use mimalloc as the global allocator for the whole process.
/// Every absorber and worker thread does many small allocations (one fresh
/// chunk per read, one hex `String` per digest); mimalloc's thread-local
/// caching keeps that cheap under concurrency.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

pub mod audit;
pub mod config;
pub mod diag;
pub mod format;
pub mod hasher;
pub mod hexutil;
pub mod pipeline;
pub mod producer;
pub mod record;
pub mod registry;
