//! News Gateway - HTML views over per-site article backends
//!
//! This crate serves home, list, article and search pages. Article data
//! comes from one fetch service per site; the dispatcher picks the backend
//! for a request, and global search fans out to every site and merges
//! whatever answers in time.

pub mod aggregator;
pub mod backend;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod filters;
pub mod model;
pub mod registry;
pub mod routes;
pub mod transport;

#[cfg(test)]
mod mock;
