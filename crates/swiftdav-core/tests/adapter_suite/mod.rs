//! End-to-end tests for the filesystem adapters.
//!
//! `scenarios` holds backend-agnostic checks; the per-backend modules run
//! them and add backend-specific cases.

pub mod helpers;
pub mod openstack;
pub mod webdav;
