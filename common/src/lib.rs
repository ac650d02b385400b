//! Shared models, configuration and collaborator contracts for `sweepr`.
//!
//! The pipeline itself lives in `sweepr-core`; the concrete transports live in
//! `sweepr-protocols`. Everything both sides need to agree on is here.

pub mod browser;
pub mod config;
pub mod device;
pub mod directory;
pub mod network;
pub mod progress;
pub mod remote;
pub mod serial;
