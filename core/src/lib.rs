//! The device-reconciliation and enrichment pipeline.
//!
//! Data flows leaves-first through these modules:
//!
//! * [`store`]: durable, dedup-aware record of warranty rows and device errors.
//! * [`network`]: DNS resolution and the TCP liveness probe.
//! * [`resolver`]: classifies each device step by step into a device or an error.
//! * [`pool`]: turns directory entries into the live device pool.
//! * [`enrichment`]: serial numbers, then warranty lookups, in parallel.
//! * [`pipeline`]: sequences all of the above and owns resource cleanup.

pub mod enrichment;
pub mod network;
pub mod pipeline;
pub mod pool;
pub mod resolver;
pub mod store;
