//! Gigboard backend engine.
//!
//! Keeps the marketplace's document database consistent while jobs move
//! from draft to completion: the lifecycle state machine, contract
//! signatures, applicant selection, company membership and the
//! notification fan-out all live here, behind the [`store::DocumentStore`]
//! seam.

pub mod config;
pub mod error;
pub mod storage;
pub mod store;
pub mod telemetry;
pub mod workflows;
