//! Adaptive content selection and weakness diagnosis engine.
//!
//! Two components share the document store seam:
//! - [`retrieval`] turns a taxonomy filter into a shuffled problem set while
//!   respecting the store's in-list limit.
//! - [`weakness`] turns a student's graded exam history into per-topic mastery
//!   scores through a least-squares solver.

pub mod config;
pub mod domain;
pub mod error;
pub mod protocol;
pub mod regression;
pub mod retrieval;
pub mod routes;
pub mod seeds;
pub mod state;
pub mod store;
pub mod taxonomy;
pub mod telemetry;
pub mod weakness;
