//! # perf-model
//!
//! Linear performance models for elementwise accelerator kernels.
//!
//! Ingests profiler reports, fits one ordinary-least-squares model per
//! hardware configuration key, predicts durations for new measurements,
//! aggregates the relative error, and compares microbenchmark runs
//! against stored goldens.
//!
//! ## Modules
//!
//! - [`schema`] — Profiler record types, CSV ingestion, pipeline declarations
//! - [`features`] — Numeric feature derivation (`num_tiles`, `tiles_per_core`, ...)
//! - [`grouping`] — Partition records by configuration key
//! - [`solver`] — Least-squares solvers behind a common trait
//! - [`regress`] — Per-group fitting and the coefficient table
//! - [`predict`] — Duration estimates, relative error and RMSRE
//! - [`aggregate`] — Mean/std of repeated RMSRE measurements
//! - [`golden`] — Benchmark comparison against goldens
//! - [`report`] — Atomic output writes
//! - [`plot`] — HTML 3-D scatter and SVG RMSRE charts
//! - [`pipeline`] — End-to-end stages over files

pub mod aggregate;
pub mod error;
pub mod features;
pub mod golden;
pub mod grouping;
pub mod pipeline;
pub mod plot;
pub mod predict;
pub mod regress;
pub mod report;
pub mod schema;
pub mod solver;
