//! # Engine Module
//!
//! Descriptor computation for one structure and for whole batches.
//!
//! ## Overview
//!
//! A labeled [`Structure`](crate::core::models::structure::Structure) flows
//! through the segmenter, the axis fitter and the charge clamp detector; the
//! pipeline gathers their outputs into a
//! [`StructureReport`](pipeline::StructureReport). The batch executor runs the
//! pipeline over many inputs and the aggregator turns the ordered outcomes into
//! one CSV table.
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`], [`profile`]) - Validated run parameters and protein profiles
//! - **Helix descriptors** ([`segmenter`], [`axis`]) - Helix runs and their fitted axes
//! - **Charge clamps** ([`clamp`]) - Opposite-charge residue pairs found with a k-d tree
//! - **Orchestration** ([`pipeline`], [`batch`]) - Per-structure processing and the worker pool
//! - **Output** ([`aggregate`]) - Row layouts and CSV serialization
//! - **Progress Monitoring** ([`progress`]) - Callback-based progress events
//! - **Error Handling** ([`error`]) - Per-structure and run-level error types

pub mod aggregate;
pub mod axis;
pub mod batch;
pub mod clamp;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod profile;
pub mod progress;
pub mod segmenter;
