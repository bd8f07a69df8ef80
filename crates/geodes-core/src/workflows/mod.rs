//! # Workflows Module
//!
//! Top-level entry points that run a complete descriptor computation over a
//! batch of PDB files.
//!
//! - **Describe** ([`describe`]) - Helix and charge clamp descriptors for every
//!   input, aggregated into one table.
//! - **Compare** ([`compare`]) - Superposition onto a reference structure and
//!   per-helix axis comparison.
//! - **Inputs** ([`inputs`]) - Expansion of files and directories into the
//!   ordered input list.
//!
//! Every workflow validates its configuration first, reports progress through a
//! [`ProgressReporter`](crate::engine::progress::ProgressReporter) and honours a
//! [`CancellationToken`](crate::engine::batch::CancellationToken).

pub mod compare;
pub mod describe;
pub mod inputs;
