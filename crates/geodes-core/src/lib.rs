//! # GEODES Core Library
//!
//! Geometric descriptors of protein structures: helix axes, local curvature,
//! bend angles and charge clamp residue pairs, computed for batches of PDB files.
//!
//! ## Architectural Philosophy
//!
//! The library follows a three-layer architecture.
//!
//! - **[`core`]: The Foundation.** Stateless data models (`Structure`), PDB I/O,
//!   geometry primitives and the adapters around external tools (DSSP for
//!   secondary structure, structural aligners).
//!
//! - **[`engine`]: The Logic Core.** Configuration, the helix segmenter and axis
//!   fitter, the charge clamp detector, the per-structure pipeline, the batch
//!   executor and the CSV aggregator.
//!
//! - **[`workflows`]: The Public API.** Complete procedures built from the two
//!   layers above: `describe` for batch descriptor tables and `compare` for
//!   aligned cross-structure comparison.

pub mod core;
pub mod engine;
pub mod workflows;
