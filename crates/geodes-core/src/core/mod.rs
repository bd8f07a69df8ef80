//! # Core Module
//!
//! Stateless building blocks of the descriptor pipeline.
//!
//! - **Structure model** ([`models`]) - Chains, residues and atoms of one loaded structure
//! - **File I/O** ([`io`]) - PDB reading and the minimal PDB writer fed to external tools
//! - **Geometry** ([`geometry`]) - Line and quadratic fitting, Kabsch superposition
//! - **Secondary structure** ([`secondary`]) - DSSP adapter and label maps
//! - **Alignment** ([`alignment`]) - Rigid transforms and structural aligners
//! - **Subprocesses** ([`process`]) - Bounded-time execution of external tools
//!
//! Nothing in this layer keeps state between structures; every function is a
//! pure transformation of its inputs or a single external tool invocation.

pub mod alignment;
pub mod geometry;
pub mod io;
pub mod models;
pub mod process;
pub mod secondary;
