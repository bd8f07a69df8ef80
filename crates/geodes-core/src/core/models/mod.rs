//! # Core Models Module
//!
//! Data structures describing a loaded protein structure.
//!
//! - [`atom`] - Atom records with coordinates, occupancy and element
//! - [`residue`] - Residues, amino-acid types, charge classes and secondary-structure labels
//! - [`chain`] - Ordered residue lists
//! - [`structure`] - The arena that owns chains, residues and atoms
//! - [`ids`] - Stable keys linking the above
//!
//! ```ignore
//! use geodes::core::models::{atom::Atom, structure::Structure};
//!
//! let mut structure = Structure::new("1abc");
//! let chain_id = structure.add_chain('A');
//! let residue_id = structure.add_residue(chain_id, 1, None, "ALA").unwrap();
//! structure.add_atom_to_residue(residue_id, Atom::new("CA", residue_id, Point3::origin()));
//! ```

pub mod atom;
pub mod chain;
pub mod ids;
pub mod residue;
pub mod structure;
