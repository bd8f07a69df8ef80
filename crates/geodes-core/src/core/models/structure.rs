use super::atom::Atom;
use super::chain::Chain;
use super::ids::{AtomId, ChainId, ResidueId};
use super::residue::{Residue, ResidueType};
use nalgebra::Point3;
use slotmap::SlotMap;
use std::collections::HashMap;
use std::fmt;

/// File-level identity of a residue: chain, sequence number and insertion code.
///
/// Ordering follows chain identifier, then number, then insertion code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResidueKey {
    pub chain: char,
    pub number: isize,
    pub insertion_code: Option<char>,
}

impl ResidueKey {
    pub fn new(chain: char, number: isize, insertion_code: Option<char>) -> Self {
        Self {
            chain,
            number,
            insertion_code,
        }
    }
}

impl fmt::Display for ResidueKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.chain, self.number)?;
        if let Some(code) = self.insertion_code {
            write!(f, "{}", code)?;
        }
        Ok(())
    }
}

/// Global, file-level information about a structure.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StructureMetadata {
    /// Four-character PDB identifier from the HEADER record, if present.
    pub pdb_code: Option<String>,
    /// Crystallographic resolution in Angstroms (`REMARK   2 RESOLUTION.`).
    pub resolution: Option<f64>,
    /// Concatenated TITLE records.
    pub title: Option<String>,
}

/// A fully loaded protein structure: chains own residues, residues own atoms.
///
/// Storage follows an arena layout; chains are kept in file order and residues
/// keep their structural order within each chain.
#[derive(Debug, Clone, Default)]
pub struct Structure {
    /// Identifier of the structure, usually the source file stem.
    id: String,
    metadata: StructureMetadata,
    atoms: SlotMap<AtomId, Atom>,
    residues: SlotMap<ResidueId, Residue>,
    chains: SlotMap<ChainId, Chain>,
    /// Chains in the order they were first seen.
    chain_order: Vec<ChainId>,
    /// Lookup map for finding chains by their single-character identifier.
    chain_id_map: HashMap<char, ChainId>,
    /// Lookup map for residues by chain, sequence number and insertion code.
    residue_id_map: HashMap<(ChainId, isize, Option<char>), ResidueId>,
}

impl Structure {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            ..Self::default()
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn set_id(&mut self, id: &str) {
        self.id = id.to_string();
    }

    pub fn metadata(&self) -> &StructureMetadata {
        &self.metadata
    }

    pub fn metadata_mut(&mut self) -> &mut StructureMetadata {
        &mut self.metadata
    }

    pub fn atom(&self, id: AtomId) -> Option<&Atom> {
        self.atoms.get(id)
    }

    pub fn residue(&self, id: ResidueId) -> Option<&Residue> {
        self.residues.get(id)
    }

    pub fn residue_mut(&mut self, id: ResidueId) -> Option<&mut Residue> {
        self.residues.get_mut(id)
    }

    pub fn chain(&self, id: ChainId) -> Option<&Chain> {
        self.chains.get(id)
    }

    /// Iterates over chains in file order.
    pub fn chains(&self) -> impl Iterator<Item = (ChainId, &Chain)> {
        self.chain_order
            .iter()
            .filter_map(|&id| self.chains.get(id).map(|chain| (id, chain)))
    }

    /// Iterates over the residues of one chain in structural order.
    pub fn chain_residues(&self, chain_id: ChainId) -> impl Iterator<Item = (ResidueId, &Residue)> {
        self.chains
            .get(chain_id)
            .map(|chain| chain.residues.as_slice())
            .unwrap_or(&[])
            .iter()
            .filter_map(|&id| self.residues.get(id).map(|residue| (id, residue)))
    }

    /// Iterates over the atoms of one residue in file order.
    pub fn residue_atoms(&self, residue_id: ResidueId) -> impl Iterator<Item = (AtomId, &Atom)> {
        self.residues
            .get(residue_id)
            .map(|residue| residue.atoms.as_slice())
            .unwrap_or(&[])
            .iter()
            .filter_map(|&id| self.atoms.get(id).map(|atom| (id, atom)))
    }

    /// Iterates over all atoms in structural order (chain, residue, atom).
    pub fn atoms_in_order(&self) -> impl Iterator<Item = (AtomId, &Atom)> {
        self.chains().flat_map(move |(chain_id, _)| {
            self.chain_residues(chain_id)
                .flat_map(move |(residue_id, _)| self.residue_atoms(residue_id))
        })
    }

    pub fn residue_atom(&self, residue_id: ResidueId, name: &str) -> Option<&Atom> {
        let residue = self.residues.get(residue_id)?;
        residue
            .get_atom_id_by_name(name)
            .and_then(|id| self.atoms.get(id))
    }

    pub fn residue_key(&self, residue_id: ResidueId) -> Option<ResidueKey> {
        let residue = self.residues.get(residue_id)?;
        let chain = self.chains.get(residue.chain_id)?;
        Some(ResidueKey::new(
            chain.id,
            residue.residue_number,
            residue.insertion_code,
        ))
    }

    pub fn find_residue_by_key(&self, key: &ResidueKey) -> Option<ResidueId> {
        let chain_id = self.find_chain_by_id(key.chain)?;
        self.find_residue(chain_id, key.number, key.insertion_code)
    }

    pub fn atom_count(&self) -> usize {
        self.atoms.len()
    }

    pub fn residue_count(&self) -> usize {
        self.residues.len()
    }

    pub fn chain_count(&self) -> usize {
        self.chain_order.len()
    }

    pub fn find_chain_by_id(&self, id: char) -> Option<ChainId> {
        self.chain_id_map.get(&id).copied()
    }

    pub fn find_residue(
        &self,
        chain_id: ChainId,
        residue_number: isize,
        insertion_code: Option<char>,
    ) -> Option<ResidueId> {
        self.residue_id_map
            .get(&(chain_id, residue_number, insertion_code))
            .copied()
    }

    /// Adds a new chain or returns the existing one with the same identifier.
    pub fn add_chain(&mut self, id: char) -> ChainId {
        if let Some(&existing) = self.chain_id_map.get(&id) {
            return existing;
        }
        let chain_id = self.chains.insert(Chain::new(id));
        self.chain_id_map.insert(id, chain_id);
        self.chain_order.push(chain_id);
        chain_id
    }

    /// Appends a residue to the end of a chain, or returns the existing residue
    /// with the same number and insertion code.
    ///
    /// Returns `None` if the chain does not exist.
    pub fn add_residue(
        &mut self,
        chain_id: ChainId,
        residue_number: isize,
        insertion_code: Option<char>,
        name: &str,
    ) -> Option<ResidueId> {
        let chain = self.chains.get_mut(chain_id)?;
        let key = (chain_id, residue_number, insertion_code);

        if let Some(&existing) = self.residue_id_map.get(&key) {
            return Some(existing);
        }

        let residue_type = name.parse::<ResidueType>().ok();
        let residue = Residue::new(residue_number, insertion_code, name, residue_type, chain_id);
        let residue_id = self.residues.insert(residue);
        chain.residues.push(residue_id);
        self.residue_id_map.insert(key, residue_id);
        Some(residue_id)
    }

    /// Adds an atom to a residue. Returns `None` if the residue does not exist.
    pub fn add_atom_to_residue(&mut self, residue_id: ResidueId, mut atom: Atom) -> Option<AtomId> {
        if !self.residues.contains_key(residue_id) {
            return None;
        }
        atom.residue_id = residue_id;
        let name = atom.name.clone();
        let atom_id = self.atoms.insert(atom);
        self.residues.get_mut(residue_id)?.add_atom(&name, atom_id);
        Some(atom_id)
    }

    /// Returns a copy of the structure with every coordinate mapped through `f`.
    pub fn map_positions<F>(&self, f: F) -> Structure
    where
        F: Fn(&Point3<f64>) -> Point3<f64>,
    {
        let mut copy = self.clone();
        for (_, atom) in copy.atoms.iter_mut() {
            atom.position = f(&atom.position);
        }
        copy
    }
}
