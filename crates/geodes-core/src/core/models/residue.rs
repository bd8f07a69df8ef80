use super::ids::{AtomId, ChainId};
use phf::{Map, phf_map};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResidueType {
    // --- Aliphatic, Nonpolar ---
    Alanine,    // ALA
    Glycine,    // GLY
    Isoleucine, // ILE
    Leucine,    // LEU
    Proline,    // PRO
    Valine,     // VAL

    // --- Aromatic ---
    Phenylalanine, // PHE
    Tryptophan,    // TRP
    Tyrosine,      // TYR

    // --- Polar, Uncharged ---
    Asparagine, // ASN
    Cysteine,   // CYS
    Glutamine,  // GLN
    Serine,     // SER
    Threonine,  // THR
    Methionine, // MET

    // --- Positively Charged (Basic) ---
    Arginine, // ARG
    Lysine,   // LYS

    // --- Negatively Charged (Acidic) ---
    AsparticAcid, // ASP
    GlutamicAcid, // GLU

    // --- Histidine and its protonation variants ---
    Histidine,           // HIS, HIE, HID, HSE, HSD - neutral tautomers
    HistidineProtonated, // HIP, HSP, HIH - the positively charged variant
}

/// Formal charge class of a residue side chain at physiological pH.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChargeClass {
    Positive,
    Negative,
    Neutral,
}

impl ChargeClass {
    pub fn is_opposite(self, other: ChargeClass) -> bool {
        matches!(
            (self, other),
            (ChargeClass::Positive, ChargeClass::Negative)
                | (ChargeClass::Negative, ChargeClass::Positive)
        )
    }

    pub fn sign(self) -> char {
        match self {
            ChargeClass::Positive => '+',
            ChargeClass::Negative => '-',
            ChargeClass::Neutral => '0',
        }
    }
}

/// Per-residue label assigned by a secondary-structure tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SecondaryStructure {
    Helix,
    Strand,
    Coil,
    Other,
}

impl SecondaryStructure {
    /// Maps a DSSP one-letter code onto the coarse label set.
    pub fn from_dssp_code(code: char) -> Self {
        match code {
            'H' | 'G' | 'I' => SecondaryStructure::Helix,
            'E' | 'B' => SecondaryStructure::Strand,
            'T' | 'S' | 'P' | ' ' | '-' => SecondaryStructure::Coil,
            _ => SecondaryStructure::Other,
        }
    }
}

impl fmt::Display for SecondaryStructure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                SecondaryStructure::Helix => "Helix",
                SecondaryStructure::Strand => "Strand",
                SecondaryStructure::Coil => "Coil",
                SecondaryStructure::Other => "Other",
            }
        )
    }
}

static CHARGED_GROUP_ATOMS: Map<&'static str, &'static [&'static str]> = phf_map! {
    "ARG" => &["NE", "NH1", "NH2"],
    "LYS" => &["NZ"],
    "ASP" => &["OD1", "OD2"],
    "GLU" => &["OE1", "OE2"],
    "HIP" => &["ND1", "NE2"],
};

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown residue name: '{0}'")]
pub struct ParseResidueTypeError(pub String);

impl ResidueType {
    pub fn to_three_letter(self) -> &'static str {
        match self {
            ResidueType::Alanine => "ALA",
            ResidueType::Glycine => "GLY",
            ResidueType::Isoleucine => "ILE",
            ResidueType::Leucine => "LEU",
            ResidueType::Proline => "PRO",
            ResidueType::Valine => "VAL",
            ResidueType::Phenylalanine => "PHE",
            ResidueType::Tryptophan => "TRP",
            ResidueType::Tyrosine => "TYR",
            ResidueType::Asparagine => "ASN",
            ResidueType::Cysteine => "CYS",
            ResidueType::Glutamine => "GLN",
            ResidueType::Serine => "SER",
            ResidueType::Threonine => "THR",
            ResidueType::Methionine => "MET",
            ResidueType::Arginine => "ARG",
            ResidueType::Lysine => "LYS",
            ResidueType::AsparticAcid => "ASP",
            ResidueType::GlutamicAcid => "GLU",
            ResidueType::Histidine => "HIS",
            ResidueType::HistidineProtonated => "HIP",
        }
    }

    pub fn charge_class(self) -> ChargeClass {
        match self {
            ResidueType::Arginine | ResidueType::Lysine | ResidueType::HistidineProtonated => {
                ChargeClass::Positive
            }
            ResidueType::AsparticAcid | ResidueType::GlutamicAcid => ChargeClass::Negative,
            _ => ChargeClass::Neutral,
        }
    }

    /// Names of the side-chain atoms carrying the formal charge, empty for neutral residues.
    pub fn charged_atom_names(self) -> &'static [&'static str] {
        CHARGED_GROUP_ATOMS
            .get(self.to_three_letter())
            .copied()
            .unwrap_or(&[])
    }
}

impl FromStr for ResidueType {
    type Err = ParseResidueTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ALA" => Ok(ResidueType::Alanine),
            "GLY" => Ok(ResidueType::Glycine),
            "ILE" => Ok(ResidueType::Isoleucine),
            "LEU" => Ok(ResidueType::Leucine),
            "PRO" => Ok(ResidueType::Proline),
            "VAL" => Ok(ResidueType::Valine),
            "PHE" => Ok(ResidueType::Phenylalanine),
            "TRP" => Ok(ResidueType::Tryptophan),
            "TYR" => Ok(ResidueType::Tyrosine),
            "ASN" => Ok(ResidueType::Asparagine),
            "CYS" | "CYX" => Ok(ResidueType::Cysteine),
            "GLN" => Ok(ResidueType::Glutamine),
            "SER" => Ok(ResidueType::Serine),
            "THR" => Ok(ResidueType::Threonine),
            "MET" | "MSE" => Ok(ResidueType::Methionine),
            "ARG" => Ok(ResidueType::Arginine),
            "LYS" => Ok(ResidueType::Lysine),
            "ASP" => Ok(ResidueType::AsparticAcid),
            "GLU" => Ok(ResidueType::GlutamicAcid),
            "HIS" | "HIE" | "HID" | "HSE" | "HSD" => Ok(ResidueType::Histidine),
            "HIP" | "HSP" | "HIH" => Ok(ResidueType::HistidineProtonated),
            other => Err(ParseResidueTypeError(other.to_string())),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModelError {
    #[error(
        "Secondary structure of residue {residue_number} is already assigned ({existing}); labels are write-once"
    )]
    LabelAlreadyAssigned {
        residue_number: isize,
        existing: SecondaryStructure,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Residue {
    pub residue_number: isize,              // Residue sequence number from source file
    pub insertion_code: Option<char>,       // PDB insertion code, if any
    pub name: String,                       // Name of the residue (e.g., "ALA", "HOH")
    pub residue_type: Option<ResidueType>,  // Parsed amino-acid type, None for hetero groups
    pub chain_id: ChainId,                  // ID of the parent chain
    pub(crate) atoms: Vec<AtomId>,          // Atoms in file order
    atom_name_map: HashMap<String, AtomId>, // Map from atom name to its stable ID
    secondary_structure: Option<SecondaryStructure>,
}

impl Residue {
    pub(crate) fn new(
        residue_number: isize,
        insertion_code: Option<char>,
        name: &str,
        residue_type: Option<ResidueType>,
        chain_id: ChainId,
    ) -> Self {
        Self {
            residue_number,
            insertion_code,
            name: name.to_string(),
            residue_type,
            chain_id,
            atoms: Vec::new(),
            atom_name_map: HashMap::new(),
            secondary_structure: None,
        }
    }

    pub(crate) fn add_atom(&mut self, atom_name: &str, atom_id: AtomId) {
        self.atoms.push(atom_id);
        self.atom_name_map
            .entry(atom_name.to_string())
            .or_insert(atom_id);
    }

    pub fn atoms(&self) -> &[AtomId] {
        &self.atoms
    }

    pub fn get_atom_id_by_name(&self, name: &str) -> Option<AtomId> {
        self.atom_name_map.get(name).copied()
    }

    pub fn charge_class(&self) -> ChargeClass {
        self.residue_type
            .map(ResidueType::charge_class)
            .unwrap_or(ChargeClass::Neutral)
    }

    pub fn secondary_structure(&self) -> Option<SecondaryStructure> {
        self.secondary_structure
    }

    /// Attaches the externally computed label. Labels are write-once.
    pub fn set_secondary_structure(&mut self, label: SecondaryStructure) -> Result<(), ModelError> {
        if let Some(existing) = self.secondary_structure {
            return Err(ModelError::LabelAlreadyAssigned {
                residue_number: self.residue_number,
                existing,
            });
        }
        self.secondary_structure = Some(label);
        Ok(())
    }

    /// Residue number with insertion code, e.g. "52" or "52A".
    pub fn label(&self) -> String {
        match self.insertion_code {
            Some(code) => format!("{}{}", self.residue_number, code),
            None => self.residue_number.to_string(),
        }
    }
}
