use super::ids::ResidueId;
use nalgebra::Point3;

/// Atom names used to trace the helix axis, in within-residue order.
pub const AXIS_BACKBONE_ATOMS: [&str; 3] = ["N", "CA", "C"];

/// An atom record from a coordinate file.
///
/// The `residue_id` is a back-reference into the owning [`Structure`](super::structure::Structure);
/// the atom never owns its residue.
#[derive(Debug, Clone, PartialEq)]
pub struct Atom {
    /// Serial number from the source file.
    pub serial: usize,
    /// The atom name (e.g., "CA", "NZ"), trimmed.
    pub name: String,
    /// Alternate location indicator, if any.
    pub alt_loc: Option<char>,
    /// Element symbol (columns 77-78), if present.
    pub element: Option<String>,
    /// The 3D coordinates of the atom in Angstroms.
    pub position: Point3<f64>,
    /// Occupancy, defaulted to 1.0 when the column is missing.
    pub occupancy: f64,
    /// Isotropic temperature factor, defaulted to 0.0 when missing.
    pub temp_factor: f64,
    /// Whether the atom came from a HETATM record.
    pub is_hetero: bool,
    /// The ID of the parent residue this atom belongs to.
    pub residue_id: ResidueId,
}

impl Atom {
    pub fn new(name: &str, residue_id: ResidueId, position: Point3<f64>) -> Self {
        Self {
            serial: 0,
            name: name.to_string(),
            alt_loc: None,
            element: None,
            position,
            occupancy: 1.0,
            temp_factor: 0.0,
            is_hetero: false,
            residue_id,
        }
    }

    /// Element symbol, falling back to the first letter of the atom name.
    pub fn element_symbol(&self) -> &str {
        match &self.element {
            Some(e) => e.as_str(),
            None => self.name.get(0..1).unwrap_or(""),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_atom_has_expected_default_fields() {
        let residue_id = ResidueId::default();
        let atom = Atom::new("CA", residue_id, Point3::new(1.0, 2.0, 3.0));

        assert_eq!(atom.name, "CA");
        assert_eq!(atom.residue_id, residue_id);
        assert_eq!(atom.position, Point3::new(1.0, 2.0, 3.0));
        assert_eq!(atom.occupancy, 1.0);
        assert_eq!(atom.temp_factor, 0.0);
        assert!(atom.alt_loc.is_none());
        assert!(!atom.is_hetero);
    }

    #[test]
    fn element_symbol_falls_back_to_name() {
        let mut atom = Atom::new("NZ", ResidueId::default(), Point3::origin());
        assert_eq!(atom.element_symbol(), "N");
        atom.element = Some("N".to_string());
        assert_eq!(atom.element_symbol(), "N");
    }
}
