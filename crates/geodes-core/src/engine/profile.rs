use super::config::HelixWindow;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("TOML parsing error for '{path}': {source}")]
    Toml {
        path: String,
        source: toml::de::Error,
    },
    #[error("Unknown built-in profile '{0}'")]
    UnknownBuiltin(String),
}

/// Protein family definition: where its reference helices lie and which
/// residues form its charge clamp.
///
/// ```toml
/// name = "hVDR"
/// helices = [[127, 142], [149, 152]]
/// clamps = [246, 264, 420]
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProteinProfile {
    pub name: String,
    #[serde(default)]
    helices: Vec<[isize; 2]>,
    #[serde(default)]
    clamps: Vec<isize>,
}

// Human vitamin D receptor ligand-binding domain.
const HVDR_HELICES: [[isize; 2]; 14] = [
    [127, 142],
    [149, 152],
    [218, 222],
    [226, 246],
    [257, 265],
    [268, 278],
    [298, 302],
    [308, 322],
    [328, 338],
    [350, 369],
    [379, 396],
    [397, 406],
    [411, 413],
    [417, 423],
];
const HVDR_CLAMPS: [isize; 3] = [246, 264, 420];

impl ProteinProfile {
    pub fn new(name: &str, windows: &[HelixWindow], clamps: &[isize]) -> Self {
        Self {
            name: name.to_string(),
            helices: windows.iter().map(|w| [w.start, w.end]).collect(),
            clamps: clamps.to_vec(),
        }
    }

    pub fn hvdr() -> Self {
        Self {
            name: "hVDR".to_string(),
            helices: HVDR_HELICES.to_vec(),
            clamps: HVDR_CLAMPS.to_vec(),
        }
    }

    pub fn builtin(name: &str) -> Result<Self, ProfileError> {
        match name.to_ascii_lowercase().as_str() {
            "hvdr" | "vdr" => Ok(Self::hvdr()),
            other => Err(ProfileError::UnknownBuiltin(other.to_string())),
        }
    }

    pub fn load(path: &Path) -> Result<Self, ProfileError> {
        let content = std::fs::read_to_string(path).map_err(|e| ProfileError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ProfileError::Toml {
            path: path.to_string_lossy().to_string(),
            source: e,
        })
    }

    pub fn windows(&self) -> Vec<HelixWindow> {
        self.helices
            .iter()
            .map(|[start, end]| HelixWindow::new(*start, *end))
            .collect()
    }

    pub fn focus_residues(&self) -> BTreeSet<isize> {
        self.clamps.iter().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hvdr_profile_has_fourteen_helices_and_three_clamp_residues() {
        let profile = ProteinProfile::builtin("hVDR").unwrap();
        let windows = profile.windows();
        assert_eq!(windows.len(), 14);
        assert_eq!(windows[0], HelixWindow::new(127, 142));
        assert_eq!(windows[13], HelixWindow::new(417, 423));
        assert_eq!(
            profile.focus_residues().into_iter().collect::<Vec<_>>(),
            vec![246, 264, 420]
        );
        assert!(ProteinProfile::builtin("er-alpha").is_err());
    }

    #[test]
    fn loads_profile_from_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(&path, "name = \"custom\"\nhelices = [[10, 20]]\nclamps = [15]\n").unwrap();
        let profile = ProteinProfile::load(&path).unwrap();
        assert_eq!(profile.name, "custom");
        assert_eq!(profile.windows(), vec![HelixWindow::new(10, 20)]);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "name = \"x\"\nhelix = [[1, 2]]\n").unwrap();
        assert!(matches!(
            ProteinProfile::load(&path),
            Err(ProfileError::Toml { .. })
        ));
        assert!(matches!(
            ProteinProfile::load(&dir.path().join("missing.toml")),
            Err(ProfileError::Io { .. })
        ));
    }
}
