use crate::engine::error::WorkflowError;
use std::path::{Path, PathBuf};
use tracing::debug;

const STRUCTURE_EXTENSIONS: [&str; 2] = ["pdb", "ent"];

fn is_structure_file(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| STRUCTURE_EXTENSIONS.iter().any(|s| e.eq_ignore_ascii_case(s)))
}

/// Expands the given paths into the ordered list of structure files.
///
/// Files are taken as given, in argument order. A directory contributes its
/// `*.pdb`/`*.ent` files (not recursively), sorted by file name.
pub fn collect_inputs(paths: &[PathBuf]) -> Result<Vec<PathBuf>, WorkflowError> {
    let mut inputs = Vec::new();
    for path in paths {
        if path.is_dir() {
            let mut entries: Vec<PathBuf> = std::fs::read_dir(path)?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| is_structure_file(p))
                .collect();
            entries.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
            debug!(directory = %path.display(), files = entries.len(), "Expanded input directory");
            inputs.extend(entries);
        } else {
            inputs.push(path.clone());
        }
    }
    if inputs.is_empty() {
        return Err(WorkflowError::NoInputs);
    }
    Ok(inputs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directories_expand_to_sorted_structure_files() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.pdb", "a.PDB", "c.ent", "notes.txt"] {
            std::fs::write(dir.path().join(name), "").unwrap();
        }
        std::fs::create_dir(dir.path().join("nested.pdb")).unwrap();
        let explicit = dir.path().join("notes.txt");

        let inputs = collect_inputs(&[explicit.clone(), dir.path().to_path_buf()]).unwrap();
        let names: Vec<_> = inputs
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["notes.txt", "a.PDB", "b.pdb", "c.ent"]);
    }

    #[test]
    fn empty_input_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            collect_inputs(&[dir.path().to_path_buf()]),
            Err(WorkflowError::NoInputs)
        ));
        assert!(matches!(collect_inputs(&[]), Err(WorkflowError::NoInputs)));
    }
}
