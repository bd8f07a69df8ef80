use super::{SecondaryStructureAssigner, SecondaryStructureMap};
use crate::core::io::pdb::PdbFile;
use crate::core::io::traits::StructureFile;
use crate::core::models::residue::SecondaryStructure;
use crate::core::models::structure::{ResidueKey, Structure};
use crate::core::process::{ExternalToolError, run_with_timeout, tool_name};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;
use tracing::{debug, instrument};

const TABLE_HEADER: &str = "  #  RESIDUE";
pub const DEFAULT_DSSP_EXECUTABLE: &str = "mkdssp";
pub const DEFAULT_DSSP_TIMEOUT: Duration = Duration::from_secs(60);

/// One residue row of a classic-format DSSP file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DsspRecord {
    pub key: ResidueKey,
    pub amino_acid: char,
    /// Raw one-letter structure code (blank for coil).
    pub code: char,
}

impl DsspRecord {
    pub fn label(&self) -> SecondaryStructure {
        SecondaryStructure::from_dssp_code(self.code)
    }
}

/// Parses the residue table of classic-format DSSP output.
///
/// Chain-break rows (`!`) are skipped. Columns (1-based): residue number 6-10,
/// insertion code 11, chain 12, amino acid 14, structure code 17.
pub fn parse_dssp_output(tool: &str, text: &str) -> Result<Vec<DsspRecord>, ExternalToolError> {
    let malformed = |line: usize, reason: String| ExternalToolError::MalformedOutput {
        tool: tool.to_string(),
        line,
        reason,
    };

    let mut lines = text.lines().enumerate();
    if !lines.any(|(_, line)| line.starts_with(TABLE_HEADER)) {
        return Err(malformed(0, "residue table header not found".to_string()));
    }

    let mut records = Vec::new();
    for (index, line) in lines {
        let line_num = index + 1;
        if line.trim().is_empty() {
            continue;
        }
        let bytes = line.as_bytes();
        if bytes.len() < 14 {
            return Err(malformed(line_num, "residue row is too short".to_string()));
        }
        let amino_acid = bytes[13] as char;
        if amino_acid == '!' {
            continue;
        }

        let number_field = line.get(5..10).unwrap_or("").trim();
        let number: isize = number_field.parse().map_err(|_| {
            malformed(
                line_num,
                format!("invalid residue number '{}'", number_field),
            )
        })?;
        let insertion_code = Some(bytes[10] as char).filter(|c| !c.is_whitespace());
        let chain = bytes[11] as char;
        let code = bytes.get(16).map(|&b| b as char).unwrap_or(' ');

        records.push(DsspRecord {
            key: ResidueKey::new(chain, number, insertion_code),
            amino_acid,
            code,
        });
    }

    if records.is_empty() {
        return Err(malformed(0, "residue table is empty".to_string()));
    }
    Ok(records)
}

/// Runs `mkdssp` on a cleaned copy of the structure.
#[derive(Debug, Clone)]
pub struct DsspAssigner {
    executable: PathBuf,
    timeout: Duration,
}

impl Default for DsspAssigner {
    fn default() -> Self {
        Self::new(DEFAULT_DSSP_EXECUTABLE, DEFAULT_DSSP_TIMEOUT)
    }
}

impl DsspAssigner {
    pub fn new<P: Into<PathBuf>>(executable: P, timeout: Duration) -> Self {
        Self {
            executable: executable.into(),
            timeout,
        }
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl SecondaryStructureAssigner for DsspAssigner {
    fn name(&self) -> &str {
        "dssp"
    }

    #[instrument(skip_all, name = "dssp_assign", fields(structure = %structure.id()))]
    fn assign(&self, structure: &Structure) -> Result<SecondaryStructureMap, ExternalToolError> {
        let tool = tool_name(&self.executable);
        let scratch = tempfile::Builder::new().prefix("geodes-dssp-").tempdir()?;
        let input = scratch.path().join("input.pdb");
        let output = scratch.path().join("output.dssp");

        PdbFile::write_to_path(structure, &input).map_err(|e| ExternalToolError::Input {
            tool: tool.clone(),
            reason: e.to_string(),
        })?;

        let mut command = Command::new(&self.executable);
        command
            .arg("--output-format=dssp")
            .arg(&input)
            .arg(&output);
        let result = run_with_timeout(command, &tool, self.timeout, scratch.path())?;

        // Some mkdssp builds ignore the output argument and print to stdout.
        let text = if output.exists() {
            std::fs::read_to_string(&output)?
        } else if result.stdout.contains(TABLE_HEADER) {
            result.stdout
        } else {
            return Err(ExternalToolError::MissingOutput { tool, path: output });
        };

        let map: SecondaryStructureMap = parse_dssp_output(&tool, &text)?
            .into_iter()
            .map(|record| (record.key, record.label()))
            .collect();
        debug!(labels = map.len(), "Parsed DSSP residue table");
        Ok(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(seq: usize, number: isize, icode: char, chain: char, aa: char, code: char) -> String {
        format!(
            "{:>5}{:>5}{}{} {}  {}  0   0   45      0, 0.0     0, 0.0",
            seq, number, icode, chain, aa, code
        )
    }

    fn sample_output() -> String {
        let mut text = String::from(
            "==== Secondary Structure Definition by the program DSSP ====\n\
             REFERENCE W. KABSCH AND C.SANDER\n\
             \x20 #  RESIDUE AA STRUCTURE BP1 BP2  ACC     N-H-->O    O-->H-N\n",
        );
        text.push_str(&row(1, 118, ' ', 'A', 'L', ' '));
        text.push('\n');
        text.push_str(&row(2, 119, ' ', 'A', 'K', 'H'));
        text.push('\n');
        text.push_str("    3        !              0   0    0      0, 0.0     0, 0.0\n");
        text.push_str(&row(4, 120, 'A', 'A', 'E', 'G'));
        text.push('\n');
        text.push_str(&row(5, 5, ' ', 'B', 'V', 'E'));
        text.push('\n');
        text
    }

    #[test]
    fn parses_rows_and_skips_chain_breaks() {
        let records = parse_dssp_output("mkdssp", &sample_output()).unwrap();
        assert_eq!(records.len(), 4);
        assert_eq!(records[0].key, ResidueKey::new('A', 118, None));
        assert_eq!(records[0].label(), SecondaryStructure::Coil);
        assert_eq!(records[1].label(), SecondaryStructure::Helix);
        assert_eq!(records[2].key, ResidueKey::new('A', 120, Some('A')));
        assert_eq!(records[2].label(), SecondaryStructure::Helix);
        assert_eq!(records[3].key.chain, 'B');
        assert_eq!(records[3].label(), SecondaryStructure::Strand);
    }

    #[test]
    fn output_without_table_is_malformed() {
        let err = parse_dssp_output("mkdssp", "HEADER only\n").unwrap_err();
        assert!(matches!(err, ExternalToolError::MalformedOutput { line: 0, .. }));
    }

    #[test]
    fn garbled_residue_number_reports_line() {
        let mut text = sample_output();
        text.push_str("    6  x1x A L  H\n");
        let err = parse_dssp_output("mkdssp", &text).unwrap_err();
        match err {
            ExternalToolError::MalformedOutput { line, .. } => assert_eq!(line, 9),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[cfg(unix)]
    mod subprocess {
        use super::*;
        use crate::core::io::pdb::PdbFile;
        use crate::core::process::test_support::fake_tool;

        const PEPTIDE: &str = "\
ATOM      1  CA  LEU A 118       0.000   0.000   0.000  1.00  0.00           C
ATOM      2  CA  LYS A 119       3.800   0.000   0.000  1.00  0.00           C
";

        #[test]
        fn reads_table_written_by_tool() {
            let dir = tempfile::tempdir().unwrap();
            let table = dir.path().join("canned.dssp");
            std::fs::write(&table, sample_output()).unwrap();
            let tool = fake_tool(
                dir.path(),
                "mkdssp",
                &format!("cp '{}' \"$3\"", table.display()),
            );

            let structure = PdbFile::parse_str("pep", PEPTIDE).unwrap();
            let map = DsspAssigner::new(&tool, Duration::from_secs(5))
                .assign(&structure)
                .unwrap();
            assert_eq!(
                map.get(&ResidueKey::new('A', 119, None)),
                Some(SecondaryStructure::Helix)
            );
        }

        #[test]
        fn reads_table_from_stdout_when_no_file_is_written() {
            let dir = tempfile::tempdir().unwrap();
            let table = dir.path().join("canned.dssp");
            std::fs::write(&table, sample_output()).unwrap();
            let tool = fake_tool(dir.path(), "mkdssp", &format!("cat '{}'", table.display()));

            let structure = PdbFile::parse_str("pep", PEPTIDE).unwrap();
            let map = DsspAssigner::new(&tool, Duration::from_secs(5))
                .assign(&structure)
                .unwrap();
            assert_eq!(map.len(), 4);
        }

        #[test]
        fn failing_tool_is_not_defaulted_to_coil() {
            let dir = tempfile::tempdir().unwrap();
            let tool = fake_tool(dir.path(), "mkdssp", "echo 'no header' >&2; exit 1");
            let structure = PdbFile::parse_str("pep", PEPTIDE).unwrap();
            let err = DsspAssigner::new(&tool, Duration::from_secs(5))
                .assign(&structure)
                .unwrap_err();
            assert!(matches!(err, ExternalToolError::NonZeroExit { .. }));
        }

        #[test]
        fn silent_tool_is_missing_output() {
            let dir = tempfile::tempdir().unwrap();
            let tool = fake_tool(dir.path(), "mkdssp", "exit 0");
            let structure = PdbFile::parse_str("pep", PEPTIDE).unwrap();
            let err = DsspAssigner::new(&tool, Duration::from_secs(5))
                .assign(&structure)
                .unwrap_err();
            assert!(matches!(err, ExternalToolError::MissingOutput { .. }));
        }
    }
}
