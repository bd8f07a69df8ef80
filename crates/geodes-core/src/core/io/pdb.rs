use crate::core::io::traits::StructureFile;
use crate::core::models::atom::Atom;
use crate::core::models::ids::{ChainId, ResidueId};
use crate::core::models::structure::Structure;
use nalgebra::Point3;
use std::collections::HashSet;
use std::io::{self, BufRead, Write};
use thiserror::Error;

const MAX_SERIAL: usize = 99_999;
const MINIMAL_HEADER: &str = "HEADER    PROTEIN                                 01-JAN-00   ";

#[derive(Debug, Error)]
pub enum PdbError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error on line {line}: {kind}")]
    Parse { line: usize, kind: PdbParseErrorKind },
    #[error("Chain '{chain}' continues on line {line} after its TER record")]
    ChainReopened { line: usize, chain: char },
    #[error("MODEL on line {line} opened before the previous model was closed with ENDMDL")]
    UnterminatedModel { line: usize },
    #[error("No ATOM/HETATM records found")]
    NoAtoms,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PdbParseErrorKind {
    #[error("Invalid integer format in columns {columns} (value: '{value}')")]
    InvalidInt { columns: &'static str, value: String },
    #[error("Invalid float format in columns {columns} (value: '{value}')")]
    InvalidFloat { columns: &'static str, value: String },
    #[error("Required field in columns {columns} is empty")]
    MissingRequiredField { columns: &'static str },
    #[error("Line is too short for ATOM/HETATM record (must be at least 54 chars)")]
    LineTooShort,
}

/// Fixed-column slice that tolerates short lines.
fn column(line: &str, start: usize, end: usize) -> &str {
    let end = end.min(line.len());
    line.get(start..end).unwrap_or("")
}

fn parse_int(line: &str, line_num: usize, start: usize, end: usize, columns: &'static str) -> Result<isize, PdbError> {
    let value = column(line, start, end).trim();
    value.parse().map_err(|_| PdbError::Parse {
        line: line_num,
        kind: PdbParseErrorKind::InvalidInt {
            columns,
            value: value.to_string(),
        },
    })
}

fn parse_float(line: &str, line_num: usize, start: usize, end: usize, columns: &'static str) -> Result<f64, PdbError> {
    let value = column(line, start, end).trim();
    value
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| PdbError::Parse {
            line: line_num,
            kind: PdbParseErrorKind::InvalidFloat {
                columns,
                value: value.to_string(),
            },
        })
}

/// Optional numeric column: blank or absent yields the default.
fn parse_optional_float(
    line: &str,
    line_num: usize,
    start: usize,
    end: usize,
    columns: &'static str,
    default: f64,
) -> Result<f64, PdbError> {
    if column(line, start, end).trim().is_empty() {
        Ok(default)
    } else {
        parse_float(line, line_num, start, end, columns)
    }
}

fn optional_char(line: &str, index: usize) -> Option<char> {
    column(line, index, index + 1)
        .chars()
        .next()
        .filter(|c| !c.is_whitespace())
}

/// Parses the resolution value out of a `REMARK   2 RESOLUTION.` line.
fn parse_resolution(line: &str) -> Option<f64> {
    let rest = line.split("RESOLUTION.").nth(1)?;
    rest.split_whitespace().next()?.parse().ok()
}

#[derive(Default)]
struct ReaderState {
    current_chain: Option<(char, ChainId)>,
    current_residue: Option<ResidueId>,
    terminated_chains: HashSet<char>,
    model_open: bool,
    seen_model: bool,
    saw_atoms: bool,
}

pub struct PdbFile;

impl PdbFile {
    /// Parses PDB-format text into a structure with the given identifier.
    pub fn parse_str(id: &str, text: &str) -> Result<Structure, PdbError> {
        let mut reader = io::Cursor::new(text.as_bytes());
        let mut structure = Self::read_from(&mut reader)?;
        structure.set_id(id);
        Ok(structure)
    }

    fn read_atom_record(
        structure: &mut Structure,
        state: &mut ReaderState,
        line: &str,
        line_num: usize,
        is_hetero: bool,
    ) -> Result<(), PdbError> {
        if line.len() < 54 {
            return Err(PdbError::Parse {
                line: line_num,
                kind: PdbParseErrorKind::LineTooShort,
            });
        }

        // Serials are echoed on write only; hybrid-36 and overflowed (`*****`) values read as 0.
        let serial = column(line, 6, 11).trim().parse::<usize>().unwrap_or(0);
        let name = column(line, 12, 16).trim();
        if name.is_empty() {
            return Err(PdbError::Parse {
                line: line_num,
                kind: PdbParseErrorKind::MissingRequiredField { columns: "13-16" },
            });
        }
        let alt_loc = optional_char(line, 16);
        let res_name = column(line, 17, 20).trim();
        if res_name.is_empty() {
            return Err(PdbError::Parse {
                line: line_num,
                kind: PdbParseErrorKind::MissingRequiredField { columns: "18-20" },
            });
        }
        let chain_char = column(line, 21, 22).chars().next().unwrap_or(' ');
        let res_seq = parse_int(line, line_num, 22, 26, "23-26")?;
        let insertion_code = optional_char(line, 26);
        let x = parse_float(line, line_num, 30, 38, "31-38")?;
        let y = parse_float(line, line_num, 38, 46, "39-46")?;
        let z = parse_float(line, line_num, 46, 54, "47-54")?;
        let occupancy = parse_optional_float(line, line_num, 54, 60, "55-60", 1.0)?;
        let temp_factor = parse_optional_float(line, line_num, 60, 66, "61-66", 0.0)?;
        let element = Some(column(line, 76, 78).trim())
            .filter(|e| !e.is_empty())
            .map(str::to_string);

        // Ligands and waters commonly follow the TER of their chain; polymer atoms may not.
        if !is_hetero && state.terminated_chains.contains(&chain_char) {
            return Err(PdbError::ChainReopened {
                line: line_num,
                chain: chain_char,
            });
        }

        let chain_id = match state.current_chain {
            Some((id, chain_id)) if id == chain_char => chain_id,
            previous => {
                if let Some((prev_id, _)) = previous {
                    if !is_hetero {
                        state.terminated_chains.insert(prev_id);
                    }
                }
                let chain_id = structure.add_chain(chain_char);
                state.current_chain = Some((chain_char, chain_id));
                state.current_residue = None;
                chain_id
            }
        };

        let residue_id = match state.current_residue {
            Some(rid)
                if structure.residue(rid).is_some_and(|r| {
                    r.residue_number == res_seq && r.insertion_code == insertion_code
                }) =>
            {
                rid
            }
            _ => {
                let rid = structure
                    .add_residue(chain_id, res_seq, insertion_code, res_name)
                    .ok_or_else(|| {
                        PdbError::Io(io::Error::other(format!(
                            "chain '{}' vanished while reading line {}",
                            chain_char, line_num
                        )))
                    })?;
                state.current_residue = Some(rid);
                rid
            }
        };

        if alt_loc.is_some()
            && structure
                .residue(residue_id)
                .is_some_and(|r| r.get_atom_id_by_name(name).is_some())
        {
            // Only the first alternate location of an atom is kept.
            return Ok(());
        }

        let atom = Atom {
            serial,
            name: name.to_string(),
            alt_loc,
            element,
            position: Point3::new(x, y, z),
            occupancy,
            temp_factor,
            is_hetero,
            residue_id,
        };
        structure.add_atom_to_residue(residue_id, atom);
        state.saw_atoms = true;
        Ok(())
    }
}

impl StructureFile for PdbFile {
    type Error = PdbError;

    fn read_from(reader: &mut impl BufRead) -> Result<Structure, Self::Error> {
        let mut structure = Structure::default();
        let mut state = ReaderState::default();
        let mut title = String::new();

        for (line_num, line_res) in reader.lines().enumerate() {
            let line = line_res?;
            let line_num = line_num + 1;
            let record_type = column(&line, 0, 6).trim_end();

            match record_type {
                "ATOM" | "HETATM" => {
                    Self::read_atom_record(
                        &mut structure,
                        &mut state,
                        &line,
                        line_num,
                        record_type == "HETATM",
                    )?;
                }
                "TER" => {
                    if let Some((chain, _)) = state.current_chain.take() {
                        state.terminated_chains.insert(chain);
                    }
                    state.current_residue = None;
                }
                "MODEL" => {
                    if state.model_open {
                        return Err(PdbError::UnterminatedModel { line: line_num });
                    }
                    if state.seen_model {
                        break;
                    }
                    state.model_open = true;
                    state.seen_model = true;
                }
                "ENDMDL" => break,
                "END" => break,
                "HEADER" => {
                    let code = column(&line, 62, 66).trim();
                    if !code.is_empty() {
                        structure.metadata_mut().pdb_code = Some(code.to_string());
                    }
                }
                "TITLE" => {
                    let text = column(&line, 10, 80).trim();
                    if !text.is_empty() {
                        if !title.is_empty() {
                            title.push(' ');
                        }
                        title.push_str(text);
                    }
                }
                "REMARK" => {
                    if column(&line, 6, 10).trim() == "2" {
                        if let Some(resolution) = parse_resolution(&line) {
                            structure.metadata_mut().resolution = Some(resolution);
                        }
                    }
                }
                _ => {}
            }
        }

        if !state.saw_atoms {
            return Err(PdbError::NoAtoms);
        }
        if !title.is_empty() {
            structure.metadata_mut().title = Some(title);
        }
        Ok(structure)
    }

    /// Writes a minimal PDB: HEADER, ATOM/HETATM, TER per chain, END.
    fn write_to(structure: &Structure, writer: &mut impl Write) -> Result<(), Self::Error> {
        let code = structure.metadata().pdb_code.as_deref().unwrap_or("XXXX");
        writeln!(writer, "{}{:<4}", MINIMAL_HEADER, code)?;

        let mut serial = 0usize;
        for (chain_id, chain) in structure.chains() {
            let residues: Vec<_> = structure.chain_residues(chain_id).collect();
            // TER closes the polymer; modified residues inside it stay before the TER.
            let last_polymer = residues.iter().rposition(|(residue_id, _)| {
                structure.residue_atoms(*residue_id).any(|(_, atom)| !atom.is_hetero)
            });

            for (index, (residue_id, residue)) in residues.iter().enumerate() {
                for (_, atom) in structure.residue_atoms(*residue_id) {
                    serial += 1;
                    let atom_serial = if (1..=MAX_SERIAL).contains(&atom.serial) {
                        atom.serial
                    } else {
                        serial
                    };
                    let record = if atom.is_hetero { "HETATM" } else { "ATOM" };
                    let name_field = if atom.name.len() < 4 {
                        format!(" {:<3}", atom.name)
                    } else {
                        atom.name.clone()
                    };
                    writeln!(
                        writer,
                        "{:<6}{:>5} {:<4}{}{:>3} {}{:>4}{}   {:>8.3}{:>8.3}{:>8.3}{:>6.2}{:>6.2}          {:>2}",
                        record,
                        atom_serial % (MAX_SERIAL + 1),
                        name_field,
                        atom.alt_loc.unwrap_or(' '),
                        residue.name,
                        chain.id,
                        residue.residue_number,
                        residue.insertion_code.unwrap_or(' '),
                        atom.position.x,
                        atom.position.y,
                        atom.position.z,
                        atom.occupancy,
                        atom.temp_factor,
                        atom.element_symbol(),
                    )?;
                }
                if last_polymer == Some(index) {
                    serial += 1;
                    write_ter(
                        writer,
                        serial % (MAX_SERIAL + 1),
                        &residue.name,
                        chain.id,
                        residue.residue_number,
                        residue.insertion_code,
                    )?;
                }
            }
        }

        writeln!(writer, "END")?;
        Ok(())
    }
}

fn write_ter(
    writer: &mut impl Write,
    serial: usize,
    res_name: &str,
    chain: char,
    residue_number: isize,
    insertion_code: Option<char>,
) -> io::Result<()> {
    writeln!(
        writer,
        "TER   {:>5}      {:>3} {}{:>4}{}",
        serial,
        res_name,
        chain,
        residue_number,
        insertion_code.unwrap_or(' ')
    )
}
