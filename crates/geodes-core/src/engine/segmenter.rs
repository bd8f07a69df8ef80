use super::config::{ChainScope, HelixConfig, HelixWindow};
use crate::core::models::ids::{ChainId, ResidueId};
use crate::core::models::residue::SecondaryStructure;
use crate::core::models::structure::Structure;
use std::ops::RangeInclusive;
use thiserror::Error;

/// A contiguous run of residues selected for axis fitting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentSpan {
    pub chain: char,
    pub chain_id: ChainId,
    /// Inclusive indices into the chain's residue list.
    pub start_index: usize,
    pub end_index: usize,
    pub start_number: isize,
    pub end_number: isize,
    pub residues: Vec<ResidueId>,
    /// Index of the reference window the segment came from, if windows are configured.
    pub window: Option<usize>,
}

impl SegmentSpan {
    pub fn len(&self) -> usize {
        self.end_index - self.start_index + 1
    }

    pub fn is_empty(&self) -> bool {
        self.residues.is_empty()
    }
}

/// Why a reference window produced no segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum WindowMiss {
    #[error("no residues of the window are present in the structure")]
    NoResidues,
    #[error("no helix within window")]
    NoHelix,
    #[error("helix within window is shorter than the minimum length of {min_length}")]
    TooShort { min_length: usize },
}

/// A configured reference window without a segment.
///
/// `chain` is `None` when no in-scope chain has any residue numbered inside
/// the window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnmatchedWindow {
    pub chain: Option<char>,
    pub window: usize,
    pub bounds: HelixWindow,
    pub reason: WindowMiss,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Segmentation {
    pub spans: Vec<SegmentSpan>,
    /// Always empty when no windows are configured.
    pub unmatched: Vec<UnmatchedWindow>,
}

/// Finds helix segments in one label sequence.
///
/// Each maximal run of `Helix` labels at least `min_length` long has its start
/// moved by `+start_offset` and its end by `-end_offset` (negative offsets grow
/// the run into flanking residues). The result is clamped to the sequence and
/// dropped if it is then shorter than `min_length`.
pub fn segment_labels(
    labels: &[SecondaryStructure],
    start_offset: isize,
    end_offset: isize,
    min_length: usize,
) -> Vec<RangeInclusive<usize>> {
    if labels.is_empty() {
        return Vec::new();
    }
    let last = labels.len() as isize - 1;

    helix_runs(labels)
        .into_iter()
        .filter(|run| run.end() - run.start() + 1 >= min_length)
        .filter_map(|run| {
            let start = (*run.start() as isize + start_offset).clamp(0, last);
            let end = (*run.end() as isize - end_offset).clamp(0, last);
            if start > end || ((end - start + 1) as usize) < min_length {
                return None;
            }
            Some(start as usize..=end as usize)
        })
        .collect()
}

fn helix_runs(labels: &[SecondaryStructure]) -> Vec<RangeInclusive<usize>> {
    let mut runs = Vec::new();
    let mut open: Option<usize> = None;
    for (i, label) in labels.iter().enumerate() {
        match (*label, open) {
            (SecondaryStructure::Helix, None) => open = Some(i),
            (SecondaryStructure::Helix, Some(_)) => {}
            (_, Some(start)) => {
                runs.push(start..=i - 1);
                open = None;
            }
            (_, None) => {}
        }
    }
    if let Some(start) = open {
        runs.push(start..=labels.len() - 1);
    }
    runs
}

/// Segments every in-scope chain of a labeled structure.
///
/// With reference windows configured, each window is segmented on its own:
/// only residues whose numbers fall inside it take part, and offsets are
/// clamped to the window's residues. A window that yields no segment in a
/// chain holding some of its residues is reported for that chain; a window
/// with no residues in any chain is reported once.
pub fn segment_structure(structure: &Structure, helix: &HelixConfig, scope: &ChainScope) -> Segmentation {
    let mut segmentation = Segmentation::default();
    let mut window_present = vec![false; helix.windows.len()];

    for (chain_id, chain) in structure.chains() {
        if !scope.contains(chain.id) {
            continue;
        }
        // (chain index, residue id, number, label)
        let residues: Vec<(usize, ResidueId, isize, SecondaryStructure)> = structure
            .chain_residues(chain_id)
            .enumerate()
            .map(|(index, (id, residue))| {
                (
                    index,
                    id,
                    residue.residue_number,
                    residue
                        .secondary_structure()
                        .unwrap_or(SecondaryStructure::Other),
                )
            })
            .collect();

        let groups: Vec<(Option<usize>, Vec<&(usize, ResidueId, isize, SecondaryStructure)>)> =
            if helix.windows.is_empty() {
                vec![(None, residues.iter().collect())]
            } else {
                helix
                    .windows
                    .iter()
                    .enumerate()
                    .map(|(w, window)| {
                        (
                            Some(w),
                            residues.iter().filter(|r| window.contains(r.2)).collect(),
                        )
                    })
                    .collect()
            };

        for (window, members) in groups {
            let labels: Vec<_> = members.iter().map(|r| r.3).collect();
            let ranges = segment_labels(&labels, helix.start_offset, helix.end_offset, helix.min_length);

            if let Some(w) = window {
                if !members.is_empty() {
                    window_present[w] = true;
                }
                if !members.is_empty() && ranges.is_empty() {
                    let reason = if labels.contains(&SecondaryStructure::Helix) {
                        WindowMiss::TooShort {
                            min_length: helix.min_length,
                        }
                    } else {
                        WindowMiss::NoHelix
                    };
                    segmentation.unmatched.push(UnmatchedWindow {
                        chain: Some(chain.id),
                        window: w,
                        bounds: helix.windows[w],
                        reason,
                    });
                }
            }

            for range in ranges {
                let slice = &members[range];
                let (Some(first), Some(last)) = (slice.first(), slice.last()) else {
                    continue;
                };
                segmentation.spans.push(SegmentSpan {
                    chain: chain.id,
                    chain_id,
                    start_index: first.0,
                    end_index: last.0,
                    start_number: first.2,
                    end_number: last.2,
                    residues: slice.iter().map(|r| r.1).collect(),
                    window,
                });
            }
        }
    }

    segmentation.unmatched.extend(
        helix
            .windows
            .iter()
            .enumerate()
            .filter(|(w, _)| !window_present[*w])
            .map(|(w, bounds)| UnmatchedWindow {
                chain: None,
                window: w,
                bounds: *bounds,
                reason: WindowMiss::NoResidues,
            }),
    );
    segmentation
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::atom::Atom;
    use crate::engine::config::{DescriptorConfig, HelixWindow};
    use nalgebra::Point3;
    use crate::core::models::residue::SecondaryStructure::{Coil as C, Helix as H, Strand as E};

    #[test]
    fn single_run_of_length_l_yields_one_segment() {
        let labels = [C, C, H, H, H, H, H, H, C];
        assert_eq!(segment_labels(&labels, 0, 0, 4), vec![2..=7]);
    }

    #[test]
    fn short_runs_are_dropped() {
        let labels = [H, H, H, C, H, H, H, H];
        assert_eq!(segment_labels(&labels, 0, 0, 4), vec![4..=7]);
        // Trimming can push a run below the minimum.
        assert!(segment_labels(&[H, H, H, H, H], 1, 1, 4).is_empty());
        assert!(segment_labels(&[], 0, 0, 4).is_empty());
    }

    #[test]
    fn positive_offsets_shrink_and_negative_offsets_grow() {
        let labels = [C, C, H, H, H, H, H, H, C, C];
        assert_eq!(segment_labels(&labels, 1, 2, 3), vec![3..=5]);
        assert_eq!(segment_labels(&labels, -1, -1, 4), vec![1..=8]);
    }

    #[test]
    fn grown_runs_are_clamped_to_the_chain() {
        let labels = [H, H, H, H, E];
        assert_eq!(segment_labels(&labels, -3, -3, 4), vec![0..=4]);
    }

    #[test]
    fn runs_at_both_ends_are_closed() {
        let labels = [H, H, H, H, C, H, H, H, H];
        assert_eq!(segment_labels(&labels, 0, 0, 4), vec![0..=3, 5..=8]);
    }

    fn labeled_chain(labels: &[SecondaryStructure], first_number: isize) -> Structure {
        let mut s = Structure::new("seg");
        let chain = s.add_chain('A');
        for (i, label) in labels.iter().enumerate() {
            let rid = s
                .add_residue(chain, first_number + i as isize, None, "ALA")
                .unwrap();
            s.add_atom_to_residue(rid, Atom::new("CA", rid, Point3::new(i as f64, 0.0, 0.0)));
            s.residue_mut(rid).unwrap().set_secondary_structure(*label).unwrap();
        }
        s
    }

    #[test]
    fn structure_segments_report_residue_numbers() {
        let s = labeled_chain(&[C, H, H, H, H, H, C], 100);
        let config = DescriptorConfig::default();
        let Segmentation { spans, unmatched } = segment_structure(&s, &config.helix, &config.chain_scope);
        assert!(unmatched.is_empty());
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].start_index, 1);
        assert_eq!(spans[0].end_index, 5);
        assert_eq!(spans[0].start_number, 101);
        assert_eq!(spans[0].end_number, 105);
        assert_eq!(spans[0].len(), 5);
        assert_eq!(spans[0].window, None);
    }

    #[test]
    fn windows_split_a_long_helix_and_record_their_index() {
        let s = labeled_chain(&[H; 12], 1);
        let mut config = DescriptorConfig::default();
        config.helix.windows = vec![HelixWindow::new(1, 5), HelixWindow::new(7, 12)];
        let spans = segment_structure(&s, &config.helix, &config.chain_scope).spans;
        let summary: Vec<_> = spans
            .iter()
            .map(|s| (s.window, s.start_number, s.end_number))
            .collect();
        assert_eq!(summary, vec![(Some(0), 1, 5), (Some(1), 7, 12)]);
    }

    #[test]
    fn windows_without_a_segment_are_reported_with_a_reason() {
        let s = labeled_chain(&[H, H, H, H, H, H, C, C, C, H, H, C], 1);
        let mut config = DescriptorConfig::default();
        config.helix.windows = vec![
            HelixWindow::new(1, 6),
            HelixWindow::new(7, 9),
            HelixWindow::new(10, 12),
            HelixWindow::new(50, 60),
        ];
        let Segmentation { spans, unmatched } = segment_structure(&s, &config.helix, &config.chain_scope);
        assert_eq!(spans.len(), 1);
        let misses: Vec<_> = unmatched.iter().map(|u| (u.chain, u.window, u.reason)).collect();
        assert_eq!(
            misses,
            vec![
                (Some('A'), 1, WindowMiss::NoHelix),
                (Some('A'), 2, WindowMiss::TooShort { min_length: 4 }),
                (None, 3, WindowMiss::NoResidues),
            ]
        );
        assert_eq!(unmatched[2].bounds, HelixWindow::new(50, 60));
    }

    #[test]
    fn out_of_scope_chains_are_skipped() {
        let s = labeled_chain(&[H; 6], 1);
        let config = DescriptorConfig::default();
        let scope = ChainScope::Only(['B'].into_iter().collect());
        assert_eq!(segment_structure(&s, &config.helix, &scope), Segmentation::default());
    }
}
