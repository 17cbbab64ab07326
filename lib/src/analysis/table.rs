use super::{ControlFlow, Frame, InferredType};
use crate::jvm::code::{Code, Instruction, Label, LocalVariable};
use crate::jvm::{Error, Name, UnqualifiedName};
use fixedbitset::FixedBitSet;
use std::collections::HashMap;

/// Instructions over which one local slot holds one variable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableRange {
    pub slot: u16,
    pub local_type: InferredType,

    /// First instruction in scope
    pub start: usize,

    /// Last instruction in scope (inclusive)
    pub end: usize,

    /// Instructions at which the variable actually holds a value
    existence: FixedBitSet,
}

impl VariableRange {
    fn open(slot: u16, local_type: InferredType, idx: usize, len: usize) -> VariableRange {
        let mut existence = FixedBitSet::with_capacity(len);
        existence.insert(idx);
        VariableRange {
            slot,
            local_type,
            start: idx,
            end: idx,
            existence,
        }
    }

    pub fn exists_at(&self, idx: usize) -> bool {
        idx < self.existence.len() && self.existence.contains(idx)
    }

    fn overlaps(&self, other: &VariableRange) -> bool {
        self.slot == other.slot && self.start <= other.end && other.start <= self.end
    }

    /// Type of the merged variable, if the two types can be one variable
    fn merged_type(&self, other: &VariableRange) -> Option<InferredType> {
        match (&self.local_type, &other.local_type) {
            (type1, type2) if type1 == type2 => Some(type1.clone()),
            (InferredType::Null, other_type) if other_type.is_reference() => {
                Some(other_type.clone())
            }
            (this_type, InferredType::Null) if this_type.is_reference() => {
                Some(this_type.clone())
            }
            _ => None,
        }
    }

    fn absorb(&mut self, other: VariableRange, local_type: InferredType) {
        self.local_type = local_type;
        self.start = self.start.min(other.start);
        self.end = self.end.max(other.end);
        self.existence.union_with(&other.existence);
    }

    /// Split into maximal runs of consecutive instructions where the variable exists
    fn into_runs(self) -> Vec<VariableRange> {
        let mut runs: Vec<VariableRange> = vec![];
        for idx in self.existence.ones() {
            match runs.last_mut() {
                Some(run) if run.end + 1 == idx => {
                    run.end = idx;
                    run.existence.insert(idx);
                }
                _ => runs.push(VariableRange::open(
                    self.slot,
                    self.local_type.clone(),
                    idx,
                    self.existence.len(),
                )),
            }
        }
        runs
    }
}

/// Work out the variable ranges implied by the frames
///
/// Every block contributes one range per stretch of a slot holding the same type. Ranges in
/// neighbouring blocks (along control flow edges) are then merged whenever they are compatible,
/// since a variable is still the same variable when control jumps around.
pub fn build_ranges(
    flow: &ControlFlow,
    frames: &[Option<Frame>],
    max_locals: usize,
) -> Vec<VariableRange> {
    let mut ranges = block_ranges(flow, frames, max_locals);
    merge_ranges(flow, &mut ranges);

    // Merged scopes may stretch over another variable in the same slot
    let overlapping: Vec<bool> = ranges
        .iter()
        .enumerate()
        .map(|(idx, range)| {
            ranges
                .iter()
                .enumerate()
                .any(|(other_idx, other)| other_idx != idx && range.overlaps(other))
        })
        .collect();

    let mut split: Vec<VariableRange> = Vec::with_capacity(ranges.len());
    for (range, overlaps) in ranges.into_iter().zip(overlapping) {
        if overlaps {
            log::trace!(
                "Splitting variable in slot {} over {}..={} into separate scopes",
                range.slot,
                range.start,
                range.end
            );
            split.extend(range.into_runs());
        } else {
            split.push(range);
        }
    }

    split.sort_by_key(|range| (range.slot, range.start));
    split
}

fn block_ranges(
    flow: &ControlFlow,
    frames: &[Option<Frame>],
    max_locals: usize,
) -> Vec<VariableRange> {
    let len = frames.len();
    let mut ranges: Vec<VariableRange> = vec![];

    for entry in flow.entry.ones() {
        let mut open: Vec<Option<usize>> = vec![None; max_locals];
        let mut idx = entry;

        while idx < len {
            let frame = frames[idx].as_ref();
            for (slot, open_range) in open.iter_mut().enumerate() {
                let local = frame.and_then(|frame| frame.locals.get(slot)).and_then(Option::as_ref);
                match local {
                    None | Some(InferredType::Top) => *open_range = None,
                    Some(local_type) => match open_range {
                        Some(range_idx) if &ranges[*range_idx].local_type == local_type => {
                            let range = &mut ranges[*range_idx];
                            range.end = idx;
                            range.existence.insert(idx);
                        }
                        _ => {
                            *open_range = Some(ranges.len());
                            ranges.push(VariableRange::open(
                                slot as u16,
                                local_type.clone(),
                                idx,
                                len,
                            ));
                        }
                    },
                }
            }

            if flow.exit.contains(idx) {
                break;
            }
            idx += 1;
        }
    }

    ranges
}

fn merge_ranges(flow: &ControlFlow, ranges: &mut Vec<VariableRange>) {
    let mut current = ranges.len();
    while current > 0 {
        current -= 1;

        'rescan: loop {
            let (start, end) = (ranges[current].start, ranges[current].end);
            for idx in start..=end {
                if !ranges[current].exists_at(idx) {
                    continue;
                }

                let mut neighbours: Vec<usize> = vec![];
                if let Some(sources) = flow.jump_sources(idx) {
                    neighbours.extend_from_slice(sources);
                }
                if idx > 0 && !ranges[current].exists_at(idx - 1) && flow.entry.contains(idx) {
                    neighbours.push(idx - 1);
                }
                if let Some(targets) = flow.jump_targets(idx) {
                    neighbours.extend_from_slice(targets);
                }
                neighbours.sort_unstable();
                neighbours.dedup();

                for neighbour in neighbours {
                    let found = ranges.iter().enumerate().find_map(|(other, range)| {
                        if other == current
                            || range.slot != ranges[current].slot
                            || !range.exists_at(neighbour)
                        {
                            return None;
                        }
                        ranges[current]
                            .merged_type(range)
                            .map(|merged_type| (other, merged_type))
                    });

                    if let Some((other, merged_type)) = found {
                        let lower = current.min(other);
                        let higher = current.max(other);
                        let removed = ranges.remove(higher);
                        ranges[lower].absorb(removed, merged_type);

                        if higher == current {
                            break 'rescan;
                        } else {
                            continue 'rescan;
                        }
                    }
                }
            }
            break;
        }
    }
}

/// Write ranges out as local variable table entries, placing labels at their boundaries
///
/// Existing labels are reused whenever one already sits at the same position (between the same
/// two real instructions). Variables get placeholder names.
pub fn attach_ranges(code: &mut Code, ranges: &[VariableRange]) -> Result<Vec<LocalVariable>, Error> {
    let mut next_label = code.fresh_label();
    let mut inserted: HashMap<usize, Label> = HashMap::new();

    let mut label_at = |code: &Code, boundary: usize| -> Label {
        if let Some(label) = existing_label(&code.instructions, boundary) {
            return label;
        }
        *inserted.entry(boundary).or_insert_with(|| {
            let label = next_label;
            next_label = next_label.next();
            label
        })
    };

    let mut entries = Vec::with_capacity(ranges.len());
    for (idx, range) in ranges.iter().enumerate() {
        let descriptor = match range.local_type.field_type() {
            Some(descriptor) => descriptor,
            None => continue,
        };
        let start = label_at(&*code, range.start);
        let end = label_at(&*code, range.end + 1);
        let name = UnqualifiedName::from_string(format!("var{}", idx)).map_err(Error::MalformedName)?;
        entries.push(LocalVariable {
            name,
            descriptor,
            start,
            end,
            index: range.slot,
        });
    }

    let mut insertions: Vec<(usize, Label)> = inserted.into_iter().collect();
    insertions.sort_unstable_by(|a, b| b.0.cmp(&a.0));
    for (position, label) in insertions {
        code.instructions.insert(position, Instruction::Label(label));
    }

    Ok(entries)
}

/// Label within the run of pseudo-instructions around a position
fn existing_label(instructions: &[Instruction], boundary: usize) -> Option<Label> {
    let mut first = boundary;
    while first > 0 && instructions[first - 1].is_pseudo() {
        first -= 1;
    }
    let mut last = boundary;
    while last < instructions.len() && instructions[last].is_pseudo() {
        last += 1;
    }

    instructions[first..last].iter().find_map(|insn| match insn {
        Instruction::Label(label) => Some(*label),
        _ => None,
    })
}
