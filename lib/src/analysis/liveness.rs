use super::{ControlFlow, Frame, InferredType};
use crate::jvm::code::Instruction;
use fixedbitset::FixedBitSet;

/// Locals which are live right before each instruction
///
/// A local is live if some path reads it before overwriting it. Values on the operand stack which
/// were loaded from a local also keep that local alive, so a local stays in scope until its value
/// is consumed.
pub struct Liveness {
    live: Vec<FixedBitSet>,
    max_locals: usize,
}

impl Liveness {
    pub fn compute(
        instructions: &[Instruction],
        flow: &ControlFlow,
        frames: &[Option<Frame>],
        max_locals: usize,
    ) -> Liveness {
        let mut liveness = Liveness {
            live: vec![FixedBitSet::with_capacity(max_locals); instructions.len()],
            max_locals,
        };

        let mut iterations: usize = 0;
        let mut changed = true;
        while changed {
            changed = false;
            iterations += 1;

            for idx in (0..instructions.len()).rev() {
                let frame = match &frames[idx] {
                    Some(frame) => frame,
                    None => continue,
                };
                let insn = &instructions[idx];

                let mut live = FixedBitSet::with_capacity(max_locals);
                for successor in flow.successors(idx) {
                    live.union_with(&liveness.live[successor]);
                }

                for offset in 1..=insn.stack_demand() {
                    if let Some(cell) = frame.peek(offset) {
                        if cell.value_type == Some(InferredType::Top) {
                            continue;
                        }
                        if let Some(source) = cell.source {
                            mark(&mut live, source as usize, true);
                        }
                    }
                }
                if let Some(var) = insn.loaded_local() {
                    mark(&mut live, var as usize, true);
                } else if let Some(var) = insn.stored_local() {
                    mark(&mut live, var as usize, false);
                }

                changed |= liveness.save(idx, live, frames);
            }
        }
        log::debug!("Liveness stabilised after {} iterations", iterations);

        liveness.extend_stored_locals(instructions, flow, frames);
        liveness
    }

    pub fn is_live(&self, instruction: usize, var: usize) -> bool {
        self.live
            .get(instruction)
            .map_or(false, |live| var < self.max_locals && live.contains(var))
    }

    pub fn live_locals(&self, instruction: usize) -> Option<&FixedBitSet> {
        self.live.get(instruction)
    }

    /// Merge in newly live locals, returning whether any were new
    ///
    /// Slots which are empty or unusable in the frame never count as live.
    fn save(&mut self, idx: usize, mut live: FixedBitSet, frames: &[Option<Frame>]) -> bool {
        if let Some(frame) = &frames[idx] {
            for var in 0..self.max_locals {
                match frame.locals[var] {
                    None | Some(InferredType::Top) => live.set(var, false),
                    _ => (),
                }
            }
        }

        let existing = &mut self.live[idx];
        let changed = live.difference(existing).next().is_some();
        existing.union_with(&live);
        changed
    }

    /// Keep stored locals live until the end of the block
    ///
    /// A value that is stored but never read still deserves a variable, and that variable should
    /// not disappear and reappear while the block runs.
    fn extend_stored_locals(
        &mut self,
        instructions: &[Instruction],
        flow: &ControlFlow,
        frames: &[Option<Frame>],
    ) {
        let mut stored_locals = FixedBitSet::with_capacity(self.max_locals);
        for (idx, insn) in instructions.iter().enumerate() {
            if flow.entry.contains(idx) {
                stored_locals.clear();
            }

            let mut live = self.live[idx].clone();
            stored_locals.difference_with(&live);
            live.union_with(&stored_locals);
            self.save(idx, live, frames);

            if let Some(var) = insn.stored_local() {
                mark(&mut stored_locals, var as usize, true);
            }
        }
    }
}

fn mark(set: &mut FixedBitSet, var: usize, live: bool) {
    if var < set.len() {
        set.set(var, live);
    }
}

/// Empty locals which are no longer used by the time a block ends
///
/// A local that a block exit supplies but that none of its successors keep has gone out of scope.
/// Walking back through the block, it is removed from every frame until the point where it is
/// still live.
pub fn remove_unused_locals(
    flow: &ControlFlow,
    frames: &mut [Option<Frame>],
    liveness: &Liveness,
) {
    let mut removed_any = true;
    while removed_any {
        removed_any = false;

        for exit in (1..frames.len()).rev() {
            let targets = match flow.jump_targets(exit) {
                Some(targets) => targets,
                None => continue,
            };
            let supplied: FixedBitSet = match &frames[exit] {
                Some(frame) => occupied(frame),
                None => continue,
            };
            let mut used = FixedBitSet::with_capacity(supplied.len());
            for target in targets {
                if let Some(frame) = &frames[*target] {
                    used.union_with(&occupied(frame));
                }
            }
            let mut unused = supplied;
            unused.difference_with(&used);
            if unused.count_ones(..) == 0 {
                continue;
            }

            let mut idx = exit;
            while idx > 0 && !flow.entry.contains(idx) {
                let frame = match &mut frames[idx] {
                    Some(frame) => frame,
                    None => break,
                };

                let mut removed: usize = 0;
                for var in unused.ones().collect::<Vec<usize>>() {
                    if liveness.is_live(idx, var) {
                        unused.set(var, false);
                    } else if frame.remove_local(var as u16).is_some() {
                        removed += 1;
                    }
                }

                if removed == 0 {
                    break;
                }
                removed_any = true;
                idx -= 1;
            }
        }
    }
}

fn occupied(frame: &Frame) -> FixedBitSet {
    let mut set = FixedBitSet::with_capacity(frame.locals.len());
    for var in frame.occupied_locals() {
        set.insert(var);
    }
    set
}
