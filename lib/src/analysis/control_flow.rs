use super::InferredType;
use crate::jvm::class_graph::ClassHierarchy;
use crate::jvm::code::{Code, Instruction, Label};
use crate::jvm::{BinaryName, Error, FrameErrorKind, RefType};
use fixedbitset::FixedBitSet;
use std::collections::HashMap;

/// Protected range of a try-catch block, resolved to instruction indices
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TryRange {
    pub start: usize,
    pub end: usize,
    pub handler: usize,

    /// Type caught (`java/lang/Throwable` for `finally` handlers)
    pub catch_type: BinaryName,
}

/// Control flow edges between instructions
///
/// Execution enters a straight-line block at an _entry_ and leaves it at an _exit_. Explicit
/// edges are only recorded where control doesn't just fall through to the next instruction.
#[derive(Debug)]
pub struct ControlFlow {
    /// First instructions, jump targets, handlers, and anything following an exit
    pub entry: FixedBitSet,

    /// Returns, uncaught throws, and anything with an explicit edge
    pub exit: FixedBitSet,

    jump_sources: Vec<Option<Vec<usize>>>,
    jump_targets: Vec<Option<Vec<usize>>>,
    try_ranges: Vec<TryRange>,
}

/// Find the instruction at which a label is placed
pub fn label_index(
    labels: &HashMap<Label, usize>,
    label: &Label,
    instruction: usize,
) -> Result<usize, Error> {
    labels.get(label).copied().ok_or(Error::Frame {
        instruction,
        kind: FrameErrorKind::MissingLabel,
    })
}

impl ControlFlow {
    /// Mark try-catch handlers, branches, and returns
    ///
    /// Throws and the conservative try-catch edges are only known once frames are computed (see
    /// [`Self::process_throw`], [`Self::process_try_catch_blocks`], and
    /// [`Self::process_entry_points`]).
    pub fn new(code: &Code, labels: &HashMap<Label, usize>) -> Result<ControlFlow, Error> {
        let len = code.instructions.len();
        let mut flow = ControlFlow {
            entry: FixedBitSet::with_capacity(len),
            exit: FixedBitSet::with_capacity(len),
            jump_sources: vec![None; len],
            jump_targets: vec![None; len],
            try_ranges: Vec::with_capacity(code.try_catch_blocks.len()),
        };

        if len > 0 {
            flow.entry.insert(0);
        }

        for block in &code.try_catch_blocks {
            let range = TryRange {
                start: label_index(labels, &block.start, 0)?,
                end: label_index(labels, &block.end, 0)?,
                handler: label_index(labels, &block.handler, 0)?,
                catch_type: block
                    .catch_type
                    .clone()
                    .unwrap_or(BinaryName::THROWABLE),
            };
            flow.entry.insert(range.handler);
            flow.try_ranges.push(range);
        }

        flow.mark_branches(code, labels)?;
        Ok(flow)
    }

    pub fn len(&self) -> usize {
        self.jump_targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jump_targets.is_empty()
    }

    pub fn try_ranges(&self) -> &[TryRange] {
        &self.try_ranges
    }

    /// Explicit edges out of an instruction
    pub fn jump_targets(&self, instruction: usize) -> Option<&[usize]> {
        self.jump_targets
            .get(instruction)
            .and_then(|targets| targets.as_deref())
    }

    /// Instructions with explicit edges into an instruction
    pub fn jump_sources(&self, instruction: usize) -> Option<&[usize]> {
        self.jump_sources
            .get(instruction)
            .and_then(|sources| sources.as_deref())
    }

    /// Every instruction control can reach directly after this one
    pub fn successors(&self, instruction: usize) -> Vec<usize> {
        if let Some(targets) = self.jump_targets(instruction) {
            targets.to_vec()
        } else if self.exit.contains(instruction) || instruction + 1 >= self.len() {
            vec![]
        } else {
            vec![instruction + 1]
        }
    }

    fn mark_branches(&mut self, code: &Code, labels: &HashMap<Label, usize>) -> Result<(), Error> {
        for (idx, insn) in code.instructions.iter().enumerate() {
            let targets = insn.jump_targets();
            if targets.is_empty() {
                if insn.is_return() {
                    self.exit.insert(idx);
                }
                continue;
            }

            let mut dsts: Vec<usize> = Vec::with_capacity(targets.len() + 1);
            if insn.is_conditional_jump() {
                let target = label_index(labels, &targets[0], idx)?;
                if target != idx + 1 {
                    dsts.push(idx + 1);
                }
                dsts.push(target);
            } else {
                for target in &targets {
                    let target = label_index(labels, target, idx)?;
                    if !dsts.contains(&target) {
                        dsts.push(target);
                    }
                }
            }
            self.jump(idx, dsts);
        }
        Ok(())
    }

    /// Add edges from an `athrow` to every handler that catches what is being thrown
    ///
    /// A throw without matching handlers leaves the method.
    pub fn process_throw(
        &mut self,
        instruction: usize,
        thrown: Option<&InferredType>,
        hierarchy: &ClassHierarchy,
    ) -> Result<(), Error> {
        let exception = match thrown {
            Some(InferredType::Reference(RefType::Object(class_name))) => {
                class_name.clone()
            }
            _ => BinaryName::THROWABLE,
        };

        let mut handlers = vec![];
        for range in &self.try_ranges {
            if range.start <= instruction
                && instruction < range.end
                && hierarchy.is_subclass(&exception, &range.catch_type)?
            {
                handlers.push(range.handler);
            }
        }

        if handlers.is_empty() {
            self.exit.insert(instruction);
        } else {
            for handler in handlers {
                self.add_edge(instruction, handler);
            }
        }
        Ok(())
    }

    /// Add edges from instructions in try ranges to their handlers
    ///
    /// Working out which instructions really throw is not worth it: what matters is the state of
    /// the locals, and that only changes at stores. So an instruction right after a store (or at
    /// the start of the range) may either continue or throw, while instructions that already
    /// branch or exit also get an edge to the handler.
    pub fn process_try_catch_blocks(&mut self, instructions: &[Instruction]) {
        for range in self.try_ranges.clone() {
            let mut first_insn = true;
            let mut prev_is_store = false;
            let end = range.end.min(instructions.len().saturating_sub(1));

            for idx in range.start..=end {
                let insn = &instructions[idx];
                if insn.is_pseudo() {
                    continue;
                }

                if self.jump_targets[idx].is_some() {
                    self.add_edge(idx, range.handler);
                } else if self.exit.contains(idx) {
                    self.jump(idx, vec![range.handler]);
                } else if first_insn || prev_is_store {
                    if idx < range.end {
                        self.jump(idx, vec![idx + 1, range.handler]);
                    } else {
                        self.jump(idx, vec![range.handler]);
                    }
                }

                prev_is_store = insn.stored_local().is_some();
                first_insn = false;
            }
        }
    }

    /// Make fallthrough into an entry explicit, so every block ends at an exit
    pub fn process_entry_points(&mut self) {
        for idx in 0..self.len().saturating_sub(1) {
            if self.exit.contains(idx) || !self.entry.contains(idx + 1) {
                continue;
            }
            if self.jump_targets[idx].is_none() {
                self.jump(idx, vec![idx + 1]);
            }
        }
    }

    /// Record the edges out of an instruction, replacing any previous ones
    fn jump(&mut self, src: usize, dsts: Vec<usize>) {
        self.exit.insert(src);
        for dst in &dsts {
            self.add_source(src, *dst);
        }
        self.jump_targets[src] = Some(dsts);
    }

    /// Add one edge, keeping the existing ones
    fn add_edge(&mut self, src: usize, dst: usize) {
        self.exit.insert(src);
        let targets = self.jump_targets[src].get_or_insert_with(Vec::new);
        if !targets.contains(&dst) {
            targets.push(dst);
        }
        self.add_source(src, dst);
    }

    fn add_source(&mut self, src: usize, dst: usize) {
        if dst >= self.len() {
            return;
        }
        self.entry.insert(dst);
        let sources = self.jump_sources[dst].get_or_insert_with(Vec::new);
        if !sources.contains(&src) {
            sources.push(src);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::class_graph::ClassMap;
    use crate::jvm::code::{OrdComparison, TryCatchBlock};

    fn control_flow(code: &Code) -> ControlFlow {
        ControlFlow::new(code, &code.label_positions()).unwrap()
    }

    #[test]
    fn branches() {
        let code = Code::new(
            1,
            1,
            vec![
                Instruction::ILoad(0),                           // 0
                Instruction::If(OrdComparison::EQ, Label(0)),    // 1
                Instruction::IInc(0, 1),                         // 2
                Instruction::Label(Label(0)),                    // 3
                Instruction::ILoad(0),                           // 4
                Instruction::If(OrdComparison::NE, Label(1)),    // 5
                Instruction::Label(Label(1)),                    // 6
                Instruction::Goto(Label(0)),                     // 7
            ],
        );
        let mut flow = control_flow(&code);

        assert_eq!(flow.jump_targets(1), Some(&[2, 3][..]));
        assert_eq!(flow.jump_targets(5), Some(&[6][..]));
        assert_eq!(flow.jump_targets(7), Some(&[3][..]));
        assert_eq!(flow.jump_sources(3), Some(&[1, 7][..]));
        assert!(flow.entry.contains(0) && flow.entry.contains(3) && flow.entry.contains(6));
        assert!(flow.exit.contains(1) && flow.exit.contains(5) && flow.exit.contains(7));

        // Falling through into the label at 3 becomes an explicit edge
        flow.process_entry_points();
        assert_eq!(flow.jump_targets(2), Some(&[3][..]));
        assert_eq!(flow.jump_sources(3), Some(&[1, 7, 2][..]));
        assert_eq!(flow.successors(2), vec![3]);
        assert_eq!(flow.successors(0), vec![1]);
    }

    #[test]
    fn try_range_after_store() {
        let mut code = Code::new(
            1,
            2,
            vec![
                Instruction::Label(Label(0)), // 0
                Instruction::IConst0,         // 1
                Instruction::IStore(1),       // 2
                Instruction::ILoad(1),        // 3
                Instruction::Pop,             // 4
                Instruction::Label(Label(1)), // 5
                Instruction::Return,          // 6
                Instruction::Label(Label(2)), // 7
                Instruction::Return,          // 8
            ],
        );
        code.try_catch_blocks.push(TryCatchBlock {
            start: Label(0),
            end: Label(1),
            handler: Label(2),
            catch_type: None,
        });

        let mut flow = control_flow(&code);
        assert!(flow.entry.contains(7));
        assert_eq!(flow.try_ranges()[0].catch_type, BinaryName::THROWABLE);

        flow.process_try_catch_blocks(&code.instructions);
        assert_eq!(flow.jump_targets(1), Some(&[2, 7][..]));
        assert_eq!(flow.jump_targets(2), None);
        assert_eq!(flow.jump_targets(3), Some(&[4, 7][..]));
        assert_eq!(flow.jump_targets(4), None);
        assert_eq!(flow.jump_sources(7), Some(&[1, 3][..]));
        assert!(flow.entry.contains(2) && flow.entry.contains(4));
    }

    #[test]
    fn throws() {
        let artifact = ClassMap::new("artifact");
        let hierarchy = ClassHierarchy::with_platform(Box::new(artifact), vec![]);

        let mut code = Code::new(
            2,
            1,
            vec![
                Instruction::Label(Label(0)), // 0
                Instruction::AConstNull,      // 1
                Instruction::AThrow,          // 2
                Instruction::Label(Label(1)), // 3
                Instruction::Label(Label(2)), // 4
                Instruction::AThrow,          // 5
                Instruction::Label(Label(3)), // 6
                Instruction::Return,          // 7
            ],
        );
        code.try_catch_blocks.push(TryCatchBlock {
            start: Label(0),
            end: Label(1),
            handler: Label(2),
            catch_type: Some(BinaryName::RUNTIMEEXCEPTION),
        });
        code.try_catch_blocks.push(TryCatchBlock {
            start: Label(0),
            end: Label(1),
            handler: Label(3),
            catch_type: Some(BinaryName::IOEXCEPTION),
        });
        let mut flow = control_flow(&code);

        let thrown = InferredType::object(BinaryName::ILLEGALSTATEEXCEPTION);
        flow.process_throw(2, Some(&thrown), &hierarchy).unwrap();
        assert_eq!(flow.jump_targets(2), Some(&[4][..]));

        flow.process_throw(5, Some(&thrown), &hierarchy).unwrap();
        assert_eq!(flow.jump_targets(5), None);
        assert!(flow.exit.contains(5));
        assert!(flow.successors(5).is_empty());
    }
}
