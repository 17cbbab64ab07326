use super::{Instruction, Label};
use crate::jvm::{BinaryName, FieldType, UnqualifiedName};
use crate::util::Width;
use std::collections::HashMap;

/// Code of a method
#[derive(Debug, Clone, PartialEq)]
pub struct Code {
    /// Maximum depth of the operand stack
    pub max_stack: u16,

    /// Number of local variable slots (including parameters)
    pub max_locals: u16,

    /// Instructions, interleaved with labels and other pseudo-instructions
    pub instructions: Vec<Instruction>,

    /// Exception handlers, in order of priority
    pub try_catch_blocks: Vec<TryCatchBlock>,

    /// Local variable table (`None` if the attribute is absent)
    pub local_variables: Option<Vec<LocalVariable>>,
}

/// Exception handler covering a range of instructions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TryCatchBlock {
    /// Start of the protected range
    pub start: Label,

    /// End of the protected range
    pub end: Label,

    /// Start of the handler
    pub handler: Label,

    /// Type of exception caught (`None` for `finally` blocks, which catch everything)
    pub catch_type: Option<BinaryName>,
}

/// Entry in the local variable table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalVariable {
    pub name: UnqualifiedName,
    pub descriptor: FieldType,

    /// First position where the variable is in scope
    pub start: Label,

    /// First position after the range where the variable is in scope
    pub end: Label,

    /// Local variable slot
    pub index: u16,
}

impl Width for LocalVariable {
    fn width(&self) -> usize {
        self.descriptor.width()
    }
}

impl Code {
    pub fn new(max_stack: u16, max_locals: u16, instructions: Vec<Instruction>) -> Code {
        Code {
            max_stack,
            max_locals,
            instructions,
            try_catch_blocks: vec![],
            local_variables: None,
        }
    }

    /// Map from every label to the position of its pseudo-instruction
    pub fn label_positions(&self) -> HashMap<Label, usize> {
        self.instructions
            .iter()
            .enumerate()
            .filter_map(|(idx, insn)| match insn {
                Instruction::Label(label) => Some((*label, idx)),
                _ => None,
            })
            .collect()
    }

    /// Get a label which is not yet used anywhere in the code
    pub fn fresh_label(&self) -> Label {
        self.instructions
            .iter()
            .filter_map(|insn| match insn {
                Instruction::Label(label) => Some(label.next()),
                _ => None,
            })
            .max()
            .unwrap_or(Label(0))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn labels() {
        let code = Code::new(
            1,
            1,
            vec![
                Instruction::Label(Label(4)),
                Instruction::IConst0,
                Instruction::Label(Label(2)),
                Instruction::IReturn,
            ],
        );
        let positions = code.label_positions();
        assert_eq!(positions[&Label(4)], 0);
        assert_eq!(positions[&Label(2)], 2);
        assert_eq!(code.fresh_label(), Label(5));
        assert_eq!(Code::new(0, 0, vec![]).fresh_label(), Label(0));
    }
}
