use std::fmt;

/// Opaque label marking a position in the instruction list
///
/// Labels show up as [`super::Instruction::Label`] pseudo-instructions. Jumps, try-catch blocks,
/// and local variable entries all refer to positions through labels, so inserting instructions
/// never invalidates them.
#[derive(Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct Label(pub u32);

impl Label {
    /// Get the next fresh label
    pub fn next(&self) -> Label {
        Label(self.0 + 1)
    }
}

impl fmt::Debug for Label {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_fmt(format_args!("l{}", self.0))
    }
}
