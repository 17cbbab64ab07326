use super::{BinaryName, UnqualifiedName};
use std::fmt;

#[derive(Debug)]
pub enum Error {
    /// No tier of the class hierarchy knows about this class
    UnresolvedClass(BinaryName),

    /// Two frames being joined have different stack depths
    InconsistentStackDepth {
        instruction: usize,
        expected: usize,
        found: usize,
    },

    /// Instruction is valid bytecode but cannot be analysed (eg. `jsr` and `ret`)
    UnsupportedOpcode {
        instruction: usize,
        opcode: &'static str,
    },

    /// Stack map frame data cannot be interpreted
    MalformedFrameData { instruction: usize, reason: String },

    /// Simulating an instruction on its frame failed
    Frame {
        instruction: usize,
        kind: FrameErrorKind,
    },

    MalformedDescriptor(String),
    MalformedName(String),

    /// Analysing a particular method failed
    Method {
        class: BinaryName,
        method: UnqualifiedName,
        descriptor: String,
        cause: Box<Error>,
    },
}

#[derive(Debug, PartialEq, Eq)]
pub enum FrameErrorKind {
    EmptyStack,
    InvalidWidth(usize),
    StackOverflow(usize),
    InvalidIndex(u16),
    MissingLabel,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::UnresolvedClass(name) => write!(f, "cannot resolve class {}", name),
            Error::InconsistentStackDepth {
                instruction,
                expected,
                found,
            } => write!(
                f,
                "inconsistent stack depth at instruction {} ({} vs {})",
                instruction, expected, found
            ),
            Error::UnsupportedOpcode {
                instruction,
                opcode,
            } => write!(
                f,
                "unsupported opcode {} at instruction {}",
                opcode, instruction
            ),
            Error::MalformedFrameData {
                instruction,
                reason,
            } => write!(
                f,
                "malformed frame data at instruction {}: {}",
                instruction, reason
            ),
            Error::Frame { instruction, kind } => {
                write!(f, "invalid frame at instruction {}: {:?}", instruction, kind)
            }
            Error::MalformedDescriptor(msg) => write!(f, "malformed descriptor: {}", msg),
            Error::MalformedName(msg) => write!(f, "malformed name: {}", msg),
            Error::Method {
                class,
                method,
                descriptor,
                cause,
            } => write!(f, "{}.{}{}: {}", class, method, descriptor, cause),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Method { cause, .. } => Some(cause.as_ref()),
            _ => None,
        }
    }
}
