use super::Label;
use crate::jvm::RefType;
use crate::util::Width;

/// These types are from [this hierarchy][0], as they appear in stack map frames
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se7/html/jvms-4.html#jvms-4.10.1.2
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub enum VerificationType {
    /// Unusable slot
    Top,

    Integer,
    Float,
    Double,
    Long,
    Null,

    /// In the constructor, the `this` parameter starts with this type then turns into an object
    /// type after `<init>` is called
    UninitializedThis,

    /// Object type
    Object(RefType),

    /// State of an object after `new` has been called but `<init>` has not been called
    ///
    /// The label is placed right before the `new` instruction.
    Uninitialized(Label),
}

impl VerificationType {
    /// Is this type is a reference type?
    pub fn is_reference(&self) -> bool {
        match self {
            VerificationType::Top
            | VerificationType::Integer
            | VerificationType::Float
            | VerificationType::Double
            | VerificationType::Long => false,

            VerificationType::Null
            | VerificationType::UninitializedThis
            | VerificationType::Object(_)
            | VerificationType::Uninitialized(_) => true,
        }
    }
}

impl Width for VerificationType {
    fn width(&self) -> usize {
        match self {
            VerificationType::Double | VerificationType::Long => 2,
            _ => 1,
        }
    }
}

/// Compressed stack map frame, relative to the previous frame in the method
///
/// `long` and `double` values appear as a single entry even though they occupy two slots.
#[derive(Debug, Clone, PartialEq)]
pub enum StackMapFrame {
    /// Same locals as the previous frame, empty stack
    Same,

    /// Same locals as the previous frame, one value on the stack
    SameLocalsOneStack(VerificationType),

    /// Previous frame with the last few locals removed, empty stack
    ChopLocals(usize),

    /// Previous frame with extra locals added, empty stack
    AppendLocals(Vec<VerificationType>),

    /// Explicitly specified locals and stack
    Full {
        locals: Vec<VerificationType>,
        stack: Vec<VerificationType>,
    },
}
