//! This module contains the AST of JVM bytecode as it is consumed by the analysis. Compared to
//! the raw class file format:
//!
//!   - The "wide" instruction doesn't show up at all, but instead gets merged into the
//!     instructions it is allowed to modify
//!
//!   - Some instructions (like the branches) get abstracted into one instruction with a field.
//!     This helps with repetitive pattern matches.
//!
//!   - Jump targets are [`Label`]s, and labels, line numbers, and stack map frames show up in the
//!     instruction list as pseudo-instructions (so they have a position, but no effect)
//!

use super::{Label, StackMapFrame};
use crate::jvm::{BaseType, BinaryName, FieldType, MethodDescriptor, RefType, UnqualifiedName};
use crate::util::Width;

/// JVM bytecode instruction or pseudo-instruction
#[derive(Clone, Debug, PartialEq)]
pub enum Instruction {
    /// Position marker (pseudo-instruction)
    Label(Label),

    /// Source line number for the following instructions (pseudo-instruction)
    LineNumber(u16),

    /// Stack map frame describing the state at this position (pseudo-instruction)
    Frame(StackMapFrame),

    Nop,
    AConstNull,
    IConstM1,
    IConst0,
    IConst1,
    IConst2,
    IConst3,
    IConst4,
    IConst5,
    LConst0,
    LConst1,
    FConst0,
    FConst1,
    FConst2,
    DConst0,
    DConst1,
    BiPush(i8),
    SiPush(i16),
    Ldc(Constant), // covers `ldc`, `ldc_w`, and `ldc2_w`
    ILoad(u16),    // covers `iload`, `iload{0,3}`, and `wide iload`
    LLoad(u16),
    FLoad(u16),
    DLoad(u16),
    ALoad(u16),
    IALoad,
    LALoad,
    FALoad,
    DALoad,
    AALoad,
    BALoad,
    CALoad,
    SALoad,
    IStore(u16), // covers `istore`, `istore{0,3}`, and `wide istore`
    LStore(u16),
    FStore(u16),
    DStore(u16),
    AStore(u16),
    IAStore,
    LAStore,
    FAStore,
    DAStore,
    AAStore,
    BAStore,
    CAStore,
    SAStore,
    Pop,
    Pop2,
    Dup,
    DupX1,
    DupX2,
    Dup2,
    Dup2X1,
    Dup2X2,
    Swap,
    IAdd,
    LAdd,
    FAdd,
    DAdd,
    ISub,
    LSub,
    FSub,
    DSub,
    IMul,
    LMul,
    FMul,
    DMul,
    IDiv,
    LDiv,
    FDiv,
    DDiv,
    IRem,
    LRem,
    FRem,
    DRem,
    INeg,
    LNeg,
    FNeg,
    DNeg,
    ISh(ShiftType), // covers `ishr`, `ishl`, and `iushr`
    LSh(ShiftType), // covers `lshr`, `lshl`, and `lushr`
    IAnd,
    LAnd,
    IOr,
    LOr,
    IXor,
    LXor,
    IInc(u16, i16), // covers `iinc` and `wide iinc`
    I2L,
    I2F,
    I2D,
    L2I,
    L2F,
    L2D,
    F2I,
    F2L,
    F2D,
    D2I,
    D2L,
    D2F,
    I2B,
    I2C,
    I2S,
    LCmp,
    FCmp(CompareMode), // covers `fcmpl` and `fcmpg`
    DCmp(CompareMode), // covers `dcmpl` and `dcmpg`
    If(OrdComparison, Label), // covers `ifeq`, `ifne`, `iflt`, `ifge`, `ifgt`, `ifle`
    IfICmp(OrdComparison, Label), // covers `if_icmpeq`, `if_icmpne`, `if_icmplt`, ... `if_icmple`
    IfACmp(EqComparison, Label), // covers `if_acmpeq`, `if_acmpne`
    IfNull(EqComparison, Label), // covers `ifnull`, `ifnonnull`
    Goto(Label),                 // covers `goto` and `goto_w`
    Jsr(Label),
    Ret(u16),
    TableSwitch {
        /// Jump target if the argument is less than `low` or greater than
        /// `low + targets.len()`
        default: Label,

        /// Value associated with the first jump target
        low: i32,

        /// Jump targets
        targets: Vec<Label>,
    },
    LookupSwitch {
        /// Jump target if there is no corresponding key
        default: Label,

        /// Jump targets (sorted so that the keys are ascending)
        targets: Vec<(i32, Label)>,
    },
    IReturn,
    LReturn,
    FReturn,
    DReturn,
    AReturn,
    Return,
    GetStatic(FieldRef),
    PutStatic(FieldRef),
    GetField(FieldRef),
    PutField(FieldRef),
    Invoke(InvokeType, MethodRef),
    InvokeDynamic(DynamicCallSite),
    New(BinaryName),
    NewArray(BaseType),
    ANewArray(RefType),
    ArrayLength,
    AThrow,
    CheckCast(RefType),
    InstanceOf(RefType),
    MonitorEnter,
    MonitorExit,
    MultiANewArray(RefType, u8),
}

/// Loadable constant
#[derive(Clone, Debug, PartialEq)]
pub enum Constant {
    Integer(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    String(String),
    Class(RefType),
    MethodType(MethodDescriptor),
    MethodHandle,
}

/// Field referenced by a field instruction
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FieldRef {
    pub owner: BinaryName,
    pub name: UnqualifiedName,
    pub descriptor: FieldType,
}

/// Method referenced by an invoke instruction
///
/// The owner is a reference type since methods like `clone` can be called on array types.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MethodRef {
    pub owner: RefType,
    pub name: UnqualifiedName,
    pub descriptor: MethodDescriptor,
}

/// Call site of an `invokedynamic` instruction
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DynamicCallSite {
    pub name: UnqualifiedName,
    pub descriptor: MethodDescriptor,
}

/// Possible bit shifts
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum ShiftType {
    Left,
    LogicalRight,
    ArithmeticRight,
}

/// Comparison modes for floating point
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum CompareMode {
    /// -1 on NaN
    L,

    /// 1 on NaN
    G,
}

/// Binary comparison operators available for `int` branches
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum OrdComparison {
    EQ,
    GE,
    GT,
    LE,
    LT,
    NE,
}

/// Equality/inequality comparison operators
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum EqComparison {
    EQ,
    NE,
}

/// Type of method to invoke
///
/// Note: `InvokeDynamic` is kept separate because it has no receiver and no owner.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum InvokeType {
    Virtual,
    Special,
    Static,
    Interface,
}

impl Instruction {
    /// Pseudo-instructions occupy a position but have no runtime effect
    pub fn is_pseudo(&self) -> bool {
        matches!(
            self,
            Instruction::Label(_) | Instruction::LineNumber(_) | Instruction::Frame(_)
        )
    }

    /// Labels this instruction may jump to
    ///
    /// For switches, the default target comes first.
    pub fn jump_targets(&self) -> Vec<Label> {
        match self {
            Instruction::If(_, lbl)
            | Instruction::IfICmp(_, lbl)
            | Instruction::IfACmp(_, lbl)
            | Instruction::IfNull(_, lbl)
            | Instruction::Goto(lbl)
            | Instruction::Jsr(lbl) => vec![*lbl],
            Instruction::TableSwitch {
                default, targets, ..
            } => {
                let mut labels = vec![*default];
                labels.extend(targets.iter().copied());
                labels
            }
            Instruction::LookupSwitch { default, targets } => {
                let mut labels = vec![*default];
                labels.extend(targets.iter().map(|(_, lbl)| *lbl));
                labels
            }
            _ => vec![],
        }
    }

    /// Does this instruction transfer control unconditionally to a single jump target?
    pub fn is_unconditional_jump(&self) -> bool {
        matches!(self, Instruction::Goto(_) | Instruction::Jsr(_))
    }

    /// Is this a `tableswitch` or `lookupswitch`?
    pub fn is_switch(&self) -> bool {
        matches!(
            self,
            Instruction::TableSwitch { .. } | Instruction::LookupSwitch { .. }
        )
    }

    /// Is this one of the return instructions?
    pub fn is_return(&self) -> bool {
        matches!(
            self,
            Instruction::IReturn
                | Instruction::LReturn
                | Instruction::FReturn
                | Instruction::DReturn
                | Instruction::AReturn
                | Instruction::Return
        )
    }

    /// Is this one of the conditional branches on `int` or reference operands?
    pub fn is_conditional_jump(&self) -> bool {
        matches!(
            self,
            Instruction::If(_, _)
                | Instruction::IfICmp(_, _)
                | Instruction::IfACmp(_, _)
                | Instruction::IfNull(_, _)
        )
    }

    /// Local variable read by this instruction
    pub fn loaded_local(&self) -> Option<u16> {
        match self {
            Instruction::ILoad(idx)
            | Instruction::LLoad(idx)
            | Instruction::FLoad(idx)
            | Instruction::DLoad(idx)
            | Instruction::ALoad(idx) => Some(*idx),
            _ => None,
        }
    }

    /// Local variable written by this instruction
    pub fn stored_local(&self) -> Option<u16> {
        match self {
            Instruction::IStore(idx)
            | Instruction::LStore(idx)
            | Instruction::FStore(idx)
            | Instruction::DStore(idx)
            | Instruction::AStore(idx) => Some(*idx),
            _ => None,
        }
    }

    /// Mnemonic of instructions the analysis refuses to handle
    pub fn unsupported_opcode(&self) -> Option<&'static str> {
        match self {
            Instruction::Jsr(_) => Some("jsr"),
            Instruction::Ret(_) => Some("ret"),
            _ => None,
        }
    }

    /// Number of stack slots the instruction consumes
    pub fn stack_demand(&self) -> usize {
        use Instruction::*;

        match self {
            Label(_) | LineNumber(_) | Frame(_) | Nop | AConstNull | IConstM1 | IConst0
            | IConst1 | IConst2 | IConst3 | IConst4 | IConst5 | LConst0 | LConst1 | FConst0
            | FConst1 | FConst2 | DConst0 | DConst1 | BiPush(_) | SiPush(_) | Ldc(_)
            | ILoad(_) | LLoad(_) | FLoad(_) | DLoad(_) | ALoad(_) | IInc(_, _) | Goto(_)
            | Jsr(_) | Ret(_) | Return | GetStatic(_) | New(_) => 0,

            IStore(_) | FStore(_) | AStore(_) | Pop | Dup | INeg | FNeg | I2L | I2F | I2D
            | F2I | F2L | F2D | I2B | I2C | I2S | If(_, _) | IfNull(_, _) | TableSwitch { .. }
            | LookupSwitch { .. } | IReturn | FReturn | AReturn | GetField(_) | NewArray(_)
            | ANewArray(_) | ArrayLength | AThrow | CheckCast(_) | InstanceOf(_)
            | MonitorEnter | MonitorExit => 1,

            IALoad | LALoad | FALoad | DALoad | AALoad | BALoad | CALoad | SALoad | LStore(_)
            | DStore(_) | Pop2 | DupX1 | Dup2 | Swap | IAdd | FAdd | ISub | FSub | IMul
            | FMul | IDiv | FDiv | IRem | FRem | LNeg | DNeg | ISh(_) | IAnd | IOr | IXor
            | L2I | L2F | L2D | D2I | D2L | D2F | FCmp(_) | IfICmp(_, _) | IfACmp(_, _)
            | LReturn | DReturn => 2,

            IAStore | FAStore | AAStore | BAStore | CAStore | SAStore | DupX2 | Dup2X1
            | LSh(_) => 3,

            LAStore | DAStore | Dup2X2 | LAdd | DAdd | LSub | DSub | LMul | DMul | LDiv
            | DDiv | LRem | DRem | LAnd | LOr | LXor | LCmp | DCmp(_) => 4,

            PutStatic(field) => field.descriptor.width(),
            PutField(field) => 1 + field.descriptor.width(),
            Invoke(invoke_type, method) => method
                .descriptor
                .parameter_length(*invoke_type != InvokeType::Static),
            InvokeDynamic(site) => site.descriptor.parameter_length(false),
            MultiANewArray(_, dimensions) => *dimensions as usize,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::Name;

    #[test]
    fn jump_targets() {
        let switch = Instruction::LookupSwitch {
            default: Label(3),
            targets: vec![(1, Label(1)), (5, Label(2))],
        };
        assert_eq!(switch.jump_targets(), vec![Label(3), Label(1), Label(2)]);
        assert!(switch.is_switch());

        let branch = Instruction::If(OrdComparison::EQ, Label(7));
        assert_eq!(branch.jump_targets(), vec![Label(7)]);
        assert!(branch.is_conditional_jump());
        assert!(!branch.is_unconditional_jump());

        assert!(Instruction::IAdd.jump_targets().is_empty());
    }

    #[test]
    fn stack_demands() {
        let owner = BinaryName::from_string(String::from("me/Foo")).unwrap();
        let name = UnqualifiedName::from_string(String::from("bar")).unwrap();
        let put = Instruction::PutField(FieldRef {
            owner: owner.clone(),
            name: name.clone(),
            descriptor: FieldType::long(),
        });
        assert_eq!(put.stack_demand(), 3, "Verification of {:?}", put);

        let invoke = Instruction::Invoke(
            InvokeType::Virtual,
            MethodRef {
                owner: RefType::Object(owner),
                name,
                descriptor: MethodDescriptor {
                    parameters: vec![FieldType::int(), FieldType::double()],
                    return_type: None,
                },
            },
        );
        assert_eq!(invoke.stack_demand(), 4, "Verification of {:?}", invoke);

        assert_eq!(Instruction::LSh(ShiftType::Left).stack_demand(), 3);
        assert_eq!(Instruction::LAStore.stack_demand(), 4);
        assert_eq!(Instruction::Label(Label(0)).stack_demand(), 0);
    }
}
