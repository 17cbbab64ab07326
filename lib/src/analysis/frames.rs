use super::{ControlFlow, Frame, InferredType};
use crate::jvm::class_graph::ClassHierarchy;
use crate::jvm::code::{Code, Instruction, Label, VerificationType};
use crate::jvm::{BinaryName, Error, MethodDescriptor};
use fixedbitset::FixedBitSet;
use std::collections::HashMap;

/// Method being analysed, along with everything needed to interpret its code
pub struct MethodContext<'a> {
    pub hierarchy: &'a ClassHierarchy,

    /// Class declaring the method
    pub class_name: &'a BinaryName,
    pub descriptor: &'a MethodDescriptor,
    pub is_static: bool,
    pub code: &'a Code,

    /// Position of every label in the code
    pub labels: HashMap<Label, usize>,
}

impl<'a> MethodContext<'a> {
    pub fn new(
        hierarchy: &'a ClassHierarchy,
        class_name: &'a BinaryName,
        descriptor: &'a MethodDescriptor,
        is_static: bool,
        code: &'a Code,
    ) -> MethodContext<'a> {
        MethodContext {
            hierarchy,
            class_name,
            descriptor,
            is_static,
            code,
            labels: code.label_positions(),
        }
    }

    pub fn instructions(&self) -> &'a [Instruction] {
        &self.code.instructions
    }

    pub fn max_locals(&self) -> usize {
        self.code.max_locals as usize
    }

    /// Turn a stack map frame value into a type (`None` for unusable slots)
    fn resolve_snapshot_value(
        &self,
        value: &VerificationType,
    ) -> Result<Option<InferredType>, String> {
        Ok(match value {
            VerificationType::Top => None,
            VerificationType::Integer => Some(InferredType::Int),
            VerificationType::Float => Some(InferredType::Float),
            VerificationType::Long => Some(InferredType::Long),
            VerificationType::Double => Some(InferredType::Double),
            VerificationType::Null => Some(InferredType::Null),
            VerificationType::UninitializedThis => Some(InferredType::object(self.class_name.clone())),
            VerificationType::Object(ref_type) => Some(InferredType::Reference(ref_type.clone())),
            VerificationType::Uninitialized(label) => {
                let position = *self
                    .labels
                    .get(label)
                    .ok_or_else(|| format!("unknown label {:?}", label))?;
                let created = self.instructions()[position..]
                    .iter()
                    .find(|insn| !insn.is_pseudo());
                match created {
                    Some(Instruction::New(class_name)) => Some(InferredType::object(class_name.clone())),
                    _ => return Err(format!("label {:?} does not precede a `new`", label)),
                }
            }
        })
    }
}

/// Compute the frame before every reachable instruction
///
/// Frames start out from the method parameters and from the stack map frames in the code, then
/// get propagated along control flow edges until nothing changes. Instructions which are never
/// reached have no frame. Along the way, `athrow` instructions get edges to their handlers.
pub fn compute_frames(
    method: &MethodContext,
    flow: &mut ControlFlow,
) -> Result<Vec<Option<Frame>>, Error> {
    let instructions = method.instructions();
    let mut frames: Vec<Option<Frame>> = vec![None; instructions.len()];
    if instructions.is_empty() {
        return Ok(frames);
    }

    let this_class = if method.is_static {
        None
    } else {
        Some(method.class_name)
    };
    let initial = Frame::entry(
        this_class,
        method.descriptor,
        method.max_locals(),
        method.code.max_stack as usize,
    )
    .map_err(|kind| Error::Frame {
        instruction: 0,
        kind,
    })?;
    frames[0] = Some(initial);

    expand_snapshots(method, &mut frames)?;
    propagate_frames(method, flow, &mut frames)?;

    Ok(frames)
}

/// Seed the frames described by stack map frames
///
/// A snapshot describes the state at the next real instruction, but labels placed before the
/// snapshot refer to that same position. The frame is stored right after the previous real
/// instruction (or snapshot), which is where those labels start.
fn expand_snapshots(method: &MethodContext, frames: &mut [Option<Frame>]) -> Result<(), Error> {
    let mut current: Frame = match &frames[0] {
        Some(frame) => frame.clone(),
        None => return Ok(()),
    };
    let mut last_position: Option<usize> = None;

    for (idx, insn) in method.instructions().iter().enumerate() {
        if let Instruction::Frame(snapshot) = insn {
            current
                .expand(snapshot, |value| method.resolve_snapshot_value(value))
                .map_err(|reason| Error::MalformedFrameData {
                    instruction: idx,
                    reason,
                })?;
            let target = last_position.map_or(0, |last| last + 1);
            frames[target] = Some(current.clone());
        }

        if matches!(insn, Instruction::Frame(_)) || !insn.is_pseudo() {
            last_position = Some(idx);
        }
    }

    Ok(())
}

/// Worklist of instructions whose frames need to be propagated
struct Worklist {
    stack: Vec<usize>,
    queued: FixedBitSet,
}

impl Worklist {
    fn push(&mut self, idx: usize) {
        if !self.queued.put(idx) {
            self.stack.push(idx);
        }
    }

    fn pop(&mut self) -> Option<usize> {
        let idx = self.stack.pop()?;
        self.queued.set(idx, false);
        Some(idx)
    }
}

fn propagate_frames(
    method: &MethodContext,
    flow: &mut ControlFlow,
    frames: &mut [Option<Frame>],
) -> Result<(), Error> {
    let instructions = method.instructions();
    let mut worklist = Worklist {
        stack: vec![],
        queued: FixedBitSet::with_capacity(instructions.len()),
    };
    for idx in (0..instructions.len()).rev() {
        if flow.entry.contains(idx) {
            worklist.push(idx);
        }
    }

    let mut iterations: usize = 0;
    while let Some(idx) = worklist.pop() {
        iterations += 1;

        // Entries which nothing reaches (eg. dead handlers) have no frame
        let before: Frame = match &frames[idx] {
            Some(frame) => frame.clone(),
            None => continue,
        };
        let insn = &instructions[idx];

        if insn.is_pseudo() {
            if idx + 1 < instructions.len() {
                save_frame(method.hierarchy, frames, &mut worklist, idx + 1, &before)?;
            }
            continue;
        }

        let mut after = before.clone();
        after.execute(idx, insn)?;

        if let Instruction::AThrow = insn {
            let thrown = after.peek(1).and_then(|cell| cell.value_type.as_ref());
            flow.process_throw(idx, thrown, method.hierarchy)?;
        }

        if !insn.jump_targets().is_empty() {
            let targets: Vec<usize> = flow.jump_targets(idx).map_or(vec![], <[usize]>::to_vec);
            for target in targets {
                save_frame(method.hierarchy, frames, &mut worklist, target, &after)?;
            }
        } else if !insn.is_return() && !matches!(insn, Instruction::AThrow) {
            if idx + 1 < instructions.len() {
                save_frame(method.hierarchy, frames, &mut worklist, idx + 1, &after)?;
            }
        }

        // Anything in a try range can throw before it has any effect
        let handlers: Vec<(usize, BinaryName)> = flow
            .try_ranges()
            .iter()
            .filter(|range| range.start <= idx && idx <= range.end)
            .map(|range| (range.handler, range.catch_type.clone()))
            .collect();
        for (handler, catch_type) in handlers {
            let mut handler_frame = before.clone();
            handler_frame.clear_stack();
            handler_frame
                .push(InferredType::object(catch_type), None)
                .map_err(|kind| Error::Frame {
                    instruction: idx,
                    kind,
                })?;
            save_frame(method.hierarchy, frames, &mut worklist, handler, &handler_frame)?;
        }
    }

    log::debug!("Frames stabilised after {} iterations", iterations);
    Ok(())
}

/// Store or join a frame at an instruction, queueing that instruction if its frame changed
fn save_frame(
    hierarchy: &ClassHierarchy,
    frames: &mut [Option<Frame>],
    worklist: &mut Worklist,
    idx: usize,
    frame: &Frame,
) -> Result<(), Error> {
    match &mut frames[idx] {
        Some(existing) => {
            if existing.merge(frame, hierarchy, idx)? {
                worklist.push(idx);
            }
        }
        slot @ None => {
            *slot = Some(frame.clone());
            worklist.push(idx);
        }
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::class_graph::ClassMap;
    use crate::jvm::code::{Constant, FieldRef, OrdComparison, StackMapFrame, TryCatchBlock};
    use crate::jvm::{FieldType, Name, RefType, UnqualifiedName};

    fn hierarchy() -> ClassHierarchy {
        ClassHierarchy::with_platform(Box::new(ClassMap::new("artifact")), vec![])
    }

    fn frames_of(
        hierarchy: &ClassHierarchy,
        descriptor: &MethodDescriptor,
        code: &Code,
    ) -> (ControlFlow, Vec<Option<Frame>>) {
        let class_name = BinaryName::OBJECT;
        let method = MethodContext::new(hierarchy, &class_name, descriptor, true, code);
        let mut flow = ControlFlow::new(code, &method.labels).unwrap();
        let frames = compute_frames(&method, &mut flow).unwrap();
        (flow, frames)
    }

    fn static_void(parameters: Vec<FieldType>) -> MethodDescriptor {
        MethodDescriptor {
            parameters,
            return_type: None,
        }
    }

    #[test]
    fn join_at_label() {
        let hierarchy = hierarchy();
        let descriptor = static_void(vec![FieldType::int()]);
        let code = Code::new(
            1,
            2,
            vec![
                Instruction::ILoad(0),                                  // 0
                Instruction::If(OrdComparison::EQ, Label(0)),           // 1
                Instruction::Ldc(Constant::String(String::from("x"))), // 2
                Instruction::AStore(1),                                 // 3
                Instruction::Goto(Label(1)),                            // 4
                Instruction::Label(Label(0)),                           // 5
                Instruction::Ldc(Constant::Class(RefType::STRING)), // 6
                Instruction::AStore(1),                                 // 7
                Instruction::Label(Label(1)),                           // 8
                Instruction::Return,                                    // 9
            ],
        );
        let (_, frames) = frames_of(&hierarchy, &descriptor, &code);

        let joined = frames[9].as_ref().unwrap();
        assert_eq!(joined.local(0), Some(&InferredType::Int));
        assert_eq!(joined.local(1), Some(&InferredType::OBJECT));

        let branch = frames[6].as_ref().unwrap();
        assert_eq!(branch.local(1), None);
        assert_eq!(branch.stack_depth(), 0);
    }

    #[test]
    fn loop_widens_once() {
        let hierarchy = hierarchy();
        let descriptor = static_void(vec![]);
        let field = FieldRef {
            owner: BinaryName::OBJECT,
            name: UnqualifiedName::from_string(String::from("value")).unwrap(),
            descriptor: FieldType::object(BinaryName::OBJECT),
        };
        let code = Code::new(
            1,
            1,
            vec![
                Instruction::Ldc(Constant::String(String::from("a"))), // 0
                Instruction::AStore(0),                                 // 1
                Instruction::Label(Label(0)),                           // 2
                Instruction::GetStatic(field),                          // 3
                Instruction::AStore(0),                                 // 4
                Instruction::Goto(Label(0)),                            // 5
            ],
        );
        let (_, frames) = frames_of(&hierarchy, &descriptor, &code);
        let head = frames[2].as_ref().unwrap();
        assert_eq!(head.local(0), Some(&InferredType::OBJECT));
        assert_eq!(frames[3].as_ref().unwrap().local(0), Some(&InferredType::OBJECT));

        // a narrower incoming frame leaves the loop head untouched
        let mut narrow = frames[1].clone().unwrap();
        narrow.execute(1, &Instruction::AStore(0)).unwrap();
        assert_eq!(
            narrow.local(0),
            Some(&InferredType::object(BinaryName::STRING))
        );
        let mut widened = head.clone();
        assert!(!widened.merge(&narrow, &hierarchy, 2).unwrap());
        assert_eq!(widened.local(0), Some(&InferredType::OBJECT));
    }

    #[test]
    fn unreachable_code() {
        let hierarchy = hierarchy();
        let descriptor = static_void(vec![]);
        let code = Code::new(
            1,
            1,
            vec![
                Instruction::Return,          // 0
                Instruction::Label(Label(0)), // 1
                Instruction::IConst0,         // 2
                Instruction::IStore(0),       // 3
                Instruction::Return,          // 4
            ],
        );
        let (_, frames) = frames_of(&hierarchy, &descriptor, &code);
        assert!(frames[0].is_some());
        assert!(frames[1..].iter().all(Option::is_none));
    }

    #[test]
    fn handlers_and_throws() {
        let hierarchy = hierarchy();
        let descriptor = static_void(vec![]);
        let mut code = Code::new(
            2,
            2,
            vec![
                Instruction::Label(Label(0)),                            // 0
                Instruction::IConst1,                                    // 1
                Instruction::IStore(0),                                  // 2
                Instruction::New(BinaryName::ILLEGALSTATEEXCEPTION),     // 3
                Instruction::AThrow,                                     // 4
                Instruction::Label(Label(1)),                            // 5
                Instruction::Label(Label(2)),                            // 6
                Instruction::AStore(1),                                  // 7
                Instruction::Return,                                     // 8
            ],
        );
        code.try_catch_blocks.push(TryCatchBlock {
            start: Label(0),
            end: Label(1),
            handler: Label(2),
            catch_type: Some(BinaryName::RUNTIMEEXCEPTION),
        });
        let (flow, frames) = frames_of(&hierarchy, &descriptor, &code);

        assert_eq!(flow.jump_targets(4), Some(&[6][..]));

        // `x = 1` may or may not have happened when the handler runs
        let handler = frames[6].as_ref().unwrap();
        assert_eq!(handler.local(0), None);
        assert_eq!(
            handler.peek(1).unwrap().value_type,
            Some(InferredType::object(BinaryName::RUNTIMEEXCEPTION))
        );
    }

    #[test]
    fn snapshots_narrow_ints() {
        let hierarchy = hierarchy();
        let descriptor = static_void(vec![]);
        let flag = FieldRef {
            owner: BinaryName::OBJECT,
            name: UnqualifiedName::from_string(String::from("flag")).unwrap(),
            descriptor: FieldType::boolean(),
        };
        let code = Code::new(
            1,
            1,
            vec![
                Instruction::GetStatic(flag),                        // 0
                Instruction::IStore(0),                              // 1
                Instruction::ILoad(0),                               // 2
                Instruction::If(OrdComparison::NE, Label(0)),       // 3
                Instruction::Label(Label(0)),                        // 4
                Instruction::Frame(StackMapFrame::Full {             // 5
                    locals: vec![VerificationType::Integer],
                    stack: vec![],
                }),
                Instruction::Return,                                 // 6
            ],
        );
        let (_, frames) = frames_of(&hierarchy, &descriptor, &code);

        // The snapshot lands on the label, then joins back to `boolean`
        let at_label = frames[4].as_ref().unwrap();
        assert_eq!(at_label.local(0), Some(&InferredType::Boolean));
    }

    #[test]
    fn bad_snapshot() {
        let hierarchy = hierarchy();
        let descriptor = static_void(vec![]);
        let code = Code::new(
            1,
            1,
            vec![
                Instruction::Nop,
                Instruction::Label(Label(0)),
                Instruction::Frame(StackMapFrame::Full {
                    locals: vec![VerificationType::Uninitialized(Label(0))],
                    stack: vec![],
                }),
                Instruction::Return,
            ],
        );
        let class_name = BinaryName::OBJECT;
        let method = MethodContext::new(&hierarchy, &class_name, &descriptor, true, &code);
        let mut flow = ControlFlow::new(&code, &method.labels).unwrap();
        assert!(matches!(
            compute_frames(&method, &mut flow),
            Err(Error::MalformedFrameData { instruction: 2, .. })
        ));
    }
}
