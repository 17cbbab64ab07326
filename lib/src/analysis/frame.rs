use super::InferredType;
use crate::jvm::class_graph::ClassHierarchy;
use crate::jvm::code::{Constant, Instruction, InvokeType, StackMapFrame, VerificationType};
use crate::jvm::{BinaryName, Error, FieldType, FrameErrorKind, MethodDescriptor, RefType};
use crate::util::Width;

/// Value on the operand stack
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackValue {
    /// Type of the value (`None` if paths disagree on an incompatible type)
    pub value_type: Option<InferredType>,

    /// Local variable slot the value was loaded from, if any
    pub source: Option<u16>,
}

impl StackValue {
    fn anonymous(value_type: Option<InferredType>) -> StackValue {
        StackValue {
            value_type,
            source: None,
        }
    }
}

/// Abstract state of the locals and operand stack right before an instruction executes
///
/// Locals are a fixed size array (`max_locals` long). Empty slots are `None` and the slot after a
/// `long` or `double` holds [`InferredType::Top`]. The operand stack uses the same convention,
/// so a wide value takes up two cells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub locals: Vec<Option<InferredType>>,
    pub stack: Vec<StackValue>,
    max_stack: usize,

    /// Number of local slots described by the last snapshot (chops and appends are relative to
    /// this)
    locals_len: usize,

    /// Was this frame seeded from a stack map frame and not yet joined with a computed frame?
    expanded: bool,
}

impl Frame {
    pub fn new(max_locals: usize, max_stack: usize) -> Frame {
        Frame {
            locals: vec![None; max_locals],
            stack: Vec::with_capacity(max_stack),
            max_stack,
            locals_len: 0,
            expanded: false,
        }
    }

    /// Frame at the start of a method: `this` (for instance methods), then the parameters
    pub fn entry(
        this_class: Option<&BinaryName>,
        descriptor: &MethodDescriptor,
        max_locals: usize,
        max_stack: usize,
    ) -> Result<Frame, FrameErrorKind> {
        let mut frame = Frame::new(max_locals, max_stack);
        let mut offset: usize = 0;

        if let Some(this_class) = this_class {
            frame.set_local(0, InferredType::object(this_class.clone()))?;
            offset += 1;
        }
        for parameter in &descriptor.parameters {
            let parameter = InferredType::from(parameter.clone());
            let width = parameter.width();
            frame.set_local(local_index(offset)?, parameter)?;
            offset += width;
        }

        frame.locals_len = offset;
        Ok(frame)
    }

    pub fn is_expanded(&self) -> bool {
        self.expanded
    }

    pub fn local(&self, index: u16) -> Option<&InferredType> {
        self.locals.get(index as usize).and_then(Option::as_ref)
    }

    /// Set a local, marking the next slot as [`InferredType::Top`] for wide values
    pub fn set_local(&mut self, index: u16, local_type: InferredType) -> Result<(), FrameErrorKind> {
        let idx = index as usize;
        let width = local_type.width();
        if idx + width > self.locals.len() {
            return Err(FrameErrorKind::InvalidIndex(index));
        }

        // Clobbering the upper half of a wide value kills the whole value
        if idx > 0 && self.locals[idx] == Some(InferredType::Top) {
            if let Some(previous) = &self.locals[idx - 1] {
                if previous.width() == 2 {
                    self.locals[idx - 1] = None;
                }
            }
        }

        self.locals[idx] = Some(local_type);
        if width == 2 {
            self.locals[idx + 1] = Some(InferredType::Top);
        }
        Ok(())
    }

    /// Empty a local (both slots for wide values), returning what was there
    pub fn remove_local(&mut self, index: u16) -> Option<InferredType> {
        let idx = index as usize;
        let removed = self.locals.get_mut(idx)?.take()?;
        if removed.width() == 2 {
            if let Some(upper) = self.locals.get_mut(idx + 1) {
                *upper = None;
            }
        }
        Some(removed)
    }

    /// Slots which hold anything at all (including the upper halves of wide values)
    pub fn occupied_locals(&self) -> impl Iterator<Item = usize> + '_ {
        self.locals
            .iter()
            .enumerate()
            .filter_map(|(idx, local)| local.as_ref().map(|_| idx))
    }

    pub fn stack_depth(&self) -> usize {
        self.stack.len()
    }

    /// Look at a stack cell without popping it (offset 1 is the top of the stack)
    pub fn peek(&self, offset: usize) -> Option<&StackValue> {
        if offset == 0 || offset > self.stack.len() {
            None
        } else {
            self.stack.get(self.stack.len() - offset)
        }
    }

    pub fn peek_mut(&mut self, offset: usize) -> Option<&mut StackValue> {
        if offset == 0 || offset > self.stack.len() {
            None
        } else {
            let idx = self.stack.len() - offset;
            self.stack.get_mut(idx)
        }
    }

    /// Push a value, and a `Top` cell above it if the value is wide
    pub fn push(&mut self, value_type: InferredType, source: Option<u16>) -> Result<(), FrameErrorKind> {
        let width = value_type.width();
        if self.stack.len() + width > self.max_stack {
            return Err(FrameErrorKind::StackOverflow(self.max_stack));
        }
        self.stack.push(StackValue {
            value_type: Some(value_type),
            source,
        });
        if width == 2 {
            self.stack.push(StackValue {
                value_type: Some(InferredType::Top),
                source: source.map(|slot| slot + 1),
            });
        }
        Ok(())
    }

    fn push_cell(&mut self, cell: StackValue) -> Result<(), FrameErrorKind> {
        if self.stack.len() >= self.max_stack {
            return Err(FrameErrorKind::StackOverflow(self.max_stack));
        }
        self.stack.push(cell);
        Ok(())
    }

    /// Pop a single cell
    pub fn pop(&mut self) -> Result<StackValue, FrameErrorKind> {
        self.stack.pop().ok_or(FrameErrorKind::EmptyStack)
    }

    /// Pop a wide value (the `Top` cell and the value under it)
    pub fn pop_wide(&mut self) -> Result<StackValue, FrameErrorKind> {
        let upper = self.pop()?;
        if upper.value_type != Some(InferredType::Top) {
            return Err(FrameErrorKind::InvalidWidth(1));
        }
        self.pop()
    }

    fn pop_field(&mut self, field_type: &FieldType) -> Result<StackValue, FrameErrorKind> {
        if field_type.width() == 2 {
            self.pop_wide()
        } else {
            self.pop()
        }
    }

    /// Pop cells, returning them bottom first and with their provenance dropped
    fn pop_cells(&mut self, count: usize) -> Result<Vec<StackValue>, FrameErrorKind> {
        if self.stack.len() < count {
            return Err(FrameErrorKind::EmptyStack);
        }
        let cells = self.stack.split_off(self.stack.len() - count);
        Ok(cells
            .into_iter()
            .map(|cell| StackValue::anonymous(cell.value_type))
            .collect())
    }

    pub fn clear_stack(&mut self) {
        self.stack.clear();
    }

    /// Overwrite this frame with the state described by a stack map frame
    ///
    /// `resolve` turns snapshot values into inferred types (`None` for unusable slots).
    pub fn expand(
        &mut self,
        snapshot: &StackMapFrame,
        resolve: impl Fn(&VerificationType) -> Result<Option<InferredType>, String>,
    ) -> Result<(), String> {
        match snapshot {
            StackMapFrame::Full { locals, stack } => {
                self.locals_len = self.unpack_locals(locals, 0, &resolve)?;
                self.unpack_stack(stack, &resolve)?;
            }
            StackMapFrame::AppendLocals(locals) => {
                self.locals_len = self.unpack_locals(locals, self.locals_len, &resolve)?;
                self.clear_stack();
            }
            StackMapFrame::ChopLocals(chopped) => {
                for _ in 0..*chopped {
                    if self.locals_len == 0 {
                        return Err(format!("cannot chop {} locals", chopped));
                    }
                    self.locals_len -= 1;
                    let removed = self.locals[self.locals_len].take();
                    if removed == Some(InferredType::Top) && self.locals_len > 0 {
                        self.locals_len -= 1;
                        self.locals[self.locals_len] = None;
                    }
                }
                self.clear_stack();
            }
            StackMapFrame::Same => self.clear_stack(),
            StackMapFrame::SameLocalsOneStack(value) => {
                self.unpack_stack(std::slice::from_ref(value), &resolve)?;
            }
        }

        self.expanded = true;
        Ok(())
    }

    fn unpack_locals(
        &mut self,
        values: &[VerificationType],
        start: usize,
        resolve: &impl Fn(&VerificationType) -> Result<Option<InferredType>, String>,
    ) -> Result<usize, String> {
        let mut idx = start;
        for value in values {
            let local_type = resolve(value)?;
            let width = local_type.as_ref().map_or(1, Width::width);
            if idx + width > self.locals.len() {
                return Err(format!(
                    "{} locals do not fit in {} slots",
                    values.len(),
                    self.locals.len()
                ));
            }
            self.locals[idx] = local_type;
            if width == 2 {
                self.locals[idx + 1] = Some(InferredType::Top);
            }
            idx += width;
        }
        for local in &mut self.locals[idx..] {
            *local = None;
        }
        Ok(idx)
    }

    fn unpack_stack(
        &mut self,
        values: &[VerificationType],
        resolve: &impl Fn(&VerificationType) -> Result<Option<InferredType>, String>,
    ) -> Result<(), String> {
        self.clear_stack();
        for value in values {
            let pushed = match resolve(value)? {
                Some(value_type) => self.push(value_type, None),
                None => self.push_cell(StackValue::anonymous(None)),
            };
            pushed.map_err(|_| format!("stack exceeds {} cells", self.max_stack))?;
        }
        Ok(())
    }

    /// Join another frame into this one, returning whether anything changed
    pub fn merge(
        &mut self,
        other: &Frame,
        hierarchy: &ClassHierarchy,
        instruction: usize,
    ) -> Result<bool, Error> {
        if self.stack.len() != other.stack.len() {
            return Err(Error::InconsistentStackDepth {
                instruction,
                expected: self.stack.len(),
                found: other.stack.len(),
            });
        }

        let mut changed = false;

        for (local, other_local) in self.locals.iter_mut().zip(&other.locals) {
            let merged = merge_types(self.expanded, local, other_local, hierarchy)?;
            if *local != merged {
                *local = merged;
                changed = true;
            }
        }

        for (cell, other_cell) in self.stack.iter_mut().zip(&other.stack) {
            let merged = merge_types(
                self.expanded,
                &cell.value_type,
                &other_cell.value_type,
                hierarchy,
            )?;
            let source = match merged {
                None | Some(InferredType::Top) => None,
                Some(_) if cell.source == other_cell.source => cell.source,
                Some(_) => None,
            };
            if cell.value_type != merged || cell.source != source {
                cell.value_type = merged;
                cell.source = source;
                changed = true;
            }
        }

        self.expanded = false;
        Ok(changed)
    }

    /// Update the frame to reflect the effects of the instruction
    pub fn execute(&mut self, instruction: usize, insn: &Instruction) -> Result<(), Error> {
        if let Some(opcode) = insn.unsupported_opcode() {
            return Err(Error::UnsupportedOpcode {
                instruction,
                opcode,
            });
        }
        execute_instruction(self, insn).map_err(|kind| Error::Frame { instruction, kind })?;
        self.expanded = false;
        Ok(())
    }
}

fn local_index(offset: usize) -> Result<u16, FrameErrorKind> {
    u16::try_from(offset).map_err(|_| FrameErrorKind::InvalidIndex(u16::MAX))
}

fn merge_types(
    expanded: bool,
    type1: &Option<InferredType>,
    type2: &Option<InferredType>,
    hierarchy: &ClassHierarchy,
) -> Result<Option<InferredType>, Error> {
    let (type1, type2) = match (type1, type2) {
        (Some(type1), Some(type2)) => (type1, type2),
        _ => return Ok(None),
    };

    if type1 == &InferredType::Top || type2 == &InferredType::Top {
        return Ok(Some(InferredType::Top));
    }

    // Stack map frames only know about `int`, so the computed side is more precise
    if expanded && type1 == &InferredType::Int && type2.is_narrower_than_int() {
        return Ok(Some(type2.clone()));
    }

    InferredType::join(type1, type2, hierarchy)
}

/// Type of a value loaded from a local, falling back on what the instruction implies
fn load_type(frame: &Frame, index: u16, fallback: InferredType) -> InferredType {
    match frame.local(index) {
        Some(local_type) => local_type.clone(),
        None => {
            log::warn!("Load from empty local {}, assuming {:?}", index, fallback);
            fallback
        }
    }
}

fn stored_type(value: StackValue, fallback: InferredType) -> InferredType {
    value.value_type.unwrap_or(fallback)
}

fn array_element(array: &StackValue, fallback: InferredType) -> InferredType {
    array
        .value_type
        .as_ref()
        .and_then(InferredType::component_type)
        .unwrap_or(fallback)
}

fn execute_instruction(frame: &mut Frame, insn: &Instruction) -> Result<(), FrameErrorKind> {
    use Instruction::*;

    match insn {
        Label(_) | LineNumber(_) | Instruction::Frame(_) | Nop => (),

        AConstNull => frame.push(InferredType::Null, None)?,
        IConstM1 | IConst0 | IConst1 | IConst2 | IConst3 | IConst4 | IConst5 => {
            frame.push(InferredType::Int, None)?
        }
        LConst0 | LConst1 => frame.push(InferredType::Long, None)?,
        FConst0 | FConst1 | FConst2 => frame.push(InferredType::Float, None)?,
        DConst0 | DConst1 => frame.push(InferredType::Double, None)?,

        // `int` rather than `byte` or `short`: forcing narrow types here would leak into locals
        // that are plainly `int`s
        BiPush(_) | SiPush(_) => frame.push(InferredType::Int, None)?,

        Ldc(constant) => {
            let constant_type = match constant {
                Constant::Integer(_) => InferredType::Int,
                Constant::Float(_) => InferredType::Float,
                Constant::Long(_) => InferredType::Long,
                Constant::Double(_) => InferredType::Double,
                Constant::String(_) => InferredType::object(BinaryName::STRING),
                Constant::Class(_) => InferredType::object(BinaryName::CLASS),
                Constant::MethodType(_) => InferredType::object(BinaryName::METHODTYPE),
                Constant::MethodHandle => InferredType::object(BinaryName::METHODHANDLE),
            };
            frame.push(constant_type, None)?;
        }

        ILoad(idx) => {
            let loaded = load_type(frame, *idx, InferredType::Int);
            frame.push(loaded, Some(*idx))?;
        }
        LLoad(idx) => {
            let loaded = load_type(frame, *idx, InferredType::Long);
            frame.push(loaded, Some(*idx))?;
        }
        FLoad(idx) => {
            let loaded = load_type(frame, *idx, InferredType::Float);
            frame.push(loaded, Some(*idx))?;
        }
        DLoad(idx) => {
            let loaded = load_type(frame, *idx, InferredType::Double);
            frame.push(loaded, Some(*idx))?;
        }
        ALoad(idx) => {
            let loaded = load_type(frame, *idx, InferredType::OBJECT);
            frame.push(loaded, Some(*idx))?;
        }

        IALoad | LALoad | FALoad | DALoad | AALoad | BALoad | CALoad | SALoad => {
            let fallback = match insn {
                LALoad => InferredType::Long,
                FALoad => InferredType::Float,
                DALoad => InferredType::Double,
                AALoad => InferredType::Null,
                BALoad => InferredType::Byte,
                CALoad => InferredType::Char,
                SALoad => InferredType::Short,
                _ => InferredType::Int,
            };
            frame.pop()?; // index
            let array = frame.pop()?;
            frame.push(array_element(&array, fallback), None)?;
        }

        IStore(idx) => {
            let value = frame.pop()?;
            frame.set_local(*idx, stored_type(value, InferredType::Int))?;
        }
        FStore(idx) => {
            let value = frame.pop()?;
            frame.set_local(*idx, stored_type(value, InferredType::Float))?;
        }
        AStore(idx) => {
            let value = frame.pop()?;
            frame.set_local(*idx, stored_type(value, InferredType::OBJECT))?;
        }
        LStore(idx) => {
            let value = frame.pop_wide()?;
            frame.set_local(*idx, stored_type(value, InferredType::Long))?;
        }
        DStore(idx) => {
            let value = frame.pop_wide()?;
            frame.set_local(*idx, stored_type(value, InferredType::Double))?;
        }

        IAStore | FAStore | AAStore | BAStore | CAStore | SAStore => {
            frame.pop()?; // value
            frame.pop()?; // index
            frame.pop()?; // array
        }
        LAStore | DAStore => {
            frame.pop_wide()?;
            frame.pop()?;
            frame.pop()?;
        }

        Pop => {
            frame.pop()?;
        }
        Pop2 => {
            frame.pop()?;
            frame.pop()?;
        }

        // Dup-family instructions shuffle cells. The original cell of a `dup` keeps where it came
        // from, every other shuffled cell loses it.
        Dup => {
            let top = frame.peek(1).ok_or(FrameErrorKind::EmptyStack)?;
            let copy = StackValue::anonymous(top.value_type.clone());
            frame.push_cell(copy)?;
        }
        DupX1 => shuffle(frame, 2, &[1, 0, 1])?,
        DupX2 => shuffle(frame, 3, &[2, 0, 1, 2])?,
        Dup2 => shuffle(frame, 2, &[0, 1, 0, 1])?,
        Dup2X1 => shuffle(frame, 3, &[1, 2, 0, 1, 2])?,
        Dup2X2 => shuffle(frame, 4, &[2, 3, 0, 1, 2, 3])?,
        Swap => shuffle(frame, 2, &[1, 0])?,

        IAdd | ISub | IMul | IDiv | IRem | IAnd | IOr | IXor => {
            let value2 = frame.pop()?;
            let value1 = frame.pop()?;
            let result = InferredType::int_join(
                &stored_type(value1, InferredType::Int),
                &stored_type(value2, InferredType::Int),
            );
            frame.push(result, None)?;
        }
        FAdd | FSub | FMul | FDiv | FRem => {
            frame.pop()?;
            frame.pop()?;
            frame.push(InferredType::Float, None)?;
        }
        LAdd | LSub | LMul | LDiv | LRem | LAnd | LOr | LXor => {
            frame.pop_wide()?;
            frame.pop_wide()?;
            frame.push(InferredType::Long, None)?;
        }
        DAdd | DSub | DMul | DDiv | DRem => {
            frame.pop_wide()?;
            frame.pop_wide()?;
            frame.push(InferredType::Double, None)?;
        }
        INeg => {
            let value = frame.pop()?;
            frame.push(stored_type(value, InferredType::Int), None)?;
        }
        FNeg => {
            frame.pop()?;
            frame.push(InferredType::Float, None)?;
        }
        LNeg => {
            frame.pop_wide()?;
            frame.push(InferredType::Long, None)?;
        }
        DNeg => {
            frame.pop_wide()?;
            frame.push(InferredType::Double, None)?;
        }
        ISh(_) => {
            frame.pop()?; // amount
            let value = frame.pop()?;
            frame.push(stored_type(value, InferredType::Int), None)?;
        }
        LSh(_) => {
            frame.pop()?; // amount
            frame.pop_wide()?;
            frame.push(InferredType::Long, None)?;
        }
        IInc(idx, _) => {
            if frame.local(*idx).is_none() {
                log::warn!("Increment of empty local {}, assuming int", idx);
                frame.set_local(*idx, InferredType::Int)?;
            }
        }

        I2L | F2L => {
            frame.pop()?;
            frame.push(InferredType::Long, None)?;
        }
        I2F => {
            frame.pop()?;
            frame.push(InferredType::Float, None)?;
        }
        I2D | F2D => {
            frame.pop()?;
            frame.push(InferredType::Double, None)?;
        }
        F2I => {
            frame.pop()?;
            frame.push(InferredType::Int, None)?;
        }
        L2I | D2I => {
            frame.pop_wide()?;
            frame.push(InferredType::Int, None)?;
        }
        L2F | D2F => {
            frame.pop_wide()?;
            frame.push(InferredType::Float, None)?;
        }
        L2D => {
            frame.pop_wide()?;
            frame.push(InferredType::Double, None)?;
        }
        D2L => {
            frame.pop_wide()?;
            frame.push(InferredType::Long, None)?;
        }
        I2B => {
            frame.pop()?;
            frame.push(InferredType::Byte, None)?;
        }
        I2C => {
            frame.pop()?;
            frame.push(InferredType::Char, None)?;
        }
        I2S => {
            frame.pop()?;
            frame.push(InferredType::Short, None)?;
        }

        LCmp | DCmp(_) => {
            frame.pop_wide()?;
            frame.pop_wide()?;
            frame.push(InferredType::Int, None)?;
        }
        FCmp(_) => {
            frame.pop()?;
            frame.pop()?;
            frame.push(InferredType::Int, None)?;
        }

        If(_, _) | IfNull(_, _) | TableSwitch { .. } | LookupSwitch { .. } => {
            frame.pop()?;
        }
        IfICmp(_, _) | IfACmp(_, _) => {
            frame.pop()?;
            frame.pop()?;
        }
        Goto(_) | Jsr(_) | Ret(_) => (),

        IReturn | FReturn | AReturn => {
            frame.pop()?;
            frame.clear_stack();
        }
        LReturn | DReturn => {
            frame.pop_wide()?;
            frame.clear_stack();
        }
        Return => frame.clear_stack(),

        GetStatic(field) => frame.push(InferredType::from(field.descriptor.clone()), None)?,
        GetField(field) => {
            frame.pop()?; // object
            frame.push(InferredType::from(field.descriptor.clone()), None)?;
        }
        PutStatic(field) => {
            frame.pop_field(&field.descriptor)?;
        }
        PutField(field) => {
            frame.pop_field(&field.descriptor)?;
            frame.pop()?; // object
        }

        Invoke(invoke_type, method) => {
            pop_arguments(frame, &method.descriptor)?;
            if *invoke_type != InvokeType::Static {
                frame.pop()?; // receiver
            }
            if let Some(return_type) = &method.descriptor.return_type {
                frame.push(InferredType::from(return_type.clone()), None)?;
            }
        }
        InvokeDynamic(call_site) => {
            pop_arguments(frame, &call_site.descriptor)?;
            if let Some(return_type) = &call_site.descriptor.return_type {
                frame.push(InferredType::from(return_type.clone()), None)?;
            }
        }

        New(class_name) => frame.push(InferredType::object(class_name.clone()), None)?,
        NewArray(base_type) => {
            frame.pop()?; // length
            let array = RefType::array(FieldType::Base(*base_type));
            frame.push(InferredType::Reference(array), None)?;
        }
        ANewArray(element_type) => {
            frame.pop()?; // length
            let array = RefType::array(FieldType::Ref(element_type.clone()));
            frame.push(InferredType::Reference(array), None)?;
        }
        MultiANewArray(array_type, dimensions) => {
            for _ in 0..*dimensions {
                frame.pop()?;
            }
            frame.push(InferredType::Reference(array_type.clone()), None)?;
        }
        ArrayLength => {
            frame.pop()?;
            frame.push(InferredType::Int, None)?;
        }
        AThrow => {
            let thrown = frame.pop()?;
            frame.clear_stack();
            let thrown = thrown
                .value_type
                .unwrap_or(InferredType::Reference(RefType::THROWABLE));
            frame.push(thrown, None)?;
        }
        CheckCast(ref_type) => {
            frame.pop()?;
            frame.push(InferredType::Reference(ref_type.clone()), None)?;
        }
        InstanceOf(_) => {
            frame.pop()?;
            frame.push(InferredType::Boolean, None)?;
        }
        MonitorEnter | MonitorExit => {
            frame.pop()?;
        }
    }

    Ok(())
}

/// Pop the top `count` cells and push them back in the given order (indices count from the
/// bottom-most popped cell)
fn shuffle(frame: &mut Frame, count: usize, order: &[usize]) -> Result<(), FrameErrorKind> {
    let cells = frame.pop_cells(count)?;
    for idx in order {
        frame.push_cell(cells[*idx].clone())?;
    }
    Ok(())
}

fn pop_arguments(frame: &mut Frame, descriptor: &MethodDescriptor) -> Result<(), FrameErrorKind> {
    for parameter in descriptor.parameters.iter().rev() {
        frame.pop_field(parameter)?;
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::class_graph::ClassMap;
    use crate::jvm::code::{FieldRef, Label, MethodRef};
    use crate::jvm::{Name, ParseDescriptor, UnqualifiedName};

    fn hierarchy() -> ClassHierarchy {
        ClassHierarchy::with_platform(Box::new(ClassMap::new("artifact")), vec![])
    }

    fn entry(descriptor: &str, max_locals: usize, max_stack: usize) -> Frame {
        let descriptor = MethodDescriptor::parse(descriptor).unwrap();
        let this_class = BinaryName::from_string(String::from("me/Foo")).unwrap();
        Frame::entry(Some(&this_class), &descriptor, max_locals, max_stack).unwrap()
    }

    #[test]
    fn entry_frame() {
        let frame = entry("(JLjava/lang/String;)V", 5, 0);
        assert_eq!(
            frame.locals,
            vec![
                Some(InferredType::object(BinaryName::from_string(String::from("me/Foo")).unwrap())),
                Some(InferredType::Long),
                Some(InferredType::Top),
                Some(InferredType::object(BinaryName::STRING)),
                None,
            ]
        );
    }

    #[test]
    fn loads_track_provenance() {
        let mut frame = entry("(JI)V", 5, 4);
        frame.execute(0, &Instruction::LLoad(1)).unwrap();
        assert_eq!(frame.peek(2).unwrap().source, Some(1));
        assert_eq!(frame.peek(1).unwrap().source, Some(2));
        assert_eq!(frame.peek(1).unwrap().value_type, Some(InferredType::Top));

        frame.execute(1, &Instruction::LStore(3)).unwrap();
        assert_eq!(frame.local(3), Some(&InferredType::Long));
        assert_eq!(frame.local(4), Some(&InferredType::Top));
        assert_eq!(frame.stack_depth(), 0);

        // Storing into the upper half of the wide value kills it
        frame.execute(2, &Instruction::IConst0).unwrap();
        frame.execute(3, &Instruction::IStore(2)).unwrap();
        assert_eq!(frame.local(1), None);
        assert_eq!(frame.local(2), Some(&InferredType::Int));
    }

    #[test]
    fn narrow_int_arithmetic() {
        let owner = BinaryName::from_string(String::from("me/Foo")).unwrap();
        let field = |name: &str, descriptor: FieldType| FieldRef {
            owner: owner.clone(),
            name: UnqualifiedName::from_string(String::from(name)).unwrap(),
            descriptor,
        };

        let mut frame = entry("()V", 1, 3);
        frame.execute(0, &Instruction::GetStatic(field("flag", FieldType::boolean()))).unwrap();
        frame.execute(1, &Instruction::GetStatic(field("b", FieldType::byte()))).unwrap();
        frame.execute(2, &Instruction::IAnd).unwrap();
        assert_eq!(frame.peek(1).unwrap().value_type, Some(InferredType::Byte));

        frame.execute(3, &Instruction::I2C).unwrap();
        frame.execute(4, &Instruction::IConst1).unwrap();
        frame.execute(5, &Instruction::IAdd).unwrap();
        assert_eq!(frame.peek(1).unwrap().value_type, Some(InferredType::Int));
    }

    #[test]
    fn dups_and_invokes() {
        let mut frame = entry("()V", 1, 5);
        frame.execute(0, &Instruction::New(BinaryName::STRINGBUILDER)).unwrap();
        frame.execute(1, &Instruction::Dup).unwrap();
        frame.execute(
            2,
            &Instruction::Invoke(
                InvokeType::Special,
                MethodRef {
                    owner: RefType::Object(BinaryName::STRINGBUILDER),
                    name: UnqualifiedName::INIT,
                    descriptor: MethodDescriptor::parse("()V").unwrap(),
                },
            ),
        )
        .unwrap();
        assert_eq!(frame.stack_depth(), 1);

        frame.execute(3, &Instruction::LConst1).unwrap();
        frame.execute(4, &Instruction::Dup2X1).unwrap();
        assert_eq!(frame.stack_depth(), 5);
        assert_eq!(
            frame.peek(3).unwrap().value_type,
            Some(InferredType::object(BinaryName::STRINGBUILDER))
        );
        assert_eq!(frame.peek(5).unwrap().value_type, Some(InferredType::Long));

        let err = frame.execute(5, &Instruction::IConst0).unwrap_err();
        assert!(matches!(
            err,
            Error::Frame {
                instruction: 5,
                kind: FrameErrorKind::StackOverflow(5)
            }
        ));
    }

    #[test]
    fn array_elements() {
        let mut frame = entry("([[Ljava/lang/String;[Z)V", 3, 3);
        frame.execute(0, &Instruction::ALoad(1)).unwrap();
        frame.execute(1, &Instruction::IConst0).unwrap();
        frame.execute(2, &Instruction::AALoad).unwrap();
        assert_eq!(
            frame.peek(1).unwrap().value_type,
            Some(InferredType::Reference(RefType::parse("[Ljava/lang/String;").unwrap()))
        );
        frame.execute(3, &Instruction::Pop).unwrap();

        frame.execute(4, &Instruction::ALoad(2)).unwrap();
        frame.execute(5, &Instruction::IConst0).unwrap();
        frame.execute(6, &Instruction::BALoad).unwrap();
        assert_eq!(frame.peek(1).unwrap().value_type, Some(InferredType::Boolean));
    }

    #[test]
    fn unsupported_and_underflow() {
        let mut frame = entry("()V", 1, 1);
        assert!(matches!(
            frame.execute(7, &Instruction::Jsr(Label(0))),
            Err(Error::UnsupportedOpcode {
                instruction: 7,
                opcode: "jsr"
            })
        ));
        assert!(matches!(
            frame.execute(8, &Instruction::Pop),
            Err(Error::Frame {
                instruction: 8,
                kind: FrameErrorKind::EmptyStack
            })
        ));
    }

    #[test]
    fn merging() {
        let hierarchy = hierarchy();
        let mut frame1 = entry("(ILjava/lang/Integer;)V", 3, 1);
        let mut frame2 = entry("(FLjava/lang/Long;)V", 3, 1);
        assert!(frame1.merge(&frame2, &hierarchy, 0).unwrap());
        assert_eq!(frame1.local(1), None);
        assert_eq!(
            frame1.local(2),
            Some(&InferredType::object(BinaryName::NUMBER))
        );
        assert!(!frame1.merge(&frame2, &hierarchy, 0).unwrap());

        frame2.execute(0, &Instruction::IConst0).unwrap();
        assert!(matches!(
            frame1.merge(&frame2, &hierarchy, 3),
            Err(Error::InconsistentStackDepth {
                instruction: 3,
                expected: 0,
                found: 1
            })
        ));
    }

    #[test]
    fn merging_provenance() {
        let hierarchy = hierarchy();
        let loaded = |var: u16| {
            let mut frame = entry("(II)V", 3, 1);
            frame.execute(0, &Instruction::ILoad(var)).unwrap();
            frame
        };

        let mut same = loaded(1);
        assert!(!same.merge(&loaded(1), &hierarchy, 1).unwrap());
        assert_eq!(same.peek(1).unwrap().source, Some(1));

        // Values loaded from different locals don't trace back to either of them
        let mut different = loaded(1);
        assert!(different.merge(&loaded(2), &hierarchy, 1).unwrap());
        assert_eq!(different.peek(1).unwrap().source, None);
        assert!(!different.merge(&loaded(1), &hierarchy, 1).unwrap());
        assert_eq!(different.peek(1).unwrap().source, None);
        assert_eq!(
            different.peek(1).unwrap().value_type,
            Some(InferredType::Int)
        );
    }

    #[test]
    fn snapshots() {
        let hierarchy = hierarchy();
        let resolve = |value: &VerificationType| -> Result<Option<InferredType>, String> {
            Ok(match value {
                VerificationType::Top => None,
                VerificationType::Integer => Some(InferredType::Int),
                VerificationType::Long => Some(InferredType::Long),
                VerificationType::Object(ref_type) => Some(InferredType::Reference(ref_type.clone())),
                _ => return Err(String::from("unexpected")),
            })
        };

        let mut frame = entry("(I)V", 5, 1);
        frame
            .expand(
                &StackMapFrame::AppendLocals(vec![VerificationType::Long]),
                &resolve,
            )
            .unwrap();
        assert_eq!(frame.local(2), Some(&InferredType::Long));
        assert_eq!(frame.local(3), Some(&InferredType::Top));
        assert!(frame.is_expanded());

        // Computed frames refine the `int` only snapshot types
        let mut computed = frame.clone();
        computed.set_local(1, InferredType::Boolean).unwrap();
        assert!(frame.merge(&computed, &hierarchy, 0).unwrap());
        assert_eq!(frame.local(1), Some(&InferredType::Boolean));
        assert!(!frame.is_expanded());

        frame.expand(&StackMapFrame::ChopLocals(1), &resolve).unwrap();
        assert_eq!(frame.local(2), None);
        assert_eq!(frame.local(3), None);
        assert_eq!(frame.local(1), Some(&InferredType::Boolean));

        assert!(frame
            .expand(
                &StackMapFrame::Full {
                    locals: vec![VerificationType::Integer; 6],
                    stack: vec![],
                },
                &resolve,
            )
            .is_err());
    }
}
