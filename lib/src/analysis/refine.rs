use super::{ControlFlow, Frame, InferredType, MethodContext, StackValue};
use crate::jvm::class_graph::ClassHierarchy;
use crate::jvm::code::{Instruction, InvokeType, OrdComparison};
use crate::jvm::{Error, FieldType, MethodDescriptor};
use crate::util::Width;
use fixedbitset::FixedBitSet;

/// Sharpens the types of locals using how their values get used
///
/// The frames only know what the JVM knows: `boolean`, `byte`, `char`, and `short` locals all look
/// like `int`, and a local only ever assigned `null` has no class. Values flowing into a typed
/// context (a field, a method parameter, an array element, a return) reveal the declared type,
/// and that type is pushed back onto the stores which produced the value. Values flowing out of a
/// typed source are pushed forward onto the next store.
///
/// Each local at each instruction is refined at most once from scratch. After that, further
/// refinements can only widen it (so `x = 'a'; x = 300;` leaves `x` an `int`).
pub struct Refiner<'m> {
    hierarchy: &'m ClassHierarchy,
    instructions: &'m [Instruction],
    flow: &'m ControlFlow,
    frames: &'m mut [Option<Frame>],
    return_type: Option<InferredType>,

    /// For every local slot, instructions at which that local has been refined
    processed: Vec<FixedBitSet>,
}

/// Outcome of following one value back to where it came from
enum Verdict {
    Accept,
    Reject,
    Neutral,
}

impl<'m> Refiner<'m> {
    pub fn new(
        method: &MethodContext<'m>,
        flow: &'m ControlFlow,
        frames: &'m mut [Option<Frame>],
    ) -> Refiner<'m> {
        let instructions = method.instructions();
        Refiner {
            hierarchy: method.hierarchy,
            instructions,
            flow,
            frames,
            return_type: method.descriptor.return_type.clone().map(InferredType::from),
            processed: vec![FixedBitSet::with_capacity(instructions.len()); method.max_locals()],
        }
    }

    /// Run all refinements over the method
    pub fn refine(mut self) -> Result<(), Error> {
        let instructions = self.instructions;

        for (idx, insn) in instructions.iter().enumerate() {
            if self.frame(idx).is_some() {
                self.apply_context(idx, insn)?;
            }
        }
        for (idx, insn) in instructions.iter().enumerate() {
            if self.frame(idx).is_some() {
                self.apply_restrictions(idx, insn)?;
            }
        }
        for (idx, insn) in instructions.iter().enumerate() {
            if self.frame(idx).is_some() {
                self.apply_boolean_logic(idx, insn)?;
            }
        }
        self.process_locals_on_store()
    }

    /// Types demanded or produced by fields, methods, arrays, conversions, and returns
    fn apply_context(&mut self, idx: usize, insn: &Instruction) -> Result<(), Error> {
        match insn {
            Instruction::IALoad
            | Instruction::LALoad
            | Instruction::FALoad
            | Instruction::DALoad
            | Instruction::AALoad
            | Instruction::BALoad
            | Instruction::CALoad
            | Instruction::SALoad => {
                if let Some(component) = self.component_at(idx, 2) {
                    self.after(idx, &component)?;
                }
            }

            Instruction::IAStore
            | Instruction::FAStore
            | Instruction::AAStore
            | Instruction::BAStore
            | Instruction::CAStore
            | Instruction::SAStore
            | Instruction::LAStore
            | Instruction::DAStore => {
                let array_offset = match insn {
                    Instruction::LAStore | Instruction::DAStore => 4,
                    _ => 3,
                };
                if let Some(component) = self.component_at(idx, array_offset) {
                    self.before(idx, 0, &component)?;
                }
            }

            Instruction::L2I | Instruction::F2I | Instruction::D2I => {
                self.after(idx, &InferredType::Int)?;
            }

            Instruction::I2B | Instruction::I2S | Instruction::I2C => {
                self.before(idx, 0, &InferredType::Int)?;
                let narrowed = match insn {
                    Instruction::I2B => InferredType::Byte,
                    Instruction::I2S => InferredType::Short,
                    _ => InferredType::Char,
                };
                self.after(idx, &narrowed)?;
            }

            Instruction::GetField(field) => {
                self.before(idx, 0, &InferredType::object(field.owner.clone()))?;
                self.after(idx, &InferredType::from(field.descriptor.clone()))?;
            }
            Instruction::GetStatic(field) => {
                self.after(idx, &InferredType::from(field.descriptor.clone()))?;
            }
            Instruction::PutField(field) => {
                let field_type = InferredType::from(field.descriptor.clone());
                self.before(idx, 0, &field_type)?;
                self.before(
                    idx,
                    field_type.width(),
                    &InferredType::object(field.owner.clone()),
                )?;
            }
            Instruction::PutStatic(field) => {
                self.before(idx, 0, &InferredType::from(field.descriptor.clone()))?;
            }

            Instruction::Invoke(invoke_type, method) => {
                let receiver = match invoke_type {
                    InvokeType::Static => None,
                    _ => Some(InferredType::Reference(method.owner.clone())),
                };
                self.invocation(idx, &method.descriptor, receiver)?;
            }
            Instruction::InvokeDynamic(site) => {
                self.invocation(idx, &site.descriptor, None)?;
            }

            Instruction::IReturn
            | Instruction::LReturn
            | Instruction::FReturn
            | Instruction::DReturn
            | Instruction::AReturn => {
                if let Some(return_type) = self.return_type.clone() {
                    self.before(idx, 0, &return_type)?;
                }
            }

            _ => (),
        }
        Ok(())
    }

    fn invocation(
        &mut self,
        idx: usize,
        descriptor: &MethodDescriptor,
        receiver: Option<InferredType>,
    ) -> Result<(), Error> {
        let mut offset = 0;
        for parameter in descriptor.parameters.iter().rev() {
            let parameter = InferredType::from(parameter.clone());
            self.before(idx, offset, &parameter)?;
            offset += parameter.width();
        }
        if let Some(receiver) = receiver {
            self.before(idx, offset, &receiver)?;
        }
        if let Some(return_type) = &descriptor.return_type {
            self.after(idx, &InferredType::from(return_type.clone()))?;
        }
        Ok(())
    }

    /// Operations which rule out `boolean` or tie operand types together
    fn apply_restrictions(&mut self, idx: usize, insn: &Instruction) -> Result<(), Error> {
        match insn {
            Instruction::IConstM1
            | Instruction::IConst2
            | Instruction::IConst3
            | Instruction::IConst4
            | Instruction::IConst5
            | Instruction::BiPush(_)
            | Instruction::SiPush(_) => self.after(idx, &InferredType::Int)?,

            Instruction::IAdd
            | Instruction::ISub
            | Instruction::IMul
            | Instruction::IDiv
            | Instruction::IRem => {
                let (value2, value1) = match (self.cell_type(idx, 1), self.cell_type(idx, 2)) {
                    (Some(value2), Some(value1)) => (value2, value1),
                    _ => return Ok(()),
                };
                let value2 = arithmetic_operand(&value2);
                let value1 = arithmetic_operand(&value1);
                let value2 = self.before(idx, 0, &value2)?.unwrap_or(value2);
                let value1 = self.before(idx, 1, &value1)?.unwrap_or(value1);
                self.after(idx, &InferredType::int_join(&value1, &value2))?;
            }

            Instruction::ISh(_) => {
                if let Some(amount) = self.cell_type(idx, 1) {
                    self.before(idx, 0, &arithmetic_operand(&amount))?;
                }
                if let Some(value) = self.cell_type(idx, 2) {
                    let value = arithmetic_operand(&value);
                    let value = self.before(idx, 1, &value)?.unwrap_or(value);
                    self.after(idx, &value)?;
                }
            }
            Instruction::LSh(_) => {
                if let Some(amount) = self.cell_type(idx, 1) {
                    self.before(idx, 0, &arithmetic_operand(&amount))?;
                }
            }

            Instruction::IInc(var, _) => {
                let local = self.frame(idx).and_then(|frame| frame.local(*var)).cloned();
                if let Some(local) = local {
                    let stores = self.collect_stored_locals(idx, *var, &local, &InferredType::Int)?;
                    self.tweak_stores(&stores, &InferredType::Int)?;
                }
            }

            Instruction::If(comparison, _) if is_ordering(comparison) => {
                if let Some(value) = self.cell_type(idx, 1) {
                    self.before(idx, 0, &arithmetic_operand(&value))?;
                }
            }
            Instruction::IfNull(_, _) => {
                if let Some(value) = self.cell_type(idx, 1) {
                    self.before(idx, 0, &value)?;
                }
            }
            Instruction::IfICmp(comparison, _) if is_ordering(comparison) => {
                if let Some(value2) = self.cell_type(idx, 1) {
                    self.before(idx, 0, &arithmetic_operand(&value2))?;
                }
                if let Some(value1) = self.cell_type(idx, 2) {
                    self.before(idx, 1, &arithmetic_operand(&value1))?;
                }
            }
            Instruction::IfACmp(_, _) => {
                if let Some(value2) = self.cell_type(idx, 1) {
                    self.before(idx, 0, &value2)?;
                }
                if let Some(value1) = self.cell_type(idx, 2) {
                    self.before(idx, 1, &value1)?;
                }
            }

            _ => (),
        }
        Ok(())
    }

    /// Logic operations and comparisons against zero which suggest `boolean`
    ///
    /// Both operands of a binary operation must be able to become `boolean`, otherwise whichever
    /// one did get changed is changed back.
    fn apply_boolean_logic(&mut self, idx: usize, insn: &Instruction) -> Result<(), Error> {
        match insn {
            Instruction::IAnd | Instruction::IOr | Instruction::IXor => {
                if self.try_boolean_operands(idx)? {
                    self.after(idx, &InferredType::Boolean)?;
                } else {
                    self.after(idx, &InferredType::Int)?;
                }
            }
            Instruction::If(OrdComparison::EQ | OrdComparison::NE, _) => {
                self.before(idx, 0, &InferredType::Boolean)?;
            }
            Instruction::IfICmp(OrdComparison::EQ | OrdComparison::NE, _) => {
                self.try_boolean_operands(idx)?;
            }
            _ => (),
        }
        Ok(())
    }

    /// Try to make both operands `boolean`, undoing partial success
    fn try_boolean_operands(&mut self, idx: usize) -> Result<bool, Error> {
        let (value2, value1) = match (self.cell_type(idx, 1), self.cell_type(idx, 2)) {
            (Some(value2), Some(value1)) => (value2, value1),
            _ => return Ok(false),
        };
        let boolean = InferredType::Boolean;
        let tweaked2 = self.before(idx, 0, &boolean)? == Some(InferredType::Boolean);
        let tweaked1 = self.before(idx, 1, &boolean)? == Some(InferredType::Boolean);
        if tweaked1 && tweaked2 {
            return Ok(true);
        }

        if tweaked2 {
            self.reset(idx, 0, &value2, &boolean)?;
        }
        if tweaked1 {
            self.reset(idx, 1, &value1, &boolean)?;
        }
        Ok(false)
    }

    /// Refine the stores feeding an operand of an instruction
    ///
    /// `offset` counts the stack cells above the operand. Returns the type the operand ends up
    /// with, if it could be found.
    fn before(
        &mut self,
        idx: usize,
        offset: usize,
        expected: &InferredType,
    ) -> Result<Option<InferredType>, Error> {
        let (expected_size, cell_offset, cell) = match self.operand(idx, offset, expected) {
            Some(operand) => operand,
            None => return Ok(None),
        };
        if cell.source.is_none() {
            return Ok(cell.value_type);
        }

        let stores = self.collect_loaded_locals(idx, expected_size, expected)?;
        if stores.is_empty() {
            return Ok(cell.value_type);
        }

        let tweaked = self.tweak_stores(&stores, expected)?;
        if let Some(tweaked) = &tweaked {
            if let Some(cell) = self.frame_mut(idx).and_then(|frame| frame.peek_mut(cell_offset)) {
                cell.value_type = Some(tweaked.clone());
            }
        }
        Ok(tweaked)
    }

    /// Undo what [`Self::before`] did to the stores feeding an operand
    fn reset(
        &mut self,
        idx: usize,
        offset: usize,
        original: &InferredType,
        tweaked: &InferredType,
    ) -> Result<(), Error> {
        let (expected_size, cell_offset, cell) = match self.operand(idx, offset, tweaked) {
            Some(operand) => operand,
            None => return Ok(()),
        };
        if cell.source.is_none() {
            return Ok(());
        }

        for store in self.collect_loaded_locals(idx, expected_size, tweaked)? {
            if let Some((var, stored)) = self.stored_at(store) {
                self.tweak_local(store + 1, var, &stored, original.clone())?;
            }
        }
        if let Some(cell) = self.frame_mut(idx).and_then(|frame| frame.peek_mut(cell_offset)) {
            cell.value_type = Some(original.clone());
        }
        Ok(())
    }

    /// Stack height including the operand, offset of the operand's first cell, and that cell
    fn operand(
        &self,
        idx: usize,
        offset: usize,
        expected: &InferredType,
    ) -> Option<(usize, usize, StackValue)> {
        let frame = self.frame(idx)?;
        let expected_size = frame.stack_depth().checked_sub(offset)?;
        let width = expected.width();
        if expected_size < width {
            return None;
        }
        let cell = frame.peek(offset + width)?.clone();
        Some((expected_size, offset + width, cell))
    }

    /// Find the stores of the locals whose loads produced the stack value at `expected_size`
    fn collect_loaded_locals(
        &self,
        end: usize,
        expected_size: usize,
        expected: &InferredType,
    ) -> Result<Vec<usize>, Error> {
        let width = expected.width();
        let mut stores = vec![];
        let mut visited = FixedBitSet::with_capacity(self.instructions.len());
        let mut paths: Vec<(usize, bool)> = vec![(end, true)];

        while let Some((start, mut skip)) = paths.pop() {
            let mut idx = start;
            loop {
                if !skip {
                    if visited.put(idx) {
                        break;
                    }
                    let frame = match self.frame(idx) {
                        Some(frame) => frame,
                        None => break,
                    };
                    let insn = &self.instructions[idx];
                    let stack_size = frame.stack_depth();

                    if stack_size + width == expected_size {
                        if let Some(var) = insn.loaded_local() {
                            if let Some(local) = frame.local(var) {
                                if self.is_local_compatible(local, expected)? {
                                    let local = local.clone();
                                    for store in
                                        self.collect_stored_locals(idx, var, &local, expected)?
                                    {
                                        if !stores.contains(&store) {
                                            stores.push(store);
                                        }
                                    }
                                }
                            }
                        }
                        if !insn.is_pseudo() {
                            break;
                        }
                    } else if stack_size < expected_size {
                        break;
                    }
                }
                skip = false;

                if let Some(sources) = self.flow.jump_sources(idx) {
                    paths.extend(sources.iter().map(|source| (*source, false)));
                    break;
                }
                if idx == 0 {
                    break;
                }
                idx -= 1;
            }
        }

        Ok(stores)
    }

    /// Find the stores to `var` that reach `start`, as long as they are compatible
    fn collect_stored_locals(
        &self,
        start: usize,
        var: u16,
        expected_local: &InferredType,
        expected: &InferredType,
    ) -> Result<Vec<usize>, Error> {
        let mut stores = vec![];
        let mut visited = FixedBitSet::with_capacity(self.instructions.len());
        let mut paths: Vec<usize> = vec![start];

        while let Some(mut idx) = paths.pop() {
            loop {
                if visited.put(idx) {
                    break;
                }

                if self.instructions[idx].stored_local() == Some(var) {
                    let local = self.frame(idx + 1).and_then(|frame| frame.local(var));
                    let marked = match local {
                        Some(local) => {
                            self.is_local_compatible(local, expected_local)?
                                && self.is_local_compatible(local, expected)?
                        }
                        None => false,
                    };
                    if !marked {
                        break;
                    }
                    stores.push(idx);
                }

                if let Some(sources) = self.flow.jump_sources(idx) {
                    paths.extend_from_slice(sources);
                    break;
                }
                if idx == 0 {
                    break;
                }
                idx -= 1;
            }
        }

        Ok(stores)
    }

    /// Refine the store which consumes the value pushed by `start`
    fn after(&mut self, start: usize, expected: &InferredType) -> Result<(), Error> {
        let instructions = self.instructions;
        let mut visited = FixedBitSet::with_capacity(instructions.len());
        let mut paths: Vec<(usize, bool)> = vec![(start, true)];

        while let Some((mut idx, mut skip)) = paths.pop() {
            loop {
                if !skip {
                    if visited.put(idx) {
                        break;
                    }
                    let insn = &instructions[idx];
                    if let Some(var) = insn.stored_local() {
                        let local = self.frame(idx + 1).and_then(|frame| frame.local(var)).cloned();
                        if let Some(local) = local {
                            let tweaked = if should_tweak(&local, expected) {
                                expected.clone()
                            } else {
                                local.clone()
                            };
                            self.tweak_local(idx + 1, var, &local, tweaked)?;
                        }
                        break;
                    }
                    if !insn.is_pseudo() && !matches!(insn, Instruction::Goto(_)) {
                        break;
                    }
                }
                skip = false;

                if let Some(targets) = self.flow.jump_targets(idx) {
                    paths.extend(targets.iter().map(|target| (*target, false)));
                    break;
                }
                idx += 1;
                if idx >= instructions.len() {
                    break;
                }
            }
        }
        Ok(())
    }

    /// Give every store the same refined type, returning the type the stored locals end up with
    ///
    /// Returns `None` if the stores can't agree on a type.
    fn tweak_stores(
        &mut self,
        stores: &[usize],
        expected: &InferredType,
    ) -> Result<Option<InferredType>, Error> {
        let common = match self.common_stored_type(stores)? {
            Some(common) => common,
            None => return Ok(None),
        };
        let tweaked = if should_tweak(&common, expected) {
            expected.clone()
        } else {
            common
        };

        for store in stores {
            if let Some((var, stored)) = self.stored_at(*store) {
                self.tweak_local(store + 1, var, &stored, tweaked.clone())?;
            }
        }
        self.common_stored_type(stores)
    }

    /// Join of the types of the stored locals, ignoring `null`s where possible
    fn common_stored_type(&self, stores: &[usize]) -> Result<Option<InferredType>, Error> {
        let mut common: Option<InferredType> = None;
        for store in stores {
            let stored = match self.stored_at(*store) {
                Some((_, stored)) if stored != InferredType::Null => stored,
                _ => continue,
            };
            common = match common {
                None => Some(stored),
                Some(common) => match InferredType::join(&common, &stored, self.hierarchy)? {
                    Some(joined) => Some(joined),
                    None => return Ok(None),
                },
            };
        }
        Ok(Some(common.unwrap_or(InferredType::Null)))
    }

    /// Retype a local from `start` onwards, for as long as it still has the type `expected_local`
    fn tweak_local(
        &mut self,
        start: usize,
        var: u16,
        expected_local: &InferredType,
        tweaked: InferredType,
    ) -> Result<(), Error> {
        let slot = var as usize;
        if slot >= self.processed.len() {
            return Ok(());
        }
        let flow = self.flow;
        let mut paths: Vec<(usize, InferredType)> = vec![(start, tweaked)];

        while let Some((mut idx, mut tweaked)) = paths.pop() {
            loop {
                let local = match self.frame(idx).and_then(|frame| frame.local(var)) {
                    Some(local) if local == expected_local => local.clone(),
                    _ => break,
                };

                if self.processed[slot].contains(idx) {
                    if tweaked == local {
                        break;
                    }
                    tweaked = InferredType::join(&tweaked, &local, self.hierarchy)?.unwrap_or(local);
                } else {
                    self.processed[slot].insert(idx);
                }

                if let Some(frame) = self.frame_mut(idx) {
                    frame
                        .set_local(var, tweaked.clone())
                        .map_err(|kind| Error::Frame {
                            instruction: idx,
                            kind,
                        })?;
                }

                if let Some(targets) = flow.jump_targets(idx) {
                    paths.extend(targets.iter().map(|target| (*target, tweaked.clone())));
                    break;
                }
                if flow.exit.contains(idx) || idx + 1 >= self.instructions.len() {
                    break;
                }
                idx += 1;
            }
        }
        Ok(())
    }

    /// Turn `int` stores into `boolean` stores when the value can only be a boolean
    fn process_locals_on_store(&mut self) -> Result<(), Error> {
        let instructions = self.instructions;
        let mut changed = true;
        while changed {
            changed = false;

            for (idx, insn) in instructions.iter().enumerate() {
                let var = match insn {
                    Instruction::IStore(var) => *var,
                    _ => continue,
                };
                let slot = var as usize;
                if slot >= self.processed.len() || self.processed[slot].contains(idx + 1) {
                    continue;
                }

                let local = self.frame(idx + 1).and_then(|frame| frame.local(var)).cloned();
                match local {
                    Some(local) if local != InferredType::Boolean => {
                        if self.check_boolean(idx) {
                            self.tweak_local(idx + 1, var, &local, InferredType::Boolean)?;
                            changed |= self.processed[slot].contains(idx + 1);
                        }
                    }
                    _ => (),
                }
            }
        }
        Ok(())
    }

    /// Is every value that can reach the store at `end` a boolean?
    ///
    /// Values are traced back through constants `0` and `1` and jumps. A conditional branch is
    /// taken as the tell-tale sign of a boolean expression being materialized.
    fn check_boolean(&self, end: usize) -> bool {
        let mut accepted = false;
        let mut visited = FixedBitSet::with_capacity(self.instructions.len());
        let mut paths: Vec<(usize, bool)> = vec![(end, true)];

        while let Some((mut idx, mut skip)) = paths.pop() {
            loop {
                if !skip {
                    if visited.put(idx) {
                        break;
                    }
                    match self.boolean_verdict(idx) {
                        Some(Verdict::Accept) => {
                            accepted = true;
                            break;
                        }
                        Some(Verdict::Reject) => return false,
                        Some(Verdict::Neutral) => break,
                        None => (),
                    }
                }
                skip = false;

                if let Some(sources) = self.flow.jump_sources(idx) {
                    paths.extend(sources.iter().map(|source| (*source, false)));
                    break;
                }
                if idx == 0 {
                    return false;
                }
                idx -= 1;
            }
        }

        accepted
    }

    /// What an instruction says about the value on top of the stack (`None` to keep looking)
    fn boolean_verdict(&self, idx: usize) -> Option<Verdict> {
        let boolean = Some(FieldType::boolean());
        let verdict = |is_boolean: bool| {
            if is_boolean {
                Verdict::Accept
            } else {
                Verdict::Reject
            }
        };

        let insn = &self.instructions[idx];
        Some(match insn {
            _ if insn.is_pseudo() => return None,
            Instruction::IConst0 | Instruction::IConst1 | Instruction::Goto(_) => return None,
            Instruction::ILoad(var) => match self.frame(idx) {
                Some(frame) => verdict(frame.local(*var) == Some(&InferredType::Boolean)),
                None => Verdict::Neutral,
            },
            Instruction::GetField(field) | Instruction::GetStatic(field) => {
                verdict(Some(field.descriptor.clone()) == boolean)
            }
            Instruction::Invoke(_, method) => verdict(method.descriptor.return_type == boolean),
            Instruction::InvokeDynamic(site) => verdict(site.descriptor.return_type == boolean),
            // `x < y` and `a == b` materialize through the two operand compares
            Instruction::If(_, _)
            | Instruction::IfICmp(_, _)
            | Instruction::IfACmp(_, _)
            | Instruction::IfNull(_, _) => Verdict::Accept,
            _ => Verdict::Reject,
        })
    }

    /// Can a local of type `local` hold a value used as `expected`?
    fn is_local_compatible(
        &self,
        local: &InferredType,
        expected: &InferredType,
    ) -> Result<bool, Error> {
        if local == expected {
            return Ok(true);
        }
        if expected.is_narrower_than_int() {
            return Ok(local == &InferredType::Int);
        }
        Ok(match expected {
            InferredType::Int => matches!(
                local,
                InferredType::Char | InferredType::Byte | InferredType::Short
            ),
            InferredType::Float | InferredType::Long | InferredType::Double => false,
            _ if local.is_reference() && expected.is_reference() => {
                local == &InferredType::Null
                    || InferredType::join(local, expected, self.hierarchy)?.as_ref()
                        == Some(expected)
            }
            _ => false,
        })
    }

    fn frame(&self, idx: usize) -> Option<&Frame> {
        self.frames.get(idx).and_then(Option::as_ref)
    }

    fn frame_mut(&mut self, idx: usize) -> Option<&mut Frame> {
        self.frames.get_mut(idx).and_then(Option::as_mut)
    }

    fn cell_type(&self, idx: usize, offset: usize) -> Option<InferredType> {
        self.frame(idx)?.peek(offset)?.value_type.clone()
    }

    fn component_at(&self, idx: usize, offset: usize) -> Option<InferredType> {
        self.cell_type(idx, offset)?.component_type()
    }

    /// Local slot written by a store, along with the type it holds afterwards
    fn stored_at(&self, store: usize) -> Option<(u16, InferredType)> {
        let var = self.instructions.get(store)?.stored_local()?;
        let local = self.frame(store + 1)?.local(var)?.clone();
        Some((var, local))
    }
}

/// Should a local of type `local` be replaced by the more precise `expected`?
fn should_tweak(local: &InferredType, expected: &InferredType) -> bool {
    if expected.is_narrower_than_int() {
        local == &InferredType::Int
    } else if local.is_reference() && expected.is_reference() {
        local == &InferredType::Null
    } else {
        false
    }
}

/// Arithmetic operands are at least `int`, but keep a narrower type if they have one
fn arithmetic_operand(operand: &InferredType) -> InferredType {
    if operand == &InferredType::Boolean {
        InferredType::Int
    } else {
        operand.clone()
    }
}

fn is_ordering(comparison: &OrdComparison) -> bool {
    matches!(
        comparison,
        OrdComparison::LT | OrdComparison::GE | OrdComparison::GT | OrdComparison::LE
    )
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::analysis::compute_frames;
    use crate::jvm::class_graph::ClassMap;
    use crate::jvm::code::{Code, FieldRef, Label, ShiftType};
    use crate::jvm::{BinaryName, Name, UnqualifiedName};

    fn flag() -> FieldRef {
        FieldRef {
            owner: BinaryName::OBJECT,
            name: UnqualifiedName::from_string(String::from("flag")).unwrap(),
            descriptor: FieldType::boolean(),
        }
    }

    fn refine(code: &Code, parameters: Vec<FieldType>) -> Vec<Option<Frame>> {
        let hierarchy = ClassHierarchy::with_platform(Box::new(ClassMap::new("artifact")), vec![]);
        let descriptor = MethodDescriptor {
            parameters,
            return_type: None,
        };
        let class_name = BinaryName::OBJECT;
        let method = MethodContext::new(&hierarchy, &class_name, &descriptor, true, code);
        let mut flow = ControlFlow::new(code, &method.labels).unwrap();
        let mut frames = compute_frames(&method, &mut flow).unwrap();
        flow.process_try_catch_blocks(&code.instructions);
        flow.process_entry_points();
        Refiner::new(&method, &flow, &mut frames).refine().unwrap();
        frames
    }

    fn local(frames: &[Option<Frame>], idx: usize, var: u16) -> Option<InferredType> {
        frames[idx].as_ref().unwrap().local(var).cloned()
    }

    #[test]
    fn field_context() {
        let code = Code::new(
            1,
            2,
            vec![
                Instruction::IConst1,          // 0
                Instruction::IStore(1),        // 1
                Instruction::ILoad(1),         // 2
                Instruction::PutStatic(flag()), // 3
                Instruction::Return,           // 4
            ],
        );
        let frames = refine(&code, vec![]);
        assert_eq!(local(&frames, 2, 1), Some(InferredType::Boolean));
        assert_eq!(local(&frames, 4, 1), Some(InferredType::Boolean));
    }

    #[test]
    fn arithmetic_keeps_int() {
        let code = Code::new(
            2,
            3,
            vec![
                Instruction::IConst1,   // 0
                Instruction::IStore(1), // 1
                Instruction::ILoad(1),  // 2
                Instruction::IConst2,   // 3
                Instruction::IAdd,      // 4
                Instruction::IStore(2), // 5
                Instruction::Return,    // 6
            ],
        );
        let frames = refine(&code, vec![]);
        assert_eq!(local(&frames, 6, 1), Some(InferredType::Int));
        assert_eq!(local(&frames, 6, 2), Some(InferredType::Int));
    }

    #[test]
    fn materialized_condition() {
        let code = Code::new(
            1,
            2,
            vec![
                Instruction::ILoad(0),                        // 0
                Instruction::If(OrdComparison::LE, Label(0)), // 1
                Instruction::IConst1,                         // 2
                Instruction::Goto(Label(1)),                  // 3
                Instruction::Label(Label(0)),                 // 4
                Instruction::IConst0,                         // 5
                Instruction::Label(Label(1)),                 // 6
                Instruction::IStore(1),                       // 7
                Instruction::Return,                          // 8
            ],
        );
        let frames = refine(&code, vec![FieldType::int()]);
        assert_eq!(local(&frames, 8, 1), Some(InferredType::Boolean));
        assert_eq!(local(&frames, 8, 0), Some(InferredType::Int));
    }

    #[test]
    fn compared_operands_materialize() {
        let code = Code::new(
            2,
            3,
            vec![
                Instruction::ILoad(0),                           // 0
                Instruction::ILoad(1),                           // 1
                Instruction::IfICmp(OrdComparison::GE, Label(0)), // 2
                Instruction::IConst1,                            // 3
                Instruction::Goto(Label(1)),                     // 4
                Instruction::Label(Label(0)),                    // 5
                Instruction::IConst0,                            // 6
                Instruction::Label(Label(1)),                    // 7
                Instruction::IStore(2),                          // 8
                Instruction::Return,                             // 9
            ],
        );
        let frames = refine(&code, vec![FieldType::int(), FieldType::int()]);
        assert_eq!(local(&frames, 9, 2), Some(InferredType::Boolean));
        assert_eq!(local(&frames, 9, 0), Some(InferredType::Int));
        assert_eq!(local(&frames, 9, 1), Some(InferredType::Int));
    }

    #[test]
    fn shift_amounts_stay_int() {
        let code = Code::new(
            3,
            5,
            vec![
                Instruction::IConst1,                         // 0
                Instruction::IStore(0),                       // 1
                Instruction::IConst2,                         // 2
                Instruction::ILoad(0),                        // 3
                Instruction::ISh(ShiftType::Left),            // 4
                Instruction::IStore(1),                       // 5
                Instruction::LConst1,                         // 6
                Instruction::ILoad(0),                        // 7
                Instruction::LSh(ShiftType::ArithmeticRight), // 8
                Instruction::LStore(2),                       // 9
                Instruction::Return,                          // 10
            ],
        );
        let frames = refine(&code, vec![]);
        assert_eq!(local(&frames, 10, 0), Some(InferredType::Int));
        assert_eq!(local(&frames, 10, 1), Some(InferredType::Int));
        assert_eq!(local(&frames, 10, 2), Some(InferredType::Long));
    }

    #[test]
    fn mixed_logic_rolls_back() {
        let code = Code::new(
            2,
            3,
            vec![
                Instruction::GetStatic(flag()), // 0
                Instruction::IStore(0),         // 1
                Instruction::IConst5,           // 2
                Instruction::IStore(1),         // 3
                Instruction::ILoad(0),          // 4
                Instruction::ILoad(1),          // 5
                Instruction::IAnd,              // 6
                Instruction::IStore(2),         // 7
                Instruction::Return,            // 8
            ],
        );
        let frames = refine(&code, vec![]);
        assert_eq!(local(&frames, 8, 0), Some(InferredType::Boolean));
        assert_eq!(local(&frames, 8, 1), Some(InferredType::Int));
        assert_eq!(local(&frames, 8, 2), Some(InferredType::Int));
    }

    #[test]
    fn compatibility() {
        let hierarchy = ClassHierarchy::with_platform(Box::new(ClassMap::new("artifact")), vec![]);
        let descriptor = MethodDescriptor {
            parameters: vec![],
            return_type: None,
        };
        let code = Code::new(0, 0, vec![Instruction::Return]);
        let class_name = BinaryName::OBJECT;
        let method = MethodContext::new(&hierarchy, &class_name, &descriptor, true, &code);
        let flow = ControlFlow::new(&code, &method.labels).unwrap();
        let mut frames = vec![];
        let refiner = Refiner::new(&method, &flow, &mut frames);

        let string = InferredType::object(BinaryName::STRING);
        let compatible = |local: &InferredType, expected: &InferredType| {
            refiner.is_local_compatible(local, expected).unwrap()
        };
        assert!(compatible(&InferredType::Int, &InferredType::Boolean));
        assert!(!compatible(&InferredType::Short, &InferredType::Boolean));
        assert!(compatible(&InferredType::Char, &InferredType::Int));
        assert!(!compatible(&InferredType::Boolean, &InferredType::Int));
        assert!(!compatible(&InferredType::Int, &InferredType::Long));
        assert!(compatible(&InferredType::Null, &string));
        assert!(compatible(&string, &InferredType::OBJECT));
        assert!(!compatible(&InferredType::OBJECT, &string));

        assert!(should_tweak(&InferredType::Int, &InferredType::Char));
        assert!(should_tweak(&InferredType::Null, &string));
        assert!(!should_tweak(&InferredType::OBJECT, &string));
        assert!(!should_tweak(&InferredType::Short, &InferredType::Int));
    }
}
