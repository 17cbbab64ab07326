use super::{BinaryName, Error, Name};
use crate::util::Width;

/// Types which have a textual descriptor form (as found in class files)
pub trait RenderDescriptor {
    fn render(&self) -> String {
        let mut out = String::new();
        self.render_to(&mut out);
        out
    }

    fn render_to(&self, out: &mut String);
}

/// Types which can be read back out of their descriptor form
pub trait ParseDescriptor: Sized {
    /// Parse a descriptor, requiring that the whole input be consumed
    fn parse(source: &str) -> Result<Self, Error> {
        let mut reader = DescriptorReader::new(source);
        let parsed = Self::read(&mut reader)?;
        if reader.remaining().is_empty() {
            Ok(parsed)
        } else {
            Err(reader.error("trailing input"))
        }
    }

    fn read(reader: &mut DescriptorReader<'_>) -> Result<Self, Error>;
}

/// Cursor over a descriptor string
pub struct DescriptorReader<'a> {
    source: &'a str,
    offset: usize,
}

impl<'a> DescriptorReader<'a> {
    pub fn new(source: &'a str) -> DescriptorReader<'a> {
        DescriptorReader { source, offset: 0 }
    }

    fn remaining(&self) -> &'a str {
        &self.source[self.offset..]
    }

    fn peek(&self) -> Option<char> {
        self.remaining().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.offset += c.len_utf8();
        Some(c)
    }

    fn expect(&mut self, expected: char) -> Result<(), Error> {
        match self.bump() {
            Some(c) if c == expected => Ok(()),
            _ => Err(self.error(&format!("expected '{}'", expected))),
        }
    }

    /// Consume everything up to (and including) `terminator`, returning what came before it
    fn take_until(&mut self, terminator: char) -> Result<&'a str, Error> {
        let rest = self.remaining();
        match rest.find(terminator) {
            Some(len) => {
                self.offset += len + terminator.len_utf8();
                Ok(&rest[..len])
            }
            None => Err(self.error(&format!("missing '{}'", terminator))),
        }
    }

    fn error(&self, reason: &str) -> Error {
        Error::MalformedDescriptor(format!(
            "{} at offset {} of {:?}",
            reason, self.offset, self.source
        ))
    }
}

/// Primitive value types
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum BaseType {
    Byte,
    Char,
    Double,
    Float,
    Int,
    Long,
    Short,
    Boolean,
}

impl BaseType {
    pub const fn code(self) -> char {
        match self {
            BaseType::Byte => 'B',
            BaseType::Char => 'C',
            BaseType::Double => 'D',
            BaseType::Float => 'F',
            BaseType::Int => 'I',
            BaseType::Long => 'J',
            BaseType::Short => 'S',
            BaseType::Boolean => 'Z',
        }
    }

    pub const fn from_code(code: char) -> Option<BaseType> {
        Some(match code {
            'B' => BaseType::Byte,
            'C' => BaseType::Char,
            'D' => BaseType::Double,
            'F' => BaseType::Float,
            'I' => BaseType::Int,
            'J' => BaseType::Long,
            'S' => BaseType::Short,
            'Z' => BaseType::Boolean,
            _ => return None,
        })
    }
}

impl Width for BaseType {
    fn width(&self) -> usize {
        match self {
            BaseType::Double | BaseType::Long => 2,
            _ => 1,
        }
    }
}

impl RenderDescriptor for BaseType {
    fn render_to(&self, out: &mut String) {
        out.push(self.code());
    }
}

impl ParseDescriptor for BaseType {
    fn read(reader: &mut DescriptorReader<'_>) -> Result<Self, Error> {
        match reader.peek().and_then(BaseType::from_code) {
            Some(base_type) => {
                reader.bump();
                Ok(base_type)
            }
            None => Err(reader.error("expected a primitive type")),
        }
    }
}

impl RenderDescriptor for BinaryName {
    fn render_to(&self, out: &mut String) {
        out.push('L');
        out.push_str(self.as_str());
        out.push(';');
    }
}

impl ParseDescriptor for BinaryName {
    fn read(reader: &mut DescriptorReader<'_>) -> Result<Self, Error> {
        reader.expect('L')?;
        let name = reader.take_until(';')?;
        BinaryName::from_string(name.to_owned()).map_err(Error::MalformedDescriptor)
    }
}

/// Reference type
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum RefType {
    Object(BinaryName),
    ObjectArray(ArrayType<BinaryName>),
    PrimitiveArray(ArrayType<BaseType>),
}

/// Array whose innermost elements are `T`
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct ArrayType<T> {
    /// Dimensions beyond the first (`T[]` has none, `T[][][]` has 2)
    pub additional_dimensions: usize,

    pub element_type: T,
}

impl<T> ArrayType<T> {
    pub const fn dimensions(&self) -> usize {
        self.additional_dimensions + 1
    }

    /// Same element type with the given number of dimensions (`None` for zero)
    fn with_dimensions(&self, dimensions: usize) -> Option<ArrayType<T>>
    where
        T: Clone,
    {
        let additional_dimensions = dimensions.checked_sub(1)?;
        Some(ArrayType {
            additional_dimensions,
            element_type: self.element_type.clone(),
        })
    }
}

impl<T: RenderDescriptor> RenderDescriptor for ArrayType<T> {
    fn render_to(&self, out: &mut String) {
        out.extend(std::iter::repeat('[').take(self.dimensions()));
        self.element_type.render_to(out);
    }
}

impl RenderDescriptor for RefType {
    fn render_to(&self, out: &mut String) {
        match self {
            RefType::Object(name) => name.render_to(out),
            RefType::ObjectArray(array) => array.render_to(out),
            RefType::PrimitiveArray(array) => array.render_to(out),
        }
    }
}

impl ParseDescriptor for RefType {
    fn read(reader: &mut DescriptorReader<'_>) -> Result<Self, Error> {
        let mut dimensions = 0;
        while reader.peek() == Some('[') {
            reader.bump();
            dimensions += 1;
        }

        if reader.peek() == Some('L') {
            return Ok(RefType::object_array(BinaryName::read(reader)?, dimensions));
        }
        match dimensions.checked_sub(1) {
            Some(additional_dimensions) => Ok(RefType::PrimitiveArray(ArrayType {
                additional_dimensions,
                element_type: BaseType::read(reader)?,
            })),
            None => Err(reader.error("expected a reference type")),
        }
    }
}

impl RefType {
    pub const OBJECT: RefType = RefType::Object(BinaryName::OBJECT);
    pub const STRING: RefType = RefType::Object(BinaryName::STRING);
    pub const CLASS: RefType = RefType::Object(BinaryName::CLASS);
    pub const THROWABLE: RefType = RefType::Object(BinaryName::THROWABLE);

    /// Array with elements of the given type
    pub fn array(component: FieldType) -> RefType {
        match component {
            FieldType::Base(element_type) => RefType::PrimitiveArray(ArrayType {
                additional_dimensions: 0,
                element_type,
            }),
            FieldType::Ref(RefType::Object(element_type)) => RefType::object_array(element_type, 1),
            FieldType::Ref(RefType::ObjectArray(array)) => {
                let dimensions = array.dimensions() + 1;
                RefType::object_array(array.element_type, dimensions)
            }
            FieldType::Ref(RefType::PrimitiveArray(array)) => RefType::PrimitiveArray(ArrayType {
                additional_dimensions: array.dimensions(),
                element_type: array.element_type,
            }),
        }
    }

    /// Array of objects of the given class with the given number of dimensions
    ///
    /// Zero dimensions is just the object type itself.
    pub fn object_array(element_type: BinaryName, dimensions: usize) -> RefType {
        match dimensions.checked_sub(1) {
            None => RefType::Object(element_type),
            Some(additional_dimensions) => RefType::ObjectArray(ArrayType {
                additional_dimensions,
                element_type,
            }),
        }
    }

    /// Number of array dimensions (`0` for object types)
    pub fn dimensions(&self) -> usize {
        match self {
            RefType::Object(_) => 0,
            RefType::ObjectArray(array) => array.dimensions(),
            RefType::PrimitiveArray(array) => array.dimensions(),
        }
    }

    /// Type of elements one level into the array (`None` for object types)
    pub fn component_type(&self) -> Option<FieldType> {
        match self {
            RefType::Object(_) => None,
            RefType::ObjectArray(array) => Some(FieldType::Ref(RefType::object_array(
                array.element_type.clone(),
                array.additional_dimensions,
            ))),
            RefType::PrimitiveArray(array) => Some(
                match array.with_dimensions(array.additional_dimensions) {
                    Some(inner) => FieldType::Ref(RefType::PrimitiveArray(inner)),
                    None => FieldType::Base(array.element_type),
                },
            ),
        }
    }
}

/// Type of a field, parameter, or local variable
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum FieldType {
    Base(BaseType),
    Ref(RefType),
}

impl Width for FieldType {
    fn width(&self) -> usize {
        match self {
            FieldType::Base(base_type) => base_type.width(),
            FieldType::Ref(_) => 1,
        }
    }
}

impl FieldType {
    pub fn array(component: FieldType) -> FieldType {
        FieldType::Ref(RefType::array(component))
    }

    pub const fn object(class_name: BinaryName) -> FieldType {
        FieldType::Ref(RefType::Object(class_name))
    }

    pub const fn int() -> FieldType {
        FieldType::Base(BaseType::Int)
    }

    pub const fn long() -> FieldType {
        FieldType::Base(BaseType::Long)
    }

    pub const fn float() -> FieldType {
        FieldType::Base(BaseType::Float)
    }

    pub const fn double() -> FieldType {
        FieldType::Base(BaseType::Double)
    }

    pub const fn char() -> FieldType {
        FieldType::Base(BaseType::Char)
    }

    pub const fn short() -> FieldType {
        FieldType::Base(BaseType::Short)
    }

    pub const fn byte() -> FieldType {
        FieldType::Base(BaseType::Byte)
    }

    pub const fn boolean() -> FieldType {
        FieldType::Base(BaseType::Boolean)
    }
}

impl RenderDescriptor for FieldType {
    fn render_to(&self, out: &mut String) {
        match self {
            FieldType::Base(base_type) => base_type.render_to(out),
            FieldType::Ref(ref_type) => ref_type.render_to(out),
        }
    }
}

impl ParseDescriptor for FieldType {
    fn read(reader: &mut DescriptorReader<'_>) -> Result<Self, Error> {
        match reader.peek() {
            Some('L' | '[') => RefType::read(reader).map(FieldType::Ref),
            _ => BaseType::read(reader).map(FieldType::Base),
        }
    }
}

/// Signature of a method
#[derive(PartialEq, Eq, Hash, Debug, Clone)]
pub struct MethodDescriptor {
    pub parameters: Vec<FieldType>,

    /// `None` for `void` methods
    pub return_type: Option<FieldType>,
}

impl MethodDescriptor {
    /// Local slots taken up by the parameters (plus one for the receiver, if there is one)
    pub fn parameter_length(&self, has_this_param: bool) -> usize {
        let receiver = usize::from(has_this_param);
        receiver + self.parameters.iter().map(Width::width).sum::<usize>()
    }
}

impl RenderDescriptor for MethodDescriptor {
    fn render_to(&self, out: &mut String) {
        out.push('(');
        for parameter in &self.parameters {
            parameter.render_to(out);
        }
        out.push(')');
        match &self.return_type {
            Some(return_type) => return_type.render_to(out),
            None => out.push('V'),
        }
    }
}

impl ParseDescriptor for MethodDescriptor {
    fn read(reader: &mut DescriptorReader<'_>) -> Result<Self, Error> {
        reader.expect('(')?;
        let mut parameters = vec![];
        loop {
            match reader.peek() {
                Some(')') => break,
                Some(_) => parameters.push(FieldType::read(reader)?),
                None => return Err(reader.error("unterminated parameter list")),
            }
        }
        reader.expect(')')?;

        let return_type = if reader.peek() == Some('V') {
            reader.bump();
            None
        } else {
            Some(FieldType::read(reader)?)
        };

        Ok(MethodDescriptor {
            parameters,
            return_type,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn method_descriptors() {
        let desc = MethodDescriptor::parse("(IJ[Ljava/lang/String;[[Z)V").unwrap();
        assert_eq!(desc.parameters.len(), 4);
        assert_eq!(desc.return_type, None);
        assert_eq!(desc.parameter_length(false), 5);
        assert_eq!(desc.parameter_length(true), 6);
        assert_eq!(desc.render(), "(IJ[Ljava/lang/String;[[Z)V");

        assert!(MethodDescriptor::parse("(I").is_err());
        assert!(MethodDescriptor::parse("(Q)V").is_err());
        assert!(MethodDescriptor::parse("()VV").is_err());
        assert!(matches!(
            FieldType::parse("Ljava/lang/String"),
            Err(Error::MalformedDescriptor(_))
        ));
    }

    #[test]
    fn component_types() {
        let strings = RefType::parse("[[Ljava/lang/String;").unwrap();
        assert_eq!(strings.dimensions(), 2);
        let inner = strings.component_type().unwrap();
        assert_eq!(inner.render(), "[Ljava/lang/String;");
        match inner {
            FieldType::Ref(inner) => assert_eq!(
                inner.component_type(),
                Some(FieldType::object(BinaryName::STRING))
            ),
            FieldType::Base(_) => panic!("Expected a reference type"),
        }

        let ints = RefType::parse("[[I").unwrap();
        assert_eq!(ints.component_type(), Some(FieldType::array(FieldType::int())));
        assert_eq!(
            RefType::parse("[I").unwrap().component_type(),
            Some(FieldType::int())
        );
        assert_eq!(RefType::STRING.component_type(), None);
        assert_eq!(RefType::object_array(BinaryName::OBJECT, 0), RefType::OBJECT);
        assert_eq!(
            RefType::array(FieldType::array(FieldType::object(BinaryName::STRING))),
            strings
        );
        assert!(RefType::parse("I").is_err());
    }
}
