use crate::jvm::class_graph::ClassHierarchy;
use crate::jvm::{BaseType, BinaryName, Error, FieldType, RefType};
use crate::util::Width;

/// Type of a value in a local variable or on the operand stack, as inferred by the analysis
///
/// Unlike verification types, this keeps the narrow integer types apart. That information is
/// mostly what makes a reconstructed local variable table useful (a `boolean` reads very
/// differently from an `int`).
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum InferredType {
    Boolean,
    Byte,
    Char,
    Short,
    Int,
    Float,
    Long,
    Double,

    /// Type of the `null` literal, assignable to every reference type
    Null,

    Reference(RefType),

    /// Second slot of a `long` or `double`
    Top,
}

impl Width for InferredType {
    fn width(&self) -> usize {
        match self {
            InferredType::Long | InferredType::Double => 2,
            _ => 1,
        }
    }
}

impl From<BaseType> for InferredType {
    fn from(base_type: BaseType) -> InferredType {
        match base_type {
            BaseType::Boolean => InferredType::Boolean,
            BaseType::Byte => InferredType::Byte,
            BaseType::Char => InferredType::Char,
            BaseType::Short => InferredType::Short,
            BaseType::Int => InferredType::Int,
            BaseType::Float => InferredType::Float,
            BaseType::Long => InferredType::Long,
            BaseType::Double => InferredType::Double,
        }
    }
}

impl From<FieldType> for InferredType {
    fn from(field_type: FieldType) -> InferredType {
        match field_type {
            FieldType::Base(base_type) => InferredType::from(base_type),
            FieldType::Ref(ref_type) => InferredType::Reference(ref_type),
        }
    }
}

impl From<RefType> for InferredType {
    fn from(ref_type: RefType) -> InferredType {
        InferredType::Reference(ref_type)
    }
}

impl InferredType {
    pub const OBJECT: InferredType = InferredType::Reference(RefType::OBJECT);

    pub fn object(class_name: BinaryName) -> InferredType {
        InferredType::Reference(RefType::Object(class_name))
    }

    /// Types which the JVM represents as `int` (booleans, bytes, chars, shorts, ints)
    pub fn is_int_like(&self) -> bool {
        matches!(
            self,
            InferredType::Boolean
                | InferredType::Byte
                | InferredType::Char
                | InferredType::Short
                | InferredType::Int
        )
    }

    /// Types which the JVM represents as `int`, except for `int` itself
    pub fn is_narrower_than_int(&self) -> bool {
        self.is_int_like() && self != &InferredType::Int
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, InferredType::Null | InferredType::Reference(_))
    }

    /// Reference type, if this is one
    pub fn ref_type(&self) -> Option<&RefType> {
        match self {
            InferredType::Reference(ref_type) => Some(ref_type),
            _ => None,
        }
    }

    /// Type of values stored in an array of this type
    pub fn component_type(&self) -> Option<InferredType> {
        self.ref_type()
            .and_then(RefType::component_type)
            .map(InferredType::from)
    }

    /// Result type of an `int` operation on two operands
    ///
    /// Booleans defer to the other operand since `b & x` is as wide as `x`. Any other mix of
    /// integer types is an `int`.
    pub fn int_join(type1: &InferredType, type2: &InferredType) -> InferredType {
        if type1 == type2 {
            type1.clone()
        } else if type1 == &InferredType::Boolean {
            type2.clone()
        } else if type2 == &InferredType::Boolean {
            type1.clone()
        } else {
            InferredType::Int
        }
    }

    /// Most specific type to which both types are assignable (`None` if the types can't meet)
    pub fn join(
        type1: &InferredType,
        type2: &InferredType,
        hierarchy: &ClassHierarchy,
    ) -> Result<Option<InferredType>, Error> {
        if type1 == type2 {
            return Ok(Some(type1.clone()));
        }
        match (type1, type2) {
            (InferredType::Null, InferredType::Reference(_)) => Ok(Some(type2.clone())),
            (InferredType::Reference(_), InferredType::Null) => Ok(Some(type1.clone())),
            (InferredType::Reference(ref1), InferredType::Reference(ref2)) => {
                let joined = hierarchy.common_ref_supertype(ref1, ref2)?;
                Ok(Some(InferredType::Reference(joined)))
            }
            _ if type1.is_int_like() && type2.is_int_like() => {
                Ok(Some(InferredType::int_join(type1, type2)))
            }
            _ => Ok(None),
        }
    }

    /// Type to write into the local variable table
    ///
    /// Unresolved `null` types become `java/lang/Object`. The second slot of a wide value has no
    /// type of its own.
    pub fn field_type(&self) -> Option<FieldType> {
        Some(match self {
            InferredType::Boolean => FieldType::boolean(),
            InferredType::Byte => FieldType::byte(),
            InferredType::Char => FieldType::char(),
            InferredType::Short => FieldType::short(),
            InferredType::Int => FieldType::int(),
            InferredType::Float => FieldType::float(),
            InferredType::Long => FieldType::long(),
            InferredType::Double => FieldType::double(),
            InferredType::Null => FieldType::Ref(RefType::OBJECT),
            InferredType::Reference(ref_type) => FieldType::Ref(ref_type.clone()),
            InferredType::Top => return None,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::class_graph::ClassMap;
    use crate::jvm::ParseDescriptor;

    fn hierarchy() -> ClassHierarchy {
        ClassHierarchy::with_platform(Box::new(ClassMap::new("artifact")), vec![])
    }

    #[test]
    fn int_family() {
        let hierarchy = hierarchy();
        let join = |t1: InferredType, t2: InferredType| {
            InferredType::join(&t1, &t2, &hierarchy).unwrap()
        };

        assert_eq!(
            join(InferredType::Boolean, InferredType::Byte),
            Some(InferredType::Byte)
        );
        assert_eq!(
            join(InferredType::Char, InferredType::Short),
            Some(InferredType::Int)
        );
        assert_eq!(
            join(InferredType::Boolean, InferredType::Boolean),
            Some(InferredType::Boolean)
        );
        assert_eq!(join(InferredType::Int, InferredType::Float), None);
        assert_eq!(join(InferredType::Long, InferredType::Double), None);
        assert_eq!(join(InferredType::Null, InferredType::Int), None);
    }

    #[test]
    fn references() {
        let hierarchy = hierarchy();
        let join = |t1: InferredType, t2: InferredType| {
            InferredType::join(&t1, &t2, &hierarchy).unwrap()
        };
        let string = InferredType::object(BinaryName::STRING);
        let integer = InferredType::object(BinaryName::INTEGER);
        let long = InferredType::object(BinaryName::LONG);

        assert_eq!(join(InferredType::Null, string.clone()), Some(string.clone()));
        assert_eq!(join(string.clone(), InferredType::Null), Some(string.clone()));
        assert_eq!(
            join(integer, long),
            Some(InferredType::object(BinaryName::NUMBER))
        );
        assert_eq!(
            join(string, InferredType::Reference(RefType::parse("[I").unwrap())),
            Some(InferredType::OBJECT)
        );
    }

    #[test]
    fn field_types() {
        assert_eq!(
            InferredType::Null.field_type(),
            Some(FieldType::object(BinaryName::OBJECT))
        );
        assert_eq!(InferredType::Top.field_type(), None);
        assert_eq!(InferredType::Long.width(), 2);
        let strings = InferredType::Reference(RefType::parse("[Ljava/lang/String;").unwrap());
        assert_eq!(
            strings.component_type(),
            Some(InferredType::object(BinaryName::STRING))
        );
    }
}
