use crate::jvm::code::Code;
use crate::jvm::{MethodAccessFlags, MethodDescriptor, UnqualifiedName};

/// Semantic representation of a method
#[derive(Debug, Clone)]
pub struct Method {
    pub name: UnqualifiedName,

    pub descriptor: MethodDescriptor,

    pub access_flags: MethodAccessFlags,

    /// Method code implementation (absent for `abstract` and `native` methods)
    pub code: Option<Code>,

    /// Names from the `MethodParameters` attribute, one per declared parameter
    ///
    /// Individual names are optional since the attribute allows unnamed parameters.
    pub parameter_names: Option<Vec<Option<UnqualifiedName>>>,
}

impl Method {
    /// Create a new method
    pub fn new(
        name: UnqualifiedName,
        descriptor: MethodDescriptor,
        access_flags: MethodAccessFlags,
        code: Option<Code>,
    ) -> Method {
        Method {
            name,
            descriptor,
            access_flags,
            code,
            parameter_names: None,
        }
    }

    pub fn is_static(&self) -> bool {
        self.access_flags.contains(MethodAccessFlags::STATIC)
    }

    pub fn is_abstract(&self) -> bool {
        self.access_flags.contains(MethodAccessFlags::ABSTRACT)
    }
}
