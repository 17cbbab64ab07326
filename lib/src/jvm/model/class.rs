use crate::jvm::class_graph::ClassData;
use crate::jvm::model::Method;
use crate::jvm::{BinaryName, ClassAccessFlags};

/// Semantic representation of a class
#[derive(Debug, Clone)]
pub struct Class {
    pub name: BinaryName,

    /// Superclass (only `java/lang/Object` has none)
    pub superclass: Option<BinaryName>,

    /// Directly implemented interfaces
    pub interfaces: Vec<BinaryName>,

    pub access_flags: ClassAccessFlags,

    pub methods: Vec<Method>,
}

impl Class {
    /// Create a new class
    pub fn new(
        name: BinaryName,
        superclass: Option<BinaryName>,
        access_flags: ClassAccessFlags,
    ) -> Class {
        Class {
            name,
            superclass,
            interfaces: vec![],
            access_flags,
            methods: vec![],
        }
    }

    pub fn is_interface(&self) -> bool {
        self.access_flags.contains(ClassAccessFlags::INTERFACE)
    }

    /// Hierarchy information about this class
    pub fn class_data(&self) -> ClassData {
        ClassData {
            name: self.name.clone(),
            superclass: self.superclass.clone(),
            interfaces: self.interfaces.clone(),
            is_interface: self.is_interface(),
        }
    }
}
