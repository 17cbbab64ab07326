use super::{ClassData, ClassSource};
use crate::jvm::BinaryName;
use std::collections::HashMap;

/// Built-in tier describing the core classes of the Java platform
///
/// This covers the parts of `java.lang`, `java.io`, and `java.util` that commonly show up at
/// control flow joins (boxed primitives, strings, the common exception hierarchy, collections).
/// Anything else from the platform needs to be supplied through another tier.
pub struct PlatformClasses(HashMap<BinaryName, ClassData>);

impl PlatformClasses {
    pub fn new() -> PlatformClasses {
        let mut classes = HashMap::new();
        let mut add = |data: ClassData| {
            classes.insert(data.name.clone(), data);
        };

        add(ClassData {
            name: BinaryName::OBJECT,
            superclass: None,
            interfaces: vec![],
            is_interface: false,
        });

        // Interfaces
        add(ClassData::interface(BinaryName::SERIALIZABLE, vec![]));
        add(ClassData::interface(BinaryName::CLONEABLE, vec![]));
        add(ClassData::interface(BinaryName::COMPARABLE, vec![]));
        add(ClassData::interface(BinaryName::CHARSEQUENCE, vec![]));
        add(ClassData::interface(BinaryName::APPENDABLE, vec![]));
        add(ClassData::interface(BinaryName::RUNNABLE, vec![]));
        add(ClassData::interface(BinaryName::AUTOCLOSEABLE, vec![]));
        add(ClassData::interface(
            BinaryName::CLOSEABLE,
            vec![BinaryName::AUTOCLOSEABLE],
        ));
        add(ClassData::interface(BinaryName::ITERABLE, vec![]));
        add(ClassData::interface(BinaryName::ITERATOR, vec![]));
        add(ClassData::interface(
            BinaryName::COLLECTION,
            vec![BinaryName::ITERABLE],
        ));
        add(ClassData::interface(
            BinaryName::LIST,
            vec![BinaryName::COLLECTION],
        ));
        add(ClassData::interface(BinaryName::MAP, vec![]));

        // `java.lang`
        add(class_implementing(
            BinaryName::STRING,
            BinaryName::OBJECT,
            vec![
                BinaryName::SERIALIZABLE,
                BinaryName::COMPARABLE,
                BinaryName::CHARSEQUENCE,
            ],
        ));
        add(class_implementing(
            BinaryName::ABSTRACTSTRINGBUILDER,
            BinaryName::OBJECT,
            vec![BinaryName::APPENDABLE, BinaryName::CHARSEQUENCE],
        ));
        add(class_implementing(
            BinaryName::STRINGBUILDER,
            BinaryName::ABSTRACTSTRINGBUILDER,
            vec![BinaryName::SERIALIZABLE, BinaryName::CHARSEQUENCE],
        ));
        add(class_implementing(
            BinaryName::CLASS,
            BinaryName::OBJECT,
            vec![BinaryName::SERIALIZABLE],
        ));
        add(ClassData::new(BinaryName::SYSTEM, BinaryName::OBJECT));
        add(class_implementing(
            BinaryName::THREAD,
            BinaryName::OBJECT,
            vec![BinaryName::RUNNABLE],
        ));
        add(class_implementing(
            BinaryName::ENUM,
            BinaryName::OBJECT,
            vec![BinaryName::COMPARABLE, BinaryName::SERIALIZABLE],
        ));
        add(ClassData::new(BinaryName::METHODHANDLE, BinaryName::OBJECT));
        add(class_implementing(
            BinaryName::METHODTYPE,
            BinaryName::OBJECT,
            vec![BinaryName::SERIALIZABLE],
        ));

        // Boxed primitives
        add(class_implementing(
            BinaryName::NUMBER,
            BinaryName::OBJECT,
            vec![BinaryName::SERIALIZABLE],
        ));
        for boxed in [
            BinaryName::BYTE,
            BinaryName::SHORT,
            BinaryName::INTEGER,
            BinaryName::LONG,
            BinaryName::FLOAT,
            BinaryName::DOUBLE,
        ] {
            add(class_implementing(
                boxed,
                BinaryName::NUMBER,
                vec![BinaryName::COMPARABLE],
            ));
        }
        for boxed in [BinaryName::BOOLEAN, BinaryName::CHARACTER] {
            add(class_implementing(
                boxed,
                BinaryName::OBJECT,
                vec![BinaryName::SERIALIZABLE, BinaryName::COMPARABLE],
            ));
        }

        // Exceptions
        add(class_implementing(
            BinaryName::THROWABLE,
            BinaryName::OBJECT,
            vec![BinaryName::SERIALIZABLE],
        ));
        add(ClassData::new(BinaryName::ERROR, BinaryName::THROWABLE));
        add(ClassData::new(BinaryName::ASSERTIONERROR, BinaryName::ERROR));
        add(ClassData::new(BinaryName::EXCEPTION, BinaryName::THROWABLE));
        add(ClassData::new(BinaryName::IOEXCEPTION, BinaryName::EXCEPTION));
        add(ClassData::new(
            BinaryName::RUNTIMEEXCEPTION,
            BinaryName::EXCEPTION,
        ));
        for runtime_exception in [
            BinaryName::ARITHMETICEXCEPTION,
            BinaryName::CLASSCASTEXCEPTION,
            BinaryName::ILLEGALARGUMENTEXCEPTION,
            BinaryName::ILLEGALSTATEEXCEPTION,
            BinaryName::INDEXOUTOFBOUNDSEXCEPTION,
            BinaryName::NULLPOINTEREXCEPTION,
            BinaryName::UNSUPPORTEDOPERATIONEXCEPTION,
        ] {
            add(ClassData::new(
                runtime_exception,
                BinaryName::RUNTIMEEXCEPTION,
            ));
        }
        add(ClassData::new(
            BinaryName::ARRAYINDEXOUTOFBOUNDSEXCEPTION,
            BinaryName::INDEXOUTOFBOUNDSEXCEPTION,
        ));

        // `java.util`
        add(class_implementing(
            BinaryName::ABSTRACTCOLLECTION,
            BinaryName::OBJECT,
            vec![BinaryName::COLLECTION],
        ));
        add(class_implementing(
            BinaryName::ABSTRACTLIST,
            BinaryName::ABSTRACTCOLLECTION,
            vec![BinaryName::LIST],
        ));
        add(class_implementing(
            BinaryName::ARRAYLIST,
            BinaryName::ABSTRACTLIST,
            vec![
                BinaryName::LIST,
                BinaryName::CLONEABLE,
                BinaryName::SERIALIZABLE,
            ],
        ));
        add(class_implementing(
            BinaryName::ABSTRACTMAP,
            BinaryName::OBJECT,
            vec![BinaryName::MAP],
        ));
        add(class_implementing(
            BinaryName::HASHMAP,
            BinaryName::ABSTRACTMAP,
            vec![
                BinaryName::MAP,
                BinaryName::CLONEABLE,
                BinaryName::SERIALIZABLE,
            ],
        ));

        PlatformClasses(classes)
    }
}

impl Default for PlatformClasses {
    fn default() -> Self {
        PlatformClasses::new()
    }
}

fn class_implementing(
    name: BinaryName,
    superclass: BinaryName,
    interfaces: Vec<BinaryName>,
) -> ClassData {
    ClassData {
        name,
        superclass: Some(superclass),
        interfaces,
        is_interface: false,
    }
}

impl ClassSource for PlatformClasses {
    fn name(&self) -> &str {
        "platform"
    }

    fn load(&self, name: &BinaryName) -> Option<ClassData> {
        self.0.get(name).cloned()
    }
}
