//! Class hierarchy used to answer subtyping questions
//!
//! The analysis needs to know how classes relate to each other every time two types meet at a
//! control flow join (eg. a local that holds a `String` on one path and an `Integer` on another
//! needs to become a `Object`). Rather than requiring everything up front, classes are looked up
//! lazily in a list of [`ClassSource`] tiers, searched in order:
//!
//!   1. the artifact being analysed
//!   2. any libraries it was compiled against
//!   3. the platform runtime (see [`PlatformClasses`])
//!
//! Each successful lookup is cached in the [`ClassHierarchy`], so resolution is cheap after the
//! first query and every query can be made through a shared reference. A class that no tier knows
//! about is a hard error: there is no sensible way to join types through a gap in the hierarchy.

mod assignable;
mod java_classes;

pub use java_classes::*;

use crate::jvm::model::Class;
use crate::jvm::{BinaryName, Error};
use elsa::map::FrozenMap;
use std::collections::HashMap;

/// Hierarchy information about a class or interface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassData {
    pub name: BinaryName,

    /// Superclass (`None` only for `java/lang/Object`)
    ///
    /// Interfaces have `java/lang/Object` as their superclass.
    pub superclass: Option<BinaryName>,

    /// Directly implemented (or for interfaces, extended) interfaces
    pub interfaces: Vec<BinaryName>,

    pub is_interface: bool,
}

impl ClassData {
    /// Class extending `superclass` and implementing no interfaces
    pub fn new(name: BinaryName, superclass: BinaryName) -> ClassData {
        ClassData {
            name,
            superclass: Some(superclass),
            interfaces: vec![],
            is_interface: false,
        }
    }

    /// Interface extending the given interfaces
    pub fn interface(name: BinaryName, interfaces: Vec<BinaryName>) -> ClassData {
        ClassData {
            name,
            superclass: Some(BinaryName::OBJECT),
            interfaces,
            is_interface: true,
        }
    }
}

/// One tier of class definitions
pub trait ClassSource {
    /// Name of the tier (for diagnostics)
    fn name(&self) -> &str;

    /// Look up a class, returning `None` if this tier doesn't define it
    fn load(&self, name: &BinaryName) -> Option<ClassData>;
}

/// Tier of classes held in memory
pub struct ClassMap {
    name: String,
    classes: HashMap<BinaryName, ClassData>,
}

impl ClassMap {
    pub fn new(name: impl Into<String>) -> ClassMap {
        ClassMap {
            name: name.into(),
            classes: HashMap::new(),
        }
    }

    /// Tier containing all of the given classes
    pub fn from_classes<'a>(
        name: impl Into<String>,
        classes: impl IntoIterator<Item = &'a Class>,
    ) -> ClassMap {
        let mut class_map = ClassMap::new(name);
        for class in classes {
            class_map.add_class(class.class_data());
        }
        class_map
    }

    /// Add a class, replacing any previous definition with the same name
    pub fn add_class(&mut self, data: ClassData) {
        self.classes.insert(data.name.clone(), data);
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

impl ClassSource for ClassMap {
    fn name(&self) -> &str {
        &self.name
    }

    fn load(&self, name: &BinaryName) -> Option<ClassData> {
        self.classes.get(name).cloned()
    }
}

/// Lazily resolved, cached view over an ordered list of class tiers
pub struct ClassHierarchy {
    tiers: Vec<Box<dyn ClassSource>>,

    /// Classes resolved so far
    classes: FrozenMap<BinaryName, Box<ClassData>>,
}

impl ClassHierarchy {
    /// Hierarchy searching the tiers in the order given
    pub fn new(tiers: Vec<Box<dyn ClassSource>>) -> ClassHierarchy {
        ClassHierarchy {
            tiers,
            classes: FrozenMap::new(),
        }
    }

    /// Hierarchy made of the artifact, then the libraries, then the platform classes
    pub fn with_platform(
        artifact: Box<dyn ClassSource>,
        libraries: Vec<Box<dyn ClassSource>>,
    ) -> ClassHierarchy {
        let mut tiers = vec![artifact];
        tiers.extend(libraries);
        tiers.push(Box::new(PlatformClasses::new()));
        ClassHierarchy::new(tiers)
    }

    /// Find a class in the first tier which defines it
    pub fn resolve(&self, name: &BinaryName) -> Result<&ClassData, Error> {
        if let Some(class_data) = self.classes.get(name) {
            return Ok(class_data);
        }

        for tier in &self.tiers {
            if let Some(class_data) = tier.load(name) {
                log::trace!("Resolved {} from {}", name, tier.name());
                return Ok(self.classes.insert(name.clone(), Box::new(class_data)));
            }
        }

        Err(Error::UnresolvedClass(name.clone()))
    }

    /// Is the class an interface?
    pub fn is_interface(&self, name: &BinaryName) -> Result<bool, Error> {
        Ok(self.resolve(name)?.is_interface)
    }
}
