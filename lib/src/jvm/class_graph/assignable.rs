use super::ClassHierarchy;
use crate::jvm::{ArrayType, BinaryName, Error, RefType};
use std::cmp::Ordering;
use std::collections::HashSet;

impl ClassHierarchy {
    /// Is `super_type` the class itself, one of its superclasses, or one of its interfaces?
    ///
    /// This does a traversal of super types. Everything is a subclass of `java/lang/Object`, even
    /// interfaces.
    pub fn is_subclass(&self, sub_type: &BinaryName, super_type: &BinaryName) -> Result<bool, Error> {
        if super_type == &BinaryName::OBJECT || sub_type == super_type {
            return Ok(true);
        }

        let mut supertypes_to_visit: Vec<BinaryName> = vec![sub_type.clone()];
        let mut dont_revisit: HashSet<BinaryName> = HashSet::new();
        dont_revisit.insert(sub_type.clone());

        while let Some(class_name) = supertypes_to_visit.pop() {
            if &class_name == super_type {
                return Ok(true);
            }
            let class_data = self.resolve(&class_name)?;

            // Enqueue next types to visit
            if let Some(superclass) = &class_data.superclass {
                if dont_revisit.insert(superclass.clone()) {
                    supertypes_to_visit.push(superclass.clone());
                }
            }
            for interface in &class_data.interfaces {
                if dont_revisit.insert(interface.clone()) {
                    supertypes_to_visit.push(interface.clone());
                }
            }
        }

        Ok(false)
    }

    /// Most specific class which both classes extend
    ///
    /// Interfaces don't form a lattice, so whenever an interface is involved (and neither type is
    /// a subtype of the other) the answer is just `java/lang/Object`.
    pub fn common_superclass(
        &self,
        class1: &BinaryName,
        class2: &BinaryName,
    ) -> Result<BinaryName, Error> {
        if self.is_subclass(class1, class2)? {
            return Ok(class2.clone());
        }
        if self.is_subclass(class2, class1)? {
            return Ok(class1.clone());
        }
        if self.is_interface(class1)? || self.is_interface(class2)? {
            return Ok(BinaryName::OBJECT);
        }

        let mut current = class1.clone();
        loop {
            match self.resolve(&current)?.superclass.clone() {
                None => return Ok(BinaryName::OBJECT),
                Some(superclass) => {
                    if self.is_subclass(class2, &superclass)? {
                        return Ok(superclass);
                    }
                    current = superclass;
                }
            }
        }
    }

    /// Most specific reference type to which both types are assignable
    ///
    ///   - object types meet at their common superclass
    ///   - an array and an object type meet at `java/lang/Object`
    ///   - arrays of the same dimension with object elements meet element-wise
    ///   - other arrays collapse to `java/lang/Object` arrays one dimension shallower than the
    ///     dimensions they share
    pub fn common_ref_supertype(&self, type1: &RefType, type2: &RefType) -> Result<RefType, Error> {
        if type1 == type2 {
            return Ok(type1.clone());
        }

        match (type1, type2) {
            (RefType::Object(cls1), RefType::Object(cls2)) => {
                Ok(RefType::Object(self.common_superclass(cls1, cls2)?))
            }
            (RefType::Object(_), _) | (_, RefType::Object(_)) => Ok(RefType::OBJECT),
            (RefType::ObjectArray(arr1), RefType::ObjectArray(arr2))
                if arr1.additional_dimensions == arr2.additional_dimensions =>
            {
                let element_type = self.common_superclass(&arr1.element_type, &arr2.element_type)?;
                Ok(RefType::ObjectArray(ArrayType {
                    additional_dimensions: arr1.additional_dimensions,
                    element_type,
                }))
            }
            _ => {
                let dims1 = type1.dimensions();
                let dims2 = type2.dimensions();
                let shared_dimensions = match dims1.cmp(&dims2) {
                    Ordering::Equal => dims1 - 1,
                    Ordering::Less => shallow_shared_dimensions(type1),
                    Ordering::Greater => shallow_shared_dimensions(type2),
                };
                Ok(RefType::object_array(BinaryName::OBJECT, shared_dimensions))
            }
        }
    }
}

/// Dimensions the shallower array can share with a deeper one while staying an `Object` array
fn shallow_shared_dimensions(shallower: &RefType) -> usize {
    match shallower {
        RefType::ObjectArray(arr) => arr.dimensions(),
        _ => shallower.dimensions() - 1,
    }
}
