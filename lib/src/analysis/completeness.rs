use crate::jvm::model::Method;
use crate::util::Width;

/// Does the method already have a usable local variable table?
///
/// The table must cover every slot up to `max_locals`, and instance methods must have `this`.
pub fn is_complete(method: &Method) -> bool {
    let code = match &method.code {
        Some(code) if !method.is_abstract() => code,
        _ => return true,
    };
    if code.max_locals == 0 {
        return true;
    }

    let entries = match &code.local_variables {
        Some(entries) if !entries.is_empty() => entries,
        _ => return false,
    };
    if !method.is_static() && !entries.iter().any(|entry| entry.index == 0) {
        return false;
    }

    let covered = entries
        .iter()
        .map(|entry| entry.index as usize + entry.width())
        .max()
        .unwrap_or(0);
    covered == code.max_locals as usize
}

/// Drop entries which can't describe a parameter
///
/// Only the first entry landing on each parameter slot (including `this`) is kept, and entries
/// pointing into the second slot of a `long` or `double` parameter are removed. Returns the
/// number of entries removed.
pub fn remove_invalid_entries(method: &mut Method) -> usize {
    let is_static = method.is_static();
    let parameters = &method.descriptor.parameters;
    let entries = match method
        .code
        .as_mut()
        .and_then(|code| code.local_variables.as_mut())
    {
        Some(entries) => entries,
        None => return 0,
    };

    // Index 0 is `this`, then one flag per parameter
    let mut found = vec![false; parameters.len() + 1];
    let before = entries.len();

    entries.retain(|entry| {
        if !is_static && entry.index == 0 {
            return !std::mem::replace(&mut found[0], true);
        }

        let mut remaining = entry.index as isize - if is_static { 0 } else { 1 };
        for (idx, parameter) in parameters.iter().enumerate() {
            if remaining == 0 {
                return !std::mem::replace(&mut found[idx + 1], true);
            }
            remaining -= parameter.width() as isize;
            if remaining < 0 {
                return false;
            }
        }
        true
    });

    let removed = before - entries.len();
    if removed > 0 {
        log::debug!("Removed {} invalid entries from {}", removed, method.name);
    }
    removed
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::code::{Code, Instruction, Label, LocalVariable};
    use crate::jvm::{
        BinaryName, FieldType, MethodAccessFlags, MethodDescriptor, Name, UnqualifiedName,
    };

    fn entry(name: &str, index: u16, descriptor: FieldType) -> LocalVariable {
        LocalVariable {
            name: UnqualifiedName::from_string(String::from(name)).unwrap(),
            descriptor,
            start: Label(0),
            end: Label(1),
            index,
        }
    }

    fn method(
        access_flags: MethodAccessFlags,
        parameters: Vec<FieldType>,
        max_locals: u16,
        entries: Option<Vec<LocalVariable>>,
    ) -> Method {
        let mut code = Code::new(0, max_locals, vec![Instruction::Return]);
        code.local_variables = entries;
        Method::new(
            UnqualifiedName::from_string(String::from("run")).unwrap(),
            MethodDescriptor {
                parameters,
                return_type: None,
            },
            access_flags,
            Some(code),
        )
    }

    #[test]
    fn completeness() {
        let this = || entry("this", 0, FieldType::object(BinaryName::OBJECT));
        let public = MethodAccessFlags::PUBLIC;
        let static_ = MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC;

        assert!(is_complete(&method(public, vec![], 0, None)));
        assert!(!is_complete(&method(public, vec![], 1, None)));
        assert!(!is_complete(&method(public, vec![], 1, Some(vec![]))));
        assert!(is_complete(&method(public, vec![], 1, Some(vec![this()]))));
        assert!(!is_complete(&method(
            public,
            vec![],
            2,
            Some(vec![entry("x", 1, FieldType::int())])
        )));
        assert!(!is_complete(&method(public, vec![], 4, Some(vec![this()]))));
        assert!(is_complete(&method(
            static_,
            vec![FieldType::long()],
            2,
            Some(vec![entry("l", 0, FieldType::long())])
        )));

        let mut abstract_method = method(public | MethodAccessFlags::ABSTRACT, vec![], 1, None);
        abstract_method.code = None;
        assert!(is_complete(&abstract_method));
    }

    #[test]
    fn invalid_entries() {
        let mut method = method(
            MethodAccessFlags::PUBLIC,
            vec![FieldType::long(), FieldType::int()],
            6,
            Some(vec![
                entry("this", 0, FieldType::object(BinaryName::OBJECT)),
                entry("other", 0, FieldType::object(BinaryName::STRING)),
                entry("l", 1, FieldType::long()),
                entry("half", 2, FieldType::int()),
                entry("i", 3, FieldType::int()),
                entry("again", 3, FieldType::int()),
                entry("local", 4, FieldType::int()),
                entry("local2", 4, FieldType::float()),
            ]),
        );

        assert_eq!(remove_invalid_entries(&mut method), 3);
        let entries = method.code.unwrap().local_variables.unwrap();
        let kept: Vec<&str> = entries
            .iter()
            .map(|entry| entry.name.as_str())
            .collect();
        assert_eq!(kept, vec!["this", "l", "i", "local", "local2"]);
    }
}
