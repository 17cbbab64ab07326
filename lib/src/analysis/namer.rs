use super::Settings;
use crate::jvm::model::Method;
use crate::jvm::{BaseType, BinaryName, Error, FieldType, Name, RefType, UnqualifiedName};
use crate::util::Width;
use std::collections::{HashMap, HashSet};

/// Identifiers which can't be used as Java variable names
pub const RESERVED_IDENTIFIERS: [&str; 58] = [
    "abstract",
    "continue",
    "for",
    "new",
    "switch",
    "assert",
    "default",
    "if",
    "package",
    "synchronized",
    "boolean",
    "do",
    "goto",
    "private",
    "this",
    "break",
    "double",
    "implements",
    "protected",
    "throw",
    "byte",
    "else",
    "import",
    "public",
    "throws",
    "case",
    "enum",
    "instanceof",
    "return",
    "transient",
    "catch",
    "extends",
    "int",
    "short",
    "try",
    "char",
    "final",
    "interface",
    "static",
    "void",
    "class",
    "finally",
    "long",
    "strictfp",
    "volatile",
    "const",
    "float",
    "native",
    "super",
    "while",
    "_",
    "true",
    "false",
    "null",
    "var",
    "yield",
    "record",
    "sealed",
];

/// Letters advancing like an odometer: `i`, `j`, ..., `z`, `a`, ..., `h`, `ii`, `ij`, ...
struct Counter {
    start: u8,
    letters: Vec<u8>,
}

impl Counter {
    fn new(start: u8) -> Counter {
        Counter {
            start,
            letters: vec![start],
        }
    }

    fn next_name(&mut self) -> String {
        let name = self.letters.iter().map(|c| *c as char).collect();
        self.increment();
        name
    }

    fn increment(&mut self) {
        let mut place = self.letters.len() - 1;
        loop {
            let letter = match self.letters[place] {
                b'z' => b'a',
                letter => letter + 1,
            };
            self.letters[place] = letter;

            if letter != self.start {
                return;
            } else if place == 0 {
                self.letters.insert(0, self.start);
                return;
            }
            place -= 1;
        }
    }
}

#[derive(PartialEq, Eq, Hash, Clone, Copy)]
enum CounterKind {
    Primitive(BaseType),
    Array(BaseType),
}

/// Generates names from types, one method at a time
struct Namer {
    counters: HashMap<CounterKind, Counter>,
    reserved: HashSet<&'static str>,
}

impl Namer {
    fn new() -> Namer {
        Namer {
            counters: HashMap::new(),
            reserved: RESERVED_IDENTIFIERS.iter().copied().collect(),
        }
    }

    fn counter(&mut self, kind: CounterKind) -> String {
        let start = match kind {
            CounterKind::Primitive(base_type) | CounterKind::Array(base_type) => mnemonic(base_type),
        };
        self.counters
            .entry(kind)
            .or_insert_with(|| Counter::new(start))
            .next_name()
    }

    fn generate(&mut self, descriptor: &FieldType) -> String {
        let mut name = match descriptor {
            FieldType::Base(BaseType::Boolean) => String::from("bl"),
            FieldType::Base(base_type) => self.counter(CounterKind::Primitive(*base_type)),
            FieldType::Ref(RefType::Object(class_name)) => object_name(class_name),
            FieldType::Ref(RefType::PrimitiveArray(array)) => {
                let element = match array.element_type {
                    BaseType::Boolean => String::from("bl"),
                    base_type => self.counter(CounterKind::Array(base_type)),
                };
                element + "s"
            }
            FieldType::Ref(RefType::ObjectArray(array)) => object_name(&array.element_type) + "s",
        };

        while self.reserved.contains(name.as_str()) {
            name.push('_');
        }
        name
    }
}

fn mnemonic(base_type: BaseType) -> u8 {
    match base_type {
        BaseType::Char => b'c',
        BaseType::Byte => b'b',
        BaseType::Short => b's',
        BaseType::Int | BaseType::Boolean => b'i',
        BaseType::Float => b'f',
        BaseType::Long => b'l',
        BaseType::Double => b'd',
    }
}

/// Class name with the package and enclosing classes removed, starting in lowercase
///
/// Anonymous classes (`Outer$1`) are named after the class enclosing them.
fn object_name(class_name: &BinaryName) -> String {
    let mut simple = class_name.unqualified_part();
    let nested = loop {
        match simple.rfind('$') {
            Some(idx) => {
                let nested = simple[idx + 1..].trim_start_matches(|c: char| c.is_ascii_digit());
                if nested.is_empty() {
                    simple = &simple[..idx];
                } else {
                    break nested;
                }
            }
            None => break simple,
        }
    };

    let mut chars = nested.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::from("object"),
    }
}

/// Local slot of every declared parameter
pub fn parameter_slots(method: &Method) -> Vec<u16> {
    let mut slot: usize = if method.is_static() { 0 } else { 1 };
    let mut slots = Vec::with_capacity(method.descriptor.parameters.len());
    for parameter in &method.descriptor.parameters {
        slots.push(slot as u16);
        slot += parameter.width();
    }
    slots
}

/// Name every entry in the local variable table of a method
///
/// Without `improve`, existing names are left alone unless they get obfuscated. Names of
/// parameters in the method metadata are updated to match the table.
pub fn name_locals(method: &mut Method, settings: &Settings, improve: bool) -> Result<(), Error> {
    let is_static = method.is_static();
    let slots = parameter_slots(method);
    let Method {
        code,
        parameter_names,
        ..
    } = method;
    let entries = match code.as_mut().and_then(|code| code.local_variables.as_mut()) {
        Some(entries) => entries,
        None => return Ok(()),
    };

    let mut first_entries: HashMap<u16, usize> = HashMap::new();
    for (idx, entry) in entries.iter().enumerate() {
        first_entries.entry(entry.index).or_insert(idx);
    }
    let take_parameter_names = improve
        && settings.keep_parameter_names
        && parameter_names
            .as_ref()
            .map_or(false, |names| !names.is_empty());

    let mut namer = Namer::new();
    let mut names: Vec<UnqualifiedName> = Vec::with_capacity(entries.len());
    let mut kept: Vec<bool> = Vec::with_capacity(entries.len());
    for (idx, entry) in entries.iter().enumerate() {
        let recorded: Option<UnqualifiedName> = if take_parameter_names
            && first_entries.get(&entry.index) == Some(&idx)
        {
            slots
                .iter()
                .position(|slot| *slot == entry.index)
                .and_then(|parameter| parameter_names.as_ref()?.get(parameter)?.clone())
        } else {
            None
        };

        let (name, keep) = if !is_static && entry.index == 0 {
            (UnqualifiedName::THIS, true)
        } else if settings.obfuscate_names {
            (settings.obfuscated_name.clone(), true)
        } else if let Some(recorded) = recorded {
            (recorded, true)
        } else if improve {
            let generated = namer.generate(&entry.descriptor);
            let generated = UnqualifiedName::from_string(generated).map_err(Error::MalformedName)?;
            (generated, false)
        } else {
            (entry.name.clone(), false)
        };
        names.push(name);
        kept.push(keep);
    }

    if improve && !settings.obfuscate_names {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for name in &names {
            *counts.entry(name.as_str()).or_insert(0) += 1;
        }
        let duplicated: HashSet<String> = counts
            .into_iter()
            .filter(|(_, count)| *count > 1)
            .map(|(name, _)| name.to_owned())
            .collect();

        if !duplicated.is_empty() {
            log::debug!("Disambiguating {} colliding names", duplicated.len());
            for (idx, name) in names.iter_mut().enumerate() {
                if kept[idx] || !duplicated.contains(name.as_str()) {
                    continue;
                }
                *name = UnqualifiedName::from_string(format!("{}{}", name.as_str(), idx))
                    .map_err(Error::MalformedName)?;
            }
        }
    }

    for (entry, name) in entries.iter_mut().zip(names) {
        entry.name = name;
    }

    if let Some(parameter_names) = parameter_names {
        for (parameter, slot) in slots.iter().enumerate() {
            if let (Some(recorded), Some(idx)) =
                (parameter_names.get_mut(parameter), first_entries.get(slot))
            {
                *recorded = Some(entries[*idx].name.clone());
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::code::{Code, Instruction, Label, LocalVariable};
    use crate::jvm::{MethodAccessFlags, MethodDescriptor};

    fn counter_names(start: u8, count: usize) -> Vec<String> {
        let mut counter = Counter::new(start);
        (0..count).map(|_| counter.next_name()).collect()
    }

    #[test]
    fn odometer() {
        let names = counter_names(b'i', 30);
        assert_eq!(&names[..3], &["i", "j", "k"]);
        assert_eq!(names[17], "z");
        assert_eq!(names[18], "a");
        assert_eq!(names[25], "h");
        assert_eq!(names[26], "ii");
        assert_eq!(names[27], "ij");

        let names = counter_names(b'a', 28);
        assert_eq!(names[25], "z");
        assert_eq!(names[26], "aa");
        assert_eq!(names[27], "ab");
    }

    #[test]
    fn object_names() {
        let name = |s: &str| object_name(&BinaryName::from_string(String::from(s)).unwrap());
        assert_eq!(name("java/lang/String"), "string");
        assert_eq!(name("me/Outer$Inner"), "inner");
        assert_eq!(name("me/Outer$1"), "outer");
        assert_eq!(name("me/Outer$1Local"), "local");
        assert_eq!(name("URL"), "uRL");
    }

    #[test]
    fn generated_names() {
        let mut namer = Namer::new();
        assert_eq!(namer.generate(&FieldType::int()), "i");
        assert_eq!(namer.generate(&FieldType::int()), "j");
        assert_eq!(namer.generate(&FieldType::long()), "l");
        assert_eq!(namer.generate(&FieldType::boolean()), "bl");
        assert_eq!(namer.generate(&FieldType::array(FieldType::int())), "is");
        assert_eq!(namer.generate(&FieldType::array(FieldType::int())), "js");
        assert_eq!(namer.generate(&FieldType::char()), "c");
        assert_eq!(
            namer.generate(&FieldType::Ref(RefType::object_array(BinaryName::STRING, 2))),
            "strings"
        );
        let class = BinaryName::from_string(String::from("me/Int")).unwrap();
        assert_eq!(namer.generate(&FieldType::object(class)), "int_");
    }

    fn entry(index: u16, descriptor: FieldType) -> LocalVariable {
        LocalVariable {
            name: UnqualifiedName::from_string(format!("var{}", index)).unwrap(),
            descriptor,
            start: Label(0),
            end: Label(1),
            index,
        }
    }

    fn method(entries: Vec<LocalVariable>, parameters: Vec<FieldType>) -> Method {
        let mut code = Code::new(0, 4, vec![Instruction::Return]);
        code.local_variables = Some(entries);
        Method::new(
            UnqualifiedName::from_string(String::from("run")).unwrap(),
            MethodDescriptor {
                parameters,
                return_type: None,
            },
            MethodAccessFlags::PUBLIC,
            Some(code),
        )
    }

    fn names(method: &Method) -> Vec<&str> {
        method
            .code
            .as_ref()
            .unwrap()
            .local_variables
            .as_ref()
            .unwrap()
            .iter()
            .map(|entry| entry.name.as_str())
            .collect()
    }

    #[test]
    fn parameter_names() {
        let foo = FieldType::object(BinaryName::from_string(String::from("me/Foo")).unwrap());
        let mut method = method(
            vec![
                entry(0, FieldType::object(BinaryName::OBJECT)),
                entry(1, foo.clone()),
                entry(2, foo.clone()),
                entry(3, FieldType::int()),
            ],
            vec![foo.clone(), foo],
        );
        method.parameter_names = Some(vec![
            Some(UnqualifiedName::from_string(String::from("left")).unwrap()),
            None,
        ]);

        name_locals(&mut method, &Settings::new(), true).unwrap();
        assert_eq!(names(&method), vec!["this", "left", "foo", "i"]);
        assert_eq!(
            method.parameter_names.as_ref().unwrap()[1].as_ref().map(Name::as_str),
            Some("foo")
        );

        let mut settings = Settings::new();
        settings.obfuscate_names = true;
        name_locals(&mut method, &settings, false).unwrap();
        assert_eq!(names(&method), vec!["this", "\u{2603}", "\u{2603}", "\u{2603}"]);
    }

    #[test]
    fn distinct_generated_names() {
        let mut method = method(
            vec![
                entry(0, FieldType::object(BinaryName::OBJECT)),
                entry(1, FieldType::int()),
                entry(2, FieldType::int()),
                entry(3, FieldType::object(BinaryName::STRING)),
                entry(4, FieldType::int()),
            ],
            vec![],
        );
        name_locals(&mut method, &Settings::new(), true).unwrap();
        assert_eq!(names(&method), vec!["this", "i", "j", "string", "k"]);
    }

    #[test]
    fn existing_names_kept() {
        let mut method = method(vec![entry(1, FieldType::int())], vec![]);
        name_locals(&mut method, &Settings::new(), false).unwrap();
        assert_eq!(names(&method), vec!["var1"]);
    }
}
