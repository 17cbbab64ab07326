use std::borrow::Cow;
use std::fmt;

/// Names of methods, fields, and local variables
///
/// See <https://docs.oracle.com/javase/specs/jvms/se16/html/jvms-4.html#jvms-4.2.2>
#[derive(Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct UnqualifiedName(Cow<'static, str>);

/// Names of classes and interfaces, with `/` separating packages
///
/// See <https://docs.oracle.com/javase/specs/jvms/se16/html/jvms-4.html#jvms-4.2.1>
#[derive(Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct BinaryName(Cow<'static, str>);

/// Validated name backed by a (usually static) string
pub trait Name: Sized {
    /// Reason why `name` would not be a valid name, if any
    fn check_valid(name: &str) -> Result<(), String>;

    fn as_str(&self) -> &str;

    fn from_string(name: String) -> Result<Self, String>;
}

/// Characters which can't appear anywhere in an unqualified name
const ILLEGAL_CHARACTERS: [char; 4] = ['.', ';', '[', '/'];

impl Name for UnqualifiedName {
    fn check_valid(name: &str) -> Result<(), String> {
        if name.is_empty() {
            Err(String::from("Unqualified name is empty"))
        } else if let Some(c) = name.chars().find(|c| ILLEGAL_CHARACTERS.contains(c)) {
            Err(format!("Unqualified name '{}' contains illegal '{}'", name, c))
        } else {
            Ok(())
        }
    }

    fn as_str(&self) -> &str {
        &self.0
    }

    fn from_string(name: String) -> Result<Self, String> {
        Self::check_valid(&name)?;
        Ok(UnqualifiedName(Cow::Owned(name)))
    }
}

impl Name for BinaryName {
    fn check_valid(name: &str) -> Result<(), String> {
        if name.is_empty() {
            return Err(String::from("Binary name is empty"));
        }
        for segment in name.split('/') {
            UnqualifiedName::check_valid(segment)
                .map_err(|msg| format!("In binary name '{}': {}", name, msg))?;
        }
        Ok(())
    }

    fn as_str(&self) -> &str {
        &self.0
    }

    fn from_string(name: String) -> Result<Self, String> {
        Self::check_valid(&name)?;
        Ok(BinaryName(Cow::Owned(name)))
    }
}

macro_rules! display_as_str {
    ($($name:ty),*) => {
        $(
            impl AsRef<str> for $name {
                fn as_ref(&self) -> &str {
                    self.as_str()
                }
            }

            impl fmt::Debug for $name {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(self.as_str())
                }
            }

            impl fmt::Display for $name {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(self.as_str())
                }
            }
        )*
    };
}

display_as_str!(UnqualifiedName, BinaryName);

impl UnqualifiedName {
    const fn name(value: &'static str) -> UnqualifiedName {
        UnqualifiedName(Cow::Borrowed(value))
    }

    // Only these names get to have angle brackets
    pub const INIT: Self = Self::name("<init>");
    pub const CLINIT: Self = Self::name("<clinit>");

    pub const THIS: Self = Self::name("this");

    /// Placeholder used for every variable when names are obfuscated
    pub const SNOWMAN: Self = Self::name("\u{2603}");
}

impl BinaryName {
    /// Segment after the last `/` (the class name without its package)
    pub fn unqualified_part(&self) -> &str {
        let name = self.as_str();
        match name.rfind('/') {
            Some(idx) => &name[idx + 1..],
            None => name,
        }
    }

    const fn name(value: &'static str) -> BinaryName {
        BinaryName(Cow::Borrowed(value))
    }

    // JDK names
    pub const ABSTRACTCOLLECTION: Self = Self::name("java/util/AbstractCollection");
    pub const ABSTRACTLIST: Self = Self::name("java/util/AbstractList");
    pub const ABSTRACTMAP: Self = Self::name("java/util/AbstractMap");
    pub const ABSTRACTSTRINGBUILDER: Self = Self::name("java/lang/AbstractStringBuilder");
    pub const APPENDABLE: Self = Self::name("java/lang/Appendable");
    pub const ARITHMETICEXCEPTION: Self = Self::name("java/lang/ArithmeticException");
    pub const ARRAYINDEXOUTOFBOUNDSEXCEPTION: Self =
        Self::name("java/lang/ArrayIndexOutOfBoundsException");
    pub const ARRAYLIST: Self = Self::name("java/util/ArrayList");
    pub const ASSERTIONERROR: Self = Self::name("java/lang/AssertionError");
    pub const AUTOCLOSEABLE: Self = Self::name("java/lang/AutoCloseable");
    pub const BOOLEAN: Self = Self::name("java/lang/Boolean");
    pub const BYTE: Self = Self::name("java/lang/Byte");
    pub const CHARACTER: Self = Self::name("java/lang/Character");
    pub const CHARSEQUENCE: Self = Self::name("java/lang/CharSequence");
    pub const CLASS: Self = Self::name("java/lang/Class");
    pub const CLASSCASTEXCEPTION: Self = Self::name("java/lang/ClassCastException");
    pub const CLONEABLE: Self = Self::name("java/lang/Cloneable");
    pub const CLOSEABLE: Self = Self::name("java/io/Closeable");
    pub const COLLECTION: Self = Self::name("java/util/Collection");
    pub const COMPARABLE: Self = Self::name("java/lang/Comparable");
    pub const DOUBLE: Self = Self::name("java/lang/Double");
    pub const ENUM: Self = Self::name("java/lang/Enum");
    pub const ERROR: Self = Self::name("java/lang/Error");
    pub const EXCEPTION: Self = Self::name("java/lang/Exception");
    pub const FLOAT: Self = Self::name("java/lang/Float");
    pub const HASHMAP: Self = Self::name("java/util/HashMap");
    pub const ILLEGALARGUMENTEXCEPTION: Self = Self::name("java/lang/IllegalArgumentException");
    pub const ILLEGALSTATEEXCEPTION: Self = Self::name("java/lang/IllegalStateException");
    pub const INDEXOUTOFBOUNDSEXCEPTION: Self =
        Self::name("java/lang/IndexOutOfBoundsException");
    pub const INTEGER: Self = Self::name("java/lang/Integer");
    pub const IOEXCEPTION: Self = Self::name("java/io/IOException");
    pub const ITERABLE: Self = Self::name("java/lang/Iterable");
    pub const ITERATOR: Self = Self::name("java/util/Iterator");
    pub const LIST: Self = Self::name("java/util/List");
    pub const LONG: Self = Self::name("java/lang/Long");
    pub const MAP: Self = Self::name("java/util/Map");
    pub const METHODHANDLE: Self = Self::name("java/lang/invoke/MethodHandle");
    pub const METHODTYPE: Self = Self::name("java/lang/invoke/MethodType");
    pub const NULLPOINTEREXCEPTION: Self = Self::name("java/lang/NullPointerException");
    pub const NUMBER: Self = Self::name("java/lang/Number");
    pub const OBJECT: Self = Self::name("java/lang/Object");
    pub const RUNNABLE: Self = Self::name("java/lang/Runnable");
    pub const RUNTIMEEXCEPTION: Self = Self::name("java/lang/RuntimeException");
    pub const SERIALIZABLE: Self = Self::name("java/io/Serializable");
    pub const SHORT: Self = Self::name("java/lang/Short");
    pub const STRING: Self = Self::name("java/lang/String");
    pub const STRINGBUILDER: Self = Self::name("java/lang/StringBuilder");
    pub const SYSTEM: Self = Self::name("java/lang/System");
    pub const THREAD: Self = Self::name("java/lang/Thread");
    pub const THROWABLE: Self = Self::name("java/lang/Throwable");
    pub const UNSUPPORTEDOPERATIONEXCEPTION: Self =
        Self::name("java/lang/UnsupportedOperationException");
}
