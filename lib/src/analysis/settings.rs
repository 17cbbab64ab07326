use crate::jvm::UnqualifiedName;

pub struct Settings {
    /// Prefer names recorded in the method parameter metadata over generated ones
    pub keep_parameter_names: bool,

    /// Replace every variable name with `obfuscated_name`
    ///
    /// This also rewrites names in tables which were already complete.
    pub obfuscate_names: bool,

    /// Drop entries which duplicate a parameter or point into the second half of a wide parameter
    ///
    /// Only applies to generated tables.
    pub remove_invalid_entries: bool,

    /// Name given to every variable when names are obfuscated
    pub obfuscated_name: UnqualifiedName,
}

impl Settings {
    pub fn new() -> Settings {
        Settings {
            keep_parameter_names: true,
            obfuscate_names: false,
            remove_invalid_entries: false,
            obfuscated_name: UnqualifiedName::SNOWMAN,
        }
    }
}

impl Default for Settings {
    fn default() -> Settings {
        Settings::new()
    }
}
