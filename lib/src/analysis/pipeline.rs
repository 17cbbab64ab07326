use super::{
    attach_ranges, build_ranges, compute_frames, is_complete, name_locals, remove_invalid_entries,
    remove_unused_locals, ControlFlow, Liveness, MethodContext, Refiner, Settings,
};
use crate::jvm::class_graph::{ClassHierarchy, ClassMap, ClassSource};
use crate::jvm::code::LocalVariable;
use crate::jvm::model::{Class, Method};
use crate::jvm::{BinaryName, Error, RenderDescriptor};

/// Outcome of running the pipeline over a batch of classes
#[derive(Debug, Default)]
pub struct Report {
    /// Classes with a generated table or rewritten names
    pub modified_classes: Vec<BinaryName>,

    /// Methods which could not be processed (always [`Error::Method`])
    pub failures: Vec<Error>,
}

/// Fills in missing local variable tables across a batch of classes
pub struct Pipeline {
    settings: Settings,

    /// Classes the batch was compiled against, searched after the batch itself
    libraries: Vec<Box<dyn ClassSource>>,
}

impl Pipeline {
    pub fn new(settings: Settings) -> Pipeline {
        Pipeline {
            settings,
            libraries: vec![],
        }
    }

    /// Add a tier of library classes (searched in the order added)
    pub fn add_library(&mut self, library: Box<dyn ClassSource>) {
        self.libraries.push(library);
    }

    /// Process every method of every class
    ///
    /// A method that fails is left as it was and reported, without stopping the batch.
    pub fn run(self, classes: &mut [Class]) -> Report {
        let artifact = ClassMap::from_classes("artifact", classes.iter());
        let hierarchy = ClassHierarchy::with_platform(Box::new(artifact), self.libraries);
        let mut report = Report::default();

        for class in classes.iter_mut() {
            let mut modified = false;
            for method in &mut class.methods {
                let original = method.clone();
                match process_method(&hierarchy, &class.name, method, &self.settings) {
                    Ok(changed) => modified |= changed,
                    Err(cause) => {
                        *method = original;
                        let error = Error::Method {
                            class: class.name.clone(),
                            method: method.name.clone(),
                            descriptor: method.descriptor.render(),
                            cause: Box::new(cause),
                        };
                        log::error!("{}", error);
                        report.failures.push(error);
                    }
                }
            }

            if modified {
                report.modified_classes.push(class.name.clone());
            }
        }

        log::debug!(
            "Modified {} of {} classes ({} failures)",
            report.modified_classes.len(),
            classes.len(),
            report.failures.len()
        );
        report
    }
}

/// Make sure a method has a named local variable table, returning whether it changed
///
/// Methods which already have a complete table only get renamed (when names are obfuscated).
pub fn process_method(
    hierarchy: &ClassHierarchy,
    class_name: &BinaryName,
    method: &mut Method,
    settings: &Settings,
) -> Result<bool, Error> {
    let generate = !is_complete(method);
    if generate {
        log::debug!(
            "Generating local variables for {}.{}{}",
            class_name,
            method.name,
            method.descriptor.render()
        );
        let entries = generate_entries(hierarchy, class_name, method)?;
        log::debug!("Generated {} local variables", entries.len());
        if let Some(code) = &mut method.code {
            code.local_variables = Some(entries);
        }
        if settings.remove_invalid_entries {
            remove_invalid_entries(method);
        }
    }

    let named = method
        .code
        .as_ref()
        .map_or(false, |code| code.local_variables.is_some());
    if named {
        name_locals(method, settings, generate)?;
    }

    Ok(generate || (named && settings.obfuscate_names))
}

/// Reconstruct the local variable entries of a method (with placeholder names)
///
/// Labels marking the scopes of the entries get inserted into the code.
pub fn generate_entries(
    hierarchy: &ClassHierarchy,
    class_name: &BinaryName,
    method: &mut Method,
) -> Result<Vec<LocalVariable>, Error> {
    let is_static = method.is_static();
    let Method {
        descriptor, code, ..
    } = method;
    let code = match code {
        Some(code) => code,
        None => return Ok(vec![]),
    };

    let ranges = {
        let context = MethodContext::new(hierarchy, class_name, descriptor, is_static, code);
        let max_locals = context.max_locals();

        let mut flow = ControlFlow::new(code, &context.labels)?;
        let mut frames = compute_frames(&context, &mut flow)?;
        flow.process_try_catch_blocks(context.instructions());
        flow.process_entry_points();

        let liveness = Liveness::compute(context.instructions(), &flow, &frames, max_locals);
        remove_unused_locals(&flow, &mut frames, &liveness);
        Refiner::new(&context, &flow, &mut frames).refine()?;

        build_ranges(&flow, &frames, max_locals)
    };

    attach_ranges(code, &ranges)
}
