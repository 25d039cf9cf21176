//! Import resolution and the per-session module cache.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::rc::Rc;

use tracing::debug;

use super::environment::Environment;
use super::error::InterpreterError;
use super::value::Value;

/// Source lookup for `import name`.
pub trait ModuleLoader {
    /// Source text of module `name`, or `None` when no such module exists.
    fn load(&self, name: &str) -> io::Result<Option<String>>;

    /// Where `name` was looked for, for error messages.
    fn location(&self, name: &str) -> String;
}

/// Resolves `name` to `<dir>/<name><suffix>`.
#[derive(Debug, Clone)]
pub struct FsModuleLoader {
    dir: PathBuf,
    suffix: String,
}

impl FsModuleLoader {
    pub fn new(dir: impl Into<PathBuf>, suffix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            suffix: suffix.into(),
        }
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}{}", self.suffix))
    }
}

impl ModuleLoader for FsModuleLoader {
    fn load(&self, name: &str) -> io::Result<Option<String>> {
        match fs::read_to_string(self.path_for(name)) {
            Ok(source) => Ok(Some(source)),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(error) => Err(error),
        }
    }

    fn location(&self, name: &str) -> String {
        self.path_for(name).display().to_string()
    }
}

/// In-memory module table for embedding and tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryModuleLoader {
    sources: HashMap<String, String>,
}

impl MemoryModuleLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_module(mut self, name: impl Into<String>, source: impl Into<String>) -> Self {
        self.sources.insert(name.into(), source.into());
        self
    }
}

impl ModuleLoader for MemoryModuleLoader {
    fn load(&self, name: &str) -> io::Result<Option<String>> {
        Ok(self.sources.get(name).cloned())
    }

    fn location(&self, name: &str) -> String {
        format!("in-memory module '{name}'")
    }
}

/// An evaluated module and the environment its top level ran in.
#[derive(Debug)]
pub(crate) struct ModuleObject {
    pub(crate) name: String,
    pub(crate) env: Environment,
}

impl ModuleObject {
    /// `module.name` reads the module's own tables only.
    pub(crate) fn get_attribute(&self, name: &str) -> Result<Value, InterpreterError> {
        if let Some(value) = self.env.local_variable(name) {
            return Ok(value);
        }
        if let Some(function) = self.env.local_function(name) {
            return Ok(Value::Function(function));
        }
        if let Some(class) = self.env.local_class(name) {
            return Ok(Value::Class(class));
        }
        Err(InterpreterError::UnknownAttribute {
            attribute: name.to_string(),
            type_name: format!("module '{}'", self.name),
        })
    }
}

/// Loaded modules keyed by name, plus the loader used on a miss.
pub(crate) struct ModuleCache {
    loader: Box<dyn ModuleLoader>,
    modules: HashMap<String, Rc<ModuleObject>>,
}

impl ModuleCache {
    pub(crate) fn new(loader: Box<dyn ModuleLoader>) -> Self {
        Self {
            loader,
            modules: HashMap::new(),
        }
    }

    pub(crate) fn get(&self, name: &str) -> Option<Rc<ModuleObject>> {
        let module = self.modules.get(name).cloned();
        if module.is_some() {
            debug!(module = name, "module cache hit");
        }
        module
    }

    pub(crate) fn insert(&mut self, module: Rc<ModuleObject>) {
        self.modules.insert(module.name.clone(), module);
    }

    pub(crate) fn source(&self, name: &str) -> Result<String, InterpreterError> {
        debug!(module = name, "loading module source");
        match self.loader.load(name) {
            Ok(Some(source)) => Ok(source),
            Ok(None) => Err(InterpreterError::ModuleNotFound {
                name: name.to_string(),
                location: self.loader.location(name),
            }),
            Err(error) => Err(InterpreterError::ModuleIo {
                name: name.to_string(),
                message: error.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::environment::ScopeKind;

    #[test]
    fn memory_loader_reports_missing_modules() {
        let cache = ModuleCache::new(Box::new(
            MemoryModuleLoader::new().with_module("util", "x = 1\n"),
        ));

        assert_eq!(cache.source("util").expect("load failed"), "x = 1\n");
        assert_eq!(
            cache.source("missing").expect_err("expected missing module"),
            InterpreterError::ModuleNotFound {
                name: "missing".to_string(),
                location: "in-memory module 'missing'".to_string(),
            }
        );
    }

    #[test]
    fn filesystem_loader_appends_suffix() {
        let dir = std::env::temp_dir().join(format!("pasmhon-modules-{}", std::process::id()));
        fs::create_dir_all(&dir).expect("create temp dir");
        fs::write(dir.join("helpers.pa"), "y = 2\n").expect("write module");

        let loader = FsModuleLoader::new(&dir, ".pa");
        assert_eq!(
            loader.load("helpers").expect("load failed").as_deref(),
            Some("y = 2\n")
        );
        assert_eq!(loader.load("absent").expect("load failed"), None);
        assert!(loader.location("absent").ends_with("absent.pa"));

        fs::remove_dir_all(&dir).expect("remove temp dir");
    }

    #[test]
    fn cache_returns_the_same_module_object() {
        let mut cache = ModuleCache::new(Box::new(MemoryModuleLoader::new()));
        let env = Environment::new(ScopeKind::Module);
        env.define_variable("answer", Value::Int(42));
        let module = Rc::new(ModuleObject {
            name: "m".to_string(),
            env,
        });
        cache.insert(module.clone());

        let cached = cache.get("m").expect("module not cached");
        assert!(Rc::ptr_eq(&cached, &module));
        assert!(matches!(
            cached.get_attribute("answer"),
            Ok(Value::Int(42))
        ));
        assert!(cache.get("other").is_none());
    }
}
