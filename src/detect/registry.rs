use std::collections::HashMap;

use anyhow::{anyhow, Result};

use super::backend::ModelRuntime;

type RuntimeFactory = Box<dyn Fn() -> Result<Box<dyn ModelRuntime>>>;

/// Named runtime constructors, opened with an ordered fallback chain.
///
/// A factory that fails must not leave anything behind: whatever it acquired
/// is dropped before the next candidate is tried, so the caller either gets a
/// fully built runtime or an error.
pub struct RuntimeRegistry {
    factories: HashMap<String, RuntimeFactory>,
}

impl RuntimeRegistry {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register a factory under `name`. Re-registering replaces the factory.
    pub fn register<F>(&mut self, name: &str, factory: F)
    where
        F: Fn() -> Result<Box<dyn ModelRuntime>> + 'static,
    {
        self.factories.insert(name.to_string(), Box::new(factory));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// List registered backends.
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }

    /// Open the first backend in `preference` that initializes successfully.
    pub fn open_preferred(&self, preference: &[String]) -> Result<Box<dyn ModelRuntime>> {
        if preference.is_empty() {
            return Err(anyhow!("no runtime backends configured"));
        }

        let mut failures = Vec::new();
        for name in preference {
            let Some(factory) = self.factories.get(name) else {
                log::warn!("runtime backend '{}' is not available in this build", name);
                failures.push(format!("{}: not registered", name));
                continue;
            };
            match factory() {
                Ok(runtime) => {
                    if !failures.is_empty() {
                        log::warn!(
                            "runtime backend '{}' selected after fallback ({})",
                            name,
                            failures.join("; ")
                        );
                    }
                    return Ok(runtime);
                }
                Err(e) => {
                    log::warn!("runtime backend '{}' failed to initialize: {:#}", name, e);
                    failures.push(format!("{}: {:#}", name, e));
                }
            }
        }

        Err(anyhow!(
            "no runtime backend could be initialized ({})",
            failures.join("; ")
        ))
    }
}

impl Default for RuntimeRegistry {
    fn default() -> Self {
        Self::new()
    }
}
