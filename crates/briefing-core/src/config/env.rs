//! Environment-variable resolution for `${NAME}` references.

/// Abstracts over the process environment so tests can substitute a fixed map.
pub trait EnvSource {
    fn get(&self, name: &str) -> Option<String>;
}

/// The real process environment.
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn get(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

/// A fixed map, used in tests instead of the real process environment.
#[derive(Default)]
pub struct MapEnv(pub std::collections::HashMap<String, String>);

impl EnvSource for MapEnv {
    fn get(&self, name: &str) -> Option<String> {
        self.0.get(name).cloned()
    }
}
