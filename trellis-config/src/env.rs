// Environment variable loading

use serde_json::Value;
use std::collections::HashMap;
use std::env;

/// Loads `PREFIX_*` environment variables as configuration keys.
///
/// The prefix and the separating underscore are stripped and the remainder is
/// lowercased, so `TRELLIS_BIND_ADDRESS` becomes `bind_address`.
pub struct EnvLoader {
    prefix: Option<String>,
}

impl EnvLoader {
    pub fn new(prefix: Option<String>) -> Self {
        Self { prefix }
    }

    /// Load from the process environment.
    pub fn load(&self) -> HashMap<String, Value> {
        self.load_from(env::vars())
    }

    /// Load from an explicit set of variables.
    pub fn load_from<I, K, V>(&self, vars: I) -> HashMap<String, Value>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut config = HashMap::new();

        for (key, value) in vars {
            let key = key.as_ref();
            let stripped = match self.prefix.as_deref() {
                Some(prefix) => match key.strip_prefix(prefix) {
                    Some(rest) if rest.starts_with('_') => &rest[1..],
                    _ => continue,
                },
                None => key,
            };

            if stripped.is_empty() {
                continue;
            }

            config.insert(stripped.to_lowercase(), coerce(value.as_ref()));
        }

        config
    }
}

impl Default for EnvLoader {
    fn default() -> Self {
        Self::new(None)
    }
}

/// Environment values are strings; booleans, numbers and JSON literals are
/// recognized so that typed settings deserialize from them.
pub fn coerce(raw: &str) -> Value {
    let trimmed = raw.trim();
    match trimmed.to_ascii_lowercase().as_str() {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }

    if trimmed.starts_with('[') || trimmed.starts_with('{') || trimmed.parse::<f64>().is_ok() {
        if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
            return value;
        }
    }

    Value::String(raw.to_string())
}
