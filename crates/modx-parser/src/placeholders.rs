//! The placeholder store.
//!
//! Placeholders are the data half of tag resolution: `[[+key]]` looks up
//! `key` here. The store is flat. Nested structures are flattened on the way
//! in, joining each level with a separator (a dot by default), so
//!
//! ```json
//! {"site_css": {"sepia": "#896536"}}
//! ```
//!
//! becomes the single key `site_css.sepia`. Arrays flatten with their indices
//! (`items.0`, `items.1`, ...). Only scalars are stored; nulls are skipped.
//!
//! [`PlaceholderStore::to_placeholders`] returns a [`PlaceholderScope`]
//! describing what it changed, which [`PlaceholderStore::restore`] undoes.
//! Chunks use this to expose their properties to their own content only.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::properties::Properties;

/// The default separator between flattened key levels.
pub const DEFAULT_SEPARATOR: &str = ".";

/// Renders a scalar JSON value the way it appears in output.
///
/// Strings are returned as-is, numbers and booleans use their display form.
/// Null, arrays and objects have no scalar rendering and return `None`.
pub fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Record of the keys written by one flattening call.
///
/// Hand it back to [`PlaceholderStore::restore`] to remove the keys that were
/// written and put back the values they replaced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaceholderScope {
    /// Every key that was set, in the order it was set.
    pub keys: Vec<String>,
    /// Values that existed before being overwritten.
    pub previous: Vec<(String, Value)>,
}

impl PlaceholderScope {
    fn absorb(&mut self, other: PlaceholderScope) {
        self.keys.extend(other.keys);
        self.previous.extend(other.previous);
    }
}

/// A flat mapping of string keys to scalar values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaceholderStore {
    data: BTreeMap<String, Value>,
}

impl PlaceholderStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a placeholder.
    ///
    /// Scalars are stored under `key` directly. Objects and arrays are
    /// flattened below `key` with the default separator. Null is ignored.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        self.to_placeholder(&key, &value, "", DEFAULT_SEPARATOR);
    }

    /// Returns a placeholder value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Returns a placeholder rendered as a string.
    pub fn get_str(&self, key: &str) -> Option<String> {
        self.get(key).and_then(scalar_to_string)
    }

    /// True if a placeholder exists for `key`.
    pub fn contains_key(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// Flattens `subject` into the store.
    ///
    /// Each key is prefixed with `prefix`, itself followed by `separator`
    /// when both are non-empty; nested levels are joined with `separator`.
    /// Scalars passed as `subject` have no key and are ignored.
    ///
    /// ```rust
    /// use modx_parser::PlaceholderStore;
    /// use serde_json::json;
    ///
    /// let mut store = PlaceholderStore::new();
    /// store.to_placeholders(&json!({"site": {"name": "Sepia"}}), "", ".");
    /// assert_eq!(store.get_str("site.name").as_deref(), Some("Sepia"));
    /// ```
    pub fn to_placeholders(&mut self, subject: &Value, prefix: &str, separator: &str) -> PlaceholderScope {
        let mut scope = PlaceholderScope::default();
        match subject {
            Value::Object(map) => {
                for (key, value) in map {
                    scope.absorb(self.to_placeholder(key, value, prefix, separator));
                }
            }
            Value::Array(items) => {
                for (i, value) in items.iter().enumerate() {
                    scope.absorb(self.to_placeholder(&i.to_string(), value, prefix, separator));
                }
            }
            _ => {}
        }
        scope
    }

    /// Flattens a single key/value pair into the store.
    pub fn to_placeholder(
        &mut self,
        key: &str,
        value: &Value,
        prefix: &str,
        separator: &str,
    ) -> PlaceholderScope {
        let full_key = if !prefix.is_empty() && !separator.is_empty() {
            format!("{prefix}{separator}{key}")
        } else {
            format!("{prefix}{key}")
        };

        match value {
            Value::Object(_) | Value::Array(_) => self.to_placeholders(value, &full_key, separator),
            Value::Null => PlaceholderScope::default(),
            scalar => {
                let mut scope = PlaceholderScope::default();
                if let Some(old) = self.data.insert(full_key.clone(), scalar.clone()) {
                    scope.previous.push((full_key.clone(), old));
                }
                scope.keys.push(full_key);
                scope
            }
        }
    }

    /// Flattens `subject` under `namespace` without a separator.
    ///
    /// `set_placeholders(&json!({"x": 1}), "my.")` sets `my.x`.
    pub fn set_placeholders(&mut self, subject: &Value, namespace: &str) -> PlaceholderScope {
        self.to_placeholders(subject, namespace, "")
    }

    /// Writes every property as a placeholder.
    pub fn push_properties(&mut self, properties: &Properties) -> PlaceholderScope {
        let mut scope = PlaceholderScope::default();
        for (key, value) in properties.iter() {
            let value = Value::String(value.to_string());
            if let Some(old) = self.data.insert(key.to_string(), value) {
                scope.previous.push((key.to_string(), old));
            }
            scope.keys.push(key.to_string());
        }
        scope
    }

    /// Undoes a scope: removes its keys, then restores overwritten values.
    pub fn restore(&mut self, scope: PlaceholderScope) {
        self.remove_keys(&scope.keys);
        // Oldest value wins when a key was overwritten more than once.
        for (key, value) in scope.previous.into_iter().rev() {
            self.data.insert(key, value);
        }
    }

    /// Removes one placeholder.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.data.remove(key)
    }

    /// Removes a list of placeholders.
    pub fn remove_keys<S: AsRef<str>>(&mut self, keys: &[S]) {
        for key in keys {
            self.data.remove(key.as_ref());
        }
    }

    /// Removes every placeholder whose key starts with `prefix`.
    ///
    /// Returns the number of placeholders removed.
    pub fn remove_prefix(&mut self, prefix: &str) -> usize {
        let doomed: Vec<String> = self
            .data
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect();
        for key in &doomed {
            self.data.remove(key);
        }
        doomed.len()
    }

    /// Snapshot of the whole store as string properties.
    pub fn to_properties(&self) -> Properties {
        self.data
            .iter()
            .filter_map(|(k, v)| scalar_to_string(v).map(|s| (k.clone(), s)))
            .collect()
    }

    /// Iterates over all placeholders in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.data.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of placeholders.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True when the store is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
