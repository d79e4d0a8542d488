//! Tag properties and property-string parsing.
//!
//! A tag may carry a property string after its name:
//!
//! ```text
//! [[$card? &title=`Hello` &body=`Uses ``backticks`` inside`]]
//! ```
//!
//! [`parse_properties`] turns such a string into [`Properties`], an ordered
//! key/value map. Segments are split on `&` and then on `=`, both
//! escape-aware, so delimiters inside backtick-quoted values are safe.
//! Segments that do not split into exactly a key and a value are dropped.
//!
//! The legacy extended value form `description;type;options;value` is
//! understood as well. [`parse_property_definitions`] keeps the descriptive
//! metadata; [`parse_properties`] only keeps the value.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::placeholders::scalar_to_string;
use crate::split::{esc_split, split, ESCAPE};

/// An ordered map of property names to string values.
///
/// Insertion order is preserved. Overwriting an existing key keeps its
/// original position, so merging behaves like an ordered dictionary update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Properties {
    entries: Vec<(String, String)>,
    index: HashMap<String, usize>,
}

impl Properties {
    /// Creates an empty property map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or overwrites a property, returning the previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        let key = key.into();
        let value = value.into();
        match self.index.get(&key) {
            Some(&i) => Some(std::mem::replace(&mut self.entries[i].1, value)),
            None => {
                self.index.insert(key.clone(), self.entries.len());
                self.entries.push((key, value));
                None
            }
        }
    }

    /// Returns the value of a property.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.index.get(key).map(|&i| self.entries[i].1.as_str())
    }

    /// Returns true if the property is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// Copies every entry of `other` into `self`; `other` wins on conflicts.
    pub fn merge(&mut self, other: &Properties) {
        for (key, value) in other.iter() {
            self.insert(key, value);
        }
    }

    /// Iterates over `(key, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of properties.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when there are no properties.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Serializes the properties back into tag syntax: `k=`v`&k2=`v2``.
    ///
    /// Literal backticks inside values are doubled so that the result parses
    /// back to the same map.
    pub fn to_property_string(&self) -> String {
        self.entries
            .iter()
            .map(|(k, v)| format!("{}={}{}{}", k.trim(), ESCAPE, v.replace('`', "``"), ESCAPE))
            .collect::<Vec<_>>()
            .join("&")
    }

    /// Builds properties from a JSON mapping.
    ///
    /// Values shaped like `{"value": ...}` (a full property record) are
    /// unwrapped to their value. Other nested mappings and arrays are
    /// flattened into dot-separated keys, the same way the placeholder store
    /// flattens them. Nulls are skipped. Anything other than an object yields
    /// an empty map.
    pub fn from_json(source: &Value) -> Self {
        let mut properties = Self::new();
        if let Value::Object(map) = source {
            for (key, value) in map {
                let value = match value {
                    Value::Object(record) if record.contains_key("value") => &record["value"],
                    other => other,
                };
                properties.insert_flattened(key, value);
            }
        }
        properties
    }

    /// Converts into a JSON object of string values.
    pub fn to_json(&self) -> Value {
        Value::Object(
            self.entries
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect(),
        )
    }

    fn insert_flattened(&mut self, key: &str, value: &Value) {
        match value {
            Value::Object(map) => {
                for (child, v) in map {
                    self.insert_flattened(&format!("{key}.{child}"), v);
                }
            }
            Value::Array(items) => {
                for (i, v) in items.iter().enumerate() {
                    self.insert_flattened(&format!("{key}.{i}"), v);
                }
            }
            scalar => {
                if let Some(s) = scalar_to_string(scalar) {
                    self.insert(key, s);
                }
            }
        }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Properties {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut properties = Self::new();
        for (k, v) in iter {
            properties.insert(k, v);
        }
        properties
    }
}

impl From<&str> for Properties {
    fn from(source: &str) -> Self {
        parse_properties(source)
    }
}

impl From<&Value> for Properties {
    fn from(source: &Value) -> Self {
        Self::from_json(source)
    }
}

impl<K: Into<String>, V: Into<String>> Extend<(K, V)> for Properties {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.insert(k, v);
        }
    }
}

/// Editor field type of a legacy property definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    TextField,
    NumberField,
    Checkbox,
    List,
    Combo,
    DateField,
    Radio,
    TextArea,
    TimeField,
}

impl FieldType {
    /// Maps a legacy type token to a field type.
    ///
    /// `string` is a text field, `int`/`integer`/`float` are number fields and
    /// `bool`/`boolean` are checkboxes. Canonical names map to themselves and
    /// anything unrecognized falls back to a text field.
    pub fn from_legacy(token: &str) -> Self {
        match token {
            "string" | "textfield" => FieldType::TextField,
            "int" | "integer" | "float" | "numberfield" => FieldType::NumberField,
            "bool" | "boolean" | "checkbox" => FieldType::Checkbox,
            "list" => FieldType::List,
            "combo" => FieldType::Combo,
            "datefield" => FieldType::DateField,
            "radio" => FieldType::Radio,
            "textarea" => FieldType::TextArea,
            "timefield" => FieldType::TimeField,
            _ => FieldType::TextField,
        }
    }

    /// Canonical name of the field type.
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::TextField => "textfield",
            FieldType::NumberField => "numberfield",
            FieldType::Checkbox => "checkbox",
            FieldType::List => "list",
            FieldType::Combo => "combo",
            FieldType::DateField => "datefield",
            FieldType::Radio => "radio",
            FieldType::TextArea => "textarea",
            FieldType::TimeField => "timefield",
        }
    }
}

/// One selectable option of a `list` or `combo` property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyOption {
    pub name: String,
    pub value: String,
}

/// A property with its descriptive metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyDefinition {
    pub name: String,
    pub description: String,
    pub field_type: FieldType,
    pub options: Vec<PropertyOption>,
    pub value: String,
}

impl PropertyDefinition {
    /// A plain text property with no metadata.
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            field_type: FieldType::TextField,
            options: Vec::new(),
            value: value.into(),
        }
    }
}

/// Parses a property string into an ordered map of values.
///
/// ```rust
/// use modx_parser::parse_properties;
///
/// let props = parse_properties("&title=`Hello, world` &count=`3` &broken");
/// assert_eq!(props.get("title"), Some("Hello, world"));
/// assert_eq!(props.get("count"), Some("3"));
/// assert!(!props.contains_key("broken"));
/// ```
pub fn parse_properties(source: &str) -> Properties {
    parse_property_definitions(source)
        .into_iter()
        .map(|def| (def.name, def.value))
        .collect()
}

/// Parses a property string keeping the legacy descriptive metadata.
///
/// A value of the form `description;type;options;value` (with `options` a
/// comma-separated list, only meaningful for `list` and `combo`) or
/// `description;type;value` produces a typed definition. Plain values become
/// text definitions.
pub fn parse_property_definitions(source: &str) -> Vec<PropertyDefinition> {
    let mut definitions = Vec::new();

    for segment in split('&', source) {
        let pair = split('=', &segment);
        let [key, raw_value] = pair.as_slice() else {
            continue;
        };
        let name = key.strip_prefix("amp;").unwrap_or(key.as_str());

        let mut definition = legacy_definition(name, raw_value);
        definition.value = unquote(&definition.value);
        definitions.push(definition);
    }

    definitions
}

/// Interprets the `description;type;options;value` form.
fn legacy_definition(name: &str, raw_value: &str) -> PropertyDefinition {
    let parts = esc_split(';', raw_value, ESCAPE, 0);
    let mut definition = PropertyDefinition::text(name, raw_value);

    let Some(type_token) = parts.get(1) else {
        return definition;
    };
    definition.description = parts[0].clone();

    let is_choice = type_token == "list" || type_token == "combo";
    match (is_choice, parts.get(2), parts.get(3)) {
        (true, Some(options), Some(value)) if !value.is_empty() => {
            definition.field_type = FieldType::from_legacy(type_token);
            definition.options = options
                .split(',')
                .map(|option| PropertyOption {
                    name: capitalize(option),
                    value: option.to_string(),
                })
                .collect();
            definition.value = value.clone();
        }
        (false, Some(value), _) if !value.is_empty() => {
            definition.field_type = FieldType::from_legacy(type_token);
            definition.value = value.clone();
        }
        _ => definition.value = parts[0].clone(),
    }

    definition
}

/// Strips one pair of surrounding backticks and unescapes doubled backticks.
fn unquote(value: &str) -> String {
    let inner = if value.len() >= 2 && value.starts_with(ESCAPE) && value.ends_with(ESCAPE) {
        &value[1..value.len() - 1]
    } else {
        value
    };
    inner.replace("``", "`")
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_basic_property_string() {
        let props = parse_properties("&a=`1` &b=`two words`");
        assert_eq!(props.get("a"), Some("1"));
        assert_eq!(props.get("b"), Some("two words"));
        assert_eq!(props.len(), 2);
    }

    #[test]
    fn test_order_is_preserved() {
        let props = parse_properties("&z=`1` &a=`2` &m=`3`");
        let keys: Vec<_> = props.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["z", "a", "m"]);
    }

    #[test]
    fn test_delimiters_inside_backticks() {
        let props = parse_properties("&q=`a=b&c=d` &r=`x`");
        assert_eq!(props.get("q"), Some("a=b&c=d"));
        assert_eq!(props.get("r"), Some("x"));
    }

    #[test]
    fn test_doubled_backtick_unescapes() {
        let props = parse_properties("&code=`run ``ls`` now`");
        assert_eq!(props.get("code"), Some("run `ls` now"));
    }

    #[test]
    fn test_malformed_segments_are_skipped() {
        let props = parse_properties("&ok=`1` &novalue &a=b=c &=`x`");
        assert_eq!(props.len(), 1);
        assert_eq!(props.get("ok"), Some("1"));
    }

    #[test]
    fn test_unquoted_value() {
        let props = parse_properties("&plain=value");
        assert_eq!(props.get("plain"), Some("value"));
    }

    #[test]
    fn test_amp_prefix_is_stripped() {
        let props = parse_properties("&amp;encoded=`yes`");
        assert_eq!(props.get("encoded"), Some("yes"));
    }

    #[test]
    fn test_leading_question_mark_segment_is_ignored() {
        let props = parse_properties("? &test_prop3=`test_value3` &test_prop4=`test_value4`");
        assert_eq!(props.get("test_prop3"), Some("test_value3"));
        assert_eq!(props.get("test_prop4"), Some("test_value4"));
        assert_eq!(props.len(), 2);
    }

    #[test]
    fn test_legacy_typed_value() {
        let defs = parse_property_definitions("&limit=Max items;integer;10");
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].description, "Max items");
        assert_eq!(defs[0].field_type, FieldType::NumberField);
        assert_eq!(defs[0].value, "10");
    }

    #[test]
    fn test_legacy_list_value() {
        let defs = parse_property_definitions("&dir=Sort order;list;asc,desc;desc");
        assert_eq!(defs[0].field_type, FieldType::List);
        assert_eq!(
            defs[0].options,
            vec![
                PropertyOption { name: "Asc".into(), value: "asc".into() },
                PropertyOption { name: "Desc".into(), value: "desc".into() },
            ]
        );
        assert_eq!(defs[0].value, "desc");
        assert_eq!(parse_properties("&dir=Sort order;list;asc,desc;desc").get("dir"), Some("desc"));
    }

    #[test]
    fn test_legacy_without_value_keeps_description() {
        let defs = parse_property_definitions("&x=first;second");
        assert_eq!(defs[0].value, "first");
        assert_eq!(defs[0].field_type, FieldType::TextField);
    }

    #[test]
    fn test_semicolon_in_quoted_value_is_literal() {
        let props = parse_properties("&css=`color: red; margin: 0`");
        assert_eq!(props.get("css"), Some("color: red; margin: 0"));
    }

    #[test]
    fn test_legacy_type_mapping() {
        assert_eq!(FieldType::from_legacy("string"), FieldType::TextField);
        assert_eq!(FieldType::from_legacy("float"), FieldType::NumberField);
        assert_eq!(FieldType::from_legacy("boolean"), FieldType::Checkbox);
        assert_eq!(FieldType::from_legacy("radio"), FieldType::Radio);
        assert_eq!(FieldType::from_legacy("mystery"), FieldType::TextField);
    }

    #[test]
    fn test_merge_overwrites_in_place() {
        let mut base: Properties = [("a", "1"), ("b", "2")].into_iter().collect();
        let over: Properties = [("b", "20"), ("c", "3")].into_iter().collect();
        base.merge(&over);
        let pairs: Vec<_> = base.iter().collect();
        assert_eq!(pairs, vec![("a", "1"), ("b", "20"), ("c", "3")]);
    }

    #[test]
    fn test_to_property_string_parses_back() {
        let props: Properties = [("name", "a `b` c"), ("n", "1")].into_iter().collect();
        let s = props.to_property_string();
        assert_eq!(s, "name=`a ``b`` c`&n=`1`");
        assert_eq!(parse_properties(&s), props);
    }

    #[test]
    fn test_from_json_unwraps_records_and_flattens() {
        let props = Properties::from_json(&json!({
            "plain": "x",
            "record": {"name": "record", "value": "inner"},
            "nested": {"a": 1, "b": true},
            "skip": null
        }));
        assert_eq!(props.get("plain"), Some("x"));
        assert_eq!(props.get("record"), Some("inner"));
        assert_eq!(props.get("nested.a"), Some("1"));
        assert_eq!(props.get("nested.b"), Some("true"));
        assert!(!props.contains_key("skip"));
    }

    #[test]
    fn test_from_conversions() {
        let from_str: Properties = "&a=`1`".into();
        let from_json: Properties = (&json!({"a": "1"})).into();
        assert_eq!(from_str, from_json);
    }

    #[test]
    fn test_from_json_non_object_is_empty() {
        assert!(Properties::from_json(&json!("text")).is_empty());
    }
}
