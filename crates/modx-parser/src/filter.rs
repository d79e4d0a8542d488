//! Output filters.
//!
//! A tag name may end in a chain of filters that post-process the tag's
//! output:
//!
//! ```text
//! [[+status:is=`a`:then=`yes`:else=`no`]]
//! [[+title:default=`Untitled`]]
//! [[+slug:replace=`{" ": "-"}`]]
//! ```
//!
//! Each filter is `:method`, optionally followed by `` =`argument` ``. An
//! argument ends at a backtick that is followed by the next `:method` or by
//! the end of the name, so arguments may contain backticks and colons.
//!
//! Filters run strictly left to right against one [`Filter`], which carries
//! the tri-state condition set by `is`/`isnot` and consumed by
//! `then`/`else`.
//!
//! | Method | Effect |
//! |--------|--------|
//! | `is` | condition = input equals the argument |
//! | `isnot` | condition = input differs from the argument |
//! | `then` | if the condition is true, output the argument and clear the condition |
//! | `else`, `otherwise` | if the condition is false, output the argument and clear the condition |
//! | `default`, `isempty` | if the input is empty, output the argument |
//! | `notempty` | if the input is not empty, output the argument |
//! | `trim` | trim whitespace, or the argument's characters |
//! | `replace` | apply a JSON `{"search": "replacement"}` map |
//!
//! Unknown methods are logged and skipped.

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::warn;

use crate::placeholders::scalar_to_string;
use crate::replace::replace_all;

/// Filter methods understood by [`Filter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMethod {
    Is,
    IsNot,
    Then,
    Else,
    Default,
    NotEmpty,
    Trim,
    Replace,
}

impl FilterMethod {
    /// Looks up a method by its name in tag syntax.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "is" => Some(FilterMethod::Is),
            "isnot" => Some(FilterMethod::IsNot),
            "then" => Some(FilterMethod::Then),
            "else" | "otherwise" => Some(FilterMethod::Else),
            "default" | "isempty" => Some(FilterMethod::Default),
            "notempty" => Some(FilterMethod::NotEmpty),
            "trim" => Some(FilterMethod::Trim),
            "replace" => Some(FilterMethod::Replace),
            _ => None,
        }
    }
}

/// Decoded filter argument.
///
/// An argument that decodes to a JSON object is used as a key/value map, and
/// a JSON list as a map keyed by index. Any other argument, valid JSON or
/// not, is kept verbatim under the `value` key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterArgs {
    entries: BTreeMap<String, String>,
    mapping: bool,
}

impl FilterArgs {
    /// Decodes a raw argument string.
    pub fn parse(raw: &str) -> Self {
        let mut entries = BTreeMap::new();
        let mut mapping = false;
        match serde_json::from_str::<Value>(raw.trim()) {
            Ok(Value::Object(map)) => {
                mapping = true;
                for (key, value) in map {
                    entries.insert(key, entry_text(&value));
                }
            }
            Ok(Value::Array(items)) => {
                mapping = true;
                for (i, value) in items.iter().enumerate() {
                    entries.insert(i.to_string(), entry_text(value));
                }
            }
            _ => {
                entries.insert("value".to_string(), raw.to_string());
            }
        }
        Self { entries, mapping }
    }

    /// True when the argument was a JSON object or list.
    pub fn is_mapping(&self) -> bool {
        self.mapping
    }

    /// The `value` entry, if any.
    pub fn value(&self) -> Option<&str> {
        self.get("value")
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Iterates over all entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

fn entry_text(value: &Value) -> String {
    match value {
        Value::Array(_) | Value::Object(_) => value.to_string(),
        scalar => scalar_to_string(scalar).unwrap_or_default(),
    }
}

/// One `:method=`argument`` entry of a filter chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterStep {
    /// Method name as written.
    pub method: String,
    /// Raw argument text, without the surrounding backticks.
    pub argument: String,
}

/// The parsed filter suffix of a tag name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterChain {
    steps: Vec<FilterStep>,
}

impl FilterChain {
    /// Splits a tag name into its bare name and its filter chain.
    ///
    /// The suffix starts at the first `:` that is not the very first
    /// character.
    ///
    /// ```rust
    /// use modx_parser::FilterChain;
    ///
    /// let (name, chain) = FilterChain::split_name("status:is=`a`:then=`yes`");
    /// assert_eq!(name, "status");
    /// assert_eq!(chain.len(), 2);
    /// ```
    pub fn split_name(name: &str) -> (&str, FilterChain) {
        match name.find(':') {
            Some(pos) if pos > 0 => (&name[..pos], FilterChain::parse(&name[pos..])),
            _ => (name, FilterChain::default()),
        }
    }

    /// Parses a `:method=`arg`:method2` suffix.
    pub fn parse(modifiers: &str) -> Self {
        let bytes = modifiers.as_bytes();
        let mut steps = Vec::new();
        let mut pos = 0;

        while let Some(found) = modifiers[pos..].find(':') {
            let method_start = pos + found + 1;
            let method_end = modifiers[method_start..]
                .find(|c: char| c == ':' || c == '=')
                .map_or(modifiers.len(), |i| method_start + i);
            if method_end == method_start {
                pos = method_start;
                continue;
            }

            let mut step = FilterStep {
                method: modifiers[method_start..method_end].to_string(),
                argument: String::new(),
            };
            pos = method_end;

            if modifiers[method_end..].starts_with("=`") {
                let arg_start = method_end + 2;
                if let Some(arg_end) = find_argument_end(bytes, arg_start) {
                    step.argument = modifiers[arg_start..arg_end].to_string();
                    pos = arg_end + 1;
                }
            }
            steps.push(step);
        }

        Self { steps }
    }

    pub fn steps(&self) -> &[FilterStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Runs the chain against `input` with a fresh [`Filter`].
    pub fn apply(&self, input: &str) -> String {
        let mut filter = Filter::new();
        let mut output = input.to_string();
        for step in &self.steps {
            filter.apply(&step.method, &mut output, &step.argument);
        }
        output
    }
}

/// Finds the closing backtick of an argument starting at `from`.
///
/// The closing backtick is the first one followed by the end of input, or by
/// a `:` and at least one character that is neither `:` nor `=`.
fn find_argument_end(bytes: &[u8], from: usize) -> Option<usize> {
    (from..bytes.len()).find(|&i| {
        bytes[i] == b'`'
            && match bytes.get(i + 1) {
                None => true,
                Some(b':') => matches!(bytes.get(i + 2), Some(&c) if c != b':' && c != b'='),
                Some(_) => false,
            }
    })
}

/// Filter state for one tag's chain.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    condition: Option<bool>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// The current condition: `None` when unset.
    pub fn condition(&self) -> Option<bool> {
        self.condition
    }

    /// Applies one method to `input` in place.
    ///
    /// Methods that need an argument value do nothing without one. Unknown
    /// methods are skipped with a warning.
    pub fn apply(&mut self, method: &str, input: &mut String, raw_args: &str) {
        let Some(known) = FilterMethod::from_name(method) else {
            warn!(method, "unknown filter method, skipping");
            return;
        };
        let args = FilterArgs::parse(raw_args);

        match known {
            FilterMethod::Is => {
                if let Some(value) = args.value() {
                    self.condition = Some(input == value);
                }
            }
            FilterMethod::IsNot => {
                if let Some(value) = args.value() {
                    self.condition = Some(input != value);
                }
            }
            FilterMethod::Then => self.resolve_condition(true, input, &args),
            FilterMethod::Else => self.resolve_condition(false, input, &args),
            FilterMethod::Default => {
                if let Some(value) = args.value().filter(|_| input.is_empty()) {
                    *input = value.to_string();
                }
            }
            FilterMethod::NotEmpty => {
                if let Some(value) = args.value().filter(|_| !input.is_empty()) {
                    *input = value.to_string();
                }
            }
            FilterMethod::Trim => {
                *input = match args.value().filter(|v| !v.is_empty()) {
                    Some(chars) => input.trim_matches(|c: char| chars.contains(c)).to_string(),
                    None => input.trim().to_string(),
                };
            }
            FilterMethod::Replace if args.is_mapping() => {
                let pairs: Vec<(&str, &str)> = args.iter().collect();
                *input = replace_all(input, &pairs);
            }
            FilterMethod::Replace => {}
        }
    }

    fn resolve_condition(&mut self, wanted: bool, input: &mut String, args: &FilterArgs) {
        if self.condition != Some(wanted) {
            return;
        }
        if let Some(value) = args.value() {
            *input = value.to_string();
            self.condition = None;
        }
    }
}
