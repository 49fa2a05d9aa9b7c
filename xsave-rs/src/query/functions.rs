//! Provides case-insensitive string functions for the filter language.
//!
//! Filtering itself is performed by an external expression evaluator. These functions are
//! registered with it so that filters like `contains_i(name, "horizon")` work on the plain JSON
//! data of a collection. Transformations pass non-string values through unchanged, predicates
//! yield **false** for them.
//!
//! # Example
//! ```
//! # use serde_json::json;
//! # use xsave::query::functions::{call, FUNCTION_NAMES};
//! assert_eq!(call("to_upper", &[json!("Argon")]).unwrap(), json!("ARGON"));
//! assert_eq!(call("starts_with_i", &[json!("Blue Horizon"), json!("blue")]).unwrap(), json!(true));
//! assert_eq!(call("trim", &[json!(42)]).unwrap(), json!(42));
//! assert!(call("unknown", &[]).is_err());
//! assert_eq!(FUNCTION_NAMES.len(), 6);
//! ```
use serde_json::Value;

/// Represents a function which can be registered with the filter language.
pub type StringFunction = fn(&[Value]) -> anyhow::Result<Value>;

/// Lists the names of all provided functions.
pub const FUNCTION_NAMES: [&str; 6] = [
    "to_lower",
    "to_upper",
    "trim",
    "contains_i",
    "starts_with_i",
    "ends_with_i",
];

/// Describes an evaluator which accepts additional functions.
pub trait FunctionRegistry {
    /// Makes the given function available under the given name.
    fn register_function(&mut self, name: &'static str, function: StringFunction);
}

/// Registers all string functions with the given registry.
pub fn register_string_functions(registry: &mut dyn FunctionRegistry) {
    for name in FUNCTION_NAMES {
        if let Some(function) = lookup(name) {
            registry.register_function(name, function);
        }
    }
}

/// Resolves a function by its name.
pub fn lookup(name: &str) -> Option<StringFunction> {
    match name {
        "to_lower" => Some(to_lower),
        "to_upper" => Some(to_upper),
        "trim" => Some(trim),
        "contains_i" => Some(contains_i),
        "starts_with_i" => Some(starts_with_i),
        "ends_with_i" => Some(ends_with_i),
        _ => None,
    }
}

/// Invokes the function with the given name.
pub fn call(name: &str, arguments: &[Value]) -> anyhow::Result<Value> {
    match lookup(name) {
        Some(function) => function(arguments),
        None => Err(anyhow::anyhow!("Unknown function: {}", name)),
    }
}

fn expect_arguments(name: &str, arguments: &[Value], expected: usize) -> anyhow::Result<()> {
    if arguments.len() != expected {
        anyhow::bail!(
            "{} expects {} arguments but {} were given",
            name,
            expected,
            arguments.len()
        );
    }

    Ok(())
}

fn transform(
    name: &str,
    arguments: &[Value],
    transformer: impl Fn(&str) -> String,
) -> anyhow::Result<Value> {
    expect_arguments(name, arguments, 1)?;
    match &arguments[0] {
        Value::String(value) => Ok(Value::String(transformer(value))),
        other => Ok(other.clone()),
    }
}

fn predicate(
    name: &str,
    arguments: &[Value],
    test: impl Fn(&str, &str) -> bool,
) -> anyhow::Result<Value> {
    expect_arguments(name, arguments, 2)?;
    match (&arguments[0], &arguments[1]) {
        (Value::String(value), Value::String(pattern)) => Ok(Value::Bool(test(
            &value.to_lowercase(),
            &pattern.to_lowercase(),
        ))),
        _ => Ok(Value::Bool(false)),
    }
}

fn to_lower(arguments: &[Value]) -> anyhow::Result<Value> {
    transform("to_lower", arguments, str::to_lowercase)
}

fn to_upper(arguments: &[Value]) -> anyhow::Result<Value> {
    transform("to_upper", arguments, str::to_uppercase)
}

fn trim(arguments: &[Value]) -> anyhow::Result<Value> {
    transform("trim", arguments, |value| value.trim().to_owned())
}

fn contains_i(arguments: &[Value]) -> anyhow::Result<Value> {
    predicate("contains_i", arguments, |value, pattern| value.contains(pattern))
}

fn starts_with_i(arguments: &[Value]) -> anyhow::Result<Value> {
    predicate("starts_with_i", arguments, |value, pattern| {
        value.starts_with(pattern)
    })
}

fn ends_with_i(arguments: &[Value]) -> anyhow::Result<Value> {
    predicate("ends_with_i", arguments, |value, pattern| value.ends_with(pattern))
}
