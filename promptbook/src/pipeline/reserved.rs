//! Parameter names every template can use without declaring them.

/// Names implicitly available to every template.
pub const RESERVED_PARAMETER_NAMES: [&str; 6] = [
    "content",
    "context",
    "knowledge",
    "examples",
    "modelName",
    "currentDate",
];

/// Value given to reserved parameters the engine cannot fill.
pub const RESERVED_PARAMETER_MISSING_VALUE: &str = "RESERVED_PARAMETER_MISSING_VALUE";

/// Returns true if `name` is reserved.
#[must_use]
pub fn is_reserved_parameter_name(name: &str) -> bool {
    RESERVED_PARAMETER_NAMES.contains(&name)
}
