//! Error types for method dispatch.

use super::ty::Ty;

/// Error types for method dispatch.
///
/// Messages are rendered at construction time (type names need the lattice),
/// while the raw argument types are kept for exception-value conversion.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchError {
    /// No method found matching the given argument types.
    NoMethodFound {
        name: String,
        arg_types: Vec<Ty>,
        message: String,
    },
    /// Multiple applicable methods are incomparable maxima of the
    /// specificity order.
    AmbiguousMethod {
        name: String,
        arg_types: Vec<Ty>,
        message: String,
    },
}

impl DispatchError {
    pub fn function_name(&self) -> &str {
        match self {
            Self::NoMethodFound { name, .. } | Self::AmbiguousMethod { name, .. } => name,
        }
    }

    pub fn arg_types(&self) -> &[Ty] {
        match self {
            Self::NoMethodFound { arg_types, .. } | Self::AmbiguousMethod { arg_types, .. } => {
                arg_types
            }
        }
    }
}

impl std::fmt::Display for DispatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoMethodFound { message, .. } | Self::AmbiguousMethod { message, .. } => {
                write!(f, "{}", message)
            }
        }
    }
}

impl std::error::Error for DispatchError {}
