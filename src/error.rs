//! Error types for service resolution

use crate::key::Name;
use thiserror::Error;

/// Errors that can occur while resolving a service
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DiError {
    /// No registration exists for the requested type and name, neither in the
    /// container nor in any of its children
    #[error("Service not registered: {type_name}:{}", display_name(.name))]
    NotFound {
        type_name: &'static str,
        name: Option<Name>,
    },

    /// A registration exists but its factory produced no instance
    #[error("Service not resolved, factory produced no instance: {type_name}:{}", display_name(.name))]
    Declined {
        type_name: &'static str,
        name: Option<Name>,
    },
}

fn display_name(name: &Option<Name>) -> &str {
    name.as_ref().map(Name::as_str).unwrap_or(Name::NONE)
}

impl DiError {
    /// Create a NotFound error for a type
    #[inline]
    pub fn not_found<T: ?Sized + 'static>(name: Option<&str>) -> Self {
        Self::NotFound {
            type_name: std::any::type_name::<T>(),
            name: name.map(Name::from),
        }
    }

    /// Create a Declined error for a type
    #[inline]
    pub fn declined<T: ?Sized + 'static>(name: Option<&str>) -> Self {
        Self::Declined {
            type_name: std::any::type_name::<T>(),
            name: name.map(Name::from),
        }
    }

    /// Type name of the service that could not be resolved
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::NotFound { type_name, .. } | Self::Declined { type_name, .. } => type_name,
        }
    }

    /// Registration name that was requested, if any
    pub fn name(&self) -> Option<&Name> {
        match self {
            Self::NotFound { name, .. } | Self::Declined { name, .. } => name.as_ref(),
        }
    }
}

/// Result type alias for resolution
pub type Result<T> = std::result::Result<T, DiError>;
