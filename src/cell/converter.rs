//! Member converters keyed by dimension role

use super::cut::Path;
use crate::model::{Dimension, DimensionRole, Hierarchy};
use std::collections::HashMap;
use std::sync::Arc;

/// Translates symbolic member expressions into concrete member paths
pub trait MemberConverter: Send + Sync {
    /// Convert a path parsed from a cut string
    ///
    /// Paths the converter does not understand must be returned unchanged.
    fn convert(&self, dimension: &Dimension, hierarchy: &Hierarchy, path: Path) -> Path;
}

/// Converter that leaves paths untouched
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityConverter;

impl MemberConverter for IdentityConverter {
    fn convert(&self, _dimension: &Dimension, _hierarchy: &Hierarchy, path: Path) -> Path {
        path
    }
}

static IDENTITY: IdentityConverter = IdentityConverter;

/// Converter registry keyed by dimension role
#[derive(Clone, Default)]
pub struct RoleConverters {
    converters: HashMap<DimensionRole, Arc<dyn MemberConverter>>,
}

impl RoleConverters {
    /// Registry without any converters
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a converter for a role
    pub fn with_converter<C>(mut self, role: DimensionRole, converter: C) -> Self
    where
        C: MemberConverter + 'static,
    {
        self.converters.insert(role, Arc::new(converter));
        self
    }

    /// Converter for a role; roles without a registered converter get the identity
    pub fn get(&self, role: DimensionRole) -> &dyn MemberConverter {
        match self.converters.get(&role) {
            Some(converter) => converter.as_ref(),
            None => &IDENTITY,
        }
    }

    /// True when a converter is registered for the role
    pub fn contains(&self, role: DimensionRole) -> bool {
        self.converters.contains_key(&role)
    }
}

impl std::fmt::Debug for RoleConverters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoleConverters")
            .field("roles", &self.converters.keys().collect::<Vec<_>>())
            .finish()
    }
}
