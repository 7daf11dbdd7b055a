//! Registry options and the shared catalog of registered points

use crate::extensions::{ExtensionPoint, PointDescriptor};
use exten_domain::UnitDefinition;
use std::sync::{Arc, PoisonError, RwLock};

/// Read-only inputs of the extension registries
#[derive(Debug, Clone, Default)]
pub struct RegistryOptions {
    /// Reject points that were not registered up front
    pub allow_only_preregistered_extensions: bool,
    /// Points registered up front
    pub points: Vec<Arc<PointDescriptor>>,
}

impl RegistryOptions {
    pub fn with_point<T>(mut self, point: &ExtensionPoint<T>) -> Self
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.points.push(Arc::clone(point.descriptor()));
        self
    }

    /// Only points registered so far may be resolved
    pub fn restricted(mut self) -> Self {
        self.allow_only_preregistered_extensions = true;
        self
    }

    /// Definitions of every registered point
    pub fn definitions(&self) -> Vec<UnitDefinition> {
        self.points
            .iter()
            .map(|point| point.definition().clone())
            .collect()
    }
}

/// Registered points, shared by the singleton and every scoped registry
#[derive(Debug)]
pub struct ExtensionCatalog {
    restricted: bool,
    points: RwLock<Vec<Arc<PointDescriptor>>>,
}

impl ExtensionCatalog {
    pub fn new(options: RegistryOptions) -> Self {
        Self {
            restricted: options.allow_only_preregistered_extensions,
            points: RwLock::new(options.points),
        }
    }

    pub fn is_restricted(&self) -> bool {
        self.restricted
    }

    pub fn contains(&self, point: &PointDescriptor) -> bool {
        self.points
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|registered| registered.definition() == point.definition())
    }

    /// Whether `point` may be resolved
    pub fn allows(&self, point: &PointDescriptor) -> bool {
        !self.restricted || self.contains(point)
    }

    /// Add a point; `false` when it was already registered
    pub(crate) fn insert(&self, point: Arc<PointDescriptor>) -> bool {
        let mut points = self.points.write().unwrap_or_else(PoisonError::into_inner);
        if points
            .iter()
            .any(|registered| registered.definition() == point.definition())
        {
            return false;
        }
        points.push(point);
        true
    }

    pub fn points(&self) -> Vec<Arc<PointDescriptor>> {
        self.points
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
