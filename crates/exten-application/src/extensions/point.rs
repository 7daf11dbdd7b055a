//! Extension points
//!
//! An extension point is a unit definition plus a lifetime, an optional
//! default implementation and an optional hook run after resolution. Its
//! unit receives an `Arc<ExtensionContext>` and produces no output; the
//! implementation travels through the context's result slot.

use super::context::ExtensionContext;
use super::instance::Extension;
use exten_domain::ports::ServiceProvider;
use exten_domain::{Lifetime, Shape, UnitDefinition};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// Builds the default implementation of a point
pub type DefaultFactory = Arc<dyn Fn(&Arc<dyn ServiceProvider>) -> Extension + Send + Sync>;

/// Called with every freshly resolved instance
pub type ResolvedHook = Arc<dyn Fn(&Extension) + Send + Sync>;

/// Input shape of extension units
pub fn extension_input() -> Shape {
    Shape::of::<Arc<ExtensionContext>>()
}

/// Type-erased description of an extension point, shared by every registry
#[derive(Clone)]
pub struct PointDescriptor {
    definition: UnitDefinition,
    lifetime: Lifetime,
    required: bool,
    default_factory: Option<DefaultFactory>,
    default_lifecycle: bool,
    on_resolved: Option<ResolvedHook>,
    extension_type: &'static str,
    accepts: fn(&Extension) -> bool,
}

impl PointDescriptor {
    fn new(
        key: String,
        lifetime: Lifetime,
        extension_type: &'static str,
        accepts: fn(&Extension) -> bool,
    ) -> Self {
        let mut descriptor = Self {
            definition: UnitDefinition::new(key, extension_input(), Shape::unit()),
            lifetime,
            required: true,
            default_factory: None,
            default_lifecycle: false,
            on_resolved: None,
            extension_type,
            accepts,
        };
        descriptor.rebuild_definition();
        descriptor
    }

    /// A point is required only when it has no default to fall back on
    fn rebuild_definition(&mut self) {
        self.definition = UnitDefinition::with_flags(
            self.definition.key(),
            extension_input(),
            Shape::unit(),
            self.required && self.default_factory.is_none(),
            self.lifetime.is_cached(),
        );
    }

    pub fn definition(&self) -> &UnitDefinition {
        &self.definition
    }

    pub fn key(&self) -> &str {
        self.definition.key()
    }

    pub fn lifetime(&self) -> Lifetime {
        self.lifetime
    }

    /// Whether resolving without an implementation is an error
    pub fn is_required(&self) -> bool {
        self.definition.is_required()
    }

    pub fn has_default(&self) -> bool {
        self.default_factory.is_some()
    }

    /// Whether the default may attach lifecycle hooks
    pub fn default_has_lifecycle(&self) -> bool {
        self.default_lifecycle
    }

    /// Name of the capability type the point resolves to
    pub fn extension_type(&self) -> &'static str {
        self.extension_type
    }

    pub(crate) fn default_instance(&self, provider: &Arc<dyn ServiceProvider>) -> Option<Extension> {
        self.default_factory.as_ref().map(|factory| factory(provider))
    }

    pub(crate) fn notify_resolved(&self, extension: &Extension) {
        if let Some(hook) = &self.on_resolved {
            hook(extension);
        }
    }

    /// Whether `extension` holds this point's capability type
    pub fn accepts(&self, extension: &Extension) -> bool {
        (self.accepts)(extension)
    }
}

impl PartialEq for PointDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.definition == other.definition
    }
}

impl Eq for PointDescriptor {}

impl fmt::Debug for PointDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PointDescriptor")
            .field("key", &self.definition.key())
            .field("lifetime", &self.lifetime)
            .field("required", &self.is_required())
            .field("default", &self.default_factory.is_some())
            .field("extension_type", &self.extension_type)
            .finish()
    }
}

impl fmt::Display for PointDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.definition.key(), self.lifetime)
    }
}

/// Typed extension point resolving to `Arc<T>`
///
/// ```ignore
/// let greeter = ExtensionPoint::<dyn Greeter>::singleton("greeter")
///     .with_default(|_| Arc::new(PlainGreeter) as Arc<dyn Greeter>);
/// ```
pub struct ExtensionPoint<T: ?Sized> {
    descriptor: Arc<PointDescriptor>,
    _capability: PhantomData<fn() -> Arc<T>>,
}

impl<T> ExtensionPoint<T>
where
    T: ?Sized + Send + Sync + 'static,
{
    /// A required point with the given lifetime
    pub fn new<K: Into<String>>(key: K, lifetime: Lifetime) -> Self {
        Self {
            descriptor: Arc::new(PointDescriptor::new(
                key.into(),
                lifetime,
                std::any::type_name::<T>(),
                Extension::is::<T>,
            )),
            _capability: PhantomData,
        }
    }

    pub fn singleton<K: Into<String>>(key: K) -> Self {
        Self::new(key, Lifetime::Singleton)
    }

    pub fn scoped<K: Into<String>>(key: K) -> Self {
        Self::new(key, Lifetime::Scoped)
    }

    pub fn transient<K: Into<String>>(key: K) -> Self {
        Self::new(key, Lifetime::Transient)
    }

    fn update(mut self, change: impl FnOnce(&mut PointDescriptor)) -> Self {
        let mut descriptor = (*self.descriptor).clone();
        change(&mut descriptor);
        descriptor.rebuild_definition();
        self.descriptor = Arc::new(descriptor);
        self
    }

    /// Resolving without an implementation yields `None` instead of an error
    pub fn optional(self) -> Self {
        self.update(|d| d.required = false)
    }

    /// Use `factory` when no unit provides an implementation
    pub fn with_default<F>(self, factory: F) -> Self
    where
        F: Fn(&Arc<dyn ServiceProvider>) -> Arc<T> + Send + Sync + 'static,
    {
        self.update(|d| {
            d.default_factory = Some(Arc::new(move |provider: &Arc<dyn ServiceProvider>| {
                Extension::new(factory(provider))
            }));
            d.default_lifecycle = false;
        })
    }

    /// Always fall back to the same instance
    pub fn with_default_instance(self, instance: Arc<T>) -> Self {
        self.with_default(move |_| Arc::clone(&instance))
    }

    /// Default factory that can attach lifecycle hooks
    pub fn with_default_extension<F>(self, factory: F) -> Self
    where
        F: Fn(&Arc<dyn ServiceProvider>) -> Extension + Send + Sync + 'static,
    {
        self.update(|d| {
            d.default_factory = Some(Arc::new(factory));
            d.default_lifecycle = true;
        })
    }

    pub fn with_on_resolved<F>(self, hook: F) -> Self
    where
        F: Fn(&Arc<T>) + Send + Sync + 'static,
    {
        self.update(|d| {
            d.on_resolved = Some(Arc::new(move |extension: &Extension| {
                if let Some(instance) = extension.downcast::<T>() {
                    hook(&instance);
                }
            }));
        })
    }

    pub fn key(&self) -> &str {
        self.descriptor.key()
    }

    pub fn lifetime(&self) -> Lifetime {
        self.descriptor.lifetime()
    }

    pub fn definition(&self) -> &UnitDefinition {
        self.descriptor.definition()
    }

    pub fn is_required(&self) -> bool {
        self.descriptor.is_required()
    }

    pub fn has_default(&self) -> bool {
        self.descriptor.has_default()
    }

    /// Shared, type-erased view used by registries
    pub fn descriptor(&self) -> &Arc<PointDescriptor> {
        &self.descriptor
    }
}

impl<T: ?Sized> Clone for ExtensionPoint<T> {
    fn clone(&self) -> Self {
        Self {
            descriptor: Arc::clone(&self.descriptor),
            _capability: PhantomData,
        }
    }
}

impl<T: ?Sized> fmt::Debug for ExtensionPoint<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.descriptor, f)
    }
}

impl<T: ?Sized> AsRef<PointDescriptor> for ExtensionPoint<T> {
    fn as_ref(&self) -> &PointDescriptor {
        &self.descriptor
    }
}

impl AsRef<PointDescriptor> for PointDescriptor {
    fn as_ref(&self) -> &PointDescriptor {
        self
    }
}
