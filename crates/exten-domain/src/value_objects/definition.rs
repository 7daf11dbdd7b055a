//! Unit definitions and shapes
//!
//! A [`UnitDefinition`] is the identity of a script unit and the cache key
//! used by every layer of the engine.

use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Type token describing the input or output shape of a unit
///
/// Shapes are compared by [`TypeId`]; the name is kept for diagnostics.
#[derive(Clone, Copy)]
pub struct Shape {
    id: TypeId,
    name: &'static str,
}

impl Shape {
    /// Shape of the Rust type `T`
    pub fn of<T: Any + ?Sized>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// Shape of units that produce no value
    pub fn unit() -> Self {
        Self::of::<()>()
    }

    /// The underlying type id
    pub fn type_id(&self) -> TypeId {
        self.id
    }

    /// Human readable type name
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Whether this shape describes `T`
    pub fn is<T: Any + ?Sized>(&self) -> bool {
        self.id == TypeId::of::<T>()
    }
}

impl PartialEq for Shape {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Shape {}

impl Hash for Shape {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

#[derive(Debug)]
struct DefinitionInner {
    key: String,
    input: Shape,
    output: Shape,
    required: bool,
    cacheable: bool,
}

/// Immutable identity of a script unit
///
/// Equality and hashing cover the key, both shapes and the `required` flag.
/// `cacheable` is a caching policy and does not take part in identity, so an
/// extension point and a plain definition with the same key and shapes name
/// the same cached unit. Cloning is cheap.
#[derive(Clone)]
pub struct UnitDefinition {
    inner: Arc<DefinitionInner>,
}

impl UnitDefinition {
    /// Create a cacheable, optional definition
    pub fn new<K: Into<String>>(key: K, input: Shape, output: Shape) -> Self {
        Self::with_flags(key, input, output, false, true)
    }

    /// Create a definition with explicit `required` and `cacheable` flags
    pub fn with_flags<K: Into<String>>(
        key: K,
        input: Shape,
        output: Shape,
        required: bool,
        cacheable: bool,
    ) -> Self {
        Self {
            inner: Arc::new(DefinitionInner {
                key: key.into(),
                input,
                output,
                required,
                cacheable,
            }),
        }
    }

    /// Typed constructor: `I` is the input shape, `O` the output shape
    pub fn typed<I: Any, O: Any, K: Into<String>>(key: K) -> Self {
        Self::new(key, Shape::of::<I>(), Shape::of::<O>())
    }

    /// Copy of this definition with a different `required` flag
    pub fn required(&self, required: bool) -> Self {
        Self::with_flags(
            self.key(),
            self.inner.input,
            self.inner.output,
            required,
            self.inner.cacheable,
        )
    }

    /// Copy of this definition with a different `cacheable` flag
    pub fn cacheable(&self, cacheable: bool) -> Self {
        Self::with_flags(
            self.key(),
            self.inner.input,
            self.inner.output,
            self.inner.required,
            cacheable,
        )
    }

    pub fn key(&self) -> &str {
        &self.inner.key
    }

    pub fn input(&self) -> Shape {
        self.inner.input
    }

    pub fn output(&self) -> Shape {
        self.inner.output
    }

    pub fn is_required(&self) -> bool {
        self.inner.required
    }

    pub fn is_cacheable(&self) -> bool {
        self.inner.cacheable
    }
}

impl PartialEq for UnitDefinition {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
            || (self.inner.key == other.inner.key
                && self.inner.input == other.inner.input
                && self.inner.output == other.inner.output
                && self.inner.required == other.inner.required)
    }
}

impl Eq for UnitDefinition {}

impl Hash for UnitDefinition {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.key.hash(state);
        self.inner.input.hash(state);
        self.inner.output.hash(state);
        self.inner.required.hash(state);
    }
}

impl fmt::Debug for UnitDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnitDefinition")
            .field("key", &self.inner.key)
            .field("input", &self.inner.input)
            .field("output", &self.inner.output)
            .field("required", &self.inner.required)
            .field("cacheable", &self.inner.cacheable)
            .finish()
    }
}

impl fmt::Display for UnitDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.inner.key)
    }
}
