//! Host object model surface.
//!
//! [`HostEnv`] exposes the managed host runtime to the converter: type tests,
//! unboxing, list/iterator/array accessors, throwable inspection, identity
//! comparison and local reference release. [`heap`] is an in-process host
//! model implementing it.

pub mod fixture;
pub mod heap;

use std::ops::Deref;

use crate::error::BridgeResult;

pub use fixture::{FixtureEntry, HostFixture};
pub use heap::{HostHeap, HostLocal, HostRef, StackFrame};

/// Result type alias for host accessors
pub type HostResult<T> = BridgeResult<T>;

/// Host classes the dispatcher tests for, in no particular order.
///
/// See [`DISPATCH_ORDER`] for the precedence used during conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostClass {
    Boolean,
    Integer,
    Long,
    Float,
    Double,
    String,
    List,
    /// Map restricted to string keys; also an instance of [`HostClass::Map`]
    StringKeyedObject,
    Map,
    Set,
    Throwable,
}

/// Type-test precedence of the dispatcher. First match wins.
///
/// `StringKeyedObject` precedes `Map` so its narrower contract applies to
/// values implementing both.
pub const DISPATCH_ORDER: [HostClass; 11] = [
    HostClass::Boolean,
    HostClass::Integer,
    HostClass::Long,
    HostClass::Float,
    HostClass::Double,
    HostClass::String,
    HostClass::List,
    HostClass::StringKeyedObject,
    HostClass::Map,
    HostClass::Set,
    HostClass::Throwable,
];

/// Element kind of a primitive host array
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    Boolean,
    Int,
    Long,
    Float,
    Double,
}

impl PrimitiveKind {
    /// Map a JVM array descriptor (`[Z`, `[I`, `[J`, `[F`, `[D`) to its kind
    pub fn from_descriptor(descriptor: &str) -> Option<Self> {
        match descriptor {
            "[Z" => Some(Self::Boolean),
            "[I" => Some(Self::Int),
            "[J" => Some(Self::Long),
            "[F" => Some(Self::Float),
            "[D" => Some(Self::Double),
            _ => None,
        }
    }

    /// JVM array descriptor of this kind
    pub fn descriptor(self) -> &'static str {
        match self {
            Self::Boolean => "[Z",
            Self::Int => "[I",
            Self::Long => "[J",
            Self::Float => "[F",
            Self::Double => "[D",
        }
    }
}

/// Contents of a primitive host array, read in one bulk access
#[derive(Debug, Clone, PartialEq)]
pub enum PrimitiveArray {
    Boolean(Vec<bool>),
    Int(Vec<i32>),
    Long(Vec<i64>),
    Float(Vec<f32>),
    Double(Vec<f64>),
}

impl PrimitiveArray {
    pub fn kind(&self) -> PrimitiveKind {
        match self {
            Self::Boolean(_) => PrimitiveKind::Boolean,
            Self::Int(_) => PrimitiveKind::Int,
            Self::Long(_) => PrimitiveKind::Long,
            Self::Float(_) => PrimitiveKind::Float,
            Self::Double(_) => PrimitiveKind::Double,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Boolean(v) => v.len(),
            Self::Int(v) => v.len(),
            Self::Long(v) => v.len(),
            Self::Float(v) => v.len(),
            Self::Double(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Accessor API of a managed host runtime.
///
/// Every method returning a `Local` hands out a new local reference that the
/// caller must give back through [`HostEnv::delete_local_ref`]. Wrap it in a
/// [`LocalRef`] to have that happen on every exit path. `None` stands for
/// the host `null`.
pub trait HostEnv {
    /// Transient local reference to a host object
    type Local;

    /// Runtime type test ("is `value` an instance of `class`")
    fn is_instance_of(&self, value: &Self::Local, class: HostClass) -> HostResult<bool>;

    /// Runtime class name, e.g. `java.util.ArrayList` or `[I`
    fn class_name(&self, value: &Self::Local) -> HostResult<String>;

    /// Identity comparison, not equality
    fn is_same_object(&self, a: &Self::Local, b: &Self::Local) -> HostResult<bool>;

    fn boolean_value(&self, value: &Self::Local) -> HostResult<bool>;

    fn int_value(&self, value: &Self::Local) -> HostResult<i32>;

    fn long_value(&self, value: &Self::Local) -> HostResult<i64>;

    fn float_value(&self, value: &Self::Local) -> HostResult<f32>;

    fn double_value(&self, value: &Self::Local) -> HostResult<f64>;

    /// Contents of a host string as UTF-8
    fn string_value(&self, value: &Self::Local) -> HostResult<String>;

    fn list_size(&self, list: &Self::Local) -> HostResult<u32>;

    fn list_get(&self, list: &Self::Local, index: u32) -> HostResult<Option<Self::Local>>;

    /// Iterator over the members of a set
    fn set_iterator(&self, set: &Self::Local) -> HostResult<Self::Local>;

    /// Iterator over the entries of a map
    fn map_entry_iterator(&self, map: &Self::Local) -> HostResult<Self::Local>;

    fn iterator_has_next(&self, iterator: &Self::Local) -> HostResult<bool>;

    fn iterator_next(&self, iterator: &Self::Local) -> HostResult<Option<Self::Local>>;

    fn entry_key(&self, entry: &Self::Local) -> HostResult<Option<Self::Local>>;

    fn entry_value(&self, entry: &Self::Local) -> HostResult<Option<Self::Local>>;

    fn array_length(&self, array: &Self::Local) -> HostResult<u32>;

    fn array_element(&self, array: &Self::Local, index: u32) -> HostResult<Option<Self::Local>>;

    /// Read a whole primitive array of the given kind
    fn primitive_array(&self, array: &Self::Local, kind: PrimitiveKind)
    -> HostResult<PrimitiveArray>;

    /// Detail message of a throwable, if any
    fn throwable_message(&self, throwable: &Self::Local) -> HostResult<Option<String>>;

    /// Stack trace of a throwable as an object array of frames, innermost first
    fn throwable_stack_trace(&self, throwable: &Self::Local) -> HostResult<Self::Local>;

    /// Default human-readable text form of a host object
    fn display_string(&self, value: &Self::Local) -> HostResult<String>;

    /// Release a local reference
    fn delete_local_ref(&self, local: Self::Local);
}

/// Scoped local reference.
///
/// Releases the wrapped reference through [`HostEnv::delete_local_ref`] when
/// dropped, including on early `?` returns.
pub struct LocalRef<'e, E: HostEnv + ?Sized> {
    env: &'e E,
    local: Option<E::Local>,
}

impl<'e, E: HostEnv + ?Sized> LocalRef<'e, E> {
    /// Take ownership of a local reference
    pub fn new(env: &'e E, local: E::Local) -> Self {
        Self {
            env,
            local: Some(local),
        }
    }

    /// Take ownership of a nullable local reference
    pub fn adopt(env: &'e E, local: Option<E::Local>) -> Option<Self> {
        local.map(|local| Self::new(env, local))
    }

    /// Give the reference back without releasing it
    pub fn into_inner(mut self) -> E::Local {
        match self.local.take() {
            Some(local) => local,
            None => unreachable!("LocalRef holds its reference until dropped"),
        }
    }
}

impl<E: HostEnv + ?Sized> Deref for LocalRef<'_, E> {
    type Target = E::Local;

    fn deref(&self) -> &E::Local {
        match &self.local {
            Some(local) => local,
            None => unreachable!("LocalRef holds its reference until dropped"),
        }
    }
}

impl<E: HostEnv + ?Sized> Drop for LocalRef<'_, E> {
    fn drop(&mut self) {
        if let Some(local) = self.local.take() {
            self.env.delete_local_ref(local);
        }
    }
}
