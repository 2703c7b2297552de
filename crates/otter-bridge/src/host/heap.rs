//! In-process host object model.
//!
//! `HostHeap` is an arena of boxed primitives, strings, collections, arrays
//! and throwables with JVM-style class names. Objects are addressed by
//! [`HostRef`]; the converter only ever sees [`HostLocal`] handles, which are
//! counted so that callers can check every acquired reference was released.

use std::cell::{Cell, RefCell};
use std::fmt;

use rustc_hash::FxHashSet;
use serde::Deserialize;

use super::{HostClass, HostEnv, HostResult, PrimitiveArray, PrimitiveKind};
use crate::error::BridgeError;

/// Class name of the string-keyed object delegate
pub const STRING_KEYED_CLASS: &str = "otter.bridge.JsObject";
/// Class name of generic object arrays
pub const OBJECT_ARRAY_CLASS: &str = "[Ljava.lang.Object;";
/// Class name of the "no value" unit type
pub const UNIT_CLASS: &str = "kotlin.Unit";

const LIST_CLASS: &str = "java.util.ArrayList";
const SET_CLASS: &str = "java.util.LinkedHashSet";
const MAP_CLASS: &str = "java.util.LinkedHashMap";

/// Identity of an object in a [`HostHeap`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HostRef(u32);

impl HostRef {
    pub fn index(self) -> u32 {
        self.0
    }
}

/// Local reference handed out by a [`HostHeap`].
///
/// Not `Clone`: each handle is released exactly once.
#[derive(Debug)]
pub struct HostLocal {
    target: HostRef,
    slot: u64,
}

impl HostLocal {
    /// Object this reference points to
    pub fn target(&self) -> HostRef {
        self.target
    }
}

/// One frame of a host stack trace
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StackFrame {
    pub class_name: String,
    pub method: String,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub line: Option<u32>,
}

impl StackFrame {
    pub fn new(
        class_name: impl Into<String>,
        method: impl Into<String>,
        file: Option<&str>,
        line: Option<u32>,
    ) -> Self {
        Self {
            class_name: class_name.into(),
            method: method.into(),
            file: file.map(str::to_string),
            line,
        }
    }
}

impl fmt::Display for StackFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.class_name, self.method)?;
        match (&self.file, self.line) {
            (Some(file), Some(line)) => write!(f, "({}:{})", file, line),
            (Some(file), None) => write!(f, "({})", file),
            (None, _) => write!(f, "(Unknown Source)"),
        }
    }
}

#[derive(Debug)]
enum HostObject {
    Boolean(bool),
    Integer(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Str(String),
    List {
        class: String,
        items: Vec<Option<HostRef>>,
    },
    Set {
        class: String,
        members: Vec<Option<HostRef>>,
    },
    /// Entries are `Entry` objects, in insertion order
    Map {
        class: String,
        entries: Vec<HostRef>,
    },
    StringKeyed {
        entries: Vec<HostRef>,
    },
    Entry {
        key: Option<HostRef>,
        value: Option<HostRef>,
    },
    Iterator {
        items: Vec<Option<HostRef>>,
        cursor: usize,
    },
    Throwable {
        class: String,
        message: Option<String>,
        stack_trace: HostRef,
    },
    Frame(StackFrame),
    Primitive(PrimitiveArray),
    ObjectArray {
        class: String,
        items: Vec<Option<HostRef>>,
    },
    Unit,
    Opaque {
        class: String,
    },
}

impl HostObject {
    fn class_name(&self) -> String {
        match self {
            Self::Boolean(_) => "java.lang.Boolean".into(),
            Self::Integer(_) => "java.lang.Integer".into(),
            Self::Long(_) => "java.lang.Long".into(),
            Self::Float(_) => "java.lang.Float".into(),
            Self::Double(_) => "java.lang.Double".into(),
            Self::Str(_) => "java.lang.String".into(),
            Self::List { class, .. }
            | Self::Set { class, .. }
            | Self::Map { class, .. }
            | Self::Throwable { class, .. }
            | Self::ObjectArray { class, .. }
            | Self::Opaque { class } => class.clone(),
            Self::StringKeyed { .. } => STRING_KEYED_CLASS.into(),
            Self::Entry { .. } => "java.util.LinkedHashMap$Entry".into(),
            Self::Iterator { .. } => "java.util.LinkedHashMap$LinkedIterator".into(),
            Self::Frame(_) => "java.lang.StackTraceElement".into(),
            Self::Primitive(array) => array.kind().descriptor().into(),
            Self::Unit => UNIT_CLASS.into(),
        }
    }

    fn is_instance_of(&self, class: HostClass) -> bool {
        matches!(
            (class, self),
            (HostClass::Boolean, Self::Boolean(_))
                | (HostClass::Integer, Self::Integer(_))
                | (HostClass::Long, Self::Long(_))
                | (HostClass::Float, Self::Float(_))
                | (HostClass::Double, Self::Double(_))
                | (HostClass::String, Self::Str(_))
                | (HostClass::List, Self::List { .. })
                | (HostClass::StringKeyedObject, Self::StringKeyed { .. })
                | (HostClass::Map, Self::Map { .. } | Self::StringKeyed { .. })
                | (HostClass::Set, Self::Set { .. })
                | (HostClass::Throwable, Self::Throwable { .. })
        )
    }
}

/// Arena-backed host object model implementing [`HostEnv`].
///
/// All methods take `&self`; the heap is single-threaded like the runtime
/// thread it stands in for.
pub struct HostHeap {
    objects: RefCell<Vec<HostObject>>,
    locals: RefCell<FxHashSet<u64>>,
    next_slot: Cell<u64>,
    faulty: RefCell<FxHashSet<HostRef>>,
    unit: HostRef,
}

impl Default for HostHeap {
    fn default() -> Self {
        Self::new()
    }
}

impl HostHeap {
    pub fn new() -> Self {
        Self {
            objects: RefCell::new(vec![HostObject::Unit]),
            locals: RefCell::new(FxHashSet::default()),
            next_slot: Cell::new(0),
            faulty: RefCell::new(FxHashSet::default()),
            unit: HostRef(0),
        }
    }

    fn alloc(&self, object: HostObject) -> HostRef {
        let mut objects = self.objects.borrow_mut();
        let id = HostRef(objects.len() as u32);
        objects.push(object);
        id
    }

    /// Number of allocated host objects
    pub fn object_count(&self) -> usize {
        self.objects.borrow().len()
    }

    pub fn boolean(&self, value: bool) -> HostRef {
        self.alloc(HostObject::Boolean(value))
    }

    pub fn integer(&self, value: i32) -> HostRef {
        self.alloc(HostObject::Integer(value))
    }

    pub fn long(&self, value: i64) -> HostRef {
        self.alloc(HostObject::Long(value))
    }

    pub fn float(&self, value: f32) -> HostRef {
        self.alloc(HostObject::Float(value))
    }

    pub fn double(&self, value: f64) -> HostRef {
        self.alloc(HostObject::Double(value))
    }

    pub fn string(&self, value: &str) -> HostRef {
        self.alloc(HostObject::Str(value.to_string()))
    }

    /// The unit singleton
    pub fn unit(&self) -> HostRef {
        self.unit
    }

    /// An object of an arbitrary class with no supported shape
    pub fn opaque(&self, class: &str) -> HostRef {
        self.alloc(HostObject::Opaque {
            class: class.to_string(),
        })
    }

    pub fn new_list(&self) -> HostRef {
        self.new_list_of_class(LIST_CLASS)
    }

    pub fn new_list_of_class(&self, class: &str) -> HostRef {
        self.alloc(HostObject::List {
            class: class.to_string(),
            items: Vec::new(),
        })
    }

    pub fn list_of(&self, items: impl IntoIterator<Item = Option<HostRef>>) -> HostRef {
        self.alloc(HostObject::List {
            class: LIST_CLASS.to_string(),
            items: items.into_iter().collect(),
        })
    }

    pub fn new_set(&self) -> HostRef {
        self.alloc(HostObject::Set {
            class: SET_CLASS.to_string(),
            members: Vec::new(),
        })
    }

    pub fn new_map(&self) -> HostRef {
        self.alloc(HostObject::Map {
            class: MAP_CLASS.to_string(),
            entries: Vec::new(),
        })
    }

    /// A map restricted to string keys
    pub fn new_js_object(&self) -> HostRef {
        self.alloc(HostObject::StringKeyed {
            entries: Vec::new(),
        })
    }

    pub fn new_object_array(&self) -> HostRef {
        self.alloc(HostObject::ObjectArray {
            class: OBJECT_ARRAY_CLASS.to_string(),
            items: Vec::new(),
        })
    }

    pub fn object_array_of(&self, items: impl IntoIterator<Item = Option<HostRef>>) -> HostRef {
        self.alloc(HostObject::ObjectArray {
            class: OBJECT_ARRAY_CLASS.to_string(),
            items: items.into_iter().collect(),
        })
    }

    pub fn new_primitive_array(&self, array: PrimitiveArray) -> HostRef {
        self.alloc(HostObject::Primitive(array))
    }

    pub fn new_throwable(
        &self,
        class: &str,
        message: Option<&str>,
        frames: impl IntoIterator<Item = StackFrame>,
    ) -> HostRef {
        let frames: Vec<Option<HostRef>> = frames
            .into_iter()
            .map(|frame| Some(self.alloc(HostObject::Frame(frame))))
            .collect();
        let stack_trace = self.alloc(HostObject::ObjectArray {
            class: "[Ljava.lang.StackTraceElement;".to_string(),
            items: frames,
        });
        self.alloc(HostObject::Throwable {
            class: class.to_string(),
            message: message.map(str::to_string),
            stack_trace,
        })
    }

    /// Append to a list, set or object array.
    ///
    /// Sets ignore a member equal to one already present.
    pub fn append(&self, container: HostRef, value: Option<HostRef>) -> HostResult<()> {
        if let Some(HostObject::Set { members, .. }) =
            self.objects.borrow().get(container.0 as usize)
            && members.iter().any(|m| self.values_equal(*m, value))
        {
            return Ok(());
        }

        let mut objects = self.objects.borrow_mut();
        match objects.get_mut(container.0 as usize) {
            Some(HostObject::List { items, .. }) | Some(HostObject::ObjectArray { items, .. }) => {
                items.push(value);
                Ok(())
            }
            Some(HostObject::Set { members, .. }) => {
                members.push(value);
                Ok(())
            }
            Some(other) => Err(BridgeError::host(format!(
                "cannot append to {}",
                other.class_name()
            ))),
            None => Err(dangling(container)),
        }
    }

    /// Put an entry into a map or string-keyed object, replacing an equal key
    pub fn insert(
        &self,
        map: HostRef,
        key: Option<HostRef>,
        value: Option<HostRef>,
    ) -> HostResult<()> {
        let entries = match self.objects.borrow().get(map.0 as usize) {
            Some(HostObject::Map { entries, .. }) | Some(HostObject::StringKeyed { entries }) => {
                entries.clone()
            }
            Some(other) => {
                return Err(BridgeError::host(format!(
                    "cannot insert into {}",
                    other.class_name()
                )));
            }
            None => return Err(dangling(map)),
        };

        for entry in entries {
            let existing = match self.objects.borrow().get(entry.0 as usize) {
                Some(HostObject::Entry { key, .. }) => *key,
                _ => continue,
            };
            if self.values_equal(existing, key) {
                if let Some(HostObject::Entry { value: slot, .. }) =
                    self.objects.borrow_mut().get_mut(entry.0 as usize)
                {
                    *slot = value;
                }
                return Ok(());
            }
        }

        let entry = self.alloc(HostObject::Entry { key, value });
        match self.objects.borrow_mut().get_mut(map.0 as usize) {
            Some(HostObject::Map { entries, .. }) | Some(HostObject::StringKeyed { entries }) => {
                entries.push(entry);
                Ok(())
            }
            _ => Err(dangling(map)),
        }
    }

    /// Make every element access on `container` fail
    pub fn fail_element_access(&self, container: HostRef) {
        self.faulty.borrow_mut().insert(container);
    }

    /// Create a new local reference to `target`
    pub fn local(&self, target: HostRef) -> HostLocal {
        let slot = self.next_slot.get();
        self.next_slot.set(slot + 1);
        self.locals.borrow_mut().insert(slot);
        HostLocal { target, slot }
    }

    fn local_opt(&self, target: Option<HostRef>) -> Option<HostLocal> {
        target.map(|target| self.local(target))
    }

    /// Number of local references not yet released
    pub fn live_local_refs(&self) -> usize {
        self.locals.borrow().len()
    }

    /// Host `equals` for the boxed types, identity for everything else
    fn values_equal(&self, a: Option<HostRef>, b: Option<HostRef>) -> bool {
        let (a, b) = match (a, b) {
            (None, None) => return true,
            (Some(a), Some(b)) if a == b => return true,
            (Some(a), Some(b)) => (a, b),
            _ => return false,
        };
        let objects = self.objects.borrow();
        match (objects.get(a.0 as usize), objects.get(b.0 as usize)) {
            (Some(HostObject::Boolean(x)), Some(HostObject::Boolean(y))) => x == y,
            (Some(HostObject::Integer(x)), Some(HostObject::Integer(y))) => x == y,
            (Some(HostObject::Long(x)), Some(HostObject::Long(y))) => x == y,
            (Some(HostObject::Float(x)), Some(HostObject::Float(y))) => x.to_bits() == y.to_bits(),
            (Some(HostObject::Double(x)), Some(HostObject::Double(y))) => {
                x.to_bits() == y.to_bits()
            }
            (Some(HostObject::Str(x)), Some(HostObject::Str(y))) => x == y,
            _ => false,
        }
    }

    fn resolve(&self, local: &HostLocal) -> HostResult<HostRef> {
        if self.locals.borrow().contains(&local.slot) {
            Ok(local.target)
        } else {
            Err(BridgeError::host(format!(
                "use of released local reference #{}",
                local.slot
            )))
        }
    }

    fn with_object<R>(
        &self,
        local: &HostLocal,
        f: impl FnOnce(&HostObject) -> HostResult<R>,
    ) -> HostResult<R> {
        let target = self.resolve(local)?;
        let objects = self.objects.borrow();
        match objects.get(target.0 as usize) {
            Some(object) => f(object),
            None => Err(dangling(target)),
        }
    }

    fn check_fault(&self, local: &HostLocal) -> HostResult<()> {
        if self.faulty.borrow().contains(&local.target) {
            Err(BridgeError::host(format!(
                "element access failed on host object #{}",
                local.target.0
            )))
        } else {
            Ok(())
        }
    }

    fn iterator_over(&self, items: Vec<Option<HostRef>>) -> HostLocal {
        let iterator = self.alloc(HostObject::Iterator { items, cursor: 0 });
        self.local(iterator)
    }
}

fn dangling(target: HostRef) -> BridgeError {
    BridgeError::host(format!("dangling host reference #{}", target.0))
}

fn unexpected(object: &HostObject, expected: &str) -> BridgeError {
    BridgeError::host(format!(
        "{} is not {}",
        object.class_name(),
        expected
    ))
}

impl HostEnv for HostHeap {
    type Local = HostLocal;

    fn is_instance_of(&self, value: &HostLocal, class: HostClass) -> HostResult<bool> {
        self.with_object(value, |object| Ok(object.is_instance_of(class)))
    }

    fn class_name(&self, value: &HostLocal) -> HostResult<String> {
        self.with_object(value, |object| Ok(object.class_name()))
    }

    fn is_same_object(&self, a: &HostLocal, b: &HostLocal) -> HostResult<bool> {
        Ok(self.resolve(a)? == self.resolve(b)?)
    }

    fn boolean_value(&self, value: &HostLocal) -> HostResult<bool> {
        self.with_object(value, |object| match object {
            HostObject::Boolean(b) => Ok(*b),
            other => Err(unexpected(other, "a java.lang.Boolean")),
        })
    }

    fn int_value(&self, value: &HostLocal) -> HostResult<i32> {
        self.with_object(value, |object| match object {
            HostObject::Integer(n) => Ok(*n),
            other => Err(unexpected(other, "a java.lang.Integer")),
        })
    }

    fn long_value(&self, value: &HostLocal) -> HostResult<i64> {
        self.with_object(value, |object| match object {
            HostObject::Long(n) => Ok(*n),
            other => Err(unexpected(other, "a java.lang.Long")),
        })
    }

    fn float_value(&self, value: &HostLocal) -> HostResult<f32> {
        self.with_object(value, |object| match object {
            HostObject::Float(n) => Ok(*n),
            other => Err(unexpected(other, "a java.lang.Float")),
        })
    }

    fn double_value(&self, value: &HostLocal) -> HostResult<f64> {
        self.with_object(value, |object| match object {
            HostObject::Double(n) => Ok(*n),
            other => Err(unexpected(other, "a java.lang.Double")),
        })
    }

    fn string_value(&self, value: &HostLocal) -> HostResult<String> {
        self.with_object(value, |object| match object {
            HostObject::Str(s) => Ok(s.clone()),
            other => Err(unexpected(other, "a java.lang.String")),
        })
    }

    fn list_size(&self, list: &HostLocal) -> HostResult<u32> {
        self.with_object(list, |object| match object {
            HostObject::List { items, .. } => Ok(items.len() as u32),
            other => Err(unexpected(other, "a java.util.List")),
        })
    }

    fn list_get(&self, list: &HostLocal, index: u32) -> HostResult<Option<HostLocal>> {
        self.check_fault(list)?;
        let item = self.with_object(list, |object| match object {
            HostObject::List { items, .. } => items.get(index as usize).copied().ok_or_else(|| {
                BridgeError::host(format!(
                    "IndexOutOfBoundsException: Index {} out of bounds for length {}",
                    index,
                    items.len()
                ))
            }),
            other => Err(unexpected(other, "a java.util.List")),
        })?;
        Ok(self.local_opt(item))
    }

    fn set_iterator(&self, set: &HostLocal) -> HostResult<HostLocal> {
        self.check_fault(set)?;
        let members = self.with_object(set, |object| match object {
            HostObject::Set { members, .. } => Ok(members.clone()),
            other => Err(unexpected(other, "a java.util.Set")),
        })?;
        Ok(self.iterator_over(members))
    }

    fn map_entry_iterator(&self, map: &HostLocal) -> HostResult<HostLocal> {
        self.check_fault(map)?;
        let entries = self.with_object(map, |object| match object {
            HostObject::Map { entries, .. } | HostObject::StringKeyed { entries } => {
                Ok(entries.iter().copied().map(Some).collect())
            }
            other => Err(unexpected(other, "a java.util.Map")),
        })?;
        Ok(self.iterator_over(entries))
    }

    fn iterator_has_next(&self, iterator: &HostLocal) -> HostResult<bool> {
        self.with_object(iterator, |object| match object {
            HostObject::Iterator { items, cursor } => Ok(*cursor < items.len()),
            other => Err(unexpected(other, "a java.util.Iterator")),
        })
    }

    fn iterator_next(&self, iterator: &HostLocal) -> HostResult<Option<HostLocal>> {
        let target = self.resolve(iterator)?;
        let item = {
            let mut objects = self.objects.borrow_mut();
            match objects.get_mut(target.0 as usize) {
                Some(HostObject::Iterator { items, cursor }) => {
                    let item = items
                        .get(*cursor)
                        .copied()
                        .ok_or_else(|| BridgeError::host("NoSuchElementException"))?;
                    *cursor += 1;
                    item
                }
                Some(other) => return Err(unexpected(other, "a java.util.Iterator")),
                None => return Err(dangling(target)),
            }
        };
        Ok(self.local_opt(item))
    }

    fn entry_key(&self, entry: &HostLocal) -> HostResult<Option<HostLocal>> {
        let key = self.with_object(entry, |object| match object {
            HostObject::Entry { key, .. } => Ok(*key),
            other => Err(unexpected(other, "a java.util.Map$Entry")),
        })?;
        Ok(self.local_opt(key))
    }

    fn entry_value(&self, entry: &HostLocal) -> HostResult<Option<HostLocal>> {
        let value = self.with_object(entry, |object| match object {
            HostObject::Entry { value, .. } => Ok(*value),
            other => Err(unexpected(other, "a java.util.Map$Entry")),
        })?;
        Ok(self.local_opt(value))
    }

    fn array_length(&self, array: &HostLocal) -> HostResult<u32> {
        self.with_object(array, |object| match object {
            HostObject::ObjectArray { items, .. } => Ok(items.len() as u32),
            HostObject::Primitive(values) => Ok(values.len() as u32),
            other => Err(unexpected(other, "an array")),
        })
    }

    fn array_element(&self, array: &HostLocal, index: u32) -> HostResult<Option<HostLocal>> {
        self.check_fault(array)?;
        let item = self.with_object(array, |object| match object {
            HostObject::ObjectArray { items, .. } => {
                items.get(index as usize).copied().ok_or_else(|| {
                    BridgeError::host(format!(
                        "ArrayIndexOutOfBoundsException: Index {} out of bounds for length {}",
                        index,
                        items.len()
                    ))
                })
            }
            other => Err(unexpected(other, "an object array")),
        })?;
        Ok(self.local_opt(item))
    }

    fn primitive_array(
        &self,
        array: &HostLocal,
        kind: PrimitiveKind,
    ) -> HostResult<PrimitiveArray> {
        self.with_object(array, |object| match object {
            HostObject::Primitive(values) if values.kind() == kind => Ok(values.clone()),
            other => Err(unexpected(other, kind.descriptor())),
        })
    }

    fn throwable_message(&self, throwable: &HostLocal) -> HostResult<Option<String>> {
        self.with_object(throwable, |object| match object {
            HostObject::Throwable { message, .. } => Ok(message.clone()),
            other => Err(unexpected(other, "a java.lang.Throwable")),
        })
    }

    fn throwable_stack_trace(&self, throwable: &HostLocal) -> HostResult<HostLocal> {
        let trace = self.with_object(throwable, |object| match object {
            HostObject::Throwable { stack_trace, .. } => Ok(*stack_trace),
            other => Err(unexpected(other, "a java.lang.Throwable")),
        })?;
        Ok(self.local(trace))
    }

    fn display_string(&self, value: &HostLocal) -> HostResult<String> {
        let target = self.resolve(value)?;
        self.with_object(value, |object| {
            Ok(match object {
                HostObject::Boolean(b) => b.to_string(),
                HostObject::Integer(n) => n.to_string(),
                HostObject::Long(n) => n.to_string(),
                HostObject::Float(n) => format!("{:?}", n),
                HostObject::Double(n) => format!("{:?}", n),
                HostObject::Str(s) => s.clone(),
                HostObject::Frame(frame) => frame.to_string(),
                HostObject::Throwable { class, message, .. } => match message {
                    Some(message) => format!("{}: {}", class, message),
                    None => class.clone(),
                },
                HostObject::Unit => "kotlin.Unit".to_string(),
                other => format!("{}@{:x}", other.class_name(), target.0),
            })
        })
    }

    fn delete_local_ref(&self, local: HostLocal) {
        if !self.locals.borrow_mut().remove(&local.slot) {
            tracing::warn!(slot = local.slot, "local reference released twice");
        }
    }
}
