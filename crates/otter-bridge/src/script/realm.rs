//! In-process JavaScript value realm.
//!
//! `Realm` implements [`ScriptContext`] over reference-counted values: arrays,
//! plain objects, error objects, `Map`/`Set` instances and the two native
//! constructors installed on its global object. Every object is counted
//! while alive, so a caller can check that a discarded partial value was
//! really freed.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use rustc_hash::FxHashMap;

use super::ScriptContext;
use crate::error::{BridgeError, BridgeResult};

/// A JavaScript value
#[derive(Clone)]
pub enum JsValue {
    Undefined,
    Null,
    Boolean(bool),
    /// Number, double-precision subtype
    Float(f64),
    /// Number, 64-bit integer subtype
    Int(i64),
    String(Rc<str>),
    Object(JsObject),
}

/// Reference to a heap object of a [`Realm`]
#[derive(Clone)]
pub struct JsObject(Rc<ObjectCell>);

struct ObjectCell {
    kind: RefCell<ObjectKind>,
    live: Rc<Cell<usize>>,
}

impl Drop for ObjectCell {
    fn drop(&mut self) {
        self.live.set(self.live.get().saturating_sub(1));
    }
}

enum ObjectKind {
    Array(Vec<JsValue>),
    Plain(IndexMap<String, JsValue>),
    Error(IndexMap<String, JsValue>),
    Map(MapData),
    /// Members are stored as `member => member`
    Set(MapData),
    Constructor(Builtin),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Builtin {
    Map,
    Set,
}

impl Builtin {
    fn name(self) -> &'static str {
        match self {
            Self::Map => "Map",
            Self::Set => "Set",
        }
    }
}

/// SameValueZero identity of a key
#[derive(PartialEq, Eq, Hash)]
enum MapKey {
    Undefined,
    Null,
    Boolean(bool),
    Number(u64),
    String(Rc<str>),
    Object(usize),
}

impl MapKey {
    fn of(value: &JsValue) -> Self {
        match value {
            JsValue::Undefined => Self::Undefined,
            JsValue::Null => Self::Null,
            JsValue::Boolean(b) => Self::Boolean(*b),
            JsValue::Float(n) => Self::number(*n),
            JsValue::Int(n) => Self::number(*n as f64),
            JsValue::String(s) => Self::String(s.clone()),
            JsValue::Object(o) => Self::Object(Rc::as_ptr(&o.0) as usize),
        }
    }

    fn number(n: f64) -> Self {
        if n.is_nan() {
            Self::Number(f64::NAN.to_bits())
        } else if n == 0.0 {
            Self::Number(0f64.to_bits())
        } else {
            Self::Number(n.to_bits())
        }
    }
}

/// Insertion-ordered backing store of `Map` and `Set`.
///
/// Setting an existing key updates it in place and keeps its position.
#[derive(Default)]
struct MapData {
    entries: Vec<(JsValue, JsValue)>,
    index: FxHashMap<MapKey, usize>,
}

impl MapData {
    fn set(&mut self, key: JsValue, value: JsValue) {
        let key = match key {
            JsValue::Float(n) if n == 0.0 => JsValue::Float(0.0),
            key => key,
        };
        let map_key = MapKey::of(&key);
        if let Some(&idx) = self.index.get(&map_key) {
            self.entries[idx].1 = value;
        } else {
            self.index.insert(map_key, self.entries.len());
            self.entries.push((key, value));
        }
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

impl JsValue {
    pub fn is_undefined(&self) -> bool {
        matches!(self, Self::Undefined)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Numeric value of either number subtype
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Float(n) => Some(*n),
            Self::Int(n) => Some(*n as f64),
            _ => None,
        }
    }

    /// Value of the integer number subtype
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&JsObject> {
        match self {
            Self::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn is_array(&self) -> bool {
        self.with_kind(|kind| matches!(kind, ObjectKind::Array(_)))
            .unwrap_or(false)
    }

    pub fn is_map(&self) -> bool {
        self.with_kind(|kind| matches!(kind, ObjectKind::Map(_)))
            .unwrap_or(false)
    }

    pub fn is_set(&self) -> bool {
        self.with_kind(|kind| matches!(kind, ObjectKind::Set(_)))
            .unwrap_or(false)
    }

    pub fn is_error(&self) -> bool {
        self.with_kind(|kind| matches!(kind, ObjectKind::Error(_)))
            .unwrap_or(false)
    }

    /// Elements of an array
    pub fn array_items(&self) -> Option<Vec<JsValue>> {
        self.with_kind(|kind| match kind {
            ObjectKind::Array(items) => Some(items.clone()),
            _ => None,
        })
        .flatten()
    }

    /// Own property of a plain or error object
    pub fn get(&self, key: &str) -> Option<JsValue> {
        self.with_kind(|kind| match kind {
            ObjectKind::Plain(props) | ObjectKind::Error(props) => props.get(key).cloned(),
            _ => None,
        })
        .flatten()
    }

    /// Own property names of a plain or error object, in insertion order
    pub fn keys(&self) -> Option<Vec<String>> {
        self.with_kind(|kind| match kind {
            ObjectKind::Plain(props) | ObjectKind::Error(props) => {
                Some(props.keys().cloned().collect())
            }
            _ => None,
        })
        .flatten()
    }

    /// Entries of a `Map`, in insertion order
    pub fn map_entries(&self) -> Option<Vec<(JsValue, JsValue)>> {
        self.with_kind(|kind| match kind {
            ObjectKind::Map(data) => Some(data.entries.clone()),
            _ => None,
        })
        .flatten()
    }

    /// Members of a `Set`, in insertion order
    pub fn set_members(&self) -> Option<Vec<JsValue>> {
        self.with_kind(|kind| match kind {
            ObjectKind::Set(data) => Some(data.entries.iter().map(|(k, _)| k.clone()).collect()),
            _ => None,
        })
        .flatten()
    }

    fn with_kind<R>(&self, f: impl FnOnce(&ObjectKind) -> R) -> Option<R> {
        match self {
            Self::Object(o) => Some(f(&o.0.kind.borrow())),
            _ => None,
        }
    }
}

impl fmt::Debug for JsValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "JsValue({})", inspect(self))
    }
}

impl fmt::Display for JsValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&inspect(self))
    }
}

/// Value realm implementing [`ScriptContext`].
///
/// Single-threaded; values are `!Send` like the engine values they model.
pub struct Realm {
    globals: RefCell<IndexMap<String, JsValue>>,
    exception: RefCell<Option<JsValue>>,
    live: Rc<Cell<usize>>,
}

impl Default for Realm {
    fn default() -> Self {
        Self::new()
    }
}

impl Realm {
    /// Create a realm with the `Map` and `Set` constructors installed
    pub fn new() -> Self {
        let realm = Self::bare();
        for builtin in [Builtin::Map, Builtin::Set] {
            let constructor = realm.alloc(ObjectKind::Constructor(builtin));
            realm.define_global(builtin.name(), constructor);
        }
        realm
    }

    /// Create a realm with an empty global object
    pub fn bare() -> Self {
        Self {
            globals: RefCell::new(IndexMap::new()),
            exception: RefCell::new(None),
            live: Rc::new(Cell::new(0)),
        }
    }

    fn alloc(&self, kind: ObjectKind) -> JsValue {
        self.live.set(self.live.get() + 1);
        JsValue::Object(JsObject(Rc::new(ObjectCell {
            kind: RefCell::new(kind),
            live: self.live.clone(),
        })))
    }

    pub fn define_global(&self, name: &str, value: JsValue) {
        self.globals.borrow_mut().insert(name.to_string(), value);
    }

    pub fn remove_global(&self, name: &str) -> Option<JsValue> {
        self.globals.borrow_mut().shift_remove(name)
    }

    pub fn global(&self, name: &str) -> Option<JsValue> {
        self.globals.borrow().get(name).cloned()
    }

    /// Take the pending exception, clearing it
    pub fn take_exception(&self) -> Option<JsValue> {
        self.exception.borrow_mut().take()
    }

    pub fn has_exception(&self) -> bool {
        self.exception.borrow().is_some()
    }

    /// Number of objects currently alive in this realm
    pub fn live_objects(&self) -> usize {
        self.live.get()
    }

    fn throw_type_error(&self, message: &str) -> BridgeError {
        let mut props = IndexMap::new();
        props.insert("name".to_string(), JsValue::String(Rc::from("TypeError")));
        props.insert("message".to_string(), JsValue::String(Rc::from(message)));
        let error = self.alloc(ObjectKind::Error(props));
        self.throw(error);
        BridgeError::Pending
    }

    fn iterable_items(&self, source: Option<&JsValue>) -> BridgeResult<Vec<JsValue>> {
        match source {
            None | Some(JsValue::Undefined) | Some(JsValue::Null) => Ok(Vec::new()),
            Some(value) => match value.array_items() {
                Some(items) => Ok(items),
                None => Err(self.throw_type_error(&format!(
                    "{} is not iterable",
                    inspect(value)
                ))),
            },
        }
    }
}

impl ScriptContext for Realm {
    type Value = JsValue;

    fn null(&self) -> JsValue {
        JsValue::Null
    }

    fn undefined(&self) -> JsValue {
        JsValue::Undefined
    }

    fn boolean(&self, value: bool) -> JsValue {
        JsValue::Boolean(value)
    }

    fn float64(&self, value: f64) -> JsValue {
        JsValue::Float(value)
    }

    fn int64(&self, value: i64) -> JsValue {
        JsValue::Int(value)
    }

    fn string(&self, value: &str) -> JsValue {
        JsValue::String(Rc::from(value))
    }

    fn new_array(&self) -> JsValue {
        self.alloc(ObjectKind::Array(Vec::new()))
    }

    fn new_object(&self) -> JsValue {
        self.alloc(ObjectKind::Plain(IndexMap::new()))
    }

    fn new_error(&self) -> JsValue {
        self.alloc(ObjectKind::Error(IndexMap::new()))
    }

    fn set_index(&self, array: &JsValue, index: u32, value: JsValue) -> BridgeResult<()> {
        if let JsValue::Object(o) = array
            && let ObjectKind::Array(items) = &mut *o.0.kind.borrow_mut()
        {
            let index = index as usize;
            if index >= items.len() {
                items.resize(index + 1, JsValue::Undefined);
            }
            items[index] = value;
            return Ok(());
        }
        Err(self.throw_type_error(&format!(
            "cannot set index {} of {}",
            index,
            inspect(array)
        )))
    }

    fn set_property(&self, object: &JsValue, key: &str, value: JsValue) -> BridgeResult<()> {
        if let JsValue::Object(o) = object
            && let ObjectKind::Plain(props) | ObjectKind::Error(props) =
                &mut *o.0.kind.borrow_mut()
        {
            props.insert(key.to_string(), value);
            return Ok(());
        }
        Err(self.throw_type_error(&format!(
            "cannot set property '{}' of {}",
            key,
            inspect(object)
        )))
    }

    fn global_constructor(&self, name: &str) -> Option<JsValue> {
        self.global(name).filter(|value| {
            value.with_kind(|kind| matches!(kind, ObjectKind::Constructor(_))) == Some(true)
        })
    }

    fn construct(&self, constructor: &JsValue, args: &[JsValue]) -> BridgeResult<JsValue> {
        let builtin = constructor.with_kind(|kind| match kind {
            ObjectKind::Constructor(builtin) => Some(*builtin),
            _ => None,
        });
        let Some(Some(builtin)) = builtin else {
            return Err(self.throw_type_error(&format!(
                "{} is not a constructor",
                inspect(constructor)
            )));
        };

        let items = self.iterable_items(args.first())?;
        let mut data = MapData::default();
        match builtin {
            Builtin::Set => {
                for member in items {
                    data.set(member.clone(), member);
                }
                Ok(self.alloc(ObjectKind::Set(data)))
            }
            Builtin::Map => {
                for item in items {
                    let Some(pair) = item.array_items() else {
                        return Err(self.throw_type_error(&format!(
                            "Iterator value {} is not an entry object",
                            inspect(&item)
                        )));
                    };
                    let mut pair = pair.into_iter();
                    let key = pair.next().unwrap_or(JsValue::Undefined);
                    let value = pair.next().unwrap_or(JsValue::Undefined);
                    data.set(key, value);
                }
                Ok(self.alloc(ObjectKind::Map(data)))
            }
        }
    }

    fn throw(&self, exception: JsValue) {
        *self.exception.borrow_mut() = Some(exception);
    }
}

/// Render a value the way a console would.
///
/// ```
/// use otter_bridge::script::{Realm, ScriptContext, inspect};
///
/// let realm = Realm::new();
/// let array = realm.new_array();
/// realm.set_index(&array, 0, realm.float64(1.0)).unwrap();
/// realm.set_index(&array, 1, realm.string("x")).unwrap();
/// assert_eq!(inspect(&array), r#"[ 1, "x" ]"#);
/// ```
pub fn inspect(value: &JsValue) -> String {
    let mut out = String::new();
    write_value(&mut out, value, true);
    out
}

fn write_value(out: &mut String, value: &JsValue, top_level: bool) {
    match value {
        JsValue::Undefined => out.push_str("undefined"),
        JsValue::Null => out.push_str("null"),
        JsValue::Boolean(b) => out.push_str(if *b { "true" } else { "false" }),
        JsValue::Float(n) => out.push_str(&format_number(*n)),
        JsValue::Int(n) => out.push_str(&n.to_string()),
        JsValue::String(s) => out.push_str(&quote(s)),
        JsValue::Object(o) => write_object(out, &o.0.kind.borrow(), top_level),
    }
}

fn write_object(out: &mut String, kind: &ObjectKind, top_level: bool) {
    match kind {
        ObjectKind::Array(items) => write_list(out, "[", items.iter(), "]", |out, item| {
            write_value(out, item, false)
        }),
        ObjectKind::Plain(props) => write_list(out, "{", props.iter(), "}", |out, (k, v)| {
            out.push_str(&property_key(k));
            out.push_str(": ");
            write_value(out, v, false);
        }),
        ObjectKind::Map(data) => {
            out.push_str(&format!("Map({}) ", data.len()));
            write_list(out, "{", data.entries.iter(), "}", |out, (k, v)| {
                write_value(out, k, false);
                out.push_str(" => ");
                write_value(out, v, false);
            });
        }
        ObjectKind::Set(data) => {
            out.push_str(&format!("Set({}) ", data.len()));
            write_list(out, "{", data.entries.iter(), "}", |out, (k, _)| {
                write_value(out, k, false)
            });
        }
        ObjectKind::Error(props) => write_error(out, props, top_level),
        ObjectKind::Constructor(builtin) => {
            out.push_str(&format!("[Function: {}]", builtin.name()))
        }
    }
}

fn write_error(out: &mut String, props: &IndexMap<String, JsValue>, top_level: bool) {
    let text = |key: &str| props.get(key).and_then(|v| v.as_str().map(str::to_string));
    let name = text("name").unwrap_or_else(|| "Error".to_string());
    let headline = match text("message") {
        Some(message) if !message.is_empty() => format!("{}: {}", name, message),
        _ => name,
    };

    if !top_level {
        out.push_str(&format!("[{}]", headline));
        return;
    }
    out.push_str(&headline);
    if let Some(frames) = props.get("stack").and_then(JsValue::array_items) {
        for frame in frames {
            if let Some(frame) = frame.as_str() {
                out.push_str("\n    at ");
                out.push_str(frame);
            }
        }
    }
}

fn write_list<I, T>(
    out: &mut String,
    open: &str,
    items: I,
    close: &str,
    mut write_item: impl FnMut(&mut String, T),
) where
    I: ExactSizeIterator<Item = T>,
{
    if items.len() == 0 {
        out.push_str(open);
        out.push_str(close);
        return;
    }
    out.push_str(open);
    out.push(' ');
    for (i, item) in items.enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        write_item(out, item);
    }
    out.push(' ');
    out.push_str(close);
}

fn quote(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| format!("\"{}\"", s))
}

fn property_key(key: &str) -> String {
    let mut chars = key.chars();
    let identifier = match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
        }
        _ => false,
    };
    if identifier { key.to_string() } else { quote(key) }
}

/// Format a number per JS `Number.prototype.toString` for the common cases
fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        let text = if n > 0.0 { "Infinity" } else { "-Infinity" };
        text.to_string()
    } else if n == n.trunc() && n.abs() < 1e21 {
        format!("{:.0}", n)
    } else {
        n.to_string()
    }
}
