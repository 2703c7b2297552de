//! JSON description of host value trees.
//!
//! ```json
//! { "type": "list", "items": [
//!     { "type": "int", "value": 1 },
//!     { "type": "self" }
//! ] }
//! ```
//!
//! `self` stands for the immediately enclosing container, which is the only
//! way to describe a self-containing structure in a tree format.

use std::path::Path;

use serde::Deserialize;

use super::heap::{HostHeap, HostRef, StackFrame};
use super::{HostResult, PrimitiveArray};
use crate::error::BridgeError;

/// A host value tree
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostFixture {
    Null,
    Boolean {
        value: bool,
    },
    Int {
        value: i32,
    },
    Long {
        value: i64,
    },
    Float {
        value: f32,
    },
    Double {
        value: f64,
    },
    String {
        value: String,
    },
    List {
        #[serde(default)]
        class: Option<String>,
        #[serde(default)]
        items: Vec<HostFixture>,
    },
    Set {
        #[serde(default)]
        items: Vec<HostFixture>,
    },
    Map {
        #[serde(default)]
        entries: Vec<FixtureEntry>,
    },
    /// String-keyed object
    Object {
        #[serde(default)]
        entries: Vec<FixtureEntry>,
    },
    Throwable {
        class: String,
        #[serde(default)]
        message: Option<String>,
        #[serde(default)]
        stack: Vec<StackFrame>,
    },
    BooleanArray {
        values: Vec<bool>,
    },
    IntArray {
        values: Vec<i32>,
    },
    LongArray {
        values: Vec<i64>,
    },
    FloatArray {
        values: Vec<f32>,
    },
    DoubleArray {
        values: Vec<f64>,
    },
    ObjectArray {
        #[serde(default)]
        items: Vec<HostFixture>,
    },
    Unit,
    /// Object of a class with no supported conversion
    Opaque {
        class: String,
    },
    /// The enclosing container
    #[serde(rename = "self")]
    SelfRef,
}

/// Key/value pair of a map fixture
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FixtureEntry {
    pub key: HostFixture,
    pub value: HostFixture,
}

impl HostFixture {
    /// Parse a fixture from JSON text
    pub fn from_json(json: &str) -> HostResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Parse a fixture from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> HostResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| BridgeError::fixture(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&json)
    }

    /// Materialise the tree in `heap`. `Null` builds to `None`.
    pub fn build(&self, heap: &HostHeap) -> HostResult<Option<HostRef>> {
        self.build_in(heap, None)
    }

    fn build_in(&self, heap: &HostHeap, container: Option<HostRef>) -> HostResult<Option<HostRef>> {
        let built = match self {
            Self::Null => return Ok(None),
            Self::SelfRef => {
                return container.map(Some).ok_or_else(|| {
                    BridgeError::fixture("`self` used outside of a container")
                });
            }
            Self::Boolean { value } => heap.boolean(*value),
            Self::Int { value } => heap.integer(*value),
            Self::Long { value } => heap.long(*value),
            Self::Float { value } => heap.float(*value),
            Self::Double { value } => heap.double(*value),
            Self::String { value } => heap.string(value),
            Self::Unit => heap.unit(),
            Self::Opaque { class } => heap.opaque(class),
            Self::BooleanArray { values } => {
                heap.new_primitive_array(PrimitiveArray::Boolean(values.clone()))
            }
            Self::IntArray { values } => {
                heap.new_primitive_array(PrimitiveArray::Int(values.clone()))
            }
            Self::LongArray { values } => {
                heap.new_primitive_array(PrimitiveArray::Long(values.clone()))
            }
            Self::FloatArray { values } => {
                heap.new_primitive_array(PrimitiveArray::Float(values.clone()))
            }
            Self::DoubleArray { values } => {
                heap.new_primitive_array(PrimitiveArray::Double(values.clone()))
            }
            Self::Throwable {
                class,
                message,
                stack,
            } => heap.new_throwable(class, message.as_deref(), stack.iter().cloned()),
            Self::List { class, items } => {
                let list = match class {
                    Some(class) => heap.new_list_of_class(class),
                    None => heap.new_list(),
                };
                Self::append_all(heap, list, items)?;
                list
            }
            Self::Set { items } => {
                let set = heap.new_set();
                Self::append_all(heap, set, items)?;
                set
            }
            Self::ObjectArray { items } => {
                let array = heap.new_object_array();
                Self::append_all(heap, array, items)?;
                array
            }
            Self::Map { entries } => {
                let map = heap.new_map();
                Self::insert_all(heap, map, entries)?;
                map
            }
            Self::Object { entries } => {
                let object = heap.new_js_object();
                Self::insert_all(heap, object, entries)?;
                object
            }
        };
        Ok(Some(built))
    }

    fn append_all(heap: &HostHeap, container: HostRef, items: &[HostFixture]) -> HostResult<()> {
        for item in items {
            let item = item.build_in(heap, Some(container))?;
            heap.append(container, item)?;
        }
        Ok(())
    }

    fn insert_all(heap: &HostHeap, map: HostRef, entries: &[FixtureEntry]) -> HostResult<()> {
        for entry in entries {
            let key = entry.key.build_in(heap, Some(map))?;
            let value = entry.value.build_in(heap, Some(map))?;
            heap.insert(map, key, value)?;
        }
        Ok(())
    }
}
