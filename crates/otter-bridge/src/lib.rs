//! # Otter Bridge
//!
//! Marshalling of values owned by a managed host runtime (JVM-style boxed
//! primitives, collections, arrays, throwables) into JavaScript values.
//!
//! ## Design Principles
//!
//! - **Two seams**: the host is reached only through [`HostEnv`], the script
//!   engine only through [`ScriptContext`]
//! - **Single error boundary**: failures travel as [`BridgeError`] and are
//!   raised in the script runtime once, at [`Marshaller::convert`]
//! - **Scoped references**: every host local reference is a [`LocalRef`] and
//!   every partial script value is released by dropping it
//!
//! ## Example
//!
//! ```
//! use otter_bridge::{HostEnv, HostFixture, HostHeap, Marshaller, Realm, inspect};
//!
//! let heap = HostHeap::new();
//! let realm = Realm::new();
//! let fixture = HostFixture::from_json(
//!     r#"{ "type": "list", "items": [ { "type": "int", "value": 1 }, { "type": "null" } ] }"#,
//! )
//! .unwrap();
//! let root = fixture.build(&heap).unwrap().map(|r| heap.local(r));
//!
//! let value = Marshaller::new(&heap, &realm).convert(root.as_ref()).unwrap();
//! assert_eq!(inspect(&value), "[ 1, null ]");
//! if let Some(root) = root {
//!     heap.delete_local_ref(root);
//! }
//! ```

#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod host;
pub mod marshal;
pub mod script;

pub use config::{BridgeConfig, CycleDetection};
pub use error::{BridgeError, BridgeResult};
pub use host::{HostClass, HostEnv, HostFixture, HostHeap, HostLocal, HostRef, LocalRef};
pub use marshal::{Marshaller, convert};
pub use script::{ExceptionSignal, JsValue, Realm, ScriptContext, ScriptResult, inspect};
