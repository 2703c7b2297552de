//! Destination script runtime surface.
//!
//! [`ScriptContext`] is everything the converter needs from the JavaScript
//! engine: value construction, property population, the `Map`/`Set` global
//! constructors and a way to raise an exception. [`realm`] is an in-process
//! implementation used by the CLI and the tests.

pub mod realm;

use thiserror::Error;

use crate::error::BridgeResult;

pub use realm::{JsValue, Realm, inspect};

/// Sentinel returned when an exception has been raised in the script runtime.
///
/// It carries no payload. The caller must abort its own traversal branch and
/// hand the sentinel upward without raising anything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("exception raised in script runtime")]
pub struct ExceptionSignal;

/// Result of a conversion that raises its errors in the script runtime
pub type ScriptResult<T> = Result<T, ExceptionSignal>;

/// Value construction API of a JavaScript engine.
///
/// `Value` owns its reference: dropping a value releases it. A value that
/// was partially populated when a conversion failed is discarded simply by
/// dropping it.
///
/// Population calls return `Err(BridgeError::Pending)` when the engine
/// rejected the write and left its own exception pending.
pub trait ScriptContext {
    /// Owned destination value
    type Value;

    fn null(&self) -> Self::Value;

    fn undefined(&self) -> Self::Value;

    fn boolean(&self, value: bool) -> Self::Value;

    /// Number with the double-precision subtype
    fn float64(&self, value: f64) -> Self::Value;

    /// Number with the 64-bit integer subtype
    fn int64(&self, value: i64) -> Self::Value;

    /// String from UTF-8 text
    fn string(&self, value: &str) -> Self::Value;

    /// Create an empty array
    fn new_array(&self) -> Self::Value;

    /// Create an empty plain object
    fn new_object(&self) -> Self::Value;

    /// Create an error object with no own `name`, `message` or `stack`
    fn new_error(&self) -> Self::Value;

    /// Store `value` at `index` of `array`
    fn set_index(&self, array: &Self::Value, index: u32, value: Self::Value) -> BridgeResult<()>;

    /// Store `value` under the string key `key` of `object`
    fn set_property(&self, object: &Self::Value, key: &str, value: Self::Value)
    -> BridgeResult<()>;

    /// Look up a constructor on the global object
    fn global_constructor(&self, name: &str) -> Option<Self::Value>;

    /// Invoke `constructor` with `new`
    fn construct(&self, constructor: &Self::Value, args: &[Self::Value])
    -> BridgeResult<Self::Value>;

    /// Make `exception` the pending exception of the runtime
    fn throw(&self, exception: Self::Value);
}
