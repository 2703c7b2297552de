//! Host to script value conversion.
//!
//! A [`Marshaller`] walks a host value tree and builds the equivalent
//! script value. Host values are classified with the type tests in
//! [`DISPATCH_ORDER`](crate::host::DISPATCH_ORDER), falling back to the
//! runtime class name for unit values and arrays:
//!
//! | Host value                 | Script value                          |
//! |----------------------------|---------------------------------------|
//! | `null`                     | `null`                                |
//! | `Boolean`                  | boolean                               |
//! | `Integer`, `Float`, `Double` | number (double)                     |
//! | `Long`                     | number (int64)                        |
//! | `String`                   | string                                |
//! | `List`, object array       | array                                 |
//! | string-keyed object        | plain object                          |
//! | `Map`                      | `new Map([[k, v], ...])`              |
//! | `Set`                      | `new Set([v, ...])`                   |
//! | `Throwable`                | error with `name`, `message`, `stack` |
//! | `[Z [I [J [F [D`           | array                                 |
//! | unit                       | `undefined`                           |

mod array;
mod collections;
mod dispatch;
pub mod guard;
mod throwable;

use tracing::debug;

use crate::config::BridgeConfig;
use crate::error::BridgeResult;
use crate::host::HostEnv;
use crate::script::{ScriptContext, ScriptResult};

pub use guard::{CycleGuard, Lineage};

/// Converts host values into values of one script context
pub struct Marshaller<'a, E: HostEnv + ?Sized, C: ScriptContext + ?Sized> {
    env: &'a E,
    ctx: &'a C,
    config: BridgeConfig,
    guard: CycleGuard,
}

impl<'a, E: HostEnv + ?Sized, C: ScriptContext + ?Sized> Marshaller<'a, E, C> {
    /// Create a marshaller with the default configuration
    pub fn new(env: &'a E, ctx: &'a C) -> Self {
        Self::with_config(env, ctx, BridgeConfig::default())
    }

    pub fn with_config(env: &'a E, ctx: &'a C, config: BridgeConfig) -> Self {
        let max_depth = config.max_depth.filter(|&depth| depth > 0);
        let guard = CycleGuard::new(config.cycle_detection, max_depth);
        Self {
            env,
            ctx,
            config,
            guard,
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Convert a host value, raising any failure in the script runtime.
    ///
    /// On failure exactly one error object is pending in the script runtime
    /// and the returned sentinel carries nothing else. Any partially built
    /// value has been released.
    pub fn convert(&self, value: Option<&E::Local>) -> ScriptResult<C::Value> {
        self.try_convert(value).map_err(|error| {
            debug!(error = %error, name = error.script_name(), "host value conversion failed");
            error.raise(self.ctx)
        })
    }

    /// Convert a host value, returning failures to the caller.
    ///
    /// Nothing is raised, except for [`BridgeError::Pending`](crate::BridgeError::Pending)
    /// which reports an exception the script runtime raised on its own.
    pub fn try_convert(&self, value: Option<&E::Local>) -> BridgeResult<C::Value> {
        self.convert_value(value, None)
    }
}

/// Convert `value` with the default configuration
pub fn convert<E, C>(env: &E, ctx: &C, value: Option<&E::Local>) -> ScriptResult<C::Value>
where
    E: HostEnv + ?Sized,
    C: ScriptContext + ?Sized,
{
    Marshaller::new(env, ctx).convert(value)
}
