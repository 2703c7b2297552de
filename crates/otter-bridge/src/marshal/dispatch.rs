use tracing::trace;

use super::{Lineage, Marshaller};
use crate::config::BridgeConfig;
use crate::error::{BridgeError, BridgeResult};
use crate::host::{DISPATCH_ORDER, HostClass, HostEnv, PrimitiveKind};
use crate::script::ScriptContext;

/// Remaining stack below which a nested conversion moves to a fresh segment
const STACK_RED_ZONE: usize = 64 * 1024;
/// Size of each stack segment allocated for deep nesting
const STACK_GROW_SIZE: usize = 1024 * 1024;

/// Shape of a value that matched none of the type tests, by class name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Fallback {
    Unit,
    PrimitiveArray(PrimitiveKind),
    ObjectArray,
    Unsupported,
}

impl Fallback {
    pub(super) fn of(class_name: &str, config: &BridgeConfig) -> Self {
        if config.is_unit_class(class_name) {
            Self::Unit
        } else if let Some(kind) = PrimitiveKind::from_descriptor(class_name) {
            Self::PrimitiveArray(kind)
        } else if class_name.starts_with('[') {
            Self::ObjectArray
        } else {
            Self::Unsupported
        }
    }
}

impl<E: HostEnv + ?Sized, C: ScriptContext + ?Sized> Marshaller<'_, E, C> {
    /// Convert one value found inside the containers of `parent`
    pub(super) fn convert_value(
        &self,
        value: Option<&E::Local>,
        parent: Option<&Lineage<'_, E::Local>>,
    ) -> BridgeResult<C::Value> {
        let Some(value) = value else {
            return Ok(self.ctx.null());
        };

        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || {
            match self.classify(value)? {
                Some(class) => {
                    trace!(?class, "dispatching host value");
                    self.convert_class(value, class, parent)
                }
                None => self.convert_fallback(value, parent),
            }
        })
    }

    fn classify(&self, value: &E::Local) -> BridgeResult<Option<HostClass>> {
        for class in DISPATCH_ORDER {
            if self.env.is_instance_of(value, class)? {
                return Ok(Some(class));
            }
        }
        Ok(None)
    }

    fn convert_class(
        &self,
        value: &E::Local,
        class: HostClass,
        parent: Option<&Lineage<'_, E::Local>>,
    ) -> BridgeResult<C::Value> {
        let ctx = self.ctx;
        match class {
            HostClass::Boolean => Ok(ctx.boolean(self.env.boolean_value(value)?)),
            HostClass::Integer => Ok(ctx.float64(f64::from(self.env.int_value(value)?))),
            HostClass::Long => Ok(ctx.int64(self.env.long_value(value)?)),
            HostClass::Float => Ok(ctx.float64(f64::from(self.env.float_value(value)?))),
            HostClass::Double => Ok(ctx.float64(self.env.double_value(value)?)),
            HostClass::String => Ok(ctx.string(&self.env.string_value(value)?)),
            HostClass::List => self.convert_list(value, parent),
            HostClass::StringKeyedObject => self.convert_string_keyed(value, parent),
            HostClass::Map => self.convert_map(value, parent),
            HostClass::Set => self.convert_set(value, parent),
            HostClass::Throwable => self.convert_throwable(value),
        }
    }

    fn convert_fallback(
        &self,
        value: &E::Local,
        parent: Option<&Lineage<'_, E::Local>>,
    ) -> BridgeResult<C::Value> {
        let class_name = self.env.class_name(value)?;
        let fallback = Fallback::of(&class_name, &self.config);
        trace!(class_name = %class_name, ?fallback, "dispatching by class name");
        match fallback {
            Fallback::Unit => Ok(self.ctx.undefined()),
            Fallback::PrimitiveArray(kind) => self.convert_primitive_array(value, kind),
            Fallback::ObjectArray => self.convert_object_array(value, parent),
            Fallback::Unsupported => Err(BridgeError::UnsupportedType(class_name)),
        }
    }
}
