//! Primitive and object arrays.

use tracing::trace;

use super::{Lineage, Marshaller};
use crate::error::BridgeResult;
use crate::host::{HostEnv, LocalRef, PrimitiveArray, PrimitiveKind};
use crate::script::ScriptContext;

impl<E: HostEnv + ?Sized, C: ScriptContext + ?Sized> Marshaller<'_, E, C> {
    /// Primitive arrays are read in one bulk access. Integral elements keep
    /// the integer number subtype.
    pub(super) fn convert_primitive_array(
        &self,
        value: &E::Local,
        kind: PrimitiveKind,
    ) -> BridgeResult<C::Value> {
        let ctx = self.ctx;
        let elements = self.env.primitive_array(value, kind)?;
        trace!(descriptor = kind.descriptor(), len = elements.len(), "converting primitive array");

        let array = ctx.new_array();
        match elements {
            PrimitiveArray::Boolean(values) => self.fill(&array, values, |b| ctx.boolean(b))?,
            PrimitiveArray::Int(values) => self.fill(&array, values, |n| ctx.int64(i64::from(n)))?,
            PrimitiveArray::Long(values) => self.fill(&array, values, |n| ctx.int64(n))?,
            PrimitiveArray::Float(values) => {
                self.fill(&array, values, |n| ctx.float64(f64::from(n)))?
            }
            PrimitiveArray::Double(values) => self.fill(&array, values, |n| ctx.float64(n))?,
        }
        Ok(array)
    }

    fn fill<T>(
        &self,
        array: &C::Value,
        values: Vec<T>,
        make: impl Fn(T) -> C::Value,
    ) -> BridgeResult<()> {
        for (index, value) in (0u32..).zip(values) {
            self.ctx.set_index(array, index, make(value))?;
        }
        Ok(())
    }

    pub(super) fn convert_object_array(
        &self,
        value: &E::Local,
        parent: Option<&Lineage<'_, E::Local>>,
    ) -> BridgeResult<C::Value> {
        let lineage = self.guard.enter(parent, value)?;
        let length = self.env.array_length(value)?;
        let array = self.ctx.new_array();

        for index in 0..length {
            let element = LocalRef::adopt(self.env, self.env.array_element(value, index)?);
            let converted = self.convert_element(&lineage, element.as_deref())?;
            self.ctx.set_index(&array, index, converted)?;
        }

        trace!(length, "converted host object array");
        Ok(array)
    }
}
