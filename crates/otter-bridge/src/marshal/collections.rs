//! Lists, sets, maps and string-keyed objects.

use tracing::trace;

use super::{Lineage, Marshaller};
use crate::error::{BridgeError, BridgeResult};
use crate::host::{HostClass, HostEnv, LocalRef};
use crate::script::ScriptContext;

impl<E: HostEnv + ?Sized, C: ScriptContext + ?Sized> Marshaller<'_, E, C> {
    pub(super) fn convert_list(
        &self,
        list: &E::Local,
        parent: Option<&Lineage<'_, E::Local>>,
    ) -> BridgeResult<C::Value> {
        let lineage = self.guard.enter(parent, list)?;
        let size = self.env.list_size(list)?;
        let array = self.ctx.new_array();

        for index in 0..size {
            let element = LocalRef::adopt(self.env, self.env.list_get(list, index)?);
            let converted = self.convert_element(&lineage, element.as_deref())?;
            self.ctx.set_index(&array, index, converted)?;
        }

        trace!(size, "converted host list");
        Ok(array)
    }

    pub(super) fn convert_set(
        &self,
        set: &E::Local,
        parent: Option<&Lineage<'_, E::Local>>,
    ) -> BridgeResult<C::Value> {
        let lineage = self.guard.enter(parent, set)?;
        let iterator = LocalRef::new(self.env, self.env.set_iterator(set)?);
        let members = self.ctx.new_array();

        let mut index = 0u32;
        while self.env.iterator_has_next(&iterator)? {
            let member = LocalRef::adopt(self.env, self.env.iterator_next(&iterator)?);
            let converted = self.convert_element(&lineage, member.as_deref())?;
            self.ctx.set_index(&members, index, converted)?;
            index += 1;
        }

        trace!(size = index, "converted host set");
        self.construct_global(&self.config.set_constructor, members)
    }

    pub(super) fn convert_map(
        &self,
        map: &E::Local,
        parent: Option<&Lineage<'_, E::Local>>,
    ) -> BridgeResult<C::Value> {
        let lineage = self.guard.enter(parent, map)?;
        let iterator = LocalRef::new(self.env, self.env.map_entry_iterator(map)?);
        let entries = self.ctx.new_array();

        let mut index = 0u32;
        while self.env.iterator_has_next(&iterator)? {
            let entry = self.next_entry(&iterator)?;
            let key = LocalRef::adopt(self.env, self.env.entry_key(&entry)?);
            let value = LocalRef::adopt(self.env, self.env.entry_value(&entry)?);

            let pair = self.ctx.new_array();
            let converted = self.convert_element(&lineage, key.as_deref())?;
            self.ctx.set_index(&pair, 0, converted)?;
            let converted = self.convert_element(&lineage, value.as_deref())?;
            self.ctx.set_index(&pair, 1, converted)?;
            self.ctx.set_index(&entries, index, pair)?;
            index += 1;
        }

        trace!(size = index, "converted host map");
        self.construct_global(&self.config.map_constructor, entries)
    }

    /// Convert a map whose keys must all be strings into a plain object.
    ///
    /// Entries are converted first and only copied onto the object once the
    /// last one succeeded, so a failure never leaves a half-filled object.
    pub(super) fn convert_string_keyed(
        &self,
        object: &E::Local,
        parent: Option<&Lineage<'_, E::Local>>,
    ) -> BridgeResult<C::Value> {
        let lineage = self.guard.enter(parent, object)?;
        let iterator = LocalRef::new(self.env, self.env.map_entry_iterator(object)?);

        let mut properties = Vec::new();
        while self.env.iterator_has_next(&iterator)? {
            let entry = self.next_entry(&iterator)?;
            let key = LocalRef::adopt(self.env, self.env.entry_key(&entry)?);
            self.guard.check(self.env, &lineage, key.as_deref())?;
            let key = match key.as_deref() {
                Some(key) if self.env.is_instance_of(key, HostClass::String)? => {
                    self.env.string_value(key)?
                }
                _ => return Err(BridgeError::NonStringKey),
            };

            let value = LocalRef::adopt(self.env, self.env.entry_value(&entry)?);
            let converted = self.convert_element(&lineage, value.as_deref())?;
            properties.push((key, converted));
        }

        let result = self.ctx.new_object();
        for (key, value) in properties {
            self.ctx.set_property(&result, &key, value)?;
        }
        Ok(result)
    }

    /// Cycle-check and convert a value held by the innermost container
    pub(super) fn convert_element(
        &self,
        lineage: &Lineage<'_, E::Local>,
        element: Option<&E::Local>,
    ) -> BridgeResult<C::Value> {
        self.guard.check(self.env, lineage, element)?;
        self.convert_value(element, Some(lineage))
    }

    fn next_entry(&self, iterator: &E::Local) -> BridgeResult<LocalRef<'_, E>> {
        LocalRef::adopt(self.env, self.env.iterator_next(iterator)?)
            .ok_or_else(|| BridgeError::host("map iterator yielded a null entry"))
    }

    fn construct_global(&self, name: &str, argument: C::Value) -> BridgeResult<C::Value> {
        let constructor = self
            .ctx
            .global_constructor(name)
            .ok_or_else(|| BridgeError::ConstructorNotFound(name.to_string()))?;
        self.ctx.construct(&constructor, &[argument])
    }
}
