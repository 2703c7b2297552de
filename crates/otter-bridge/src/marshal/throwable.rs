use super::Marshaller;
use crate::error::BridgeResult;
use crate::host::{HostEnv, LocalRef};
use crate::script::ScriptContext;

impl<E: HostEnv + ?Sized, C: ScriptContext + ?Sized> Marshaller<'_, E, C> {
    /// Build an error object: `name` is the runtime class name, `message`
    /// the detail message (empty when absent), `stack` one string per frame.
    pub(super) fn convert_throwable(&self, throwable: &E::Local) -> BridgeResult<C::Value> {
        let name = self.env.class_name(throwable)?;
        let message = self.env.throwable_message(throwable)?.unwrap_or_default();
        let stack = self.stack_trace(throwable)?;

        let error = self.ctx.new_error();
        self.ctx.set_property(&error, "name", self.ctx.string(&name))?;
        self.ctx
            .set_property(&error, "message", self.ctx.string(&message))?;
        self.ctx.set_property(&error, "stack", stack)?;
        Ok(error)
    }

    fn stack_trace(&self, throwable: &E::Local) -> BridgeResult<C::Value> {
        let trace = LocalRef::new(self.env, self.env.throwable_stack_trace(throwable)?);
        let length = self.env.array_length(&trace)?;
        let frames = self.ctx.new_array();

        for index in 0..length {
            let frame = LocalRef::adopt(self.env, self.env.array_element(&trace, index)?);
            let line = match frame.as_deref() {
                Some(frame) => self.env.display_string(frame)?,
                None => "null".to_string(),
            };
            self.ctx.set_index(&frames, index, self.ctx.string(&line))?;
        }
        Ok(frames)
    }
}
