//! Shared setup for conversion tests

#![allow(dead_code)]

use otter_bridge::{
    BridgeConfig, HostFixture, HostHeap, JsValue, LocalRef, Marshaller, Realm, ScriptResult,
};

/// A host heap and a script realm
pub struct Harness {
    pub heap: HostHeap,
    pub realm: Realm,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            heap: HostHeap::new(),
            realm: Realm::new(),
        }
    }

    /// Build `fixture` in the heap and return its root
    pub fn build(&self, fixture: serde_json::Value) -> Option<otter_bridge::HostRef> {
        let fixture: HostFixture = serde_json::from_value(fixture).unwrap();
        fixture.build(&self.heap).unwrap()
    }

    pub fn convert(&self, fixture: serde_json::Value) -> ScriptResult<JsValue> {
        self.convert_with(fixture, BridgeConfig::default())
    }

    pub fn convert_with(
        &self,
        fixture: serde_json::Value,
        config: BridgeConfig,
    ) -> ScriptResult<JsValue> {
        let root = self.build(fixture);
        self.convert_root(root, config)
    }

    pub fn convert_root(
        &self,
        root: Option<otter_bridge::HostRef>,
        config: BridgeConfig,
    ) -> ScriptResult<JsValue> {
        let local = root.map(|r| LocalRef::new(&self.heap, self.heap.local(r)));
        Marshaller::with_config(&self.heap, &self.realm, config).convert(local.as_deref())
    }

    /// Take the pending exception as `(name, message)`
    pub fn exception(&self) -> (String, String) {
        let error = self
            .realm
            .take_exception()
            .expect("an exception should be pending");
        let text = |key: &str| {
            error
                .get(key)
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_default()
        };
        (text("name"), text("message"))
    }

    /// Assert no host local reference and no stray script object survived
    pub fn assert_released(&self, baseline: usize) {
        assert_eq!(self.heap.live_local_refs(), 0, "leaked host local refs");
        assert_eq!(self.realm.live_objects(), baseline, "leaked script objects");
    }
}
