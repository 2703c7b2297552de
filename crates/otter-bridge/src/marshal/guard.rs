//! Circular reference and nesting limits.

use tracing::warn;

use crate::config::CycleDetection;
use crate::error::{BridgeError, BridgeResult};
use crate::host::HostEnv;

/// Chain of containers enclosing the value being converted, innermost first.
///
/// Each link lives on the stack frame of the converter that owns the
/// container, so the chain costs nothing beyond the recursion itself.
pub struct Lineage<'a, L> {
    container: &'a L,
    parent: Option<&'a Lineage<'a, L>>,
    depth: usize,
}

impl<'a, L> Lineage<'a, L> {
    /// Immediately enclosing container
    pub fn container(&self) -> &'a L {
        self.container
    }

    /// Number of containers in the chain
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Containers from the innermost outward
    pub fn iter(&self) -> impl Iterator<Item = &'a L> + '_ {
        std::iter::successors(Some(self), |link| link.parent).map(|link| link.container)
    }
}

/// Cycle and depth policy applied while descending into containers
#[derive(Debug, Clone, Copy)]
pub struct CycleGuard {
    mode: CycleDetection,
    max_depth: Option<usize>,
}

impl CycleGuard {
    pub fn new(mode: CycleDetection, max_depth: Option<usize>) -> Self {
        Self { mode, max_depth }
    }

    /// Push `container` onto the chain, enforcing the depth limit
    pub fn enter<'a, L>(
        &self,
        parent: Option<&'a Lineage<'a, L>>,
        container: &'a L,
    ) -> BridgeResult<Lineage<'a, L>> {
        let depth = parent.map_or(1, |p| p.depth + 1);
        if let Some(max) = self.max_depth
            && depth > max
        {
            warn!(max_depth = max, "conversion depth limit reached");
            return Err(BridgeError::DepthExceeded(max));
        }
        Ok(Lineage {
            container,
            parent,
            depth,
        })
    }

    /// Fail if `element` is one of the guarded containers.
    ///
    /// `null` elements never form a cycle.
    pub fn check<E: HostEnv + ?Sized>(
        &self,
        env: &E,
        lineage: &Lineage<'_, E::Local>,
        element: Option<&E::Local>,
    ) -> BridgeResult<()> {
        let Some(element) = element else {
            return Ok(());
        };
        let circular = match self.mode {
            CycleDetection::Shallow => env.is_same_object(element, lineage.container())?,
            CycleDetection::Ancestors => {
                let mut found = false;
                for container in lineage.iter() {
                    if env.is_same_object(element, container)? {
                        found = true;
                        break;
                    }
                }
                found
            }
        };
        if circular {
            Err(BridgeError::CircularReference)
        } else {
            Ok(())
        }
    }
}
