//! A synchronizer wired to the in-memory doubles.

use prism_core::ids::{MaterialId, MaterialRef, NodeRef, ShapeHandle, TimeValue};
use prism_core::settings::SyncSettings;
use prism_sync::synchronizer::{NodeState, SyncContext, Synchronizer};

use crate::host::MockHost;
use crate::parser::ScriptedParser;
use crate::scene_backend::{RecordingBackend, ShapeState};

pub struct SyncHarness {
    pub host: MockHost,
    pub backend: RecordingBackend,
    pub parser: ScriptedParser,
    pub sync: Synchronizer,
    pub time: TimeValue,
}

impl Default for SyncHarness {
    fn default() -> Self {
        Self::new(SyncSettings::default())
    }
}

impl SyncHarness {
    #[must_use]
    pub fn new(settings: SyncSettings) -> Self {
        Self {
            host: MockHost::new(),
            backend: RecordingBackend::new(),
            parser: ScriptedParser::new(),
            sync: Synchronizer::new(settings),
            time: TimeValue::default(),
        }
    }

    /// Splits the harness into the synchronizer and a context over the rest.
    pub fn parts(&mut self) -> (&mut Synchronizer, SyncContext<'_>) {
        let ctx = SyncContext::new(&self.host, &mut self.backend, &mut self.parser, self.time);
        (&mut self.sync, ctx)
    }

    /// Syncs `node`, panicking on backend errors.
    pub fn sync_node(&mut self, node: NodeRef) -> NodeState {
        let (sync, mut ctx) = self.parts();
        match sync.sync_node(&mut ctx, node) {
            Ok(state) => state,
            Err(err) => panic!("sync_node({node:?}) failed: {err}"),
        }
    }

    pub fn flush(&mut self) -> usize {
        let (sync, mut ctx) = self.parts();
        match sync.flush_pending_rebuilds(&mut ctx) {
            Ok(rebuilt) => rebuilt,
            Err(err) => panic!("flush failed: {err}"),
        }
    }

    /// Backend handle of the shape in `slot` of `node`.
    #[must_use]
    pub fn handle(&self, node: NodeRef, slot: usize) -> Option<ShapeHandle> {
        let id = (*self.sync.node_shapes(node)?.get(slot)?)?;
        self.sync.shape(id).map(|record| record.handle)
    }

    /// Backend state of the shape in `slot` of `node`.
    #[must_use]
    pub fn shape_state(&self, node: NodeRef, slot: usize) -> Option<&ShapeState> {
        self.backend.shape(self.handle(node, slot)?)
    }

    /// Backend handles of every slot of `node`, `None` for empty slots.
    #[must_use]
    pub fn handles(&self, node: NodeRef) -> Vec<Option<ShapeHandle>> {
        self.sync
            .node_shapes(node)
            .map(|shapes| {
                shapes
                    .iter()
                    .map(|id| id.and_then(|id| self.sync.shape(id)).map(|r| r.handle))
                    .collect()
            })
            .unwrap_or_default()
    }

    #[must_use]
    pub fn material_id(&self, material: MaterialRef) -> Option<MaterialId> {
        self.sync.material_id(material)
    }
}
