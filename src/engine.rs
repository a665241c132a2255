use tracing::{debug, error, info};

use crate::{boundary::Shape, chart::ChartSpec, error::Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SeriesKind {
    Map,
    Bar,
    Treemap,
}

/// An interaction the engine reports back: which series, which named item.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChartClick {
    pub series: SeriesKind,
    pub name: String,
}

/// Draws chart specs. Implementations keep shapes by name; re-registering a
/// name replaces the old shape.
pub trait RenderEngine {
    fn register_shape(&mut self, shape: Shape);

    fn apply(&mut self, spec: &ChartSpec) -> Result<()>;

    fn resize(&mut self, _width_px: u32) {}

    fn dispose(&mut self);
}

/// Exclusive, scoped ownership of a mounted engine. Dropping the binding
/// disposes the engine.
pub struct EngineBinding<E: RenderEngine> {
    engine: Option<E>,
}

impl<E: RenderEngine> EngineBinding<E> {
    pub fn mount(engine: E) -> Self {
        debug!("render engine mounted");
        Self { engine: Some(engine) }
    }

    #[cfg(test)]
    pub fn is_mounted(&self) -> bool {
        self.engine.is_some()
    }

    pub fn register_shapes(&mut self, shapes: Vec<Shape>) {
        let Some(engine) = self.engine.as_mut() else {
            return;
        };
        let count = shapes.len();
        for shape in shapes {
            engine.register_shape(shape);
        }
        info!(shapes = count, "registered shapes");
    }

    /// Applies `spec`; a failing render pass is logged and skipped.
    pub fn apply(&mut self, spec: &ChartSpec) -> bool {
        let Some(engine) = self.engine.as_mut() else {
            return false;
        };
        match engine.apply(spec) {
            Ok(()) => true,
            Err(e) => {
                error!(error = %e, title = %spec.title().text, "render pass skipped");
                false
            }
        }
    }

    pub fn resize(&mut self, width_px: u32) {
        if let Some(engine) = self.engine.as_mut() {
            engine.resize(width_px);
        }
    }

    pub fn engine(&self) -> Option<&E> {
        self.engine.as_ref()
    }

    pub fn engine_mut(&mut self) -> Option<&mut E> {
        self.engine.as_mut()
    }

    pub fn unmount(&mut self) {
        if let Some(mut engine) = self.engine.take() {
            engine.dispose();
            debug!("render engine disposed");
        }
    }
}

impl<E: RenderEngine> Drop for EngineBinding<E> {
    fn drop(&mut self) {
        self.unmount();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::BoundaryDetail;
    use crate::test_support::{sample_set, RecordingEngine, map_spec};

    #[test]
    fn drop_disposes_engine_once() {
        let engine = RecordingEngine::default();
        let log = engine.log();
        {
            let mut binding = EngineBinding::mount(engine);
            binding.unmount();
            assert!(!binding.is_mounted());
        }
        assert_eq!(log.borrow().disposed, 1);

        let engine = RecordingEngine::default();
        let log = engine.log();
        drop(EngineBinding::mount(engine));
        assert_eq!(log.borrow().disposed, 1);
    }

    #[test]
    fn failed_apply_is_skipped() {
        let mut binding = EngineBinding::mount(RecordingEngine::default());
        // nothing registered yet, so the map shape is unknown
        assert!(!binding.apply(&map_spec("HK")));
        binding.register_shapes(sample_set(BoundaryDetail::Detailed).shapes());
        assert!(binding.apply(&map_spec("HK")));
        assert_eq!(binding.engine().unwrap().log().borrow().applied.len(), 1);
    }

    #[test]
    fn unmounted_binding_ignores_calls() {
        let engine = RecordingEngine::default();
        let log = engine.log();
        let mut binding = EngineBinding::mount(engine);
        binding.unmount();
        binding.register_shapes(sample_set(BoundaryDetail::Detailed).shapes());
        assert!(!binding.apply(&map_spec("HK")));
        binding.resize(100);
        assert!(log.borrow().shapes.is_empty());
        assert_eq!(log.borrow().disposed, 1);
    }
}
