//! Rendering engine seam.
//!
//! The engine that draws objects is external. It is told when objects are
//! attached, detached, changed or restacked, and when the viewport needs to be
//! measured again. [`HeadlessEngine`] records those calls instead of drawing.

use std::sync::{Arc, Mutex, PoisonError};

use crate::descriptor::ObjectId;
use crate::object::LiveObject;
use crate::value::{LatLng, Point};

/// Stacking direction for `bringToFront` / `bringToBack`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stacking {
    /// Above every sibling.
    Front,
    /// Below every sibling.
    Back,
}

/// A geolocation fix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Location {
    /// Position.
    pub lat_lng: LatLng,
    /// Accuracy radius in meters.
    pub accuracy: f64,
}

/// Trait for rendering engines.
pub trait RenderEngine: Send {
    /// An object became visible on the map.
    fn attach(&mut self, object: &LiveObject);

    /// An object left the map.
    fn detach(&mut self, id: &ObjectId);

    /// An attached or free-standing object changed state.
    fn update(&mut self, object: &LiveObject);

    /// Move an object above or below its siblings.
    fn restack(&mut self, id: &ObjectId, stacking: Stacking);

    /// The viewport must be measured again.
    fn invalidate_size(&mut self, size: Point);

    /// Ask for the device position.
    fn locate(&mut self) -> Option<Location> {
        None
    }
}

/// A call received by a [`HeadlessEngine`].
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    /// [`RenderEngine::attach`].
    Attach(ObjectId),
    /// [`RenderEngine::detach`].
    Detach(ObjectId),
    /// [`RenderEngine::update`].
    Update(ObjectId),
    /// [`RenderEngine::restack`].
    Restack(ObjectId, Stacking),
    /// [`RenderEngine::invalidate_size`].
    InvalidateSize(Point),
    /// [`RenderEngine::locate`].
    Locate,
}

/// Shared view of a headless engine's call journal.
#[derive(Debug, Default, Clone)]
pub struct EngineJournal {
    calls: Arc<Mutex<Vec<EngineCall>>>,
}

impl EngineJournal {
    fn push(&self, call: EngineCall) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
    }

    /// Copy of every recorded call.
    #[must_use]
    pub fn calls(&self) -> Vec<EngineCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Forget recorded calls.
    pub fn clear(&self) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Ids currently attached according to the journal.
    #[must_use]
    pub fn attached(&self) -> Vec<ObjectId> {
        let mut attached: Vec<ObjectId> = Vec::new();
        for call in self.calls() {
            match call {
                EngineCall::Attach(id) if !attached.contains(&id) => attached.push(id),
                EngineCall::Detach(id) => attached.retain(|a| *a != id),
                _ => {}
            }
        }
        attached
    }
}

/// Engine that records calls without drawing.
#[derive(Debug, Default)]
pub struct HeadlessEngine {
    journal: EngineJournal,
    location: Option<Location>,
}

impl HeadlessEngine {
    /// Create a headless engine.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Report a fixed position to `locate`.
    #[must_use]
    pub fn with_location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    /// Handle on the call journal.
    #[must_use]
    pub fn journal(&self) -> EngineJournal {
        self.journal.clone()
    }
}

impl RenderEngine for HeadlessEngine {
    fn attach(&mut self, object: &LiveObject) {
        tracing::trace!(id = %object.id(), kind = object.kind().tag(), "Headless attach");
        self.journal.push(EngineCall::Attach(object.id().clone()));
    }

    fn detach(&mut self, id: &ObjectId) {
        tracing::trace!(id = %id, "Headless detach");
        self.journal.push(EngineCall::Detach(id.clone()));
    }

    fn update(&mut self, object: &LiveObject) {
        self.journal.push(EngineCall::Update(object.id().clone()));
    }

    fn restack(&mut self, id: &ObjectId, stacking: Stacking) {
        self.journal.push(EngineCall::Restack(id.clone(), stacking));
    }

    fn invalidate_size(&mut self, size: Point) {
        tracing::debug!("Headless viewport {}x{}", size.x, size.y);
        self.journal.push(EngineCall::InvalidateSize(size));
    }

    fn locate(&mut self) -> Option<Location> {
        self.journal.push(EngineCall::Locate);
        self.location
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kind::{LayerKind, ObjectKind};
    use crate::object::{GroupState, LiveState};

    #[test]
    fn test_journal_tracks_attachment() {
        let mut engine = HeadlessEngine::new();
        let journal = engine.journal();
        let object = LiveObject::new(
            ObjectId::new("g"),
            ObjectKind::Layer(LayerKind::LayerGroup),
            LiveState::Group(GroupState::default()),
        );

        engine.attach(&object);
        engine.update(&object);
        assert_eq!(journal.attached(), vec![ObjectId::new("g")]);

        engine.detach(object.id());
        assert!(journal.attached().is_empty());
        assert_eq!(journal.calls().len(), 3);
    }

    #[test]
    fn test_locate_reports_configured_position() {
        let mut engine = HeadlessEngine::new();
        assert!(engine.locate().is_none());

        let fix = Location {
            lat_lng: LatLng::new(1.0, 2.0),
            accuracy: 5.0,
        };
        let mut engine = HeadlessEngine::new().with_location(fix);
        assert_eq!(engine.locate(), Some(fix));
        assert_eq!(engine.journal().calls(), vec![EngineCall::Locate]);
    }
}
