//! Object registry: the arena every live object lives in.
//!
//! Objects are stored in generational slots and referenced by [`Handle`].
//! Containers hold handles, never nested copies, so shared and cyclic graphs are
//! representable. Lookup by id consults, in order:
//!
//! 1. the root map,
//! 2. the flat control index,
//! 3. the top-level layer index (layers not owned by any container),
//! 4. a pre-order depth-first walk over every container, children in order.
//!
//! The first match wins and a miss is a miss: there is no fallback to the root.
//! Every live object is also kept in a flat id index, so a miss is answered
//! without walking anything and the walk only confirms nested hits.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use crate::descriptor::ObjectId;
use crate::error::{MapError, MapResult};
use crate::kind::ObjectKind;
use crate::object::{LiveObject, LiveState};

/// Generational index of a slot in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle {
    index: u32,
    generation: u32,
}

impl Handle {
    pub(crate) fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    fn slot(self) -> usize {
        self.index as usize
    }
}

#[derive(Debug)]
enum Entry {
    Vacant,
    Reserved(ObjectId),
    Live(Box<LiveObject>),
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    owners: u32,
    entry: Entry,
}

/// Arena of live objects with id lookup.
#[derive(Debug, Default)]
pub struct ObjectRegistry {
    slots: Vec<Slot>,
    free: Vec<u32>,
    controls: BTreeMap<ObjectId, Handle>,
    layers: BTreeMap<ObjectId, Handle>,
    index: HashMap<ObjectId, Handle>,
    /// Live objects that hold handles to others.
    containers: BTreeSet<Handle>,
    root: Option<Handle>,
}

impl ObjectRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Whether no object is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Handle of the root map, once registered.
    #[must_use]
    pub fn root(&self) -> Option<Handle> {
        self.root
    }

    /// Claim a slot for an id before its object exists.
    ///
    /// Reserved slots are invisible to [`lookup`](Self::lookup) but their handles
    /// can already be referenced, which is what lets cyclic descriptors resolve.
    pub fn reserve(&mut self, id: ObjectId) -> Handle {
        let entry = Entry::Reserved(id);
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.entry = entry;
            slot.owners = 0;
            Handle::new(index, slot.generation)
        } else {
            let index = u32::try_from(self.slots.len()).unwrap_or(u32::MAX);
            self.slots.push(Slot {
                generation: 0,
                owners: 0,
                entry,
            });
            Handle::new(index, 0)
        }
    }

    /// Store the object for a reserved slot and index it.
    ///
    /// Owned children are adopted: they leave the top-level index unless the
    /// adoption closes a cycle, in which case they stay indexed so that the
    /// cycle remains reachable.
    ///
    /// # Errors
    ///
    /// Returns [`MapError::InvalidDescriptor`] if the handle is stale, already
    /// filled, reserved under a different id, or if another live object
    /// already has the id.
    pub fn fill(&mut self, handle: Handle, object: LiveObject) -> MapResult<()> {
        match self.slot(handle).map(|slot| &slot.entry) {
            Some(Entry::Reserved(id)) if id == object.id() => {}
            _ => {
                return Err(MapError::InvalidDescriptor(format!(
                    "cannot register {}: slot is not reserved for it",
                    object.id()
                )))
            }
        }
        if self.index.contains_key(object.id()) {
            return Err(MapError::InvalidDescriptor(format!(
                "duplicate id {}",
                object.id()
            )));
        }

        let id = object.id().clone();
        let kind = object.kind();
        let owned = object.owned();
        if holds_handles(&object) {
            self.containers.insert(handle);
        }
        if let Some(slot) = self.slot_mut(handle) {
            slot.entry = Entry::Live(Box::new(object));
        }
        self.index.insert(id.clone(), handle);

        match kind {
            ObjectKind::Map => self.root = Some(handle),
            ObjectKind::Control(_) => {
                self.controls.insert(id.clone(), handle);
            }
            ObjectKind::Layer(_) => {
                if self.owners(handle) == 0 {
                    self.layers.insert(id.clone(), handle);
                }
            }
        }
        for child in owned {
            self.adopt(handle, child);
        }
        tracing::debug!(id = %id, kind = kind.tag(), "Registered object");
        Ok(())
    }

    /// Reserve and fill in one step.
    ///
    /// # Errors
    ///
    /// Returns [`MapError::InvalidDescriptor`] if the id is already registered.
    pub fn register(&mut self, object: LiveObject) -> MapResult<Handle> {
        if self.index.contains_key(object.id()) {
            return Err(MapError::InvalidDescriptor(format!(
                "duplicate id {}",
                object.id()
            )));
        }
        let handle = self.reserve(object.id().clone());
        self.fill(handle, object)?;
        Ok(handle)
    }

    /// Find a live object by id.
    #[must_use]
    pub fn lookup(&self, id: &str) -> Option<Handle> {
        let indexed = *self.index.get(id)?;
        if self.root == Some(indexed) {
            return Some(indexed);
        }
        if let Some(handle) = self.controls.get(id) {
            return Some(*handle);
        }
        if let Some(handle) = self.layers.get(id) {
            return Some(*handle);
        }
        self.preorder().into_iter().find(|handle| *handle == indexed)
    }

    /// Find a live object by id, failing with [`MapError::TargetNotFound`].
    ///
    /// # Errors
    ///
    /// Returns [`MapError::TargetNotFound`] when no live object has the id.
    pub fn resolve(&self, id: &str) -> MapResult<Handle> {
        self.lookup(id)
            .ok_or_else(|| MapError::TargetNotFound(id.to_string()))
    }

    /// Borrow a live object.
    #[must_use]
    pub fn get(&self, handle: Handle) -> Option<&LiveObject> {
        match &self.slot(handle)?.entry {
            Entry::Live(object) => Some(object),
            _ => None,
        }
    }

    /// Mutably borrow a live object.
    pub fn get_mut(&mut self, handle: Handle) -> Option<&mut LiveObject> {
        match &mut self.slot_mut(handle)?.entry {
            Entry::Live(object) => Some(object),
            _ => None,
        }
    }

    /// Borrow a live object by id.
    #[must_use]
    pub fn object(&self, id: &str) -> Option<&LiveObject> {
        self.lookup(id).and_then(|handle| self.get(handle))
    }

    /// Id of a live or reserved slot.
    #[must_use]
    pub fn id_of(&self, handle: Handle) -> Option<&ObjectId> {
        match &self.slot(handle)?.entry {
            Entry::Live(object) => Some(object.id()),
            Entry::Reserved(id) => Some(id),
            Entry::Vacant => None,
        }
    }

    /// Number of containers owning a handle.
    #[must_use]
    pub fn owners(&self, handle: Handle) -> u32 {
        self.slot(handle).map_or(0, |slot| slot.owners)
    }

    /// Record that `parent` owns `child`.
    pub fn adopt(&mut self, parent: Handle, child: Handle) {
        let closes_cycle = child == parent || self.reaches(child, parent);
        let Some(slot) = self.slot_mut(child) else {
            return;
        };
        slot.owners += 1;
        if closes_cycle {
            return;
        }
        if let Some(id) = self.get(child).map(|o| o.id().clone()) {
            if self.layers.get(&id) == Some(&child) {
                self.layers.remove(&id);
            }
        }
    }

    /// Record that `parent` no longer owns `child`. A child left without
    /// owners returns to the top-level index.
    pub fn release(&mut self, child: Handle) {
        let Some(slot) = self.slot_mut(child) else {
            return;
        };
        slot.owners = slot.owners.saturating_sub(1);
        if slot.owners > 0 {
            return;
        }
        if let Some(object) = self.get(child) {
            if matches!(object.kind(), ObjectKind::Layer(_)) {
                let id = object.id().clone();
                self.layers.insert(id, child);
            }
        }
    }

    /// Unregister an object and destroy it, together with every child it was
    /// the last owner of. Every reference to a destroyed handle is purged.
    ///
    /// Returns the destroyed ids in destruction order.
    ///
    /// # Errors
    ///
    /// Returns [`MapError::TargetNotFound`] if the id is not registered, and
    /// [`MapError::InvalidArgument`] for the root map.
    pub fn unregister(&mut self, id: &str) -> MapResult<Vec<ObjectId>> {
        let handle = self.resolve(id)?;
        if Some(handle) == self.root {
            return Err(MapError::invalid_argument(
                "unregister",
                "the root map cannot be removed",
            ));
        }
        Ok(self.destroy(handle))
    }

    fn destroy(&mut self, handle: Handle) -> Vec<ObjectId> {
        let mut destroyed = Vec::new();
        let mut pending = vec![handle];
        while let Some(handle) = pending.pop() {
            let Some(object) = self.vacate(handle) else {
                continue;
            };
            for child in object.owned() {
                if self.get(child).is_none() {
                    continue;
                }
                let orphaned = self.slot(child).is_some_and(|slot| slot.owners <= 1);
                if orphaned && !self.is_attached(child) {
                    pending.push(child);
                } else {
                    self.release(child);
                }
            }
            tracing::debug!(id = %object.id(), "Destroyed object");
            destroyed.push(object.id().clone());
        }
        destroyed
    }

    /// Drop a freshly created object during rollback. Children are released,
    /// not destroyed.
    pub fn discard(&mut self, handle: Handle) {
        if let Some(object) = self.vacate(handle) {
            for child in object.owned() {
                self.release(child);
            }
            tracing::debug!(id = %object.id(), "Discarded object");
        }
    }

    /// Empty a slot, drop its index entries and purge references to it.
    fn vacate(&mut self, handle: Handle) -> Option<LiveObject> {
        let slot = self.slot_mut(handle)?;
        let entry = std::mem::replace(&mut slot.entry, Entry::Vacant);
        slot.generation = slot.generation.wrapping_add(1);
        slot.owners = 0;
        self.free.push(handle.index);

        let object = match entry {
            Entry::Live(object) => *object,
            Entry::Reserved(_) | Entry::Vacant => return None,
        };
        let id = object.id();
        if self.index.get(id) == Some(&handle) {
            self.index.remove(id);
        }
        self.containers.remove(&handle);
        if self.controls.get(id) == Some(&handle) {
            self.controls.remove(id);
        }
        if self.layers.get(id) == Some(&handle) {
            self.layers.remove(id);
        }
        if self.root == Some(handle) {
            self.root = None;
        }
        for container in &self.containers {
            let Some(slot) = self.slots.get_mut(container.slot()) else {
                continue;
            };
            if slot.generation != container.generation {
                continue;
            }
            if let Entry::Live(other) = &mut slot.entry {
                other.forget(handle);
            }
        }
        Some(object)
    }

    /// Whether the handle is attached directly to the root map.
    #[must_use]
    pub fn is_attached(&self, handle: Handle) -> bool {
        self.root
            .and_then(|root| self.get(root))
            .and_then(LiveObject::as_map)
            .is_some_and(|view| view.layers.contains(&handle) || view.controls.contains(&handle))
    }

    /// Whether `to` is reachable from `from` through owned handles.
    #[must_use]
    pub fn reaches(&self, from: Handle, to: Handle) -> bool {
        let mut seen = HashSet::new();
        let mut stack = vec![from];
        while let Some(handle) = stack.pop() {
            if handle == to {
                return true;
            }
            if !seen.insert(handle) {
                continue;
            }
            if let Some(object) = self.get(handle) {
                stack.extend(object.owned());
            }
        }
        false
    }

    /// Every live object reachable for lookup, in deterministic pre-order:
    /// the map's attachments, then each control's entries, then each top-level
    /// layer's subtree. Each object appears once.
    #[must_use]
    pub fn preorder(&self) -> Vec<Handle> {
        let mut roots: Vec<Handle> = Vec::new();
        if let Some(root) = self.root {
            roots.push(root);
        }
        roots.extend(self.controls.values().copied());
        roots.extend(self.layers.values().copied());

        let mut seen = HashSet::new();
        let mut order = Vec::new();
        for root in roots {
            let mut stack = vec![root];
            while let Some(handle) = stack.pop() {
                if !seen.insert(handle) {
                    continue;
                }
                let Some(object) = self.get(handle) else {
                    continue;
                };
                order.push(handle);
                let children = object.traversal_children();
                stack.extend(children.into_iter().rev());
            }
        }
        order
    }

    /// Ids of every live object, sorted.
    #[must_use]
    pub fn ids(&self) -> Vec<ObjectId> {
        let mut ids: Vec<ObjectId> = self.index.keys().cloned().collect();
        ids.sort();
        ids
    }

    fn slot(&self, handle: Handle) -> Option<&Slot> {
        self.slots
            .get(handle.slot())
            .filter(|slot| slot.generation == handle.generation)
    }

    fn slot_mut(&mut self, handle: Handle) -> Option<&mut Slot> {
        self.slots
            .get_mut(handle.slot())
            .filter(|slot| slot.generation == handle.generation)
    }
}

fn holds_handles(object: &LiveObject) -> bool {
    matches!(
        object.state(),
        LiveState::Map(_) | LiveState::Group(_) | LiveState::Control(_)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kind::{ControlKind, LayerKind};
    use crate::object::{ControlState, GroupState, LiveState, MapView, MarkerState};
    use crate::value::{LatLng, Point};

    fn marker(id: &str) -> LiveObject {
        LiveObject::new(
            ObjectId::new(id),
            ObjectKind::Layer(LayerKind::Marker),
            LiveState::Marker(MarkerState {
                lat_lng: LatLng::new(0.0, 0.0),
                icon: None,
                opacity: 1.0,
                z_index_offset: 0.0,
            }),
        )
    }

    fn group(id: &str, children: Vec<Handle>) -> LiveObject {
        LiveObject::new(
            ObjectId::new(id),
            ObjectKind::Layer(LayerKind::LayerGroup),
            LiveState::Group(GroupState { children }),
        )
    }

    fn map(id: &str) -> LiveObject {
        LiveObject::new(
            ObjectId::new(id),
            ObjectKind::Map,
            LiveState::Map(MapView {
                center: LatLng::new(0.0, 0.0),
                zoom: 1.0,
                min_zoom: 0.0,
                max_zoom: 18.0,
                max_bounds: None,
                size: Point::new(800.0, 600.0),
                layers: Vec::new(),
                controls: Vec::new(),
            }),
        )
    }

    #[test]
    fn test_register_and_lookup() {
        let mut registry = ObjectRegistry::new();
        let handle = registry.register(marker("m1")).expect("should register");
        assert_eq!(registry.lookup("m1"), Some(handle));
        assert_eq!(registry.len(), 1);
        assert!(registry.lookup("m2").is_none());
        assert!(matches!(
            registry.resolve("m2"),
            Err(MapError::TargetNotFound(id)) if id == "m2"
        ));
    }

    #[test]
    fn test_duplicate_registration_is_rejected() {
        let mut registry = ObjectRegistry::new();
        registry.register(marker("m1")).expect("should register");
        assert!(registry.register(marker("m1")).is_err());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_reserved_slot_is_invisible_until_filled() {
        let mut registry = ObjectRegistry::new();
        let handle = registry.reserve(ObjectId::new("m1"));
        assert!(registry.lookup("m1").is_none());
        assert_eq!(registry.id_of(handle), Some(&ObjectId::new("m1")));
        registry.fill(handle, marker("m1")).expect("should fill");
        assert_eq!(registry.lookup("m1"), Some(handle));
    }

    #[test]
    fn test_fill_rejects_mismatched_id() {
        let mut registry = ObjectRegistry::new();
        let handle = registry.reserve(ObjectId::new("a"));
        assert!(registry.fill(handle, marker("b")).is_err());
    }

    #[test]
    fn test_nested_children_found_by_depth_first_walk() {
        let mut registry = ObjectRegistry::new();
        let leaf = registry.register(marker("leaf")).expect("should register");
        let inner = registry
            .register(group("inner", vec![leaf]))
            .expect("should register");
        let outer = registry
            .register(group("outer", vec![inner]))
            .expect("should register");

        assert!(!registry.layers.contains_key("leaf"));
        assert!(!registry.layers.contains_key("inner"));
        assert_eq!(registry.lookup("leaf"), Some(leaf));
        assert_eq!(registry.lookup("inner"), Some(inner));
        assert_eq!(registry.preorder(), vec![outer, inner, leaf]);
    }

    #[test]
    fn test_controls_have_their_own_index() {
        let mut registry = ObjectRegistry::new();
        let control = LiveObject::new(
            ObjectId::new("zoom-1"),
            ObjectKind::Control(ControlKind::Zoom),
            LiveState::Control(ControlState {
                position: "topleft".to_string(),
                collapsed: false,
                base_layers: Vec::new(),
                overlays: Vec::new(),
            }),
        );
        let handle = registry.register(control).expect("should register");
        assert_eq!(registry.controls.get("zoom-1"), Some(&handle));
        assert!(registry.layers.is_empty());
    }

    #[test]
    fn test_unregister_cascades_to_sole_owned_children() {
        let mut registry = ObjectRegistry::new();
        let shared = registry.register(marker("shared")).expect("should register");
        let only = registry.register(marker("only")).expect("should register");
        registry
            .register(group("a", vec![shared, only]))
            .expect("should register");
        registry
            .register(group("b", vec![shared]))
            .expect("should register");

        let destroyed = registry.unregister("a").expect("should unregister");
        assert_eq!(destroyed, vec![ObjectId::new("a"), ObjectId::new("only")]);
        assert!(registry.lookup("a").is_none());
        assert!(registry.lookup("only").is_none());
        assert_eq!(registry.lookup("shared"), Some(shared));
        assert_eq!(registry.owners(shared), 1);
    }

    #[test]
    fn test_stale_handle_does_not_resolve() {
        let mut registry = ObjectRegistry::new();
        let old = registry.register(marker("m1")).expect("should register");
        registry.unregister("m1").expect("should unregister");
        let new = registry.register(marker("m2")).expect("should register");
        assert_eq!(old.index, new.index);
        assert!(registry.get(old).is_none());
        assert!(registry.get(new).is_some());
    }

    #[test]
    fn test_cycle_stays_reachable() {
        let mut registry = ObjectRegistry::new();
        let a = registry.reserve(ObjectId::new("a"));
        let b = registry
            .register(group("b", vec![a]))
            .expect("should register");
        registry
            .fill(a, group("a", vec![b]))
            .expect("should fill");

        assert_eq!(registry.lookup("a"), Some(a));
        assert_eq!(registry.lookup("b"), Some(b));
        assert_eq!(registry.preorder().len(), 2);

        registry.unregister("a").expect("should unregister");
        assert!(registry.is_empty());
    }

    #[test]
    fn test_root_map_is_found_first_and_cannot_be_removed() {
        let mut registry = ObjectRegistry::new();
        let root = registry.register(map("map")).expect("should register");
        assert_eq!(registry.root(), Some(root));
        assert_eq!(registry.lookup("map"), Some(root));
        assert!(registry.unregister("map").is_err());
    }

    #[test]
    fn test_discard_releases_children() {
        let mut registry = ObjectRegistry::new();
        let child = registry.register(marker("child")).expect("should register");
        let parent = registry
            .register(group("parent", vec![child]))
            .expect("should register");
        assert!(!registry.layers.contains_key("child"));

        registry.discard(parent);
        assert!(registry.lookup("parent").is_none());
        assert_eq!(registry.layers.get("child"), Some(&child));
        assert_eq!(registry.owners(child), 0);
    }

    #[test]
    fn test_id_index_follows_registration_and_removal() {
        let mut registry = ObjectRegistry::new();
        let old = registry.register(marker("m1")).expect("should register");
        assert_eq!(registry.index.get("m1"), Some(&old));

        registry.unregister("m1").expect("should unregister");
        assert!(registry.index.is_empty());
        assert!(registry.lookup("m1").is_none());

        let new = registry.register(marker("m1")).expect("should register again");
        assert_ne!(old, new);
        assert_eq!(registry.lookup("m1"), Some(new));
        assert_eq!(registry.ids(), vec![ObjectId::new("m1")]);
    }

    #[test]
    fn test_fill_rejects_id_of_another_live_object() {
        let mut registry = ObjectRegistry::new();
        let live = registry.register(marker("m1")).expect("should register");
        let second = registry.reserve(ObjectId::new("m1"));
        assert!(matches!(
            registry.fill(second, marker("m1")),
            Err(MapError::InvalidDescriptor(_))
        ));
        assert_eq!(registry.lookup("m1"), Some(live));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_wide_group_lookup_and_removal() {
        let mut registry = ObjectRegistry::new();
        let root = registry.register(map("map")).expect("should register");
        let children: Vec<Handle> = (0..2000)
            .map(|i| registry.register(marker(&format!("p{i}"))).expect("should register"))
            .collect();
        let group_handle = registry
            .register(group("paths", children.clone()))
            .expect("should register");
        assert!(registry.containers.contains(&root));
        assert!(registry.containers.contains(&group_handle));
        assert_eq!(registry.containers.len(), 2);

        assert!(registry.lookup("p2000").is_none());
        assert_eq!(registry.lookup("p1999"), Some(children[1999]));

        registry.unregister("p7").expect("should unregister");
        let Some(LiveState::Group(state)) = registry.get(group_handle).map(LiveObject::state) else {
            panic!("paths should be a group");
        };
        assert_eq!(state.children.len(), 1999);
        assert!(!state.children.contains(&children[7]));
        assert_eq!(registry.len(), 2001);
    }
}
