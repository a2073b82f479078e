//! Graph converter: materializes descriptor trees into live objects.
//!
//! Conversion walks a descriptor depth-first, resolving constructor arguments,
//! options and children before constructing the node itself. Identity is
//! tracked with an explicit visited set (id to handle) threaded through the
//! walk, and a node's slot is reserved before its dependencies are converted,
//! so a back-reference to an ancestor resolves to the ancestor's handle instead
//! of recursing.
//!
//! A converter is one all-or-nothing unit of work: on failure,
//! [`GraphConverter::rollback`] discards everything it created.

use std::collections::{BTreeMap, HashMap};

use serde_json::{Map, Value};

use crate::argument::Argument;
use crate::descriptor::{is_tagged, Descriptor, ObjectId};
use crate::error::{MapError, MapResult};
use crate::event::EventRouter;
use crate::factory::Construction;
use crate::kind::{LayerKind, ObjectKind, TypeTag};
use crate::object::{Decoration, LiveObject};
use crate::registry::{Handle, ObjectRegistry};

/// Recursive materializer for one conversion call.
#[derive(Debug)]
pub struct GraphConverter<'r> {
    router: &'r EventRouter,
    visited: HashMap<ObjectId, Handle>,
    created: Vec<Handle>,
}

impl<'r> GraphConverter<'r> {
    /// Start a conversion call.
    #[must_use]
    pub fn new(router: &'r EventRouter) -> Self {
        Self {
            router,
            visited: HashMap::new(),
            created: Vec::new(),
        }
    }

    /// Handles created so far, in creation order.
    #[must_use]
    pub fn created(&self) -> &[Handle] {
        &self.created
    }

    /// Convert any JSON node.
    ///
    /// Primitives stay data, arrays and untagged objects are converted
    /// element-wise, basic value descriptors become [`Argument::Basic`] and
    /// entity descriptors are materialized into [`Argument::Object`].
    ///
    /// # Errors
    ///
    /// Propagates the first materialization error.
    pub fn convert(&mut self, registry: &mut ObjectRegistry, value: &Value) -> MapResult<Argument> {
        match value {
            Value::Array(items) => items
                .iter()
                .map(|item| self.convert(registry, item))
                .collect::<MapResult<Vec<_>>>()
                .map(Argument::List),
            Value::Object(fields) if !is_tagged(value) => fields
                .iter()
                .map(|(name, field)| Ok((name.clone(), self.convert(registry, field)?)))
                .collect::<MapResult<BTreeMap<_, _>>>()
                .map(Argument::Record),
            Value::Object(_) => {
                let descriptor = Descriptor::from_value(value)?;
                match TypeTag::parse(&descriptor.type_tag)? {
                    TypeTag::Basic(kind) => kind.converter()(value).map(Argument::Basic),
                    TypeTag::Layer(_) | TypeTag::Control(_) => {
                        let handle = self.materialize(registry, &descriptor)?;
                        let id = registry
                            .id_of(handle)
                            .cloned()
                            .unwrap_or_else(|| descriptor.id.clone().unwrap_or_else(ObjectId::generate));
                        Ok(Argument::Object { id, handle })
                    }
                }
            }
            primitive => Ok(Argument::Data(primitive.clone())),
        }
    }

    /// Materialize a raw JSON descriptor that must denote an entity.
    ///
    /// # Errors
    ///
    /// Returns [`MapError::InvalidDescriptor`] for untagged data or basic values.
    pub fn materialize_value(
        &mut self,
        registry: &mut ObjectRegistry,
        value: &Value,
    ) -> MapResult<Handle> {
        let descriptor = Descriptor::from_value(value)?;
        self.materialize(registry, &descriptor)
    }

    /// Materialize an entity descriptor, returning the existing object when its
    /// id is already known.
    ///
    /// # Errors
    ///
    /// Returns [`MapError::UnsupportedType`] for unknown tags anywhere in the
    /// subtree, and [`MapError::InvalidDescriptor`] for malformed nodes.
    pub fn materialize(
        &mut self,
        registry: &mut ObjectRegistry,
        descriptor: &Descriptor,
    ) -> MapResult<Handle> {
        let (kind, factory, control) = match TypeTag::parse(&descriptor.type_tag)? {
            TypeTag::Basic(kind) => {
                return Err(MapError::InvalidDescriptor(format!(
                    "{kind} is a basic value, not an entity"
                )))
            }
            TypeTag::Layer(kind) => (ObjectKind::Layer(kind), kind.factory(), None),
            TypeTag::Control(kind) => (ObjectKind::Control(kind), kind.factory(), Some(kind)),
        };

        let id = match &descriptor.id {
            Some(id) => id.clone(),
            None => {
                let id = ObjectId::generate();
                tracing::debug!(tag = %descriptor.type_tag, id = %id, "Generated id for descriptor");
                id
            }
        };

        if let Some(handle) = self.visited.get(&id) {
            return Ok(*handle);
        }
        if let Some(handle) = registry.lookup(id.as_str()) {
            self.visited.insert(id, handle);
            return Ok(handle);
        }

        let handle = registry.reserve(id.clone());
        self.visited.insert(id.clone(), handle);
        self.created.push(handle);

        let mut construction = Construction::new(descriptor.type_tag.clone());
        construction.control = control;
        for name in &descriptor.constructor_argument_names {
            let value = descriptor.attributes.get(name).ok_or_else(|| {
                MapError::InvalidDescriptor(format!(
                    "{} {id}: missing constructor argument '{name}'",
                    descriptor.type_tag
                ))
            })?;
            let arg = self.convert(registry, value)?;
            construction.args.push((name.clone(), arg));
        }
        for (name, value) in &descriptor.attributes {
            if descriptor.constructor_argument_names.contains(name) {
                continue;
            }
            let arg = self.convert(registry, value)?;
            construction.options.insert(name.clone(), arg);
        }

        match kind {
            ObjectKind::Layer(LayerKind::GeoJson) => {
                construction.raw_children.clone_from(&descriptor.children);
            }
            ObjectKind::Layer(layer) if layer.is_container() => {
                for child in &descriptor.children {
                    let child = self.materialize_value(registry, child)?;
                    construction.children.push(child);
                }
            }
            _ if descriptor.children.is_empty() => {}
            _ => {
                return Err(MapError::InvalidDescriptor(format!(
                    "{} {id} cannot have children",
                    descriptor.type_tag
                )))
            }
        }

        let state = factory(&construction)?;
        let options: Map<String, Value> = construction
            .args
            .iter()
            .map(|(name, arg)| (name.clone(), arg.to_plain()))
            .chain(construction.plain_options(&[]))
            .collect();

        let mut object = LiveObject::new(id, kind, state).with_options(options);
        object.tooltip = descriptor.tooltip.clone().map(Decoration::from);
        object.popup = descriptor.popup.clone().map(Decoration::from);
        for event in &descriptor.events {
            self.router.bind(&mut object, event);
        }

        registry.fill(handle, object)?;
        Ok(handle)
    }

    /// Keep everything created and end the call.
    pub fn commit(self) -> Vec<Handle> {
        self.created
    }

    /// Discard everything created by this call, newest first.
    pub fn rollback(self, registry: &mut ObjectRegistry) {
        for handle in self.created.into_iter().rev() {
            registry.discard(handle);
        }
    }
}

/// Materialize a batch of entity descriptors as one all-or-nothing call.
///
/// # Errors
///
/// Returns the first error; nothing from the batch remains registered.
pub fn materialize_all(
    registry: &mut ObjectRegistry,
    router: &EventRouter,
    values: &[Value],
) -> MapResult<Vec<Handle>> {
    let mut converter = GraphConverter::new(router);
    let mut handles = Vec::with_capacity(values.len());
    for value in values {
        match converter.materialize_value(registry, value) {
            Ok(handle) => handles.push(handle),
            Err(e) => {
                tracing::warn!(error = %e, "Conversion failed, rolling back");
                converter.rollback(registry);
                return Err(e);
            }
        }
    }
    converter.commit();
    Ok(handles)
}
