//! Component registry.
//!
//! One registry exists per plugin registration. While routes are registered it
//! renders schema nodes into fragments and records, for every fragment, the
//! document slot it belongs to. Assembly later patches those slots and places
//! components.
//!
//! # Identity
//!
//! | Node | Result of `add_schema` |
//! |------|------------------------|
//! | bound to a name (`ref_id` or a default component) | `$ref`, definition stored once |
//! | unnamed | inline fragment, use recorded under `(direction, id)` |
//!
//! Unnamed nodes used at two or more slots in one direction are promoted to
//! `__schema<N>` components at assembly.

use crate::config::{ComponentsOptions, DocumentOptions, Reused};
use crate::convert::{
    ConvertOptions, SCHEMA_REF_PREFIX, SchemaSink, base_name, convert_body, detached_body,
    output_differs,
};
use crate::document::{DocPath, SpecFlavor, is_ref, reference};
use crate::error::ComponentKind;
use crate::route::{MediaTypeObject, RequestBodyObject, ResponseObject, SlotSchema};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use tracing::{debug, trace, warn};
use zod_schema::{Direction, Schema, SchemaId};

/// Opaque handle to an unnamed schema entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentHandle(usize);

impl ComponentHandle {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Where a parameter is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterLocation {
    Query,
    Path,
    Header,
}

impl ParameterLocation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::Path => "path",
            Self::Header => "header",
        }
    }
}

impl fmt::Display for ParameterLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a pending registration holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegistrationKind {
    Schema(Direction),
    Parameter,
    Response,
    RequestBody,
}

/// Lifecycle of a pending registration within one assembly pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingState {
    /// Path recorded, slot not yet patched
    Registered,
    /// Slot patched, or replaced by a reference
    Resolved,
}

/// A fragment waiting to be merged into its document slot.
#[derive(Debug, Clone)]
pub struct PendingRegistration {
    /// Unnamed schema entry this registration is a use of
    pub handle: Option<ComponentHandle>,
    pub kind: RegistrationKind,
    pub path: DocPath,
    pub fragment: Value,
}

/// Arena entry of an unnamed schema node.
#[derive(Debug, Clone)]
pub struct SchemaEntry {
    pub direction: Direction,
    pub node: SchemaId,
    /// Fragment of the first rendering
    pub fragment: Value,
    /// Pending registrations using this node, in creation order, one per slot
    pub uses: Vec<usize>,
}

/// Definition stored under a component name.
#[derive(Debug, Clone)]
pub struct NamedComponent {
    pub fragment: Value,
    /// Node that produced the definition, `None` for raw JSON
    pub owner: Option<SchemaId>,
}

/// Registry of schema uses and named components.
pub struct ComponentRegistry {
    options: ConvertOptions,
    reused: Reused,
    default_names: HashMap<SchemaId, String>,
    handles: HashMap<(Direction, SchemaId), ComponentHandle>,
    arena: Vec<SchemaEntry>,
    named: BTreeMap<ComponentKind, BTreeMap<String, NamedComponent>>,
    pending: Vec<PendingRegistration>,
    conflicts: Vec<(ComponentKind, String)>,
    output_differs: HashMap<SchemaId, bool>,
}

impl fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentRegistry")
            .field("flavor", &self.options.flavor)
            .field("reused", &self.reused)
            .field("schemas", &self.arena.len())
            .field("pending", &self.pending.len())
            .field("conflicts", &self.conflicts)
            .finish_non_exhaustive()
    }
}

impl ComponentRegistry {
    /// Create a registry with caller-supplied default components.
    pub fn new(flavor: SpecFlavor, components: &ComponentsOptions, opts: &DocumentOptions) -> Self {
        let mut registry = Self {
            options: ConvertOptions::new(flavor, opts),
            reused: opts.reused,
            default_names: components
                .schemas
                .iter()
                .map(|(name, node)| (node.id(), name.clone()))
                .collect(),
            handles: HashMap::new(),
            arena: Vec::new(),
            named: BTreeMap::new(),
            pending: Vec::new(),
            conflicts: Vec::new(),
            output_differs: HashMap::new(),
        };

        for (name, schema) in &components.json_schemas {
            registry.store_named(ComponentKind::Schemas, name, schema.clone(), None);
        }
        let raw = [
            (ComponentKind::Parameters, &components.parameters),
            (ComponentKind::Responses, &components.responses),
            (ComponentKind::RequestBodies, &components.request_bodies),
        ];
        for (kind, entries) in raw {
            for (name, value) in entries {
                registry.store_named(kind, name, value.clone(), None);
            }
        }
        for (name, node) in &components.schemas {
            registry.register_named_schema(node, Direction::Input, name);
        }
        debug!(
            defaults = components.schemas.len() + components.json_schemas.len(),
            "Component registry created"
        );
        registry
    }

    pub fn flavor(&self) -> SpecFlavor {
        self.options.flavor
    }

    pub fn reused(&self) -> Reused {
        self.reused
    }

    /// Pending registrations in creation order.
    pub fn pending(&self) -> &[PendingRegistration] {
        &self.pending
    }

    /// Unnamed schema entries with their handles, in creation order.
    pub fn entries(&self) -> impl Iterator<Item = (ComponentHandle, &SchemaEntry)> {
        self.arena
            .iter()
            .enumerate()
            .map(|(i, entry)| (ComponentHandle(i), entry))
    }

    pub fn entry(&self, handle: ComponentHandle) -> Option<&SchemaEntry> {
        self.arena.get(handle.0)
    }

    /// Handle of an unnamed node registered in `direction`.
    pub fn handle_of(&self, node: &Schema, direction: Direction) -> Option<ComponentHandle> {
        self.handles.get(&(direction, node.id())).copied()
    }

    /// Named components of one kind, by name.
    pub fn named(&self, kind: ComponentKind) -> impl Iterator<Item = (&str, &Value)> {
        self.named
            .get(&kind)
            .into_iter()
            .flat_map(|entries| entries.iter())
            .map(|(name, entry)| (name.as_str(), &entry.fragment))
    }

    /// Names bound to two different definitions.
    pub fn conflicts(&self) -> &[(ComponentKind, String)] {
        &self.conflicts
    }

    /// Definitions stored for caller-supplied defaults and named nodes.
    pub fn default_components(&self) -> Value {
        let mut components = Map::new();
        for kind in ComponentKind::ALL {
            let entries: Map<String, Value> = self
                .named(kind)
                .map(|(name, value)| (name.to_string(), value.clone()))
                .collect();
            if !entries.is_empty() {
                components.insert(kind.as_str().to_string(), Value::Object(entries));
            }
        }
        Value::Object(components)
    }

    // ------------------------------------------------------------------
    // Registration
    // ------------------------------------------------------------------

    /// Register a schema node used at `path`.
    ///
    /// Named nodes yield a `$ref` and have their definition stored once.
    /// Unnamed nodes yield their inline fragment.
    pub fn add_schema(&mut self, node: &Schema, path: DocPath, direction: Direction) -> Value {
        if let Some(name) = self.schema_name(node, direction) {
            self.register_named_schema(node, direction, &name);
            let fragment = reference(SCHEMA_REF_PREFIX, &name);
            trace!(schema = %node.id(), component = %name, path = %path, "Schema referenced");
            self.record(None, RegistrationKind::Schema(direction), path, fragment.clone());
            return fragment;
        }

        let fragment = convert_body(node, direction, &path, self);
        let handle = match self.handles.get(&(direction, node.id())) {
            Some(handle) => *handle,
            None => {
                let handle = ComponentHandle(self.arena.len());
                self.arena.push(SchemaEntry {
                    direction,
                    node: node.id(),
                    fragment: fragment.clone(),
                    uses: Vec::new(),
                });
                self.handles.insert((direction, node.id()), handle);
                handle
            }
        };
        let index = self.record(
            Some(handle),
            RegistrationKind::Schema(direction),
            path.clone(),
            fragment.clone(),
        );
        let known_slot = self.arena[handle.0]
            .uses
            .iter()
            .any(|&use_index| self.pending[use_index].path == path);
        if !known_slot {
            self.arena[handle.0].uses.push(index);
        }
        trace!(
            schema = %node.id(),
            handle = handle.0,
            direction = %direction,
            path = %path,
            "Schema registered"
        );
        fragment
    }

    /// Register one parameter built from an object property.
    pub fn add_parameter(
        &mut self,
        node: &Schema,
        name: &str,
        location: ParameterLocation,
        required: bool,
        path: DocPath,
    ) -> Value {
        let meta = node.metadata();
        let param_meta = meta.param.clone().unwrap_or_default();
        let param_name = param_meta.name.as_deref().unwrap_or(name);

        if let Some(id) = &param_meta.id
            && self.owned_by(ComponentKind::Parameters, id, node.id())
        {
            return self.reference_named(ComponentKind::Parameters, id, RegistrationKind::Parameter, path);
        }

        let base = match &param_meta.id {
            Some(id) => DocPath::component(ComponentKind::Parameters.as_str(), id),
            None => path.clone(),
        };
        let schema_path = base.key("schema");
        let mark = self.pending.len();
        let mut schema = self.add_schema(node, schema_path.clone(), Direction::Input);
        if !is_ref(&schema) {
            if let Some(map) = schema.as_object_mut() {
                map.remove("description");
            }
            self.strip_pending(mark, &schema_path, "description");
        }

        let mut parameter = Map::new();
        parameter.insert("name".into(), json!(param_name));
        parameter.insert("in".into(), json!(location.as_str()));
        parameter.insert("required".into(), json!(required));
        parameter.insert("schema".into(), schema);
        if let Some(description) = &meta.description {
            parameter.insert("description".into(), json!(description));
        }
        if meta.deprecated {
            parameter.insert("deprecated".into(), json!(true));
        }
        let parameter = Value::Object(parameter);

        match &param_meta.id {
            Some(id) => {
                self.store_named(ComponentKind::Parameters, id, parameter, Some(node.id()));
                self.reference_named(ComponentKind::Parameters, id, RegistrationKind::Parameter, path)
            }
            None => {
                self.record(None, RegistrationKind::Parameter, path, parameter.clone());
                parameter
            }
        }
    }

    /// Register a request body object. Bodies are required unless stated
    /// otherwise.
    pub fn add_request_body(&mut self, body: &RequestBodyObject, path: DocPath) -> Value {
        let base = match &body.id {
            Some(id) => DocPath::component(ComponentKind::RequestBodies.as_str(), id),
            None => path.clone(),
        };
        let mut object = Map::new();
        if let Some(description) = &body.description {
            object.insert("description".into(), json!(description));
        }
        let content = self.add_content(&body.content, &base, Direction::Input);
        object.insert("content".into(), Value::Object(content));
        object.insert("required".into(), json!(body.required.unwrap_or(true)));
        let object = Value::Object(object);

        match &body.id {
            Some(id) => {
                self.store_named(ComponentKind::RequestBodies, id, object, None);
                self.reference_named(ComponentKind::RequestBodies, id, RegistrationKind::RequestBody, path)
            }
            None => {
                self.record(None, RegistrationKind::RequestBody, path, object.clone());
                object
            }
        }
    }

    /// Register a response object.
    pub fn add_response(&mut self, response: &ResponseObject, path: DocPath) -> Value {
        let base = match &response.id {
            Some(id) => DocPath::component(ComponentKind::Responses.as_str(), id),
            None => path.clone(),
        };
        let mut object = Map::new();
        let description = response.description.as_deref().unwrap_or("Default Response");
        object.insert("description".into(), json!(description));

        if let Some(headers) = &response.headers {
            match headers.shape() {
                Some(shape) => {
                    let headers_path = base.key("headers");
                    let mut rendered = Map::new();
                    for (name, property) in shape.properties() {
                        let header_path = headers_path.key(name);
                        rendered.insert(name.to_string(), self.add_header(property, header_path));
                    }
                    object.insert("headers".into(), Value::Object(rendered));
                }
                None => warn!(
                    kind = headers.kind().name(),
                    "Response headers must be an object schema, ignoring"
                ),
            }
        }

        if !response.content.is_empty() {
            let content = self.add_content(&response.content, &base, Direction::Output);
            object.insert("content".into(), Value::Object(content));
        }
        let object = Value::Object(object);

        match &response.id {
            Some(id) => {
                self.store_named(ComponentKind::Responses, id, object, None);
                self.reference_named(ComponentKind::Responses, id, RegistrationKind::Response, path)
            }
            None => {
                self.record(None, RegistrationKind::Response, path, object.clone());
                object
            }
        }
    }

    /// Media type object for a schema slot, used by the route transform for
    /// short-form bodies and responses.
    pub fn add_media_type(
        &mut self,
        media: &MediaTypeObject,
        path: &DocPath,
        direction: Direction,
    ) -> Value {
        let mut object = Map::new();
        match &media.schema {
            Some(SlotSchema::Zod(node)) => {
                let schema = self.add_schema(node, path.key("schema"), direction);
                object.insert("schema".into(), schema);
            }
            Some(SlotSchema::Json(value)) => {
                object.insert("schema".into(), value.clone());
            }
            None => {}
        }
        if let Some(example) = &media.example {
            object.insert("example".into(), example.clone());
        }
        if let Some(examples) = &media.examples {
            object.insert("examples".into(), examples.clone());
        }
        Value::Object(object)
    }

    fn add_content(
        &mut self,
        content: &BTreeMap<String, MediaTypeObject>,
        base: &DocPath,
        direction: Direction,
    ) -> Map<String, Value> {
        let content_path = base.key("content");
        content
            .iter()
            .map(|(media_type, media)| {
                let path = content_path.key(media_type.as_str());
                (media_type.clone(), self.add_media_type(media, &path, direction))
            })
            .collect()
    }

    fn add_header(&mut self, node: &Schema, path: DocPath) -> Value {
        let schema_path = path.key("schema");
        let mark = self.pending.len();
        let mut schema = self.add_schema(node, schema_path.clone(), Direction::Output);
        if !is_ref(&schema) {
            if let Some(map) = schema.as_object_mut() {
                map.remove("description");
            }
            self.strip_pending(mark, &schema_path, "description");
        }
        let mut header = Map::new();
        header.insert("schema".into(), schema);
        header.insert("required".into(), json!(!node.is_optional_in(Direction::Output)));
        if let Some(description) = node.metadata().description {
            header.insert("description".into(), json!(description));
        }
        Value::Object(header)
    }

    // ------------------------------------------------------------------
    // Named components
    // ------------------------------------------------------------------

    /// Component name of a node in a direction. Outputs rendering differently
    /// from inputs get the `Output` suffix.
    fn schema_name(&mut self, node: &Schema, direction: Direction) -> Option<String> {
        let base = base_name(node, &self.default_names)?;
        if direction == Direction::Output && self.differs(node) {
            return Some(format!("{base}Output"));
        }
        Some(base)
    }

    fn differs(&mut self, node: &Schema) -> bool {
        if let Some(&cached) = self.output_differs.get(&node.id()) {
            return cached;
        }
        let differs = output_differs(node, &self.options, &self.default_names);
        self.output_differs.insert(node.id(), differs);
        differs
    }

    fn register_named_schema(&mut self, node: &Schema, direction: Direction, name: &str) {
        let kind = ComponentKind::Schemas;
        if let Some(existing) = self.named.get(&kind).and_then(|entries| entries.get(name)) {
            if existing.owner == Some(node.id()) {
                return;
            }
            let rendered = detached_body(node, direction, &self.options, &self.default_names);
            if rendered != existing.fragment {
                self.conflict(kind, name);
            }
            return;
        }

        // Placeholder first so that a node reached again while rendering its
        // own body resolves to the reference.
        self.named.entry(kind).or_default().insert(
            name.to_string(),
            NamedComponent {
                fragment: Value::Null,
                owner: Some(node.id()),
            },
        );
        let path = DocPath::component(kind.as_str(), name);
        let body = convert_body(node, direction, &path, self);
        if let Some(entry) = self.named.get_mut(&kind).and_then(|entries| entries.get_mut(name)) {
            entry.fragment = body;
        }
        debug!(component = %name, direction = %direction, "Schema component registered");
    }

    /// Store a named definition, first wins. A different definition under the
    /// same name is recorded as a conflict.
    fn store_named(&mut self, kind: ComponentKind, name: &str, fragment: Value, owner: Option<SchemaId>) {
        let entries = self.named.entry(kind).or_default();
        match entries.get(name) {
            Some(existing) if existing.fragment == fragment => {}
            Some(_) => self.conflict(kind, name),
            None => {
                entries.insert(name.to_string(), NamedComponent { fragment, owner });
                debug!(kind = %kind, component = %name, "Component registered");
            }
        }
    }

    fn owned_by(&self, kind: ComponentKind, name: &str, node: SchemaId) -> bool {
        self.named
            .get(&kind)
            .and_then(|entries| entries.get(name))
            .is_some_and(|entry| entry.owner == Some(node))
    }

    fn reference_named(
        &mut self,
        kind: ComponentKind,
        name: &str,
        registration: RegistrationKind,
        path: DocPath,
    ) -> Value {
        let fragment = reference(&format!("#/components/{}/", kind.as_str()), name);
        self.record(None, registration, path, fragment.clone());
        fragment
    }

    fn conflict(&mut self, kind: ComponentKind, name: &str) {
        warn!(kind = %kind, component = %name, "Component registered with conflicting definitions");
        if !self.conflicts.iter().any(|(k, n)| *k == kind && n == name) {
            self.conflicts.push((kind, name.to_string()));
        }
    }

    // ------------------------------------------------------------------
    // Pending list
    // ------------------------------------------------------------------

    fn record(
        &mut self,
        handle: Option<ComponentHandle>,
        kind: RegistrationKind,
        path: DocPath,
        fragment: Value,
    ) -> usize {
        self.pending.push(PendingRegistration {
            handle,
            kind,
            path,
            fragment,
        });
        self.pending.len() - 1
    }

    /// Remove `key` from fragments recorded since `mark` exactly at `path`.
    fn strip_pending(&mut self, mark: usize, path: &DocPath, key: &str) {
        for pending in &mut self.pending[mark..] {
            if pending.path == *path
                && let Some(map) = pending.fragment.as_object_mut()
            {
                map.remove(key);
            }
        }
        for entry in &mut self.arena {
            if entry.uses.first().is_some_and(|&first| first >= mark)
                && let Some(map) = entry.fragment.as_object_mut()
                && entry
                    .uses
                    .first()
                    .is_some_and(|&first| self.pending[first].path == *path)
            {
                map.remove(key);
            }
        }
    }
}

impl SchemaSink for ComponentRegistry {
    fn options(&self) -> &ConvertOptions {
        &self.options
    }

    fn add(&mut self, node: &Schema, direction: Direction, path: DocPath) -> Value {
        self.add_schema(node, path, direction)
    }

    fn is_named(&self, node: &Schema) -> bool {
        base_name(node, &self.default_names).is_some()
    }

    fn mark(&self) -> usize {
        self.pending.len()
    }

    fn relocate(&mut self, mark: usize, from: &DocPath, to: &DocPath) {
        for pending in &mut self.pending[mark..] {
            pending.path = pending.path.rebase(from, to);
        }
    }
}
