//! Conversion of schema nodes into OpenAPI schema fragments.
//!
//! [`convert_body`] renders one node and hands every child node to a
//! [`SchemaSink`]. The registry is a sink that records where each child lands
//! in the document. [`DetachedSink`] renders without recording, for comparing
//! renderings and for standalone JSON Schemas.
//!
//! Wrapper kinds (`optional`, `nullable`, `default`, effects) are transparent:
//! the wrapped node is rendered in place rather than registered on its own,
//! unless it is bound to a component name.

use crate::config::{DocumentOptions, OverrideContext, OverrideFn};
use crate::document::{DocPath, SpecFlavor, is_ref, reference};
use serde_json::{Map, Value, json};
use std::collections::{BTreeMap, HashMap};
use zod_schema::{
    ArrayCheck, Direction, DiscriminatedUnionDef, Effect, NumberCheck, NumberDef, ObjectShape,
    Schema, SchemaId, SchemaKind, SchemaMetadata, StringCheck, StringDef, UnknownKeys,
};

pub(crate) const SCHEMA_REF_PREFIX: &str = "#/components/schemas/";
pub(crate) const DEFINITIONS_REF_PREFIX: &str = "#/definitions/";

/// Rendering options derived from the document flavor and [`DocumentOptions`].
#[derive(Clone)]
pub(crate) struct ConvertOptions {
    pub flavor: SpecFlavor,
    pub union_one_of: bool,
    pub discriminator: bool,
    pub override_fn: Option<OverrideFn>,
}

impl ConvertOptions {
    pub fn new(flavor: SpecFlavor, opts: &DocumentOptions) -> Self {
        Self {
            flavor,
            union_one_of: opts.union_one_of,
            discriminator: opts.discriminator,
            override_fn: opts.override_fn.clone(),
        }
    }

    fn union_key(&self) -> &'static str {
        if self.union_one_of { "oneOf" } else { "anyOf" }
    }
}

/// Receiver of the child nodes met while converting a node.
pub(crate) trait SchemaSink {
    fn options(&self) -> &ConvertOptions;

    /// Render `node` for the slot at `path`.
    fn add(&mut self, node: &Schema, direction: Direction, path: DocPath) -> Value;

    /// Whether `node` is bound to a component name.
    fn is_named(&self, node: &Schema) -> bool;

    /// Position in the sink's record of slots, used with [`Self::relocate`].
    fn mark(&self) -> usize {
        0
    }

    /// Move slots recorded since `mark` from under `from` to under `to`.
    fn relocate(&mut self, _mark: usize, _from: &DocPath, _to: &DocPath) {}
}

/// Render `node` itself. Children go through `sink`.
pub(crate) fn convert_body<S: SchemaSink + ?Sized>(
    node: &Schema,
    direction: Direction,
    path: &DocPath,
    sink: &mut S,
) -> Value {
    let opts = sink.options().clone();
    let mark = sink.mark();
    let fragment = match node.kind() {
        SchemaKind::String(def) => string_fragment(def),
        SchemaKind::Number(def) => number_fragment(def, opts.flavor),
        SchemaKind::Boolean(_) => json!({"type": "boolean"}),
        SchemaKind::Null => null_fragment(opts.flavor),
        SchemaKind::Any => json!({}),
        SchemaKind::Literal(value) => literal_fragment(value, opts.flavor),
        SchemaKind::Enum(values) => json!({"type": "string", "enum": values}),
        SchemaKind::Object(shape) => object_fragment(shape, direction, path, sink),
        SchemaKind::Array(def) => {
            let mut fragment = Map::new();
            fragment.insert("type".into(), json!("array"));
            let items = sink.add(&def.items, direction, path.key("items"));
            fragment.insert("items".into(), items);
            for check in &def.checks {
                match check {
                    ArrayCheck::Min(n) => {
                        fragment.insert("minItems".into(), json!(n));
                    }
                    ArrayCheck::Max(n) => {
                        fragment.insert("maxItems".into(), json!(n));
                    }
                    ArrayCheck::Length(n) => {
                        fragment.insert("minItems".into(), json!(n));
                        fragment.insert("maxItems".into(), json!(n));
                    }
                }
            }
            Value::Object(fragment)
        }
        SchemaKind::Tuple(items) => tuple_fragment(items, direction, path, sink, &opts),
        SchemaKind::Record(values) => {
            let values = sink.add(values, direction, path.key("additionalProperties"));
            json!({"type": "object", "additionalProperties": values})
        }
        SchemaKind::Union(options) => {
            let key = opts.union_key();
            Value::Object(union_map(options, key, direction, path, sink))
        }
        SchemaKind::DiscriminatedUnion(def) => {
            discriminated_fragment(def, direction, path, sink, &opts)
        }
        SchemaKind::Optional(inner) => transparent(inner, direction, path, sink),
        SchemaKind::Nullable(inner) => {
            let fragment = transparent(inner, direction, path, sink);
            nullable_fragment(fragment, path, sink, mark, opts.flavor)
        }
        SchemaKind::Default(inner, value) => {
            let fragment = transparent(inner, direction, path, sink);
            let mut extra = Map::new();
            extra.insert("default".into(), value.clone());
            decorate(fragment, extra, path, sink, mark, opts.flavor)
        }
        SchemaKind::Effects(effects) => match (&effects.effect, direction) {
            (Effect::Transform(_), Direction::Output) => json!({}),
            _ => transparent(&effects.inner, direction, path, sink),
        },
    };

    let extra = metadata_fields(node.own_metadata(), opts.flavor);
    let mut fragment = decorate(fragment, extra, path, sink, mark, opts.flavor);

    if let Some(hook) = &opts.override_fn {
        hook(&mut OverrideContext {
            fragment: &mut fragment,
            schema: node,
            direction,
        });
    }
    fragment
}

/// Render a wrapped node in place, or reference it when it is named.
fn transparent<S: SchemaSink + ?Sized>(
    inner: &Schema,
    direction: Direction,
    path: &DocPath,
    sink: &mut S,
) -> Value {
    if sink.is_named(inner) {
        sink.add(inner, direction, path.clone())
    } else {
        convert_body(inner, direction, path, sink)
    }
}

/// Attach extra keys to a fragment. A 3.0 `$ref` ignores siblings, so it is
/// wrapped in `allOf` first.
fn decorate<S: SchemaSink + ?Sized>(
    fragment: Value,
    extra: Map<String, Value>,
    path: &DocPath,
    sink: &mut S,
    mark: usize,
    flavor: SpecFlavor,
) -> Value {
    if extra.is_empty() {
        return fragment;
    }
    let mut fragment = if is_ref(&fragment) && flavor == SpecFlavor::OpenApi30 {
        sink.relocate(mark, path, &path.key("allOf").index(0));
        json!({"allOf": [fragment]})
    } else {
        fragment
    };
    if let Some(map) = fragment.as_object_mut() {
        map.extend(extra);
    }
    fragment
}

fn metadata_fields(meta: &SchemaMetadata, flavor: SpecFlavor) -> Map<String, Value> {
    let mut fields = Map::new();
    if let Some(description) = &meta.description {
        fields.insert("description".into(), json!(description));
    }
    match flavor {
        SpecFlavor::OpenApi30 => {
            if let Some(example) = meta.example.as_ref().or(meta.examples.first()) {
                fields.insert("example".into(), example.clone());
            }
        }
        SpecFlavor::OpenApi31 => {
            if let Some(example) = &meta.example {
                fields.insert("example".into(), example.clone());
            }
            if !meta.examples.is_empty() {
                fields.insert("examples".into(), json!(meta.examples));
            }
        }
    }
    if meta.deprecated {
        fields.insert("deprecated".into(), json!(true));
    }
    fields
}

fn string_fragment(def: &StringDef) -> Value {
    let mut fragment = Map::new();
    fragment.insert("type".into(), json!("string"));
    for check in &def.checks {
        let (key, value) = match check {
            StringCheck::Min(n) => ("minLength", json!(n)),
            StringCheck::Max(n) => ("maxLength", json!(n)),
            StringCheck::Length(n) => {
                fragment.insert("minLength".into(), json!(n));
                ("maxLength", json!(n))
            }
            StringCheck::Email => ("format", json!("email")),
            StringCheck::Uuid => ("format", json!("uuid")),
            StringCheck::Url => ("format", json!("uri")),
            StringCheck::Datetime => ("format", json!("date-time")),
            StringCheck::Regex(pattern) => ("pattern", json!(pattern)),
        };
        fragment.insert(key.into(), value);
    }
    Value::Object(fragment)
}

/// JSON number, integral values without a fraction.
pub(crate) fn number_value(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < 9.0e15 {
        json!(n as i64)
    } else {
        json!(n)
    }
}

fn number_fragment(def: &NumberDef, flavor: SpecFlavor) -> Value {
    let mut fragment = Map::new();
    let ty = if def.int { "integer" } else { "number" };
    fragment.insert("type".into(), json!(ty));
    for check in &def.checks {
        match (check, flavor) {
            (NumberCheck::Gte(n), _) => {
                fragment.insert("minimum".into(), number_value(*n));
            }
            (NumberCheck::Lte(n), _) => {
                fragment.insert("maximum".into(), number_value(*n));
            }
            (NumberCheck::Gt(n), SpecFlavor::OpenApi31) => {
                fragment.insert("exclusiveMinimum".into(), number_value(*n));
            }
            (NumberCheck::Lt(n), SpecFlavor::OpenApi31) => {
                fragment.insert("exclusiveMaximum".into(), number_value(*n));
            }
            (NumberCheck::Gt(n), SpecFlavor::OpenApi30) => {
                fragment.insert("minimum".into(), number_value(*n));
                fragment.insert("exclusiveMinimum".into(), json!(true));
            }
            (NumberCheck::Lt(n), SpecFlavor::OpenApi30) => {
                fragment.insert("maximum".into(), number_value(*n));
                fragment.insert("exclusiveMaximum".into(), json!(true));
            }
            (NumberCheck::MultipleOf(n), _) => {
                fragment.insert("multipleOf".into(), number_value(*n));
            }
        }
    }
    Value::Object(fragment)
}

fn null_fragment(flavor: SpecFlavor) -> Value {
    match flavor {
        SpecFlavor::OpenApi30 => json!({"nullable": true}),
        SpecFlavor::OpenApi31 => json!({"type": "null"}),
    }
}

fn literal_fragment(value: &Value, flavor: SpecFlavor) -> Value {
    let ty = match value {
        Value::String(_) => "string",
        Value::Number(_) => "number",
        Value::Bool(_) => "boolean",
        Value::Null => return null_fragment(flavor),
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    };
    match flavor {
        SpecFlavor::OpenApi30 => json!({"type": ty, "enum": [value]}),
        SpecFlavor::OpenApi31 => json!({"type": ty, "const": value}),
    }
}

fn object_fragment<S: SchemaSink + ?Sized>(
    shape: &ObjectShape,
    direction: Direction,
    path: &DocPath,
    sink: &mut S,
) -> Value {
    let properties_path = path.key("properties");
    let mut properties = Map::new();
    for (key, property) in shape.properties() {
        let rendered = sink.add(property, direction, properties_path.key(key));
        properties.insert(key.to_string(), rendered);
    }

    let mut fragment = Map::new();
    fragment.insert("type".into(), json!("object"));
    fragment.insert("properties".into(), Value::Object(properties));
    let required = shape.required_keys(direction);
    if !required.is_empty() {
        fragment.insert("required".into(), json!(required));
    }
    if shape.unknown_keys() == UnknownKeys::Strict {
        fragment.insert("additionalProperties".into(), json!(false));
    }
    Value::Object(fragment)
}

fn tuple_fragment<S: SchemaSink + ?Sized>(
    items: &[Schema],
    direction: Direction,
    path: &DocPath,
    sink: &mut S,
    opts: &ConvertOptions,
) -> Value {
    let mut fragment = Map::new();
    fragment.insert("type".into(), json!("array"));
    if !items.is_empty() {
        match opts.flavor {
            SpecFlavor::OpenApi31 => {
                let base = path.key("prefixItems");
                let rendered: Vec<Value> = items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| sink.add(item, direction, base.index(i)))
                    .collect();
                fragment.insert("prefixItems".into(), Value::Array(rendered));
            }
            SpecFlavor::OpenApi30 => {
                let key = opts.union_key();
                let map = union_map(items, key, direction, &path.key("items"), sink);
                fragment.insert("items".into(), Value::Object(map));
            }
        }
    }
    fragment.insert("minItems".into(), json!(items.len()));
    fragment.insert("maxItems".into(), json!(items.len()));
    Value::Object(fragment)
}

fn union_map<S: SchemaSink + ?Sized>(
    options: &[Schema],
    key: &str,
    direction: Direction,
    path: &DocPath,
    sink: &mut S,
) -> Map<String, Value> {
    let base = path.key(key);
    let rendered: Vec<Value> = options
        .iter()
        .enumerate()
        .map(|(i, option)| sink.add(option, direction, base.index(i)))
        .collect();
    let mut map = Map::new();
    map.insert(key.to_string(), Value::Array(rendered));
    map
}

fn discriminated_fragment<S: SchemaSink + ?Sized>(
    def: &DiscriminatedUnionDef,
    direction: Direction,
    path: &DocPath,
    sink: &mut S,
    opts: &ConvertOptions,
) -> Value {
    let key = opts.union_key();
    let mut map = union_map(&def.options, key, direction, path, sink);
    if opts.discriminator {
        let mut discriminator = Map::new();
        discriminator.insert("propertyName".into(), json!(def.discriminator));
        if let Some(mapping) = discriminator_mapping(def, &map[key]) {
            discriminator.insert("mapping".into(), Value::Object(mapping));
        }
        map.insert("discriminator".into(), Value::Object(discriminator));
    }
    Value::Object(map)
}

/// `mapping` is only emitted when every option is a reference.
fn discriminator_mapping(def: &DiscriminatedUnionDef, rendered: &Value) -> Option<Map<String, Value>> {
    let rendered = rendered.as_array()?;
    let mut mapping = Map::new();
    for (option, fragment) in def.options.iter().zip(rendered) {
        let target = fragment.get("$ref")?.as_str()?;
        let field = option.shape()?.get(&def.discriminator)?;
        let values: Vec<String> = match field.unwrapped().kind() {
            SchemaKind::Literal(Value::String(v)) => vec![v.clone()],
            SchemaKind::Enum(values) => values.clone(),
            _ => return None,
        };
        for value in values {
            mapping.insert(value, json!(target));
        }
    }
    Some(mapping)
}

fn nullable_fragment<S: SchemaSink + ?Sized>(
    fragment: Value,
    path: &DocPath,
    sink: &mut S,
    mark: usize,
    flavor: SpecFlavor,
) -> Value {
    match flavor {
        SpecFlavor::OpenApi30 => {
            if is_ref(&fragment) {
                sink.relocate(mark, path, &path.key("allOf").index(0));
                return json!({"allOf": [fragment], "nullable": true});
            }
            let mut fragment = fragment;
            if let Some(map) = fragment.as_object_mut() {
                map.insert("nullable".into(), json!(true));
            }
            fragment
        }
        SpecFlavor::OpenApi31 => {
            let single_type = !is_ref(&fragment)
                && fragment.get("const").is_none()
                && fragment.get("type").is_some_and(|t| t.is_string() || t.is_array());
            if !single_type {
                sink.relocate(mark, path, &path.key("anyOf").index(0));
                return json!({"anyOf": [fragment, {"type": "null"}]});
            }
            let mut fragment = fragment;
            if let Some(map) = fragment.as_object_mut() {
                let types = match map.remove("type") {
                    Some(Value::String(t)) if t == "null" => vec![json!(t)],
                    Some(Value::String(t)) => vec![json!(t), json!("null")],
                    Some(Value::Array(mut types)) => {
                        if !types.contains(&json!("null")) {
                            types.push(json!("null"));
                        }
                        types
                    }
                    _ => vec![json!("null")],
                };
                map.insert("type".into(), Value::Array(types));
                if let Some(Value::Array(values)) = map.get_mut("enum")
                    && !values.contains(&Value::Null)
                {
                    values.push(Value::Null);
                }
            }
            fragment
        }
    }
}

// -----------------------------------------------------------------------------
// Detached rendering
// -----------------------------------------------------------------------------

/// Sink that renders without recording slots. Named nodes become references
/// and their bodies are collected in `definitions`.
pub(crate) struct DetachedSink<'a> {
    options: &'a ConvertOptions,
    names: &'a HashMap<SchemaId, String>,
    ref_prefix: &'a str,
    suffix_outputs: bool,
    pub definitions: BTreeMap<String, Value>,
}

impl<'a> DetachedSink<'a> {
    pub fn new(
        options: &'a ConvertOptions,
        names: &'a HashMap<SchemaId, String>,
        ref_prefix: &'a str,
        suffix_outputs: bool,
    ) -> Self {
        Self {
            options,
            names,
            ref_prefix,
            suffix_outputs,
            definitions: BTreeMap::new(),
        }
    }

    fn name_for(&self, node: &Schema, direction: Direction) -> Option<String> {
        let base = base_name(node, self.names)?;
        if self.suffix_outputs
            && direction == Direction::Output
            && output_differs(node, self.options, self.names)
        {
            return Some(format!("{base}Output"));
        }
        Some(base)
    }
}

impl SchemaSink for DetachedSink<'_> {
    fn options(&self) -> &ConvertOptions {
        self.options
    }

    fn add(&mut self, node: &Schema, direction: Direction, path: DocPath) -> Value {
        match self.name_for(node, direction) {
            Some(name) => {
                if !self.definitions.contains_key(&name) {
                    self.definitions.insert(name.clone(), Value::Null);
                    let body = convert_body(node, direction, &DocPath::root(), self);
                    self.definitions.insert(name.clone(), body);
                }
                reference(self.ref_prefix, &name)
            }
            None => convert_body(node, direction, &path, self),
        }
    }

    fn is_named(&self, node: &Schema) -> bool {
        base_name(node, self.names).is_some()
    }
}

/// Component name bound to a node: a caller-supplied name first, then the
/// node's own component id.
pub(crate) fn base_name(node: &Schema, names: &HashMap<SchemaId, String>) -> Option<String> {
    names
        .get(&node.id())
        .cloned()
        .or_else(|| node.component_id().map(str::to_string))
}

/// Body of `node` rendered without any registration.
pub(crate) fn detached_body(
    node: &Schema,
    direction: Direction,
    options: &ConvertOptions,
    names: &HashMap<SchemaId, String>,
) -> Value {
    let mut sink = DetachedSink::new(options, names, SCHEMA_REF_PREFIX, true);
    convert_body(node, direction, &DocPath::root(), &mut sink)
}

/// Whether a node renders differently for input and output.
pub(crate) fn output_differs(
    node: &Schema,
    options: &ConvertOptions,
    names: &HashMap<SchemaId, String>,
) -> bool {
    detached_body(node, Direction::Input, options, names)
        != detached_body(node, Direction::Output, options, names)
}

/// Standalone JSON Schema for `node`: named nodes become
/// `#/definitions/<name>` references and their bodies are returned alongside.
/// `extra` nodes only contribute definitions.
pub(crate) fn standalone_schema<'a>(
    node: &Schema,
    extra: impl IntoIterator<Item = &'a Schema>,
    direction: Direction,
    options: &ConvertOptions,
    names: &HashMap<SchemaId, String>,
) -> (Value, BTreeMap<String, Value>) {
    let mut sink = DetachedSink::new(options, names, DEFINITIONS_REF_PREFIX, false);
    let fragment = sink.add(node, direction, DocPath::root());
    for component in extra {
        sink.add(component, direction, DocPath::root());
    }
    (fragment, sink.definitions)
}
