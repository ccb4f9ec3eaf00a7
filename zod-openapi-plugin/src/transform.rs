//! Route transform.
//!
//! Turns one route definition into an OpenAPI operation written to
//! `paths.<url>.<method>` of the document skeleton, registering every schema
//! it meets with the [`ComponentRegistry`].

use crate::config::{DocumentOptions, PluginOptions};
use crate::document::{DocPath, SpecFlavor};
use crate::error::{SetupError, SetupResult};
use crate::recognizer::{Classify, Recognized, classify, json_object_properties, object_shape};
use crate::registry::{ComponentRegistry, ParameterLocation};
use crate::route::{RouteDefinition, RouteId, RouteSchemas, SlotSchema};
use crate::validator::Slot;
use regex::Regex;
use serde_json::{Map, Value, json};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, trace};
use zod_schema::Direction;

const DEFAULT_MEDIA_TYPE: &str = "application/json";
const DEFAULT_RESPONSE: &str = "Default Response";

/// Result of transforming one route.
#[derive(Debug, Clone)]
pub struct RouteRecord {
    pub method: String,
    pub url: String,
    /// Schemas the request-time adapters run
    pub schemas: RouteSchemas,
    /// Location of the operation in the document, `None` for hidden routes
    pub operation: Option<DocPath>,
}

/// State threaded through every route transform of one plugin registration.
#[derive(Debug)]
pub struct RegistrationContext {
    pub registry: ComponentRegistry,
    pub options: DocumentOptions,
    pub routes: BTreeMap<RouteId, RouteRecord>,
}

impl RegistrationContext {
    pub fn new(flavor: SpecFlavor, options: &PluginOptions) -> Self {
        Self {
            registry: ComponentRegistry::new(flavor, &options.components, &options.document_opts),
            options: options.document_opts.clone(),
            routes: BTreeMap::new(),
        }
    }

    pub fn route(&self, id: RouteId) -> Option<&RouteRecord> {
        self.routes.get(&id)
    }
}

/// Rewrite a route URL into an OpenAPI path template.
///
/// `:name` and `:name(regex)` become `{name}`, `*` becomes `{*}`.
pub fn normalize_url(url: &str) -> SetupResult<String> {
    if !url.starts_with('/') {
        return Err(SetupError::InvalidRouteUrl(url.to_string()));
    }
    let param = Regex::new(r":([A-Za-z_][A-Za-z0-9_\-]*)(\([^/]*\))?")
        .map_err(|e| SetupError::InvalidRouteUrl(e.to_string()))?;
    if url.split('/').any(|segment| segment == ":") {
        return Err(SetupError::InvalidRouteUrl(url.to_string()));
    }
    let normalized = param.replace_all(url, "{$1}").replace('*', "{*}");
    Ok(normalized)
}

/// Names of the `{name}` placeholders of a path template, in order.
pub fn path_parameters(template: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        let Some(len) = rest[start..].find('}') else {
            break;
        };
        names.push(rest[start + 1..start + len].to_string());
        rest = &rest[start + len + 1..];
    }
    names
}

/// Transform one route, writing its operation into `skeleton`.
#[tracing::instrument(skip(ctx, route, skeleton), fields(method = %route.method, url = %route.url))]
pub fn transform_route(
    ctx: &mut RegistrationContext,
    id: RouteId,
    route: &RouteDefinition,
    skeleton: &mut Value,
) -> SetupResult<Option<DocPath>> {
    let schema = &route.schema;
    let url = normalize_url(&route.url)?;
    let mut record = RouteRecord {
        method: route.method.as_str().to_string(),
        url: route.url.clone(),
        schemas: schema.runtime_schemas(),
        operation: None,
    };

    if schema.hide {
        debug!("Route hidden from documentation");
        ctx.routes.insert(id, record);
        return Ok(None);
    }

    let method_key = route.method.operation_key();
    let op_path = DocPath::new(["paths", url.as_str(), method_key]);
    if op_path.resolve(skeleton).is_some() {
        return Err(SetupError::DuplicateRoute {
            method: route.method.as_str().to_string(),
            url: url.clone(),
        });
    }

    let mut operation = Map::new();
    if !schema.tags.is_empty() {
        operation.insert("tags".into(), json!(schema.tags));
    }
    if let Some(summary) = &schema.summary {
        operation.insert("summary".into(), json!(summary));
    }
    if let Some(description) = &schema.description {
        operation.insert("description".into(), json!(description));
    }
    if let Some(operation_id) = &schema.operation_id {
        operation.insert("operationId".into(), json!(operation_id));
    }
    if schema.deprecated {
        operation.insert("deprecated".into(), json!(true));
    }

    let mut parameters = Parameters {
        path: op_path.key("parameters"),
        values: Vec::new(),
        declared_path: BTreeSet::new(),
    };
    let slots = [
        (schema.querystring.as_ref(), Slot::Querystring, ParameterLocation::Query),
        (schema.params.as_ref(), Slot::Params, ParameterLocation::Path),
        (schema.headers.as_ref(), Slot::Headers, ParameterLocation::Header),
    ];
    for (slot, kind, location) in slots {
        parameters.add_slot(ctx, slot, kind, location, route)?;
    }
    for name in path_parameters(&url) {
        if !parameters.declared_path.contains(&name) {
            trace!(parameter = %name, "Documenting undeclared path parameter");
            parameters.values.push(json!({
                "name": name,
                "in": "path",
                "required": true,
                "schema": {"type": "string"}
            }));
        }
    }
    if !parameters.values.is_empty() {
        operation.insert("parameters".into(), Value::Array(parameters.values));
    }

    let consumes = media_types(&schema.consumes);
    let body_path = op_path.key("requestBody");
    let request_body = match classify(schema.body.as_ref()) {
        Recognized::Absent => None,
        Recognized::Native(node) => {
            let content_path = body_path.key("content");
            let content: Map<String, Value> = consumes
                .iter()
                .map(|media_type| {
                    let path = content_path.key(media_type.as_str()).key("schema");
                    let schema = ctx.registry.add_schema(node, path, Direction::Input);
                    (media_type.clone(), json!({"schema": schema}))
                })
                .collect();
            Some(json!({"content": content, "required": true}))
        }
        Recognized::RequestBody(body) => Some(ctx.registry.add_request_body(body, body_path)),
        Recognized::OpenApiObject(value) => Some(value.clone()),
        Recognized::JsonSchema(value) => {
            let content: Map<String, Value> = consumes
                .iter()
                .map(|media_type| (media_type.clone(), json!({"schema": value})))
                .collect();
            Some(json!({"content": content}))
        }
        Recognized::Response(_) => None,
    };
    if let Some(body) = request_body {
        operation.insert("requestBody".into(), body);
    }

    let produces = media_types(&schema.produces);
    let responses_path = op_path.key("responses");
    let mut responses = Map::new();
    for (status, slot) in &schema.response {
        let path = responses_path.key(status.as_str());
        let response = match slot.classify() {
            Recognized::Native(node) => {
                let content_path = path.key("content");
                let content: Map<String, Value> = produces
                    .iter()
                    .map(|media_type| {
                        let schema_path = content_path.key(media_type.as_str()).key("schema");
                        let schema = ctx.registry.add_schema(node, schema_path, Direction::Output);
                        (media_type.clone(), json!({"schema": schema}))
                    })
                    .collect();
                json!({"description": DEFAULT_RESPONSE, "content": content})
            }
            Recognized::Response(object) => ctx.registry.add_response(object, path),
            Recognized::OpenApiObject(value) => {
                let mut value = value.clone();
                if let Some(map) = value.as_object_mut()
                    && !map.contains_key("description")
                {
                    map.insert("description".into(), json!(DEFAULT_RESPONSE));
                }
                value
            }
            Recognized::JsonSchema(value) => {
                let content: Map<String, Value> = produces
                    .iter()
                    .map(|media_type| (media_type.clone(), json!({"schema": value})))
                    .collect();
                json!({"description": DEFAULT_RESPONSE, "content": content})
            }
            Recognized::RequestBody(_) | Recognized::Absent => {
                json!({"description": DEFAULT_RESPONSE})
            }
        };
        responses.insert(status.clone(), response);
    }
    if responses.is_empty() {
        responses.insert("200".into(), json!({"description": DEFAULT_RESPONSE}));
    }
    operation.insert("responses".into(), Value::Object(responses));

    write_operation(skeleton, &url, method_key, Value::Object(operation))?;
    debug!(operation = %op_path, "Route documented");
    record.operation = Some(op_path.clone());
    ctx.routes.insert(id, record);
    Ok(Some(op_path))
}

fn media_types(declared: &[String]) -> Vec<String> {
    if declared.is_empty() {
        vec![DEFAULT_MEDIA_TYPE.to_string()]
    } else {
        declared.to_vec()
    }
}

fn write_operation(skeleton: &mut Value, url: &str, method: &str, operation: Value) -> SetupResult<()> {
    let doc = skeleton
        .as_object_mut()
        .ok_or_else(|| SetupError::InvalidConfig("document skeleton must be an object".into()))?;
    let paths = doc
        .entry("paths")
        .or_insert_with(|| Value::Object(Map::new()))
        .as_object_mut()
        .ok_or_else(|| SetupError::InvalidConfig("paths must be an object".into()))?;
    let item = paths
        .entry(url.to_string())
        .or_insert_with(|| Value::Object(Map::new()))
        .as_object_mut()
        .ok_or_else(|| SetupError::InvalidConfig(format!("paths.{url} must be an object")))?;
    item.insert(method.to_string(), operation);
    Ok(())
}

struct Parameters {
    path: DocPath,
    values: Vec<Value>,
    declared_path: BTreeSet<String>,
}

impl Parameters {
    fn add_slot(
        &mut self,
        ctx: &mut RegistrationContext,
        slot: Option<&SlotSchema>,
        kind: Slot,
        location: ParameterLocation,
        route: &RouteDefinition,
    ) -> SetupResult<()> {
        let non_object = || SetupError::NonObjectSlot {
            slot: kind,
            method: route.method.as_str().to_string(),
            url: route.url.clone(),
        };
        match classify(slot) {
            Recognized::Absent => {}
            Recognized::Native(node) => {
                let (shape, _) = object_shape(node).ok_or_else(non_object)?;
                for (name, property) in shape.properties() {
                    let required = location == ParameterLocation::Path || !property.is_optional();
                    let path = self.path.index(self.values.len());
                    let parameter = ctx
                        .registry
                        .add_parameter(property, name, location, required, path);
                    self.declare(location, name);
                    self.values.push(parameter);
                }
            }
            Recognized::JsonSchema(value) | Recognized::OpenApiObject(value) => {
                let properties = json_object_properties(value).ok_or_else(non_object)?;
                for (name, schema, required) in properties {
                    let required = location == ParameterLocation::Path || required;
                    self.declare(location, &name);
                    self.values.push(json!({
                        "name": name,
                        "in": location.as_str(),
                        "required": required,
                        "schema": schema
                    }));
                }
            }
            Recognized::RequestBody(_) | Recognized::Response(_) => return Err(non_object()),
        }
        Ok(())
    }

    fn declare(&mut self, location: ParameterLocation, name: &str) {
        if location == ParameterLocation::Path {
            self.declared_path.insert(name.to_string());
        }
    }
}
