//! Document generation tests
//!
//! Routes go through the plugin hooks exactly as a server runs them, then the
//! assembled document is inspected.

use crate::assembler::assemble;
use crate::config::{DocumentOptions, OpenApiConfig, PluginOptions};
use crate::error::{SetupError, SetupResult};
use crate::plugin::{Plugin, ZodOpenApiPlugin};
use crate::route::{
    MediaTypeObject, Method, RequestBodyObject, ResponseObject, RouteDefinition, RouteId,
    RouteSchema,
};
use crate::validator::Slot;
use serde_json::{Value, json};
use zod_schema::z;

fn build(
    version: &str,
    options: PluginOptions,
    routes: &[RouteDefinition],
) -> SetupResult<(Value, ZodOpenApiPlugin)> {
    let mut plugin = ZodOpenApiPlugin::new(options);
    let mut doc = OpenApiConfig::new("test", "1.0.0")
        .with_openapi(version)
        .skeleton();
    for (index, route) in routes.iter().enumerate() {
        plugin.on_route(RouteId(index), route, &mut doc)?;
    }
    plugin.on_ready(&mut doc)?;
    Ok((doc, plugin))
}

fn document(routes: &[RouteDefinition]) -> Value {
    build("3.1.0", PluginOptions::default(), routes).unwrap().0
}

fn post(url: &str, schema: RouteSchema) -> RouteDefinition {
    RouteDefinition::new(Method::Post, url, schema)
}

fn get(url: &str, schema: RouteSchema) -> RouteDefinition {
    RouteDefinition::new(Method::Get, url, schema)
}

// =============================================================================
// Request bodies and responses
// =============================================================================

#[test]
fn test_body_with_required_property() {
    let doc = document(&[post(
        "/",
        RouteSchema::new().body(z::object([("jobId", z::string())])),
    )]);
    assert_eq!(
        doc["paths"]["/"]["post"]["requestBody"],
        json!({
            "content": {
                "application/json": {
                    "schema": {
                        "type": "object",
                        "properties": {"jobId": {"type": "string"}},
                        "required": ["jobId"]
                    }
                }
            },
            "required": true
        })
    );
}

#[test]
fn test_named_node_becomes_component() {
    let job_id = z::string()
        .describe("Job ID")
        .example("60002023")
        .ref_id("jobId");
    let doc = document(&[post(
        "/",
        RouteSchema::new()
            .body(z::object([("jobId", job_id.clone())]))
            .response(200, z::object([("jobId", job_id)])),
    )]);

    let reference = json!({"$ref": "#/components/schemas/jobId"});
    let operation = &doc["paths"]["/"]["post"];
    assert_eq!(
        operation["requestBody"]["content"]["application/json"]["schema"]["properties"]["jobId"],
        reference
    );
    assert_eq!(
        operation["responses"]["200"]["content"]["application/json"]["schema"]["properties"]["jobId"],
        reference
    );
    assert_eq!(
        doc["components"]["schemas"],
        json!({"jobId": {"type": "string", "description": "Job ID", "example": "60002023"}})
    );
}

#[test]
fn test_bare_response_gets_default_description() {
    let doc = document(&[get("/", RouteSchema::new().response(200, z::string()))]);
    assert_eq!(
        doc["paths"]["/"]["get"]["responses"]["200"],
        json!({
            "description": "Default Response",
            "content": {"application/json": {"schema": {"type": "string"}}}
        })
    );
}

#[test]
fn test_route_without_responses() {
    let doc = document(&[get("/", RouteSchema::new())]);
    assert_eq!(
        doc["paths"]["/"]["get"]["responses"],
        json!({"200": {"description": "Default Response"}})
    );
}

#[test]
fn test_response_object_with_example() {
    let response = ResponseObject::new().with_content(
        "application/json",
        MediaTypeObject::new(z::object([("jobId", z::string())]))
            .with_example(json!({"jobId": "123"})),
    );
    let doc = document(&[post("/", RouteSchema::new().response(201, response))]);
    assert_eq!(
        doc["paths"]["/"]["post"]["responses"]["201"],
        json!({
            "description": "Default Response",
            "content": {
                "application/json": {
                    "schema": {
                        "type": "object",
                        "properties": {"jobId": {"type": "string"}},
                        "required": ["jobId"]
                    },
                    "example": {"jobId": "123"}
                }
            }
        })
    );
}

#[test]
fn test_request_body_component() {
    let body = RequestBodyObject::new()
        .with_id("CreateJob")
        .with_content("application/json", MediaTypeObject::new(z::object([("name", z::string())])));
    let doc = document(&[
        post("/a", RouteSchema::new().body(body.clone())),
        post("/b", RouteSchema::new().body(body)),
    ]);
    let reference = json!({"$ref": "#/components/requestBodies/CreateJob"});
    assert_eq!(doc["paths"]["/a"]["post"]["requestBody"], reference);
    assert_eq!(doc["paths"]["/b"]["post"]["requestBody"], reference);
    assert_eq!(
        doc["components"]["requestBodies"]["CreateJob"]["content"]["application/json"]["schema"]["required"],
        json!(["name"])
    );
    assert_eq!(doc["components"]["requestBodies"]["CreateJob"]["required"], json!(true));
}

#[test]
fn test_consumes_and_produces() {
    let doc = document(&[post(
        "/",
        RouteSchema::new()
            .consumes("application/json")
            .consumes("application/x-www-form-urlencoded")
            .produces("text/plain")
            .body(z::object([("a", z::string())]))
            .response(200, z::string()),
    )]);
    let operation = &doc["paths"]["/"]["post"];
    let content = operation["requestBody"]["content"].as_object().unwrap();
    assert_eq!(content.len(), 2);
    assert!(content.contains_key("application/x-www-form-urlencoded"));
    assert_eq!(
        operation["responses"]["200"]["content"]["text/plain"]["schema"],
        json!({"type": "string"})
    );
}

#[test]
fn test_json_schema_body_is_inlined() {
    let doc = document(&[post(
        "/",
        RouteSchema::new().body(json!({"type": "object", "properties": {"a": {"type": "integer"}}})),
    )]);
    assert_eq!(
        doc["paths"]["/"]["post"]["requestBody"]["content"]["application/json"]["schema"],
        json!({"type": "object", "properties": {"a": {"type": "integer"}}})
    );
}

// =============================================================================
// Parameters
// =============================================================================

#[test]
fn test_parameter_order_and_conventions() {
    let doc = document(&[post(
        "/:jobId",
        RouteSchema::new()
            .headers(z::object([(
                "x-trace",
                z::string().describe("Trace id").optional(),
            )]))
            .params(z::object([("jobId", z::string())]))
            .querystring(z::object([(
                "verbose",
                z::boolean().describe("Verbose output").example(true).optional(),
            )])),
    )]);
    assert_eq!(
        doc["paths"]["/{jobId}"]["post"]["parameters"],
        json!([
            {
                "name": "verbose",
                "in": "query",
                "required": false,
                "description": "Verbose output",
                "schema": {"type": "boolean", "example": true}
            },
            {
                "name": "jobId",
                "in": "path",
                "required": true,
                "schema": {"type": "string"}
            },
            {
                "name": "x-trace",
                "in": "header",
                "required": false,
                "description": "Trace id",
                "schema": {"type": "string"}
            }
        ])
    );
}

#[test]
fn test_undeclared_path_parameter_documented() {
    let doc = document(&[get(
        "/jobs/:jobId/runs/:runId",
        RouteSchema::new().params(z::object([("runId", z::coerce::number())])),
    )]);
    let parameters = doc["paths"]["/jobs/{jobId}/runs/{runId}"]["get"]["parameters"]
        .as_array()
        .unwrap();
    assert_eq!(parameters.len(), 2);
    assert_eq!(parameters[0]["name"], json!("runId"));
    assert_eq!(parameters[0]["schema"], json!({"type": "number"}));
    assert_eq!(
        parameters[1],
        json!({"name": "jobId", "in": "path", "required": true, "schema": {"type": "string"}})
    );
}

#[test]
fn test_parameter_component() {
    let page = z::coerce::number().int().describe("Page").param_ref("page");
    let doc = document(&[
        get("/a", RouteSchema::new().querystring(z::object([("page", page.clone())]))),
        get("/b", RouteSchema::new().querystring(z::object([("page", page)]))),
    ]);
    let reference = json!({"$ref": "#/components/parameters/page"});
    assert_eq!(doc["paths"]["/a"]["get"]["parameters"][0], reference);
    assert_eq!(doc["paths"]["/b"]["get"]["parameters"][0], reference);
    assert_eq!(
        doc["components"]["parameters"]["page"],
        json!({
            "name": "page",
            "in": "query",
            "required": true,
            "description": "Page",
            "schema": {"type": "integer"}
        })
    );
}

#[test]
fn test_non_object_querystring_is_rejected() {
    let err = build(
        "3.1.0",
        PluginOptions::default(),
        &[get("/", RouteSchema::new().querystring(z::string()))],
    )
    .unwrap_err();
    assert_eq!(
        err,
        SetupError::NonObjectSlot {
            slot: Slot::Querystring,
            method: "GET".into(),
            url: "/".into(),
        }
    );
}

#[test]
fn test_wrapped_object_params_are_unwrapped() {
    let params = z::object([("id", z::string())]).refine(|_| true, "never").optional();
    let doc = document(&[get("/:id", RouteSchema::new().params(params))]);
    assert_eq!(doc["paths"]["/{id}"]["get"]["parameters"][0]["name"], json!("id"));
}

// =============================================================================
// Routes
// =============================================================================

#[test]
fn test_hidden_route_absent() {
    let doc = document(&[
        get("/visible", RouteSchema::new()),
        get("/hidden", RouteSchema::new().hide().response(200, z::string())),
    ]);
    let paths = doc["paths"].as_object().unwrap();
    assert!(paths.contains_key("/visible"));
    assert!(!paths.contains_key("/hidden"));
}

#[test]
fn test_passthrough_fields() {
    let doc = document(&[get(
        "/",
        RouteSchema::new()
            .tag("jobs")
            .summary("List jobs")
            .description("Lists every job")
            .operation_id("listJobs")
            .deprecated(),
    )]);
    let operation = &doc["paths"]["/"]["get"];
    assert_eq!(operation["tags"], json!(["jobs"]));
    assert_eq!(operation["summary"], json!("List jobs"));
    assert_eq!(operation["description"], json!("Lists every job"));
    assert_eq!(operation["operationId"], json!("listJobs"));
    assert_eq!(operation["deprecated"], json!(true));
}

#[test]
fn test_duplicate_route_is_rejected() {
    let err = build(
        "3.1.0",
        PluginOptions::default(),
        &[get("/:id", RouteSchema::new()), get("/:id", RouteSchema::new())],
    )
    .unwrap_err();
    assert!(matches!(err, SetupError::DuplicateRoute { .. }));
}

#[test]
fn test_same_url_different_methods() {
    let doc = document(&[get("/jobs", RouteSchema::new()), post("/jobs", RouteSchema::new())]);
    let item = doc["paths"]["/jobs"].as_object().unwrap();
    assert!(item.contains_key("get"));
    assert!(item.contains_key("post"));
}

// =============================================================================
// Flavors
// =============================================================================

#[test]
fn test_nullable_per_flavor() {
    let body = z::object([("a", z::string().nullable())]);
    let schema_at = |version: &str| {
        let (doc, _) = build(
            version,
            PluginOptions::default(),
            &[post("/", RouteSchema::new().body(body.clone()))],
        )
        .unwrap();
        doc["paths"]["/"]["post"]["requestBody"]["content"]["application/json"]["schema"].clone()
    };

    let v30 = schema_at("3.0.3");
    assert_eq!(v30["properties"]["a"], json!({"type": "string", "nullable": true}));
    assert_eq!(v30["required"], json!(["a"]));

    let v31 = schema_at("3.1.0");
    assert_eq!(v31["properties"]["a"], json!({"type": ["string", "null"]}));
}

#[test]
fn test_nullable_reference_in_30() {
    let job = z::object([("id", z::string())]).ref_id("Job");
    let (doc, _) = build(
        "3.0.3",
        PluginOptions::default(),
        &[post("/", RouteSchema::new().body(z::object([("job", job.nullable())])))],
    )
    .unwrap();
    assert_eq!(
        doc["paths"]["/"]["post"]["requestBody"]["content"]["application/json"]["schema"]["properties"]["job"],
        json!({"allOf": [{"$ref": "#/components/schemas/Job"}], "nullable": true})
    );
    assert_eq!(
        doc["components"]["schemas"]["Job"]["properties"]["id"],
        json!({"type": "string"})
    );
}

// =============================================================================
// Registry properties
// =============================================================================

#[test]
fn test_dedup_invariant() {
    let shared = z::object([("name", z::string())]);
    let doc = document(&[
        post("/a", RouteSchema::new().body(shared.clone())),
        post("/b", RouteSchema::new().body(shared)),
    ]);
    let schemas = doc["components"]["schemas"].as_object().unwrap();
    assert_eq!(schemas.len(), 1);
    let reference = json!({"$ref": "#/components/schemas/__schema0"});
    for url in ["/a", "/b"] {
        assert_eq!(
            doc["paths"][url]["post"]["requestBody"]["content"]["application/json"]["schema"],
            reference
        );
    }
}

#[test]
fn test_direction_independence() {
    let shared = z::object([("status", z::string().default_value("queued"))]);
    let doc = document(&[post(
        "/",
        RouteSchema::new()
            .body(shared.clone())
            .response(200, shared),
    )]);
    let operation = &doc["paths"]["/"]["post"];
    let input = &operation["requestBody"]["content"]["application/json"]["schema"];
    let output = &operation["responses"]["200"]["content"]["application/json"]["schema"];
    assert!(input.get("required").is_none());
    assert_eq!(output["required"], json!(["status"]));
    assert_eq!(doc["components"]["schemas"], json!({}));
}

#[test]
fn test_named_output_suffix() {
    let job = z::object([("status", z::string().default_value("queued"))]).ref_id("Job");
    let doc = document(&[post(
        "/",
        RouteSchema::new().body(job.clone()).response(200, job),
    )]);
    let schemas = doc["components"]["schemas"].as_object().unwrap();
    assert!(schemas.contains_key("Job"));
    assert!(schemas.contains_key("JobOutput"));
    assert_eq!(schemas["JobOutput"]["required"], json!(["status"]));
    assert_eq!(
        doc["paths"]["/"]["post"]["responses"]["200"]["content"]["application/json"]["schema"],
        json!({"$ref": "#/components/schemas/JobOutput"})
    );
}

#[test]
fn test_required_field_ordering() {
    let doc = document(&[post(
        "/",
        RouteSchema::new().body(z::object([
            ("a", z::string()),
            ("b", z::string().optional()),
            ("c", z::number()),
        ])),
    )]);
    assert_eq!(
        doc["paths"]["/"]["post"]["requestBody"]["content"]["application/json"]["schema"]["required"],
        json!(["a", "c"])
    );
}

#[test]
fn test_default_components_are_placed() {
    let flag = z::boolean();
    let options = PluginOptions::new()
        .with_schema_component("Flag", flag.clone())
        .with_response_component("NotFound", json!({"description": "Not found"}));
    let (doc, _) = build(
        "3.1.0",
        options,
        &[post("/", RouteSchema::new().body(z::object([("flag", flag)])))],
    )
    .unwrap();
    assert_eq!(doc["components"]["schemas"]["Flag"], json!({"type": "boolean"}));
    assert_eq!(
        doc["components"]["responses"]["NotFound"],
        json!({"description": "Not found"})
    );
    assert_eq!(
        doc["paths"]["/"]["post"]["requestBody"]["content"]["application/json"]["schema"]["properties"]["flag"],
        json!({"$ref": "#/components/schemas/Flag"})
    );
}

#[test]
fn test_union_one_of_option() {
    let options = PluginOptions::new()
        .with_document_opts(DocumentOptions::new().with_union_one_of(true));
    let (doc, _) = build(
        "3.1.0",
        options,
        &[post("/", RouteSchema::new().body(z::union([z::string(), z::number()])))],
    )
    .unwrap();
    assert_eq!(
        doc["paths"]["/"]["post"]["requestBody"]["content"]["application/json"]["schema"],
        json!({"oneOf": [{"type": "string"}, {"type": "number"}]})
    );
}

// =============================================================================
// Assembly properties
// =============================================================================

fn canonical_routes() -> Vec<RouteDefinition> {
    let job_id = z::string()
        .describe("Job ID")
        .example("60002023")
        .ref_id("jobId");
    vec![post(
        "/:jobId",
        RouteSchema::new()
            .params(z::object([("foo", z::string().describe("path parameter example"))]))
            .querystring(z::object([("baz", z::string().describe("query string example"))]))
            .body(z::object([("jobId", job_id.clone())]))
            .response(200, z::object([("jobId", job_id)])),
    )]
}

#[test]
fn test_every_pending_path_resolves() {
    let (doc, plugin) = build("3.1.0", PluginOptions::default(), &canonical_routes()).unwrap();
    let registry = &plugin.context().unwrap().registry;
    assert!(!registry.pending().is_empty());
    for pending in registry.pending() {
        assert!(
            pending.path.resolve(&doc).is_some(),
            "unresolved pending path {}",
            pending.path
        );
    }
}

#[test]
fn test_assembly_is_idempotent() {
    let (doc, plugin) = build("3.1.0", PluginOptions::default(), &canonical_routes()).unwrap();
    let registry = &plugin.context().unwrap().registry;
    assert_eq!(assemble(registry, &doc).unwrap(), doc);
}

#[test]
fn test_operation_location_recorded() {
    let (_, plugin) = build("3.1.0", PluginOptions::default(), &canonical_routes()).unwrap();
    let record = plugin.context().unwrap().route(RouteId(0)).unwrap();
    assert_eq!(record.method, "POST");
    assert_eq!(record.url, "/:jobId");
    assert_eq!(
        record.operation.as_ref().map(ToString::to_string),
        Some("#/paths/~1{jobId}/post".to_string())
    );
    assert!(record.schemas.params.is_some());
}
