//! Jobs API demo
//!
//! Registers a small in-memory jobs API, prints its OpenAPI document and
//! replays a few requests through the in-process server.

use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;
use zod_openapi_plugin::prelude::*;
use zod_openapi_plugin::{ReadyServer, SetupResult};
use zod_schema::{Schema, z};

type Store = Arc<RwLock<BTreeMap<String, Value>>>;

fn job_id() -> Schema {
    z::string()
        .describe("Job ID")
        .example("60002023")
        .ref_id("jobId")
}

fn job() -> Schema {
    z::object([
        ("jobId", job_id()),
        ("name", z::string().min(1)),
        ("priority", z::enumeration(["low", "normal", "high"]).default_value("normal")),
    ])
    .ref_id("Job")
}

fn server(store: Store) -> SetupResult<ReadyServer> {
    let create = {
        let store = Arc::clone(&store);
        move |request: Request| {
            let store = Arc::clone(&store);
            async move {
                let body = request.body.unwrap_or_default();
                let id = body["jobId"].as_str().unwrap_or_default().to_string();
                let mut jobs = store.write().await;
                if jobs.contains_key(&id) {
                    return Err(HttpError::conflict(format!("Job {id} already exists")));
                }
                jobs.insert(id, body.clone());
                Ok(Reply::ok(body).with_status(201))
            }
        }
    };
    let fetch = {
        let store = Arc::clone(&store);
        move |request: Request| {
            let store = Arc::clone(&store);
            async move {
                let id = request.param("jobId").unwrap_or_default().to_string();
                store
                    .read()
                    .await
                    .get(&id)
                    .cloned()
                    .ok_or_else(|| HttpError::not_found(format!("Job {id} not found")))
            }
        }
    };
    let list = move |request: Request| {
        let store = Arc::clone(&store);
        async move {
            let limit = request.query["limit"].as_u64().unwrap_or(u64::MAX);
            let jobs: Vec<Value> = store
                .read()
                .await
                .values()
                .take(usize::try_from(limit).unwrap_or(usize::MAX))
                .cloned()
                .collect();
            Ok(json!(jobs))
        }
    };

    ServerBuilder::new()
        .openapi(
            OpenApiConfig::new("Jobs API", "1.0.0")
                .with_description("Queue and inspect background jobs"),
        )
        .register(ZodOpenApiPlugin::default())
        .post(
            "/jobs",
            RouteSchema::new()
                .summary("Create a job")
                .tag("jobs")
                .body(job())
                .response(201, job()),
            create,
        )
        .get(
            "/jobs/:jobId",
            RouteSchema::new()
                .summary("Fetch a job")
                .tag("jobs")
                .params(z::object([("jobId", job_id())]))
                .response(200, job()),
            fetch,
        )
        .get(
            "/jobs",
            RouteSchema::new()
                .summary("List jobs")
                .tag("jobs")
                .querystring(z::object([(
                    "limit",
                    z::coerce::number()
                        .int()
                        .positive()
                        .describe("Maximum number of jobs")
                        .optional(),
                )]))
                .response(200, z::array(job())),
            list,
        )
        .get(
            "/health",
            RouteSchema::new().hide(),
            |_request: Request| async move { Ok(json!({"status": "ok"})) },
        )
        .ready()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,zod_openapi_plugin=debug".into()),
        )
        .init();

    let server = server(Store::default())?;
    info!(routes = server.routes().len(), "Jobs API ready");

    let document = server
        .inject(InjectRequest::get("/documentation/json"))
        .await
        .json()?;
    println!("{}", serde_json::to_string_pretty(&document)?);

    let requests = [
        InjectRequest::post("/jobs").with_body(json!({"jobId": "60002023", "name": "reindex"})),
        InjectRequest::post("/jobs").with_body(json!({"jobId": "60002023", "name": "reindex"})),
        InjectRequest::post("/jobs").with_body(json!({"jobId": "60002024", "name": ""})),
        InjectRequest::get("/jobs/60002023"),
        InjectRequest::get("/jobs/404"),
        InjectRequest::get("/jobs?limit=a"),
        InjectRequest::get("/jobs?limit=1"),
    ];
    for request in requests {
        let line = format!("{} {}", request.method, request.url);
        let response = server.inject(request).await;
        println!("{line} -> {} {}", response.status_code, response.body);
    }
    Ok(())
}
