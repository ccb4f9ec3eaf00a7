//! Server plugin integration

use crate::assembler::assemble;
use crate::config::PluginOptions;
use crate::document::SpecFlavor;
use crate::error::{SetupError, SetupResult};
use crate::route::{RouteDefinition, RouteId};
use crate::transform::{RegistrationContext, transform_route};
use serde_json::Value;
use tracing::debug;

/// Hooks a server calls while it is being set up.
///
/// `on_route` runs once per route, in registration order. `on_ready` runs
/// once after every route has been registered.
pub trait Plugin: Send + Sync {
    fn name(&self) -> &str;

    fn on_route(
        &mut self,
        id: RouteId,
        route: &RouteDefinition,
        skeleton: &mut Value,
    ) -> SetupResult<()>;

    fn on_ready(&mut self, skeleton: &mut Value) -> SetupResult<()>;

    /// Whether the plugin documents routes.
    fn documents_routes(&self) -> bool {
        false
    }
}

/// Documents routes with native schemas.
///
/// The registration context is created at the first hook call, with the
/// document flavor read from the skeleton's `openapi` field.
#[derive(Debug, Default)]
pub struct ZodOpenApiPlugin {
    options: PluginOptions,
    context: Option<RegistrationContext>,
}

impl ZodOpenApiPlugin {
    pub fn new(options: PluginOptions) -> Self {
        Self {
            options,
            context: None,
        }
    }

    pub fn options(&self) -> &PluginOptions {
        &self.options
    }

    /// Registration state, once a hook has run.
    pub fn context(&self) -> Option<&RegistrationContext> {
        self.context.as_ref()
    }

    fn context_for(&mut self, skeleton: &Value) -> SetupResult<&mut RegistrationContext> {
        if self.context.is_none() {
            let flavor = SpecFlavor::of_document(skeleton).ok_or_else(|| {
                let version = skeleton.get("openapi").map(Value::to_string).unwrap_or_default();
                SetupError::InvalidConfig(format!("unsupported openapi version {version}"))
            })?;
            debug!(?flavor, "Creating registration context");
            self.context = Some(RegistrationContext::new(flavor, &self.options));
        }
        self.context
            .as_mut()
            .ok_or_else(|| SetupError::InvalidConfig("registration context missing".into()))
    }
}

impl Plugin for ZodOpenApiPlugin {
    fn name(&self) -> &str {
        "zod-openapi"
    }

    fn on_route(
        &mut self,
        id: RouteId,
        route: &RouteDefinition,
        skeleton: &mut Value,
    ) -> SetupResult<()> {
        let ctx = self.context_for(skeleton)?;
        transform_route(ctx, id, route, skeleton)?;
        Ok(())
    }

    fn on_ready(&mut self, skeleton: &mut Value) -> SetupResult<()> {
        let ctx = self.context_for(skeleton)?;
        *skeleton = assemble(&ctx.registry, skeleton)?;
        Ok(())
    }

    fn documents_routes(&self) -> bool {
        true
    }
}
