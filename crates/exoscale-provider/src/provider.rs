//! The provider shell the engine talks to
//!
//! Looks up the reconciler for a resource type, validates and defaults the
//! desired attributes, upgrades old state, and runs each operation inside a
//! tracing span under the schema's timeout.

use crate::config::ProviderConfig;
use crate::data::{AttrReader, Attributes, ResourceData};
use crate::data_sources::{self, DataSource};
use crate::error::{ProviderError, Result};
use crate::import::{self, Imported};
use crate::plan::{ActionType, Plan};
use crate::resource::{Context, Resource};
use crate::resources;
use crate::schema::{Op, Schema};
use crate::state::ResourceState;
use exoscale_client::{Api, Client};
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use tracing::Instrument;

pub struct Provider {
    ctx: Context,
    resources: BTreeMap<&'static str, Arc<dyn Resource>>,
    data_sources: BTreeMap<&'static str, Arc<dyn DataSource>>,
}

impl Provider {
    /// Provider over an arbitrary API implementation
    pub fn new(api: Arc<dyn Api>, config: ProviderConfig) -> Self {
        Self {
            ctx: Context::new(api, Arc::new(config)),
            resources: resources::registry(),
            data_sources: data_sources::registry(),
        }
    }

    /// Provider talking to the live platform
    pub fn configure(config: ProviderConfig) -> Result<Self> {
        let client = Client::new(config.client_config())?;
        tracing::debug!("configured provider: {:?}", config);
        Ok(Self::new(Arc::new(client), config))
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    pub fn resource_types(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.resources.keys().copied()
    }

    pub fn data_source_types(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.data_sources.keys().copied()
    }

    fn resource(&self, kind: &str) -> Result<&Arc<dyn Resource>> {
        self.resources
            .get(kind)
            .ok_or_else(|| ProviderError::UnknownResource(kind.to_string()))
    }

    pub fn schema(&self, kind: &str) -> Result<Schema> {
        if let Some(source) = self.data_sources.get(kind) {
            return Ok(source.schema());
        }
        Ok(self.resource(kind)?.schema())
    }

    /// Check desired attributes against the schema and resource-specific
    /// rules
    pub fn validate(&self, kind: &str, desired: &Attributes) -> Result<()> {
        let schema = self.schema(kind)?;
        let mut desired = desired.clone();
        schema.apply_defaults(&mut desired);
        schema.validate(&desired)?;

        if kind == "exoscale_elastic_ip" {
            if let Some(healthcheck) = desired.get_block("healthcheck") {
                resources::elastic_ip::check_healthcheck(healthcheck)?;
            }
        }
        Ok(())
    }

    /// Action the engine should take to move `prior` to `desired`
    pub fn plan(&self, kind: &str, prior: Option<&ResourceState>, desired: &Attributes) -> Result<Plan> {
        let schema = self.resource(kind)?.schema();

        let (action, changes) = match prior {
            None => {
                let diff = schema.diff(&Attributes::new(), desired);
                (ActionType::Create, diff.changes)
            }
            Some(state) => {
                let prior = self.upgrade_state(state.clone())?;
                let diff = schema.diff(&prior.attributes, desired);
                let action = if diff.requires_replace {
                    ActionType::Replace
                } else if diff.is_empty() {
                    ActionType::NoOp
                } else {
                    ActionType::Update
                };
                (action, diff.changes)
            }
        };

        Ok(Plan {
            resource_type: kind.to_string(),
            action,
            changes,
        })
    }

    /// Run `fut` under the operation's timeout, inside a span naming it
    async fn run<T, F>(&self, schema: &Schema, op: Op, kind: &str, id: &str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let budget = schema.timeout(op, self.ctx.config().timeout);
        let span = tracing::info_span!("reconcile", kind = %kind, op = op.as_str(), id = %id);

        async move {
            tracing::debug!("starting with a budget of {:?}", budget);
            match tokio::time::timeout(budget, fut).await {
                Ok(result) => {
                    if let Err(e) = &result {
                        tracing::debug!("failed: {}", e);
                    }
                    result
                }
                Err(_) => Err(ProviderError::Timeout {
                    op: op.as_str(),
                    kind: kind.to_string(),
                    id: id.to_string(),
                }),
            }
        }
        .instrument(span)
        .await
    }

    fn to_state(&self, kind: &str, schema: &Schema, d: ResourceData) -> ResourceState {
        ResourceState::new(kind, d.id())
            .with_schema_version(schema.version)
            .with_attributes(d.into_attributes())
    }

    pub async fn create(&self, kind: &str, desired: Attributes) -> Result<ResourceState> {
        let resource = self.resource(kind)?;
        let schema = resource.schema();
        self.validate(kind, &desired)?;

        let mut desired = desired;
        schema.apply_defaults(&mut desired);
        let mut d = ResourceData::new(desired);

        self.run(&schema, Op::Create, kind, "", resource.create(&self.ctx, &mut d))
            .await?;
        if d.is_gone() {
            return Err(ProviderError::invalid(format!(
                "{} disappeared right after creation",
                kind
            )));
        }
        tracing::info!("created {} {}", kind, d.id());
        Ok(self.to_state(kind, &schema, d))
    }

    /// Fresh state, or `None` when the remote resource is gone
    pub async fn read(&self, state: &ResourceState) -> Result<Option<ResourceState>> {
        let kind = state.resource_type.as_str();
        let resource = self.resource(kind)?;
        let schema = resource.schema();
        let state = self.upgrade_state(state.clone())?;

        let mut d = ResourceData::from_state(state.id.as_str(), state.attributes);
        self.run(&schema, Op::Read, kind, &state.id, resource.read(&self.ctx, &mut d))
            .await?;

        if d.is_gone() {
            return Ok(None);
        }
        Ok(Some(self.to_state(kind, &schema, d)))
    }

    pub async fn update(&self, state: &ResourceState, desired: Attributes) -> Result<ResourceState> {
        let kind = state.resource_type.as_str();
        let resource = self.resource(kind)?;
        let schema = resource.schema();
        self.validate(kind, &desired)?;
        let state = self.upgrade_state(state.clone())?;

        let mut desired = desired;
        schema.apply_defaults(&mut desired);
        let diff = schema.diff(&state.attributes, &desired);
        if diff.requires_replace {
            let forced: Vec<&str> = diff
                .changes
                .iter()
                .filter(|c| c.requires_replace)
                .map(|c| c.name.as_str())
                .collect();
            return Err(ProviderError::invalid(format!(
                "{} {} cannot be updated in place, changed: {}",
                kind,
                state.id,
                forced.join(", ")
            )));
        }

        schema.clear_omitted(&mut desired);
        let mut d = ResourceData::for_update(state.id.as_str(), state.attributes, desired);
        self.run(&schema, Op::Update, kind, &state.id, resource.update(&self.ctx, &mut d))
            .await?;
        Ok(self.to_state(kind, &schema, d))
    }

    pub async fn delete(&self, state: &ResourceState) -> Result<()> {
        let kind = state.resource_type.as_str();
        let resource = self.resource(kind)?;
        let schema = resource.schema();
        let state = self.upgrade_state(state.clone())?;

        let mut d = ResourceData::from_state(state.id.as_str(), state.attributes);
        self.run(&schema, Op::Delete, kind, &state.id, resource.delete(&self.ctx, &mut d))
            .await?;
        tracing::info!("deleted {} {}", kind, state.id);
        Ok(())
    }

    pub async fn exists(&self, state: &ResourceState) -> Result<bool> {
        let kind = state.resource_type.as_str();
        let resource = self.resource(kind)?;
        let schema = resource.schema();

        let d = ResourceData::from_state(state.id.as_str(), state.attributes.clone());
        self.run(&schema, Op::Read, kind, &state.id, resource.exists(&self.ctx, &d))
            .await
    }

    /// Import `id`, returning the root resource first and then any siblings
    pub async fn import(&self, kind: &str, id: &str) -> Result<Vec<ResourceState>> {
        let resource = self.resource(kind)?;
        let schema = resource.schema();

        let imported = self
            .run(&schema, Op::Read, kind, id, import::import(&self.ctx, resource.as_ref(), id))
            .await?;

        imported
            .into_iter()
            .map(|Imported { resource_type, id, attributes }| {
                let version = self.resource(&resource_type)?.schema().version;
                Ok(ResourceState::new(resource_type, id)
                    .with_schema_version(version)
                    .with_attributes(attributes))
            })
            .collect()
    }

    /// Bring stored state up to the current schema version
    pub fn upgrade_state(&self, mut state: ResourceState) -> Result<ResourceState> {
        let resource = self.resource(&state.resource_type)?;
        let target = resource.schema().version;

        while state.schema_version < target {
            tracing::info!(
                "upgrading {} {} state from version {}",
                state.resource_type,
                state.id,
                state.schema_version
            );
            state.attributes = resource.upgrade_state(state.schema_version, state.attributes)?;
            state.schema_version += 1;
        }
        Ok(state)
    }

    pub async fn read_data_source(&self, kind: &str, args: Attributes) -> Result<Attributes> {
        let source = self
            .data_sources
            .get(kind)
            .ok_or_else(|| ProviderError::UnknownResource(kind.to_string()))?;
        let schema = source.schema();

        let mut args = args;
        schema.apply_defaults(&mut args);
        schema.validate(&args)?;

        let mut d = ResourceData::new(args);
        self.run(&schema, Op::Read, kind, "", source.read(&self.ctx, &mut d))
            .await?;
        Ok(d.into_attributes())
    }
}
