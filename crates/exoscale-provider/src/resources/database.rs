//! `exoscale_database`
//!
//! Managed database services. The service type selects the typed endpoint
//! and the shape of `user_config`, a JSON document holding the type's
//! settings.

use crate::data::{AttrReader, ResourceData};
use crate::error::{ProviderError, Result};
use crate::mapper::{split_zone, timestamp};
use crate::resource::{Context, Resource, deleted, exists_from, or_gone};
use crate::schema::{Attribute, Schema, Timeouts, Validator, validators};
use async_trait::async_trait;
use exoscale_client::dbaas::{DatabaseRequest, DatabaseService, DatabaseType, Maintenance};
use serde_json::Value;
use std::time::Duration;

pub struct DatabaseResource;

const TYPES: &[&str] = &["kafka", "mysql", "pg", "redis", "opensearch"];

const DAYS: &[&str] = &[
    "monday", "tuesday", "wednesday", "thursday", "friday", "saturday", "sunday", "never",
];

fn kind_of(d: &ResourceData) -> Result<DatabaseType> {
    let kind = d.get_str("type").unwrap_or_default();
    Ok(kind.to_lowercase().parse::<DatabaseType>()?)
}

fn maintenance(d: &ResourceData) -> Option<Maintenance> {
    match (d.get_string("maintenance_dow"), d.get_string("maintenance_time")) {
        (Some(dow), Some(time)) => Some(Maintenance { dow, time }),
        _ => None,
    }
}

fn user_config(d: &ResourceData) -> Result<Option<Value>> {
    d.get_str("user_config")
        .map(|raw| {
            serde_json::from_str::<Value>(raw)
                .map_err(|e| ProviderError::invalid(format!("user_config: {}", e)))
        })
        .transpose()
}

fn apply(d: &mut ResourceData, zone: &str, kind: DatabaseType, db: &DatabaseService) -> Result<()> {
    d.set("zone", zone);
    d.set("type", kind.as_str());
    d.set("name", db.name.as_str());
    d.set("plan", db.plan.as_str());
    d.set_opt("state", db.state.clone());
    d.set_opt("version", db.version.clone());
    d.set("termination_protection", db.termination_protection);
    d.set_opt("maintenance_dow", db.maintenance.as_ref().map(|m| m.dow.clone()));
    d.set_opt("maintenance_time", db.maintenance.as_ref().map(|m| m.time.clone()));
    d.set_opt("node_count", db.node_count);
    d.set_opt("node_cpus", db.node_cpu_count);
    d.set_opt("node_memory", db.node_memory);
    d.set_opt("disk_size", db.disk_size);
    d.set_opt("uri", db.uri.clone());
    d.set_opt("created_at", db.created_at.as_ref().map(timestamp));
    d.set_opt("updated_at", db.updated_at.as_ref().map(timestamp));

    let settings = db
        .settings(kind)
        .map(serde_json::to_string)
        .transpose()?;
    d.set_opt("user_config", settings);
    Ok(())
}

#[async_trait]
impl Resource for DatabaseResource {
    fn kind(&self) -> &'static str {
        "exoscale_database"
    }

    fn schema(&self) -> Schema {
        Schema::new(vec![
            Attribute::string("zone").required().force_new(),
            Attribute::string("type")
                .required()
                .force_new()
                .case_insensitive()
                .validate(Validator::OneOf(TYPES)),
            Attribute::string("name").required().force_new(),
            Attribute::string("plan").required(),
            Attribute::string("version").optional_computed().force_new(),
            Attribute::string("maintenance_dow")
                .optional_computed()
                .validate(Validator::OneOf(DAYS))
                .required_with(&["maintenance_time"]),
            Attribute::string("maintenance_time")
                .optional_computed()
                .validate(Validator::Regex(validators::TIME_OF_DAY_PATTERN, "HH:MM:SS"))
                .required_with(&["maintenance_dow"]),
            Attribute::bool("termination_protection").optional_computed(),
            Attribute::string("user_config")
                .optional_computed()
                .validate(Validator::Json)
                .json_subset(),
            Attribute::string("state").computed(),
            Attribute::int("node_count").computed(),
            Attribute::int("node_cpus").computed(),
            Attribute::int("node_memory").computed(),
            Attribute::int("disk_size").computed(),
            Attribute::string("uri").computed().sensitive(),
            Attribute::string("ca_certificate").computed(),
            Attribute::string("created_at").computed(),
            Attribute::string("updated_at").computed(),
        ])
        .with_timeouts(Timeouts {
            create: Some(Duration::from_secs(20 * 60)),
            update: Some(Duration::from_secs(20 * 60)),
            ..Default::default()
        })
    }

    async fn create(&self, ctx: &Context, d: &mut ResourceData) -> Result<()> {
        let zone = ctx.zone_of(d);
        let kind = kind_of(d)?;
        let name = d.get_string("name").unwrap_or_default();

        let req = DatabaseRequest {
            plan: d.get_string("plan"),
            version: d.get_string("version"),
            maintenance: maintenance(d),
            termination_protection: d.get_bool("termination_protection"),
            settings: user_config(d)?,
        };
        ctx.api().create_database(&zone, kind, &name, &req).await?;
        d.set_id(name);

        self.read(ctx, d).await
    }

    async fn read(&self, ctx: &Context, d: &mut ResourceData) -> Result<()> {
        let zone = ctx.zone_of(d);
        let kind = kind_of(d)?;
        let name = d.id().to_string();
        let result = ctx.api().get_database(&zone, kind, &name).await;
        let Some(db) = or_gone(d, result)? else {
            return Ok(());
        };
        apply(d, &zone, kind, &db)?;

        let certificate = ctx.api().get_database_ca_certificate(&zone).await?;
        d.set("ca_certificate", certificate);
        Ok(())
    }

    async fn update(&self, ctx: &Context, d: &mut ResourceData) -> Result<()> {
        let mut req = DatabaseRequest::default();
        if d.has_change("plan") {
            req.plan = d.get_string("plan");
        }
        if d.has_changes(&["maintenance_dow", "maintenance_time"]) {
            req.maintenance = maintenance(d);
        }
        if d.has_change("termination_protection") {
            req.termination_protection = d.get_bool("termination_protection");
        }
        if d.has_change("user_config") {
            req.settings = user_config(d)?;
        }

        if req != DatabaseRequest::default() {
            let zone = ctx.zone_of(d);
            let kind = kind_of(d)?;
            ctx.api().update_database(&zone, kind, d.id(), &req).await?;
        }
        self.read(ctx, d).await
    }

    async fn delete(&self, ctx: &Context, d: &mut ResourceData) -> Result<()> {
        let zone = ctx.zone_of(d);
        let name = d.id().to_string();
        let result = ctx.api().delete_database(&zone, &name).await;
        deleted(d, result)
    }

    async fn exists(&self, ctx: &Context, d: &ResourceData) -> Result<bool> {
        let kind = kind_of(d)?;
        exists_from(ctx.api().get_database(&ctx.zone_of(d), kind, d.id()).await)
    }

    /// `<name>@<zone>`; the service type is discovered
    async fn import(&self, ctx: &Context, id: &str) -> Result<ResourceData> {
        let (name, zone) = split_zone(id);
        let (zone, summary) = ctx
            .find_in_zones(zone, |zone| async move { ctx.api().find_database(&zone, name).await })
            .await?;

        let mut d = ResourceData::new(Default::default());
        d.set("zone", zone.as_str());
        d.set("type", summary.kind.as_str());
        d.set_id(summary.name.as_str());
        self.read(ctx, &mut d).await?;
        d.commit();
        Ok(d)
    }
}
