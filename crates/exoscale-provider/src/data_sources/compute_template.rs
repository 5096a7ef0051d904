//! `exoscale_compute_template`

use super::DataSource;
use crate::data::{AttrReader, ResourceData};
use crate::error::{ProviderError, Result};
use crate::resource::Context;
use crate::schema::{Attribute, Schema, Validator};
use crate::templates;
use async_trait::async_trait;
use exoscale_client::compute::TemplateFilter;

pub struct ComputeTemplateDataSource;

#[async_trait]
impl DataSource for ComputeTemplateDataSource {
    fn kind(&self) -> &'static str {
        "exoscale_compute_template"
    }

    fn schema(&self) -> Schema {
        Schema::new(vec![
            Attribute::string("zone").required(),
            Attribute::string("name")
                .optional_computed()
                .conflicts_with(&["id"]),
            Attribute::string("id")
                .optional_computed()
                .conflicts_with(&["name"]),
            Attribute::string("filter")
                .default("featured")
                .validate(Validator::OneOf(&["featured", "community", "mine"])),
            Attribute::string("username").computed(),
        ])
    }

    async fn read(&self, ctx: &Context, d: &mut ResourceData) -> Result<()> {
        let filter = match d.get_str("filter") {
            Some(value) => TemplateFilter::parse(value)
                .ok_or_else(|| ProviderError::invalid(format!("unknown template filter {:?}", value)))?,
            None => TemplateFilter::default(),
        };

        let zone = templates::zone(ctx, &ctx.zone_of(d)).await?;
        let template = match (d.get_string("id"), d.get_string("name")) {
            (Some(id), _) => ctx.api().get_template(&zone.id, &id, filter).await?,
            (None, Some(name)) => templates::resolve(ctx, &zone.id, &name, None, filter).await?,
            (None, None) => return Err(ProviderError::invalid("one of name or id is required")),
        };

        d.set_id(template.id.as_str());
        d.set("name", template.name.as_str());
        d.set("username", templates::username(&template));
        Ok(())
    }
}
