//! `exoscale_domain_record`

use crate::data::{AttrReader, ResourceData};
use crate::error::{ProviderError, Result};
use crate::resource::{Context, Resource, deleted, exists_from, or_gone};
use crate::schema::{Attribute, Schema, Validator};
use async_trait::async_trait;
use exoscale_client::ApiError;
use exoscale_client::dns::{Record, RecordRequest};

pub struct DomainRecordResource;

pub const RECORD_TYPES: &[&str] = &[
    "A", "AAAA", "ALIAS", "CAA", "CNAME", "HINFO", "MX", "NAPTR", "NS", "POOL", "SPF", "SRV", "SSHFP",
    "TXT", "URL",
];

/// Fully qualified name of a record
pub fn hostname(name: &str, domain: &str) -> String {
    if name.is_empty() {
        domain.to_string()
    } else {
        format!("{}.{}", name, domain)
    }
}

pub(crate) fn apply(d: &mut ResourceData, domain: &str, record: &Record) {
    d.set("domain", domain);
    d.set("name", record.name.as_str());
    d.set("record_type", record.record_type.as_str());
    d.set("content", record.content.as_str());
    d.set("ttl", record.ttl);
    d.set_opt("prio", record.prio);
    d.set("hostname", hostname(&record.name, domain));
}

fn request(d: &ResourceData) -> RecordRequest {
    RecordRequest {
        name: d.get_string("name").unwrap_or_default(),
        record_type: d.get_str("record_type").unwrap_or_default().to_uppercase(),
        content: d.get_string("content").unwrap_or_default(),
        ttl: d.get_i64("ttl"),
        prio: d.get_i64("prio"),
    }
}

fn record_id(d: &ResourceData) -> Result<i64> {
    d.id()
        .parse()
        .map_err(|_| ProviderError::invalid(format!("record ID {:?} is not numeric", d.id())))
}

#[async_trait]
impl Resource for DomainRecordResource {
    fn kind(&self) -> &'static str {
        "exoscale_domain_record"
    }

    fn schema(&self) -> Schema {
        Schema::new(vec![
            Attribute::string("domain").required().force_new(),
            // empty for the apex
            Attribute::string("name"),
            Attribute::string("record_type")
                .required()
                .force_new()
                .case_insensitive()
                .validate(Validator::OneOf(RECORD_TYPES)),
            Attribute::string("content").required(),
            Attribute::int("ttl").optional_computed(),
            Attribute::int("prio").optional_computed(),
            Attribute::string("hostname").computed(),
        ])
    }

    async fn create(&self, ctx: &Context, d: &mut ResourceData) -> Result<()> {
        let domain = d.get_string("domain").unwrap_or_default();
        let record = ctx.api().create_record(&domain, &request(d)).await?;
        d.set_id(record.id.to_string());

        self.read(ctx, d).await
    }

    async fn read(&self, ctx: &Context, d: &mut ResourceData) -> Result<()> {
        let domain = d.get_string("domain").unwrap_or_default();
        let id = record_id(d)?;
        let result = ctx.api().get_record(&domain, id).await;
        if let Some(record) = or_gone(d, result)? {
            apply(d, &domain, &record);
        }
        Ok(())
    }

    async fn update(&self, ctx: &Context, d: &mut ResourceData) -> Result<()> {
        if d.has_changes(&["name", "content", "ttl", "prio"]) {
            let domain = d.get_string("domain").unwrap_or_default();
            ctx.api()
                .update_record(&domain, record_id(d)?, &request(d))
                .await?;
        }
        self.read(ctx, d).await
    }

    async fn delete(&self, ctx: &Context, d: &mut ResourceData) -> Result<()> {
        let domain = d.get_string("domain").unwrap_or_default();
        let result = ctx.api().delete_record(&domain, record_id(d)?).await;
        deleted(d, result)
    }

    async fn exists(&self, ctx: &Context, d: &ResourceData) -> Result<bool> {
        let domain = d.get_string("domain").unwrap_or_default();
        exists_from(ctx.api().get_record(&domain, record_id(d)?).await)
    }

    /// `<domain>/<record-id>`, or a bare record ID searched across every
    /// domain of the account
    async fn import(&self, ctx: &Context, id: &str) -> Result<ResourceData> {
        let (domain, raw_id) = match id.split_once('/') {
            Some((domain, raw_id)) => (Some(domain), raw_id),
            None => (None, id),
        };
        let record_id: i64 = raw_id
            .parse()
            .map_err(|_| ProviderError::invalid(format!("record ID {:?} is not numeric", raw_id)))?;

        let (domain, record) = match domain {
            Some(domain) => (domain.to_string(), ctx.api().get_record(domain, record_id).await?),
            None => find_record(ctx, record_id).await?,
        };

        let mut d = ResourceData::new(Default::default());
        d.set_id(record.id.to_string());
        apply(&mut d, &domain, &record);
        d.commit();
        Ok(d)
    }
}

async fn find_record(ctx: &Context, id: i64) -> Result<(String, Record)> {
    for domain in ctx.api().list_domains().await? {
        let records = ctx.api().list_records(&domain.name).await?;
        if let Some(record) = records.into_iter().find(|r| r.id == id) {
            return Ok((domain.name, record));
        }
    }
    Err(ApiError::NotFound(format!("DNS record {}", id)).into())
}
