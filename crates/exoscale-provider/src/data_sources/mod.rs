//! Read-only lookups

pub mod compute_template;

use crate::data::ResourceData;
use crate::error::Result;
use crate::resource::Context;
use crate::schema::Schema;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;

pub use compute_template::ComputeTemplateDataSource;

/// A lookup that fills computed attributes from its arguments
#[async_trait]
pub trait DataSource: Send + Sync {
    fn kind(&self) -> &'static str;

    fn schema(&self) -> Schema;

    async fn read(&self, ctx: &Context, d: &mut ResourceData) -> Result<()>;
}

pub fn registry() -> BTreeMap<&'static str, Arc<dyn DataSource>> {
    let all: Vec<Arc<dyn DataSource>> = vec![Arc::new(ComputeTemplateDataSource)];
    all.into_iter().map(|s| (s.kind(), s)).collect()
}
