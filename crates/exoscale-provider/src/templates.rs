//! Template lookup shared by compute instances and the template data source

use crate::error::{ProviderError, Result};
use crate::resource::Context;
use exoscale_client::ApiError;
use exoscale_client::compute::{Template, TemplateFilter, Zone};

/// Login user implied by well-known template name prefixes
const USERNAME_PREFIXES: &[(&str, &str)] = &[
    ("ubuntu", "ubuntu"),
    ("centos", "centos"),
    ("redhat", "cloud-user"),
    ("fedora", "fedora"),
    ("coreos", "core"),
    ("debian", "debian"),
];

/// Guess the login user from a template name such as `Linux Ubuntu 22.04`
pub fn infer_username(template_name: &str) -> &'static str {
    let name = template_name.to_lowercase();
    let name = name
        .strip_prefix("linux")
        .unwrap_or(&name)
        .trim_start_matches([' ', '-', '_']);
    USERNAME_PREFIXES
        .iter()
        .find(|(prefix, _)| name.starts_with(prefix))
        .map_or("root", |(_, user)| user)
}

/// The template's advertised user, else the inferred one
pub fn username(template: &Template) -> String {
    template
        .username()
        .map(str::to_string)
        .unwrap_or_else(|| infer_username(&template.name).to_string())
}

pub fn looks_like_id(value: &str) -> bool {
    value.len() == 36
        && value
            .chars()
            .all(|c| c.is_ascii_hexdigit() || c == '-')
}

/// Among templates named `name` (case-insensitively), the smallest whose
/// base size fits in `disk_size` GiB; without a size, the smallest overall.
///
/// Fails with NotFound when no template has that name, and as invalid when
/// every candidate is larger than the requested disk.
pub fn pick(templates: Vec<Template>, name: &str, disk_size: Option<i64>) -> Result<Template> {
    let mut candidates: Vec<Template> = templates
        .into_iter()
        .filter(|t| t.name.eq_ignore_ascii_case(name))
        .collect();
    candidates.sort_by_key(|t| t.size_gb().unwrap_or(0));

    let Some(smallest) = candidates.first().and_then(Template::size_gb) else {
        return candidates
            .into_iter()
            .next()
            .ok_or_else(|| ApiError::NotFound(format!("template {:?}", name)).into());
    };
    match disk_size {
        Some(disk) if smallest > disk => Err(ProviderError::invalid(format!(
            "template {:?} needs a disk of at least {} GiB, got {}",
            name, smallest, disk
        ))),
        _ => Ok(candidates.swap_remove(0)),
    }
}

/// Zone record by name or ID
pub async fn zone(ctx: &Context, needle: &str) -> Result<Zone> {
    ctx.api()
        .list_zones()
        .await?
        .into_iter()
        .find(|z| z.id == needle || z.name.eq_ignore_ascii_case(needle))
        .ok_or_else(|| ApiError::NotFound(format!("zone {}", needle)).into())
}

/// Resolve a template given by ID or by name in `zone_id`
pub async fn resolve(
    ctx: &Context,
    zone_id: &str,
    needle: &str,
    disk_size: Option<i64>,
    filter: TemplateFilter,
) -> Result<Template> {
    if looks_like_id(needle) {
        return Ok(ctx.api().get_template(zone_id, needle, filter).await?);
    }

    let templates = ctx.api().list_templates(zone_id, filter, None).await?;
    pick(templates, needle, disk_size)
}
