//! Stored state upgrades

use crate::data::Attributes;
use serde_json::Value;

/// Rule blocks from version 0 recorded port 0 where the API now reports
/// port 1: `_0`/`_0-N` id suffixes become `_1`/`_1-N` and `0-N` ports
/// become `1-N`. Already migrated state is left as is.
pub fn rule_blocks_v0_to_v1(mut attrs: Attributes) -> Attributes {
    for name in ["ingress", "egress"] {
        match attrs.get_mut(name) {
            Some(Value::Array(blocks)) => {
                for block in blocks.iter_mut() {
                    if let Value::Object(block) = block {
                        migrate_block(block);
                    }
                }
            }
            Some(Value::Object(block)) => migrate_block(block),
            _ => {}
        }
    }
    attrs
}

fn migrate_block(block: &mut Attributes) {
    rewrite_strings(block, "ids", migrate_id);
    rewrite_strings(block, "ports", migrate_ports);
}

fn rewrite_strings(block: &mut Attributes, key: &str, rewrite: fn(&str) -> String) {
    if let Some(Value::Array(items)) = block.get_mut(key) {
        for item in items.iter_mut() {
            if let Value::String(s) = item {
                *s = rewrite(s);
            }
        }
    }
}

fn migrate_id(id: &str) -> String {
    match id.rsplit_once('_') {
        Some((head, tail)) if tail == "0" || tail.starts_with("0-") => {
            format!("{}_1{}", head, &tail[1..])
        }
        _ => id.to_string(),
    }
}

fn migrate_ports(ports: &str) -> String {
    if ports == "0" || ports.starts_with("0-") {
        format!("1{}", &ports[1..])
    } else {
        ports.to_string()
    }
}
