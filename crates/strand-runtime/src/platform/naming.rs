//! Destination connector naming rules, keyed by resource type.

use std::sync::LazyLock;

use strand_core::{StrandError, StrandResult};

use crate::contract::ResourceConfigs;

pub const TABLE_NAME_KEY: &str = "table.name.format";
pub const COLLECTION_KEY: &str = "collection";
pub const KEY_PREFIX_KEY: &str = "aws_s3_prefix";
pub const WAREHOUSE_ROUTE_KEY: &str = "snowflake.topic2table.map";

/// Identifiers a warehouse route accepts: a letter, then letters, digits or `_`.
static WAREHOUSE_IDENTIFIER: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"^[a-zA-Z][a-zA-Z0-9_]*$").expect("valid identifier regex")
});

/// How a destination of a given resource type learns where records go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestinationPolicy {
    /// Relational targets: lowercased table name.
    TableName,
    /// Document stores: lowercased collection name.
    CollectionName,
    /// Object storage: lowercased key prefix ending in `/`.
    KeyPrefix,
    /// Warehouses: validated `stream:collection` route.
    WarehouseRoute,
    /// Unknown types keep the caller's configuration untouched.
    PassThrough,
}

impl DestinationPolicy {
    pub fn for_resource_type(resource_type: &str) -> Self {
        match resource_type {
            "postgres" | "mysql" | "redshift" => DestinationPolicy::TableName,
            "mongodb" => DestinationPolicy::CollectionName,
            "s3" => DestinationPolicy::KeyPrefix,
            "snowflakedb" => DestinationPolicy::WarehouseRoute,
            _ => DestinationPolicy::PassThrough,
        }
    }

    /// Adds the naming entry for `collection` to `config`.
    ///
    /// `upstream` is the stream the destination reads from; only warehouse
    /// routes embed it.
    pub fn apply(
        self,
        upstream: &str,
        collection: &str,
        mut config: ResourceConfigs,
    ) -> StrandResult<ResourceConfigs> {
        match self {
            DestinationPolicy::TableName => {
                config.insert(TABLE_NAME_KEY, collection.to_lowercase());
            }
            DestinationPolicy::CollectionName => {
                config.insert(COLLECTION_KEY, collection.to_lowercase());
            }
            DestinationPolicy::KeyPrefix => {
                config.insert(KEY_PREFIX_KEY, format!("{}/", collection.to_lowercase()));
            }
            DestinationPolicy::WarehouseRoute => {
                if !WAREHOUSE_IDENTIFIER.is_match(collection) {
                    return Err(StrandError::validation(
                        format!("collection name \"{collection}\""),
                        "warehouse collections must start with a letter and contain only letters, digits and underscores",
                    ));
                }
                config.insert(WAREHOUSE_ROUTE_KEY, format!("{upstream}:{collection}"));
            }
            DestinationPolicy::PassThrough => {}
        }
        Ok(config)
    }
}

/// Configuration submitted for a destination of `resource_type`.
pub fn destination_config(
    resource_type: &str,
    upstream: &str,
    collection: &str,
    config: ResourceConfigs,
) -> StrandResult<ResourceConfigs> {
    let policy = DestinationPolicy::for_resource_type(resource_type);
    if policy == DestinationPolicy::PassThrough {
        tracing::warn!(
            resource_type = %resource_type,
            collection = %collection,
            "no naming rule for resource type, configuration passed through unchanged"
        );
    }
    policy.apply(upstream, collection, config)
}
