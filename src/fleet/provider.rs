//! Inventory and provisioning adapters.
//!
//! The fleet controller never talks to the compute platform directly; it goes
//! through these traits so tests can run against in-memory fakes. The shell
//! implementations wrap an external fleet command (`fleetctl` by default)
//! whose `list` and `describe` output mirrors the usual cloud CLI format.

use super::types::NodeRole;

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::process::Command;

/// One row of the instance listing.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeListing {
    pub id: String,
    pub internal_addr: String,
    pub public_addr: Option<String>,
    pub running: bool,
}

/// Per-instance metadata, fetched separately from the listing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeMetadata {
    pub created_at: Option<u64>,
    pub initialized_at: Option<u64>,
    pub serving: bool,
}

#[async_trait]
pub trait InventoryProvider: Send + Sync {
    async fn list_nodes(&self) -> Result<Vec<NodeListing>>;

    async fn node_metadata(&self, id: &str) -> Result<NodeMetadata>;
}

#[async_trait]
pub trait ProvisioningProvider: Send + Sync {
    async fn create_node(&self, role: NodeRole, ordinal: u32) -> Result<()>;

    async fn delete_node(&self, id: &str) -> Result<()>;
}

pub struct ShellInventory {
    command: String,
}

impl ShellInventory {
    pub fn new(command: &str) -> Self {
        Self {
            command: command.to_string(),
        }
    }
}

pub struct ShellProvisioner {
    command: String,
}

impl ShellProvisioner {
    pub fn new(command: &str) -> Arc<Self> {
        Arc::new(Self {
            command: command.to_string(),
        })
    }
}

async fn run_command(command: &str, args: &[&str]) -> Result<String> {
    let output = Command::new(command).args(args).output().await?;
    if !output.status.success() {
        return Err(anyhow::anyhow!(
            "{} {} failed: {}",
            command,
            args.join(" "),
            String::from_utf8_lossy(&output.stderr).trim()
        ));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Parses the tabular `list` output.
///
/// Expected columns: NAME INTERNAL_IP [EXTERNAL_IP] STATUS, header line first.
/// Rows missing an external address have only three columns.
pub fn parse_listing(output: &str) -> Vec<NodeListing> {
    let mut nodes = Vec::new();

    for line in output.lines().skip(1) {
        let fields: Vec<&str> = line.split_whitespace().collect();
        match fields.as_slice() {
            [id, internal, external, status] => nodes.push(NodeListing {
                id: id.to_string(),
                internal_addr: internal.to_string(),
                public_addr: Some(external.to_string()),
                running: *status == "RUNNING",
            }),
            [id, internal, status] => nodes.push(NodeListing {
                id: id.to_string(),
                internal_addr: internal.to_string(),
                public_addr: None,
                running: *status == "RUNNING",
            }),
            _ => {}
        }
    }

    nodes
}

/// Parses `describe` metadata lines of the form `key: value`.
///
/// Timestamps of `-1` (or anything non-positive) mean the milestone has not
/// been reported and map to `None`.
pub fn parse_metadata(output: &str) -> NodeMetadata {
    let mut metadata = NodeMetadata::default();

    for line in output.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        match key.trim() {
            "created-on" => metadata.created_at = parse_epoch(value),
            "initialized-on" => metadata.initialized_at = parse_epoch(value),
            "startup-status" => metadata.serving = value == "ready",
            _ => {}
        }
    }

    metadata
}

fn parse_epoch(value: &str) -> Option<u64> {
    let parsed: i64 = value.parse().ok()?;
    if parsed <= 0 {
        return None;
    }
    Some(parsed as u64)
}

#[async_trait]
impl InventoryProvider for ShellInventory {
    async fn list_nodes(&self) -> Result<Vec<NodeListing>> {
        let output = run_command(&self.command, &["list"]).await?;
        Ok(parse_listing(&output))
    }

    async fn node_metadata(&self, id: &str) -> Result<NodeMetadata> {
        let output = run_command(&self.command, &["describe", id]).await?;
        Ok(parse_metadata(&output))
    }
}

#[async_trait]
impl ProvisioningProvider for ShellProvisioner {
    async fn create_node(&self, role: NodeRole, ordinal: u32) -> Result<()> {
        let id = format!("{}-{}", role.prefix(), ordinal);
        tracing::info!("Provisioning new instance {}", id);
        run_command(&self.command, &["create", &id]).await?;
        Ok(())
    }

    async fn delete_node(&self, id: &str) -> Result<()> {
        tracing::info!("Deleting instance {}", id);
        run_command(&self.command, &["delete", id]).await?;
        Ok(())
    }
}
