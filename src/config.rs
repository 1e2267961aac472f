use crate::fleet::controller::PoolTargets;

use anyhow::Result;
use std::net::SocketAddr;
use std::time::Duration;

const DEFAULT_BIND: &str = "0.0.0.0:4000";
const DEFAULT_FLEET_COMMAND: &str = "fleetctl";
const DEFAULT_CATALOG_ADDR: &str = "127.0.0.1:4100";

const FLEET_TICK_SECS: u64 = 60;
const CONSISTENCY_TICK_SECS: u64 = 300;
const PROBE_SCAN_TICK_SECS: u64 = 60;
const PROBE_INTERVAL_SECS: u64 = 30;
const PROBE_STALENESS_SECS: u64 = 150;
const ACTIVATION_DEADLINE_SECS: u64 = 8 * 60;

const TARGET_COORDINATORS: u32 = 2;
const TARGET_WORKERS: u32 = 3;
const TARGET_STORAGE: u32 = 4;

/// Runtime configuration, from flags with `NODE_NAME` supplying the identity
/// when `--identity` is absent.
#[derive(Debug, Clone)]
pub struct Config {
    pub identity: String,
    pub bind_addr: SocketAddr,
    pub fleet_command: String,
    pub catalog_addr: String,
    pub targets: PoolTargets,
    pub fleet_tick: Duration,
    pub consistency_tick: Duration,
    pub probe_scan_tick: Duration,
    pub probe_interval: Duration,
    pub probe_staleness: Duration,
    pub activation_deadline: Duration,
}

impl Config {
    pub fn from_args(args: &[String]) -> Result<Self> {
        let mut identity = std::env::var("NODE_NAME").ok();
        let mut bind_addr: SocketAddr = DEFAULT_BIND.parse()?;
        let mut fleet_command = DEFAULT_FLEET_COMMAND.to_string();
        let mut catalog_addr = DEFAULT_CATALOG_ADDR.to_string();

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--identity" => {
                    identity = Some(flag_value(args, i)?);
                    i += 2;
                }
                "--bind" => {
                    bind_addr = flag_value(args, i)?.parse()?;
                    i += 2;
                }
                "--fleet-command" => {
                    fleet_command = flag_value(args, i)?;
                    i += 2;
                }
                "--catalog" => {
                    catalog_addr = flag_value(args, i)?;
                    i += 2;
                }
                _ => {
                    i += 1;
                }
            }
        }

        let identity = identity
            .ok_or_else(|| anyhow::anyhow!("Node identity missing: set NODE_NAME or --identity"))?;

        Ok(Self {
            identity,
            bind_addr,
            fleet_command,
            catalog_addr,
            targets: PoolTargets {
                coordinators: TARGET_COORDINATORS,
                workers: TARGET_WORKERS,
                storage: TARGET_STORAGE,
            },
            fleet_tick: Duration::from_secs(FLEET_TICK_SECS),
            consistency_tick: Duration::from_secs(CONSISTENCY_TICK_SECS),
            probe_scan_tick: Duration::from_secs(PROBE_SCAN_TICK_SECS),
            probe_interval: Duration::from_secs(PROBE_INTERVAL_SECS),
            probe_staleness: Duration::from_secs(PROBE_STALENESS_SECS),
            activation_deadline: Duration::from_secs(ACTIVATION_DEADLINE_SECS),
        })
    }
}

fn flag_value(args: &[String], i: usize) -> Result<String> {
    args.get(i + 1)
        .cloned()
        .ok_or_else(|| anyhow::anyhow!("{} requires a value", args[i]))
}
