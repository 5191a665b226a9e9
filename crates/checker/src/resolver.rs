//! Expansion of abstract targets into concrete, addressable hosts.

use std::collections::HashMap;
use std::net::IpAddr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::context::RunContext;
use crate::error::CheckerError;
use crate::types::Target;

#[async_trait::async_trait]
pub trait Resolver: Send + Sync {
    async fn resolve(&self, ctx: &RunContext, target: &Target) -> Result<Vec<Target>, CheckerError>;
}

/// Static view of the customer's infrastructure, keyed by group id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Inventory {
    #[serde(default)]
    pub security_groups: HashMap<String, Vec<Target>>,
    #[serde(default)]
    pub load_balancers: HashMap<String, Vec<Target>>,
    #[serde(default)]
    pub autoscaling_groups: HashMap<String, Vec<Target>>,
    #[serde(default)]
    pub instances: HashMap<String, Target>,
    #[serde(default)]
    pub ecs_services: HashMap<String, Vec<Target>>,
}

/// Resolves group targets from an [`Inventory`] and hostnames through DNS.
#[derive(Debug, Clone, Default)]
pub struct InventoryResolver {
    inventory: Inventory,
}

impl InventoryResolver {
    pub fn new(inventory: Inventory) -> Self {
        Self { inventory }
    }

    fn members(group: &HashMap<String, Vec<Target>>, id: &str) -> Vec<Target> {
        group.get(id).cloned().unwrap_or_default()
    }

    fn resolve_instance(&self, target: &Target) -> Vec<Target> {
        if !target.address.is_empty() {
            return vec![target.clone()];
        }
        self.inventory.instances.get(&target.id).cloned().into_iter().collect()
    }

    async fn resolve_host(&self, ctx: &RunContext, target: &Target) -> Result<Vec<Target>, CheckerError> {
        if let Ok(ip) = target.id.parse::<IpAddr>() {
            return Ok(match ip {
                IpAddr::V4(_) => vec![host_target(target, &target.id, ip)],
                IpAddr::V6(_) => Vec::new(),
            });
        }

        let lookup = tokio::net::lookup_host((target.id.as_str(), 0));
        let addrs = tokio::select! {
            addrs = lookup => addrs?,
            err = ctx.done() => return Err(err.into()),
        };

        let mut targets: Vec<Target> = Vec::new();
        for addr in addrs.filter(|addr| addr.is_ipv4()) {
            let resolved = host_target(target, &target.id, addr.ip());
            if !targets.contains(&resolved) {
                targets.push(resolved);
            }
        }
        debug!(host = %target.id, count = targets.len(), "resolved host");
        Ok(targets)
    }
}

/// The name is kept so HTTP checks can present it for SNI.
fn host_target(requested: &Target, host: &str, ip: IpAddr) -> Target {
    Target::new(requested.kind.clone(), ip.to_string())
        .with_name(host)
        .with_address(ip.to_string())
}

#[async_trait::async_trait]
impl Resolver for InventoryResolver {
    async fn resolve(&self, ctx: &RunContext, target: &Target) -> Result<Vec<Target>, CheckerError> {
        debug!(target = %target, "resolving target");
        match target.kind.as_str() {
            "sg" => Ok(Self::members(&self.inventory.security_groups, &target.id)),
            "elb" => {
                let key = if target.name.is_empty() { &target.id } else { &target.name };
                if key.is_empty() {
                    return Err(CheckerError::InvalidTarget(format!("{target} has neither name nor id")));
                }
                Ok(Self::members(&self.inventory.load_balancers, key))
            }
            "asg" => {
                if target.id.is_empty() {
                    return Err(CheckerError::InvalidTarget(format!("{target} has no id")));
                }
                Ok(Self::members(&self.inventory.autoscaling_groups, &target.id))
            }
            "ecs_service" => Ok(Self::members(&self.inventory.ecs_services, &target.id)),
            "instance" | "dbinstance" => Ok(self.resolve_instance(target)),
            "host" | "external_host" => self.resolve_host(ctx, target).await,
            _ => Err(CheckerError::UnresolvableTarget(target.to_string())),
        }
    }
}
