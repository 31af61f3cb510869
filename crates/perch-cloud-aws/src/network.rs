//! VPC and subnet inventory for one region

use crate::client::sdk_config;
use crate::error::{AwsError, Result};
use aws_sdk_ec2 as ec2;
use perch_cloud::ScopedCredentials;
use serde::Serialize;
use std::collections::HashMap;

const ANYWHERE: &str = "0.0.0.0/0";

/// How traffic from a subnet reaches the internet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Routing {
    /// Default route through an internet gateway
    Public,
    /// Default route through a NAT gateway
    Nat,
    Private,
}

impl std::fmt::Display for Routing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Routing::Public => write!(f, "public"),
            Routing::Nat => write!(f, "nat"),
            Routing::Private => write!(f, "private"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubnetSummary {
    pub subnet_id: String,
    pub availability_zone: String,
    pub cidr_block: String,
    pub instance_count: usize,
    pub routing: Routing,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VpcSummary {
    pub vpc_id: String,
    pub cidr_block: String,
    pub is_default: bool,
    pub instance_count: usize,
    pub subnets: Vec<SubnetSummary>,
}

/// Raw facts gathered from EC2 before aggregation
#[derive(Debug, Clone, Default)]
pub struct NetworkFacts {
    pub vpcs: Vec<(String, String, bool)>,
    /// (subnet id, vpc id, availability zone, cidr)
    pub subnets: Vec<(String, String, String, String)>,
    /// (vpc id, subnet id) of every non-terminated instance
    pub instances: Vec<(String, String)>,
    pub route_tables: Vec<RouteTableFacts>,
}

#[derive(Debug, Clone, Default)]
pub struct RouteTableFacts {
    pub vpc_id: String,
    pub main: bool,
    pub subnet_ids: Vec<String>,
    pub default_routing: Option<Routing>,
}

/// Subnets without an explicit association use their VPC's main table
pub fn summarize(facts: &NetworkFacts) -> Vec<VpcSummary> {
    let mut per_vpc: HashMap<&str, usize> = HashMap::new();
    let mut per_subnet: HashMap<&str, usize> = HashMap::new();
    for (vpc, subnet) in &facts.instances {
        *per_vpc.entry(vpc.as_str()).or_default() += 1;
        *per_subnet.entry(subnet.as_str()).or_default() += 1;
    }

    let routing_for = |subnet_id: &str, vpc_id: &str| {
        let explicit = facts
            .route_tables
            .iter()
            .find(|rt| rt.subnet_ids.iter().any(|s| s == subnet_id));
        let table = explicit.or_else(|| {
            facts
                .route_tables
                .iter()
                .find(|rt| rt.main && rt.vpc_id == vpc_id)
        });
        table
            .and_then(|rt| rt.default_routing)
            .unwrap_or(Routing::Private)
    };

    facts
        .vpcs
        .iter()
        .map(|(vpc_id, cidr, is_default)| VpcSummary {
            vpc_id: vpc_id.clone(),
            cidr_block: cidr.clone(),
            is_default: *is_default,
            instance_count: per_vpc.get(vpc_id.as_str()).copied().unwrap_or(0),
            subnets: facts
                .subnets
                .iter()
                .filter(|(_, owner, _, _)| owner == vpc_id)
                .map(|(subnet_id, _, az, cidr)| SubnetSummary {
                    subnet_id: subnet_id.clone(),
                    availability_zone: az.clone(),
                    cidr_block: cidr.clone(),
                    instance_count: per_subnet.get(subnet_id.as_str()).copied().unwrap_or(0),
                    routing: routing_for(subnet_id, vpc_id),
                })
                .collect(),
        })
        .collect()
}

pub struct NetworkScanner {
    client: ec2::Client,
    region: String,
}

impl NetworkScanner {
    pub fn new(credentials: &ScopedCredentials, region: &str, max_attempts: u32) -> Self {
        let config = sdk_config(credentials, region, max_attempts);
        Self {
            client: ec2::Client::new(&config),
            region: region.to_string(),
        }
    }

    pub async fn scan(&self) -> Result<Vec<VpcSummary>> {
        tracing::info!("Scanning networks in {}", self.region);
        let facts = self.gather().await?;
        Ok(summarize(&facts))
    }

    async fn gather(&self) -> Result<NetworkFacts> {
        let mut facts = NetworkFacts::default();

        let vpcs = self
            .client
            .describe_vpcs()
            .send()
            .await
            .map_err(|e| AwsError::api("DescribeVpcs", e))?;
        facts.vpcs = vpcs
            .vpcs()
            .iter()
            .map(|v| {
                (
                    v.vpc_id().unwrap_or_default().to_string(),
                    v.cidr_block().unwrap_or_default().to_string(),
                    v.is_default().unwrap_or(false),
                )
            })
            .collect();

        let subnets = self
            .client
            .describe_subnets()
            .send()
            .await
            .map_err(|e| AwsError::api("DescribeSubnets", e))?;
        facts.subnets = subnets
            .subnets()
            .iter()
            .map(|s| {
                (
                    s.subnet_id().unwrap_or_default().to_string(),
                    s.vpc_id().unwrap_or_default().to_string(),
                    s.availability_zone().unwrap_or_default().to_string(),
                    s.cidr_block().unwrap_or_default().to_string(),
                )
            })
            .collect();

        let tables = self
            .client
            .describe_route_tables()
            .send()
            .await
            .map_err(|e| AwsError::api("DescribeRouteTables", e))?;
        facts.route_tables = tables.route_tables().iter().map(convert_route_table).collect();

        let mut paginator = self.client.describe_instances().into_paginator().send();
        while let Some(page) = paginator
            .try_next()
            .await
            .map_err(|e| AwsError::api("DescribeInstances", e))?
        {
            for reservation in page.reservations() {
                for instance in reservation.instances() {
                    let terminated = instance
                        .state()
                        .and_then(|s| s.name())
                        .is_some_and(|n| *n == ec2::types::InstanceStateName::Terminated);
                    if terminated {
                        continue;
                    }
                    if let (Some(vpc), Some(subnet)) = (instance.vpc_id(), instance.subnet_id()) {
                        facts.instances.push((vpc.to_string(), subnet.to_string()));
                    }
                }
            }
        }

        Ok(facts)
    }
}

fn convert_route_table(table: &ec2::types::RouteTable) -> RouteTableFacts {
    let default_routing = table
        .routes()
        .iter()
        .find(|r| r.destination_cidr_block() == Some(ANYWHERE))
        .map(|r| {
            if r.gateway_id().is_some_and(|g| g.starts_with("igw-")) {
                Routing::Public
            } else if r.nat_gateway_id().is_some() {
                Routing::Nat
            } else {
                Routing::Private
            }
        });

    RouteTableFacts {
        vpc_id: table.vpc_id().unwrap_or_default().to_string(),
        main: table.associations().iter().any(|a| a.main() == Some(true)),
        subnet_ids: table
            .associations()
            .iter()
            .filter_map(|a| a.subnet_id().map(str::to_string))
            .collect(),
        default_routing,
    }
}
