//! AWS backend for perch
//!
//! Implements the `perch-cloud` backend traits on top of the AWS SDK:
//! CloudFormation and EC2 per region, template downloads from S3, and a few
//! operator helpers (bastion images, role policies, network inventory).

pub mod ami;
pub mod client;
pub mod error;
pub mod iam;
pub mod network;
pub mod template;

pub use ami::{AmiCatalog, AmiSettings, BastionImage};
pub use client::{AwsClientFactory, AwsRegionClient, DEFAULT_MAX_ATTEMPTS, sdk_config};
pub use error::{AwsError, Result};
pub use iam::{PolicyDocument, RolePolicy, RolePolicyManager, RoleSettings};
pub use network::{NetworkScanner, Routing, SubnetSummary, VpcSummary};
pub use template::{S3TemplateSource, TemplateLocation};
