//! Perch cloud core
//!
//! Cross-region bastion lookup and stack lifecycle orchestration. This crate
//! owns the model, the backend traits and all decision logic; concrete
//! backends (AWS, HTTP collaborators) live in sibling crates.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                   perch CLI                      │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │                  perch-cloud                     │
//! │  ResourceLocator ──► CredentialBroker            │
//! │        │                                         │
//! │        └──────────► RegionScanner                │
//! │  params::merge ──► LifecycleOrchestrator         │
//! │  trait RegionClient / RegionClientFactory        │
//! └───────┬─────────────────┬───────────────────────┘
//!         │                 │
//! ┌───────▼───────┐ ┌───────▼───────┐
//! │ perch-cloud-  │ │ perch-        │
//! │ aws           │ │ services      │
//! └───────────────┘ └───────────────┘
//! ```

pub mod action;
pub mod backend;
pub mod credentials;
pub mod error;
pub mod identity;
pub mod lifecycle;
pub mod locator;
pub mod model;
pub mod params;
pub mod poll;
pub mod region;
pub mod scanner;

// Re-exports
pub use action::{ActionType, ApplyOutcome, PlanSummary, StackPlan};
pub use backend::{RegionClient, RegionClientFactory, StackRequest, TemplateSource};
pub use credentials::{CredentialBroker, CredentialVendor, ScopedCredentials};
pub use error::{CloudError, Result};
pub use identity::{CustomerIdentity, IdentityResolver, UserQuery, parse_bastion_id};
pub use lifecycle::{Applied, LifecycleOrchestrator, LifecycleSettings, TerminalStatus};
pub use locator::{
    Inventory, LocatedResource, Location, LocatorSettings, ResourceLocator, StackPolicy,
    Unlocated,
};
pub use model::{
    Instance, InstanceState, Parameter, StackDescription, StackEvent, StackOutcome, StackStatus,
    Tag, stack_name,
};
pub use params::{ParameterOverrides, ParameterSet, ParameterValue, merge, strip_known_fragment};
pub use poll::{PollConfig, PollResult, poll_until};
pub use region::RegionList;
pub use scanner::{
    NamedStackQuery, RegionQuery, RegionScanner, ScanOutcome, ScanPolicy, TaggedInstanceQuery,
};
