//! HTTP collaborators for perch
//!
//! Implements [`perch_cloud::IdentityResolver`] and
//! [`perch_cloud::CredentialVendor`] against the customer identity service and
//! the credential vending service.
//!
//! # Example
//!
//! ```ignore
//! use perch_services::{HttpIdentityResolver, ServiceEndpoint};
//!
//! let endpoint = ServiceEndpoint::new("https://identity.internal", timeout)?;
//! let resolver = HttpIdentityResolver::new(endpoint)?;
//! let customer = resolver.resolve_user(&UserQuery::parse("ops@example.com")?).await?;
//! ```

pub mod api;
pub mod credentials;
pub mod error;
pub mod identity;

pub use api::{DEFAULT_TIMEOUT, ServiceEndpoint};
pub use credentials::HttpCredentialVendor;
pub use error::{Result, ServiceError};
pub use identity::HttpIdentityResolver;
