//! Identity service client

use crate::api::{ServiceEndpoint, fetch};
use crate::error::{Result, ServiceError};
use async_trait::async_trait;
use perch_cloud::{CustomerIdentity, IdentityResolver, UserQuery};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct ApiUser {
    customer_id: String,
    email: String,
    #[serde(default)]
    display_name: Option<String>,
}

impl From<ApiUser> for CustomerIdentity {
    fn from(user: ApiUser) -> Self {
        let display_name = user.display_name.unwrap_or_else(|| user.email.clone());
        CustomerIdentity {
            customer_id: user.customer_id,
            email: user.email,
            display_name,
        }
    }
}

/// Resolves customers via `GET /users?email=` and `GET /users/{id}`
pub struct HttpIdentityResolver {
    client: reqwest::Client,
    endpoint: ServiceEndpoint,
}

impl HttpIdentityResolver {
    pub fn new(endpoint: ServiceEndpoint) -> Result<Self> {
        Ok(Self {
            client: endpoint.http_client()?,
            endpoint,
        })
    }

    async fn lookup(&self, query: &UserQuery) -> Result<CustomerIdentity> {
        let request = match query {
            UserQuery::Email(email) => {
                let url = self.endpoint.url("users");
                (self.client.get(&url).query(&[("email", email)]), url)
            }
            UserQuery::CustomerId(id) => {
                let url = self.endpoint.url(&format!("users/{}", id));
                (self.client.get(&url), url)
            }
        };

        let user: Option<ApiUser> = fetch(request.0, &request.1).await?;
        user.map(CustomerIdentity::from)
            .ok_or_else(|| ServiceError::NotFound(format!("no customer with {}", query)))
    }
}

#[async_trait]
impl IdentityResolver for HttpIdentityResolver {
    async fn resolve_user(&self, query: &UserQuery) -> perch_cloud::Result<CustomerIdentity> {
        tracing::info!("Resolving {}", query);
        Ok(self.lookup(query).await?)
    }
}
