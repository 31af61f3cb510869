//! Credential vending service client

use crate::api::{ServiceEndpoint, fetch};
use crate::error::Result;
use async_trait::async_trait;
use perch_cloud::{CredentialVendor, CustomerIdentity, ScopedCredentials};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
struct CredentialRequest<'a> {
    customer_id: &'a str,
}

/// All fields optional; the service may answer with partial material
#[derive(Debug, Default, Deserialize)]
struct ApiCredentials {
    access_key_id: Option<String>,
    secret_access_key: Option<String>,
    session_token: Option<String>,
}

impl ApiCredentials {
    fn into_scoped(self) -> Option<ScopedCredentials> {
        match (self.access_key_id, self.secret_access_key, self.session_token) {
            (Some(a), Some(s), Some(t)) if !a.is_empty() && !s.is_empty() && !t.is_empty() => {
                Some(ScopedCredentials::new(a, s, t))
            }
            _ => None,
        }
    }
}

/// Requests customer credentials via `POST /credentials`
pub struct HttpCredentialVendor {
    client: reqwest::Client,
    endpoint: ServiceEndpoint,
}

impl HttpCredentialVendor {
    pub fn new(endpoint: ServiceEndpoint) -> Result<Self> {
        Ok(Self {
            client: endpoint.http_client()?,
            endpoint,
        })
    }

    async fn request(&self, identity: &CustomerIdentity) -> Result<Option<ScopedCredentials>> {
        let url = self.endpoint.url("credentials");
        let request = self.client.post(&url).json(&CredentialRequest {
            customer_id: &identity.customer_id,
        });

        let material: Option<ApiCredentials> = fetch(request, &url).await?;
        Ok(material.and_then(ApiCredentials::into_scoped))
    }
}

#[async_trait]
impl CredentialVendor for HttpCredentialVendor {
    async fn scoped_credentials(
        &self,
        identity: &CustomerIdentity,
    ) -> perch_cloud::Result<Option<ScopedCredentials>> {
        Ok(self.request(identity).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::decode;

    #[test]
    fn test_complete_material() {
        let body = r#"{"success": true, "result":
            {"access_key_id": "ASIAEXAMPLE", "secret_access_key": "s", "session_token": "t"}}"#;
        let material: ApiCredentials = decode("u", 200, body).unwrap().unwrap();
        let creds = material.into_scoped().unwrap();
        assert_eq!(creds.access_key_id, "ASIAEXAMPLE");
    }

    #[test]
    fn test_partial_material_is_none() {
        let body = r#"{"success": true, "result": {"access_key_id": "ASIAEXAMPLE"}}"#;
        let material: ApiCredentials = decode("u", 200, body).unwrap().unwrap();
        assert!(material.into_scoped().is_none());

        let blank = ApiCredentials {
            access_key_id: Some(String::new()),
            secret_access_key: Some("s".into()),
            session_token: Some("t".into()),
        };
        assert!(blank.into_scoped().is_none());
    }

    #[test]
    fn test_request_body_shape() {
        let body = serde_json::to_string(&CredentialRequest { customer_id: "c1" }).unwrap();
        assert_eq!(body, r#"{"customer_id":"c1"}"#);
    }
}
