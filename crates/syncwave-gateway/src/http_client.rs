use async_trait::async_trait;
use syncwave_model::CanonicalContent;

use crate::client::ProviderClient;
use crate::error::ProviderError;

/// Default production [`ProviderClient`]: issues `GET {base_url}` and
/// decodes the response body as a JSON array of canonical content (the
/// wire contract spec.md §6 names for provider responses). The
/// provider-specific document and its mapping into canonical JSON happen
/// upstream of this HTTP call — that mapper is an external collaborator,
/// not this crate's concern.
pub struct JsonHttpProviderClient {
    id: String,
    url: String,
    client: reqwest::Client,
}

impl JsonHttpProviderClient {
    pub fn new(id: impl Into<String>, base_url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            id: id.into(),
            url: base_url.into(),
            client,
        }
    }
}

#[async_trait]
impl ProviderClient for JsonHttpProviderClient {
    fn provider_id(&self) -> &str {
        &self.id
    }

    async fn fetch(&self) -> Result<Vec<CanonicalContent>, ProviderError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| ProviderError::RequestFailed {
                provider: self.id.clone(),
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(ProviderError::RequestFailed {
                provider: self.id.clone(),
                message: format!("upstream returned status {}", response.status()),
            });
        }

        response
            .json::<Vec<CanonicalContent>>()
            .await
            .map_err(|e| ProviderError::RequestFailed {
                provider: self.id.clone(),
                message: format!("malformed canonical content payload: {e}"),
            })
    }
}
