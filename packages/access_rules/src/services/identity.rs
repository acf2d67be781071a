use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use super::IdentityLookup;
use crate::config::{AccessRulesConfig, ConfigError};
use crate::error::ServiceError;

const INFO_PATH: &str = "_matrix/identity/api/v1/info";

/// Identity server client resolving third-party identifiers through `/_matrix/identity/api/v1/info`
pub struct HttpIdentityLookup {
    client: Client,
    base_url: Url,
}

impl HttpIdentityLookup {
    pub fn new(base_url: Url) -> Result<Self, ServiceError> {
        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self { client, base_url })
    }

    pub fn from_config(config: &AccessRulesConfig) -> Result<Self, ConfigError> {
        let base_url = config.identity_base_url()?;
        Self::new(base_url).map_err(|e| ConfigError::InvalidFormat(format!("identity client: {}", e)))
    }

    fn info_url(&self, medium: &str, address: &str) -> Result<Url, ServiceError> {
        let mut url = self
            .base_url
            .join(INFO_PATH)
            .map_err(|e| ServiceError::InvalidResponse(format!("identity server URL: {}", e)))?;
        url.query_pairs_mut().append_pair("medium", medium).append_pair("address", address);
        Ok(url)
    }
}

#[async_trait]
impl IdentityLookup for HttpIdentityLookup {
    async fn homeserver_for(&self, medium: &str, address: &str) -> Result<Option<String>, ServiceError> {
        let url = self.info_url(medium, address)?;
        debug!("Looking up homeserver for {} third-party identifier at {}", medium, self.base_url);

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            warn!("Identity server {} answered {} to an info lookup", self.base_url, status);
            return Err(ServiceError::Unavailable(format!("identity server returned {}", status)));
        }

        let info: Value = response.json().await?;
        Ok(info
            .get("hs")
            .and_then(Value::as_str)
            .filter(|hs| !hs.is_empty())
            .map(str::to_string))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn info_url_carries_medium_and_address() {
        let lookup = HttpIdentityLookup::new(Url::parse("https://vector.im").expect("url"))
            .expect("client");
        let url = lookup.info_url("email", "alice+tag@example.com").expect("info url");
        assert_eq!(
            url.as_str(),
            "https://vector.im/_matrix/identity/api/v1/info?medium=email&address=alice%2Btag%40example.com"
        );
    }
}
