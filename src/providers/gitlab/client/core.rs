use std::time::Duration;

use log::debug;
use reqwest::Client;
use serde::de::DeserializeOwned;
use url::Url;

use crate::auth::Token;
use crate::error::{CIMinutesError, Result};

pub struct GitLabClient {
    client: Client,
    api_url: Url,
    token: Option<Token>,
}

impl GitLabClient {
    pub fn new(base_url: &str, token: Option<Token>, timeout: Option<Duration>) -> Result<Self> {
        let mut builder = Client::builder().user_agent(concat!(
            "CIMinutes/",
            env!("CARGO_PKG_VERSION")
        ));
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        let client = builder
            .build()
            .map_err(|e| CIMinutesError::Config(format!("Failed to create HTTP client: {e}")))?;

        // Keep any path prefix of self-hosted instances, e.g. https://host/gitlab
        let api_url = Url::parse(&format!("{}/", base_url.trim_end_matches('/')))
            .map_err(|e| CIMinutesError::Config(format!("Invalid base URL: {e}")))?
            .join("api/v4/")
            .map_err(|e| CIMinutesError::Config(format!("Invalid API base URL: {e}")))?;

        Ok(Self {
            client,
            api_url,
            token,
        })
    }

    /// Helper to build authenticated requests
    fn auth_request(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if let Some(token) = &self.token {
            request.header(Token::HEADER, token.as_str())
        } else {
            request
        }
    }

    /// Issue a single authenticated GET against a path relative to `api/v4/`.
    ///
    /// Non-2xx responses become [`CIMinutesError::Api`] carrying status and
    /// body. Bodies that do not match `T` become [`CIMinutesError::Json`].
    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let url = self
            .api_url
            .join(path)
            .map_err(|e| CIMinutesError::Config(format!("Invalid API path '{path}': {e}")))?;

        debug!("GET {url} {query:?}");

        let request = self.auth_request(self.client.get(url).query(query));
        let response = request.send().await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(CIMinutesError::Api {
                path: path.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        Ok(serde_json::from_str(&body)?)
    }
}
