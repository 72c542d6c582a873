use async_trait::async_trait;
use ocsmetrics_core::RunConfig;
use ocsmetrics_types::{FetchErrorKind, Page, ResourceKind};
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::Value;
use std::time::Duration;

use super::{PageRequest, Transport, parse_page};
use crate::{Result, RunError};

const USER_AGENT: &str = concat!("ocsmetrics/", env!("CARGO_PKG_VERSION"));

/// OpenChatStudio REST transport
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(config: &RunConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(
            "X-API-KEY",
            HeaderValue::from_str(config.api_key.trim())
                .map_err(|_| RunError::Config("API key contains invalid characters".into()))?,
        );
        if let Some(project) = &config.project_id {
            headers.insert(
                "X-Project-ID",
                HeaderValue::from_str(project.trim())
                    .map_err(|_| RunError::Config("project id contains invalid characters".into()))?,
            );
        }

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(Duration::from_secs(config.fetch.request_timeout_secs))
            .build()
            .map_err(|err| RunError::Config(format!("failed to build HTTP client: {err}")))?;

        Ok(Self {
            client,
            base_url: config.api_base().to_string(),
        })
    }

    fn build_request(&self, request: &PageRequest) -> std::result::Result<RequestBuilder, FetchErrorKind> {
        // A cursor that is a full link is followed verbatim
        if let Some(cursor) = &request.cursor
            && (cursor.as_str().starts_with("http://") || cursor.as_str().starts_with("https://"))
        {
            return Ok(self.client.get(cursor.as_str()));
        }

        let builder = match request.resource {
            ResourceKind::Sessions => self
                .client
                .get(format!("{}/sessions/", self.base_url))
                .query(&[("page_size", request.page_size.to_string())]),
            ResourceKind::Versions => self
                .client
                .get(format!("{}/experiments/", self.base_url))
                .query(&[("page_size", request.page_size.to_string())]),
            ResourceKind::Messages => {
                let session = request.session.as_ref().ok_or_else(|| {
                    FetchErrorKind::Client(StatusCode::BAD_REQUEST.as_u16())
                })?;
                self.client
                    .get(format!("{}/sessions/{}/", self.base_url, session))
            }
        };

        Ok(match &request.cursor {
            Some(cursor) => builder.query(&[("cursor", cursor.as_str())]),
            None => builder,
        })
    }
}

fn map_transport_error(err: reqwest::Error) -> FetchErrorKind {
    if err.is_timeout() {
        FetchErrorKind::Timeout
    } else if err.is_decode() {
        FetchErrorKind::Decode(err.to_string())
    } else {
        FetchErrorKind::Connect(err.to_string())
    }
}

fn parse_retry_after(header: &HeaderValue) -> Option<u64> {
    header.to_str().ok()?.trim().parse::<u64>().ok()
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch_page(
        &self,
        request: &PageRequest,
    ) -> std::result::Result<Page<Value>, FetchErrorKind> {
        let response = self
            .build_request(request)?
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(parse_retry_after);
            tracing::debug!(
                resource = %request.resource,
                status = status.as_u16(),
                "upstream returned an error status"
            );
            return Err(FetchErrorKind::from_status(status.as_u16(), retry_after));
        }

        let body: Value = response.json().await.map_err(map_transport_error)?;
        parse_page(request.resource, body)
    }
}
