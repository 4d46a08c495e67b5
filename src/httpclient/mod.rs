use crate::api::{ClientError, ConnectionSettings};
use crate::requester::{status_code_to_result, Method, RawResponse, Request, RequestResult, Requester};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client as ReqwestClient, RequestBuilder, Response};
use serde_json::Value;
use std::sync::Arc;

const JSON_CONTENT_TYPE: &str = "application/json";

/// The `HttpRequester` carries endpoint requests over HTTP(S) with reqwest.
///
/// Properties:
///
/// * `settings`: The `settings` property holds the shared `ConnectionSettings`. The base URL is
/// prepended to every endpoint path and the timeout bounds every single request. Several
/// requesters (and so several clients) can share one settings object.
/// * `client`: `client` is the `ReqwestClient` used to issue requests. It keeps its own
/// connection pool, so cloning the requester is cheap and shares that pool.
#[derive(Clone)]
pub struct HttpRequester {
    settings: Arc<ConnectionSettings>,
    client: ReqwestClient,
}

impl HttpRequester {
    pub fn new(settings: Arc<ConnectionSettings>) -> Result<HttpRequester, ClientError> {
        url::Url::parse(&settings.base_url)?;
        let client = ReqwestClient::builder()
            .user_agent(settings.user_agent.as_str())
            .build()?;

        Ok(HttpRequester { settings, client })
    }

    pub fn settings(&self) -> &ConnectionSettings {
        &self.settings
    }

    /// Translates a `Request` into a reqwest builder: query pairs, bearer token, extra headers
    /// and a JSON body for POSTs.
    fn prepare(&self, request: Request) -> Result<RequestBuilder, ClientError> {
        let mut address = url::Url::parse(&request.url)?;
        if !request.query.is_empty() {
            let mut pairs = address.query_pairs_mut();
            for (key, value) in &request.query {
                pairs.append_pair(key, value);
            }
        }

        let mut builder = match request.method {
            Method::Get => self.client.get(address),
            Method::Post => {
                let builder = self
                    .client
                    .post(address)
                    .header(ACCEPT, JSON_CONTENT_TYPE)
                    .header(CONTENT_TYPE, JSON_CONTENT_TYPE);
                match &request.body {
                    Some(body) => builder.body(serde_json::to_vec(body)?),
                    None => builder,
                }
            }
        };

        if let Some(token) = &request.token {
            builder = builder.bearer_auth(token);
        }
        for (key, value) in &request.headers {
            builder = builder.header(key.as_str(), value.as_str());
        }

        Ok(builder.timeout(self.settings.timeout))
    }

    async fn read_body(response: Response) -> Option<Value> {
        let bytes = match response.bytes().await {
            Ok(bytes) => bytes,
            Err(e) => {
                log::warn!("Failed to read response body: {}", e);
                return None;
            }
        };
        if bytes.is_empty() {
            return None;
        }
        match serde_json::from_slice::<Value>(&bytes) {
            Ok(body) => Some(body),
            Err(e) => {
                log::debug!("Response body is not JSON: {}", e);
                None
            }
        }
    }
}

#[async_trait]
impl Requester for HttpRequester {
    fn full_endpoint(&self, path: &str) -> String {
        format!("{}{}", self.settings.base_url.trim_end_matches('/'), path)
    }

    async fn perform(&self, request: Request) -> (RequestResult, Option<RawResponse>) {
        let method = request.method;
        let url = request.url.clone();
        let builder = match self.prepare(request) {
            Ok(builder) => builder,
            Err(e) => {
                log::warn!("Unable to prepare request for {}: {}", url, e);
                return (RequestResult::Failure, None);
            }
        };

        log::debug!("Sending {:?} to [{}]", method, url);
        match builder.send().await {
            Ok(response) => {
                let status = response.status().as_u16();
                let result = status_code_to_result(status);
                if result == RequestResult::Success {
                    log::debug!("Request successful");
                } else {
                    log::warn!("Request failure [{}]: {}", url, status);
                }
                let body = HttpRequester::read_body(response).await;
                (result, Some(RawResponse { status, body }))
            }
            Err(e) => {
                // Without a response there is nothing to classify; report it as a timeout
                if e.is_timeout() {
                    log::warn!("Request to [{}] timed out", url);
                } else {
                    log::warn!("Request send failure [{}]: {}", url, e);
                }
                (RequestResult::Timeout, None)
            }
        }
    }
}
