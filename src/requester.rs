use async_trait::async_trait;
use serde_json::Value;

/// Classification of a request as seen by the transport.
///
/// `Pending` is only ever reported before the terminal outcome; every executed request ends in
/// exactly one of the other four.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RequestResult {
    Pending,
    Timeout,
    Forbidden,
    Success,
    Failure,
}

/// Maps an HTTP status onto a `RequestResult`
pub fn status_code_to_result(status: u16) -> RequestResult {
    match status {
        401 | 403 => RequestResult::Forbidden,
        200 | 201 | 204 => RequestResult::Success,
        _ => RequestResult::Failure,
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// A request prepared by an endpoint and handed to `Requester::execute`.
///
/// Properties:
///
/// * `method`: HTTP method.
/// * `url`: Absolute URL, as produced by `Requester::full_endpoint`.
/// * `token`: Bearer token to authenticate with, if any.
/// * `headers`: Extra headers, e.g. Basic credentials for the user token endpoint.
/// * `query`: Query string pairs, appended in order.
/// * `body`: JSON body for POST requests.
#[derive(Clone, Debug, PartialEq)]
pub struct Request {
    pub method: Method,
    pub url: String,
    pub token: Option<String>,
    pub headers: Vec<(String, String)>,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl Request {
    pub fn new(method: Method, url: &str, token: Option<&str>) -> Request {
        Request {
            method,
            url: url.to_string(),
            token: token.map(str::to_string),
            headers: vec![],
            query: vec![],
            body: None,
        }
    }

    pub fn header(mut self, key: &str, value: impl Into<String>) -> Request {
        self.headers.push((key.to_string(), value.into()));
        self
    }

    pub fn query(mut self, key: &str, value: impl ToString) -> Request {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    pub fn body(mut self, body: Value) -> Request {
        self.body = Some(body);
        self
    }

    /// Value of the first query pair named `key`
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Value of the first header named `key` (case-insensitive)
    pub fn header_value(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }
}

/// Status and (JSON) body of a response that did arrive
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RawResponse {
    pub status: u16,
    pub body: Option<Value>,
}

impl RawResponse {
    pub fn new(status: u16, body: Option<Value>) -> RawResponse {
        RawResponse { status, body }
    }
}

#[async_trait]
/// The `Requester` trait is what a transport implements to carry requests for the endpoints.
///
/// Implementations only move bytes and classify the outcome; shaping request bodies and
/// interpreting response bodies is left to the endpoints.
pub trait Requester: Send + Sync {
    /// Builds the absolute URL for an endpoint path such as `/devices`
    fn full_endpoint(&self, path: &str) -> String;

    fn get_request(&self, url: &str, token: Option<&str>) -> Request {
        Request::new(Method::Get, url, token)
    }

    fn post_request(&self, url: &str, body: Option<Value>, token: Option<&str>) -> Request {
        let request = Request::new(Method::Post, url, token);
        match body {
            Some(body) => request.body(body),
            None => request,
        }
    }

    /// Issues the request and reports its terminal outcome. A `Timeout` carries no response.
    async fn perform(&self, request: Request) -> (RequestResult, Option<RawResponse>);

    /// Runs `request`, calling `callback` with `Pending` before it is issued and then exactly
    /// once more with the terminal outcome.
    async fn execute(
        &self,
        request: Request,
        callback: &mut (dyn for<'r> FnMut(RequestResult, Option<&'r RawResponse>) + Send),
    ) {
        callback(RequestResult::Pending, None);
        let (result, response) = self.perform(request).await;
        log::debug!("Request finished with {:?}", result);
        callback(result, response.as_ref());
    }
}
