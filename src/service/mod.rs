//! Thin client for the project bookkeeping REST service.

use std::time::Duration;

use log::debug;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Method;
use serde::Serialize;
use serde_json::Value;

use crate::config::ServerConfig;
use crate::error::ServiceError;

pub mod pdks;
pub mod projects;
pub mod tools;

pub use pdks::{PdkService, PdkSpec, PdkUpdate};
pub use projects::ProjectService;
pub use tools::{EdaToolService, ToolSpec, ToolUpdate};

pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct ServiceClient {
    base_url: String,
    api_key: Option<String>,
    client: Client,
}

impl ServiceClient {
    pub fn new(base_url: &str, api_key: Option<String>) -> Result<Self, ServiceError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.is_empty()),
            client,
        })
    }

    pub fn from_server(server: &ServerConfig) -> Result<Self, ServiceError> {
        if !server.is_configured() {
            return Err(ServiceError::MissingServer);
        }
        Self::new(server.url.trim(), server.api_key.clone())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if let Some(key) = &self.api_key {
            if let Ok(value) = HeaderValue::from_str(&format!("Bearer {key}")) {
                headers.insert(AUTHORIZATION, value);
            }
        }
        headers
    }

    /// Issues a request against `endpoint`, returning the decoded JSON body.
    ///
    /// For `GET`, the fields of `body` are sent as query parameters. `DELETE`
    /// carries no body. An empty response decodes as `{}`.
    pub fn request<B: Serialize + ?Sized>(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&B>,
    ) -> Result<Value, ServiceError> {
        let url = format!("{}{}", self.base_url, endpoint);
        debug!("{method} {url}");

        let mut request = self
            .client
            .request(method.clone(), &url)
            .headers(self.headers());
        if let Some(body) = body {
            if method == Method::GET {
                request = request.query(&query_pairs(&serde_json::to_value(body)?));
            } else if method != Method::DELETE {
                request = request.json(body);
            }
        }

        let response = request.send()?;
        let status = response.status();
        let text = response.text()?;
        if !status.is_success() {
            return Err(ServiceError::Status { status, body: text });
        }
        if text.trim().is_empty() {
            return Ok(Value::Object(Default::default()));
        }
        Ok(serde_json::from_str(&text)?)
    }

    pub fn get(&self, endpoint: &str) -> Result<Value, ServiceError> {
        self.request::<Value>(Method::GET, endpoint, None)
    }

    pub fn post<B: Serialize + ?Sized>(&self, endpoint: &str, body: &B) -> Result<Value, ServiceError> {
        self.request(Method::POST, endpoint, Some(body))
    }

    pub fn put<B: Serialize + ?Sized>(&self, endpoint: &str, body: &B) -> Result<Value, ServiceError> {
        self.request(Method::PUT, endpoint, Some(body))
    }

    pub fn delete(&self, endpoint: &str) -> Result<Value, ServiceError> {
        self.request::<Value>(Method::DELETE, endpoint, None)
    }
}

fn query_pairs(value: &Value) -> Vec<(String, String)> {
    let Value::Object(map) = value else {
        return Vec::new();
    };
    map.iter()
        .filter(|(_, v)| !v.is_null())
        .map(|(k, v)| {
            let v = match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (k.clone(), v)
        })
        .collect()
}

/// Pulls the named array out of a list response.
pub(crate) fn list_field(response: Value, field: &str) -> Vec<Value> {
    match response {
        Value::Object(mut map) => match map.remove(field) {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}
