//! Request layer shared by every service client.
//!
//! [`HttpTransport`] is the only place bytes leave the process; [`ApiClient`]
//! adds base headers, query encoding and rate-limit handling on top of it,
//! and [`pagination`] drives page-by-page fetch loops.

pub mod client;
pub mod pagination;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use client::{ApiClient, RequestOptions, RetryPolicy};
pub use pagination::{paginate, paginate_pages, Page, PageTermination};

use crate::error::{SourceError, SourceResult};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl HttpRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Header value, matched case-insensitively
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    pub fn json<T: DeserializeOwned>(&self) -> SourceResult<T> {
        serde_json::from_str(&self.body).map_err(|source| SourceError::Decode {
            url: self.url.clone(),
            source,
        })
    }

    pub fn error_for_status(self) -> SourceResult<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(SourceError::Status {
                url: self.url,
                status: self.status,
                body: self.body,
            })
        }
    }
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// Sends one request and hands back the raw response, whatever its status
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> SourceResult<HttpResponse>;
}

pub const USER_AGENT: &str = concat!("sync-movies/", env!("CARGO_PKG_VERSION"));

pub fn create_http_client() -> Client {
    Client::builder()
        .user_agent(USER_AGENT)
        .build()
        .unwrap_or_else(|_| Client::new())
}

pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self {
            client: create_http_client(),
        }
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> SourceResult<HttpResponse> {
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
        };

        let mut builder = self.client.request(method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let url = response.url().to_string();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response.text().await?;

        Ok(HttpResponse {
            status,
            url,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_agent_names_the_tool() {
        assert!(USER_AGENT.starts_with("sync-movies/"));
        assert!(!USER_AGENT.contains("Mozilla"));
        assert_eq!(USER_AGENT.trim_start_matches("sync-movies/"), env!("CARGO_PKG_VERSION"));
    }
}
