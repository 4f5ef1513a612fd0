//! In-memory transport for tests.

use crate::error::SourceResult;
use crate::http::{HttpRequest, HttpResponse, HttpTransport};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Mutex;

type Handler = Box<dyn Fn(&HttpRequest) -> HttpResponse + Send + Sync>;

/// Answers requests from a handler and records everything it was sent
pub struct ScriptedTransport {
    handler: Handler,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&HttpRequest) -> HttpResponse + Send + Sync + 'static,
    {
        Self {
            handler: Box::new(handler),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Replies with `responses` in order, then with 404s
    pub fn sequence(responses: Vec<HttpResponse>) -> Self {
        let queue = Mutex::new(VecDeque::from(responses));
        Self::new(move |_| {
            queue
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .pop_front()
                .unwrap_or_else(|| HttpResponse::with_status(404))
        })
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Requests whose URL contains `fragment`
    pub fn requests_to(&self, fragment: &str) -> Vec<HttpRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.url.contains(fragment))
            .collect()
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn send(&self, request: HttpRequest) -> SourceResult<HttpResponse> {
        let mut response = (self.handler)(&request);
        if response.url.is_empty() {
            response.url = request.url.clone();
        }
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request);
        Ok(response)
    }
}

impl HttpResponse {
    pub fn with_status(status: u16) -> Self {
        Self {
            status,
            url: String::new(),
            headers: Vec::new(),
            body: String::new(),
        }
    }

    pub fn ok_json(body: Value) -> Self {
        Self::with_status(200).with_json(body)
    }

    pub fn with_json(mut self, body: Value) -> Self {
        self.body = body.to_string();
        self
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }
}
