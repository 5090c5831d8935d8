//! Scripted in-memory transport for tests
//!
//! Routes are matched on the request path (or the full URL when the route key
//! contains `://`). Unrouted requests get the fallback status, 404 by default.

use crate::client::{HttpResponse, ProbeRequest, Transport};
use async_trait::async_trait;
use reqwest::Method;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use webprobe_core::ProbeError;

/// Canned response returned by a route
#[derive(Debug, Clone)]
pub struct ScriptedResponse {
    status: u16,
    headers: Vec<(String, String)>,
    body: String,
}

impl ScriptedResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: String::new(),
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }
}

#[derive(Debug)]
enum Outcome {
    Respond(ScriptedResponse),
    Fail(ProbeError),
}

#[derive(Debug)]
struct Route {
    method: Option<Method>,
    key: String,
    outcome: Outcome,
}

impl Route {
    fn matches(&self, request: &ProbeRequest) -> bool {
        let path_matches = if self.key.contains("://") {
            request.url.as_str() == self.key
        } else {
            request.url.path() == self.key
        };
        path_matches && self.method.as_ref().map_or(true, |m| *m == request.method)
    }
}

/// Transport answering from a fixed route table
#[derive(Debug)]
pub struct ScriptedTransport {
    routes: Vec<Route>,
    fallback: u16,
    latency: Duration,
    count: AtomicUsize,
    log: Mutex<Vec<String>>,
}

impl Default for ScriptedTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self {
            routes: Vec::new(),
            fallback: 404,
            latency: Duration::ZERO,
            count: AtomicUsize::new(0),
            log: Mutex::new(Vec::new()),
        }
    }

    /// Answer any method on `path` with `status` and `body`
    pub fn route(self, path: &str, status: u16, body: &str) -> Self {
        self.respond(path, ScriptedResponse::new(status).body(body))
    }

    /// Answer any method on `path` with a full response
    pub fn respond(mut self, path: &str, response: ScriptedResponse) -> Self {
        self.routes.push(Route {
            method: None,
            key: path.to_string(),
            outcome: Outcome::Respond(response),
        });
        self
    }

    /// Answer one method on `path`; takes precedence over method-less routes.
    ///
    /// Panics if `method` is not a valid HTTP method token.
    pub fn respond_to(mut self, method: &str, path: &str, response: ScriptedResponse) -> Self {
        let method = Method::from_bytes(method.as_bytes())
            .unwrap_or_else(|_| panic!("invalid HTTP method '{}' in scripted route", method));
        self.routes.insert(
            0,
            Route {
                method: Some(method),
                key: path.to_string(),
                outcome: Outcome::Respond(response),
            },
        );
        self
    }

    /// Fail every request to `path`
    pub fn fail(mut self, path: &str, error: ProbeError) -> Self {
        self.routes.push(Route {
            method: None,
            key: path.to_string(),
            outcome: Outcome::Fail(error),
        });
        self
    }

    /// Status returned for unrouted requests
    pub fn fallback(mut self, status: u16) -> Self {
        self.fallback = status;
        self
    }

    /// Delay every response
    pub fn latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn request_count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    /// `"METHOD url"` for every request received, in arrival order
    pub fn requests(&self) -> Vec<String> {
        self.log.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: ProbeRequest) -> Result<HttpResponse, ProbeError> {
        self.count.fetch_add(1, Ordering::SeqCst);
        self.log
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(format!("{} {}", request.method, request.url));

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let final_url = request.url.to_string();
        let response = match self.routes.iter().find(|r| r.matches(&request)) {
            Some(Route {
                outcome: Outcome::Fail(e),
                ..
            }) => return Err(e.clone()),
            Some(Route {
                outcome: Outcome::Respond(r),
                ..
            }) => r.clone(),
            None => ScriptedResponse::new(self.fallback),
        };

        Ok(HttpResponse {
            status: response.status,
            headers: response.headers,
            body: response.body,
            final_url,
            response_time_ms: self.latency.as_millis() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn get(url: &str) -> ProbeRequest {
        ProbeRequest::new(Method::GET, Url::parse(url).unwrap())
    }

    #[tokio::test]
    async fn test_routes_and_fallback() {
        let transport = ScriptedTransport::new()
            .route("/a", 200, "A")
            .respond_to("TRACE", "/a", ScriptedResponse::new(405))
            .respond("https://h.test/", ScriptedResponse::new(301).header("Location", "http://h.test/"));

        assert_eq!(transport.send(get("http://h.test/a")).await.unwrap().body, "A");
        let trace = ProbeRequest::new(Method::TRACE, Url::parse("http://h.test/a").unwrap());
        assert_eq!(transport.send(trace).await.unwrap().status, 405);
        assert_eq!(transport.send(get("https://h.test/")).await.unwrap().status, 301);
        assert_eq!(transport.send(get("http://h.test/")).await.unwrap().status, 404);

        assert_eq!(transport.request_count(), 4);
        assert_eq!(transport.requests()[1], "TRACE http://h.test/a");
    }

    #[test]
    #[should_panic(expected = "invalid HTTP method")]
    fn test_invalid_method_panics() {
        let _ = ScriptedTransport::new().respond_to("GE T", "/a", ScriptedResponse::new(200));
    }
}
