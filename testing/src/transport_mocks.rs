//! In-memory gateway collaborators
//!
//! - [`ScriptedTransport`]: canned responses per `(method, path)` route
//! - [`RecordingRedirect`]: counts login redirects

#![allow(clippy::missing_panics_doc)] // Test utilities document panics where critical

use backstage_gateway::{LoginRedirect, Method, PreparedRequest, RawResponse, Transport, TransportError};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

#[derive(Debug, Clone)]
enum Reply {
    Respond(RawResponse),
    Fail(String),
}

#[derive(Debug, Clone)]
struct Step {
    reply: Reply,
    delay: Option<Duration>,
}

#[derive(Debug, Default)]
struct Script {
    routes: HashMap<(Method, String), VecDeque<Step>>,
    requests: Vec<PreparedRequest>,
}

/// Transport answering from a script instead of the network.
///
/// Replies are queued per `(method, path)`; the query string is not part of
/// the route. Queued replies are consumed in order and the last one keeps
/// answering. Unscripted routes answer `404`.
///
/// Clones share the same script, so a test can keep one handle for
/// assertions after moving another into a gateway.
///
/// # Example
///
/// ```
/// use backstage_gateway::{Method, Transport, PreparedRequest, Request};
/// use backstage_testing::ScriptedTransport;
/// use serde_json::json;
///
/// # async fn example() {
/// let transport = ScriptedTransport::new()
///     .on(Method::Get, "/api/concert", 200, json!({"data": []}));
///
/// let request = PreparedRequest { request: Request::get("/api/concert"), bearer: None };
/// let response = transport.execute(request).await.unwrap();
/// assert_eq!(response.status, 200);
/// assert_eq!(transport.request_count(), 1);
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct ScriptedTransport {
    script: Arc<Mutex<Script>>,
}

impl ScriptedTransport {
    /// Transport with nothing scripted
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push(self, method: Method, path: &str, step: Step) -> Self {
        self.lock()
            .routes
            .entry((method, path.to_string()))
            .or_default()
            .push_back(step);
        self
    }

    /// Queue a JSON reply
    #[must_use]
    pub fn on(self, method: Method, path: &str, status: u16, body: Value) -> Self {
        let reply = Reply::Respond(RawResponse::json(status, &body));
        self.push(method, path, Step { reply, delay: None })
    }

    /// Queue a JSON reply delivered after `delay`
    #[must_use]
    pub fn on_after(self, method: Method, path: &str, delay: Duration, status: u16, body: Value) -> Self {
        let reply = Reply::Respond(RawResponse::json(status, &body));
        self.push(method, path, Step { reply, delay: Some(delay) })
    }

    /// Queue a reply with a raw body
    #[must_use]
    pub fn on_raw(self, method: Method, path: &str, status: u16, body: impl Into<Vec<u8>>) -> Self {
        let reply = Reply::Respond(RawResponse { status, body: body.into() });
        self.push(method, path, Step { reply, delay: None })
    }

    /// Queue a transport failure (no response at all)
    #[must_use]
    pub fn fail(self, method: Method, path: &str, message: &str) -> Self {
        let reply = Reply::Fail(message.to_string());
        self.push(method, path, Step { reply, delay: None })
    }

    /// Every request executed so far, in order
    #[must_use]
    pub fn requests(&self) -> Vec<PreparedRequest> {
        self.lock().requests.clone()
    }

    /// Number of requests executed so far
    #[must_use]
    pub fn request_count(&self) -> usize {
        self.lock().requests.len()
    }

    /// Requests executed against one route
    #[must_use]
    pub fn requests_to(&self, method: Method, path: &str) -> Vec<PreparedRequest> {
        self.lock()
            .requests
            .iter()
            .filter(|r| r.request.method == method && r.request.path == path)
            .cloned()
            .collect()
    }

    fn next_step(&self, request: PreparedRequest) -> Option<Step> {
        let mut script = self.lock();
        let key = (request.request.method, request.request.path.clone());
        script.requests.push(request);

        let queue = script.routes.get_mut(&key)?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

impl Transport for ScriptedTransport {
    async fn execute(&self, request: PreparedRequest) -> Result<RawResponse, TransportError> {
        let Some(step) = self.next_step(request) else {
            return Ok(RawResponse::json(404, &serde_json::json!({"message": "Not Found"})));
        };

        if let Some(delay) = step.delay {
            tokio::time::sleep(delay).await;
        }

        match step.reply {
            Reply::Respond(response) => Ok(response),
            Reply::Fail(message) => Err(TransportError(message)),
        }
    }
}

/// Redirect hook that counts how often it fired
#[derive(Debug, Default)]
pub struct RecordingRedirect {
    fired: AtomicUsize,
}

impl RecordingRedirect {
    /// Number of redirects so far
    #[must_use]
    pub fn count(&self) -> usize {
        self.fired.load(Ordering::SeqCst)
    }

    /// Whether a redirect happened at all
    #[must_use]
    pub fn fired(&self) -> bool {
        self.count() > 0
    }
}

impl LoginRedirect for RecordingRedirect {
    fn redirect_to_login(&self) {
        self.fired.fetch_add(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use backstage_gateway::Request;
    use serde_json::json;

    fn prepared(request: Request) -> PreparedRequest {
        PreparedRequest { request, bearer: None }
    }

    #[tokio::test]
    async fn replies_in_order_then_sticks_to_the_last() {
        let transport = ScriptedTransport::new()
            .on(Method::Get, "/a", 200, json!(1))
            .on(Method::Get, "/a", 500, json!(2));

        let statuses = [
            transport.execute(prepared(Request::get("/a"))).await.unwrap().status,
            transport.execute(prepared(Request::get("/a"))).await.unwrap().status,
            transport.execute(prepared(Request::get("/a"))).await.unwrap().status,
        ];
        assert_eq!(statuses, [200, 500, 500]);
    }

    #[tokio::test]
    async fn query_string_is_not_part_of_the_route() {
        let transport = ScriptedTransport::new().on(Method::Get, "/a", 200, json!([]));
        let response = transport
            .execute(prepared(Request::get("/a").query("page", 2)))
            .await
            .unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(transport.requests()[0].request.query, vec![("page".to_string(), "2".to_string())]);
    }

    #[tokio::test]
    async fn unscripted_route_is_not_found() {
        let transport = ScriptedTransport::new();
        let response = transport.execute(prepared(Request::delete("/x"))).await.unwrap();
        assert_eq!(response.status, 404);
    }

    #[tokio::test]
    async fn scripted_failure_is_a_transport_error() {
        let transport = ScriptedTransport::new().fail(Method::Post, "/login", "connection refused");
        let result = transport.execute(prepared(Request::post("/login"))).await;
        assert_eq!(result.unwrap_err().0, "connection refused");
    }

    #[test]
    fn redirect_counts() {
        let redirect = RecordingRedirect::default();
        assert!(!redirect.fired());
        redirect.redirect_to_login();
        redirect.redirect_to_login();
        assert_eq!(redirect.count(), 2);
    }
}
