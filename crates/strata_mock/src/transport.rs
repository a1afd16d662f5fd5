use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use strata_http::{ApiRequest, ApiResponse, Method, Result, StatusCode, Transport};

struct Route {
    method: Method,
    path: String,
    responses: VecDeque<ApiResponse>,
}

#[derive(Default)]
struct MockState {
    routes: Vec<Route>,
    requests: Vec<ApiRequest>,
}

/// Scripted transport that records every request it receives.
///
/// Routes match on method and URL path. Each route replays its queued
/// responses in order and then keeps repeating the last one. Unmatched
/// requests get a 404.
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(&self, method: Method, path: &str, response: ApiResponse) -> &Self {
        let mut state = self.lock();
        match state
            .routes
            .iter_mut()
            .find(|r| r.method == method && r.path == path)
        {
            Some(route) => route.responses.push_back(response),
            None => state.routes.push(Route {
                method,
                path: path.to_string(),
                responses: VecDeque::from([response]),
            }),
        }
        self
    }

    pub fn on_json<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        status: u16,
        body: &B,
    ) -> &Self {
        let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        self.on(method, path, ApiResponse::new(status).with_json(body))
    }

    pub fn on_status(&self, method: Method, path: &str, status: u16) -> &Self {
        let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        self.on(method, path, ApiResponse::new(status))
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.lock().requests.clone()
    }

    /// Requests other than GET/HEAD.
    pub fn mutating_calls(&self) -> Vec<ApiRequest> {
        self.lock()
            .requests
            .iter()
            .filter(|r| r.is_mutating())
            .cloned()
            .collect()
    }

    pub fn calls_to(&self, method: Method, path: &str) -> usize {
        self.lock()
            .requests
            .iter()
            .filter(|r| r.method == method && path_of(&r.url) == path)
            .count()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn path_of(url: &str) -> String {
    let without_scheme = url.split_once("://").map(|(_, rest)| rest).unwrap_or(url);
    let path = without_scheme
        .find('/')
        .map(|idx| &without_scheme[idx..])
        .unwrap_or("/");
    path.split(['?', '#']).next().unwrap_or(path).to_string()
}

impl Transport for MockTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
        let mut state = self.lock();
        let path = path_of(&request.url);
        let method = request.method.clone();
        state.requests.push(request);

        let response = state
            .routes
            .iter_mut()
            .find(|r| r.method == method && r.path == path)
            .and_then(|route| {
                if route.responses.len() > 1 {
                    route.responses.pop_front()
                } else {
                    route.responses.front().cloned()
                }
            });

        Ok(response.unwrap_or_else(|| {
            ApiResponse::new(StatusCode::NOT_FOUND).with_json(&serde_json::json!({
                "errorCode": "E0000007",
                "errorSummary": format!("Not found: {path}"),
            }))
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn replays_queue_then_repeats_last() {
        let mock = MockTransport::new();
        mock.on_status(Method::GET, "/a", 429)
            .on_status(Method::GET, "/a", 200);

        let statuses: Vec<u16> = {
            let mut out = Vec::new();
            for _ in 0..3 {
                let response = mock.send(ApiRequest::get("https://x/a?q=1")).await.unwrap();
                out.push(response.status.as_u16());
            }
            out
        };

        assert_eq!(statuses, vec![429, 200, 200]);
        assert_eq!(mock.calls_to(Method::GET, "/a"), 3);
        assert!(mock.mutating_calls().is_empty());
    }

    #[tokio::test]
    async fn unmatched_requests_get_not_found() {
        let mock = MockTransport::new();
        let response = mock.send(ApiRequest::put("https://x/b")).await.unwrap();
        assert_eq!(response.status, StatusCode::NOT_FOUND);
        assert_eq!(mock.mutating_calls().len(), 1);
    }
}
