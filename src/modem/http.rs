use super::dispatch::{HTTP_ACTION_TAG, HTTP_READ_TAG};
use super::session::Session;
use super::setup::BEARER_PROFILE;
use super::{Shared, guard};
use crate::error::{ModemError, ModemResult};
use std::collections::{HashMap, VecDeque};
use tracing::{debug, info, warn};
use uuid::Uuid;

const HTTP_READ_COMMAND: &str = "AT+HTTPREAD";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

impl HttpMethod {
    // Action code for `AT+HTTPACTION`.
    pub fn code(self) -> u8 {
        match self {
            HttpMethod::Get => 0,
            HttpMethod::Post => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    Queued,
    InFlight,
    AwaitingData,
    Complete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub token: Uuid,
    pub url: String,
    pub method: HttpMethod,
    pub state: RequestState,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResult {
    pub cid: u8,
    pub http_status: u16,
    /// Body length announced by `+HTTPACTION`.
    pub data_size: usize,
    /// Body text; only fetched for `200` responses with a non-empty body.
    pub data: Option<String>,
}

impl HttpResult {
    fn needs_payload(&self) -> bool {
        self.data_size > 0 && self.http_status == 200
    }

    fn is_complete(&self) -> bool {
        self.data.is_some() || !self.needs_payload()
    }
}

// Request bookkeeping shared between callers and the session loop.
#[derive(Debug, Default)]
pub(crate) struct HttpBook {
    pending: VecDeque<HttpRequest>,
    results: HashMap<Uuid, Option<HttpResult>>,
    cache: HashMap<Uuid, HttpRequest>,
}

impl HttpBook {
    pub(crate) fn register(&mut self, method: HttpMethod, url: &str) -> Uuid {
        let token = Uuid::new_v4();
        let request = HttpRequest {
            token,
            url: url.to_string(),
            method,
            state: RequestState::Queued,
        };
        self.results.insert(token, None);
        self.cache.insert(token, request.clone());
        self.pending.push_back(request);
        token
    }

    // Hand a finished result to its caller and forget the request.
    pub(crate) fn collect(&mut self, token: Uuid) -> Option<HttpResult> {
        let done = matches!(self.results.get(&token), Some(Some(result)) if result.is_complete());
        if !done {
            return None;
        }
        self.cache.remove(&token);
        self.results.remove(&token).flatten()
    }

    pub(crate) fn abandon(&mut self, token: Uuid) {
        self.results.remove(&token);
        self.cache.remove(&token);
        self.pending.retain(|request| request.token != token);
    }

    pub(crate) fn next_request(&mut self) -> Option<HttpRequest> {
        let mut request = self.pending.pop_front()?;
        request.state = RequestState::InFlight;
        self.set_state(request.token, RequestState::InFlight);
        Some(request)
    }

    // Put an interrupted request back at the head of the queue, clearing any
    // partial result it had gathered.
    pub(crate) fn requeue(&mut self, token: Uuid) -> bool {
        let Some(request) = self.cache.get_mut(&token) else {
            return false;
        };
        request.state = RequestState::Queued;
        self.pending.push_front(request.clone());
        if let Some(slot) = self.results.get_mut(&token) {
            *slot = None;
        }
        true
    }

    pub(crate) fn set_state(&mut self, token: Uuid, state: RequestState) {
        if let Some(request) = self.cache.get_mut(&token) {
            request.state = state;
        }
    }

    #[cfg(test)]
    pub(crate) fn state(&self, token: Uuid) -> Option<RequestState> {
        self.cache.get(&token).map(|request| request.state)
    }

    fn store_result(&mut self, token: Uuid, result: HttpResult) -> bool {
        match self.results.get_mut(&token) {
            Some(slot) => {
                *slot = Some(result);
                true
            }
            None => false,
        }
    }

    fn attach_payload(&mut self, token: Uuid, data: String) -> bool {
        match self.results.get_mut(&token) {
            Some(Some(result)) => {
                result.data = Some(data);
                true
            }
            _ => false,
        }
    }

    #[cfg(test)]
    pub(crate) fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

// AT sequence for one request: drop any stale HTTP service, start a fresh
// one on the bearer profile, then fire the action.
pub(crate) fn request_commands(request: &HttpRequest) -> Vec<String> {
    vec![
        "AT+HTTPTERM".to_string(),
        "AT+HTTPINIT".to_string(),
        format!("AT+HTTPPARA=\"URL\",\"{}\"", request.url),
        format!("AT+HTTPPARA=\"CID\",{BEARER_PROFILE}"),
        format!("AT+HTTPACTION={}", request.method.code()),
    ]
}

// Parse the `<cid>,<status>,<size>` payload of `+HTTPACTION`.
pub(crate) fn parse_http_action(payload: &str) -> ModemResult<HttpResult> {
    let malformed = || ModemError::MalformedReply(format!("{HTTP_ACTION_TAG}: {payload}"));
    let mut parts = payload.split(',').map(str::trim);
    let cid = parts.next().and_then(|v| v.parse().ok()).ok_or_else(malformed)?;
    let http_status = parts.next().and_then(|v| v.parse().ok()).ok_or_else(malformed)?;
    let data_size = parts.next().and_then(|v| v.parse().ok()).ok_or_else(malformed)?;
    Ok(HttpResult {
        cid,
        http_status,
        data_size,
        data: None,
    })
}

impl Shared {
    // Queue an HTTP request and block until its result is complete.
    pub(crate) fn submit(&self, method: HttpMethod, url: &str) -> ModemResult<HttpResult> {
        self.start_network_if_needed()?;

        let token = guard(&self.http).register(method, url);
        info!(%token, url, ?method, "queued HTTP request");

        self.wait_for(
            "HTTP result",
            || guard(&self.http).collect(token),
            || guard(&self.http).abandon(token),
        )
    }
}

impl Session {
    // Start the next queued request when the pipeline is idle.
    pub(crate) fn drive_next(&mut self) {
        if self.current_request.is_some() {
            return;
        }
        let Some(request) = guard(&self.shared.http).next_request() else {
            return;
        };

        info!(token = %request.token, url = %request.url, "starting HTTP request");
        if let Err(err) = self.shared.enqueue_all(request_commands(&request)) {
            warn!(token = %request.token, error = %err, "deferring HTTP request");
            guard(&self.shared.http).requeue(request.token);
            return;
        }
        self.current_request = Some(request.token);
    }

    pub(crate) fn on_http_action(&mut self, payload: &str) {
        let Some(token) = self.current_request else {
            warn!(payload, "HTTP action result with no request in flight");
            return;
        };

        let result = match parse_http_action(payload) {
            Ok(result) => result,
            Err(err) => {
                // Complete the request with status 0 so its caller is released.
                warn!(%token, error = %err, "unreadable HTTP action result");
                HttpResult {
                    cid: 0,
                    http_status: 0,
                    data_size: 0,
                    data: None,
                }
            }
        };
        info!(
            %token,
            status = result.http_status,
            size = result.data_size,
            "HTTP action finished"
        );

        let needs_payload = result.needs_payload();
        let stored = {
            let mut book = guard(&self.shared.http);
            let stored = book.store_result(token, result);
            let state = if needs_payload && stored {
                RequestState::AwaitingData
            } else {
                RequestState::Complete
            };
            book.set_state(token, state);
            stored
        };

        if !stored {
            debug!(%token, "request was abandoned; dropping result");
            self.current_request = None;
            return;
        }
        if !needs_payload {
            self.current_request = None;
            return;
        }
        if let Err(err) = self.shared.enqueue(HTTP_READ_COMMAND) {
            warn!(%token, error = %err, "cannot fetch HTTP body; retrying request");
            guard(&self.shared.http).requeue(token);
            self.current_request = None;
        }
    }

    pub(crate) fn on_http_data(&mut self, data: Option<String>) {
        self.outstanding = None;
        let Some(token) = self.current_request.take() else {
            debug!("{HTTP_READ_TAG} data with no request in flight");
            return;
        };

        let mut book = guard(&self.shared.http);
        match data {
            Some(data) => {
                info!(%token, bytes = data.len(), "HTTP data received");
                if book.attach_payload(token, data) {
                    book.set_state(token, RequestState::Complete);
                }
            }
            None => {
                warn!(%token, "HTTP data missing; retrying request");
                book.requeue(token);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modem::session::testing::{fast_config, test_session};

    #[test]
    fn parses_action_payload() {
        let result = parse_http_action("0,200,17").unwrap();
        assert_eq!(result.cid, 0);
        assert_eq!(result.http_status, 200);
        assert_eq!(result.data_size, 17);
        assert!(result.data.is_none());
        assert!(parse_http_action("0,two hundred,17").is_err());
        assert!(parse_http_action("0,200").is_err());
    }

    #[test]
    fn completion_rules() {
        let mut result = parse_http_action("0,200,17").unwrap();
        assert!(!result.is_complete());
        result.data = Some("x".repeat(17));
        assert!(result.is_complete());
        assert!(parse_http_action("0,200,0").unwrap().is_complete());
        // Non-200 bodies are never fetched.
        assert!(parse_http_action("0,404,120").unwrap().is_complete());
    }

    #[test]
    fn request_sequence() {
        let request = HttpRequest {
            token: Uuid::new_v4(),
            url: "http://example.com".to_string(),
            method: HttpMethod::Post,
            state: RequestState::Queued,
        };
        assert_eq!(
            request_commands(&request),
            vec![
                "AT+HTTPTERM",
                "AT+HTTPINIT",
                "AT+HTTPPARA=\"URL\",\"http://example.com\"",
                "AT+HTTPPARA=\"CID\",1",
                "AT+HTTPACTION=1",
            ]
        );
    }

    #[test]
    fn book_collects_only_complete_results() {
        let mut book = HttpBook::default();
        let token = book.register(HttpMethod::Get, "http://a");
        assert_eq!(book.state(token), Some(RequestState::Queued));
        assert!(book.collect(token).is_none());

        let request = book.next_request().unwrap();
        assert_eq!(request.token, token);
        assert_eq!(book.state(token), Some(RequestState::InFlight));

        assert!(book.store_result(token, parse_http_action("0,200,3").unwrap()));
        assert!(book.collect(token).is_none());
        assert!(book.attach_payload(token, "abc".to_string()));

        let result = book.collect(token).unwrap();
        assert_eq!(result.data.as_deref(), Some("abc"));
        assert!(book.state(token).is_none());
        assert!(book.collect(token).is_none());
    }

    #[test]
    fn requeue_goes_to_head_and_resets_result() {
        let mut book = HttpBook::default();
        let first = book.register(HttpMethod::Get, "http://a");
        let second = book.register(HttpMethod::Get, "http://b");
        book.next_request().unwrap();
        book.store_result(first, parse_http_action("0,200,3").unwrap());

        assert!(book.requeue(first));
        assert_eq!(book.pending_len(), 2);
        assert!(book.collect(first).is_none());
        assert_eq!(book.next_request().unwrap().token, first);
        assert_eq!(book.next_request().unwrap().token, second);
    }

    #[test]
    fn action_then_data_completes_request() {
        let (mut session, _sim) = test_session(fast_config());
        let token = guard(&session.shared.http).register(HttpMethod::Get, "http://example.com");

        session.drive_next();
        assert_eq!(session.current_request, Some(token));
        assert_eq!(guard(&session.shared.commands).len(), 5);

        session.dispatch_line("+HTTPACTION: 0,200,17\r\n");
        assert_eq!(guard(&session.shared.http).state(token), Some(RequestState::AwaitingData));
        assert_eq!(guard(&session.shared.commands).len(), 6);

        session.on_http_data(Some("seventeen bytes!!".to_string()));
        assert!(session.current_request.is_none());
        let result = guard(&session.shared.http).collect(token).unwrap();
        assert_eq!(result.http_status, 200);
        assert_eq!(result.data_size, 17);
        assert_eq!(result.data.as_deref(), Some("seventeen bytes!!"));
    }

    #[test]
    fn empty_body_releases_pipeline_immediately() {
        let (mut session, _sim) = test_session(fast_config());
        let token = guard(&session.shared.http).register(HttpMethod::Post, "http://example.com");
        session.drive_next();
        session.dispatch_line("+HTTPACTION: 1,204,0\r\n");
        assert!(session.current_request.is_none());
        let result = guard(&session.shared.http).collect(token).unwrap();
        assert_eq!(result.http_status, 204);
        assert!(result.data.is_none());
    }

    #[test]
    fn only_one_request_in_flight() {
        let (mut session, _sim) = test_session(fast_config());
        let first = guard(&session.shared.http).register(HttpMethod::Get, "http://a");
        guard(&session.shared.http).register(HttpMethod::Get, "http://b");
        session.drive_next();
        session.drive_next();
        assert_eq!(session.current_request, Some(first));
        assert_eq!(guard(&session.shared.http).pending_len(), 1);
        assert_eq!(guard(&session.shared.commands).len(), 5);
    }
}
