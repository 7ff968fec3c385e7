//! In-process fakes for the side-effect seams used by step tests.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::time::Duration;

use crate::command::{CommandOutput, CommandRunner, CommandSpec};
use crate::error::{Error, Result};
use crate::http::{HttpRequest, HttpResponse, Method, Transport};
use crate::step::{Sleeper, StepContext};

struct Route {
    method: Method,
    url: String,
    responses: VecDeque<HttpResponse>,
}

/// Canned responses keyed by method and exact URL. The last response queued
/// for a route repeats.
#[derive(Default)]
pub struct FakeTransport {
    routes: RefCell<Vec<Route>>,
    requests: RefCell<Vec<HttpRequest>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, method: Method, url: &str, status: u16, body: &str) -> Self {
        {
            let mut routes = self.routes.borrow_mut();
            let response = HttpResponse::new(status, body);
            match routes
                .iter_mut()
                .find(|r| r.method == method && r.url == url)
            {
                Some(route) => route.responses.push_back(response),
                None => routes.push(Route {
                    method,
                    url: url.to_string(),
                    responses: VecDeque::from([response]),
                }),
            }
        }
        self
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.borrow().clone()
    }

    pub fn requests_to(&self, method: Method, url: &str) -> Vec<HttpRequest> {
        self.requests
            .borrow()
            .iter()
            .filter(|r| r.method == method && r.url == url)
            .cloned()
            .collect()
    }

    pub fn count(&self, method: Method) -> usize {
        self.requests
            .borrow()
            .iter()
            .filter(|r| r.method == method)
            .count()
    }
}

impl Transport for FakeTransport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse> {
        self.requests.borrow_mut().push(request.clone());
        let mut routes = self.routes.borrow_mut();
        let route = routes
            .iter_mut()
            .find(|r| r.method == request.method && r.url == request.url)
            .ok_or_else(|| Error::http_request_failed(&request.url, "no route in fake transport"))?;
        let response = if route.responses.len() > 1 {
            route.responses.pop_front()
        } else {
            route.responses.front().cloned()
        };
        response.ok_or_else(|| Error::http_request_failed(&request.url, "no response queued"))
    }
}

type Handler = Box<dyn Fn(&CommandSpec) -> CommandOutput>;

/// Dispatches on a substring of the rendered command line; first match wins.
#[derive(Default)]
pub struct FakeRunner {
    handlers: Vec<(String, Handler)>,
    calls: RefCell<Vec<CommandSpec>>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on<F>(mut self, needle: &str, handler: F) -> Self
    where
        F: Fn(&CommandSpec) -> CommandOutput + 'static,
    {
        self.handlers.push((needle.to_string(), Box::new(handler)));
        self
    }

    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.borrow().clone()
    }
}

impl CommandRunner for FakeRunner {
    fn run(&self, spec: &CommandSpec) -> CommandOutput {
        self.calls.borrow_mut().push(spec.clone());
        let line = spec.display();
        self.handlers
            .iter()
            .find(|(needle, _)| line.contains(needle.as_str()))
            .map(|(_, handler)| handler(spec))
            .unwrap_or_else(|| CommandOutput::failed(127, format!("unexpected command: {}", line)))
    }
}

#[derive(Default)]
pub struct RecordingSleeper {
    slept: RefCell<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn slept(&self) -> Vec<Duration> {
        self.slept.borrow().clone()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.slept.borrow_mut().push(duration);
    }
}

pub fn context<'a>(
    transport: &'a FakeTransport,
    runner: &'a FakeRunner,
    sleeper: &'a RecordingSleeper,
) -> StepContext<'a> {
    StepContext {
        transport,
        runner,
        sleeper,
    }
}
