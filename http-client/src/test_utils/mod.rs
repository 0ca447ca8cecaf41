//! Scripted engine backend for exercising the client without sockets.

use crate::{Session, SessionBuilder};
use std::{
    collections::VecDeque,
    io::Read,
    sync::{Arc, Mutex},
    time::Duration,
};
use taskline_engine::{
    Chain, ChainScope, Completion, Error as EngineError, ErrorKind as EngineErrorKind, HeaderMap,
    HeaderName, HeaderValue, Method, Request as EngineRequest, Response as EngineResponse,
    Result as UnitResult, Scheduler, StatusCode, Unit, Version,
};

/// One scripted engine outcome, consumed per HTTP unit in submission order.
#[derive(Debug)]
pub(crate) enum ScriptedStep {
    Respond {
        status: u16,
        headers: Vec<(&'static str, &'static str)>,
        body: &'static str,
    },
    Fail(EngineErrorKind),
}

impl ScriptedStep {
    pub(crate) fn ok(body: &'static str) -> Self {
        Self::Respond {
            status: 200,
            headers: Vec::new(),
            body,
        }
    }

    pub(crate) fn status(status: u16) -> Self {
        Self::Respond {
            status,
            headers: Vec::new(),
            body: "",
        }
    }

    pub(crate) fn redirect(status: u16, location: &'static str) -> Self {
        Self::Respond {
            status,
            headers: vec![("location", location)],
            body: "",
        }
    }

    pub(crate) fn fail(kind: EngineErrorKind) -> Self {
        Self::Fail(kind)
    }

    pub(crate) fn with_header(mut self, name: &'static str, value: &'static str) -> Self {
        match &mut self {
            Self::Respond { headers, .. } => headers.push((name, value)),
            Self::Fail(_) => panic!("a failure step carries no headers"),
        }
        self
    }

    fn into_outcome(self) -> UnitResult<EngineResponse> {
        match self {
            Self::Respond {
                status,
                headers,
                body,
            } => {
                let mut map = HeaderMap::new();
                for (name, value) in headers {
                    map.append(
                        name.parse::<HeaderName>().expect("scripted header name"),
                        HeaderValue::from_static(value),
                    );
                }
                Ok(EngineResponse::builder()
                    .status_code(StatusCode::from_u16(status).expect("scripted status code"))
                    .headers(map)
                    .bytes_as_body(body)
                    .build())
            }
            Self::Fail(kind) => Err(EngineError::new_with_msg(kind, "scripted transport failure")),
        }
    }
}

/// Everything the engine saw of one framed request, captured before the
/// scripted outcome is handed back. Reading the snapshot drains the body
/// stream; resettable bodies rewind on resend exactly as they would after
/// a real send.
#[derive(Clone, Debug)]
pub(crate) struct SeenRequest {
    pub(crate) method: Method,
    pub(crate) url: String,
    pub(crate) version: Version,
    pub(crate) headers: HeaderMap,
    pub(crate) body: Vec<u8>,
    pub(crate) connect_to: Option<String>,
    pub(crate) keep_alive: bool,
    pub(crate) send_timeout: Option<Duration>,
    pub(crate) receive_timeout: Option<Duration>,
    pub(crate) size_limit: Option<u64>,
}

impl SeenRequest {
    fn of(request: &mut EngineRequest) -> Self {
        let mut body = Vec::new();
        request
            .body_mut()
            .read_to_end(&mut body)
            .expect("scripted body read");
        Self {
            method: request.method().to_owned(),
            url: request.url().to_string(),
            version: request.version(),
            headers: request.headers().to_owned(),
            body,
            connect_to: request.connect_to().map(|authority| authority.to_string()),
            keep_alive: request.keep_alive(),
            send_timeout: request.send_timeout(),
            receive_timeout: request.receive_timeout(),
            size_limit: request.size_limit(),
        }
    }
}

/// Deterministic [`Scheduler`] that answers HTTP units from a fixed script
/// and fires timers immediately.
///
/// `launch` only parks the chain; nothing runs until `wait_idle`, which
/// drains chains one unit at a time on the calling thread. That leaves a
/// window between submission and execution for tests to cancel in.
#[derive(Debug, Default)]
pub(crate) struct ScriptedScheduler {
    script: Mutex<VecDeque<ScriptedStep>>,
    pending: Mutex<VecDeque<Chain>>,
    seen: Mutex<Vec<SeenRequest>>,
    timer_delays: Mutex<Vec<Duration>>,
}

impl ScriptedScheduler {
    pub(crate) fn new(script: impl IntoIterator<Item = ScriptedStep>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            ..Default::default()
        }
    }

    /// Requests executed so far, in execution order.
    pub(crate) fn seen(&self) -> Vec<SeenRequest> {
        self.seen.lock().unwrap().to_vec()
    }

    /// Delays of every timer unit executed so far.
    pub(crate) fn timer_delays(&self) -> Vec<Duration> {
        self.timer_delays.lock().unwrap().to_vec()
    }

    fn run(&self, mut chain: Chain) {
        while let Some(unit) = chain.pop_front() {
            let mut scope = ChainScope::new();
            match unit {
                Unit::Http {
                    mut request,
                    on_complete,
                } => {
                    self.seen.lock().unwrap().push(SeenRequest::of(&mut request));
                    let step = self.script.lock().unwrap().pop_front().unwrap_or_else(|| {
                        panic!(
                            "script exhausted by {} {}",
                            request.method(),
                            request.url()
                        )
                    });
                    on_complete(&mut scope, Completion::new(request, step.into_outcome()));
                }
                Unit::Timer { delay, on_fire } => {
                    self.timer_delays.lock().unwrap().push(delay);
                    on_fire(&mut scope);
                }
            }
            chain.apply(scope);
        }
    }
}

impl Scheduler for ScriptedScheduler {
    fn launch(&self, chain: Chain) {
        self.pending.lock().unwrap().push_back(chain);
    }

    fn wait_idle(&self) {
        loop {
            let next = self.pending.lock().unwrap().pop_front();
            match next {
                Some(chain) => self.run(chain),
                None => break,
            }
        }
    }
}

/// A session builder wired to a fresh scripted scheduler.
pub(crate) fn scripted_builder(
    script: impl IntoIterator<Item = ScriptedStep>,
) -> (SessionBuilder, Arc<ScriptedScheduler>) {
    init_logger();
    let scheduler = Arc::new(ScriptedScheduler::new(script));
    (Session::builder(scheduler.to_owned()), scheduler)
}

/// A session with all defaults over a fresh scripted scheduler.
pub(crate) fn scripted_session(
    script: impl IntoIterator<Item = ScriptedStep>,
) -> (Session, Arc<ScriptedScheduler>) {
    let (mut builder, scheduler) = scripted_builder(script);
    (builder.build(), scheduler)
}

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}
