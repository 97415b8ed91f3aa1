//! The request lifecycle: one header chunk, then body chunks, one per call.
//!
//! A [`Request`] is driven by calling [`Request::run`] until it returns 0.
//! Every non-zero return means [`Request::output`] holds bytes to transmit
//! before the next call.
//!
//! ```text
//! Invalid ──────────────────────────────► Complete   (canned 400/413 page)
//! FirstRun ─┬─ no page ─────────────────► NotFound   (404 header + page)
//!           ├─ empty body ──────────────► Blank      (header only)
//!           └─ header ──► Draining(n) ──► Complete   (body chunks)
//! ```

use std::sync::Arc;

use log::{debug, error, warn};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::parser::{param_value, parse_request, HttpRequest, HttpVersion, Method, EOL};
use crate::server::config::ServerConfig;
use crate::server::error::Error;
use crate::server::handler::HandlerFn;
use crate::server::mime::mime_for;
use crate::server::response::{error_page, Chunk, Response, StatusCode, PAGE_404};
use crate::server::service::Service;
use crate::server::storage::LargePayload;
use crate::server::template::{self, Outcome, Template};

/// Where a request is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Rejected while parsing; the next call sends the error page.
    Invalid,
    /// Not routed yet; the next call sends the header.
    FirstRun,
    /// Header sent; `n` body chunks sent so far.
    Draining(u32),
    /// Header sent and the handler produced nothing; no body follows.
    Blank,
    /// Everything has been produced.
    Complete,
    /// The not-found response has been produced.
    NotFound,
    /// Released through [`Request::abort`] before completing.
    Aborted,
}

impl State {
    /// The signed progress counter reported by [`Request::run`].
    ///
    /// Negative values mean more output is pending; `1` and `2` mark the
    /// last chunk of a full and a blank response.
    pub fn counter(self) -> i32 {
        match self {
            State::Invalid | State::FirstRun => -1,
            State::Draining(sent) => (-2i32).saturating_sub(i32::try_from(sent).unwrap_or(i32::MAX)),
            State::Complete | State::NotFound | State::Aborted => 1,
            State::Blank => 2,
        }
    }

    /// Returns true once `run` has nothing more to produce.
    pub fn is_terminal(self) -> bool {
        matches!(self, State::Blank | State::Complete | State::NotFound | State::Aborted)
    }
}

/// A single request being answered.
pub struct Request {
    http: Option<HttpRequest>,
    state: State,
    /// Response fields; handlers set status, type and headers here.
    pub response: Response,
    buffer: Vec<u8>,
    scratch: Vec<u8>,
    buffer_size: usize,
    handler: Option<HandlerFn>,
    not_found: Option<HandlerFn>,
    templates: Vec<Template>,
    max_templates: usize,
    payload: Option<LargePayload>,
    query_at: Option<usize>,
    body_at: Option<usize>,
    overflowed: bool,
}

impl Request {
    /// Build a request from raw bytes.
    ///
    /// Oversized or malformed input produces an invalid request that
    /// answers with 413 or 400 on its first run.
    pub fn new(raw: &[u8], config: &ServerConfig) -> Self {
        let mut req = Self {
            http: None,
            state: State::Invalid,
            response: Response::default(),
            buffer: Vec::new(),
            scratch: Vec::new(),
            buffer_size: config.buffer_size.max(1),
            handler: None,
            not_found: None,
            templates: Vec::new(),
            max_templates: config.max_templates,
            payload: None,
            query_at: None,
            body_at: None,
            overflowed: false,
        };

        if raw.len() > config.max_request_size {
            warn!(
                "Rejecting request of {len} bytes (limit {max})",
                len = raw.len(),
                max = config.max_request_size
            );
            req.response.code = Some(StatusCode::PAYLOAD_TOO_LARGE);
            return req;
        }

        match parse_request(raw) {
            Ok(http) => {
                debug!("{} {} {}", http.method, http.path, http.version);
                req.http = Some(http);
                req.state = State::FirstRun;
            }
            Err(e) => {
                warn!("Bad request: {e}");
                req.response.code = Some(StatusCode::BAD_REQUEST);
            }
        }
        req
    }

    /// Drive the request one step.
    ///
    /// Returns 0 when there is nothing (more) to send. Otherwise
    /// [`output`](Self::output) holds the next chunk and the return value
    /// is the [`State::counter`] of the state just entered: negative while
    /// more chunks follow.
    pub fn run(&mut self, service: &Service) -> i32 {
        match self.state {
            State::Invalid => self.error_response(),
            State::FirstRun => self.first_run(service),
            State::Draining(sent) => self.next_run(service, sent),
            State::Blank | State::Complete | State::NotFound | State::Aborted => {
                self.release_output();
                0
            }
        }
    }

    fn first_run(&mut self, service: &Service) -> i32 {
        let Some(http) = self.http.as_ref() else {
            return self.error_response();
        };
        let method = http.method;
        let path = http.path.clone();
        let plain = http.plain_path().to_string();

        let resolution = service.router.resolve(&path, method);
        self.not_found = resolution.not_found.map(|page| Arc::clone(&page.handler));

        let Some(page) = resolution.page else {
            return match self.open_image_file(service, &plain) {
                Some(status) => status,
                None => self.not_found_response(),
            };
        };

        self.locate_params(method);

        // The first call only sets response fields; its body is produced again while draining
        let first = (page.handler)(self);
        self.handler = Some(Arc::clone(&page.handler));

        if let Some(name) = self.response.file.take() {
            match service.files().and_then(|fs| fs.find(&name)) {
                Some(entry) => {
                    if self.response.mime.is_none() {
                        self.response.mime = Some(mime_for(&name).to_string());
                    }
                    self.payload = Some(entry.payload());
                }
                None => {
                    warn!("{plain}: file {name} is not in the image");
                    return self.not_found_response();
                }
            }
        }

        if self.payload.is_some() && service.storage().is_none() {
            error!("{plain}: {}", Error::StorageUnavailable);
            self.payload = None;
            self.response.code = Some(StatusCode::INTERNAL_SERVER_ERROR);
            return self.error_response();
        }

        let blank = match self.payload {
            Some(payload) => payload.remaining == 0,
            None => first.is_empty(),
        };
        self.send_header(&plain, blank)
    }

    /// Falls back to a file of the mounted image named like the path.
    fn open_image_file(&mut self, service: &Service, plain: &str) -> Option<i32> {
        let name = match plain.trim_start_matches('/') {
            "" => "index.html",
            name => name,
        };
        let entry = service.files()?.find(name)?;
        debug!("{plain}: serving {name} from image");

        self.payload = Some(entry.payload());
        self.response.mime = Some(mime_for(name).to_string());
        Some(self.send_header(plain, entry.size == 0))
    }

    fn send_header(&mut self, path: &str, blank: bool) -> i32 {
        self.response.code.get_or_insert(StatusCode::OK);
        let header = self.response.header_block(path);
        self.set_owned(header.into_bytes());
        self.state = if blank { State::Blank } else { State::Draining(0) };
        self.state.counter()
    }

    fn next_run(&mut self, service: &Service, sent: u32) -> i32 {
        self.release_output();

        if let Some(payload) = self.payload {
            return self.read_payload(service, payload, sent);
        }

        let Some(handler) = self.handler.clone() else {
            self.abort();
            return 0;
        };
        let body = handler(self).into_bytes();
        let body = self.render_owned(body);
        self.set_owned(body);
        self.state = State::Complete;
        self.state.counter()
    }

    fn read_payload(&mut self, service: &Service, mut payload: LargePayload, sent: u32) -> i32 {
        let Some(storage) = service.storage() else {
            error!("{}", Error::StorageUnavailable);
            self.abort();
            return 0;
        };

        let want = usize::try_from(payload.remaining).map_or(self.buffer_size, |r| r.min(self.buffer_size));
        if self.buffer.len() < want {
            self.buffer.resize(self.buffer_size, 0);
        }

        let n = match storage.read(payload.offset, &mut self.buffer[..want]) {
            Ok(n) => n,
            Err(e) => {
                error!("Storage read at {offset} failed: {e}", offset = payload.offset);
                self.abort();
                return 0;
            }
        };
        if n == 0 && want > 0 {
            warn!("Storage ended {remaining} bytes early", remaining = payload.remaining);
            payload.remaining = 0;
        }

        payload.offset += n as u64;
        payload.remaining = payload.remaining.saturating_sub(n as u64);
        self.payload = Some(payload);

        self.response.len = n;
        self.response.data = Chunk::Buffer;
        self.render_buffer();

        self.state = if payload.remaining == 0 {
            State::Complete
        } else {
            State::Draining(sent + 1)
        };
        self.state.counter()
    }

    fn render_buffer(&mut self) {
        let chunk = &self.buffer[..self.response.len];
        match template::render(chunk, &self.templates, self.buffer_size, &mut self.scratch) {
            Outcome::Unchanged => return,
            Outcome::Rendered => {}
            Outcome::Truncated => self.flag_overflow(),
        }
        std::mem::swap(&mut self.buffer, &mut self.scratch);
        self.response.len = self.buffer.len();
    }

    fn render_owned(&mut self, body: Vec<u8>) -> Vec<u8> {
        match template::render(&body, &self.templates, self.buffer_size, &mut self.scratch) {
            Outcome::Unchanged => body,
            Outcome::Rendered => std::mem::take(&mut self.scratch),
            Outcome::Truncated => {
                self.flag_overflow();
                std::mem::take(&mut self.scratch)
            }
        }
    }

    fn flag_overflow(&mut self) {
        warn!("{}: rendered chunk truncated at {} bytes", self.path(), self.buffer_size);
        self.overflowed = true;
    }

    fn not_found_response(&mut self) -> i32 {
        self.response.code = Some(StatusCode::NOT_FOUND);
        self.payload = None;

        let page = match self.not_found.clone() {
            Some(handler) => handler(self),
            None => PAGE_404.to_string(),
        };
        self.generate_response(&page);
        self.state = State::NotFound;
        self.state.counter()
    }

    fn error_response(&mut self) -> i32 {
        let code = *self.response.code.get_or_insert(StatusCode::BAD_REQUEST);
        self.response.mime = Some("text/html".to_string());
        self.response.headers.clear();

        self.generate_response(&error_page(code));
        self.state = State::Complete;
        self.state.counter()
    }

    /// Header and page in a single chunk.
    fn generate_response(&mut self, page: &str) {
        let path = self.http.as_ref().map_or("", |h| h.plain_path()).to_string();
        let mut out = self.response.header_block(&path).into_bytes();
        out.extend_from_slice(page.as_bytes());
        out.extend_from_slice(EOL.as_bytes());
        self.set_owned(out);
    }

    fn locate_params(&mut self, method: Method) {
        let Some(http) = self.http.as_ref() else {
            return;
        };
        self.query_at = http.path.find('?').map(|i| i + 1);
        if method == Method::POST {
            self.body_at = http.message.find("\r\n\r\n").map(|i| i + 4);
        }
    }

    fn set_owned(&mut self, bytes: Vec<u8>) {
        self.response.len = bytes.len();
        self.response.data = Chunk::Owned(bytes);
    }

    fn release_output(&mut self) {
        self.response.data = Chunk::Empty;
        self.response.len = 0;
    }

    /// The chunk produced by the last call to [`run`](Self::run).
    pub fn output(&self) -> &[u8] {
        match &self.response.data {
            Chunk::Empty => &[],
            Chunk::Owned(bytes) => bytes,
            Chunk::Buffer => &self.buffer[..self.response.len],
        }
    }

    /// Stop the request and release everything it holds, from any state.
    pub fn abort(&mut self) {
        if !self.state.is_terminal() {
            debug!("{}: aborted in {:?}", self.path(), self.state);
            self.state = State::Aborted;
        }
        self.release_output();
        self.payload = None;
        self.handler = None;
        self.not_found = None;
        self.buffer = Vec::new();
        self.scratch = Vec::new();
    }

    /// Finish with the request, releasing all of its allocations.
    pub fn close(self) {
        debug!("{}: closed in {:?}", self.path(), self.state);
    }

    // Handler-facing API

    /// Register a `{{key}}` substitution for the body.
    ///
    /// Only possible while the request is being routed, i.e. from the
    /// handler's first invocation.
    pub fn template(&mut self, key: impl Into<String>, value: impl Into<String>) -> Result<(), Error> {
        if self.state != State::FirstRun {
            return Err(Error::TemplateClosed);
        }
        if self.templates.len() >= self.max_templates {
            return Err(Error::TemplateLimit(self.max_templates));
        }
        self.templates.push(Template::new(key, value));
        Ok(())
    }

    /// Set the response status code.
    pub fn set_status(&mut self, code: impl Into<StatusCode>) {
        self.response.code = Some(code.into());
    }

    /// Set the response content type.
    pub fn set_mime(&mut self, mime: impl Into<String>) {
        self.response.mime = Some(mime.into());
    }

    /// Add a raw header line such as `"Cache-Control: no-store"`.
    pub fn add_header(&mut self, line: impl Into<String>) {
        self.response.headers.push(line.into());
    }

    /// Answer with a file of the mounted image instead of the handler's text.
    pub fn send_file(&mut self, name: impl Into<String>) {
        self.response.file = Some(name.into());
    }

    /// Answer with a range of storage instead of the handler's text.
    pub fn stream(&mut self, payload: LargePayload) {
        self.payload = Some(payload);
    }

    /// Serialize `value` as the body and mark it `application/json`.
    pub fn set_json<T: Serialize>(&mut self, value: &T) -> Result<String, Error> {
        let json = serde_json::to_string(value)?;
        self.set_mime("application/json");
        Ok(json)
    }

    /// A query-string parameter, or `""`. Available once the request is routed.
    pub fn get_param_value(&self, name: &str) -> &str {
        self.query().map_or("", |q| param_value(q, name))
    }

    /// A form-body parameter of a POST request, or `""`.
    pub fn post_param_value(&self, name: &str) -> &str {
        self.body().map_or("", |b| param_value(b, name))
    }

    /// Deserialize the POST body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, Error> {
        Ok(serde_json::from_str(self.body().unwrap_or(""))?)
    }

    // Accessors

    /// The query string, once the request is routed.
    pub fn query(&self) -> Option<&str> {
        let http = self.http.as_ref()?;
        self.query_at.and_then(|at| http.path.get(at..))
    }

    /// The POST body, once the request is routed.
    pub fn body(&self) -> Option<&str> {
        let http = self.http.as_ref()?;
        self.body_at.and_then(|at| http.message.get(at..))
    }

    /// Get the current lifecycle state.
    pub fn state(&self) -> State {
        self.state
    }

    /// False when parsing rejected the input.
    pub fn is_valid(&self) -> bool {
        self.http.is_some()
    }

    /// Returns true if the request reached a terminal state.
    pub fn is_finished(&self) -> bool {
        self.state.is_terminal()
    }

    /// Set when template substitution had to cut a chunk.
    pub fn overflowed(&self) -> bool {
        self.overflowed
    }

    /// The parsed request, if parsing succeeded.
    pub fn http(&self) -> Option<&HttpRequest> {
        self.http.as_ref()
    }

    /// Get the request method.
    pub fn method(&self) -> Option<Method> {
        self.http.as_ref().map(|h| h.method)
    }

    /// The request target including query string; empty for invalid requests.
    pub fn path(&self) -> &str {
        self.http.as_ref().map_or("", |h| h.path.as_str())
    }

    /// Get the protocol version.
    pub fn version(&self) -> Option<HttpVersion> {
        self.http.as_ref().map(|h| h.version)
    }

    /// Get a header value (case-insensitive).
    pub fn get_header(&self, name: &str) -> Option<&String> {
        self.http.as_ref()?.get_header(name)
    }

    /// The template bindings registered so far.
    pub fn templates(&self) -> &[Template] {
        &self.templates
    }

    /// The large payload still being streamed, if any.
    pub fn large_payload(&self) -> Option<LargePayload> {
        self.payload
    }
}
