//! A minimal, incremental HTTP request-handling core.
//!
//! This library answers HTTP requests on hosts with little memory: the
//! response is produced one chunk at a time, so a page never has to exist
//! in memory all at once.
//!
//! # Features
//!
//! - Parse HTTP/1.x requests from byte slices
//! - Route GET, POST, PUT and DELETE requests to handlers, with a catch-all `ALL`
//! - Drive each request through an explicit state machine, one chunk per call
//! - `{{key}}` template substitution bounded by the chunk buffer size
//! - Stream large payloads and packed file images from bulk storage
//! - A reference async TCP transport built on tokio
//!
//! # Examples
//!
//! ## Basic usage
//!
//! ```
//! use microreq_rs::{Method, ServerConfig, Service};
//!
//! let mut service = Service::new(ServerConfig::default());
//! service.serve("/hello", Method::GET, |_req| "world".to_string()).unwrap();
//!
//! let mut request = service.request(b"GET /hello HTTP/1.1\r\n\r\n");
//! let mut response = Vec::new();
//! while service.run(&mut request) != 0 {
//!     response.extend_from_slice(request.output());
//! }
//!
//! assert_eq!(
//!     String::from_utf8(response).unwrap(),
//!     "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\n\r\nworld"
//! );
//! ```
//!
//! ## Templates and parameters
//!
//! ```
//! use microreq_rs::{Method, ServerConfig, Service};
//!
//! let mut service = Service::new(ServerConfig::default());
//! service
//!     .serve("/greet", Method::GET, |req| {
//!         let name = req.get_param_value("name").to_string();
//!         let _ = req.template("name", name);
//!         "<p>Hello, {{name}}!</p>".to_string()
//!     })
//!     .unwrap();
//!
//! let mut request = service.request(b"GET /greet?name=Ada HTTP/1.1\r\n\r\n");
//! assert!(service.run(&mut request) < 0); // header
//! assert_eq!(service.run(&mut request), 1); // last chunk
//! assert_eq!(request.output(), b"<p>Hello, Ada!</p>");
//! ```
//!
//! ## Error handling
//!
//! ```
//! use microreq_rs::{parse_request, ParserError};
//!
//! let invalid_request = b"INVALID /index.html HTTP/1.1\r\nHost: example.com\r\n\r\n";
//!
//! match parse_request(invalid_request) {
//!     Ok(_) => println!("Request parsed successfully"),
//!     Err(ParserError::InvalidMethod(method)) => println!("Invalid method: {}", method),
//!     Err(ParserError::MalformedRequestLine(line)) => println!("Malformed request line: {}", line),
//!     Err(err) => println!("Other error: {}", err),
//! }
//! ```
//!
//! See the `demos` directory for a complete server.

// Export the parser module
pub mod parser;

// Export the server module
pub mod server;

// Re-export commonly used items for convenience
pub use parser::{Error as ParserError, HttpRequest, HttpVersion, Method, param_value, parse_request};
pub use server::{
    Error as ServerError, FileStorage, FsImage, HttpServer, LargePayload, Request, Router, ServerConfig, Service,
    State, StatusCode, Storage, Template,
};
