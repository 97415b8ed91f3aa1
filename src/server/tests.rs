//! Tests for the request lifecycle and the reference transport.

#[cfg(test)]
mod server_tests {
    use std::io::{self, Cursor};
    use std::net::SocketAddr;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::task::{Context, Poll};
    use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

    use crate::parser::Method;
    use crate::server::{
        Error, FsImage, HttpServer, LargePayload, Request, ServerConfig, Service, State, StatusCode, Storage,
        NOT_FOUND_PATH, PAGE_404,
    };

    /// Runs `raw` to completion, returning each (status, chunk) pair, then
    /// checks that one more call is a no-op.
    fn drive(service: &Service, raw: &[u8]) -> (Vec<(i32, Vec<u8>)>, Request) {
        let mut req = service.request(raw);
        let mut calls = Vec::new();
        loop {
            let status = service.run(&mut req);
            if status == 0 {
                assert!(req.output().is_empty());
                break;
            }
            calls.push((status, req.output().to_vec()));
            assert!(calls.len() < 100, "request never finished");
        }
        assert_eq!(service.run(&mut req), 0);
        (calls, req)
    }

    fn text(bytes: &[u8]) -> String {
        String::from_utf8_lossy(bytes).into_owned()
    }

    fn hello_service() -> Service {
        let mut service = Service::new(ServerConfig::default());
        service.serve("/hello", Method::GET, |_req| "world".to_string()).unwrap();
        service
    }

    #[test]
    fn test_hello_sequence() {
        let service = hello_service();
        let mut req = service.request(b"GET /hello HTTP/1.1\r\n\r\n");
        assert_eq!(req.state(), State::FirstRun);

        assert_eq!(service.run(&mut req), -2);
        assert_eq!(text(req.output()), "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\n\r\n");

        assert_eq!(service.run(&mut req), 1);
        assert_eq!(text(req.output()), "world");

        assert_eq!(service.run(&mut req), 0);
        assert!(req.output().is_empty());
        assert_eq!(req.state(), State::Complete);
    }

    #[test]
    fn test_oversized_request() {
        let service = hello_service();
        let raw = format!("GET /{} HTTP/1.1\r\n\r\n", "a".repeat(2000));
        let (calls, req) = drive(&service, raw.as_bytes());

        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, 1);
        let response = text(&calls[0].1);
        assert!(response.starts_with("HTTP/1.1 413 Request-URI Too Long\r\nContent-Type: text/html\r\n\r\n"));
        assert!(response.contains("413 Request-URI Too Long"));
        assert!(response.ends_with("\r\n"));
        assert!(!req.is_valid());
    }

    #[test]
    fn test_malformed_request() {
        let service = hello_service();
        for raw in [
            b"BREW /hello HTTP/1.1\r\n\r\n".as_slice(),
            b"GET /hello HTTP/2.0\r\n\r\n".as_slice(),
            b"GET /hello HTTP/1.1".as_slice(),
            b"".as_slice(),
        ] {
            let (calls, req) = drive(&service, raw);
            assert_eq!(calls.len(), 1);
            assert!(text(&calls[0].1).starts_with("HTTP/1.1 400 Bad Request\r\n"));
            assert_eq!(req.state(), State::Complete);
        }
    }

    #[test]
    fn test_default_not_found() {
        let service = hello_service();
        let (calls, req) = drive(&service, b"GET /nope HTTP/1.1\r\n\r\n");

        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, 1);
        assert_eq!(
            text(&calls[0].1),
            format!("HTTP/1.1 404 Not Found\r\nContent-Type: text/html\r\n\r\n{PAGE_404}\r\n")
        );
        assert_eq!(req.state(), State::NotFound);
    }

    #[test]
    fn test_method_mismatch_is_not_found() {
        let service = hello_service();
        let (calls, _) = drive(&service, b"POST /hello HTTP/1.1\r\n\r\n");
        assert!(text(&calls[0].1).starts_with("HTTP/1.1 404 Not Found\r\n"));
    }

    #[test]
    fn test_custom_not_found() {
        let mut service = hello_service();
        service
            .serve(NOT_FOUND_PATH, Method::GET, |req| format!("no page at {}", req.path()))
            .unwrap();

        let (calls, _) = drive(&service, b"DELETE /missing HTTP/1.1\r\n\r\n");
        assert_eq!(calls.len(), 1);
        let response = text(&calls[0].1);
        assert!(response.starts_with("HTTP/1.1 404 Not Found\r\n"));
        assert!(response.ends_with("\r\n\r\nno page at /missing\r\n"));
    }

    #[test]
    fn test_blank_response() {
        let mut service = Service::new(ServerConfig::default());
        service.serve("/ping", Method::GET, |_req| String::new()).unwrap();

        let mut req = service.request(b"GET /ping HTTP/1.1\r\n\r\n");
        assert_eq!(service.run(&mut req), 2);
        assert!(text(req.output()).starts_with("HTTP/1.1 200 OK\r\n"));
        assert_eq!(req.state(), State::Blank);

        assert_eq!(service.run(&mut req), 0);
        assert!(req.output().is_empty());
    }

    #[test]
    fn test_handler_runs_twice_for_generated_body() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let mut service = Service::new(ServerConfig::default());
        service
            .serve("/count", Method::GET, move |_req| {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                format!("call {n}")
            })
            .unwrap();

        let (chunks, _) = drive(&service, b"GET /count HTTP/1.1\r\n\r\n");
        assert_eq!(chunks.len(), 2);
        assert_eq!(text(&chunks[1].1), "call 2");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_all_method_page() {
        let mut service = Service::new(ServerConfig::default());
        service
            .serve("/any", Method::ALL, |req| format!("{:?}", req.method()))
            .unwrap();

        let (calls, _) = drive(&service, b"DELETE /any HTTP/1.1\r\n\r\n");
        assert_eq!(text(&calls[1].1), "Some(DELETE)");
    }

    #[test]
    fn test_templates_substituted_in_body() {
        let mut service = Service::new(ServerConfig::default());
        service
            .serve("/status", Method::GET, |req| {
                let _ = req.template("name", "sensor-1");
                let _ = req.template("temp", "21.5");
                "<p>{{name}}: {{temp}}C {{unknown}}</p>".to_string()
            })
            .unwrap();

        let (calls, req) = drive(&service, b"GET /status HTTP/1.1\r\n\r\n");
        assert_eq!(text(&calls[1].1), "<p>sensor-1: 21.5C </p>");
        assert_eq!(req.templates().len(), 2);
        assert!(!req.overflowed());
    }

    #[test]
    fn test_templates_closed_after_first_run() {
        let results = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&results);

        let mut service = Service::new(ServerConfig::default());
        service
            .serve("/t", Method::GET, move |req| {
                let result = req.template("k", "v");
                seen.lock().unwrap().push(matches!(result, Err(Error::TemplateClosed)));
                "{{k}}".to_string()
            })
            .unwrap();

        let (calls, req) = drive(&service, b"GET /t HTTP/1.1\r\n\r\n");
        assert_eq!(*results.lock().unwrap(), vec![false, true]);
        assert_eq!(text(&calls[1].1), "v");
        assert_eq!(req.templates().len(), 1);
    }

    #[test]
    fn test_template_limit() {
        let config = ServerConfig {
            max_templates: 1,
            ..ServerConfig::default()
        };
        let mut service = Service::new(config);
        service
            .serve("/t", Method::GET, |req| {
                if req.state() == State::FirstRun {
                    assert!(req.template("a", "1").is_ok());
                    assert!(matches!(req.template("b", "2"), Err(Error::TemplateLimit(1))));
                }
                "{{a}}{{b}}".to_string()
            })
            .unwrap();

        let (calls, _) = drive(&service, b"GET /t HTTP/1.1\r\n\r\n");
        assert_eq!(text(&calls[1].1), "1");
    }

    #[test]
    fn test_template_overflow_is_truncated_and_flagged() {
        let config = ServerConfig {
            buffer_size: 16,
            ..ServerConfig::default()
        };
        let mut service = Service::new(config);
        service
            .serve("/big", Method::GET, |req| {
                let _ = req.template("k", "0123456789abcdef0123");
                "x{{k}}y".to_string()
            })
            .unwrap();

        let (calls, req) = drive(&service, b"GET /big HTTP/1.1\r\n\r\n");
        assert_eq!(text(&calls[1].1), "x0123456789abcde");
        assert!(req.overflowed());
    }

    #[test]
    fn test_query_params() {
        let mut service = Service::new(ServerConfig::default());
        service
            .serve("/calc", Method::GET, |req| {
                format!("x={};y={}", req.get_param_value("x"), req.get_param_value("y"))
            })
            .unwrap();

        let (calls, req) = drive(&service, b"GET /calc?a=1&x=5&b=2 HTTP/1.1\r\n\r\n");
        assert_eq!(text(&calls[1].1), "x=5;y=");
        assert_eq!(req.query(), Some("a=1&x=5&b=2"));
    }

    #[test]
    fn test_params_not_available_before_routing() {
        let service = hello_service();
        let req = service.request(b"GET /hello?x=5 HTTP/1.1\r\n\r\n");
        assert_eq!(req.get_param_value("x"), "");
    }

    #[test]
    fn test_post_params() {
        let mut service = Service::new(ServerConfig::default());
        service
            .serve("/login", Method::ALL, |req| {
                format!("user={}", req.post_param_value("user"))
            })
            .unwrap();

        let (calls, _) = drive(&service, b"POST /login HTTP/1.1\r\nHost: device\r\n\r\nuser=admin&pass=1234");
        assert_eq!(text(&calls[1].1), "user=admin");

        // Only POST bodies are located
        let (calls, req) = drive(&service, b"PUT /login HTTP/1.1\r\n\r\nuser=admin");
        assert_eq!(text(&calls[1].1), "user=");
        assert_eq!(req.body(), None);
    }

    #[test]
    fn test_custom_status_and_headers() {
        let mut service = Service::new(ServerConfig::default());
        service
            .serve("/admin", Method::GET, |req| {
                req.set_status(StatusCode::UNAUTHORIZED);
                req.add_header("WWW-Authenticate: Basic realm=\"device\"");
                "denied".to_string()
            })
            .unwrap();

        let (calls, _) = drive(&service, b"GET /admin HTTP/1.1\r\n\r\n");
        assert_eq!(
            text(&calls[0].1),
            "HTTP/1.1 401 Unauthorized\r\nWWW-Authenticate: Basic realm=\"device\"\r\n\r\n"
        );
        assert_eq!(text(&calls[1].1), "denied");
    }

    #[test]
    fn test_json_response() {
        let mut service = Service::new(ServerConfig::default());
        service
            .serve("/api/led", Method::GET, |req| {
                req.set_json(&serde_json::json!({"on": true})).unwrap()
            })
            .unwrap();

        let (calls, _) = drive(&service, b"GET /api/led HTTP/1.1\r\n\r\n");
        assert!(text(&calls[0].1).contains("Content-Type: application/json\r\n"));
        assert_eq!(text(&calls[1].1), r#"{"on":true}"#);
    }

    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    fn streaming_service(data: Vec<u8>, size: u64) -> Service {
        let mut service = Service::new(ServerConfig::default()).with_storage(data);
        service
            .serve("/dump", Method::GET, move |req| {
                req.stream(LargePayload::new(0, size));
                req.set_mime("application/octet-stream");
                "ignored".to_string()
            })
            .unwrap();
        service
    }

    #[test]
    fn test_large_payload_streams_in_buffer_chunks() {
        let data = pattern(2500);
        let service = streaming_service(data.clone(), 2500);

        let (calls, req) = drive(&service, b"GET /dump HTTP/1.1\r\n\r\n");
        let statuses: Vec<i32> = calls.iter().map(|(s, _)| *s).collect();
        assert_eq!(statuses, vec![-2, -3, -4, 1]);
        assert!(text(&calls[0].1).contains("Content-Type: application/octet-stream\r\n"));

        let lens: Vec<usize> = calls[1..].iter().map(|(_, c)| c.len()).collect();
        assert_eq!(lens, vec![1024, 1024, 452]);
        let body: Vec<u8> = calls[1..].iter().flat_map(|(_, c)| c.clone()).collect();
        assert_eq!(body, data);
        assert_eq!(req.large_payload().unwrap().remaining, 0);
    }

    #[test]
    fn test_large_payload_exact_multiple() {
        let service = streaming_service(pattern(2048), 2048);
        let (calls, _) = drive(&service, b"GET /dump HTTP/1.1\r\n\r\n");
        let statuses: Vec<i32> = calls.iter().map(|(s, _)| *s).collect();
        assert_eq!(statuses, vec![-2, -3, 1]);
    }

    #[test]
    fn test_large_payload_shorter_storage() {
        // Storage holds fewer bytes than the payload claims
        let service = streaming_service(pattern(100), 2000);
        let (calls, req) = drive(&service, b"GET /dump HTTP/1.1\r\n\r\n");
        let total: usize = calls[1..].iter().map(|(_, c)| c.len()).sum();
        assert_eq!(total, 100);
        assert_eq!(req.state(), State::Complete);
    }

    #[test]
    fn test_empty_large_payload_is_blank() {
        let service = streaming_service(pattern(10), 0);
        let (calls, req) = drive(&service, b"GET /dump HTTP/1.1\r\n\r\n");
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, 2);
        assert_eq!(req.state(), State::Blank);
    }

    fn templated_stream(data: &[u8], value: &'static str) -> Service {
        let config = ServerConfig {
            buffer_size: 8,
            ..ServerConfig::default()
        };
        let size = data.len() as u64;
        let mut service = Service::new(config).with_storage(data.to_vec());
        service
            .serve("/page", Method::GET, move |req| {
                let _ = req.template("k", value);
                req.stream(LargePayload::new(0, size));
                String::new()
            })
            .unwrap();
        service
    }

    #[test]
    fn test_placeholder_split_across_chunks_is_untouched() {
        // "{{" ends the first 8 byte chunk, "k}}" starts the second
        let service = templated_stream(b"abcdef{{k}}gh", "X");
        let (calls, req) = drive(&service, b"GET /page HTTP/1.1\r\n\r\n");

        let chunks: Vec<(i32, String)> = calls[1..].iter().map(|(s, c)| (*s, text(c))).collect();
        assert_eq!(
            chunks,
            vec![(-3, "abcdef{{".to_string()), (1, "k}}gh".to_string())]
        );
        assert!(!req.overflowed());
    }

    #[test]
    fn test_streamed_chunk_overflow_is_truncated() {
        let service = templated_stream(b"ab{{k}}cdefghijkl", "XXXXXXXXXX");
        let (calls, req) = drive(&service, b"GET /page HTTP/1.1\r\n\r\n");

        let chunks: Vec<(i32, String)> = calls[1..].iter().map(|(s, c)| (*s, text(c))).collect();
        assert_eq!(
            chunks,
            vec![
                (-3, "abXXXXXX".to_string()),
                (-4, "defghijk".to_string()),
                (1, "l".to_string()),
            ]
        );
        assert!(req.overflowed());
    }

    #[test]
    fn test_streamed_chunks_substituted_independently() {
        let service = templated_stream(b"{{k}}abcd{{k}}ef", "Y");
        let (calls, req) = drive(&service, b"GET /page HTTP/1.1\r\n\r\n");

        let body: String = calls[1..].iter().map(|(_, c)| text(c)).collect();
        // "{{k}}abc" then "d{{k}}ef"
        assert_eq!(body, "YabcdYef");
        assert!(!req.overflowed());
    }

    #[test]
    fn test_payload_without_storage_fails_request() {
        let mut service = Service::new(ServerConfig::default());
        service
            .serve("/dump", Method::GET, |req| {
                req.stream(LargePayload::new(0, 10));
                String::new()
            })
            .unwrap();

        let (calls, _) = drive(&service, b"GET /dump HTTP/1.1\r\n\r\n");
        assert_eq!(calls.len(), 1);
        assert!(text(&calls[0].1).starts_with("HTTP/1.1 500 Internal Error\r\nContent-Type: text/html\r\n"));
    }

    struct BrokenStorage;

    impl Storage for BrokenStorage {
        fn read(&self, _offset: u64, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Other, "flash read failed"))
        }
    }

    #[test]
    fn test_storage_error_aborts() {
        let mut service = Service::new(ServerConfig::default()).with_storage(BrokenStorage);
        service
            .serve("/dump", Method::GET, |req| {
                req.stream(LargePayload::new(0, 10));
                String::new()
            })
            .unwrap();

        let mut req = service.request(b"GET /dump HTTP/1.1\r\n\r\n");
        assert_eq!(service.run(&mut req), -2);
        assert_eq!(service.run(&mut req), 0);
        assert_eq!(req.state(), State::Aborted);
        assert!(req.large_payload().is_none());
    }

    #[test]
    fn test_abort_mid_stream() {
        let service = streaming_service(pattern(5000), 5000);
        let mut req = service.request(b"GET /dump HTTP/1.1\r\n\r\n");
        assert_eq!(service.run(&mut req), -2);
        assert_eq!(service.run(&mut req), -3);

        req.abort();
        assert_eq!(req.state(), State::Aborted);
        assert!(req.output().is_empty());
        assert!(req.large_payload().is_none());
        assert_eq!(service.run(&mut req), 0);
        req.close();
    }

    #[test]
    fn test_abort_keeps_terminal_state() {
        let service = hello_service();
        let (_, mut req) = drive(&service, b"GET /hello HTTP/1.1\r\n\r\n");
        req.abort();
        assert_eq!(req.state(), State::Complete);
    }

    fn image_service() -> Service {
        let image = FsImage::pack(&[
            ("index.html", b"<h1>{{title}}</h1>".as_slice()),
            ("app.js", b"console.log(1);".as_slice()),
            ("empty.txt", b"".as_slice()),
        ])
        .unwrap();

        let mut service = Service::new(ServerConfig::default());
        service.mount_image(image, 0).unwrap();
        service
            .serve("/home", Method::GET, |req| {
                let _ = req.template("title", "Dashboard");
                req.send_file("index.html");
                String::new()
            })
            .unwrap();
        service
            .serve("/gone", Method::GET, |req| {
                req.send_file("missing.html");
                String::new()
            })
            .unwrap();
        service
    }

    #[test]
    fn test_send_file_with_templates() {
        let service = image_service();
        let (calls, _) = drive(&service, b"GET /home HTTP/1.1\r\n\r\n");

        assert_eq!(calls.len(), 2);
        assert_eq!(text(&calls[0].1), "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\n\r\n");
        assert_eq!(calls[1].0, 1);
        assert_eq!(text(&calls[1].1), "<h1>Dashboard</h1>");
    }

    #[test]
    fn test_send_missing_file_is_not_found() {
        let service = image_service();
        let (calls, req) = drive(&service, b"GET /gone HTTP/1.1\r\n\r\n");
        assert_eq!(calls.len(), 1);
        assert!(text(&calls[0].1).starts_with("HTTP/1.1 404 Not Found\r\n"));
        assert_eq!(req.state(), State::NotFound);
    }

    #[test]
    fn test_unrouted_path_served_from_image() {
        let service = image_service();
        let (calls, _) = drive(&service, b"GET /app.js HTTP/1.1\r\n\r\n");
        assert!(text(&calls[0].1).contains("Content-Type: text/javascript\r\n"));
        assert_eq!(text(&calls[1].1), "console.log(1);");

        // The root maps to index.html; no bindings means placeholders stay
        let (calls, _) = drive(&service, b"GET / HTTP/1.1\r\n\r\n");
        assert_eq!(text(&calls[1].1), "<h1>{{title}}</h1>");

        let (calls, req) = drive(&service, b"GET /empty.txt HTTP/1.1\r\n\r\n");
        assert_eq!(calls.len(), 1);
        assert_eq!(req.state(), State::Blank);
    }

    #[test]
    fn test_state_counters() {
        assert_eq!(State::FirstRun.counter(), -1);
        assert_eq!(State::Invalid.counter(), -1);
        assert_eq!(State::Draining(0).counter(), -2);
        assert_eq!(State::Draining(5).counter(), -7);
        assert_eq!(State::Complete.counter(), 1);
        assert_eq!(State::NotFound.counter(), 1);
        assert_eq!(State::Blank.counter(), 2);
        assert!(State::Blank.is_terminal());
        assert!(!State::Draining(3).is_terminal());
    }

    #[test]
    fn test_request_accessors() {
        let service = hello_service();
        let req = service.request(b"GET /hello?x=1 HTTP/1.0\r\nUser-Agent: probe\r\n\r\n");
        assert!(req.is_valid());
        assert_eq!(req.method(), Some(Method::GET));
        assert_eq!(req.path(), "/hello?x=1");
        assert_eq!(req.get_header("user-agent").map(String::as_str), Some("probe"));
        assert!(!req.is_finished());
    }

    // Mock TcpStream for testing
    struct MockTcpStream {
        read_data: Cursor<Vec<u8>>,
        write_data: Vec<u8>,
        writes: usize,
        /// Largest number of bytes a single read returns.
        segment: usize,
    }

    impl MockTcpStream {
        fn new(read_data: Vec<u8>) -> Self {
            Self {
                read_data: Cursor::new(read_data),
                write_data: Vec::new(),
                writes: 0,
                segment: usize::MAX,
            }
        }

        fn segmented(read_data: Vec<u8>, segment: usize) -> Self {
            Self {
                segment,
                ..Self::new(read_data)
            }
        }

        fn written_data(&self) -> &[u8] {
            &self.write_data
        }
    }

    impl AsyncRead for MockTcpStream {
        fn poll_read(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            let this = self.get_mut();
            let unfilled = buf.initialize_unfilled();
            let len = unfilled.len().min(this.segment);
            let n = std::io::Read::read(&mut this.read_data, &mut unfilled[..len])?;
            buf.advance(n);
            Poll::Ready(Ok(()))
        }
    }

    impl AsyncWrite for MockTcpStream {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            let this = self.get_mut();
            this.write_data.extend_from_slice(buf);
            this.writes += 1;
            Poll::Ready(Ok(buf.len()))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    fn peer() -> SocketAddr {
        "127.0.0.1:40000".parse().unwrap()
    }

    #[tokio::test]
    async fn test_handle_connection_hello() {
        let service = hello_service();
        let mut stream = MockTcpStream::new(b"GET /hello HTTP/1.1\r\nHost: device\r\n\r\n".to_vec());

        let result = HttpServer::handle_connection(&mut stream, peer(), &service).await;
        assert!(result.is_ok());
        assert_eq!(
            text(stream.written_data()),
            "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\n\r\nworld"
        );
        assert_eq!(stream.writes, 2);
    }

    #[tokio::test]
    async fn test_handle_connection_oversized() {
        let service = hello_service();
        let raw = format!("GET /{} HTTP/1.1\r\n\r\n", "a".repeat(4096));
        let mut stream = MockTcpStream::new(raw.into_bytes());

        HttpServer::handle_connection(&mut stream, peer(), &service).await.unwrap();
        assert!(text(stream.written_data()).starts_with("HTTP/1.1 413 Request-URI Too Long\r\n"));
        assert_eq!(stream.writes, 1);
    }

    #[tokio::test]
    async fn test_handle_connection_not_found() {
        let service = hello_service();
        let mut stream = MockTcpStream::new(b"GET /nothing HTTP/1.1\r\n\r\n".to_vec());

        HttpServer::handle_connection(&mut stream, peer(), &service).await.unwrap();
        let response = text(stream.written_data());
        assert!(response.starts_with("HTTP/1.1 404 Not Found\r\n"));
        assert!(response.contains(PAGE_404));
    }

    #[tokio::test]
    async fn test_handle_connection_streams_payload() {
        let data = pattern(50);
        let config = ServerConfig {
            buffer_size: 8,
            ..ServerConfig::default()
        };
        let mut service = Service::new(config).with_storage(data.clone());
        service
            .serve("/dump", Method::GET, |req| {
                req.stream(LargePayload::new(0, 50));
                String::new()
            })
            .unwrap();

        let mut stream = MockTcpStream::new(b"GET /dump HTTP/1.1\r\n\r\n".to_vec());
        HttpServer::handle_connection(&mut stream, peer(), &service).await.unwrap();

        let header = b"HTTP/1.1 200 OK\r\nContent-Type: text/html\r\n\r\n";
        let written = stream.written_data();
        assert_eq!(&written[..header.len()], header);
        assert_eq!(&written[header.len()..], data.as_slice());
        // header + 7 chunks (6 x 8 bytes + 2 bytes)
        assert_eq!(stream.writes, 8);
    }

    #[tokio::test]
    async fn test_handle_connection_body_in_later_segments() {
        let mut service = Service::new(ServerConfig::default());
        service
            .serve("/login", Method::POST, |req| {
                format!("user={}", req.post_param_value("user"))
            })
            .unwrap();

        let raw = b"POST /login HTTP/1.1\r\nContent-Length: 20\r\n\r\nuser=admin&pass=1234";
        let mut stream = MockTcpStream::segmented(raw.to_vec(), 7);

        HttpServer::handle_connection(&mut stream, peer(), &service).await.unwrap();
        let response = text(stream.written_data());
        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(response.ends_with("\r\n\r\nuser=admin"));
    }

    #[tokio::test]
    async fn test_handle_connection_segmented_oversized() {
        let service = hello_service();
        let raw = format!("GET /{} HTTP/1.1\r\n\r\n", "a".repeat(4096));
        let mut stream = MockTcpStream::segmented(raw.into_bytes(), 100);

        HttpServer::handle_connection(&mut stream, peer(), &service).await.unwrap();
        assert!(text(stream.written_data()).starts_with("HTTP/1.1 413 Request-URI Too Long\r\n"));
    }

    #[tokio::test]
    async fn test_handle_connection_closed() {
        let service = hello_service();
        let mut stream = MockTcpStream::new(Vec::new());

        HttpServer::handle_connection(&mut stream, peer(), &service).await.unwrap();
        assert!(stream.written_data().is_empty());
    }
}
