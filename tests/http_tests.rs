use server_proxy::http::*;

fn feed(req: &mut HttpRequest, bytes: &[u8]) -> Result<(), ParseError> {
    req.buffer.extend_from_slice(bytes);
    req.feed(1_048_576)
}

#[test]
fn simple_get_request() {
    let mut req = HttpRequest::new();
    feed(&mut req, b"GET /index.html HTTP/1.0\r\nHost: localhost\r\n\r\n").unwrap();

    assert_eq!(req.method, Method::Get);
    assert_eq!(req.path, "/index.html");
    assert_eq!(req.state, ParsingState::Done);
    assert_eq!(req.headers.get("Host").unwrap(), "localhost");
}

#[test]
fn fragmented_request_line_and_headers() {
    let mut req = HttpRequest::new();

    req.buffer.extend_from_slice(b"GET /path ");
    assert_eq!(req.feed(1024).unwrap_err(), ParseError::Incomplete);

    req.buffer.extend_from_slice(b"HTTP/1.0\r\n");
    assert_eq!(req.feed(1024).unwrap_err(), ParseError::Incomplete);
    assert_eq!(req.state, ParsingState::Head);

    req.buffer.extend_from_slice(b"User-Agent: test\r\n\r\n");
    assert!(req.feed(1024).is_ok());
    assert_eq!(req.state, ParsingState::Done);
}

#[test]
fn post_request_with_complete_body() {
    let mut req = HttpRequest::new();
    feed(&mut req, b"POST /api HTTP/1.0\r\nContent-Length: 13\r\n\r\nHello, World!").unwrap();

    assert_eq!(req.method, Method::Post);
    assert_eq!(req.body, b"Hello, World!");
    assert_eq!(req.state, ParsingState::Done);
}

#[test]
fn post_request_with_fragmented_body() {
    let mut req = HttpRequest::new();
    req.buffer
        .extend_from_slice(b"POST /data HTTP/1.0\r\nContent-Length: 10\r\n\r\n");

    assert_eq!(req.feed(1024).unwrap_err(), ParseError::Incomplete);
    assert_eq!(req.state, ParsingState::Body);
    assert_eq!(req.content_length, 10);

    req.buffer.extend_from_slice(b"12345");
    assert_eq!(req.feed(1024).unwrap_err(), ParseError::Incomplete);

    req.buffer.extend_from_slice(b"67890");
    assert!(req.feed(1024).is_ok());
    assert_eq!(req.body, b"1234567890");
    assert_eq!(req.state, ParsingState::Done);
}

#[test]
fn unrecognized_method_still_parses() {
    let mut req = HttpRequest::new();
    req.buffer
        .extend_from_slice(b"PATCH /invalid HTTP/1.0\r\n\r\n");
    assert!(req.feed(1024).is_ok());
    assert_eq!(req.method, Method::Other("PATCH".to_string()));
}

#[test]
fn excess_bytes_after_declared_content_length_are_left_unconsumed() {
    let mut req = HttpRequest::new();
    let raw = b"POST /upload HTTP/1.0\r\nContent-Length: 5\r\n\r\nHelloWorld";
    req.buffer.extend_from_slice(raw);
    req.feed(1024).unwrap();

    assert_eq!(req.state, ParsingState::Done);
    assert_eq!(req.body, b"Hello");
    assert_eq!(req.cursor, raw.len() - "World".len());
}

#[test]
fn response_wire_format() {
    let mut res = HttpResponse::new(200, "OK");
    res.set_header("Content-Type", "text/plain");
    res.set_body(b"Hello Rust".to_vec(), "text/plain");
    res.finalize(false);

    let bytes = res.to_bytes();
    let s = String::from_utf8_lossy(&bytes);

    assert!(s.starts_with("HTTP/1.0 200 OK\r\n"));
    assert!(s.contains("Content-Type: text/plain\r\n"));
    assert!(s.contains("Content-Length: 10\r\n"));
    assert!(s.ends_with("\r\n\r\nHello Rust"));
}
