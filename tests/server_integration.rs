use server_proxy::config::{Config, HostConfig};
use server_proxy::server::Server;
use std::io::{Read, Write};
use std::net::TcpStream;
use std::time::Duration;
use std::{fs, thread};

fn spawn_server(config: Config, port: u16) {
    thread::spawn(move || {
        let mut server = Server::new(config, "127.0.0.1", port).unwrap();
        server.run().unwrap();
    });
    thread::sleep(Duration::from_millis(200));
}

fn request(port: u16, raw: &str) -> String {
    let mut stream = TcpStream::connect(("127.0.0.1", port)).expect("connect to test server");
    stream.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
    stream.write_all(raw.as_bytes()).unwrap();

    let mut response = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        match stream.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => response.extend_from_slice(&buf[..n]),
            Err(_) => break,
        }
    }
    String::from_utf8_lossy(&response).into_owned()
}

fn test_host(port: u16) -> (Config, std::path::PathBuf) {
    let dir = std::env::temp_dir().join(format!("server_proxy_integration_{}", port));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("index.html"), "Hello\n").unwrap();

    let mut host = HostConfig::default();
    host.server_name = "_".to_string();
    host.home_dir = dir.to_string_lossy().to_string();

    let config = Config {
        host: "127.0.0.1".to_string(),
        port,
        hosts: vec![host],
    };
    (config, dir)
}

#[test]
fn serves_static_index_file() {
    let (config, _dir) = test_host(18080);
    spawn_server(config, 18080);

    let response = request(18080, "GET / HTTP/1.0\r\nHost: localhost\r\n\r\n");
    assert!(response.starts_with("HTTP/1.0 200 OK\r\n"));
    assert!(response.ends_with("Hello\n"));
}

#[test]
fn missing_file_returns_404() {
    let (config, _dir) = test_host(18081);
    spawn_server(config, 18081);

    let response = request(18081, "GET /nope.html HTTP/1.0\r\nHost: localhost\r\n\r\n");
    assert!(response.starts_with("HTTP/1.0 404 Not Found\r\n"));
}

#[test]
fn post_echoes_body() {
    let (config, _dir) = test_host(18082);
    spawn_server(config, 18082);

    let body = "ping";
    let req = format!(
        "POST /echo HTTP/1.0\r\nHost: localhost\r\nContent-Length: {}\r\n\r\n{}",
        body.len(),
        body
    );
    let response = request(18082, &req);
    assert!(response.starts_with("HTTP/1.0 200 OK\r\n"));
    assert!(response.contains("<pre>\nping\n</pre>"));
}

#[test]
fn put_is_not_implemented() {
    let (config, _dir) = test_host(18083);
    spawn_server(config, 18083);

    let response = request(18083, "PUT /index.html HTTP/1.0\r\nHost: localhost\r\n\r\n");
    assert!(response.starts_with("HTTP/1.0 501 Not Implemented\r\n"));
}

#[test]
fn unrecognized_method_is_not_implemented() {
    let (config, _dir) = test_host(18086);
    spawn_server(config, 18086);

    let response = request(18086, "PATCH /index.html HTTP/1.0\r\nHost: localhost\r\n\r\n");
    assert!(response.starts_with("HTTP/1.0 501 Not Implemented\r\n"));
    assert!(response.contains("PATCH not implemented"));
}

#[test]
fn head_request_has_no_body() {
    let (config, _dir) = test_host(18084);
    spawn_server(config, 18084);

    let response = request(18084, "HEAD /index.html HTTP/1.0\r\nHost: localhost\r\n\r\n");
    assert!(response.starts_with("HTTP/1.0 200 OK\r\n"));
    assert!(response.contains("Content-Length: 6\r\n"));
    assert!(response.ends_with("\r\n\r\n"));
}

#[test]
fn unknown_host_header_falls_back_to_wildcard() {
    let (config, _dir) = test_host(18085);
    spawn_server(config, 18085);

    let response = request(18085, "GET / HTTP/1.0\r\nHost: anything.invalid\r\n\r\n");
    assert!(response.starts_with("HTTP/1.0 200 OK\r\n"));
}
