//! CGI launcher and output parser (§4.9). Buffers the full CGI stdout
//! before responding rather than streaming it (§9 design note, Backpressure
//! for CGI: "this implementation takes the buffer-first option").

use crate::prelude::*;

/// Process-wide identity installed once at startup, reused for every CGI
/// invocation's SERVER_* metavariables.
#[derive(Debug, Clone)]
pub struct ServerIdentity {
    pub server_name: String,
    pub server_port: u16,
}

pub const SERVER_SOFTWARE: &str = "server_proxy/0.1";
pub const SERVER_PROTOCOL: &str = "HTTP/1.0";

pub fn build_cgi_env(
    req: &HttpRequest,
    host: &HostConfig,
    identity: &ServerIdentity,
    peer_addr: SocketAddr,
    script_path: &Path,
) -> HashMap<String, String> {
    let mut env = HashMap::new();

    env.insert("SERVER_NAME".into(), identity.server_name.clone());
    env.insert("SERVER_SOFTWARE".into(), SERVER_SOFTWARE.to_string());
    env.insert("SERVER_PROTOCOL".into(), SERVER_PROTOCOL.to_string());
    env.insert("SERVER_PORT".into(), identity.server_port.to_string());

    env.insert("DOCUMENT_ROOT".into(), host.home_dir.clone());
    if let Some(ua) = req.headers.get("user-agent") {
        env.insert("HTTP_USER_AGENT".into(), ua.to_string());
    }
    if let Some(h) = req.headers.get("host") {
        env.insert("HTTP_HOST".into(), h.to_string());
    }
    env.insert(
        "SCRIPT_FILENAME".into(),
        script_path.to_string_lossy().to_string(),
    );
    env.insert("REQUEST_METHOD".into(), req.method.to_string());
    env.insert("SCRIPT_NAME".into(), req.path.clone());
    env.insert("REQUEST_URI".into(), req.uri.clone());
    env.insert("QUERY_STRING".into(), req.query.clone());
    if let Some(ct) = req.headers.get("content-type") {
        env.insert("CONTENT_TYPE".into(), ct.to_string());
    }
    env.insert(
        "CONTENT_LENGTH".into(),
        req.headers.get("content-length").unwrap_or("0").to_string(),
    );
    env.insert("REMOTE_ADDR".into(), peer_addr.ip().to_string());
    env.insert("REMOTE_PORT".into(), peer_addr.port().to_string());

    env
}

/// Spawns `script_path` as a CGI child. Returns the child, the read end of
/// its stdout, and the write end of its stdin, both already in non-blocking
/// mode and ready to be registered with a `mio::Poll`.
pub fn spawn_cgi(
    script_path: &Path,
    env: HashMap<String, String>,
) -> io::Result<(std::process::Child, std::os::unix::net::UnixStream, std::os::unix::net::UnixStream)> {
    let (server_out, script_out) = std::os::unix::net::UnixStream::pair()?;
    let (server_in, script_in) = std::os::unix::net::UnixStream::pair()?;

    server_out.set_nonblocking(true)?;
    server_in.set_nonblocking(true)?;

    let script_out_file = unsafe { File::from_raw_fd(script_out.into_raw_fd()) };
    let script_in_file = unsafe { File::from_raw_fd(script_in.into_raw_fd()) };

    let child = Command::new(script_path)
        .env_clear()
        .envs(env)
        .stdin(Stdio::from(script_in_file))
        .stdout(Stdio::from(script_out_file))
        .stderr(Stdio::inherit())
        .spawn()?;

    Ok((child, server_out, server_in))
}

/// Parses a fully-buffered CGI stdout stream (§4.9): a header block up to
/// the first blank line, then the body. `Status: <code> <text>` is honored
/// if present; absent headers default to 200 OK.
pub fn parse_cgi_output(raw: &[u8]) -> (u16, Vec<(String, String)>, Vec<u8>) {
    let (header_end, delim_len) = match find_subsequence(raw, b"\r\n\r\n", 0) {
        Some(pos) => (pos, 4),
        None => match find_subsequence(raw, b"\n\n", 0) {
            Some(pos) => (pos, 2),
            None => return (200, Vec::new(), raw.to_vec()),
        },
    };

    let header_section = String::from_utf8_lossy(&raw[..header_end]).into_owned();
    let body = raw[header_end + delim_len..].to_vec();

    let mut status = 200;
    let mut headers = Vec::new();
    for line in header_section.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim();
        let value = value.trim().to_string();
        if key.eq_ignore_ascii_case("status") {
            status = value
                .split_whitespace()
                .next()
                .and_then(|s| s.parse().ok())
                .unwrap_or(200);
        } else {
            headers.push((key.to_string(), value));
        }
    }

    (status, headers, body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_headers_and_body() {
        let raw = b"Content-Type: text/plain\r\nStatus: 404 Not Found\r\n\r\nmissing";
        let (status, headers, body) = parse_cgi_output(raw);
        assert_eq!(status, 404);
        assert!(headers.iter().any(|(k, v)| k == "Content-Type" && v == "text/plain"));
        assert_eq!(body, b"missing");
    }

    #[test]
    fn defaults_to_200_when_headers_missing() {
        let raw = b"just a body, no header block";
        let (status, headers, body) = parse_cgi_output(raw);
        assert_eq!(status, 200);
        assert!(headers.is_empty());
        assert_eq!(body, raw);
    }
}
