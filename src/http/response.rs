use crate::prelude::*;

#[derive(Debug)]
pub struct HttpResponse {
    pub version: String,
    pub status_code: u16,
    pub status_text: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    /// Finalized status line + headers (§4.4). Populated once by `finalize`;
    /// `add_header`/`set_header` after that point are no-ops on the wire image.
    pub head: Vec<u8>,
    finalized: bool,
}

impl HttpResponse {
    pub fn new(status_code: u16, status_text: &str) -> Self {
        Self {
            version: "HTTP/1.0".to_string(),
            status_code,
            status_text: status_text.to_string(),
            headers: Vec::new(),
            body: Vec::new(),
            head: Vec::new(),
            finalized: false,
        }
    }

    /// Appends a header; duplicate keys are allowed (§4.4).
    pub fn add_header(&mut self, key: &str, value: &str) -> &mut Self {
        if self.finalized {
            return self;
        }
        self.headers.push((key.to_string(), value.to_string()));
        self
    }

    /// Replaces the first header matching `key` (case-insensitive), or
    /// appends if absent.
    pub fn set_header(&mut self, key: &str, value: &str) -> &mut Self {
        if self.finalized {
            return self;
        }
        if let Some(h) = self.headers.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(key)) {
            h.1 = value.to_string();
        } else {
            self.headers.push((key.to_string(), value.to_string()));
        }
        self
    }

    fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    pub fn set_status_code(&mut self, code: u16) -> &mut Self {
        self.status_code = code;
        self.status_text = status_text(code).to_string();
        self
    }

    pub fn set_body(&mut self, body: Vec<u8>, content_type: &str) -> &mut Self {
        if self.finalized {
            return self;
        }
        self.set_header("Content-Type", content_type);
        self.body = body;
        self
    }

    /// Renders the status line + headers into `head`, auto-adding
    /// Content-Length, Date, and Server when not already set. Idempotent:
    /// a second call is a no-op (§8 idempotence invariant).
    pub fn finalize(&mut self, is_head_request: bool) {
        if self.finalized {
            return;
        }

        if self.header("Content-Length").is_none() {
            self.set_header("Content-Length", &self.body.len().to_string());
        }
        if self.header("Date").is_none() {
            self.set_header("Date", &httpdate::fmt_http_date(SystemTime::now()));
        }
        if self.header("Server").is_none() {
            self.set_header("Server", "server_proxy/0.1");
        }

        let mut head = format!("{} {} {}\r\n", self.version, self.status_code, self.status_text)
            .into_bytes();
        for (k, v) in &self.headers {
            head.extend_from_slice(format!("{}: {}\r\n", k, v).as_bytes());
        }
        head.extend_from_slice(b"\r\n");
        self.head = head;
        self.finalized = true;

        if is_head_request {
            self.body.clear();
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = self.head.clone();
        out.extend_from_slice(&self.body);
        out
    }
}

pub fn status_text(code: u16) -> &'static str {
    match code {
        200 => "OK",
        201 => "Created",
        204 => "No Content",
        301 => "Moved Permanently",
        302 => "Found",
        303 => "See Other",
        307 => "Temporary Redirect",
        308 => "Permanent Redirect",
        HTTP_BAD_REQUEST => "Bad Request",
        403 => "Forbidden",
        HTTP_NOT_FOUND => "Not Found",
        HTTP_METHOD_NOT_ALLOWED => "Method Not Allowed",
        HTTP_PAYLOAD_TOO_LARGE => "Payload Too Large",
        HTTP_URI_TOO_LONG => "URI Too Long",
        HTTP_INTERNAL_SERVER_ERROR => "Internal Server Error",
        HTTP_NOT_IMPLEMENTED => "Not Implemented",
        GATEWAY_TIMEOUT => "Gateway Timeout",
        _ => "Unknown",
    }
}

/// Builds a plain-text error response body naming `detail` (§7).
pub fn error_response(code: u16, detail: &str) -> HttpResponse {
    let mut res = HttpResponse::new(code, status_text(code));
    let body = format!("{} {}: {}", code, status_text(code), detail).into_bytes();
    res.set_body(body, "text/plain");
    res
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finalize_is_idempotent() {
        let mut res = HttpResponse::new(200, "OK");
        res.set_body(b"hello\n".to_vec(), "text/html");
        res.finalize(false);
        let head_after_first = res.head.clone();

        res.add_header("X-Late", "nope");
        res.finalize(false);

        assert_eq!(res.head, head_after_first);
        assert!(!res.headers.iter().any(|(k, _)| k == "X-Late"));
    }

    #[test]
    fn head_request_clears_body_but_keeps_content_length() {
        let mut res = HttpResponse::new(200, "OK");
        res.set_body(b"hello\n".to_vec(), "text/html");
        res.finalize(true);

        assert!(res.body.is_empty());
        assert!(String::from_utf8_lossy(&res.head).contains("Content-Length: 6"));
    }

    #[test]
    fn auto_headers_added_once() {
        let mut res = HttpResponse::new(200, "OK");
        res.finalize(false);
        let text = String::from_utf8_lossy(&res.head);
        assert!(text.contains("Content-Length: 0"));
        assert!(text.contains("Date:"));
        assert!(text.contains("Server:"));
    }
}
