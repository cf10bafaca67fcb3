use crate::prelude::*;

/// Any whitespace-free token in the method position is accepted (§4.3); the
/// five named variants get dedicated handling downstream, everything else
/// carries its literal token through to the generic 501 branch of the
/// static-file back-end (§4.8, §8 scenario 4).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Delete,
    Other(String),
}

impl Method {
    pub fn as_str(&self) -> &str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Other(s) => s,
        }
    }
}

impl FromStr for Method {
    type Err = ParseError;
    fn from_str(s: &str) -> core::result::Result<Self, Self::Err> {
        Ok(match s {
            "GET" => Method::Get,
            "HEAD" => Method::Head,
            "POST" => Method::Post,
            "PUT" => Method::Put,
            "DELETE" => Method::Delete,
            other => Method::Other(other.to_string()),
        })
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Resumable parser state (§4.3): HEAD while reading the request line and
/// headers, BODY while accumulating a declared-length body, DONE once a
/// complete Request is available.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParsingState {
    Head,
    Body,
    Done,
}

const CRLF_LEN: usize = 2;

#[derive(Debug, Clone, PartialEq)]
pub enum ParseError {
    /// Not an error: the reader has no complete line/chunk yet.
    Incomplete,
    MalformedRequestLine,
    MalformedHeader,
    PayloadTooLarge,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Incomplete => write!(f, "incomplete request"),
            ParseError::MalformedRequestLine => write!(f, "malformed request line"),
            ParseError::MalformedHeader => write!(f, "malformed header line"),
            ParseError::PayloadTooLarge => write!(f, "payload too large"),
        }
    }
}

impl std::error::Error for ParseError {}

/// Ordered header list with case-insensitive lookup; duplicate keys append
/// rather than overwrite (§3 Request invariant).
#[derive(Debug, Clone, Default)]
pub struct HeaderMap(pub Vec<(String, String)>);

impl HeaderMap {
    pub fn new() -> Self {
        HeaderMap(Vec::new())
    }

    pub fn push(&mut self, key: String, value: String) {
        self.0.push((key, value));
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &(String, String)> {
        self.0.iter()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }
}

#[derive(Debug)]
pub struct HttpRequest {
    pub method: Method,
    pub uri: String,
    pub path: String,
    pub query: String,
    pub version: String,
    pub headers: HeaderMap,
    /// Raw first-line + headers + trailing CRLF, materialized once by
    /// `materialize_head` when the request is forwarded verbatim (proxy).
    pub head_bytes: Vec<u8>,
    pub body: Vec<u8>,

    // Resumable parser bookkeeping.
    pub buffer: Vec<u8>,
    pub cursor: usize,
    pub state: ParsingState,
    pub content_length: usize,
}

impl Default for HttpRequest {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpRequest {
    pub fn new() -> Self {
        HttpRequest {
            method: Method::Get,
            uri: String::new(),
            path: String::new(),
            query: String::new(),
            version: String::new(),
            headers: HeaderMap::new(),
            head_bytes: Vec::new(),
            body: Vec::new(),
            buffer: Vec::with_capacity(4096),
            cursor: 0,
            state: ParsingState::Head,
            content_length: 0,
        }
    }

    pub fn clear(&mut self) {
        self.method = Method::Get;
        self.uri.clear();
        self.path.clear();
        self.query.clear();
        self.version.clear();
        self.headers.clear();
        self.head_bytes.clear();
        self.body.clear();
        self.buffer.drain(..self.cursor);
        self.cursor = 0;
        self.content_length = 0;
        self.state = ParsingState::Head;
    }

    /// Feeds whatever bytes are currently buffered into the state machine.
    /// Returns `Ok(())` once `state == Done`, or `Err(ParseError::Incomplete)`
    /// when more bytes are needed. Any other error is a *BadRequest* condition.
    pub fn feed(&mut self, max_body_size: usize) -> core::result::Result<(), ParseError> {
        loop {
            match self.state {
                ParsingState::Head => self.parse_head_line(max_body_size)?,
                ParsingState::Body => self.parse_body()?,
                ParsingState::Done => return Ok(()),
            }
        }
    }

    /// Forces the parser to DONE when the underlying socket has closed mid-body
    /// (§4.3: "if the reader reports socket closed and state is BODY, force DONE").
    pub fn force_done_on_eof(&mut self) {
        if self.state == ParsingState::Body {
            let remaining = self.buffer.len() - self.cursor;
            self.body
                .extend_from_slice(&self.buffer[self.cursor..self.cursor + remaining]);
            self.cursor += remaining;
            self.state = ParsingState::Done;
        }
    }

    fn parse_head_line(&mut self, max_body_size: usize) -> core::result::Result<(), ParseError> {
        let Some(abs_index) = find_crlf(&self.buffer, self.cursor) else {
            return Err(ParseError::Incomplete);
        };
        let line = self.buffer[self.cursor..abs_index].to_vec();
        self.cursor = abs_index + CRLF_LEN;

        if !self.request_line_parsed() {
            self.parse_request_line(&line)?;
            return Ok(());
        }

        if line.is_empty() {
            // Blank line: headers are done.
            self.content_length = self
                .headers
                .get("content-length")
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);

            if self.content_length > max_body_size {
                return Err(ParseError::PayloadTooLarge);
            }

            self.buffer.drain(..self.cursor);
            self.cursor = 0;

            if self.content_length == 0 {
                self.state = ParsingState::Done;
            } else {
                self.state = ParsingState::Body;
            }
            return Ok(());
        }

        let text = std::str::from_utf8(&line).map_err(|_| ParseError::MalformedHeader)?;
        let sep = text.find(':').ok_or(ParseError::MalformedHeader)?;
        let key = text[..sep].trim().to_string();
        let value = text[sep + 1..].trim_start().to_string();
        self.headers.push(key, value);
        Ok(())
    }

    /// True once the request line has been consumed (version is non-empty).
    fn request_line_parsed(&self) -> bool {
        !self.version.is_empty()
    }

    fn parse_request_line(&mut self, line: &[u8]) -> core::result::Result<(), ParseError> {
        let text = std::str::from_utf8(line).map_err(|_| ParseError::MalformedRequestLine)?;
        let parts: Vec<&str> = text.split_whitespace().collect();
        if parts.len() != 3 {
            return Err(ParseError::MalformedRequestLine);
        }

        self.method = Method::from_str(parts[0])?;
        self.uri = parts[1].to_string();
        self.version = parts[2].to_string();

        match self.uri.split_once('?') {
            Some((p, q)) => {
                self.path = p.to_string();
                self.query = q.to_string();
            }
            None => {
                self.path = self.uri.clone();
                self.query.clear();
            }
        }
        Ok(())
    }

    fn parse_body(&mut self) -> core::result::Result<(), ParseError> {
        let available = self.buffer.len() - self.cursor;
        let needed = self.content_length - self.body.len();
        let to_take = available.min(needed);

        if to_take > 0 {
            self.body
                .extend_from_slice(&self.buffer[self.cursor..self.cursor + to_take]);
            self.cursor += to_take;
        }

        if self.body.len() >= self.content_length {
            self.buffer.drain(..self.cursor);
            self.cursor = 0;
            self.state = ParsingState::Done;
            Ok(())
        } else {
            Err(ParseError::Incomplete)
        }
    }

    /// Materializes `head_bytes` exactly once (§3 invariant), for verbatim
    /// forwarding to a reverse-proxy upstream.
    pub fn materialize_head(&mut self) {
        if !self.head_bytes.is_empty() {
            return;
        }
        let mut buf = format!("{} {} {}\r\n", self.method, self.uri, self.version).into_bytes();
        for (k, v) in self.headers.iter() {
            buf.extend_from_slice(format!("{}: {}\r\n", k, v).as_bytes());
        }
        buf.extend_from_slice(b"\r\n");
        self.head_bytes = buf;
    }
}

fn find_crlf(buffer: &[u8], start_offset: usize) -> Option<usize> {
    let search_area = buffer.get(start_offset..)?;
    let mut pos = 0;
    while let Some(r) = search_area[pos..].iter().position(|&b| b == b'\r') {
        let abs = pos + r;
        if search_area.get(abs + 1) == Some(&b'\n') {
            return Some(start_offset + abs);
        }
        pos = abs + 1;
    }
    None
}

pub fn find_subsequence(buffer: &[u8], needle: &[u8], start_offset: usize) -> Option<usize> {
    if needle.is_empty() {
        return None;
    }
    let search_area = buffer.get(start_offset..)?;
    let first_byte = needle[0];
    let mut pos = 0;
    while let Some(rel) = search_area[pos..].iter().position(|&b| b == first_byte) {
        let abs = pos + rel;
        match search_area.get(abs..abs + needle.len()) {
            Some(candidate) if candidate == needle => return Some(start_offset + abs),
            Some(_) => {}
            None => return None,
        }
        pos = abs + 1;
    }
    None
}

impl Display for HttpRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} {} {}", self.method, self.uri, self.version)?;
        for (k, v) in self.headers.iter() {
            writeln!(f, "  {}: {}", k, v)?;
        }
        if !self.body.is_empty() {
            writeln!(f, "  <{} byte body>", self.body.len())?;
        }
        Ok(())
    }
}
