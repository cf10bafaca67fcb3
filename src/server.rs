//! Selector loop (§4.5) and role handlers (§4.6-4.12). Single-threaded,
//! cooperative, one blocking call per pass (§5).

use crate::cgi::{self, ServerIdentity};
use crate::context::{CgiInputContext, CgiState, Context, Role};
use crate::prelude::*;
use crate::proxy;
use crate::static_files;

const LISTENER: Token = Token(0);
const CLIENT_TIMEOUT: Duration = Duration::from_secs(60);
const CGI_TIMEOUT: Duration = Duration::from_secs(30);
const SWEEP_INTERVAL: Duration = Duration::from_millis(250);

pub struct Server {
    poll: Poll,
    listener: TcpListener,
    config: Config,
    identity: ServerIdentity,
    contexts: HashMap<Token, Context>,
    cgi_inputs: HashMap<Token, CgiInputContext>,
    next_token: usize,
    last_sweep: Instant,
}

impl Server {
    pub fn new(config: Config, host: &str, port: u16) -> Result<Self> {
        let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
        let mut listener = TcpListener::bind(addr)?;
        let poll = Poll::new()?;
        poll.registry()
            .register(&mut listener, LISTENER, Interest::READABLE)?;

        Ok(Server {
            poll,
            listener,
            identity: ServerIdentity {
                server_name: host.to_string(),
                server_port: port,
            },
            config,
            contexts: HashMap::new(),
            cgi_inputs: HashMap::new(),
            next_token: 1,
            last_sweep: Instant::now(),
        })
    }

    fn alloc_token(&mut self) -> Token {
        let t = Token(self.next_token);
        self.next_token += 1;
        t
    }

    pub fn run(&mut self) -> Result<()> {
        let mut events = Events::with_capacity(1024);
        loop {
            match self.poll.poll(&mut events, None) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }

            for event in events.iter() {
                let token = event.token();
                if token == LISTENER {
                    self.accept_connections();
                    continue;
                }

                if self.contexts.contains_key(&token) {
                    self.dispatch(token, event);
                } else if self.cgi_inputs.contains_key(&token) {
                    self.handle_write_cgi_input(token);
                } else {
                    errors!("event on unknown token {:?}, ignoring", token);
                }
            }

            self.reap_cgi_children();
            self.sweep_deadlines();
        }
    }

    fn accept_connections(&mut self) {
        loop {
            match self.listener.accept() {
                Ok((mut stream, addr)) => {
                    let token = self.alloc_token();
                    if let Err(e) = self
                        .poll
                        .registry()
                        .register(&mut stream, token, Interest::READABLE)
                    {
                        errors!("failed to register accepted connection: {}", e);
                        continue;
                    }
                    info!("accepted connection from {}", addr);
                    self.contexts.insert(token, Context::new_client(stream, addr));
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) => {
                    errors!("accept failed: {}", e);
                    break;
                }
            }
        }
    }

    fn dispatch(&mut self, token: Token, event: &Event) {
        let role = self.contexts.get(&token).map(|c| c.role);
        match role {
            Some(Role::ReadReq) => self.handle_read_req(token),
            Some(Role::WriteResp) => self.handle_write_resp(token),
            Some(Role::ReadCgiOutput) => self.handle_read_cgi_output(token, event),
            Some(Role::ProxyWriteReq) => self.handle_proxy_write_req(token),
            Some(Role::ProxyReadResp) => self.handle_proxy_read_resp(token),
            Some(Role::ProxyWriteResp) => self.handle_proxy_write_resp(token),
            Some(Role::WriteCgiInput) => {} // lives in cgi_inputs, not contexts
            None => {}
        }
    }

    // ---- READ_REQ (§4.6) ----

    fn handle_read_req(&mut self, token: Token) {
        let Some(ctx) = self.contexts.get_mut(&token) else { return };
        let mut buf = [0u8; READ_BUF_SIZE];
        let mut eof = false;

        loop {
            match ctx.client.read(&mut buf) {
                Ok(0) => {
                    eof = true;
                    break;
                }
                Ok(n) => {
                    ctx.request.buffer.extend_from_slice(&buf[..n]);
                    ctx.touch();
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(_) => {
                    eof = true;
                    break;
                }
            }
        }

        let max_body = self
            .config
            .resolve(ctx.request.headers.get("host"))
            .map(|h| h.client_max_body_size)
            .unwrap_or(_1MB);

        match ctx.request.feed(max_body) {
            Ok(()) => {
                if eof {
                    ctx.request.force_done_on_eof();
                }
                self.process_request(token);
            }
            Err(ParseError::Incomplete) => {
                if eof {
                    ctx.request.force_done_on_eof();
                    if ctx.request.state == ParsingState::Done {
                        self.process_request(token);
                    } else {
                        self.terminate(token);
                    }
                }
            }
            Err(ParseError::PayloadTooLarge) => {
                self.respond_error(token, HTTP_PAYLOAD_TOO_LARGE, "request body too large");
            }
            Err(e) => {
                self.respond_error(token, HTTP_BAD_REQUEST, &e.to_string());
            }
        }
    }

    /// §4.7 process_request dispatcher.
    fn process_request(&mut self, token: Token) {
        let Some(ctx) = self.contexts.get_mut(&token) else { return };

        let host = match self.config.resolve(ctx.request.headers.get("host")).cloned() {
            Some(h) => h,
            None => {
                drop(ctx);
                self.respond_error(token, HTTP_NOT_FOUND, "no matching host");
                return;
            }
        };
        ctx.host = Some(host.clone());

        if !host.proxy_host.is_empty() {
            self.start_proxy(token, host);
            return;
        }

        if host.home_dir.is_empty() {
            drop(ctx);
            self.respond_error(token, HTTP_NOT_FOUND, "host has no document root");
            return;
        }

        let mut path = ctx.request.path.clone();
        if let Some(mapped) = host.aliases.get(&path) {
            path = mapped.clone();
        }

        if !host.cgi_dir.is_empty() && path.starts_with(&host.cgi_dir) {
            let script_path = Path::new(&host.home_dir).join(path.trim_start_matches('/'));
            if script_path.is_file() {
                self.launch_cgi(token, &host, &script_path);
                return;
            }
        }

        let method = ctx.request.method.clone();
        let body = ctx.request.body.clone();
        let response = static_files::serve(method, &path, &body, &host);
        self.finish_response(token, response);
    }

    fn respond_error(&mut self, token: Token, code: u16, detail: &str) {
        let response = error_response(code, detail);
        self.finish_response(token, response);
    }

    /// §4.11 process_response: finalize, clear body on HEAD, log, and
    /// transition to WRITE_RESP.
    fn finish_response(&mut self, token: Token, mut response: HttpResponse) {
        let Some(ctx) = self.contexts.get_mut(&token) else { return };

        if response.status_code >= 400 {
            if let Some(host) = &ctx.host {
                if let Some((body, content_type)) = static_files::custom_error_page(host, response.status_code) {
                    response.set_body(body, content_type);
                }
            }
        }

        let is_head = ctx.request.method == Method::Head;
        response.finalize(is_head);

        info!(
            "{} [{}] \"{} {} {}\" {}",
            ctx.client_addr.ip(),
            httpdate::fmt_http_date(SystemTime::now()),
            ctx.request.method,
            ctx.request.uri,
            ctx.request.version,
            response.status_code
        );
        if (500..600).contains(&response.status_code) {
            info!("  -> {}", response.status_text);
        }

        ctx.write_buf = response.to_bytes();
        ctx.response = response;
        ctx.role = Role::WriteResp;

        if let Err(e) = self
            .poll
            .registry()
            .reregister(&mut ctx.client, token, Interest::WRITABLE)
        {
            errors!("reregister for write failed: {}", e);
            self.terminate(token);
        }
    }

    // ---- WRITE_RESP (§4.11) ----

    fn handle_write_resp(&mut self, token: Token) {
        let Some(ctx) = self.contexts.get_mut(&token) else { return };
        match drain_write(&mut ctx.client, &mut ctx.write_buf) {
            DrainResult::Done => self.terminate(token),
            DrainResult::Pending => {}
            DrainResult::Err => self.terminate(token),
        }
    }

    // ---- CGI (§4.9) ----

    fn launch_cgi(&mut self, token: Token, host: &HostConfig, script_path: &Path) {
        let Some(ctx) = self.contexts.get_mut(&token) else { return };

        let env = cgi::build_cgi_env(&ctx.request, host, &self.identity, ctx.client_addr, script_path);
        match cgi::spawn_cgi(script_path, env) {
            Ok((child, out, input)) => {
                let body = ctx.request.body.clone();
                let mut out_mio = UnixStream::from_std(out);
                let mut in_mio = UnixStream::from_std(input);

                // Retarget this Context's select_fd from the client socket to
                // the CGI stdout pipe, reusing the same Token.
                let out_token = token;
                let _ = self.poll.registry().deregister(&mut ctx.client);
                if let Err(e) = self.poll.registry().register(&mut out_mio, out_token, Interest::READABLE) {
                    errors!("failed to register cgi stdout pipe: {}", e);
                }

                ctx.role = Role::ReadCgiOutput;
                ctx.cgi = Some(CgiState {
                    child,
                    out_stream: out_mio,
                    out_buf: Vec::new(),
                });

                if !body.is_empty() {
                    let in_token = self.alloc_token();
                    if let Err(e) = self.poll.registry().register(&mut in_mio, in_token, Interest::WRITABLE) {
                        errors!("failed to register cgi stdin: {}", e);
                    }
                    self.cgi_inputs.insert(
                        in_token,
                        CgiInputContext {
                            stream: in_mio,
                            buf: body,
                            parent: token,
                        },
                    );
                } // else: empty body, drop in_mio immediately (half-closes stdin).
            }
            Err(e) => {
                drop(ctx);
                self.respond_error(token, HTTP_INTERNAL_SERVER_ERROR, &format!("cgi spawn failed: {}", e));
            }
        }
    }

    fn handle_write_cgi_input(&mut self, token: Token) {
        let done = {
            let Some(aux) = self.cgi_inputs.get_mut(&token) else { return };
            match drain_write(&mut aux.stream, &mut aux.buf) {
                DrainResult::Done => true,
                DrainResult::Pending => false,
                DrainResult::Err => {
                    warn!("cgi stdin write failed for parent {:?}, abandoning", aux.parent);
                    true
                }
            }
        };
        if done {
            if let Some(mut aux) = self.cgi_inputs.remove(&token) {
                let _ = self.poll.registry().deregister(&mut aux.stream);
            }
        }
    }

    fn handle_read_cgi_output(&mut self, token: Token, _event: &Event) {
        let Some(ctx) = self.contexts.get_mut(&token) else { return };
        let Some(cgi) = &mut ctx.cgi else { return };

        let mut buf = [0u8; READ_BUF_SIZE];
        let mut eof = false;
        loop {
            match cgi.out_stream.read(&mut buf) {
                Ok(0) => {
                    eof = true;
                    break;
                }
                Ok(n) => {
                    cgi.out_buf.extend_from_slice(&buf[..n]);
                    ctx.last_activity = Instant::now();
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(_) => {
                    eof = true;
                    break;
                }
            }
        }

        if !eof {
            return;
        }

        let (status, headers, body) = cgi::parse_cgi_output(&ctx.cgi.as_ref().unwrap().out_buf);
        let mut response = HttpResponse::new(status, status_text(status));
        for (k, v) in headers {
            response.set_header(&k, &v);
        }
        response.set_body(body, response_content_type(&response));

        let mut cgi = ctx.cgi.take().unwrap();
        let _ = self.poll.registry().deregister(&mut cgi.out_stream);
        // stdout EOF means the script has exited or is exiting; wait() reaps
        // it instead of leaving a zombie for reap_cgi_children to miss.
        match cgi.child.wait() {
            Ok(status) if !status.success() => {
                warn!("cgi script for {:?} exited with {}", token, status);
            }
            Err(e) => errors!("failed to reap cgi child for {:?}: {}", token, e),
            _ => {}
        }
        if let Err(e) = self.poll.registry().register(&mut ctx.client, token, Interest::WRITABLE) {
            errors!("failed to re-register client after cgi: {}", e);
        }
        self.finish_response(token, response);
    }

    // ---- Reverse proxy (§4.10) ----

    fn start_proxy(&mut self, token: Token, host: HostConfig) {
        let Some(ctx) = self.contexts.get_mut(&token) else { return };
        ctx.request.materialize_head();

        match proxy::connect_upstream(&host.proxy_host) {
            Ok(mut upstream) => {
                let mut head_and_body = ctx.request.head_bytes.clone();
                head_and_body.extend_from_slice(&ctx.request.body);
                ctx.write_buf = head_and_body;
                ctx.role = Role::ProxyWriteReq;

                let _ = self.poll.registry().deregister(&mut ctx.client);
                if let Err(e) = self.poll.registry().register(&mut upstream, token, Interest::WRITABLE) {
                    errors!("failed to register proxy upstream: {}", e);
                }
                ctx.proxy_stream = Some(upstream);
            }
            Err(e) => {
                drop(ctx);
                self.respond_error(token, HTTP_INTERNAL_SERVER_ERROR, &format!("proxy connect failed: {}", e));
            }
        }
    }

    fn handle_proxy_write_req(&mut self, token: Token) {
        let Some(ctx) = self.contexts.get_mut(&token) else { return };
        let Some(upstream) = &mut ctx.proxy_stream else { return };
        match drain_write(upstream, &mut ctx.write_buf) {
            DrainResult::Done => {
                ctx.role = Role::ProxyReadResp;
                if let Err(e) = self.poll.registry().reregister(
                    ctx.proxy_stream.as_mut().unwrap(),
                    token,
                    Interest::READABLE,
                ) {
                    errors!("failed to reregister upstream for read: {}", e);
                }
            }
            DrainResult::Pending => {}
            DrainResult::Err => self.terminate(token),
        }
    }

    fn handle_proxy_read_resp(&mut self, token: Token) {
        let Some(ctx) = self.contexts.get_mut(&token) else { return };
        let Some(upstream) = &mut ctx.proxy_stream else { return };

        let mut buf = [0u8; READ_BUF_SIZE];
        let mut eof = false;
        loop {
            match upstream.read(&mut buf) {
                Ok(0) => {
                    eof = true;
                    break;
                }
                Ok(n) => {
                    ctx.proxy_buf.extend_from_slice(&buf[..n]);
                    ctx.last_activity = Instant::now();
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(_) => {
                    eof = true;
                    break;
                }
            }
        }

        if !eof {
            return;
        }

        let _ = self.poll.registry().deregister(ctx.proxy_stream.as_mut().unwrap());
        ctx.proxy_stream = None;
        ctx.write_buf = std::mem::take(&mut ctx.proxy_buf);
        ctx.role = Role::ProxyWriteResp;
        if let Err(e) = self.poll.registry().register(&mut ctx.client, token, Interest::WRITABLE) {
            errors!("failed to register client for proxy response: {}", e);
        }
    }

    fn handle_proxy_write_resp(&mut self, token: Token) {
        let Some(ctx) = self.contexts.get_mut(&token) else { return };
        match drain_write(&mut ctx.client, &mut ctx.write_buf) {
            DrainResult::Done => self.terminate(token),
            DrainResult::Pending => {}
            DrainResult::Err => self.terminate(token),
        }
    }

    // ---- Teardown (§4.12) ----

    fn terminate(&mut self, token: Token) {
        if let Some(mut ctx) = self.contexts.remove(&token) {
            let _ = self.poll.registry().deregister(&mut ctx.client);
            if let Some(cgi) = &mut ctx.cgi {
                let _ = cgi.child.kill();
                let _ = cgi.child.wait();
                let _ = self.poll.registry().deregister(&mut cgi.out_stream);
            }
            if let Some(upstream) = &mut ctx.proxy_stream {
                let _ = self.poll.registry().deregister(upstream);
            }
            self.cgi_inputs.retain(|_, aux| aux.parent != token);
        }
    }

    // ---- §5 deadline sweep & child reaping ----

    fn sweep_deadlines(&mut self) {
        if self.last_sweep.elapsed() < SWEEP_INTERVAL {
            return;
        }
        self.last_sweep = Instant::now();

        let stale: Vec<Token> = self
            .contexts
            .iter()
            .filter(|(_, ctx)| {
                let timeout = if ctx.cgi.is_some() { CGI_TIMEOUT } else { CLIENT_TIMEOUT };
                ctx.last_activity.elapsed() > timeout
            })
            .map(|(t, _)| *t)
            .collect();

        for token in stale {
            warn!("terminating stalled connection {:?}", token);
            self.terminate(token);
        }
    }

    fn reap_cgi_children(&mut self) {
        for ctx in self.contexts.values_mut() {
            if let Some(cgi) = &mut ctx.cgi {
                match cgi.child.try_wait() {
                    Ok(Some(_status)) | Err(_) => {}
                    Ok(None) => {}
                }
            }
        }
    }
}

enum DrainResult {
    Done,
    Pending,
    Err,
}

fn drain_write<W: Write>(writer: &mut W, buf: &mut Vec<u8>) -> DrainResult {
    loop {
        if buf.is_empty() {
            return DrainResult::Done;
        }
        match writer.write(buf) {
            Ok(0) => return DrainResult::Err,
            Ok(n) => {
                buf.drain(..n);
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => return DrainResult::Pending,
            Err(_) => return DrainResult::Err,
        }
    }
}

fn response_content_type(response: &HttpResponse) -> &str {
    response
        .headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("content-type"))
        .map(|(_, v)| v.as_str())
        .unwrap_or("text/plain")
}
