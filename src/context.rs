use crate::prelude::*;

/// Role tag for a Context (§3). Each selector pass dispatches a ready token
/// to the handler named by its Context's role rather than via virtual
/// dispatch (§9 "role-tagged contexts vs inheritance").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    ReadReq,
    WriteResp,
    WriteCgiInput,
    ReadCgiOutput,
    ProxyWriteReq,
    ProxyReadResp,
    ProxyWriteResp,
}

pub struct CgiState {
    pub child: std::process::Child,
    pub out_stream: UnixStream,
    pub out_buf: Vec<u8>,
}

impl fmt::Debug for CgiState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CgiState")
            .field("out_buf_len", &self.out_buf.len())
            .finish()
    }
}

/// The per-role record described in §3. A single struct carries every
/// role's fields; only the ones matching `role` are meaningful at any time,
/// per the invariant "exactly one of the buffers matching role is non-null".
#[derive(Debug)]
pub struct Context {
    pub role: Role,
    pub client: TcpStream,
    pub client_addr: SocketAddr,

    pub request: HttpRequest,
    pub response: HttpResponse,
    pub host: Option<HostConfig>,

    /// CGI state, owned by the Context currently reading CGI stdout. The
    /// auxiliary WRITE_CGI_INPUT Context (a distinct Token/registry entry)
    /// holds the write half separately; see `CgiInputContext` below.
    pub cgi: Option<CgiState>,

    pub proxy_stream: Option<TcpStream>,
    pub proxy_buf: Vec<u8>,

    /// Drain buffer reused across whichever write-role is currently active
    /// (WRITE_RESP or PROXY_WRITE_REQ/PROXY_WRITE_RESP never overlap on one
    /// Context), per §9's "per-role buffers co-resident" design.
    pub write_buf: Vec<u8>,

    pub last_activity: Instant,
}

impl Context {
    pub fn new_client(client: TcpStream, client_addr: SocketAddr) -> Self {
        Context {
            role: Role::ReadReq,
            client,
            client_addr,
            request: HttpRequest::new(),
            response: HttpResponse::new(200, "OK"),
            host: None,
            cgi: None,
            proxy_stream: None,
            proxy_buf: Vec::new(),
            write_buf: Vec::new(),
            last_activity: Instant::now(),
        }
    }

    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }
}

/// The auxiliary Context created for `WRITE_CGI_INPUT` (§4.9): a request
/// body large enough to need its own readiness registration gets its own
/// Token, sharing the parent's `client_fd` only conceptually (it owns no
/// client socket itself, only the CGI stdin pipe and the body to drain).
#[derive(Debug)]
pub struct CgiInputContext {
    pub stream: UnixStream,
    pub buf: Vec<u8>,
    /// Token of the owning READ_CGI_OUTPUT Context, used only to log which
    /// request an abandoned pipe belonged to.
    pub parent: Token,
}
