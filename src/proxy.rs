//! Reverse proxy back-end (§4.10). Opens a non-blocking upstream connection;
//! byte forwarding itself happens in the selector loop's role handlers since
//! it shares the same read/write/drain machinery as every other role.

use crate::prelude::*;

/// Resolves `host:port` and opens a non-blocking connection to it. The
/// connect itself may still be in progress when this returns — the first
/// writable event on the returned stream is the connect-completion signal.
pub fn connect_upstream(proxy_host: &str) -> Result<TcpStream> {
    use std::net::ToSocketAddrs;

    let addr = proxy_host
        .to_socket_addrs()
        .map_err(|e| format!("resolving proxy_host '{}': {}", proxy_host, e))?
        .next()
        .ok_or_else(|| format!("no address found for proxy_host '{}'", proxy_host))?;

    let stream = TcpStream::connect(addr)
        .map_err(|e| format!("connecting to proxy_host '{}': {}", proxy_host, e))?;
    Ok(stream)
}
