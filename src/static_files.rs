//! Static-file back-end (§4.8).

use crate::prelude::*;

const DEFAULT_FILES: &[&str] = &["/index.html", "/index.htm", "/default.html", "/default.htm"];

pub fn serve(method: Method, path: &str, body: &[u8], host: &HostConfig) -> HttpResponse {
    match method {
        Method::Get | Method::Head => serve_get(path, host),
        Method::Post => serve_post_echo(body),
        Method::Put | Method::Delete | Method::Other(_) => method_not_implemented(method),
        // Any token outside GET/HEAD/POST falls through here, including
        // methods PUT/DELETE never special-case and ones the parser has
        // never seen before (Open Question 9.5).
    }
}

fn serve_get(path: &str, host: &HostConfig) -> HttpResponse {
    if path.is_empty() || path == "/" {
        for candidate in DEFAULT_FILES {
            let full = Path::new(&host.home_dir).join(candidate.trim_start_matches('/'));
            if let Ok(content) = fs::read(&full) {
                let mut res = HttpResponse::new(200, "OK");
                res.set_body(content, "text/html");
                return res;
            }
        }
        return not_found(path);
    }

    let full = Path::new(&host.home_dir).join(path.trim_start_matches('/'));
    match fs::read(&full) {
        Ok(content) => {
            let ext = full.extension().and_then(|e| e.to_str());
            let mut res = HttpResponse::new(200, "OK");
            res.set_body(content, crate::mime::get_mime_type(ext));
            res
        }
        Err(_) => not_found(path),
    }
}

fn not_found(path: &str) -> HttpResponse {
    let mut res = HttpResponse::new(HTTP_NOT_FOUND, status_text(HTTP_NOT_FOUND));
    let body = format!("File not found '{}'", path).into_bytes();
    res.set_body(body, "text/plain");
    res
}

/// POST echoes the request body verbatim inside a minimal HTML wrapper
/// (§4.8); this is the intentional test behavior, not a real upload path.
fn serve_post_echo(body: &[u8]) -> HttpResponse {
    let mut html = b"<pre>\n".to_vec();
    html.extend_from_slice(body);
    html.extend_from_slice(b"\n</pre>");
    let mut res = HttpResponse::new(200, "OK");
    res.set_body(html, "text/html");
    res
}

/// Custom error body for `code`, from the host's `error_pages` map (§6c).
/// Falls back silently (returns `None`) when the code has no entry or the
/// file isn't readable, leaving the caller's default body in place.
pub fn custom_error_page(host: &HostConfig, code: u16) -> Option<(Vec<u8>, &'static str)> {
    let path = host.error_pages.get(&code)?;
    let content = fs::read(path).ok()?;
    let ext = Path::new(path).extension().and_then(|e| e.to_str());
    Some((content, crate::mime::get_mime_type(ext)))
}

fn method_not_implemented(method: Method) -> HttpResponse {
    let mut res = HttpResponse::new(HTTP_NOT_IMPLEMENTED, status_text(HTTP_NOT_IMPLEMENTED));
    let body = format!("{} not implemented", method.as_str()).into_bytes();
    res.set_body(body, "text/plain");
    res
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host_with_tmpdir() -> (HostConfig, std::path::PathBuf) {
        let dir = std::env::temp_dir().join(format!("server_proxy_static_test_{}", std::process::id()));
        let _ = fs::create_dir_all(&dir);
        let mut host = HostConfig::default();
        host.home_dir = dir.to_string_lossy().to_string();
        (host, dir)
    }

    #[test]
    fn serves_index_html_by_default() {
        let (host, dir) = host_with_tmpdir();
        fs::write(dir.join("index.html"), "hello\n").unwrap();
        let res = serve(Method::Get, "/", b"", &host);
        assert_eq!(res.status_code, 200);
        assert_eq!(res.body, b"hello\n");
    }

    #[test]
    fn missing_file_is_404_with_path_named() {
        let (host, _dir) = host_with_tmpdir();
        let res = serve(Method::Get, "/missing", b"", &host);
        assert_eq!(res.status_code, 404);
        assert!(String::from_utf8_lossy(&res.body).contains("File not found '/missing'"));
    }

    #[test]
    fn post_echoes_body_in_pre_block() {
        let (host, _dir) = host_with_tmpdir();
        let res = serve(Method::Post, "/echo", b"ABCDE", &host);
        assert_eq!(res.status_code, 200);
        assert!(String::from_utf8_lossy(&res.body).contains("<pre>\nABCDE\n</pre>"));
    }

    #[test]
    fn put_and_delete_are_501() {
        let (host, _dir) = host_with_tmpdir();
        for m in [Method::Put, Method::Delete] {
            let res = serve(m, "/x", b"", &host);
            assert_eq!(res.status_code, 501);
        }
    }

    #[test]
    fn unrecognized_method_is_501() {
        let (host, _dir) = host_with_tmpdir();
        let res = serve(Method::Other("PATCH".to_string()), "/x", b"", &host);
        assert_eq!(res.status_code, 501);
        assert!(String::from_utf8_lossy(&res.body).contains("PATCH not implemented"));
    }

    #[test]
    fn head_serves_like_get() {
        let (host, dir) = host_with_tmpdir();
        fs::write(dir.join("index.html"), "hello\n").unwrap();
        let res = serve(Method::Head, "/index.html", b"", &host);
        assert_eq!(res.status_code, 200);
        assert_eq!(res.body, b"hello\n");
    }

    #[test]
    fn custom_error_page_overrides_default_body() {
        let (mut host, dir) = host_with_tmpdir();
        let err_path = dir.join("404.html");
        fs::write(&err_path, "<h1>not here</h1>").unwrap();
        host.error_pages
            .insert(404, err_path.to_string_lossy().to_string());

        let (body, content_type) = custom_error_page(&host, 404).unwrap();
        assert_eq!(body, b"<h1>not here</h1>");
        assert_eq!(content_type, "text/html");
    }

    #[test]
    fn custom_error_page_absent_returns_none() {
        let (host, _dir) = host_with_tmpdir();
        assert!(custom_error_page(&host, 404).is_none());
    }
}
