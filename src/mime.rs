//! Extension -> content-type lookup used by the static file back-end.

pub fn get_mime_type(extension: Option<&str>) -> &'static str {
    match extension {
        Some("html") | Some("htm") => "text/html",
        Some("css") => "text/css",
        Some("js") => "application/javascript",
        Some("json") => "application/json",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        Some("ico") => "image/x-icon",
        Some("txt") => "text/plain",
        Some("pdf") => "application/pdf",
        Some("xml") => "application/xml",
        Some("zip") => "application/zip",
        Some("mp4") => "video/mp4",
        Some("mp3") => "audio/mpeg",
        _ => "text/plain",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_extensions() {
        assert_eq!(get_mime_type(Some("html")), "text/html");
        assert_eq!(get_mime_type(Some("png")), "image/png");
    }

    #[test]
    fn unknown_extension_falls_back() {
        assert_eq!(get_mime_type(Some("xyz")), "text/plain");
        assert_eq!(get_mime_type(None), "text/plain");
    }
}
