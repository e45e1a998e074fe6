//! Minimal HTTP/1.1 codec for the backend exchange.
//!
//! Only what the device needs: a `POST` with a JSON body and
//! `Connection: close`, and a response parser that handles
//! `Content-Length`, chunked bodies, and read-to-EOF bodies.

use core::fmt::Write as _;

use crate::error::ProtocolError;

use super::transport::{HttpRequest, HttpResponse, MAX_RESPONSE_BYTES};

/// Result of feeding the bytes received so far to [`parse_response`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseStatus {
    /// More bytes are needed.
    Incomplete,
    Done(HttpResponse),
}

/// Serialise `req` as an HTTP/1.1 `POST`.
pub fn encode_request(req: &HttpRequest) -> Vec<u8> {
    let mut head = String::with_capacity(160);
    // Writing into a String cannot fail.
    let _ = write!(
        head,
        "POST {} HTTP/1.1\r\n\
         Host: {}:{}\r\n\
         Content-Type: application/json\r\n\
         Accept: application/json\r\n\
         Content-Length: {}\r\n\
         Connection: close\r\n\
         \r\n",
        req.path,
        req.host,
        req.port,
        req.body.len()
    );
    let mut out = head.into_bytes();
    out.extend_from_slice(&req.body);
    out
}

/// Parse a (possibly partial) response.
///
/// `eof` tells the parser the peer has closed; a body without
/// `Content-Length` or chunking is complete only then.
pub fn parse_response(raw: &[u8], eof: bool) -> Result<ParseStatus, ProtocolError> {
    let Some(head_end) = find(raw, b"\r\n\r\n") else {
        return if eof {
            Err(ProtocolError::IncompleteHeaders)
        } else {
            Ok(ParseStatus::Incomplete)
        };
    };

    let head = core::str::from_utf8(&raw[..head_end]).map_err(|_| ProtocolError::BadStatusLine)?;
    let body = &raw[head_end + 4..];

    let mut lines = head.split("\r\n");
    let status = parse_status_line(lines.next().unwrap_or(""))?;

    let mut content_length: Option<usize> = None;
    let mut chunked = false;
    for line in lines {
        let (name, value) = line.split_once(':').ok_or(ProtocolError::BadHeader)?;
        let value = value.trim();
        if name.eq_ignore_ascii_case("content-length") {
            content_length = Some(value.parse().map_err(|_| ProtocolError::BadHeader)?);
        } else if name.eq_ignore_ascii_case("transfer-encoding")
            && value.eq_ignore_ascii_case("chunked")
        {
            chunked = true;
        }
    }

    // Bodiless by definition.
    if status == 204 || status == 304 {
        return Ok(ParseStatus::Done(HttpResponse {
            status,
            body: Vec::new(),
        }));
    }

    if chunked {
        return match decode_chunked(body)? {
            Some(decoded) => Ok(ParseStatus::Done(HttpResponse {
                status,
                body: decoded,
            })),
            None if eof => Err(ProtocolError::TruncatedBody),
            None => Ok(ParseStatus::Incomplete),
        };
    }

    match content_length {
        Some(len) if body.len() >= len => Ok(ParseStatus::Done(HttpResponse {
            status,
            body: body[..len].to_vec(),
        })),
        Some(_) if eof => Err(ProtocolError::TruncatedBody),
        Some(_) => Ok(ParseStatus::Incomplete),
        None if eof => Ok(ParseStatus::Done(HttpResponse {
            status,
            body: body.to_vec(),
        })),
        None => Ok(ParseStatus::Incomplete),
    }
}

fn parse_status_line(line: &str) -> Result<u16, ProtocolError> {
    let mut parts = line.splitn(3, ' ');
    let version = parts.next().unwrap_or("");
    if !version.starts_with("HTTP/1.") {
        return Err(ProtocolError::BadStatusLine);
    }
    let code = parts.next().ok_or(ProtocolError::BadStatusLine)?;
    if code.len() != 3 {
        return Err(ProtocolError::BadStatusLine);
    }
    let status: u16 = code.parse().map_err(|_| ProtocolError::BadStatusLine)?;
    if !(100..=599).contains(&status) {
        return Err(ProtocolError::BadStatusLine);
    }
    Ok(status)
}

/// `Ok(None)` while the terminating zero-size chunk has not arrived.
fn decode_chunked(mut rest: &[u8]) -> Result<Option<Vec<u8>>, ProtocolError> {
    let mut out = Vec::new();
    loop {
        let Some(line_end) = find(rest, b"\r\n") else {
            return Ok(None);
        };
        let size_line =
            core::str::from_utf8(&rest[..line_end]).map_err(|_| ProtocolError::BadHeader)?;
        let size_hex = size_line.split(';').next().unwrap_or("").trim();
        let size =
            usize::from_str_radix(size_hex, 16).map_err(|_| ProtocolError::BadHeader)?;
        // No chunk can be larger than the whole response buffer.
        if size > MAX_RESPONSE_BYTES {
            return Err(ProtocolError::BadHeader);
        }
        rest = &rest[line_end + 2..];
        if size == 0 {
            return Ok(Some(out));
        }
        let Some(framed) = size.checked_add(2) else {
            return Err(ProtocolError::BadHeader);
        };
        if rest.len() < framed {
            return Ok(None);
        }
        out.extend_from_slice(&rest[..size]);
        rest = &rest[framed..];
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(body: &str) -> HttpRequest {
        let mut host = heapless::String::new();
        host.push_str("gym.example").unwrap();
        let mut path = heapless::String::new();
        path.push_str("/api/nodemcu/validate").unwrap();
        HttpRequest {
            host,
            port: 5000,
            path,
            body: body.as_bytes().to_vec(),
        }
    }

    #[test]
    fn encodes_post_with_length() {
        let raw = encode_request(&request("{\"a\":1}"));
        let text = String::from_utf8(raw).unwrap();
        assert!(text.starts_with("POST /api/nodemcu/validate HTTP/1.1\r\n"));
        assert!(text.contains("Host: gym.example:5000\r\n"));
        assert!(text.contains("Content-Length: 7\r\n"));
        assert!(text.contains("Connection: close\r\n"));
        assert!(text.ends_with("\r\n\r\n{\"a\":1}"));
    }

    #[test]
    fn parses_content_length_body() {
        let raw = b"HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 2\r\n\r\n{}";
        let st = parse_response(raw, false).unwrap();
        assert_eq!(
            st,
            ParseStatus::Done(HttpResponse {
                status: 200,
                body: b"{}".to_vec()
            })
        );
    }

    #[test]
    fn partial_headers_are_incomplete() {
        assert_eq!(
            parse_response(b"HTTP/1.1 200 OK\r\nContent-Le", false).unwrap(),
            ParseStatus::Incomplete
        );
        assert_eq!(
            parse_response(b"HTTP/1.1 200 OK\r\nContent-Le", true),
            Err(ProtocolError::IncompleteHeaders)
        );
    }

    #[test]
    fn short_body_waits_then_truncates() {
        let raw = b"HTTP/1.1 200 OK\r\nContent-Length: 10\r\n\r\n{}";
        assert_eq!(parse_response(raw, false).unwrap(), ParseStatus::Incomplete);
        assert_eq!(parse_response(raw, true), Err(ProtocolError::TruncatedBody));
    }

    #[test]
    fn body_to_eof_without_length() {
        let raw = b"HTTP/1.0 503 Service Unavailable\r\n\r\nbusy";
        assert_eq!(parse_response(raw, false).unwrap(), ParseStatus::Incomplete);
        match parse_response(raw, true).unwrap() {
            ParseStatus::Done(r) => {
                assert_eq!(r.status, 503);
                assert_eq!(r.body, b"busy");
            }
            ParseStatus::Incomplete => panic!("expected a response"),
        }
    }

    #[test]
    fn chunked_body_decoded() {
        let raw = b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n4\r\n{\"de\r\n3\r\nx\":\r\n0\r\n\r\n";
        match parse_response(raw, false).unwrap() {
            ParseStatus::Done(r) => assert_eq!(r.body, b"{\"dex\":"),
            ParseStatus::Incomplete => panic!("expected a response"),
        }
    }

    #[test]
    fn oversized_chunk_size_rejected() {
        let raw = b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\nffffffffffffffff\r\nab\r\n";
        assert_eq!(parse_response(raw, false), Err(ProtocolError::BadHeader));

        let raw = b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n1001\r\nab";
        assert_eq!(parse_response(raw, false), Err(ProtocolError::BadHeader));
        assert_eq!(parse_response(raw, true), Err(ProtocolError::BadHeader));
    }

    #[test]
    fn chunk_at_buffer_limit_waits_for_bytes() {
        let raw = b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n1000\r\nab";
        assert_eq!(parse_response(raw, false).unwrap(), ParseStatus::Incomplete);
    }

    #[test]
    fn garbage_status_line_rejected() {
        assert_eq!(
            parse_response(b"SSH-2.0-OpenSSH\r\n\r\n", false),
            Err(ProtocolError::BadStatusLine)
        );
        assert_eq!(
            parse_response(b"HTTP/1.1 2000 OK\r\n\r\n", false),
            Err(ProtocolError::BadStatusLine)
        );
    }

    #[test]
    fn bad_content_length_rejected() {
        assert_eq!(
            parse_response(b"HTTP/1.1 200 OK\r\nContent-Length: ten\r\n\r\n", false),
            Err(ProtocolError::BadHeader)
        );
    }
}
