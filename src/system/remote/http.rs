//! Minimal HTTP/1.1 client protocol
//!
//! Just enough HTTP for the four backend calls: plain `http://` URLs, one
//! request per connection (`Connection: close`), bodies sized by
//! `Content-Length`, chunked or terminated by EOF. The transport lives
//! behind [`HttpClient`]; everything here is pure encoding and parsing.

use crate::system::error::HttpError;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt::Write;
use embassy_time::Duration;

/// Largest response body accepted
pub const MAX_RESPONSE_SIZE: usize = 16 * 1024;

/// Request method
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "rp2350", derive(defmt::Format))]
pub enum Method {
    /// GET
    Get,
    /// POST
    Post,
}

impl Method {
    /// Method token
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

/// Outbound request
#[derive(Debug, Clone)]
pub struct Request<'a> {
    /// Method
    pub method: Method,
    /// Absolute `http://` URL
    pub url: &'a str,
    /// Body content type, if there is a body
    pub content_type: Option<&'a str>,
    /// Body bytes
    pub body: &'a [u8],
    /// Upper bound for connect, send and receive together
    pub timeout: Duration,
}

impl<'a> Request<'a> {
    /// GET without body
    pub fn get(url: &'a str, timeout: Duration) -> Self {
        Self {
            method: Method::Get,
            url,
            content_type: None,
            body: &[],
            timeout,
        }
    }

    /// POST with body
    pub fn post(url: &'a str, content_type: &'a str, body: &'a [u8], timeout: Duration) -> Self {
        Self {
            method: Method::Post,
            url,
            content_type: Some(content_type),
            body,
            timeout,
        }
    }
}

/// Parsed response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Status code
    pub status: u16,
    /// Decoded body
    pub body: Vec<u8>,
}

impl Response {
    /// 2xx status
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Transport that performs one request/response exchange
#[allow(async_fn_in_trait)]
pub trait HttpClient {
    /// Send `request` and wait for the complete response
    async fn send(&mut self, request: &Request<'_>) -> Result<Response, HttpError>;
}

/// Components of an `http://` URL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Url<'a> {
    /// Host name or IPv4 literal
    pub host: &'a str,
    /// TCP port, 80 when omitted
    pub port: u16,
    /// Path including query, `/` when omitted
    pub path: &'a str,
}

impl<'a> Url<'a> {
    /// Split a plain `http://host[:port][/path]` URL
    pub fn parse(url: &'a str) -> Result<Self, HttpError> {
        let rest = url.strip_prefix("http://").ok_or(HttpError::MalformedUrl)?;
        let (authority, path) = match rest.find('/') {
            Some(index) => rest.split_at(index),
            None => (rest, "/"),
        };
        let (host, port) = match authority.rsplit_once(':') {
            Some((host, port)) => (host, port.parse().map_err(|_| HttpError::MalformedUrl)?),
            None => (authority, 80),
        };
        if host.is_empty() {
            return Err(HttpError::MalformedUrl);
        }
        Ok(Self { host, port, path })
    }
}

/// Join a base URL and an absolute path
pub fn join_url(base: &str, path: &str) -> String {
    let mut url = String::with_capacity(base.len() + path.len());
    url.push_str(base.trim_end_matches('/'));
    url.push_str(path);
    url
}

/// Encode request line and headers
pub fn encode_request_head(request: &Request<'_>, url: &Url<'_>) -> String {
    let mut head = String::new();
    let _ = write!(head, "{} {} HTTP/1.1\r\n", request.method.as_str(), url.path);
    if url.port == 80 {
        let _ = write!(head, "Host: {}\r\n", url.host);
    } else {
        let _ = write!(head, "Host: {}:{}\r\n", url.host, url.port);
    }
    head.push_str("Connection: close\r\n");
    if let Some(content_type) = request.content_type {
        let _ = write!(head, "Content-Type: {}\r\n", content_type);
    }
    if request.method == Method::Post || !request.body.is_empty() {
        let _ = write!(head, "Content-Length: {}\r\n", request.body.len());
    }
    head.push_str("\r\n");
    head
}

/// Framing information from a response head
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseHead {
    /// Status code
    pub status: u16,
    /// Bytes up to and including the blank line
    pub head_len: usize,
    /// `Content-Length`, if given
    pub content_length: Option<usize>,
    /// `Transfer-Encoding: chunked`
    pub chunked: bool,
}

/// Parse the head of `raw`, `Ok(None)` if the blank line has not arrived yet
pub fn parse_response_head(raw: &[u8]) -> Result<Option<ResponseHead>, HttpError> {
    let head_end = match find(raw, b"\r\n\r\n") {
        Some(index) => index,
        None => return Ok(None),
    };
    let head = core::str::from_utf8(&raw[..head_end]).map_err(|_| HttpError::MalformedResponse)?;
    let mut lines = head.split("\r\n");

    let status_line = lines.next().ok_or(HttpError::MalformedResponse)?;
    let mut parts = status_line.splitn(3, ' ');
    let version = parts.next().unwrap_or("");
    if !version.starts_with("HTTP/1.") {
        return Err(HttpError::MalformedResponse);
    }
    let status = parts
        .next()
        .and_then(|code| code.parse::<u16>().ok())
        .ok_or(HttpError::MalformedResponse)?;

    let mut content_length = None;
    let mut chunked = false;
    for line in lines {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        if name.eq_ignore_ascii_case("content-length") {
            content_length = Some(value.parse().map_err(|_| HttpError::MalformedResponse)?);
        } else if name.eq_ignore_ascii_case("transfer-encoding") {
            chunked = value.eq_ignore_ascii_case("chunked");
        }
    }

    Ok(Some(ResponseHead {
        status,
        head_len: head_end + 4,
        content_length,
        chunked,
    }))
}

/// Whether `raw` already holds a complete response
///
/// Responses without `Content-Length` are complete only at EOF, which the
/// transport reports separately.
pub fn is_complete(raw: &[u8]) -> bool {
    match parse_response_head(raw) {
        Ok(Some(head)) if head.chunked => find(&raw[head.head_len..], b"0\r\n\r\n").is_some(),
        Ok(Some(head)) => match head.content_length {
            Some(length) => raw.len() >= head.head_len + length,
            None => false,
        },
        _ => false,
    }
}

/// Parse a complete response (connection already closed or body complete)
pub fn parse_response(raw: &[u8]) -> Result<Response, HttpError> {
    let head = parse_response_head(raw)?.ok_or(HttpError::MalformedResponse)?;
    let payload = &raw[head.head_len..];
    let body = if head.chunked {
        decode_chunked(payload)?
    } else if let Some(length) = head.content_length {
        if payload.len() < length {
            return Err(HttpError::MalformedResponse);
        }
        payload[..length].to_vec()
    } else {
        payload.to_vec()
    };
    if body.len() > MAX_RESPONSE_SIZE {
        return Err(HttpError::ResponseTooLarge);
    }
    Ok(Response {
        status: head.status,
        body,
    })
}

fn decode_chunked(mut payload: &[u8]) -> Result<Vec<u8>, HttpError> {
    let mut body = Vec::new();
    loop {
        let line_end = find(payload, b"\r\n").ok_or(HttpError::MalformedResponse)?;
        let size_line = core::str::from_utf8(&payload[..line_end]).map_err(|_| HttpError::MalformedResponse)?;
        let size_hex = size_line.split(';').next().unwrap_or("").trim();
        let size = usize::from_str_radix(size_hex, 16).map_err(|_| HttpError::MalformedResponse)?;
        payload = &payload[line_end + 2..];
        if size == 0 {
            return Ok(body);
        }
        let end = size.checked_add(2).ok_or(HttpError::MalformedResponse)?;
        if payload.len() < end {
            return Err(HttpError::MalformedResponse);
        }
        body.extend_from_slice(&payload[..size]);
        payload = &payload[end..];
    }
}

/// Position of `needle` in `haystack`
pub(crate) fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|window| window == needle)
}
