//! Minimal HTTP/1.1 request parsing and response writing.
//!
//! Only what the console installer and the operator page need: a request
//! line, headers, an optional `Content-Length` body, and responses that
//! always close the connection.

use std::fmt;

use percent_encoding::percent_decode_str;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::{MAX_FORM_BODY, MAX_REQUEST_HEAD, ServerError};

/// Request method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Method {
    Get,
    Head,
    Post,
    Other(String),
}

impl Method {
    fn parse(token: &str) -> Self {
        match token {
            "GET" => Self::Get,
            "HEAD" => Self::Head,
            "POST" => Self::Post,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Get => f.write_str("GET"),
            Self::Head => f.write_str("HEAD"),
            Self::Post => f.write_str("POST"),
            Self::Other(m) => f.write_str(m),
        }
    }
}

/// A parsed request.
#[derive(Debug, Clone)]
pub(crate) struct Request {
    pub method: Method,
    /// Raw request target, still percent-encoded.
    pub target: String,
    headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Request {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Target without the query string.
    pub fn path(&self) -> &str {
        self.target
            .split_once('?')
            .map_or(self.target.as_str(), |(path, _)| path)
    }
}

/// Reads one request. Returns `None` if the peer closed before sending anything.
pub(crate) async fn read_request<R: AsyncBufRead + Unpin>(
    reader: &mut R,
) -> Result<Option<Request>, ServerError> {
    let mut head_len = 0usize;

    let Some(request_line) = read_head_line(reader, &mut head_len).await? else {
        return Ok(None);
    };

    let mut parts = request_line.split_whitespace();
    let (Some(method), Some(target), Some(version)) = (parts.next(), parts.next(), parts.next())
    else {
        return Err(ServerError::BadRequest(format!(
            "invalid request line: {request_line:?}"
        )));
    };
    if !version.starts_with("HTTP/1.") {
        return Err(ServerError::BadRequest(format!(
            "unsupported version: {version}"
        )));
    }
    let method = Method::parse(method);
    let target = target.to_string();

    let mut headers = Vec::new();
    loop {
        let Some(line) = read_head_line(reader, &mut head_len).await? else {
            return Err(ServerError::BadRequest("connection closed in headers".into()));
        };
        if line.is_empty() {
            break;
        }
        let Some((name, value)) = line.split_once(':') else {
            return Err(ServerError::BadRequest(format!("invalid header: {line:?}")));
        };
        headers.push((name.trim().to_string(), value.trim().to_string()));
    }

    let mut request = Request {
        method,
        target,
        headers,
        body: Vec::new(),
    };

    if let Some(len) = request.header("content-length") {
        let len: usize = len
            .parse()
            .map_err(|_| ServerError::BadRequest(format!("invalid content-length: {len}")))?;
        if len > MAX_FORM_BODY {
            return Err(ServerError::BodyTooLarge);
        }
        let mut body = vec![0u8; len];
        reader.read_exact(&mut body).await?;
        request.body = body;
    }

    Ok(Some(request))
}

/// Reads one CRLF (or LF) terminated line, enforcing the head size limit.
async fn read_head_line<R: AsyncBufRead + Unpin>(
    reader: &mut R,
    head_len: &mut usize,
) -> Result<Option<String>, ServerError> {
    let remaining = MAX_REQUEST_HEAD.saturating_sub(*head_len) as u64;
    let mut buf = Vec::new();
    let n = (&mut *reader)
        .take(remaining)
        .read_until(b'\n', &mut buf)
        .await?;
    *head_len += n;

    if n == 0 {
        if remaining == 0 {
            return Err(ServerError::HeadTooLarge);
        }
        return Ok(None);
    }
    if !buf.ends_with(b"\n") {
        if *head_len >= MAX_REQUEST_HEAD {
            return Err(ServerError::HeadTooLarge);
        }
        return Err(ServerError::BadRequest("truncated request head".into()));
    }

    buf.pop();
    if buf.ends_with(b"\r") {
        buf.pop();
    }
    String::from_utf8(buf)
        .map(Some)
        .map_err(|_| ServerError::BadRequest("request head is not UTF-8".into()))
}

/// Extracts a field from an `application/x-www-form-urlencoded` body.
pub(crate) fn form_field(body: &[u8], name: &str) -> Option<String> {
    let body = std::str::from_utf8(body).ok()?;
    body.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        (decode_form_component(key) == name).then(|| decode_form_component(value))
    })
}

fn decode_form_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    percent_decode_str(&spaced).decode_utf8_lossy().into_owned()
}

/// Response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Status {
    Ok,
    PartialContent,
    BadRequest,
    NotFound,
    RequestTimeout,
    PayloadTooLarge,
    RangeNotSatisfiable,
    HeaderFieldsTooLarge,
    InternalServerError,
    NotImplemented,
}

impl Status {
    pub fn code(self) -> u16 {
        match self {
            Self::Ok => 200,
            Self::PartialContent => 206,
            Self::BadRequest => 400,
            Self::NotFound => 404,
            Self::RequestTimeout => 408,
            Self::PayloadTooLarge => 413,
            Self::RangeNotSatisfiable => 416,
            Self::HeaderFieldsTooLarge => 431,
            Self::InternalServerError => 500,
            Self::NotImplemented => 501,
        }
    }

    fn reason(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::PartialContent => "Partial Content",
            Self::BadRequest => "Bad Request",
            Self::NotFound => "Not Found",
            Self::RequestTimeout => "Request Timeout",
            Self::PayloadTooLarge => "Payload Too Large",
            Self::RangeNotSatisfiable => "Range Not Satisfiable",
            Self::HeaderFieldsTooLarge => "Request Header Fields Too Large",
            Self::InternalServerError => "Internal Server Error",
            Self::NotImplemented => "Not Implemented",
        }
    }
}

impl From<&ServerError> for Status {
    fn from(err: &ServerError) -> Self {
        match err {
            ServerError::BadRequest(_) => Self::BadRequest,
            ServerError::HeadTooLarge => Self::HeaderFieldsTooLarge,
            ServerError::BodyTooLarge => Self::PayloadTooLarge,
            ServerError::Timeout => Self::RequestTimeout,
            ServerError::Io(_) => Self::InternalServerError,
        }
    }
}

/// Response body.
#[derive(Debug)]
pub(crate) enum Body {
    Bytes(Vec<u8>),
    /// `len` bytes from the file's current position.
    File { file: tokio::fs::File, len: u64 },
}

impl Body {
    fn len(&self) -> u64 {
        match self {
            Self::Bytes(b) => b.len() as u64,
            Self::File { len, .. } => *len,
        }
    }
}

/// A response; always sent with `Connection: close`.
#[derive(Debug)]
pub(crate) struct Response {
    pub status: Status,
    headers: Vec<(&'static str, String)>,
    body: Body,
}

impl Response {
    pub fn new(status: Status, content_type: &str, body: Body) -> Self {
        Self {
            status,
            headers: vec![("Content-Type", content_type.to_string())],
            body,
        }
    }

    pub fn html(status: Status, page: &str) -> Self {
        Self::new(
            status,
            "text/html; charset=utf-8",
            Body::Bytes(page.as_bytes().to_vec()),
        )
    }

    /// Plain-text response carrying the status reason.
    pub fn status(status: Status) -> Self {
        Self::new(
            status,
            "text/plain; charset=utf-8",
            Body::Bytes(format!("{} {}\n", status.code(), status.reason()).into_bytes()),
        )
    }

    pub fn with_header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    /// Writes status line, headers and (unless `head_only`) the body.
    pub async fn write_to<W: AsyncWrite + Unpin>(
        self,
        writer: &mut W,
        head_only: bool,
    ) -> Result<(), ServerError> {
        let mut head = format!(
            "HTTP/1.1 {} {}\r\nContent-Length: {}\r\nConnection: close\r\n",
            self.status.code(),
            self.status.reason(),
            self.body.len()
        );
        for (name, value) in &self.headers {
            head.push_str(name);
            head.push_str(": ");
            head.push_str(value);
            head.push_str("\r\n");
        }
        head.push_str("\r\n");
        writer.write_all(head.as_bytes()).await?;

        if !head_only {
            match self.body {
                Body::Bytes(bytes) => writer.write_all(&bytes).await?,
                Body::File { file, len } => {
                    let copied = tokio::io::copy(&mut file.take(len), writer).await?;
                    if copied != len {
                        return Err(ServerError::Io(std::io::Error::new(
                            std::io::ErrorKind::UnexpectedEof,
                            format!("file ended after {copied} of {len} bytes"),
                        )));
                    }
                }
            }
        }

        writer.flush().await?;
        Ok(())
    }
}
