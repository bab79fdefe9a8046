//! Borrowed view of an incoming HTTP request.
//!
//! The gate and its collaborators never take ownership of the request: they
//! read through a [`RequestView`] and only the gate mutates headers, after
//! authorization has succeeded.

use http::header::AUTHORIZATION;
use http::request::Parts;
use http::{Extensions, HeaderMap, Method, Request, Uri};

/// Header carrying a caller-supplied request identifier.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// DER-encoded certificate chain presented by the TLS peer, leaf first.
///
/// The TLS terminator stores this as a request extension once the handshake
/// completes; authenticators read it back from [`RequestView::peer_certificates`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeerCertificates(pub Vec<Vec<u8>>);

impl PeerCertificates {
    /// Creates a chain from DER bytes, leaf first.
    pub fn new(chain: Vec<Vec<u8>>) -> Self {
        Self(chain)
    }

    /// Returns the leaf certificate, if any.
    pub fn leaf(&self) -> Option<&[u8]> {
        self.0.first().map(Vec::as_slice)
    }

    /// Returns true if the peer presented no certificate.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Framework-agnostic, read-only view of an HTTP request.
///
/// # Examples
///
/// ```
/// use access_gate::request::RequestView;
///
/// let req = http::Request::get("/api/v1/pods?user=alice&user=bob")
///     .body(())
///     .unwrap();
/// let view = RequestView::from_request(&req);
///
/// assert_eq!(view.path(), "/api/v1/pods");
/// assert_eq!(view.query_values("user"), Some(vec!["alice".to_string(), "bob".to_string()]));
/// assert_eq!(view.query_values("missing"), None);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct RequestView<'a> {
    method: &'a Method,
    uri: &'a Uri,
    headers: &'a HeaderMap,
    extensions: &'a Extensions,
}

impl<'a> RequestView<'a> {
    /// Borrows the parts of a full request.
    pub fn from_request<B>(req: &'a Request<B>) -> Self {
        Self {
            method: req.method(),
            uri: req.uri(),
            headers: req.headers(),
            extensions: req.extensions(),
        }
    }

    /// Borrows a request head.
    pub fn from_parts(parts: &'a Parts) -> Self {
        Self {
            method: &parts.method,
            uri: &parts.uri,
            headers: &parts.headers,
            extensions: &parts.extensions,
        }
    }

    /// Returns the request method.
    pub fn method(&self) -> &'a Method {
        self.method
    }

    /// Returns the request URI.
    pub fn uri(&self) -> &'a Uri {
        self.uri
    }

    /// Returns the URL path.
    pub fn path(&self) -> &'a str {
        self.uri.path()
    }

    /// Returns the request headers.
    pub fn headers(&self) -> &'a HeaderMap {
        self.headers
    }

    /// Returns the request extensions.
    pub fn extensions(&self) -> &'a Extensions {
        self.extensions
    }

    /// Returns every decoded value of the query parameter `key`, in URL order.
    ///
    /// Returns `None` if the key does not occur at all. A key without a value
    /// (`?user` or `?user=`) yields one empty string.
    pub fn query_values(&self, key: &str) -> Option<Vec<String>> {
        let query = self.uri.query()?;
        let values: Vec<String> = url::form_urlencoded::parse(query.as_bytes())
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
            .collect();

        if values.is_empty() {
            None
        } else {
            Some(values)
        }
    }

    /// Returns the bearer token from the `Authorization` header, if present.
    pub fn bearer_token(&self) -> Option<&'a str> {
        self.headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
    }

    /// Returns the certificate chain presented by the TLS peer, if any.
    pub fn peer_certificates(&self) -> Option<&'a PeerCertificates> {
        self.extensions.get::<PeerCertificates>()
    }

    /// Returns the caller-supplied request id, if present and non-empty.
    pub fn request_id(&self) -> Option<&'a str> {
        self.headers
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }
}
