//! Service invoker: sends an assembled request and reports the status code

use std::time::Duration;

use reqwest::header::{HeaderName, HeaderValue};

use contractfuzz_core::AssembledRequest;

/// Why no response status was obtained
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("timed out: {0}")]
    Timeout(String),
    #[error("connection failed: {0}")]
    Connection(String),
    #[error("request could not be built: {0}")]
    InvalidRequest(String),
}

/// Anything that can execute a request against the service under test
pub trait ServiceInvoker {
    /// Send `request` and return the response status.
    ///
    /// # Errors
    ///
    /// Returns error when no response was received
    fn invoke(&self, request: &AssembledRequest) -> Result<u16, TransportError>;

    /// Whether `request` can be expressed on the wire at all.
    fn accepts(&self, _request: &AssembledRequest) -> bool {
        true
    }
}

/// Blocking HTTP invoker bound to one server base URL
#[derive(Debug, Clone)]
pub struct HttpInvoker {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl HttpInvoker {
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be initialized
    pub fn new(server: &str, timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
        Ok(Self {
            client,
            base_url: server.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

impl ServiceInvoker for HttpInvoker {
    fn invoke(&self, request: &AssembledRequest) -> Result<u16, TransportError> {
        let method = reqwest::Method::from_bytes(request.method.as_str().as_bytes())
            .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;

        let mut req = self.client.request(method, self.url(&request.path));
        for (name, value) in &request.headers {
            req = req.header(name.as_str(), value.as_str());
        }
        if !request.query.is_empty() {
            let pairs: Vec<(&str, &str)> = request
                .query
                .iter()
                .map(|(k, v)| (k.as_str(), v.as_str()))
                .collect();
            req = req.query(&pairs);
        }
        if let Some(body) = &request.body {
            req = req.body(body.to_text());
        }

        let resp = req.send().map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout(e.to_string())
            } else if e.is_builder() {
                TransportError::InvalidRequest(e.to_string())
            } else {
                TransportError::Connection(e.to_string())
            }
        })?;
        Ok(resp.status().as_u16())
    }

    /// Header names and values that HTTP cannot carry (e.g. `\r\n` from
    /// control-character probes) never reach the server.
    fn accepts(&self, request: &AssembledRequest) -> bool {
        request.headers.iter().all(|(name, value)| {
            HeaderName::from_bytes(name.as_bytes()).is_ok()
                && HeaderValue::from_bytes(value.as_bytes()).is_ok()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contractfuzz_core::HttpMethod;
    use std::collections::BTreeMap;

    fn request(headers: &[(&str, &str)]) -> AssembledRequest {
        AssembledRequest {
            method: HttpMethod::Get,
            path: "/pets".into(),
            headers: headers
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
            query: BTreeMap::new(),
            body: None,
        }
    }

    #[test]
    fn url_joins_without_double_slash() {
        let invoker = HttpInvoker::new("http://localhost:8080/", Duration::from_secs(1)).unwrap();
        assert_eq!(invoker.url("/pets"), "http://localhost:8080/pets");
    }

    #[test]
    fn rejects_unencodable_headers() {
        let invoker = HttpInvoker::new("http://localhost", Duration::from_secs(1)).unwrap();
        assert!(invoker.accepts(&request(&[("X-Id", "abc")])));
        assert!(invoker.accepts(&request(&[("X-Id", "   ")])));
        assert!(!invoker.accepts(&request(&[("X-Id", "a\r\nb")])));
        assert!(!invoker.accepts(&request(&[("X Id", "abc")])));
    }

    #[test]
    fn refused_connection_is_transport_error() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let invoker =
            HttpInvoker::new(&format!("http://127.0.0.1:{port}"), Duration::from_secs(2)).unwrap();
        let err = invoker.invoke(&request(&[])).unwrap_err();
        assert!(matches!(
            err,
            TransportError::Connection(_) | TransportError::Timeout(_)
        ));
    }
}
