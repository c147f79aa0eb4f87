//! Pushgateway HTTP Transport - reqwest Adapter for `PushTransport`
//!
//! Sends exposition payloads to `<base>/metrics/job/<job>[/<label>/<value>]*`
//! with the configured timeout, extra headers and basic auth. Values that
//! cannot travel as a plain path segment (empty, or containing `/`) use
//! the gateway's `name@base64/<urlsafe-base64>` form.

use std::error::Error as StdError;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Url};
use tracing::debug;

use crate::adapters::metrics::TEXT_CONTENT_TYPE;
use crate::config::{BasicAuth, PushgatewayOptions};
use crate::domain::labels::LabelSet;
use crate::ports::push_transport::{PushMethod, PushRequest, PushTransport, PushTransportError};

/// HTTP transport to a Prometheus Pushgateway.
pub struct HttpPushTransport {
    /// Underlying HTTP client (timeout and default headers applied).
    http: Client,
    /// Gateway base URL.
    base_url: Url,
    /// Request timeout, reported in timeout errors.
    timeout: Duration,
    /// Optional basic-auth credentials.
    auth: Option<BasicAuth>,
}

impl HttpPushTransport {
    /// Build a transport for the gateway at `url`.
    ///
    /// # Errors
    /// Unparseable URL, a zero timeout, invalid extra headers, or an
    /// HTTP client that fails to build.
    pub fn new(url: &str, options: &PushgatewayOptions) -> Result<Self, PushTransportError> {
        if options.timeout_ms == 0 {
            return Err(PushTransportError::InvalidTimeout);
        }
        let base_url = Url::parse(url).map_err(|e| PushTransportError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        if base_url.cannot_be_a_base() {
            return Err(PushTransportError::InvalidUrl {
                url: url.to_string(),
                reason: "URL cannot carry a path".to_string(),
            });
        }

        let mut headers = HeaderMap::new();
        for (name, value) in &options.headers {
            let invalid = |reason: String| PushTransportError::InvalidHeader {
                name: name.clone(),
                reason,
            };
            let header_name =
                HeaderName::from_bytes(name.as_bytes()).map_err(|e| invalid(e.to_string()))?;
            let header_value = HeaderValue::from_str(value).map_err(|e| invalid(e.to_string()))?;
            headers.insert(header_name, header_value);
        }

        let http = Client::builder()
            .timeout(options.timeout())
            .default_headers(headers)
            .build()
            .map_err(|e| PushTransportError::Request(error_chain(&e)))?;

        Ok(Self {
            http,
            base_url,
            timeout: options.timeout(),
            auth: options.auth.clone(),
        })
    }

    /// Gateway URL for a job and grouping key.
    ///
    /// # Errors
    /// Empty job name.
    pub fn url_for(&self, job: &str, grouping: &LabelSet) -> Result<Url, PushTransportError> {
        if job.is_empty() {
            return Err(PushTransportError::InvalidUrl {
                url: self.base_url.to_string(),
                reason: "job name must not be empty".to_string(),
            });
        }

        let mut path = vec!["metrics".to_string()];
        push_grouping_pair(&mut path, "job", job);
        for (name, value) in grouping.iter() {
            push_grouping_pair(&mut path, name, value);
        }

        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| PushTransportError::InvalidUrl {
                url: self.base_url.to_string(),
                reason: "URL cannot carry a path".to_string(),
            })?
            .pop_if_empty()
            .extend(&path);
        Ok(url)
    }

    fn classify(&self, err: &reqwest::Error) -> PushTransportError {
        if err.is_timeout() {
            PushTransportError::Timeout(self.timeout)
        } else {
            PushTransportError::Request(error_chain(err))
        }
    }
}

fn push_grouping_pair(path: &mut Vec<String>, name: &str, value: &str) {
    if value.is_empty() {
        path.push(format!("{name}@base64"));
        path.push("=".to_string());
    } else if value.contains('/') {
        path.push(format!("{name}@base64"));
        path.push(URL_SAFE.encode(value));
    } else {
        path.push(name.to_string());
        path.push(value.to_string());
    }
}

/// Display text of an error followed by its sources.
fn error_chain(err: &dyn StdError) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

#[async_trait]
impl PushTransport for HttpPushTransport {
    async fn send(&self, request: PushRequest) -> Result<(), PushTransportError> {
        let url = self.url_for(&request.job, &request.grouping)?;
        debug!(method = request.method.as_str(), url = %url, bytes = request.body.len(), "Pushing metrics");

        let mut builder = match request.method {
            PushMethod::Add => self.http.post(url),
            PushMethod::Replace => self.http.put(url),
            PushMethod::Delete => self.http.delete(url),
        };
        if request.method != PushMethod::Delete {
            builder = builder
                .header(CONTENT_TYPE, TEXT_CONTENT_TYPE)
                .body(request.body);
        }
        if let Some(auth) = &self.auth {
            builder = builder.basic_auth(&auth.username, Some(&auth.password));
        }

        let response = builder.send().await.map_err(|e| self.classify(&e))?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(PushTransportError::Status {
            status: status.as_u16(),
            body,
        })
    }
}
