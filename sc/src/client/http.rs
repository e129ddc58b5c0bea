//! HTTP client for the SatEval backend
//!
//! Every operation returns `Result<T, ClientError>`: failure envelopes are
//! converted to errors here, so no caller ever has to sniff a payload to
//! tell success from failure.

use std::time::Duration;

use reqwest::{Client, RequestBuilder, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::stream::ExecutionHandle;
use super::types::{ConfigTemplate, DatasetEntry, Envelope, EvaluationRecord, ValidationOutcome};
use super::ClientError;
use crate::config::ServerConfig;
use crate::pipeline::{CoercedPipeline, CoercedStep};
use crate::run_id::RunId;

/// Client for the SatEval backend
///
/// Holds nothing but the base address and a connection pool, so clones are
/// cheap and calls may run concurrently.
#[derive(Debug, Clone)]
pub struct SatEvalClient {
    base_url: Url,
    http: Client,
    request_timeout: Duration,
}

impl SatEvalClient {
    /// Create a client with default timeouts
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        Self::from_config(&ServerConfig {
            base_url: base_url.to_string(),
            ..ServerConfig::default()
        })
    }

    /// Create a new client from configuration
    pub fn from_config(config: &ServerConfig) -> Result<Self, ClientError> {
        debug!(?config, "from_config: called");
        let base_url = parse_base_url(&config.base_url)?;

        let http = Client::builder()
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .user_agent(concat!("satclient/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(ClientError::Transport)?;

        Ok(Self {
            base_url,
            http,
            request_timeout: Duration::from_millis(config.request_timeout_ms),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// URL for a path below the base, one encoded segment per element
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ClientError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidUrl {
                url: self.base_url.to_string(),
                reason: "cannot be a base".to_string(),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn endpoint_with_run_id(&self, segments: &[&str], run_id: &RunId) -> Result<Url, ClientError> {
        let mut url = self.endpoint(segments)?;
        url.query_pairs_mut().append_pair("run_id", run_id.as_str());
        Ok(url)
    }

    /// Resolve a raw path such as `/get_results_by_run_id?run_id=x`
    fn resolve(&self, path: &str) -> Result<Url, ClientError> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| ClientError::InvalidUrl {
                url: path.to_string(),
                reason: e.to_string(),
            })
    }

    /// Send a request and decode the response envelope
    ///
    /// Transport failures are errors. A non-success status whose body is not
    /// an envelope is an [`ClientError::Api`] error. A well-formed envelope is
    /// returned as is, success or not, with a non-success HTTP status
    /// forcing `is_success` to false.
    async fn send_envelope(&self, request: RequestBuilder) -> Result<Envelope, ClientError> {
        let response = request.send().await?;
        let status = response.status();
        debug!(%status, url = %response.url(), "send_envelope: response received");
        let body = response.text().await?;

        match serde_json::from_str::<Envelope>(&body) {
            Ok(mut envelope) => {
                if !status.is_success() && envelope.is_success {
                    warn!(%status, "send_envelope: success envelope on error status");
                    envelope.is_success = false;
                    envelope.status_code = status.as_u16();
                }
                Ok(envelope)
            }
            Err(e) if !status.is_success() => {
                debug!(%status, error = %e, "send_envelope: error status without envelope");
                Err(ClientError::Api {
                    status: status.as_u16(),
                    message: if body.is_empty() {
                        status.to_string()
                    } else {
                        body
                    },
                    data: None,
                })
            }
            Err(e) => {
                debug!(error = %e, "send_envelope: body is not an envelope");
                Err(ClientError::InvalidResponse(format!("expected response envelope: {}", e)))
            }
        }
    }

    async fn get_url<T: DeserializeOwned>(&self, url: Url) -> Result<T, ClientError> {
        debug!(%url, "get: called");
        let request = self.http.get(url).timeout(self.request_timeout);
        self.send_envelope(request).await?.into_data()
    }

    async fn post_url<B, T>(&self, url: Url, body: &B) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        debug!(%url, "post: called");
        let request = self.http.post(url).timeout(self.request_timeout).json(body);
        self.send_envelope(request).await?.into_data()
    }

    /// One GET round trip to a path below the base URL
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        self.get_url(self.resolve(path)?).await
    }

    /// One POST round trip with a JSON body to a path below the base URL
    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.post_url(self.resolve(path)?, body).await
    }

    /// Backend liveness check
    pub async fn status(&self) -> Result<Value, ClientError> {
        self.get_url(self.endpoint(&[])?).await
    }

    pub async fn list_directories(&self) -> Result<Vec<DatasetEntry>, ClientError> {
        self.get_url(self.endpoint(&["list_directories"])?).await
    }

    /// Fetch one image as a base64 string
    pub async fn get_image_by_path(&self, path: &str) -> Result<String, ClientError> {
        self.post_url(self.endpoint(&["get_image_by_path"])?, &[path]).await
    }

    pub async fn get_run_ids(&self) -> Result<Vec<String>, ClientError> {
        self.get_url(self.endpoint(&["get_run_ids"])?).await
    }

    pub async fn get_evaluation_results(&self, run_id: &RunId) -> Result<Vec<EvaluationRecord>, ClientError> {
        self.get_url(self.endpoint_with_run_id(&["get_results_by_run_id"], run_id)?)
            .await
    }

    pub async fn get_evaluation_ids(&self, run_id: &RunId) -> Result<Vec<String>, ClientError> {
        self.get_url(self.endpoint_with_run_id(&["get_evaluation_ids"], run_id)?)
            .await
    }

    /// Image columns that evaluation results may refer to
    pub async fn get_evaluation_fields(&self) -> Result<Vec<String>, ClientError> {
        // the backend route is spelled this way
        self.get_url(self.endpoint(&["get_evalauation_fields"])?).await
    }

    pub async fn get_modules(&self) -> Result<Value, ClientError> {
        self.get_url(self.endpoint(&["get_modules"])?).await
    }

    pub async fn get_methods(&self, module: &str) -> Result<Value, ClientError> {
        self.get_url(self.endpoint(&["get_methods", module])?).await
    }

    pub async fn get_config_template(&self) -> Result<ConfigTemplate, ClientError> {
        self.get_url(self.endpoint(&["get_config_template"])?).await
    }

    pub async fn get_pipeline_config_template(&self) -> Result<Vec<ConfigTemplate>, ClientError> {
        self.get_url(self.endpoint(&["get_pipeline_config_template"])?).await
    }

    /// Ask the backend whether one step is acceptable; executes nothing
    pub async fn validate_step(&self, step: &CoercedStep) -> Result<ValidationOutcome, ClientError> {
        debug!(execution_path = %step.execution_path, "validate_step: called");
        let request = self
            .http
            .post(self.endpoint(&["validate_config"])?)
            .timeout(self.request_timeout)
            .json(step);
        Ok(ValidationOutcome::from_envelope(self.send_envelope(request).await?))
    }

    /// Ask the backend whether a whole pipeline is acceptable; executes nothing
    pub async fn validate_pipeline(&self, pipeline: &CoercedPipeline) -> Result<ValidationOutcome, ClientError> {
        debug!(step_count = pipeline.len(), "validate_pipeline: called");
        let request = self
            .http
            .post(self.endpoint(&["validate_pipeline_config"])?)
            .timeout(self.request_timeout)
            .json(pipeline);
        Ok(ValidationOutcome::from_envelope(self.send_envelope(request).await?))
    }

    /// Submit a pipeline for execution
    ///
    /// Returns once the response headers are in; the body is read lazily
    /// through the returned handle. No request timeout applies to the
    /// stream.
    pub async fn run(&self, pipeline: &CoercedPipeline, run_id: &RunId) -> Result<ExecutionHandle, ClientError> {
        info!(%run_id, step_count = pipeline.len(), "run: submitting pipeline");
        let url = self.endpoint_with_run_id(&["run_pipeline"], run_id)?;

        let response = self.http.post(url).json(pipeline).send().await?;
        let status = response.status();

        if !status.is_success() {
            debug!(%status, "run: API error");
            let text = match response.text().await {
                Ok(text) => text,
                Err(e) => {
                    warn!(%status, error = %e, "run: failed to read error body");
                    String::new()
                }
            };
            return Err(match serde_json::from_str::<Envelope>(&text) {
                Ok(envelope) => ClientError::Api {
                    status: status.as_u16(),
                    message: envelope.message,
                    data: envelope.data,
                },
                Err(_) => ClientError::Api {
                    status: status.as_u16(),
                    message: if text.is_empty() { status.to_string() } else { text },
                    data: None,
                },
            });
        }

        debug!(%run_id, "run: stream opened");
        Ok(ExecutionHandle::from_response(run_id.clone(), response))
    }
}

fn parse_base_url(raw: &str) -> Result<Url, ClientError> {
    let invalid = |reason: String| ClientError::InvalidUrl {
        url: raw.to_string(),
        reason,
    };

    let mut url = Url::parse(raw.trim()).map_err(|e| invalid(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
    }
    if url.cannot_be_a_base() {
        return Err(invalid("cannot be a base".to_string()));
    }
    url.set_query(None);
    url.set_fragment(None);

    // a trailing slash makes relative joins land below the base path
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> SatEvalClient {
        SatEvalClient::new(base).unwrap()
    }

    #[test]
    fn test_base_url_normalized() {
        assert_eq!(client("http://localhost:8000").base_url().as_str(), "http://localhost:8000/");
        assert_eq!(client("http://host/api").base_url().as_str(), "http://host/api/");
    }

    #[test]
    fn test_rejects_bad_base_url() {
        assert!(matches!(
            SatEvalClient::new("not a url"),
            Err(ClientError::InvalidUrl { .. })
        ));
        assert!(matches!(
            SatEvalClient::new("ftp://host"),
            Err(ClientError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn test_endpoint_segments_are_encoded() {
        let c = client("http://host/api");
        assert_eq!(
            c.endpoint(&["get_methods", "noise injector"]).unwrap().as_str(),
            "http://host/api/get_methods/noise%20injector"
        );
        assert_eq!(c.endpoint(&[]).unwrap().as_str(), "http://host/api");
        assert_eq!(
            c.endpoint(&["get_methods", "a/b"]).unwrap().as_str(),
            "http://host/api/get_methods/a%2Fb"
        );
    }

    #[test]
    fn test_run_id_query() {
        let c = client("http://localhost:8000");
        let run_id = RunId::new("run 1&x").unwrap();
        let url = c.endpoint_with_run_id(&["run_pipeline"], &run_id).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8000/run_pipeline?run_id=run+1%26x");
    }

    #[test]
    fn test_resolve_raw_path() {
        let c = client("http://host/api");
        assert_eq!(
            c.resolve("/get_evaluation_ids?run_id=abc").unwrap().as_str(),
            "http://host/api/get_evaluation_ids?run_id=abc"
        );
    }
}
