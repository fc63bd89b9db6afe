use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;

use strand_core::{ApiError, ProcessConfig, StrandResult};

use super::client::{
    Connector, ControlPlane, ControlPlaneError, CreateConnectorInput, CreateFunctionInput,
    CreatePipelineInput, Pipeline, RemoteFunction, RemoteResource,
};

/// Control plane reached over its JSON REST API.
pub struct HttpControlPlane {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpControlPlane {
    pub fn new(base_url: &str, token: Option<String>) -> Self {
        let base_url = base_url.trim_end_matches('/').to_string();
        Self {
            http: reqwest::Client::new(),
            base_url,
            token,
        }
    }

    /// Builds a client from `STRAND_API_URL` / `STRAND_ACCESS_TOKEN` settings.
    pub fn from_config(config: &ProcessConfig) -> StrandResult<Self> {
        let url = config.require_api_url()?;
        Ok(Self::new(url, config.access_token.clone()))
    }

    /// `{base}/v1/{segments..}`, each segment percent-encoded.
    fn api_url(&self, segments: &[&str]) -> Result<Url, ControlPlaneError> {
        let mut url = Url::parse(&self.base_url).map_err(|e| {
            ControlPlaneError::Transport(format!("invalid control plane URL {}: {e}", self.base_url))
        })?;
        url.path_segments_mut()
            .map_err(|()| {
                ControlPlaneError::Transport(format!(
                    "control plane URL {} cannot carry a path",
                    self.base_url
                ))
            })?
            .pop_if_empty()
            .push("v1")
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: reqwest::Method, url: Url) -> reqwest::RequestBuilder {
        let req = self.http.request(method, url);
        let req = match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        };
        req.header("Accept", "application/json")
    }

    async fn get<T: DeserializeOwned>(
        &self,
        segments: &[&str],
    ) -> Result<Response<T>, ControlPlaneError> {
        let url = self.api_url(segments)?;
        let resp = self
            .request(reqwest::Method::GET, url)
            .send()
            .await
            .map_err(|e| ControlPlaneError::Transport(e.to_string()))?;
        handle_response(resp).await
    }

    async fn post<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        collection: &str,
        body: &B,
    ) -> Result<T, ControlPlaneError> {
        let url = self.api_url(&[collection])?;
        let resp = self
            .request(reqwest::Method::POST, url)
            .json(body)
            .send()
            .await
            .map_err(|e| ControlPlaneError::Transport(e.to_string()))?;
        handle_response(resp).await?.into_found()
    }
}

/// A decoded response, keeping 404 apart so callers can decide what absence means.
enum Response<T> {
    Found(T),
    Missing(ApiError),
}

impl<T> Response<T> {
    fn into_found(self) -> Result<T, ControlPlaneError> {
        match self {
            Response::Found(value) => Ok(value),
            Response::Missing(err) => Err(ControlPlaneError::Api(err)),
        }
    }
}

async fn handle_response<T: DeserializeOwned>(
    resp: reqwest::Response,
) -> Result<Response<T>, ControlPlaneError> {
    let status = resp.status();
    let body = resp
        .text()
        .await
        .map_err(|e| ControlPlaneError::Transport(e.to_string()))?;

    if !status.is_success() {
        let err = decode_error(status, &body);
        if status == StatusCode::NOT_FOUND {
            return Ok(Response::Missing(err));
        }
        return Err(ControlPlaneError::Api(err));
    }

    serde_json::from_str(&body)
        .map(Response::Found)
        .map_err(|e| ControlPlaneError::Decode(e.to_string()))
}

fn decode_error(status: StatusCode, body: &str) -> ApiError {
    match serde_json::from_str::<ApiError>(body) {
        Ok(err) if !err.message.is_empty() => err,
        _ => ApiError::new(format!("HTTP {status}")),
    }
}

#[async_trait]
impl ControlPlane for HttpControlPlane {
    async fn get_resource(&self, name_or_id: &str) -> Result<RemoteResource, ControlPlaneError> {
        match self.get::<RemoteResource>(&["resources", name_or_id]).await? {
            Response::Found(resource) => Ok(resource),
            Response::Missing(_) => Err(ControlPlaneError::NotFound {
                kind: "resource".to_string(),
                name: name_or_id.to_string(),
            }),
        }
    }

    async fn find_pipeline(&self, name: &str) -> Result<Option<Pipeline>, ControlPlaneError> {
        match self.get::<Pipeline>(&["pipelines", name]).await? {
            Response::Found(pipeline) => Ok(Some(pipeline)),
            Response::Missing(_) => Ok(None),
        }
    }

    async fn create_pipeline(
        &self,
        input: &CreatePipelineInput,
    ) -> Result<Pipeline, ControlPlaneError> {
        self.post("pipelines", input).await
    }

    async fn create_connector(
        &self,
        input: &CreateConnectorInput,
    ) -> Result<Connector, ControlPlaneError> {
        self.post("connectors", input).await
    }

    async fn create_function(
        &self,
        input: &CreateFunctionInput,
    ) -> Result<RemoteFunction, ControlPlaneError> {
        self.post("functions", input).await
    }

    fn backend_name(&self) -> &'static str {
        "http"
    }
}
