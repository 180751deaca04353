//! `reqwest` transport for the command line.

use gatehouse::{ApiRequest, ApiResponse, GateConfig, Method, RequestBody, Transport, TransportError};
use reqwest::header::AUTHORIZATION;

pub struct ReqwestTransport {
    client: reqwest::Client,
    config: GateConfig,
}

impl ReqwestTransport {
    pub fn new(config: GateConfig) -> Self {
        Self { client: reqwest::Client::new(), config }
    }
}

fn to_reqwest_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Delete => reqwest::Method::DELETE,
    }
}

#[async_trait::async_trait(?Send)]
impl Transport for ReqwestTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        let url = self.config.endpoint(&request.path);
        let mut builder = self.client.request(to_reqwest_method(request.method), url);
        if let Some(authorization) = request.authorization() {
            builder = builder.header(AUTHORIZATION, authorization);
        }
        builder = match &request.body {
            None => builder,
            Some(RequestBody::Json(value)) => builder.json(value),
            Some(RequestBody::Form(fields)) => builder.form(fields),
        };

        let response = builder.send().await.map_err(|e| TransportError::Network(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| TransportError::Body(e.to_string()))?;
        tracing::debug!(method = request.method.as_str(), path = %request.path, status, "api exchange");
        Ok(ApiResponse::new(status, body))
    }
}
