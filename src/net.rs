//! `reqwest`-backed native fetch for observing live endpoints.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Method;
use stream_interceptor::fetch::resolve_target;
use stream_interceptor::{Body, BodyError, FetchError, NativeFetch, RequestInit, Resource, Response};

#[derive(Clone, Default)]
pub struct ReqwestFetch {
    client: reqwest::Client,
}

impl ReqwestFetch {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl NativeFetch for ReqwestFetch {
    async fn fetch(
        &self,
        resource: Resource,
        init: Option<RequestInit>,
    ) -> Result<Response, FetchError> {
        let (url, method) = resolve_target(&resource, init.as_ref());
        let method = Method::from_bytes(method.as_bytes())
            .map_err(|err| FetchError::InvalidRequest(err.to_string()))?;
        let mut request = self.client.request(method, &url);

        let mut body = None;
        if let Resource::Request(original) = resource {
            request = request.headers(original.headers);
            body = original.body;
        }
        if let Some(init) = init {
            if let Some(headers) = init.headers {
                request = request.headers(headers);
            }
            if init.body.is_some() {
                body = init.body;
            }
        }
        if let Some(body) = body {
            let bytes = body
                .bytes()
                .await
                .map_err(|err| FetchError::InvalidRequest(err.to_string()))?;
            request = request.body(bytes);
        }

        let response = request
            .send()
            .await
            .map_err(|err| FetchError::Network(err.to_string()))?;
        let status = response.status();
        let final_url = response.url().to_string();
        let headers = response.headers().clone();
        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|err| BodyError::Read(err.to_string())));

        let mut out = Response::new(status, final_url).with_body(Body::from_stream(stream));
        out.headers = headers;
        Ok(out)
    }
}
