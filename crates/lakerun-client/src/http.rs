//! HTTP implementation of [`VersionedStoreClient`].

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use lakerun_types::{BranchRef, CommitRecord, CommitRequest, ObjectStats};
use reqwest::multipart::{Form, Part};
use reqwest::{header, Body, Client as HttpClient, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};
use url::Url;

use crate::credentials::Credentials;
use crate::error::{ClientError, ClientResult};
use crate::operation::{HttpMethod, OperationCall, OperationOutput};
use crate::traits::VersionedStoreClient;

/// Error body returned by the store API.
#[derive(Deserialize)]
struct ApiErrorBody {
    message: String,
}

#[derive(Serialize)]
struct BranchCreation<'a> {
    name: &'a str,
    source: &'a str,
}

/// Store client speaking the versioned store's REST API.
///
/// Owns its connection pool; dropping the client releases it. Obtain one per
/// operation through [`HttpConnector`](crate::HttpConnector).
#[derive(Debug)]
pub struct HttpStoreClient {
    http: HttpClient,
    base_url: Url,
    access_key_id: Option<String>,
    secret_access_key: Option<String>,
}

impl HttpStoreClient {
    pub fn new(credentials: &Credentials, user_agent: &str) -> ClientResult<Self> {
        let base_url = Url::parse(&credentials.endpoint)?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::InvalidRequest(format!(
                "endpoint cannot be used as a base URL: {base_url}"
            )));
        }

        let mut builder = HttpClient::builder().user_agent(user_agent);
        if let Some(secs) = credentials.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }

        Ok(Self {
            http: builder.build()?,
            base_url,
            access_key_id: credentials.access_key_id.clone(),
            secret_access_key: credentials
                .secret_access_key
                .as_ref()
                .map(|s| s.expose().to_string()),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Send an arbitrary [`OperationCall`] and return whatever the store
    /// answered.
    pub async fn invoke(&self, call: &OperationCall) -> ClientResult<OperationOutput> {
        let rendered = call.render()?;
        let url = self.url(rendered.segments.iter().map(String::as_str))?;
        debug!(operation = %call.operation, %url, "invoking remote operation");

        let mut request = self
            .http
            .request(rendered.method.as_method(), url)
            .query(&rendered.query);
        if let Some(body) = &rendered.body {
            request = request.json(body);
        }

        let resource = || format!("{} {:?}", call.operation, call.args);
        let response = check(self.send(request).await?, resource).await?;

        if rendered.method == HttpMethod::Head {
            return Ok(OperationOutput::Empty);
        }
        let is_json = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("application/json"));
        let body = response.bytes().await?;
        if body.is_empty() {
            Ok(OperationOutput::Empty)
        } else if is_json {
            Ok(OperationOutput::Json(serde_json::from_slice(&body)?))
        } else {
            Ok(OperationOutput::Bytes(body))
        }
    }

    fn url<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> ClientResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidRequest(format!("bad endpoint: {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send(&self, request: RequestBuilder) -> ClientResult<Response> {
        let request = match &self.access_key_id {
            Some(id) => request.basic_auth(id, self.secret_access_key.as_deref()),
            None => request,
        };
        Ok(request.send().await?)
    }
}

impl Drop for HttpStoreClient {
    fn drop(&mut self) {
        trace!(endpoint = %self.base_url, "store client released");
    }
}

/// Pass successful responses through; turn everything else into the matching
/// [`ClientError`].
async fn check(response: Response, resource: impl FnOnce() -> String) -> ClientResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(classify(status.as_u16(), &body, resource()))
}

fn classify(status: u16, body: &str, resource: String) -> ClientError {
    let message = serde_json::from_str::<ApiErrorBody>(body)
        .map(|b| b.message)
        .unwrap_or_else(|_| body.trim().to_string());
    match status {
        404 => ClientError::NotFound { resource },
        409 if message.to_ascii_lowercase().contains("already exists") => {
            ClientError::AlreadyExists { resource }
        }
        409 => ClientError::Conflict { message },
        401 | 403 => ClientError::Unauthorized(message),
        _ => ClientError::Api { status, message },
    }
}

#[async_trait]
impl VersionedStoreClient for HttpStoreClient {
    async fn get_branch(&self, repository: &str, branch: &str) -> ClientResult<BranchRef> {
        let url = self.url(["repositories", repository, "branches", branch])?;
        let response = self.send(self.http.get(url)).await?;
        let response = check(response, || format!("branch {branch} in {repository}")).await?;
        Ok(response.json().await?)
    }

    async fn create_branch(
        &self,
        repository: &str,
        name: &str,
        source: &str,
    ) -> ClientResult<BranchRef> {
        let url = self.url(["repositories", repository, "branches"])?;
        let request = self.http.post(url).json(&BranchCreation { name, source });
        let response = self.send(request).await?;
        let response = check(response, || format!("branch {name} in {repository}")).await?;
        // The store answers with the new branch's head commit id as plain text.
        let commit_id = response.text().await?;
        Ok(BranchRef::new(name, commit_id.trim().trim_matches('"')))
    }

    async fn put_object(
        &self,
        repository: &str,
        branch: &str,
        path: &str,
        content: Bytes,
    ) -> ClientResult<ObjectStats> {
        let url = self.url(["repositories", repository, "branches", branch, "objects"])?;
        let file_name = path.rsplit('/').next().unwrap_or(path).to_string();
        let length = content.len() as u64;
        let part = Part::stream_with_length(Body::from(content), length).file_name(file_name);
        let request = self
            .http
            .post(url)
            .query(&[("path", path)])
            .multipart(Form::new().part("content", part));
        let response = self.send(request).await?;
        let response = check(response, || format!("branch {branch} in {repository}")).await?;
        Ok(response.json().await?)
    }

    async fn get_object(
        &self,
        repository: &str,
        reference: &str,
        path: &str,
    ) -> ClientResult<Bytes> {
        let url = self.url(["repositories", repository, "refs", reference, "objects"])?;
        let request = self.http.get(url).query(&[("path", path)]);
        let response = self.send(request).await?;
        let response = check(response, || {
            format!("object {path} at {reference} in {repository}")
        })
        .await?;
        Ok(response.bytes().await?)
    }

    async fn commit(
        &self,
        repository: &str,
        branch: &str,
        request: &CommitRequest,
    ) -> ClientResult<CommitRecord> {
        let url = self.url(["repositories", repository, "branches", branch, "commits"])?;
        let response = self.send(self.http.post(url).json(request)).await?;
        let response = check(response, || format!("branch {branch} in {repository}")).await?;
        Ok(response.json().await?)
    }
}
