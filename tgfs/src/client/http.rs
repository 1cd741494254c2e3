//! HTTP client for the file tree service.
//!
//! Bare paths travel as `text/plain` bodies (GET and DELETE included), structured
//! requests as camelCase JSON, and new files as a multipart upload.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use tracing::trace;

use super::{ClientResult, FileSystemService};
use crate::config::BackendConfig;
use crate::error::ClientError;
use crate::model::{
    ChangeFile, NodeAttributes, NodeInfo, RenameRequest, ResponseMessage, TruncateRequest,
};

const ATTRIBUTES: &str = "/attributes";
const UPLOAD: &str = "/upload";
const FILE: &str = "/file";
const UPDATE: &str = "/update";
const LIST: &str = "/list";
const DIRECTORY: &str = "/directory";
const TEMP_FILE: &str = "/file/temp";

/// Content of the file part sent when creating a node.
const PLACEHOLDER: &[u8] = b"";

#[derive(Clone, Debug)]
pub struct HttpFileSystemService {
    client: Client,
    base_url: String,
}

impl HttpFileSystemService {
    pub fn new(config: &BackendConfig) -> ClientResult<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self::with_client(builder.build()?, &config.url))
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    fn plain(&self, method: Method, endpoint: &str, path: &str) -> RequestBuilder {
        trace!(method = method.as_str(), endpoint, path, "backend request");
        self.client
            .request(method, self.url(endpoint))
            .header(CONTENT_TYPE, "text/plain")
            .body(path.to_owned())
    }

    /// Sends a request whose response body is not inspected.
    async fn bodiless(&self, request: RequestBuilder, path: &str) -> ClientResult<()> {
        let response = request.send().await?;
        expect_success(response, path)?;
        Ok(())
    }
}

fn expect_success(response: Response, path: &str) -> ClientResult<Response> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else if status == StatusCode::NOT_FOUND {
        Err(ClientError::NotFound(path.to_owned()))
    } else {
        Err(ClientError::Status {
            status,
            path: path.to_owned(),
        })
    }
}

/// Creation endpoints report a taken path either with 400/409 or an empty body.
async fn creation_marker(response: Response, path: &str) -> ClientResult<ResponseMessage> {
    if matches!(
        response.status(),
        StatusCode::BAD_REQUEST | StatusCode::CONFLICT
    ) {
        return Err(ClientError::Conflict(path.to_owned()));
    }
    let body = expect_success(response, path)?.bytes().await?;
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(ClientError::Conflict(path.to_owned()));
    }
    Ok(serde_json::from_slice(&body).unwrap_or_else(|_| ResponseMessage {
        message: Some(String::from_utf8_lossy(&body).into_owned()),
    }))
}

fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

#[async_trait]
impl FileSystemService for HttpFileSystemService {
    async fn get_attributes(&self, path: &str) -> ClientResult<NodeAttributes> {
        let response = self.plain(Method::GET, ATTRIBUTES, path).send().await?;
        let body = expect_success(response, path)?.bytes().await?;
        if body.is_empty() {
            return Err(ClientError::NotFound(path.to_owned()));
        }
        Ok(serde_json::from_slice(&body)?)
    }

    async fn create_file(&self, path: &str) -> ClientResult<ResponseMessage> {
        let file = Part::bytes(PLACEHOLDER.to_vec())
            .file_name(basename(path).to_owned())
            .mime_str("application/octet-stream")?;
        let form = Form::new().part("file", file).text("path", path.to_owned());
        trace!(path, "backend upload");
        let response = self
            .client
            .post(self.url(UPLOAD))
            .multipart(form)
            .send()
            .await?;
        creation_marker(response, path).await
    }

    async fn rename(&self, path: &str, target_path: &str) -> ClientResult<()> {
        let body = RenameRequest {
            path: path.to_owned(),
            target_path: target_path.to_owned(),
        };
        self.bodiless(self.client.patch(self.url(FILE)).json(&body), path)
            .await
    }

    async fn truncate_file(&self, path: &str, size: u64) -> ClientResult<()> {
        let body = TruncateRequest {
            path: path.to_owned(),
            size,
        };
        self.bodiless(self.client.patch(self.url(UPDATE)).json(&body), path)
            .await
    }

    async fn write_file(&self, path: &str, bytes: &[u8], offset: u64) -> ClientResult<()> {
        let body = ChangeFile {
            path: path.to_owned(),
            bytes: bytes.to_vec(),
            offset,
        };
        self.bodiless(self.client.post(self.url(UPDATE)).json(&body), path)
            .await
    }

    async fn read_file(&self, path: &str) -> ClientResult<Bytes> {
        let response = self.plain(Method::GET, FILE, path).send().await?;
        Ok(expect_success(response, path)?.bytes().await?)
    }

    async fn open_file(&self, path: &str) -> ClientResult<()> {
        self.bodiless(self.plain(Method::POST, TEMP_FILE, path), path)
            .await
    }

    async fn release_file(&self, path: &str) -> ClientResult<()> {
        self.bodiless(self.plain(Method::DELETE, TEMP_FILE, path), path)
            .await
    }

    async fn create_dir(&self, path: &str) -> ClientResult<ResponseMessage> {
        let response = self.plain(Method::POST, DIRECTORY, path).send().await?;
        creation_marker(response, path).await
    }

    async fn list_dir(&self, path: &str) -> ClientResult<Vec<String>> {
        let response = self.plain(Method::GET, LIST, path).send().await?;
        let body = expect_success(response, path)?.bytes().await?;
        if body.is_empty() {
            return Ok(Vec::new());
        }
        let nodes: Option<Vec<NodeInfo>> = serde_json::from_slice(&body)?;
        Ok(nodes
            .unwrap_or_default()
            .into_iter()
            .map(|node| node.name)
            .collect())
    }

    async fn delete_dir(&self, path: &str) -> ClientResult<()> {
        self.bodiless(self.plain(Method::DELETE, DIRECTORY, path), path)
            .await
    }

    async fn delete_file(&self, path: &str) -> ClientResult<()> {
        self.bodiless(self.plain(Method::DELETE, FILE, path), path)
            .await
    }
}
