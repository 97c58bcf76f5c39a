use crate::error::{AppError, Result};
use crate::storage::{ObjectStore, ProgressSender, TransferProgress, partial_path, validate_key};
use async_trait::async_trait;
use reqwest::StatusCode;
use std::path::Path;
use tokio::io::AsyncWriteExt;

/// S3-compatible bucket reached over HTTP with path-style URLs.
#[derive(Clone, Debug)]
pub struct HttpObjectStore {
    endpoint: String,
    bucket: String,
    access_token: Option<String>,
    client: reqwest::Client,
}

impl HttpObjectStore {
    /// Create a client for `bucket` at `endpoint` (e.g. "https://storage.example.net").
    pub fn new(endpoint: &str, bucket: &str) -> Result<Self> {
        let client = reqwest::Client::builder().build()?;
        tracing::debug!(endpoint, bucket, "creating HttpObjectStore");
        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            bucket: bucket.to_string(),
            access_token: None,
            client,
        })
    }

    /// Return a client that sends the given bearer token.
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    fn object_url(&self, key: &str) -> String {
        let encoded = key
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect::<Vec<_>>()
            .join("/");
        format!("{}/{}/{}", self.endpoint, self.bucket, encoded)
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        let req = self.client.request(method, url);
        match &self.access_token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn fetch(&self, key: &str) -> Result<Option<reqwest::Response>> {
        validate_key(key)?;
        let url = self.object_url(key);
        tracing::debug!(%url, "GET object");

        let resp = self.request(reqwest::Method::GET, &url).send().await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Ok(Some(resp.error_for_status()?))
    }

    async fn put(&self, key: &str, body: Vec<u8>) -> Result<()> {
        validate_key(key)?;
        let url = self.object_url(key);
        tracing::debug!(%url, bytes = body.len(), "PUT object");

        self.request(reqwest::Method::PUT, &url)
            .body(body)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn put_file(&self, key: &str, source: &Path, progress: &ProgressSender) -> Result<()> {
        let body = tokio::fs::read(source).await?;
        let total = body.len() as u64;

        progress.send_replace(TransferProgress::new(0, total));
        self.put(key, body).await?;
        progress.send_replace(TransferProgress::new(total, total));
        Ok(())
    }

    async fn get_file(&self, key: &str, dest: &Path, progress: &ProgressSender) -> Result<()> {
        let mut resp = self
            .fetch(key)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Object not found: {}", key)))?;
        let total = resp.content_length().unwrap_or(0);

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let staging = partial_path(dest);
        let mut file = tokio::fs::File::create(&staging).await?;
        let mut received = 0u64;

        progress.send_replace(TransferProgress::new(0, total));
        while let Some(chunk) = resp.chunk().await? {
            file.write_all(&chunk).await?;
            received += chunk.len() as u64;
            progress.send_replace(TransferProgress::new(received, total.max(received)));
        }
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&staging, dest).await?;
        Ok(())
    }

    async fn put_bytes(&self, key: &str, bytes: Vec<u8>) -> Result<()> {
        self.put(key, bytes).await
    }

    async fn get_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match self.fetch(key).await? {
            Some(resp) => Ok(Some(resp.bytes().await?.to_vec())),
            None => Ok(None),
        }
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let mut url = format!(
                "{}/{}?list-type=2&prefix={}",
                self.endpoint,
                self.bucket,
                urlencoding::encode(prefix)
            );
            if let Some(token) = &continuation {
                url.push_str("&continuation-token=");
                url.push_str(&urlencoding::encode(token));
            }
            tracing::debug!(%url, "LIST objects");

            let body = self
                .request(reqwest::Method::GET, &url)
                .send()
                .await?
                .error_for_status()?
                .text()
                .await?;

            let page = parse_list_response(&body)?;
            keys.extend(page.keys);

            match page.next_token {
                Some(token) if page.truncated => continuation = Some(token),
                _ => break,
            }
        }

        keys.sort();
        Ok(keys)
    }

    fn public_url(&self, key: &str) -> String {
        self.object_url(key)
    }
}

struct ListPage {
    keys: Vec<String>,
    truncated: bool,
    next_token: Option<String>,
}

/// Parse a ListObjectsV2 XML response.
fn parse_list_response(xml: &str) -> Result<ListPage> {
    let doc = roxmltree::Document::parse(xml)?;

    let text_of = |name: &str| {
        doc.descendants()
            .find(|n| n.has_tag_name(name))
            .and_then(|n| n.text())
            .map(str::to_string)
    };

    let keys = doc
        .descendants()
        .filter(|n| n.has_tag_name("Contents"))
        .filter_map(|n| n.children().find(|c| c.has_tag_name("Key")))
        .filter_map(|n| n.text().map(str::to_string))
        .collect();

    Ok(ListPage {
        keys,
        truncated: text_of("IsTruncated").as_deref() == Some("true"),
        next_token: text_of("NextContinuationToken"),
    })
}
