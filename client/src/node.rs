use futures::StreamExt;
use ocean_cli_shared::{
    AccessInitializeResponse, AuthTokenResponse, CliError, CliResult, ComputeEnvironment,
    ComputeJob, Ddo, FileInfo, InitializeComputeRequest, InitializeComputeResponse, NodeInfo,
    NonceResponse, StartComputeRequest, StopComputeRequest, DOWNLOAD_TIMEOUT, METADATA_TIMEOUT,
    PROVIDER_TIMEOUT,
};
use reqwest::header::CONTENT_DISPOSITION;
use reqwest::Response;
use serde_json::json;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::debug;
use url::Url;

/// HTTP client for a node's metadata cache and provider endpoints
#[derive(Debug, Clone)]
pub struct NodeClient {
    http: reqwest::Client,
    base_url: Url,
}

/// Signed query shared by the job-scoped provider endpoints
#[derive(Debug, Clone)]
pub struct SignedJobQuery<'a> {
    pub consumer_address: &'a str,
    pub job_id: &'a str,
    pub nonce: &'a str,
    pub signature: &'a str,
}

/// Signed query for the access download endpoint
#[derive(Debug, Clone)]
pub struct DownloadQuery<'a> {
    pub did: &'a str,
    pub service_id: &'a str,
    pub transfer_tx_id: &'a str,
    pub consumer_address: &'a str,
    pub nonce: &'a str,
    pub signature: &'a str,
}

impl NodeClient {
    pub fn new(base_url: Url) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> CliResult<Url> {
        self.endpoint_with_query(path, &[])
    }

    /// Resolve `path` below the base URL (keeping any base path prefix)
    fn endpoint_with_query(&self, path: &str, query: &[(&str, &str)]) -> CliResult<Url> {
        let mut base = self.base_url.clone();
        if !base.path().ends_with('/') {
            let with_slash = format!("{}/", base.path());
            base.set_path(&with_slash);
        }
        let mut url = base
            .join(path.trim_start_matches('/'))
            .map_err(|e| CliError::Configuration(format!("bad node endpoint {}: {}", path, e)))?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        debug!("→ {}", url);
        Ok(url)
    }

    /// Turn non-2xx answers into `RemoteService` errors carrying the body
    async fn check(response: Response) -> CliResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let message = if body.trim().is_empty() {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        } else {
            body
        };
        Err(CliError::RemoteService {
            status: status.as_u16(),
            message,
        })
    }

    pub async fn node_info(&self) -> CliResult<NodeInfo> {
        let response = self
            .http
            .get(self.endpoint("/")?)
            .timeout(METADATA_TIMEOUT)
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    pub async fn resolve_ddo(&self, did: &str) -> CliResult<Ddo> {
        let url = self.endpoint(&format!("/api/aquarius/assets/ddo/{}", did))?;
        let response = self.http.get(url).timeout(METADATA_TIMEOUT).send().await?;
        Ok(Self::check(response).await?.json().await?)
    }

    /// Next nonce to use for a signed request from `address`
    pub async fn next_nonce(&self, address: &str) -> CliResult<String> {
        let response = self
            .http
            .get(self.endpoint_with_query("/api/services/nonce", &[("userAddress", address)])?)
            .timeout(PROVIDER_TIMEOUT)
            .send()
            .await?;
        let current: NonceResponse = Self::check(response).await?.json().await?;
        let value: u64 = current.nonce.trim().parse().map_err(|_| CliError::RemoteService {
            status: 200,
            message: format!("node returned a malformed nonce: {:?}", current.nonce),
        })?;
        let next = value.checked_add(1).ok_or_else(|| CliError::RemoteService {
            status: 200,
            message: "node nonce is at its maximum".to_string(),
        })?;
        Ok(next.to_string())
    }

    /// Provider-side encryption of a document; returns 0x-hex
    pub async fn encrypt(&self, chain_id: u64, data: Vec<u8>) -> CliResult<String> {
        let chain_id = chain_id.to_string();
        let response = self
            .http
            .post(self.endpoint_with_query(
                "/api/services/encrypt",
                &[("chainId", chain_id.as_str())],
            )?)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(data)
            .timeout(PROVIDER_TIMEOUT)
            .send()
            .await?;
        Ok(Self::check(response).await?.text().await?.trim().to_string())
    }

    pub async fn file_info(&self, did: &str, service_id: &str) -> CliResult<Vec<FileInfo>> {
        let response = self
            .http
            .post(self.endpoint("/api/services/fileInfo")?)
            .json(&json!({ "did": did, "serviceId": service_id, "checksum": true }))
            .timeout(PROVIDER_TIMEOUT)
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    pub async fn initialize_access(
        &self,
        did: &str,
        service_id: &str,
        consumer_address: &str,
    ) -> CliResult<AccessInitializeResponse> {
        let response = self
            .http
            .get(self.endpoint_with_query("/api/services/initialize", &[
                ("documentId", did),
                ("serviceId", service_id),
                ("consumerAddress", consumer_address),
                ("fileIndex", "0"),
            ])?)
            .timeout(PROVIDER_TIMEOUT)
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    pub async fn download(&self, query: &DownloadQuery<'_>) -> CliResult<Response> {
        let response = self
            .http
            .get(self.endpoint_with_query("/api/services/download", &[
                ("documentId", query.did),
                ("serviceId", query.service_id),
                ("transferTxId", query.transfer_tx_id),
                ("consumerAddress", query.consumer_address),
                ("fileIndex", "0"),
                ("nonce", query.nonce),
                ("signature", query.signature),
            ])?)
            .timeout(DOWNLOAD_TIMEOUT)
            .send()
            .await?;
        Self::check(response).await
    }

    pub async fn compute_environments(&self) -> CliResult<Vec<ComputeEnvironment>> {
        let response = self
            .http
            .get(self.endpoint("/api/services/computeEnvironments")?)
            .timeout(PROVIDER_TIMEOUT)
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    /// `None` when the provider answers with an empty or null body
    pub async fn initialize_compute(
        &self,
        request: &InitializeComputeRequest,
    ) -> CliResult<Option<InitializeComputeResponse>> {
        let response = self
            .http
            .post(self.endpoint("/api/services/initializeCompute")?)
            .json(request)
            .timeout(PROVIDER_TIMEOUT)
            .send()
            .await?;
        let body = Self::check(response).await?.text().await?;
        if body.trim().is_empty() || body.trim() == "null" {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(&body)?))
    }

    pub async fn start_compute(&self, request: &StartComputeRequest) -> CliResult<Vec<ComputeJob>> {
        self.post_jobs("/api/services/compute", request).await
    }

    pub async fn start_free_compute(
        &self,
        request: &StartComputeRequest,
    ) -> CliResult<Vec<ComputeJob>> {
        self.post_jobs("/api/services/freeCompute", request).await
    }

    async fn post_jobs(
        &self,
        path: &str,
        request: &StartComputeRequest,
    ) -> CliResult<Vec<ComputeJob>> {
        let response = self
            .http
            .post(self.endpoint(path)?)
            .json(request)
            .timeout(PROVIDER_TIMEOUT)
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    pub async fn compute_status(
        &self,
        consumer_address: &str,
        job_id: &str,
        agreement_id: Option<&str>,
    ) -> CliResult<Vec<ComputeJob>> {
        let mut query = vec![("consumerAddress", consumer_address), ("jobId", job_id)];
        if let Some(agreement_id) = agreement_id {
            query.push(("agreementId", agreement_id));
        }
        let response = self
            .http
            .get(self.endpoint_with_query("/api/services/compute", &query)?)
            .timeout(PROVIDER_TIMEOUT)
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    pub async fn stop_compute(&self, request: &StopComputeRequest) -> CliResult<Vec<ComputeJob>> {
        let response = self
            .http
            .put(self.endpoint("/api/services/compute")?)
            .json(request)
            .timeout(PROVIDER_TIMEOUT)
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    /// Open the log stream of a running job; read it with [`stream_to_stdout`]
    pub async fn streamable_logs(&self, query: &SignedJobQuery<'_>) -> CliResult<Response> {
        let response = self
            .http
            .get(self.endpoint_with_query("/api/services/computeStreamableLogs", &[
                ("consumerAddress", query.consumer_address),
                ("jobId", query.job_id),
                ("nonce", query.nonce),
                ("signature", query.signature),
            ])?)
            .send()
            .await?;
        Self::check(response).await
    }

    pub async fn compute_result(
        &self,
        query: &SignedJobQuery<'_>,
        index: u32,
    ) -> CliResult<Response> {
        let index = index.to_string();
        let response = self
            .http
            .get(self.endpoint_with_query("/api/services/computeResult", &[
                ("consumerAddress", query.consumer_address),
                ("jobId", query.job_id),
                ("index", index.as_str()),
                ("nonce", query.nonce),
                ("signature", query.signature),
            ])?)
            .timeout(DOWNLOAD_TIMEOUT)
            .send()
            .await?;
        Self::check(response).await
    }

    pub async fn generate_auth_token(
        &self,
        address: &str,
        nonce: &str,
        signature: &str,
        valid_until: Option<u64>,
    ) -> CliResult<String> {
        let mut body = json!({ "address": address, "nonce": nonce, "signature": signature });
        if let Some(valid_until) = valid_until {
            body["validUntil"] = json!(valid_until);
        }
        let response = self
            .http
            .post(self.endpoint("/api/services/auth/token")?)
            .json(&body)
            .timeout(PROVIDER_TIMEOUT)
            .send()
            .await?;
        let token: AuthTokenResponse = Self::check(response).await?.json().await?;
        Ok(token.token)
    }

    pub async fn invalidate_auth_token(
        &self,
        address: &str,
        nonce: &str,
        signature: &str,
        token: &str,
    ) -> CliResult<()> {
        let response = self
            .http
            .post(self.endpoint("/api/services/auth/token/invalidate")?)
            .json(&json!({
                "address": address,
                "nonce": nonce,
                "signature": signature,
                "token": token,
            }))
            .timeout(PROVIDER_TIMEOUT)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }
}

/// File name announced by the server, without any directory part
pub fn filename_from_disposition(header: &str) -> Option<String> {
    header
        .split(';')
        .map(str::trim)
        .find_map(|part| part.strip_prefix("filename="))
        .map(|name| name.trim_matches('"'))
        .and_then(|name| Path::new(name).file_name())
        .map(|name| name.to_string_lossy().to_string())
        .filter(|name| !name.is_empty())
}

/// Stream a response body into `folder`, naming the file from the
/// Content-Disposition header or `fallback_name`. Returns the written path.
pub async fn save_response(
    response: Response,
    folder: &Path,
    fallback_name: &str,
) -> CliResult<PathBuf> {
    let name = response
        .headers()
        .get(CONTENT_DISPOSITION)
        .and_then(|value| value.to_str().ok())
        .and_then(filename_from_disposition)
        .unwrap_or_else(|| fallback_name.to_string());

    tokio::fs::create_dir_all(folder).await?;
    let path = folder.join(name);
    let mut file = tokio::fs::File::create(&path).await?;

    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        file.write_all(&chunk?).await?;
    }
    file.flush().await?;
    Ok(path)
}

/// Copy a streaming body to stdout until the server closes it
pub async fn stream_to_stdout(response: Response) -> CliResult<u64> {
    let mut stdout = tokio::io::stdout();
    let mut written = 0u64;
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        written += chunk.len() as u64;
        stdout.write_all(&chunk).await?;
        stdout.flush().await?;
    }
    Ok(written)
}
