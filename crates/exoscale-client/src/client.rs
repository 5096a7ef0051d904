//! HTTP plumbing shared by the v2, v1 and DNS surfaces

use crate::config::ClientConfig;
use crate::error::{ApiError, Result};
use crate::poll::{Poll, poll_until};
use crate::signer;
use reqwest::Method;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Lifetime of a v2 request signature
const SIGNATURE_TTL_SECS: i64 = 600;

/// Exoscale API client
///
/// Holds one pooled HTTP transport; cheap to share behind an `Arc` and safe
/// for concurrent use.
#[derive(Debug, Clone)]
pub struct Client {
    http: reqwest::Client,
    config: ClientConfig,
}

/// Reference to another v2 resource by ID
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdRef {
    pub id: String,
}

impl IdRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// v2 asynchronous operation
#[derive(Debug, Clone, Deserialize)]
pub struct Operation {
    pub id: String,
    pub state: String,
    #[serde(default)]
    pub reference: Option<IdRef>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

impl Operation {
    /// ID of the resource the operation acted on, if the API reported one
    pub fn reference_id(&self) -> Option<&str> {
        self.reference.as_ref().map(|r| r.id.as_str())
    }
}

/// Query parameters of a v1 command
#[derive(Debug, Clone, Default)]
pub struct Params(Vec<(String, String)>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, key: &str, value: impl ToString) -> Self {
        self.0.push((key.to_string(), value.to_string()));
        self
    }

    pub fn set_opt(self, key: &str, value: Option<impl ToString>) -> Self {
        match value {
            Some(v) => self.set(key, v),
            None => self,
        }
    }

    /// Comma-joined list parameter, skipped when empty
    pub fn set_list(self, key: &str, values: &[String]) -> Self {
        if values.is_empty() {
            self
        } else {
            self.set(key, values.join(","))
        }
    }

    /// Indexed map parameter: `tags[0].key=..&tags[0].value=..`
    pub fn set_map(mut self, key: &str, map: &BTreeMap<String, String>) -> Self {
        for (i, (k, v)) in map.iter().enumerate() {
            self.0.push((format!("{}[{}].key", key, i), k.clone()));
            self.0.push((format!("{}[{}].value", key, i), v.clone()));
        }
        self
    }

    pub fn into_inner(self) -> Vec<(String, String)> {
        self.0
    }
}

#[derive(Debug, Deserialize)]
struct AsyncJob {
    jobid: String,
}

#[derive(Debug, Deserialize)]
struct AsyncJobResult {
    jobid: String,
    jobstatus: u8,
    #[serde(default)]
    jobresult: serde_json::Value,
}

impl Client {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!(
                "terraform-provider-exoscale/",
                env!("CARGO_PKG_VERSION")
            ))
            .build()?;

        Ok(Self { http, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    // ============ v2 ============

    pub(crate) async fn v2_get<T: DeserializeOwned>(&self, zone: &str, path: &str) -> Result<T> {
        self.v2_request(zone, Method::GET, path, &[], None::<&()>)
            .await
    }

    pub(crate) async fn v2_request<T, B>(
        &self,
        zone: &str,
        method: Method,
        path: &str,
        query: &[(String, String)],
        body: Option<&B>,
    ) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let url = format!("{}{}", self.config.v2_endpoint(zone), path);
        let payload = match body {
            Some(b) => serde_json::to_vec(b)?,
            None => Vec::new(),
        };

        let expires = chrono::Utc::now().timestamp() + SIGNATURE_TTL_SECS;
        let authorization = signer::v2_authorization(
            &self.config.credentials,
            method.as_str(),
            &format!("/v2{}", path),
            &payload,
            query,
            expires,
        )?;

        tracing::debug!("v2 {} {}", method, url);

        let mut request = self
            .http
            .request(method, &url)
            .header(AUTHORIZATION, authorization)
            .header(ACCEPT, "application/json");
        if !query.is_empty() {
            request = request.query(query);
        }
        if body.is_some() {
            request = request.header(CONTENT_TYPE, "application/json").body(payload);
        }

        let response = request.send().await?;
        Self::decode(response).await
    }

    /// Submit a mutating v2 call and wait for its operation to succeed.
    pub(crate) async fn v2_operation<B>(
        &self,
        zone: &str,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<Operation>
    where
        B: Serialize + ?Sized,
    {
        let operation: Operation = self.v2_request(zone, method, path, &[], body).await?;
        self.wait_operation(zone, operation).await
    }

    pub(crate) async fn wait_operation(&self, zone: &str, operation: Operation) -> Result<Operation> {
        let path = format!("/operation/{}", operation.id);
        let what = format!("operation {}", operation.id);
        let mut submitted = Some(operation);

        poll_until(&self.config.poll, &what, || {
            let submitted = submitted.take();
            let path = path.as_str();
            async move {
                let op = match submitted {
                    Some(op) => op,
                    None => self.v2_get::<Operation>(zone, path).await?,
                };
                operation_status(op)
            }
        })
        .await
    }

    // ============ v1 ============

    /// Issue a synchronous v1 command and return the `<command>response` body.
    pub(crate) async fn v1_request(&self, command: &str, params: Params) -> Result<serde_json::Value> {
        let mut query = params.into_inner();
        query.push(("command".to_string(), command.to_string()));
        query.push(("apiKey".to_string(), self.config.credentials.key.clone()));
        query.push(("response".to_string(), "json".to_string()));
        let signature = signer::v1_signature(&self.config.credentials.secret, &query)?;
        query.push(("signature".to_string(), signature));

        tracing::debug!("v1 {}", command);

        let response = self
            .http
            .get(&self.config.compute_endpoint)
            .query(&query)
            .send()
            .await?;
        let status = response.status();
        let text = response.text().await?;

        let value: serde_json::Value = match serde_json::from_str(&text) {
            Ok(v) => v,
            Err(_) if !status.is_success() => {
                return Err(ApiError::from_status(status.as_u16(), text));
            }
            Err(e) => return Err(e.into()),
        };

        let key = format!("{}response", command.to_lowercase());
        let inner = value
            .get(&key)
            .or_else(|| value.get("errorresponse"))
            .cloned()
            .unwrap_or(serde_json::Value::Null);

        if let Some(code) = inner.get("errorcode").and_then(|c| c.as_u64()) {
            let text = inner
                .get("errortext")
                .and_then(|t| t.as_str())
                .unwrap_or_default();
            return Err(ApiError::from_v1(code, text));
        }
        if !status.is_success() {
            return Err(ApiError::from_status(status.as_u16(), text));
        }

        Ok(inner)
    }

    /// Submit an asynchronous v1 command and poll its job to completion,
    /// returning the job result.
    pub(crate) async fn v1_async(&self, command: &str, params: Params) -> Result<serde_json::Value> {
        let job: AsyncJob = serde_json::from_value(self.v1_request(command, params).await?)?;
        let what = format!("{} job {}", command, job.jobid);

        poll_until(&self.config.poll, &what, || async {
            let result: AsyncJobResult = serde_json::from_value(
                self.v1_request("queryAsyncJobResult", Params::new().set("jobid", &job.jobid))
                    .await?,
            )?;
            match result.jobstatus {
                0 => Ok(Poll::Pending),
                1 => Ok(Poll::Ready(result.jobresult)),
                _ => {
                    let message = result
                        .jobresult
                        .get("errortext")
                        .and_then(|t| t.as_str())
                        .unwrap_or("unknown error")
                        .to_string();
                    let code = result
                        .jobresult
                        .get("errorcode")
                        .and_then(|c| c.as_u64());
                    Err(match code {
                        Some(code) if code != 530 => ApiError::from_v1(code, message),
                        _ => ApiError::JobFailed {
                            job_id: result.jobid,
                            message,
                        },
                    })
                }
            }
        })
        .await
    }

    // ============ DNS ============

    pub(crate) async fn dns_request<T, B>(&self, method: Method, path: &str, body: Option<&B>) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let url = format!(
            "{}/v1{}",
            self.config.dns_endpoint.trim_end_matches('/'),
            path
        );
        let token = format!(
            "{}:{}",
            self.config.credentials.key, self.config.credentials.secret
        );

        tracing::debug!("dns {} {}", method, url);

        let mut request = self
            .http
            .request(method, &url)
            .header("X-DNS-Token", token)
            .header(ACCEPT, "application/json");
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        Self::decode(response).await
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(ApiError::from_status(status.as_u16(), text));
        }

        let body = if text.trim().is_empty() { "null" } else { text.as_str() };
        Ok(serde_json::from_str(body)?)
    }
}

fn operation_status(op: Operation) -> Result<Poll<Operation>> {
    match op.state.as_str() {
        "success" => Ok(Poll::Ready(op)),
        "pending" => Ok(Poll::Pending),
        state => Err(ApiError::OperationFailed {
            id: op.id.clone(),
            state: state.to_string(),
            message: op.message.or(op.reason).unwrap_or_default(),
        }),
    }
}

/// Deserialize `value[key]`, treating a missing key as an empty value.
pub(crate) fn take<T: DeserializeOwned + Default>(value: &serde_json::Value, key: &str) -> Result<T> {
    match value.get(key) {
        Some(v) if !v.is_null() => Ok(serde_json::from_value(v.clone())?),
        _ => Ok(T::default()),
    }
}

/// Deserialize `value[key]`, failing with NotFound when it is missing.
pub(crate) fn take_required<T: DeserializeOwned>(value: &serde_json::Value, key: &str) -> Result<T> {
    match value.get(key) {
        Some(v) if !v.is_null() => Ok(serde_json::from_value(v.clone())?),
        _ => Err(ApiError::NotFound(format!("response has no {}", key))),
    }
}
