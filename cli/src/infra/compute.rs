//! Infrastructure implementation of the `ControlPlane` port for Google
//! Compute Engine, over the v1 REST API.
//!
//! The access token is resolved on the first request, so constructing the
//! client (e.g. in dry-run mode) never touches credentials.

use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::OnceCell;
use tracing::debug;

use crate::application::ports::{CommandRunner, ControlPlane};
use crate::domain::{AsyncOperation, ControlPlaneError, InstanceRef, OperationStatus};

/// Public Compute Engine v1 endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://compute.googleapis.com/compute/v1";

/// Env var overriding the endpoint.
pub const ENDPOINT_ENV: &str = "SPROUT_COMPUTE_ENDPOINT";

/// Env vars checked, in order, for a ready-made bearer token.
pub const TOKEN_ENVS: &[&str] = &["SPROUT_ACCESS_TOKEN", "GOOGLE_OAUTH_ACCESS_TOKEN"];

const HTTP_TIMEOUT: Duration = Duration::from_secs(60);
const GCLOUD_TIMEOUT: Duration = Duration::from_secs(30);

/// Compute Engine client. Generic over `R: CommandRunner` so the `gcloud`
/// token fallback can be mocked.
pub struct GceCompute<R: CommandRunner> {
    client: Client,
    endpoint: String,
    token: OnceCell<String>,
    runner: R,
}

impl<R: CommandRunner> GceCompute<R> {
    /// Build a client for the endpoint in `SPROUT_COMPUTE_ENDPOINT`, or the
    /// public endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(runner: R) -> anyhow::Result<Self> {
        let endpoint = std::env::var(ENDPOINT_ENV).unwrap_or_else(|_| DEFAULT_ENDPOINT.to_string());
        let client = Client::builder().timeout(HTTP_TIMEOUT).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            token: OnceCell::new(),
            runner,
        })
    }

    async fn token(&self) -> Result<&str, ControlPlaneError> {
        self.token
            .get_or_try_init(|| async {
                if let Some(token) = TOKEN_ENVS
                    .iter()
                    .find_map(|name| std::env::var(name).ok().filter(|t| !t.trim().is_empty()))
                {
                    return Ok(token.trim().to_string());
                }
                self.gcloud_token().await
            })
            .await
            .map(String::as_str)
    }

    async fn gcloud_token(&self) -> Result<String, ControlPlaneError> {
        debug!("requesting access token from gcloud");
        let args = ["auth".to_string(), "print-access-token".to_string()];
        let output = self
            .runner
            .run_in_dir("gcloud", &args, &std::env::temp_dir(), GCLOUD_TIMEOUT)
            .await
            .map_err(|e| ControlPlaneError::Transport(format!("cannot obtain access token: {e}")))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ControlPlaneError::Transport(format!(
                "cannot obtain access token: gcloud failed: {}",
                stderr.trim()
            )));
        }
        let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if token.is_empty() {
            return Err(ControlPlaneError::Transport(
                "cannot obtain access token: gcloud printed nothing".to_string(),
            ));
        }
        Ok(token)
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        debug!(%method, url, "compute request");
        self.client.request(method, url)
    }

    async fn send(
        &self,
        request: RequestBuilder,
        body: Option<Value>,
        resource: &str,
    ) -> Result<Value, ControlPlaneError> {
        let token = self.token().await?;
        let mut request = request.bearer_auth(token);
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request
            .send()
            .await
            .map_err(|e| ControlPlaneError::Transport(format!("{resource}: {e}")))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ControlPlaneError::Transport(format!("{resource}: {e}")))?;
        classify(status, &text, resource)
    }

    async fn mutate(
        &self,
        method: Method,
        url: &str,
        body: Option<Value>,
        resource: &str,
    ) -> Result<AsyncOperation, ControlPlaneError> {
        let value = self.send(self.request(method, url), body, resource).await?;
        parse_operation(value)
    }
}

impl<R: CommandRunner> ControlPlane for GceCompute<R> {
    async fn stop_instance(
        &self,
        project: &str,
        zone: &str,
        name: &str,
    ) -> Result<AsyncOperation, ControlPlaneError> {
        let url = format!("{}/stop", instance_url(&self.endpoint, project, zone, name));
        self.mutate(Method::POST, &url, None, &format!("instance {name}"))
            .await
    }

    async fn delete_instance(
        &self,
        project: &str,
        zone: &str,
        name: &str,
    ) -> Result<AsyncOperation, ControlPlaneError> {
        let url = instance_url(&self.endpoint, project, zone, name);
        self.mutate(Method::DELETE, &url, None, &format!("instance {name}"))
            .await
    }

    async fn create_image(
        &self,
        project: &str,
        name: &str,
        source_disk: &str,
        force: bool,
    ) -> Result<AsyncOperation, ControlPlaneError> {
        let url = format!("{}/projects/{project}/global/images", self.endpoint);
        let request = self
            .request(Method::POST, &url)
            .query(&[("forceCreate", force)]);
        let body = json!({ "name": name, "sourceDisk": source_disk });
        let value = self
            .send(request, Some(body), &format!("disk {source_disk}"))
            .await?;
        parse_operation(value)
    }

    async fn delete_image(
        &self,
        project: &str,
        name: &str,
    ) -> Result<AsyncOperation, ControlPlaneError> {
        let url = format!("{}/projects/{project}/global/images/{name}", self.endpoint);
        self.mutate(Method::DELETE, &url, None, &format!("image {name}"))
            .await
    }

    async fn list_group_instances(
        &self,
        project: &str,
        zone: &str,
        group: &str,
        running_only: bool,
    ) -> Result<Vec<InstanceRef>, ControlPlaneError> {
        let base = format!(
            "{}/projects/{project}/zones/{zone}/instanceGroups/{group}/listInstances",
            self.endpoint
        );
        let state = if running_only { "RUNNING" } else { "ALL" };
        let mut members = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let request = with_page_token(self.request(Method::POST, &base), page_token.as_deref());
            let value = self
                .send(
                    request,
                    Some(json!({ "instanceState": state })),
                    &format!("instance group {group}"),
                )
                .await?;
            let page = parse_member_page(value)?;
            members.extend(page.members);
            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }
        Ok(members)
    }

    async fn operation_status(
        &self,
        operation: &AsyncOperation,
    ) -> Result<AsyncOperation, ControlPlaneError> {
        let value = self
            .send(
                self.request(Method::GET, &operation.self_link),
                None,
                &format!("operation {}", operation.name),
            )
            .await?;
        parse_operation(value)
    }
}

fn with_page_token(request: RequestBuilder, token: Option<&str>) -> RequestBuilder {
    match token {
        Some(token) => request.query(&[("pageToken", token)]),
        None => request,
    }
}

fn instance_url(endpoint: &str, project: &str, zone: &str, name: &str) -> String {
    format!("{endpoint}/projects/{project}/zones/{zone}/instances/{name}")
}

/// Map an HTTP response onto the control-plane error taxonomy.
fn classify(status: StatusCode, body: &str, resource: &str) -> Result<Value, ControlPlaneError> {
    if status == StatusCode::NOT_FOUND {
        return Err(ControlPlaneError::NotFound(resource.to_string()));
    }
    if !status.is_success() {
        let message = serde_json::from_str::<Value>(body)
            .ok()
            .and_then(|v| v["error"]["message"].as_str().map(String::from))
            .unwrap_or_else(|| body.trim().to_string());
        return Err(ControlPlaneError::Transport(format!(
            "{resource}: HTTP {status}: {message}"
        )));
    }
    serde_json::from_str(body)
        .map_err(|e| ControlPlaneError::Transport(format!("{resource}: invalid JSON: {e}")))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OperationResource {
    name: String,
    #[serde(default)]
    kind: String,
    #[serde(default)]
    operation_type: String,
    status: OperationStatus,
    self_link: String,
    #[serde(default)]
    error: Option<OperationErrors>,
}

#[derive(Deserialize)]
struct OperationErrors {
    #[serde(default)]
    errors: Vec<OperationErrorItem>,
}

#[derive(Deserialize)]
struct OperationErrorItem {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

fn parse_operation(value: Value) -> Result<AsyncOperation, ControlPlaneError> {
    let op: OperationResource = serde_json::from_value(value)
        .map_err(|e| ControlPlaneError::Transport(format!("unexpected operation payload: {e}")))?;
    let error = op.error.map(|e| {
        e.errors
            .iter()
            .map(|item| format!("{}: {}", item.code, item.message))
            .collect::<Vec<_>>()
            .join("; ")
    });
    Ok(AsyncOperation {
        name: op.name,
        kind: op.kind,
        operation_type: op.operation_type,
        status: op.status,
        self_link: op.self_link,
        error,
    })
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MemberList {
    #[serde(default)]
    items: Vec<MemberItem>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
struct MemberItem {
    instance: String,
}

struct MemberPage {
    members: Vec<InstanceRef>,
    next_page_token: Option<String>,
}

fn parse_member_page(value: Value) -> Result<MemberPage, ControlPlaneError> {
    let list: MemberList = serde_json::from_value(value)
        .map_err(|e| ControlPlaneError::Transport(format!("unexpected instance list payload: {e}")))?;
    Ok(MemberPage {
        members: list
            .items
            .iter()
            .map(|item| InstanceRef::from_url(&item.instance))
            .collect(),
        next_page_token: list.next_page_token,
    })
}
