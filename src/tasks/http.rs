//! Task dispatch over the `/internal/*` HTTP endpoints

use super::{Task, TaskDispatcher};
use crate::error::{Error, Result};
use async_trait::async_trait;
use tracing::debug;

/// Posts each task as a form to `{base_url}/internal/{endpoint}`
#[derive(Clone, Debug)]
pub struct HttpTaskDispatcher {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpTaskDispatcher {
    /// Create a dispatcher targeting the task host at `base_url`
    pub fn new(client: reqwest::Client, base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        }
    }

    /// Full URL of a task's endpoint
    pub fn endpoint_url(&self, task: &Task) -> String {
        format!("{}/internal/{}", self.base_url, task.endpoint())
    }
}

#[async_trait]
impl TaskDispatcher for HttpTaskDispatcher {
    async fn dispatch(&self, task: Task) -> Result<()> {
        let url = self.endpoint_url(&task);
        let mut form = task.to_form();
        form.api_key = self.api_key.clone();

        let response = self
            .client
            .post(&url)
            .form(&form)
            .send()
            .await
            .map_err(|e| Error::TaskDispatch(format!("Failed to post {}: {}", task, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::TaskDispatch(format!(
                "Task endpoint returned status {} for {}: {}",
                status, task, body
            )));
        }

        debug!(task = %task, url = %url, "task dispatched");
        Ok(())
    }
}
