use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{ActivityBackend, BackendError, BackendResult};
use crate::{models::UserId, settings::BackendSettings};

const ACTIVITY_TABLE: &str = "user_activity";
const LOG_ONLINE_TIME_RPC: &str = "log_online_time";
const DAILY_LOGIN_RPC: &str = "handle_daily_login";

#[derive(Debug, Serialize)]
struct ActivityRow<'a> {
    user_id: &'a str,
    last_activity: String,
}

#[derive(Debug, Serialize)]
struct LogOnlineTimeArgs<'a> {
    p_user_id: &'a str,
    p_hours: f64,
}

#[derive(Debug, Serialize)]
struct DailyLoginArgs<'a> {
    p_user_id: &'a str,
}

/// PostgREST-style client for the hosted backend.
pub struct RestBackend {
    base_url: String,
    api_key: String,
    access_token: Option<String>,
    timeout: Duration,
    client: reqwest::Client,
}

impl RestBackend {
    pub fn new(settings: &BackendSettings) -> BackendResult<Self> {
        let base_url = settings.url.trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(BackendError::NotConfigured("backend url is empty".into()));
        }
        if settings.api_key.trim().is_empty() {
            return Err(BackendError::NotConfigured("api key is empty".into()));
        }

        let timeout = settings.request_timeout();
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            base_url,
            api_key: settings.api_key.clone(),
            access_token: settings.access_token.clone(),
            timeout,
            client,
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Swap in the session JWT once the member signs in.
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn rpc_url(&self, function: &str) -> String {
        format!("{}/rest/v1/rpc/{}", self.base_url, function)
    }

    fn bearer(&self) -> &str {
        self.access_token.as_deref().unwrap_or(&self.api_key)
    }

    async fn post<T: Serialize + ?Sized>(
        &self,
        url: String,
        body: &T,
        prefer: Option<&str>,
    ) -> BackendResult<()> {
        let mut request = self
            .client
            .post(&url)
            .header("apikey", &self.api_key)
            .bearer_auth(self.bearer())
            .json(body);
        if let Some(prefer) = prefer {
            request = request.header("Prefer", prefer);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Status { status, body });
        }
        Ok(())
    }
}

#[async_trait]
impl ActivityBackend for RestBackend {
    async fn upsert_activity(&self, user_id: &UserId, at: DateTime<Utc>) -> BackendResult<()> {
        let rows = [ActivityRow {
            user_id: user_id.as_str(),
            last_activity: at.to_rfc3339(),
        }];
        let url = format!("{}?on_conflict=user_id", self.table_url(ACTIVITY_TABLE));
        self.post(url, &rows, Some("resolution=merge-duplicates,return=minimal"))
            .await
    }

    async fn log_online_hours(&self, user_id: &UserId, hours: f64) -> BackendResult<()> {
        let args = LogOnlineTimeArgs {
            p_user_id: user_id.as_str(),
            p_hours: hours,
        };
        self.post(self.rpc_url(LOG_ONLINE_TIME_RPC), &args, None)
            .await
    }

    async fn trigger_daily_login(&self, user_id: &UserId) -> BackendResult<()> {
        let args = DailyLoginArgs {
            p_user_id: user_id.as_str(),
        };
        self.post(self.rpc_url(DAILY_LOGIN_RPC), &args, None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn settings(url: &str) -> BackendSettings {
        BackendSettings {
            url: url.into(),
            api_key: "anon".into(),
            ..BackendSettings::default()
        }
    }

    #[test]
    fn rejects_missing_url() {
        let result = RestBackend::new(&settings("  "));
        assert!(matches!(result, Err(BackendError::NotConfigured(_))));
    }

    #[test]
    fn builds_rest_and_rpc_urls() {
        let backend = RestBackend::new(&settings("https://example.supabase.co/")).unwrap();
        assert_eq!(
            backend.table_url(ACTIVITY_TABLE),
            "https://example.supabase.co/rest/v1/user_activity"
        );
        assert_eq!(
            backend.rpc_url(LOG_ONLINE_TIME_RPC),
            "https://example.supabase.co/rest/v1/rpc/log_online_time"
        );
    }

    #[test]
    fn bearer_prefers_access_token() {
        let backend = RestBackend::new(&settings("https://example.test")).unwrap();
        assert_eq!(backend.bearer(), "anon");
        let backend = backend.with_access_token("jwt");
        assert_eq!(backend.bearer(), "jwt");
    }

    #[test]
    fn rpc_payloads_use_prefixed_arguments() {
        let args = LogOnlineTimeArgs {
            p_user_id: "u1",
            p_hours: 0.25,
        };
        assert_eq!(
            serde_json::to_value(&args).unwrap(),
            json!({ "p_user_id": "u1", "p_hours": 0.25 })
        );
        assert_eq!(
            serde_json::to_value(DailyLoginArgs { p_user_id: "u1" }).unwrap(),
            json!({ "p_user_id": "u1" })
        );
    }

    #[tokio::test]
    async fn unresponsive_server_times_out() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let mut settings = settings(&format!("http://{addr}"));
        settings.request_timeout_secs = 1;
        let backend = RestBackend::new(&settings).unwrap();
        assert_eq!(backend.timeout(), Duration::from_secs(1));

        let result = tokio::time::timeout(
            Duration::from_secs(10),
            backend.trigger_daily_login(&UserId::new("alice")),
        )
        .await;
        assert!(matches!(result, Ok(Err(BackendError::Transport(_)))));
        server.abort();
    }
}
