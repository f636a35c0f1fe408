use reqwest::header::COOKIE;
use reqwest::Client;
use serde_json::{json, Value};

use super::check_status;
use crate::utils::error::AppResult;

const SERVICE: &str = "auth-service";

/// Client for the Google-session auth microservice. Calls forward the
/// caller's session cookie untouched.
#[derive(Clone, Debug)]
pub struct AuthServiceClient {
    http: Client,
    base_url: String,
}

impl AuthServiceClient {
    pub fn new(http: Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json(&self, path: &str, cookie: &str) -> AppResult<Value> {
        let response = self
            .http
            .get(self.url(path))
            .header(COOKIE, cookie)
            .send()
            .await?;
        Ok(check_status(SERVICE, response).await?.json().await?)
    }

    /// `/auth/me`: the Google profile behind the session.
    pub async fn me(&self, cookie: &str) -> AppResult<Value> {
        self.get_json("/auth/me", cookie).await
    }

    pub async fn users(&self, cookie: &str) -> AppResult<Value> {
        self.get_json("/auth/users", cookie).await
    }

    pub async fn users_list(&self, cookie: &str) -> AppResult<Value> {
        self.get_json("/auth/users/list", cookie).await
    }

    pub async fn set_key_crm(&self, cookie: &str, user_id: &str, key_crm: &str) -> AppResult<Value> {
        let response = self
            .http
            .put(self.url(&format!("/auth/users/{user_id}/key_crm")))
            .header(COOKIE, cookie)
            .json(&json!({ "key_crm": key_crm }))
            .send()
            .await?;
        Ok(check_status(SERVICE, response).await?.json().await?)
    }
}
