// src/utils/http.rs

//! HTTP client utilities.
//!
//! Scrapers talk to the site through the [`Fetcher`] trait so the session
//! handling stays out of the pipeline and tests can substitute canned pages.

use async_trait::async_trait;
use reqwest::header::{COOKIE, HeaderMap, HeaderValue, REFERER};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::SiteConfig;

/// Status and raw body of one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub body: Vec<u8>,
}

impl Response {
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Turn a non-success status into an error.
    pub fn error_for_status(self, path: &str) -> Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(AppError::status(path, self.status))
        }
    }
}

/// Request/response access to the site, with the session already attached.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// GET `path` (relative to the site root) with query parameters.
    async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<Response>;

    /// POST a urlencoded form to `path`.
    async fn post_form(
        &self,
        path: &str,
        query: &[(&str, String)],
        form: &[(&str, String)],
    ) -> Result<Response>;
}

/// Create a configured asynchronous HTTP client carrying a session cookie.
pub fn create_async_client(site: &SiteConfig, cookie: &str) -> Result<reqwest::Client> {
    let mut headers = HeaderMap::new();
    let cookie = HeaderValue::from_str(&format!("{}={}", site.auth_cookie_name, cookie))
        .map_err(|e| AppError::config(format!("Invalid session cookie: {e}")))?;
    headers.insert(COOKIE, cookie);
    let referer = HeaderValue::from_str(&site.base_url)
        .map_err(|e| AppError::config(format!("Invalid base URL header: {e}")))?;
    headers.insert(REFERER, referer);

    let client = reqwest::Client::builder()
        .user_agent(&site.user_agent)
        .timeout(site.timeout())
        .default_headers(headers)
        .build()?;
    Ok(client)
}

/// [`Fetcher`] backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpFetcher {
    pub fn new(site: &SiteConfig, cookie: &str) -> Result<Self> {
        Ok(Self {
            client: create_async_client(site, cookie)?,
            base_url: Url::parse(&site.base_url)?,
        })
    }

    fn url(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path)?)
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<Response> {
        let response = self.client.get(self.url(path)?).query(query).send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?.to_vec();
        Ok(Response { status, body })
    }

    async fn post_form(
        &self,
        path: &str,
        query: &[(&str, String)],
        form: &[(&str, String)],
    ) -> Result<Response> {
        let response = self
            .client
            .post(self.url(path)?)
            .query(query)
            .form(form)
            .send()
            .await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?.to_vec();
        Ok(Response { status, body })
    }
}

#[cfg(test)]
pub(crate) mod stub {
    //! Canned-page [`Fetcher`] for tests.

    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;

    use super::*;

    /// One recorded call.
    #[derive(Debug, Clone)]
    pub struct Request {
        pub method: &'static str,
        pub path: String,
        pub query: Vec<(String, String)>,
        pub form: Vec<(String, String)>,
    }

    impl Request {
        pub fn param(&self, key: &str) -> Option<&str> {
            self.query
                .iter()
                .chain(self.form.iter())
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str())
        }
    }

    /// Serves queued responses per path; the last one queued for a path repeats.
    #[derive(Default)]
    pub struct StubFetcher {
        responses: Mutex<HashMap<String, VecDeque<Response>>>,
        requests: Mutex<Vec<Request>>,
    }

    impl StubFetcher {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn push(&self, path: &str, response: Response) -> &Self {
            self.responses
                .lock()
                .unwrap()
                .entry(path.to_string())
                .or_default()
                .push_back(response);
            self
        }

        pub fn requests(&self) -> Vec<Request> {
            self.requests.lock().unwrap().clone()
        }

        fn respond(
            &self,
            method: &'static str,
            path: &str,
            query: &[(&str, String)],
            form: &[(&str, String)],
        ) -> Result<Response> {
            let owned = |pairs: &[(&str, String)]| {
                pairs
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.clone()))
                    .collect::<Vec<_>>()
            };
            self.requests.lock().unwrap().push(Request {
                method,
                path: path.to_string(),
                query: owned(query),
                form: owned(form),
            });

            let mut responses = self.responses.lock().unwrap();
            let queue = responses.get_mut(path);
            let response = match queue {
                Some(q) if q.len() > 1 => q.pop_front(),
                Some(q) => q.front().cloned(),
                None => None,
            };
            Ok(response.unwrap_or(Response {
                status: 404,
                body: Vec::new(),
            }))
        }
    }

    #[async_trait]
    impl Fetcher for StubFetcher {
        async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<Response> {
            self.respond("GET", path, query, &[])
        }

        async fn post_form(
            &self,
            path: &str,
            query: &[(&str, String)],
            form: &[(&str, String)],
        ) -> Result<Response> {
            self.respond("POST", path, query, form)
        }
    }
}
