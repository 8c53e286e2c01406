use std::{sync::Arc, time::Duration};

use crate::{
    config::Config,
    error::Error,
    extract,
    fetcher::Fetcher,
    models::{
        listing::ListingPage,
        thread::{MessageBatch, ThreadPage},
    },
    result::Result,
    site::Site,
};
use async_trait::async_trait;
use reqwest::{header::USER_AGENT, Client as ReqwestClient, StatusCode};
use tokio::{
    sync::{Semaphore, SemaphorePermit},
    task::JoinHandle,
    time::interval,
};

/// HTTP [`Fetcher`] for the remote forum.
///
/// Requests are spaced by the configured interval. The wrapped
/// [`reqwest::Client`] carries the session cookies.
#[derive(Debug)]
pub struct Client {
    http: ReqwestClient,
    site: Site,
    limiter: RateLimit,
}

#[derive(Debug)]
pub(crate) struct RateLimit {
    pub(crate) permit: Arc<Semaphore>,
    pub(crate) replenisher: JoinHandle<()>,
}

impl RateLimit {
    fn new(every: Duration) -> Self {
        let permit = Arc::new(Semaphore::new(1));
        let clone = permit.clone();

        let replenisher = tokio::spawn(async move {
            let mut interval = interval(every);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                if clone.available_permits() == 0 {
                    clone.add_permits(1);
                }
            }
        });

        RateLimit {
            permit,
            replenisher,
        }
    }

    pub async fn acquire(&self) -> Result<SemaphorePermit> {
        self.permit.acquire().await.map_err(Into::into)
    }
}

impl Drop for RateLimit {
    fn drop(&mut self) {
        self.replenisher.abort();
    }
}

impl Client {
    /// Builds a client with its own cookie store.
    ///
    /// Must be called inside a tokio runtime.
    ///
    /// # Errors
    ///
    /// Fails if the TLS backend cannot be initialised.
    pub fn new(config: &Config) -> Result<Client> {
        let http = ReqwestClient::builder()
            .cookie_store(true)
            .user_agent(config.site.user_agent())
            .build()?;
        Ok(Self::with_http(http, config))
    }

    /// Wraps an already authenticated [`reqwest::Client`].
    ///
    /// Must be called inside a tokio runtime.
    pub fn with_http(http: ReqwestClient, config: &Config) -> Client {
        Client {
            http,
            site: config.site.clone(),
            limiter: RateLimit::new(config.client.request_interval()),
        }
    }

    /// Returns the site layout this client talks to.
    pub fn site(&self) -> &Site {
        &self.site
    }

    pub(crate) async fn fetch_text(&self, url: &str) -> Result<String> {
        let permit = self.limiter.acquire().await?;
        let response = {
            let builder = self.http.get(url).header(USER_AGENT, self.site.user_agent());
            log::info!("request for {url} dispatched");
            builder.send().await?
        };

        // reduce the permit count
        permit.forget();

        let status = response.status();
        log::info!("response status: {status}");

        match status {
            StatusCode::OK => response.text().await.map_err(Into::into),
            StatusCode::NOT_FOUND => Err(Error::NotFound(url.to_string())),
            code => Err(Error::ServerDown(format!("{code} from {url}"))),
        }
    }
}

#[async_trait]
impl Fetcher for Client {
    async fn fetch_thread_page(&self, url: &str, archived: bool) -> Result<ThreadPage> {
        let html = self.fetch_text(url).await?;
        extract::thread_page(&self.site, url, &html, archived)
    }

    async fn fetch_batch(&self, thread_id: &str, url: &str) -> Result<MessageBatch> {
        let raw = self.fetch_text(url).await?;
        extract::batch(&self.site, thread_id, &raw)
    }

    async fn fetch_listing(&self, url: &str) -> Result<ListingPage> {
        let html = self.fetch_text(url).await?;
        extract::listing(&self.site, &html)
    }
}
