//! Following notification links to their landing page.

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::redirect::Policy;

use crate::config::SiteConfig;
use crate::error::Result;

/// Maximum number of redirects followed for one link.
const MAX_REDIRECTS: usize = 10;

/// Resolves a link to the URL it finally lands on.
pub trait LinkResolver {
    /// Follow `url` through any redirects and return the final URL.
    fn final_url(&self, url: &str) -> Result<String>;
}

/// [`LinkResolver`] that issues a real GET request.
pub struct HttpLinkResolver {
    client: Client,
}

impl HttpLinkResolver {
    /// Build a client that presents `user_agent`; tracking links often
    /// refuse clients that do not look like a browser.
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(10)))
            .redirect(Policy::limited(MAX_REDIRECTS))
            .build()?;
        Ok(Self { client })
    }

    pub fn from_config(site: &SiteConfig) -> Result<Self> {
        Self::new(&site.user_agent, site.http_timeout())
    }
}

impl LinkResolver for HttpLinkResolver {
    fn final_url(&self, url: &str) -> Result<String> {
        let response = self.client.get(url).send()?.error_for_status()?;
        Ok(response.url().to_string())
    }
}
