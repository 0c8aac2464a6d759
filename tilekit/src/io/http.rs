use std::future::Future;

use bytes::Bytes;
pub use reqwest::header::HeaderValue;
use reqwest::header::USER_AGENT;

use crate::io::fetch::Fetch;
use crate::mercator::TileId;
use crate::sources::TileSource;

/// Controls how [`crate::HttpFetch`] talks to the tile server.
pub struct HttpOptions {
    /// User agent to be sent to the tile servers. Some providers (e.g. OpenStreetMap) reject
    /// clients without one.
    pub user_agent: Option<HeaderValue>,

    /// Maximum number of parallel downloads.
    ///
    /// Many services have rate limits, and exceeding them may result in throttling, bans, or
    /// degraded service. Use the default value when in doubt.
    pub max_parallel_downloads: MaxParallelDownloads,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            user_agent: Some(HeaderValue::from_static(concat!(
                env!("CARGO_PKG_NAME"),
                "/",
                env!("CARGO_PKG_VERSION"),
            ))),
            max_parallel_downloads: MaxParallelDownloads::default(),
        }
    }
}

/// Maximum number of parallel downloads.
pub struct MaxParallelDownloads(pub usize);

impl Default for MaxParallelDownloads {
    /// Default number of parallel downloads. Following modern browsers' behavior.
    /// <https://stackoverflow.com/questions/985431/max-parallel-http-connections-in-a-browser>
    fn default() -> Self {
        Self(6)
    }
}

impl MaxParallelDownloads {
    /// Use custom value.
    ///
    /// Many services have rate limits, and exceeding them may result in throttling, bans, or
    /// degraded service. You are **strongly encouraged** to check the Terms of Use of the
    /// particular provider you are using.
    pub fn value_manually_confirmed_with_provider_limits(value: usize) -> Self {
        Self(value)
    }
}

/// Fetches tiles over HTTP from a [`TileSource`].
pub struct HttpFetch<S> {
    source: S,
    client: reqwest::Client,
    user_agent: Option<HeaderValue>,
    max_parallel_downloads: usize,
}

impl<S: TileSource> HttpFetch<S> {
    pub fn new(source: S, options: HttpOptions) -> Self {
        Self {
            source,
            // One client for all tiles, to reuse its connection pool.
            client: reqwest::Client::new(),
            user_agent: options.user_agent,
            max_parallel_downloads: options.max_parallel_downloads.0,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }
}

impl<S> Fetch for HttpFetch<S>
where
    S: TileSource + Send + Sync,
{
    type Error = reqwest::Error;

    fn fetch(&self, tile_id: TileId) -> impl Future<Output = Result<Bytes, Self::Error>> + Send {
        let url = self.source.tile_url(tile_id);
        let mut request = self.client.get(&url);

        if let Some(user_agent) = &self.user_agent {
            request = request.header(USER_AGENT, user_agent);
        }

        async move {
            log::debug!("Getting {tile_id} from {url}.");
            let response = request.send().await?.error_for_status()?;
            log::debug!("Downloaded {tile_id} ({}).", response.status());
            response.bytes().await
        }
    }

    fn max_concurrency(&self) -> usize {
        self.max_parallel_downloads
    }
}
