use anyhow::{anyhow, bail, Context, Result};
use futures::future::Future;
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use log::debug;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, USER_AGENT};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::time::{sleep, Duration};
use crate::config::IntegrationConfig;
use crate::models::cve::{AssetRecord, CveRecord};

const CVES_PATH: &str = "v1/cves";
const ASSETS_PATH: &str = "v1/assets";
const FIRST_PAGE: u32 = 1;

/// One page of a list endpoint.
#[derive(Debug, Deserialize)]
pub struct Page<T> {
	pub data: Vec<T>,
	#[serde(default)]
	pub next_page: Option<u32>,
}

/// Anything that can produce the CVE records of one run.
pub trait CveSource: Send + Sync {
	fn cves(&self) -> BoxStream<'_, Result<CveRecord>>;
}

/// Anything that can produce the asset records of one run.
pub trait AssetSource: Send + Sync {
	fn assets(&self) -> BoxStream<'_, Result<AssetRecord>>;
}

/// Flattens a paged endpoint into a lazy stream of items.
///
/// The next page is requested only once every item of the current page has
/// been consumed. The stream ends after a page without `next_page` and stops
/// at the first error.
pub fn paginate<'a, T, F, Fut>(fetch_page: F) -> BoxStream<'a, Result<T>>
where
	T: Send + 'a,
	F: FnMut(u32) -> Fut + Send + 'a,
	Fut: Future<Output = Result<Page<T>>> + Send + 'a,
{
	stream::try_unfold((fetch_page, Some(FIRST_PAGE)), |(mut fetch_page, next)| async move {
		let page_number = match next {
			Some(page_number) => page_number,
			None => return Ok(None),
		};

		let page = fetch_page(page_number).await?;
		if let Some(next_page) = page.next_page {
			if next_page <= page_number {
				bail!("API returned next_page {} after page {}", next_page, page_number);
			}
		}

		Ok::<_, anyhow::Error>(Some((page.data, (fetch_page, page.next_page))))
	})
		.map_ok(|items| stream::iter(items.into_iter().map(Ok)))
		.try_flatten()
		.boxed()
}

#[derive(Clone)]
pub struct ApiClient {
	client: reqwest::Client,
	base_url: String,
	page_size: u32,
	request_delay: Duration,
}

impl ApiClient {
	pub fn new(config: &IntegrationConfig) -> Result<Self> {
		let mut headers = HeaderMap::new();
		headers.insert(
			USER_AGENT,
			HeaderValue::from_static("CVE-Findings-Connector/1.0"),
		);

		let mut auth = HeaderValue::from_str(&format!("Bearer {}", config.api_token))
			.context("API token contains characters not allowed in a header")?;
		auth.set_sensitive(true);
		headers.insert(AUTHORIZATION, auth);

		let client = reqwest::Client::builder()
			.default_headers(headers)
			.build()
			.context("Failed to create HTTP client")?;

		Ok(Self {
			client,
			base_url: config.api_base_url.trim_end_matches('/').to_string(),
			page_size: config.page_size,
			request_delay: config.request_delay,
		})
	}

	fn endpoint(&self, path: &str) -> String {
		format!("{}/{}", self.base_url, path)
	}

	async fn fetch_page<T: DeserializeOwned>(&self, path: &str, page: u32) -> Result<Page<T>> {
		let url = self.endpoint(path);
		debug!("Fetching {} page {}", url, page);

		let response = self.client
			.get(&url)
			.query(&[("page", page), ("per_page", self.page_size)])
			.send()
			.await
			.with_context(|| format!("Failed to send request to {}", url))?;

		if !response.status().is_success() {
			return Err(anyhow!(
				"Request to {} page {} failed with status: {}",
				url,
				page,
				response.status()
			));
		}

		let data = response
			.json::<Page<T>>()
			.await
			.with_context(|| format!("Failed to parse response from {}", url))?;

		if !self.request_delay.is_zero() {
			sleep(self.request_delay).await;
		}
		Ok(data)
	}
}

impl CveSource for ApiClient {
	fn cves(&self) -> BoxStream<'_, Result<CveRecord>> {
		paginate(move |page| self.fetch_page::<CveRecord>(CVES_PATH, page))
	}
}

impl AssetSource for ApiClient {
	fn assets(&self) -> BoxStream<'_, Result<AssetRecord>> {
		paginate(move |page| self.fetch_page::<AssetRecord>(ASSETS_PATH, page))
	}
}
