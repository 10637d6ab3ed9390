//! PokéAPI client
//!
//! This module fetches location listings, location areas, and Pokémon from
//! the PokéAPI. Every response goes through the shared [`Cache`], so repeated
//! requests for the same page or the same resource are answered without a
//! network call until the cache's sweep evicts them.

use std::future::Future;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use super::{LocationArea, NamedResource, Pokemon};
use crate::cache::Cache;

/// Base URL for the PokéAPI
pub const POKEAPI_BASE_URL: &str = "https://pokeapi.co/api/v2";

/// Number of results requested per page
pub const PAGE_LIMIT: u32 = 20;

/// Default timeout for a single HTTP request
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors that can occur when fetching from the PokéAPI
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP request failed (connection error, timeout, ...)
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// The API answered 404
    #[error("Not found: {0}")]
    NotFound(String),

    /// The API answered with a non-success status other than 404
    #[error("Unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    /// Failed to parse JSON response
    #[error("Failed to parse JSON response: {0}")]
    ParseError(#[from] serde_json::Error),

    /// Missing expected field in response
    #[error("Missing expected field in response: {0}")]
    MissingField(String),
}

/// Fetches a URL and returns its body as JSON
///
/// The client only needs this one capability from the network, which keeps
/// it testable without a server.
pub trait Transport: Send + Sync {
    /// Performs a GET request and parses the body as JSON
    fn get_json(&self, url: &str) -> impl Future<Output = Result<Value, ApiError>> + Send;
}

/// [`Transport`] backed by `reqwest`
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Creates a transport whose requests fail after `timeout`
    pub fn new(timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    /// Creates a transport with a custom HTTP client
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

impl Transport for HttpTransport {
    async fn get_json(&self, url: &str) -> Result<Value, ApiError> {
        tracing::debug!(url, "sending request");
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(ApiError::NotFound(url.to_string()));
        }
        if !status.is_success() {
            return Err(ApiError::UnexpectedStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let text = response.text().await?;
        Ok(serde_json::from_str(&text)?)
    }
}

/// Identifier of a single resource: either its name or its numeric id
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceId {
    Name(String),
    Number(i64),
}

impl ResourceId {
    /// Returns the form used in cache keys and URL paths
    ///
    /// Names are passed through [`normalize_id`]; negative numbers clamp to 0.
    pub fn normalized(&self) -> String {
        match self {
            ResourceId::Name(name) => normalize_id(name),
            ResourceId::Number(number) => (*number).max(0).to_string(),
        }
    }
}

impl From<&str> for ResourceId {
    fn from(name: &str) -> Self {
        ResourceId::Name(name.to_string())
    }
}

impl From<String> for ResourceId {
    fn from(name: String) -> Self {
        ResourceId::Name(name)
    }
}

impl From<i64> for ResourceId {
    fn from(number: i64) -> Self {
        ResourceId::Number(number)
    }
}

impl From<u32> for ResourceId {
    fn from(number: u32) -> Self {
        ResourceId::Number(i64::from(number))
    }
}

/// Strips everything except ASCII letters, digits and `-`, then lowercases
///
/// `"Mt. Moon-1"` becomes `"mtmoon-1"`.
pub fn normalize_id(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Which way to move through a paginated listing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageDirection {
    Next,
    Previous,
}

/// Position in a paginated listing
///
/// Starts before the first page, so the first move in either direction
/// lands on page 0. Moving back from page 0 stays on page 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageCursor {
    index: Option<u32>,
}

impl PageCursor {
    /// The page most recently returned, if any
    pub fn current(&self) -> Option<u32> {
        self.index
    }

    /// The page a move in `direction` would land on
    pub fn target(&self, direction: PageDirection) -> u32 {
        match (self.index, direction) {
            (None, _) => 0,
            (Some(index), PageDirection::Next) => index.saturating_add(1),
            (Some(index), PageDirection::Previous) => index.saturating_sub(1),
        }
    }

    fn move_to(&mut self, index: u32) {
        self.index = Some(index);
    }
}

/// The two paginated listings
#[derive(Debug, Clone, Copy)]
enum Listing {
    Locations,
    LocationAreas,
}

impl Listing {
    fn path(self) -> &'static str {
        match self {
            Listing::Locations => "location",
            Listing::LocationAreas => "location-area",
        }
    }

    fn key_prefix(self) -> &'static str {
        match self {
            Listing::Locations => "locations",
            Listing::LocationAreas => "locationAreas",
        }
    }
}

fn pagination(index: u32) -> String {
    format!("?limit={}&offset={}", PAGE_LIMIT, PAGE_LIMIT * index)
}

/// Cache-aware client for the PokéAPI
///
/// Keeps one cursor per paginated listing. A failed request leaves the
/// cursor where it was, so retrying asks for the same page again.
#[derive(Debug)]
pub struct PokeApiClient<T = HttpTransport> {
    transport: T,
    cache: Cache<Value>,
    base_url: String,
    location_cursor: PageCursor,
    location_area_cursor: PageCursor,
}

impl<T: Transport> PokeApiClient<T> {
    /// Creates a client talking to the public PokéAPI
    pub fn new(transport: T, cache: Cache<Value>) -> Self {
        Self {
            transport,
            cache,
            base_url: POKEAPI_BASE_URL.to_string(),
            location_cursor: PageCursor::default(),
            location_area_cursor: PageCursor::default(),
        }
    }

    /// Points the client at another API root
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn cache(&self) -> &Cache<Value> {
        &self.cache
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn location_cursor(&self) -> PageCursor {
        self.location_cursor
    }

    pub fn location_area_cursor(&self) -> PageCursor {
        self.location_area_cursor
    }

    /// Fetches the next or previous page of locations
    pub async fn get_locations(
        &mut self,
        direction: PageDirection,
    ) -> Result<Vec<NamedResource>, ApiError> {
        self.get_page(Listing::Locations, direction).await
    }

    /// Fetches the next or previous page of location areas
    pub async fn get_location_areas(
        &mut self,
        direction: PageDirection,
    ) -> Result<Vec<NamedResource>, ApiError> {
        self.get_page(Listing::LocationAreas, direction).await
    }

    /// Fetches a single location area by name or id
    pub async fn get_location_area(
        &self,
        id: impl Into<ResourceId>,
    ) -> Result<LocationArea, ApiError> {
        let id = id.into().normalized();
        let url = format!("{}/location-area/{}{}", self.base_url, id, pagination(0));
        self.fetch_cached(format!("locationArea_{id}"), url, Ok).await
    }

    /// Fetches a single Pokémon by name or id
    pub async fn get_pokemon(&self, id: impl Into<ResourceId>) -> Result<Pokemon, ApiError> {
        let id = id.into().normalized();
        let url = format!("{}/pokemon/{}{}", self.base_url, id, pagination(0));
        self.fetch_cached(format!("pokemon_{id}"), url, Ok).await
    }

    async fn get_page(
        &mut self,
        listing: Listing,
        direction: PageDirection,
    ) -> Result<Vec<NamedResource>, ApiError> {
        let index = self.cursor_mut(listing).target(direction);
        let key = format!("{}_{}", listing.key_prefix(), index);
        let url = format!("{}/{}{}", self.base_url, listing.path(), pagination(index));

        let page = self.fetch_cached(key, url, take_results).await?;
        self.cursor_mut(listing).move_to(index);
        Ok(page)
    }

    /// Returns the cached value for `key`, or fetches, caches and returns it
    ///
    /// `select` picks the part of the response body that gets cached. Nothing
    /// is cached unless it deserializes into `R`.
    async fn fetch_cached<R: DeserializeOwned>(
        &self,
        key: String,
        url: String,
        select: fn(Value) -> Result<Value, ApiError>,
    ) -> Result<R, ApiError> {
        if let Some(cached) = self.cache.get(&key) {
            tracing::debug!(key = %key, "cache hit");
            return Ok(serde_json::from_value(cached)?);
        }

        tracing::debug!(key = %key, url = %url, "cache miss");
        let body = self.transport.get_json(&url).await?;
        let payload = select(body)?;
        let parsed = R::deserialize(&payload)?;
        self.cache.add(key, payload);
        Ok(parsed)
    }

    fn cursor_mut(&mut self, listing: Listing) -> &mut PageCursor {
        match listing {
            Listing::Locations => &mut self.location_cursor,
            Listing::LocationAreas => &mut self.location_area_cursor,
        }
    }
}

/// Keeps only the `results` array of a list response
fn take_results(mut body: Value) -> Result<Value, ApiError> {
    body.get_mut("results")
        .map(Value::take)
        .ok_or_else(|| ApiError::MissingField("results".to_string()))
}
