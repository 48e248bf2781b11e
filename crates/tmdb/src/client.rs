//! TMDB HTTP client.

use std::time::Duration;

use futures::future::try_join_all;
use reqwest::Url;
use serde::de::DeserializeOwned;

use crate::types::{ApiDetails, ApiPage, MovieDetails, MovieSummary};
use crate::{Error, Result};

/// Default TMDB API origin, including the version segment.
pub const DEFAULT_BASE_URL: &str = "https://api.themoviedb.org/3";

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

const SEARCH_LIMIT: usize = 3;
const LIST_LIMIT: usize = 5;

/// Connection settings for [`TmdbClient`].
#[derive(Debug, Clone)]
pub struct TmdbConfig {
    pub api_key: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl TmdbConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Client for the TMDB v3 API.
#[derive(Debug, Clone)]
pub struct TmdbClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl TmdbClient {
    pub fn new(config: TmdbConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(Error::Config("api key is empty".into()));
        }

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Config(e.to_string()))?;

        Ok(Self {
            http,
            api_key: config.api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Search movies by title, optionally narrowed to a release year.
    ///
    /// Returns at most three matches.
    pub async fn search_movies(&self, query: &str, year: Option<&str>) -> Result<Vec<MovieSummary>> {
        let mut params = vec![("query", query)];
        if let Some(year) = year {
            params.push(("year", year));
        }

        let page: ApiPage = self.get("/search/movie", &params).await?;
        if page.results.is_empty() {
            return Err(Error::NotFound(format!("no movies found matching '{query}'")));
        }

        Ok(page
            .results
            .into_iter()
            .take(SEARCH_LIMIT)
            .map(|m| m.summary())
            .collect())
    }

    /// Full details for one movie.
    pub async fn movie_details(&self, movie_id: u64) -> Result<MovieDetails> {
        let details: ApiDetails = self.get(&format!("/movie/{movie_id}"), &[]).await?;
        Ok(details.into())
    }

    /// The five most popular movies, optionally kept only if they belong to
    /// `genre`.
    ///
    /// Genre membership needs one details lookup per movie; those run
    /// concurrently.
    pub async fn popular_movies(&self, genre: Option<&str>) -> Result<Vec<MovieSummary>> {
        let page: ApiPage = self.get("/movie/popular", &[]).await?;
        let top: Vec<_> = page.results.into_iter().take(LIST_LIMIT).collect();

        let movies: Vec<MovieSummary> = match genre {
            None => top.into_iter().map(|m| m.brief()).collect(),
            Some(genre) => {
                let details =
                    try_join_all(top.iter().map(|m| self.movie_details(m.id))).await?;
                top.into_iter()
                    .zip(details)
                    .filter(|(_, d)| d.has_genre(genre))
                    .map(|(m, _)| m.brief())
                    .collect()
            }
        };

        if movies.is_empty() {
            let scope = genre.map(|g| format!(" in genre '{g}'")).unwrap_or_default();
            return Err(Error::NotFound(format!("no popular movies found{scope}")));
        }
        Ok(movies)
    }

    /// Up to five recommendations for the best match of `movie_title`.
    pub async fn recommendations(&self, movie_title: &str) -> Result<Vec<MovieSummary>> {
        let movie_id = self
            .find_movie_id(movie_title)
            .await?
            .ok_or_else(|| Error::NotFound(format!("movie '{movie_title}' not found")))?;

        let page: ApiPage = self
            .get(&format!("/movie/{movie_id}/recommendations"), &[])
            .await?;

        Ok(page
            .results
            .into_iter()
            .take(LIST_LIMIT)
            .map(|m| m.preview())
            .collect())
    }

    /// Id of the first search hit for `title`.
    pub async fn find_movie_id(&self, title: &str) -> Result<Option<u64>> {
        let page: ApiPage = self.get("/search/movie", &[("query", title)]).await?;
        Ok(page.results.first().map(|m| m.id))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, params: &[(&str, &str)]) -> Result<T> {
        let mut query = vec![("api_key", self.api_key.as_str())];
        query.extend_from_slice(params);

        let url = Url::parse_with_params(&format!("{}{path}", self.base_url), &query)
            .map_err(|e| Error::Config(format!("bad url for {path}: {e}")))?;

        tracing::debug!(%path, "TMDB request");
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Network(e.without_url().to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Api { status, body });
        }

        response
            .json()
            .await
            .map_err(|e| Error::Decode(e.without_url().to_string()))
    }
}
