//! Movie functions exposed to the model.

use std::sync::Arc;

use async_trait::async_trait;
use runtime::{Arguments, ParamType, ToolDeclaration, ToolError, ToolHandler, ToolRegistry};
use serde::Serialize;
use serde_json::Value;

use crate::{Error, TmdbClient};

impl From<Error> for ToolError {
    fn from(err: Error) -> Self {
        ToolError::execution(err)
    }
}

/// Declarations for the four movie functions, in registration order.
pub fn movie_declarations() -> Vec<ToolDeclaration> {
    vec![
        ToolDeclaration::new(
            "search_movies",
            "Search for movies by title and optionally by release year",
        )
        .required("query", ParamType::String, "Movie title to search for")
        .optional("year", ParamType::String, "Release year, e.g. \"1995\""),
        ToolDeclaration::new(
            "get_movie_details",
            "Get detailed information about a movie by its TMDB id",
        )
        .required("movie_id", ParamType::Integer, "TMDB movie id"),
        ToolDeclaration::new(
            "get_popular_movies",
            "Get currently popular movies, optionally filtered by genre",
        )
        .optional("genre", ParamType::String, "Genre name, e.g. \"Action\""),
        ToolDeclaration::new(
            "get_movie_recommendations",
            "Get movie recommendations similar to a given movie",
        )
        .required(
            "movie_title",
            ParamType::String,
            "Title of the movie to base recommendations on",
        ),
    ]
}

/// Register every movie function against a shared client.
pub fn register_movie_tools(
    registry: &mut ToolRegistry,
    client: Arc<TmdbClient>,
) -> Result<(), ToolError> {
    for declaration in movie_declarations() {
        let handler: Arc<dyn ToolHandler> = match declaration.name.as_str() {
            "search_movies" => Arc::new(SearchMovies(client.clone())),
            "get_movie_details" => Arc::new(GetMovieDetails(client.clone())),
            "get_popular_movies" => Arc::new(GetPopularMovies(client.clone())),
            "get_movie_recommendations" => Arc::new(GetMovieRecommendations(client.clone())),
            other => return Err(ToolError::UnknownTool(other.to_string())),
        };
        registry.register_shared(declaration, handler)?;
    }
    Ok(())
}

pub struct SearchMovies(pub Arc<TmdbClient>);

#[async_trait]
impl ToolHandler for SearchMovies {
    async fn call(&self, arguments: Arguments) -> Result<Value, ToolError> {
        let query = string_arg(&arguments, "query").unwrap_or_default();
        let year = string_arg(&arguments, "year");
        to_payload(&self.0.search_movies(query, year).await?)
    }
}

pub struct GetMovieDetails(pub Arc<TmdbClient>);

#[async_trait]
impl ToolHandler for GetMovieDetails {
    async fn call(&self, arguments: Arguments) -> Result<Value, ToolError> {
        let movie_id = arguments
            .get("movie_id")
            .and_then(movie_id)
            .ok_or_else(|| ToolError::InvalidParameter {
                tool: "get_movie_details".into(),
                parameter: "movie_id".into(),
                reason: "expected a positive integer".into(),
            })?;
        to_payload(&self.0.movie_details(movie_id).await?)
    }
}

pub struct GetPopularMovies(pub Arc<TmdbClient>);

#[async_trait]
impl ToolHandler for GetPopularMovies {
    async fn call(&self, arguments: Arguments) -> Result<Value, ToolError> {
        let genre = string_arg(&arguments, "genre").filter(|g| !g.trim().is_empty());
        to_payload(&self.0.popular_movies(genre).await?)
    }
}

pub struct GetMovieRecommendations(pub Arc<TmdbClient>);

#[async_trait]
impl ToolHandler for GetMovieRecommendations {
    async fn call(&self, arguments: Arguments) -> Result<Value, ToolError> {
        let title = string_arg(&arguments, "movie_title").unwrap_or_default();
        to_payload(&self.0.recommendations(title).await?)
    }
}

fn string_arg<'a>(arguments: &'a Arguments, name: &str) -> Option<&'a str> {
    arguments.get(name).and_then(Value::as_str)
}

/// Models often send integers as whole floats (`949.0`).
fn movie_id(value: &Value) -> Option<u64> {
    value.as_u64().or_else(|| {
        value
            .as_f64()
            .filter(|f| f.fract() == 0.0 && *f >= 0.0 && *f <= u64::MAX as f64)
            .map(|f| f as u64)
    })
}

fn to_payload<T: Serialize>(value: &T) -> Result<Value, ToolError> {
    serde_json::to_value(value).map_err(ToolError::execution)
}
