//! Movie records returned to the model, and the TMDB wire types behind them.

use serde::{Deserialize, Serialize};

/// Maximum overview length in recommendation lists.
pub const OVERVIEW_PREVIEW_CHARS: usize = 200;

/// A movie as listed by search, popularity or recommendation queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovieSummary {
    pub id: u64,
    pub title: Option<String>,
    pub release_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overview: Option<String>,
    pub rating: Option<f64>,
}

/// Full record for one movie.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovieDetails {
    pub id: u64,
    pub title: Option<String>,
    pub release_date: Option<String>,
    /// Minutes.
    pub runtime: Option<u32>,
    pub genres: Vec<String>,
    pub rating: Option<f64>,
    pub overview: Option<String>,
    pub budget: Option<u64>,
    pub revenue: Option<u64>,
}

impl MovieDetails {
    /// Case-insensitive genre membership.
    pub fn has_genre(&self, genre: &str) -> bool {
        self.genres.iter().any(|g| g.eq_ignore_ascii_case(genre))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// API Wire Types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub(crate) struct ApiPage {
    #[serde(default)]
    pub results: Vec<ApiMovie>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ApiMovie {
    pub id: u64,
    pub title: Option<String>,
    pub release_date: Option<String>,
    pub overview: Option<String>,
    pub vote_average: Option<f64>,
}

impl ApiMovie {
    pub fn summary(self) -> MovieSummary {
        MovieSummary {
            id: self.id,
            title: self.title,
            release_date: self.release_date,
            overview: self.overview,
            rating: self.vote_average,
        }
    }

    /// Summary without the overview, for compact listings.
    pub fn brief(self) -> MovieSummary {
        MovieSummary {
            overview: None,
            ..self.summary()
        }
    }

    /// Summary with the overview cut to a preview.
    pub fn preview(self) -> MovieSummary {
        let overview = self.overview.as_deref().map(preview);
        MovieSummary {
            overview,
            ..self.summary()
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiDetails {
    pub id: u64,
    pub title: Option<String>,
    pub release_date: Option<String>,
    pub runtime: Option<u32>,
    #[serde(default)]
    pub genres: Vec<ApiGenre>,
    pub vote_average: Option<f64>,
    pub overview: Option<String>,
    pub budget: Option<u64>,
    pub revenue: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiGenre {
    pub name: String,
}

impl From<ApiDetails> for MovieDetails {
    fn from(api: ApiDetails) -> Self {
        Self {
            id: api.id,
            title: api.title,
            release_date: api.release_date,
            runtime: api.runtime,
            genres: api.genres.into_iter().map(|g| g.name).collect(),
            rating: api.vote_average,
            overview: api.overview,
            budget: api.budget,
            revenue: api.revenue,
        }
    }
}

fn preview(text: &str) -> String {
    match text.char_indices().nth(OVERVIEW_PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}
