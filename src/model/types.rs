//! Core type definitions for the search client

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::content::AccumulatedResult;

/// Kind of title the backend can filter on.
///
/// "No filter" is `Option::<MovieKind>::None`, never a wire value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovieKind {
    Movie,
    Series,
    Episode,
    Game,
}

impl MovieKind {
    pub const ALL: [MovieKind; 4] = [
        MovieKind::Movie,
        MovieKind::Series,
        MovieKind::Episode,
        MovieKind::Game,
    ];

    /// Value sent as the `type` query parameter
    pub fn wire_value(self) -> &'static str {
        match self {
            MovieKind::Movie => "movie",
            MovieKind::Series => "series",
            MovieKind::Episode => "episode",
            MovieKind::Game => "game",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            MovieKind::Movie => "Movie",
            MovieKind::Series => "Series",
            MovieKind::Episode => "Episode",
            MovieKind::Game => "Game",
        }
    }
}

impl fmt::Display for MovieKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("unknown movie kind {0:?}")]
pub struct UnknownMovieKind(pub String);

impl FromStr for MovieKind {
    type Err = UnknownMovieKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        MovieKind::ALL
            .into_iter()
            .find(|kind| kind.wire_value().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| UnknownMovieKind(trimmed.to_string()))
    }
}

/// The effective search: title plus optional filters
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Query {
    pub title: String,
    pub year: Option<String>,
    pub kind: Option<MovieKind>,
}

impl Query {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            year: None,
            kind: None,
        }
    }

    pub fn with_year(mut self, year: impl Into<String>) -> Self {
        self.year = normalize_year(year.into());
        self
    }

    pub fn with_kind(mut self, kind: Option<MovieKind>) -> Self {
        self.kind = kind;
        self
    }

    /// Blank titles never trigger a fetch
    pub fn is_blank(&self) -> bool {
        self.title.trim().is_empty()
    }
}

/// Year text from the UI; blank means "no year filter"
pub(crate) fn normalize_year(year: String) -> Option<String> {
    let trimmed = year.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// What the UI renders: the accumulated results, or one error message
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UiState {
    Success(AccumulatedResult),
    Error(String),
}

impl UiState {
    pub fn empty() -> Self {
        UiState::Success(AccumulatedResult::default())
    }

    pub fn result(&self) -> Option<&AccumulatedResult> {
        match self {
            UiState::Success(result) => Some(result),
            UiState::Error(_) => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            UiState::Success(_) => None,
            UiState::Error(message) => Some(message),
        }
    }
}

impl Default for UiState {
    fn default() -> Self {
        Self::empty()
    }
}
