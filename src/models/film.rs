use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

/// Longest accepted film description
pub const MAX_DESCRIPTION_LENGTH: usize = 200;

/// Date of the first public film screening; nothing can predate it
pub fn min_release_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(1895, 12, 28).expect("valid constant date")
}

/// MPA rating classification (reference data)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, sqlx::FromRow)]
pub struct Mpa {
    pub id: i64,
    pub name: String,
}

/// Film genre (reference data)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, sqlx::FromRow)]
pub struct Genre {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, sqlx::FromRow)]
pub struct Director {
    pub id: i64,
    pub name: String,
}

/// A catalogued film
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Film {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub release_date: NaiveDate,
    /// Running time in minutes
    pub duration: i32,
    pub mpa: Mpa,
    /// Unique, unordered; serialized sorted by id for stable output
    pub genres: Vec<Genre>,
    pub directors: Vec<Director>,
}

/// Fields for film creation; genre and director ids must exist in
/// reference data before association
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewFilm {
    pub name: String,
    pub description: String,
    pub release_date: NaiveDate,
    pub duration: i32,
    pub mpa_id: i64,
    #[serde(default)]
    pub genre_ids: Vec<i64>,
    #[serde(default)]
    pub director_ids: Vec<i64>,
}

/// Partial update; absent fields keep their stored values
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilmPatch {
    pub id: i64,
    pub name: Option<String>,
    pub description: Option<String>,
    pub release_date: Option<NaiveDate>,
    pub duration: Option<i32>,
    pub mpa_id: Option<i64>,
    pub genre_ids: Option<Vec<i64>>,
    pub director_ids: Option<Vec<i64>>,
}

fn validate_name(name: &str) -> AppResult<()> {
    if name.trim().is_empty() {
        return Err(AppError::InvalidArgument(
            "film name must not be blank".to_string(),
        ));
    }
    Ok(())
}

fn validate_description(description: &str) -> AppResult<()> {
    if description.chars().count() > MAX_DESCRIPTION_LENGTH {
        return Err(AppError::InvalidArgument(format!(
            "description must not exceed {MAX_DESCRIPTION_LENGTH} characters"
        )));
    }
    Ok(())
}

fn validate_release_date(release_date: &NaiveDate) -> AppResult<()> {
    if *release_date < min_release_date() {
        return Err(AppError::InvalidArgument(format!(
            "release date must not be before {}",
            min_release_date()
        )));
    }
    Ok(())
}

fn validate_duration(duration: i32) -> AppResult<()> {
    if duration <= 0 {
        return Err(AppError::InvalidArgument(
            "duration must be positive".to_string(),
        ));
    }
    Ok(())
}

impl NewFilm {
    pub fn validate(&self) -> AppResult<()> {
        validate_name(&self.name)?;
        validate_description(&self.description)?;
        validate_release_date(&self.release_date)?;
        validate_duration(self.duration)
    }
}

impl FilmPatch {
    pub fn validate(&self) -> AppResult<()> {
        if let Some(name) = &self.name {
            validate_name(name)?;
        }
        if let Some(description) = &self.description {
            validate_description(description)?;
        }
        if let Some(release_date) = &self.release_date {
            validate_release_date(release_date)?;
        }
        if let Some(duration) = self.duration {
            validate_duration(duration)?;
        }
        Ok(())
    }
}
