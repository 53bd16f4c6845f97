use std::sync::Arc;

use tracing::info;

use crate::error::{AppError, AppResult};
use crate::models::{Director, Film, FilmPatch, Genre, Mpa, NewFilm, NewUser, User, UserPatch};
use crate::services::{require_film, require_user};
use crate::storage::Storage;

/// User and film identity plus the reference-data lookups everything else
/// leans on
#[derive(Clone)]
pub struct IdentityService {
    storage: Arc<dyn Storage>,
}

impl IdentityService {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    pub async fn create_user(&self, user: NewUser) -> AppResult<User> {
        user.validate()?;
        if self.storage.email_in_use(&user.email, None).await? {
            return Err(AppError::Conflict(format!(
                "email '{}' is already in use",
                user.email
            )));
        }
        let created = self.storage.create_user(&user).await?;
        info!(user_id = created.id, login = %created.login, "created user");
        Ok(created)
    }

    pub async fn update_user(&self, patch: UserPatch) -> AppResult<User> {
        patch.validate()?;
        require_user(self.storage.as_ref(), patch.id).await?;
        if let Some(email) = &patch.email {
            if self.storage.email_in_use(email, Some(patch.id)).await? {
                return Err(AppError::Conflict(format!(
                    "email '{email}' is already in use"
                )));
            }
        }
        let updated = self.storage.update_user(&patch).await?;
        info!(user_id = updated.id, "updated user");
        Ok(updated)
    }

    pub async fn get_user(&self, id: i64) -> AppResult<User> {
        require_user(self.storage.as_ref(), id).await
    }

    pub async fn list_users(&self) -> AppResult<Vec<User>> {
        self.storage.list_users().await
    }

    /// Genre and director ids must exist in reference data before they can
    /// be associated with a film.
    async fn check_film_references(
        &self,
        mpa_id: i64,
        genre_ids: &[i64],
        director_ids: &[i64],
    ) -> AppResult<()> {
        if self.storage.get_mpa(mpa_id).await?.is_none() {
            return Err(AppError::InvalidArgument(format!(
                "MPA rating with id = {mpa_id} not found"
            )));
        }
        for genre_id in genre_ids {
            if self.storage.get_genre(*genre_id).await?.is_none() {
                return Err(AppError::NotFound(format!(
                    "genre with id = {genre_id} not found"
                )));
            }
        }
        for director_id in director_ids {
            if !self.storage.director_exists(*director_id).await? {
                return Err(AppError::NotFound(format!(
                    "director with id = {director_id} not found"
                )));
            }
        }
        Ok(())
    }

    pub async fn create_film(&self, film: NewFilm) -> AppResult<Film> {
        film.validate()?;
        self.check_film_references(film.mpa_id, &film.genre_ids, &film.director_ids)
            .await?;
        let created = self.storage.create_film(&film).await?;
        info!(film_id = created.id, name = %created.name, "created film");
        Ok(created)
    }

    pub async fn update_film(&self, patch: FilmPatch) -> AppResult<Film> {
        patch.validate()?;
        let current = require_film(self.storage.as_ref(), patch.id).await?;
        let mpa_id = patch.mpa_id.unwrap_or(current.mpa.id);
        let genre_ids = patch.genre_ids.clone().unwrap_or_default();
        let director_ids = patch.director_ids.clone().unwrap_or_default();
        self.check_film_references(mpa_id, &genre_ids, &director_ids)
            .await?;
        let updated = self.storage.update_film(&patch).await?;
        info!(film_id = updated.id, "updated film");
        Ok(updated)
    }

    pub async fn get_film(&self, id: i64) -> AppResult<Film> {
        require_film(self.storage.as_ref(), id).await
    }

    pub async fn list_films(&self) -> AppResult<Vec<Film>> {
        self.storage.list_films().await
    }

    pub async fn get_genre(&self, id: i64) -> AppResult<Genre> {
        self.storage
            .get_genre(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("genre with id = {id} not found")))
    }

    pub async fn list_genres(&self) -> AppResult<Vec<Genre>> {
        self.storage.list_genres().await
    }

    pub async fn get_mpa(&self, id: i64) -> AppResult<Mpa> {
        self.storage
            .get_mpa(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("MPA rating with id = {id} not found")))
    }

    pub async fn list_mpa(&self) -> AppResult<Vec<Mpa>> {
        self.storage.list_mpa().await
    }

    pub async fn create_director(&self, name: &str) -> AppResult<Director> {
        if name.trim().is_empty() {
            return Err(AppError::InvalidArgument(
                "director name must not be blank".to_string(),
            ));
        }
        let director = self.storage.create_director(name).await?;
        info!(director_id = director.id, "created director");
        Ok(director)
    }

    pub async fn list_directors(&self) -> AppResult<Vec<Director>> {
        self.storage.list_directors().await
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::services::testutil;

    fn service() -> IdentityService {
        IdentityService::new(testutil::storage())
    }

    fn new_user(email: &str, login: &str) -> NewUser {
        NewUser {
            email: email.to_string(),
            login: login.to_string(),
            name: None,
            birthday: NaiveDate::from_ymd_opt(1985, 3, 14).unwrap(),
        }
    }

    #[tokio::test]
    async fn duplicate_email_is_a_conflict() {
        let identity = service();
        identity
            .create_user(new_user("a@example.com", "a"))
            .await
            .unwrap();
        let err = identity
            .create_user(new_user("a@example.com", "b"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn update_keeps_absent_fields() {
        let identity = service();
        let created = identity
            .create_user(new_user("a@example.com", "a"))
            .await
            .unwrap();
        let updated = identity
            .update_user(UserPatch {
                id: created.id,
                email: None,
                login: Some("anna".to_string()),
                name: None,
                birthday: None,
            })
            .await
            .unwrap();
        assert_eq!(updated.email, "a@example.com");
        assert_eq!(updated.login, "anna");
        assert_eq!(updated.birthday, created.birthday);
    }

    #[tokio::test]
    async fn update_to_a_taken_email_is_a_conflict() {
        let identity = service();
        identity
            .create_user(new_user("a@example.com", "a"))
            .await
            .unwrap();
        let other = identity
            .create_user(new_user("b@example.com", "b"))
            .await
            .unwrap();
        let err = identity
            .update_user(UserPatch {
                id: other.id,
                email: Some("a@example.com".to_string()),
                login: None,
                name: None,
                birthday: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        // keeping your own email is not a conflict
        let kept = identity
            .update_user(UserPatch {
                id: other.id,
                email: Some("b@example.com".to_string()),
                login: None,
                name: None,
                birthday: None,
            })
            .await
            .unwrap();
        assert_eq!(kept.email, "b@example.com");
    }

    #[tokio::test]
    async fn update_of_unknown_user_is_not_found() {
        let identity = service();
        let err = identity
            .update_user(UserPatch {
                id: 99,
                email: None,
                login: None,
                name: None,
                birthday: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn film_with_unknown_genre_is_rejected() {
        let identity = service();
        let film = NewFilm {
            name: "Metropolis".to_string(),
            description: String::new(),
            release_date: NaiveDate::from_ymd_opt(1927, 1, 10).unwrap(),
            duration: 153,
            mpa_id: 1,
            genre_ids: vec![999],
            director_ids: vec![],
        };
        let err = identity.create_film(film).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn film_genres_are_deduplicated() {
        let identity = service();
        let film = NewFilm {
            name: "Metropolis".to_string(),
            description: String::new(),
            release_date: NaiveDate::from_ymd_opt(1927, 1, 10).unwrap(),
            duration: 153,
            mpa_id: 1,
            genre_ids: vec![2, 2, 1],
            director_ids: vec![],
        };
        let created = identity.create_film(film).await.unwrap();
        let ids: Vec<i64> = created.genres.iter().map(|g| g.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[tokio::test]
    async fn director_reference_is_checked() {
        let identity = service();
        let director = identity.create_director("Fritz Lang").await.unwrap();
        let film = NewFilm {
            name: "M".to_string(),
            description: String::new(),
            release_date: NaiveDate::from_ymd_opt(1931, 5, 11).unwrap(),
            duration: 117,
            mpa_id: 1,
            genre_ids: vec![],
            director_ids: vec![director.id],
        };
        let created = identity.create_film(film).await.unwrap();
        assert_eq!(created.directors, vec![director]);
    }
}
