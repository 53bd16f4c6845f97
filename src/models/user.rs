use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

/// A registered user
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Assigned by the store on creation, immutable afterwards
    pub id: i64,
    /// Unique across all users
    pub email: String,
    pub login: String,
    /// Display name; defaults to `login` when left blank
    pub name: String,
    pub birthday: NaiveDate,
}

/// Fields for user creation
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub email: String,
    pub login: String,
    pub name: Option<String>,
    pub birthday: NaiveDate,
}

/// Partial update; absent fields keep their stored values
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPatch {
    pub id: i64,
    pub email: Option<String>,
    pub login: Option<String>,
    pub name: Option<String>,
    pub birthday: Option<NaiveDate>,
}

pub fn validate_email(email: &str) -> AppResult<()> {
    if email.is_empty() || !email.contains('@') {
        return Err(AppError::InvalidArgument(format!(
            "'{email}' is not a valid email address"
        )));
    }
    Ok(())
}

pub fn validate_login(login: &str) -> AppResult<()> {
    if login.is_empty() || login.chars().any(char::is_whitespace) {
        return Err(AppError::InvalidArgument(
            "login must be non-blank and contain no whitespace".to_string(),
        ));
    }
    Ok(())
}

pub fn validate_birthday(birthday: &NaiveDate) -> AppResult<()> {
    if *birthday > Utc::now().date_naive() {
        return Err(AppError::InvalidArgument(
            "birthday must not be in the future".to_string(),
        ));
    }
    Ok(())
}

impl NewUser {
    pub fn validate(&self) -> AppResult<()> {
        validate_email(&self.email)?;
        validate_login(&self.login)?;
        validate_birthday(&self.birthday)
    }

    /// Display name, falling back to the login when blank
    pub fn display_name(&self) -> String {
        match &self.name {
            Some(name) if !name.trim().is_empty() => name.clone(),
            _ => self.login.clone(),
        }
    }
}

impl UserPatch {
    pub fn validate(&self) -> AppResult<()> {
        if let Some(email) = &self.email {
            validate_email(email)?;
        }
        if let Some(login) = &self.login {
            validate_login(login)?;
        }
        if let Some(birthday) = &self.birthday {
            validate_birthday(birthday)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user() -> NewUser {
        NewUser {
            email: "alice@example.com".to_string(),
            login: "alice".to_string(),
            name: None,
            birthday: NaiveDate::from_ymd_opt(1990, 5, 1).unwrap(),
        }
    }

    #[test]
    fn valid_user_passes() {
        assert!(new_user().validate().is_ok());
    }

    #[test]
    fn email_without_at_sign_is_rejected() {
        let mut user = new_user();
        user.email = "alice.example.com".to_string();
        assert!(matches!(
            user.validate(),
            Err(AppError::InvalidArgument(_))
        ));
    }

    #[test]
    fn login_with_whitespace_is_rejected() {
        let mut user = new_user();
        user.login = "al ice".to_string();
        assert!(matches!(
            user.validate(),
            Err(AppError::InvalidArgument(_))
        ));
    }

    #[test]
    fn future_birthday_is_rejected() {
        let mut user = new_user();
        user.birthday = Utc::now().date_naive() + chrono::Duration::days(1);
        assert!(matches!(
            user.validate(),
            Err(AppError::InvalidArgument(_))
        ));
    }

    #[test]
    fn blank_name_falls_back_to_login() {
        let mut user = new_user();
        user.name = Some("  ".to_string());
        assert_eq!(user.display_name(), "alice");

        user.name = Some("Alice A.".to_string());
        assert_eq!(user.display_name(), "Alice A.");
    }
}
