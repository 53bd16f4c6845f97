use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Kind of entity an event refers to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum EntityType {
    User,
    Film,
    Review,
}

/// What happened to the entity
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operation {
    Add,
    Remove,
    Update,
}

/// Which social feature produced the event
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventType {
    Friend,
    Like,
    Review,
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityType::User => "USER",
            EntityType::Film => "FILM",
            EntityType::Review => "REVIEW",
        };
        write!(f, "{name}")
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Add => "ADD",
            Operation::Remove => "REMOVE",
            Operation::Update => "UPDATE",
        };
        write!(f, "{name}")
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventType::Friend => "FRIEND",
            EventType::Like => "LIKE",
            EventType::Review => "REVIEW",
        };
        write!(f, "{name}")
    }
}

// Discriminators arrive as names and are resolved against the enumeration,
// the way the lookup tables resolve them; an unknown name is NotFound.

impl FromStr for EntityType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "USER" => Ok(EntityType::User),
            "FILM" => Ok(EntityType::Film),
            "REVIEW" => Ok(EntityType::Review),
            other => Err(AppError::NotFound(format!(
                "entity type '{other}' not found"
            ))),
        }
    }
}

impl FromStr for Operation {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ADD" => Ok(Operation::Add),
            "REMOVE" => Ok(Operation::Remove),
            "UPDATE" => Ok(Operation::Update),
            other => Err(AppError::NotFound(format!("operation '{other}' not found"))),
        }
    }
}

impl FromStr for EventType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "FRIEND" => Ok(EventType::Friend),
            "LIKE" => Ok(EventType::Like),
            "REVIEW" => Ok(EventType::Review),
            other => Err(AppError::NotFound(format!(
                "event type '{other}' not found"
            ))),
        }
    }
}

/// One immutable record of a social action
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub event_id: i64,
    /// Server-assigned, epoch milliseconds; the feed ordering key
    pub timestamp: i64,
    /// The acting user
    pub user_id: i64,
    pub entity_id: i64,
    pub entity_type: EntityType,
    pub operation: Operation,
    pub event_type: EventType,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_names_resolve() {
        assert_eq!("FILM".parse::<EntityType>().unwrap(), EntityType::Film);
        assert_eq!("REMOVE".parse::<Operation>().unwrap(), Operation::Remove);
        assert_eq!("FRIEND".parse::<EventType>().unwrap(), EventType::Friend);
    }

    #[test]
    fn unknown_name_is_not_found() {
        assert!(matches!(
            "COMMENT".parse::<EventType>(),
            Err(AppError::NotFound(_))
        ));
        // Lookup is case-sensitive, as a name column would be.
        assert!("friend".parse::<EventType>().is_err());
    }

    #[test]
    fn serializes_uppercase() {
        let json = serde_json::to_string(&EventType::Like).unwrap();
        assert_eq!(json, "\"LIKE\"");
    }
}
