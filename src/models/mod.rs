pub mod event;
pub mod film;
pub mod review;
pub mod user;

pub use event::{EntityType, Event, EventType, Operation};
pub use film::{Director, Film, FilmPatch, Genre, Mpa, NewFilm};
pub use review::{NewReview, Review, ReviewPatch};
pub use user::{NewUser, User, UserPatch};
