pub mod config;
pub mod query;
pub mod replies;
pub mod timezone;

pub use query::{parse_query, TimezoneQuery};
pub use replies::{answer, answer_place, Reply};
pub use timezone::{resolve, ResolutionPath, ResolveError, ResolvedZone};
