use chrono::{DateTime, Utc};

use crate::{
    query::parse_query,
    timezone::{resolve, ResolutionPath},
};

pub const NOT_UNDERSTOOD_TEXT: &str =
    "I did not understand. I can answer questions of the form \"what time is it in <place>?\"";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reply {
    CurrentTime { place: String, local_time: String, zone: &'static str, path: ResolutionPath },
    UnknownPlace { place: String },
    NotUnderstood,
}

impl Reply {
    pub fn text(&self) -> String {
        match self {
            Self::CurrentTime { place, local_time, .. } => {
                format!("It is now {local_time} in {place}")
            }
            Self::UnknownPlace { place } => format!(
                "I do not recognize {place} as a timezone, but I understand india, us/pacific and utc. Try one of those!"
            ),
            Self::NotUnderstood => NOT_UNDERSTOOD_TEXT.to_owned(),
        }
    }

    pub fn outcome(&self) -> &'static str {
        match self {
            Self::CurrentTime { .. } => "answered",
            Self::UnknownPlace { .. } => "unknown_place",
            Self::NotUnderstood => "not_understood",
        }
    }
}

/// Builds the reply to a message already known to be addressed to the bot.
pub fn answer(text: &str, now: DateTime<Utc>) -> Reply {
    match parse_query(text) {
        Some(query) => answer_place(&query.place, now),
        None => Reply::NotUnderstood,
    }
}

pub fn answer_place(place: &str, now: DateTime<Utc>) -> Reply {
    match resolve(place) {
        Ok(resolved) => Reply::CurrentTime {
            place: place.to_owned(),
            local_time: resolved.local_time(now),
            zone: resolved.name(),
            path: resolved.path,
        },
        Err(error) => Reply::UnknownPlace { place: error.place().to_owned() },
    }
}
