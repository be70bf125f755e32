use chrono::{DateTime, Utc};
use timebot_core::replies::{answer_place, Reply};

use super::{CommandResult, EXIT_UNKNOWN_PLACE};

pub fn run(place: &str) -> CommandResult {
    run_at(place, Utc::now())
}

/// Same lookup the bot performs for `what time is it in <place>?`.
pub fn run_at(place: &str, now: DateTime<Utc>) -> CommandResult {
    let place = place.trim().to_lowercase();
    let reply = answer_place(&place, now);

    match &reply {
        Reply::CurrentTime { zone, path, .. } => CommandResult::success(
            "resolve",
            format!("{} (zone: {zone}, via {path:?})", reply.text()),
        ),
        _ => CommandResult::failure("resolve", reply.outcome(), reply.text(), EXIT_UNKNOWN_PLACE),
    }
}
