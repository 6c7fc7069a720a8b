use k8s_openapi::apimachinery::pkg::apis::meta::v1::{Condition, Time};

/// Builds a standard Gateway API condition. `lastTransitionTime` is left at
/// the epoch — translation transforms are pure and must not read the clock;
/// the status writer (C3) stamps a real transition time only when the
/// condition's status actually changes from what's already on the object.
pub(crate) fn condition(type_: &str, status: bool, reason: &str, message: impl Into<String>) -> Condition {
    Condition {
        type_: type_.to_string(),
        status: if status { "True" } else { "False" }.to_string(),
        reason: reason.to_string(),
        message: message.into(),
        observed_generation: None,
        last_transition_time: Time(chrono::DateTime::UNIX_EPOCH),
    }
}
