use time::{Duration, PrimitiveDateTime};

/// Whole seconds elapsed since a section went active. Clock skew between the
/// reading and the activation timestamp must never produce a negative value.
pub(crate) fn elapsed_seconds(activated_at: PrimitiveDateTime, now: PrimitiveDateTime) -> i64 {
    (now - activated_at).whole_seconds().max(0)
}

pub(crate) fn clamp_to_limit(elapsed: i64, time_limit_seconds: i64) -> i64 {
    elapsed.clamp(0, time_limit_seconds.max(0))
}

pub(crate) fn remaining_seconds(time_limit_seconds: i64, time_spent_seconds: i64) -> i64 {
    (time_limit_seconds - time_spent_seconds).max(0)
}

pub(crate) fn deadline(
    activated_at: PrimitiveDateTime,
    time_limit_seconds: i64,
) -> PrimitiveDateTime {
    activated_at + Duration::seconds(time_limit_seconds.max(0))
}
