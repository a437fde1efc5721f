/// Alert primary keys are PostgreSQL BIGSERIAL.
pub type DbId = i64;

/// Users are identified by the opaque string the control surface assigns.
pub type UserId = String;

/// Absolute instants are stored as milliseconds since the Unix epoch.
pub type EpochMillis = i64;

/// Current wall-clock time in epoch milliseconds.
pub fn now_millis() -> EpochMillis {
    chrono::Utc::now().timestamp_millis()
}
