pub const REPORTS_CREATED: &str = "storm_sink_reports_created";
pub const REPORTS_UPDATED: &str = "storm_sink_reports_updated";
pub const STORE_ERROR: &str = "storm_sink_store_error";
pub const MALFORMED_PROCESSED_MESSAGE: &str = "storm_sink_malformed_message";
pub const REPORTS_QUARANTINED: &str = "storm_sink_reports_quarantined";
pub const HANDLE_TIME: &str = "storm_sink_handle_time_ms";
