pub const REPORTS_TRANSFORMED: &str = "storm_etl_reports_transformed";
pub const REPORTS_REJECTED: &str = "storm_etl_reports_rejected";
pub const REPORTS_PUBLISHED: &str = "storm_etl_reports_published";
pub const REPORTS_DEAD_LETTERED: &str = "storm_etl_reports_dead_lettered";
pub const UNKNOWN_STORM_TYPE: &str = "storm_etl_unknown_storm_type";
pub const PUBLISH_ERROR: &str = "storm_etl_publish_error";
pub const HANDLE_TIME: &str = "storm_etl_handle_time_ms";
