pub const STORE_ERROR: &str = "storm_api_store_error";
pub const REPORTS_RETURNED: &str = "storm_api_reports_returned";
pub const INVALID_DATE: &str = "storm_api_invalid_date";
