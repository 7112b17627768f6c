pub const FEEDS_FETCHED: &str = "storm_producer_feeds_fetched";
pub const FEED_ERROR: &str = "storm_producer_feed_error";
pub const REPORTS_PUBLISHED: &str = "storm_producer_reports_published";
pub const REPORTS_OVERSIZE: &str = "storm_producer_reports_oversize";
pub const PUBLISH_ERROR: &str = "storm_producer_publish_error";
pub const RUN_TIME: &str = "storm_producer_run_time_ms";
