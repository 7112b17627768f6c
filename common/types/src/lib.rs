mod report;

// Storm reports
pub use report::DecodeError;
pub use report::NaturalKey;
pub use report::StormReport;
pub use report::StormType;

// Utils
pub mod formats;
