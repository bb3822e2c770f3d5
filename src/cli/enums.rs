//! CLI enum types.

use clap::ValueEnum;

/// Output format for `detect`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ReportFormat {
    /// Human-readable summary
    #[default]
    Text,
    /// One JSON object
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_format_values() {
        assert_eq!(
            ReportFormat::from_str("json", true).unwrap(),
            ReportFormat::Json
        );
        assert_eq!(
            ReportFormat::from_str("TEXT", true).unwrap(),
            ReportFormat::Text
        );
        assert!(ReportFormat::from_str("yaml", true).is_err());
    }
}
