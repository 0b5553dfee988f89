use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

const DEFAULT_LABEL: &str = "actual";
const DEFAULT_SERIES_COLUMN: &str = "graph";

// ---------------------------------------------------------------------------
// FrameConfig – column roles of a TimeFrame
// ---------------------------------------------------------------------------

/// Column roles and series tagging for a [`crate::data::frame::TimeFrame`].
///
/// Deserializes from TOML with camelCase keys:
///
/// ```toml
/// excludeColumnsFromFilter = ["sales"]
/// dateColumn = "date"
/// target = "sales"
/// label = "actual"
/// seriesColumn = "graph"
/// withGraph = true
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameConfig {
    /// Columns never offered for predicate filtering.
    #[serde(default)]
    pub exclude_columns_from_filter: Vec<String>,
    pub date_column: String,
    /// Numeric column summed and predicted.
    pub target: String,
    /// Series label given to freshly loaded rows.
    #[serde(default = "default_label")]
    pub label: String,
    #[serde(default = "default_series_column")]
    pub series_column: String,
    #[serde(default = "default_with_graph")]
    pub with_graph: bool,
}

fn default_label() -> String {
    DEFAULT_LABEL.to_string()
}

fn default_series_column() -> String {
    DEFAULT_SERIES_COLUMN.to_string()
}

fn default_with_graph() -> bool {
    true
}

impl FrameConfig {
    /// Config with the given date and target columns and defaults elsewhere.
    pub fn new(date_column: impl Into<String>, target: impl Into<String>) -> Self {
        FrameConfig {
            exclude_columns_from_filter: Vec::new(),
            date_column: date_column.into(),
            target: target.into(),
            label: default_label(),
            series_column: default_series_column(),
            with_graph: default_with_graph(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_series_column(mut self, column: impl Into<String>) -> Self {
        self.series_column = column.into();
        self
    }

    pub fn with_graph(mut self, enabled: bool) -> Self {
        self.with_graph = enabled;
        self
    }

    pub fn exclude_from_filter<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_columns_from_filter
            .extend(columns.into_iter().map(Into::into));
        self
    }
}

/// Read a [`FrameConfig`] from a TOML file.
pub fn load_config(path: &Path) -> Result<FrameConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_fill_optional_keys() {
        let cfg: FrameConfig = toml::from_str(
            r#"
            dateColumn = "day"
            target = "units"
            "#,
        )
        .unwrap();
        assert_eq!(cfg, FrameConfig::new("day", "units"));
        assert!(cfg.with_graph);
        assert_eq!(cfg.label, "actual");
        assert_eq!(cfg.series_column, "graph");
    }

    #[test]
    fn loads_full_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            excludeColumnsFromFilter = ["units", "day"]
            dateColumn = "day"
            target = "units"
            label = "history"
            seriesColumn = "line"
            withGraph = false
            "#
        )
        .unwrap();
        let cfg = load_config(file.path()).unwrap();
        assert_eq!(
            cfg,
            FrameConfig::new("day", "units")
                .exclude_from_filter(["units", "day"])
                .with_label("history")
                .with_series_column("line")
                .with_graph(false)
        );
    }

    #[test]
    fn missing_target_fails() {
        let err = toml::from_str::<FrameConfig>(r#"dateColumn = "day""#);
        assert!(err.is_err());
    }
}
