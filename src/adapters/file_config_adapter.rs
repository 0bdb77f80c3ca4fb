//! INI file configuration adapter.

use crate::domain::error::TradebookError;
use crate::ports::config_port::ConfigPort;
use configparser::ini::Ini;
use std::path::Path;

#[derive(Debug)]
pub struct FileConfigAdapter {
    config: Ini,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, TradebookError> {
        let path = path.as_ref();
        let mut config = Ini::new();
        config
            .load(path)
            .map_err(|reason| TradebookError::ConfigParse {
                file: path.display().to_string(),
                reason,
            })?;
        Ok(Self { config })
    }

    pub fn from_string(content: &str) -> Result<Self, TradebookError> {
        let mut config = Ini::new();
        config
            .read(content.to_string())
            .map_err(|reason| TradebookError::ConfigParse {
                file: "<string>".to_string(),
                reason,
            })?;
        Ok(Self { config })
    }

    fn parse_bool(value: &str) -> Option<bool> {
        match value.trim().to_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Some(true),
            "false" | "no" | "off" | "0" => Some(false),
            _ => None,
        }
    }
}

impl ConfigPort for FileConfigAdapter {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.config.get(section, key)
    }

    fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
        self.config
            .getint(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn get_double(&self, section: &str, key: &str, default: f64) -> f64 {
        self.config
            .getfloat(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool {
        self.config
            .get(section, key)
            .as_ref()
            .and_then(|v| Self::parse_bool(v))
            .unwrap_or(default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    #[test]
    fn from_string_parses_config() {
        let content = r#"
[backtest]
initial_capital = 100000.0
max_diversification = 10
sharpe_frequency = diária

[data]
prices = data/prices.csv
"#;
        let adapter = FileConfigAdapter::from_string(content).unwrap();
        assert_eq!(
            adapter.get_string("data", "prices"),
            Some("data/prices.csv".to_string())
        );
        assert_eq!(
            adapter.get_string("backtest", "sharpe_frequency"),
            Some("diária".to_string())
        );
    }

    #[test]
    fn get_string_returns_none_for_missing_key() {
        let adapter =
            FileConfigAdapter::from_string("[backtest]\ninitial_capital = 100\n").unwrap();
        assert_eq!(adapter.get_string("backtest", "missing"), None);
        assert_eq!(adapter.get_string("missing_section", "key"), None);
    }

    #[test]
    fn get_int_returns_value_or_default() {
        let adapter =
            FileConfigAdapter::from_string("[filter]\nsma_window = 7\nbad = abc\n").unwrap();
        assert_eq!(adapter.get_int("filter", "sma_window", 0), 7);
        assert_eq!(adapter.get_int("filter", "missing", 5), 5);
        assert_eq!(adapter.get_int("filter", "bad", 5), 5);
    }

    #[test]
    fn get_double_returns_value_or_default() {
        let adapter = FileConfigAdapter::from_string(
            "[backtest]\ncost_rate = 0.0005\ninitial_capital = not_a_number\n",
        )
        .unwrap();
        assert_eq!(adapter.get_double("backtest", "cost_rate", 0.0), 0.0005);
        assert_eq!(adapter.get_double("backtest", "missing", 99.9), 99.9);
        assert_eq!(adapter.get_double("backtest", "initial_capital", 99.9), 99.9);
    }

    #[test]
    fn get_bool_accepts_common_spellings() {
        let adapter = FileConfigAdapter::from_string(
            "[filter]\na = true\nb = yes\nc = 1\nd = on\ne = false\nf = no\ng = 0\nh = off\n",
        )
        .unwrap();
        for key in ["a", "b", "c", "d"] {
            assert!(adapter.get_bool("filter", key, false), "{key}");
        }
        for key in ["e", "f", "g", "h"] {
            assert!(!adapter.get_bool("filter", key, true), "{key}");
        }
        assert!(adapter.get_bool("filter", "missing", true));
        assert!(!adapter.get_bool("filter", "missing", false));
    }

    #[test]
    fn from_file_reads_config() {
        let file = create_temp_config("[export]\ndirectory = out\ndecimals = 4\n");
        let adapter = FileConfigAdapter::from_file(file.path()).unwrap();
        assert_eq!(adapter.get_string("export", "directory"), Some("out".to_string()));
        assert_eq!(adapter.get_int("export", "decimals", 2), 4);
    }

    #[test]
    fn from_file_returns_error_for_missing_file() {
        let err = FileConfigAdapter::from_file("/nonexistent/path/config.ini").unwrap_err();
        assert!(matches!(err, TradebookError::ConfigParse { .. }));
        assert_eq!(err.exit_status(), 2);
    }
}
