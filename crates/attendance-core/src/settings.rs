use chrono::NaiveDate;
use clap::{CommandFactory, Parser};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::Result;
use crate::models::AttendanceStatus;

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// Team meeting attendance report
#[derive(Parser, Debug, Clone)]
#[command(
    name = "attendance-report",
    about = "Team meeting attendance report",
    version
)]
pub struct Settings {
    /// Attendance store directory (JSONL rows)
    #[arg(long, env = "ATTENDANCE_DATA_PATH")]
    pub data_path: Option<PathBuf>,

    /// First meeting date included in the report (YYYY-MM-DD, default today)
    #[arg(long)]
    pub start_date: Option<NaiveDate>,

    /// Meeting date shown in the day summary (YYYY-MM-DD, default today)
    #[arg(long)]
    pub view_date: Option<NaiveDate>,

    /// Output mode
    #[arg(long, default_value = "report", value_parser = ["report", "json", "history"])]
    pub view: String,

    /// User id for the history view or for --mark
    #[arg(long)]
    pub user: Option<String>,

    /// Record the user's status for the view date and exit
    #[arg(long, value_parser = ["attending", "not_attending", "undecided"])]
    pub mark: Option<String>,

    /// Timezone used to decide what "today" is (auto-detected if not specified)
    #[arg(long, default_value = "auto")]
    pub timezone: String,

    /// Display theme
    #[arg(long, default_value = "auto", value_parser = ["light", "dark", "classic", "auto"])]
    pub theme: String,

    /// Refresh rate in seconds (1-300)
    #[arg(long, default_value = "60", value_parser = clap::value_parser!(u32).range(1..=300))]
    pub refresh_rate: u32,

    /// Logging level
    #[arg(long, default_value = "INFO", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL"])]
    pub log_level: String,

    /// Log file path
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// Clear saved configuration
    #[arg(long)]
    pub clear: bool,
}

// ── LastUsedParams ─────────────────────────────────────────────────────────────

/// Persisted last-used parameters saved to `~/.attendance-report/last_used.json`.
#[derive(Debug, Serialize, Deserialize, Default, Clone)]
pub struct LastUsedParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub view: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_rate: Option<u32>,
}

impl LastUsedParams {
    /// Default path: `~/.attendance-report/last_used.json`.
    pub fn config_path() -> PathBuf {
        Self::config_path_in(&dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
    }

    /// Config path rooted at `base_dir`.
    pub fn config_path_in(base_dir: &std::path::Path) -> PathBuf {
        base_dir.join(".attendance-report").join("last_used.json")
    }

    /// Load persisted params from an explicit path.
    /// Returns `Default` when the file is absent or cannot be parsed.
    pub fn load_from(path: &std::path::Path) -> Self {
        let Ok(content) = std::fs::read_to_string(path) else {
            return Self::default();
        };
        serde_json::from_str(&content).unwrap_or_default()
    }

    /// Atomically write params to `path`, creating parent directories.
    pub fn save_to(&self, path: &std::path::Path) -> std::result::Result<(), std::io::Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;

        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, &json)?;
        std::fs::rename(&tmp, path)?;

        Ok(())
    }

    /// Delete the config file at `path` if it exists.
    pub fn clear_at(path: &std::path::Path) -> std::result::Result<(), std::io::Error> {
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }
}

// ── Settings impl ──────────────────────────────────────────────────────────────

impl Settings {
    /// Parse CLI arguments, merge with last-used params where no explicit CLI
    /// value was provided, resolve `"auto"` values, and persist the result.
    pub fn load_with_last_used() -> Self {
        Self::load_with_last_used_impl(
            std::env::args_os().collect(),
            &LastUsedParams::config_path(),
        )
    }

    /// Full implementation with an explicit argument list and config path.
    pub fn load_with_last_used_impl(
        args: Vec<std::ffi::OsString>,
        config_path: &std::path::Path,
    ) -> Self {
        let matches = Settings::command().get_matches_from(args.clone());
        let mut settings = Settings::parse_from(args);

        if settings.clear {
            let _ = LastUsedParams::clear_at(config_path);
            return Self::resolve_auto_values(settings);
        }

        let last = LastUsedParams::load_from(config_path);

        // CLI always wins. One-shot values (dates, user, mark) are never
        // loaded from last-used.
        if !is_arg_explicitly_set(&matches, "view") {
            if let Some(v) = last.view {
                settings.view = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "timezone") {
            if let Some(v) = last.timezone {
                settings.timezone = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "theme") {
            if let Some(v) = last.theme {
                settings.theme = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "refresh_rate") {
            if let Some(v) = last.refresh_rate {
                settings.refresh_rate = v;
            }
        }
        if settings.data_path.is_none() {
            settings.data_path = last.data_path;
        }

        settings = Self::resolve_auto_values(settings);

        // The history view is tied to a --user; do not make it sticky.
        if settings.view != "history" {
            let params = LastUsedParams::from(&settings);
            let _ = params.save_to(config_path);
        }

        settings
    }

    /// Resolve `"auto"` sentinel values and apply the `--debug` flag.
    fn resolve_auto_values(mut settings: Settings) -> Settings {
        if settings.timezone == "auto" {
            settings.timezone = crate::time_utils::get_system_timezone();
        }

        if settings.debug {
            settings.log_level = "DEBUG".to_string();
        }

        settings
    }

    /// Today's date in the configured timezone.
    pub fn today(&self) -> NaiveDate {
        crate::time_utils::today_in(&self.timezone)
    }

    /// Start date, defaulting to (and never later than) today.
    pub fn effective_start_date(&self) -> NaiveDate {
        let today = self.today();
        let start = self.start_date.unwrap_or(today);
        crate::time_utils::clamp_to_today(start, today)
    }

    /// View date, defaulting to today.
    pub fn effective_view_date(&self) -> NaiveDate {
        self.view_date.unwrap_or_else(|| self.today())
    }

    /// Parsed `--mark` value, if given.
    pub fn mark_status(&self) -> Result<Option<AttendanceStatus>> {
        self.mark.as_deref().map(str::parse::<AttendanceStatus>).transpose()
    }
}

// ── Conversion ─────────────────────────────────────────────────────────────────

impl From<&Settings> for LastUsedParams {
    fn from(s: &Settings) -> Self {
        LastUsedParams {
            theme: Some(s.theme.clone()),
            timezone: Some(s.timezone.clone()),
            view: Some(s.view.clone()),
            data_path: s.data_path.clone(),
            refresh_rate: Some(s.refresh_rate),
        }
    }
}

/// Returns `true` when `name` was supplied explicitly on the command line
/// (not via default value or environment variable).
fn is_arg_explicitly_set(matches: &clap::ArgMatches, name: &str) -> bool {
    matches.value_source(name) == Some(clap::parser::ValueSource::CommandLine)
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn tmp_config_path(tmp: &TempDir) -> PathBuf {
        LastUsedParams::config_path_in(tmp.path())
    }

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_last_used_params_save_load() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp_config_path(&tmp);
        let params = LastUsedParams {
            theme: Some("dark".to_string()),
            timezone: Some("Asia/Kolkata".to_string()),
            view: Some("json".to_string()),
            data_path: Some(PathBuf::from("/srv/attendance")),
            refresh_rate: Some(30),
        };

        params.save_to(&path).expect("save");
        let loaded = LastUsedParams::load_from(&path);

        assert_eq!(loaded.theme, Some("dark".to_string()));
        assert_eq!(loaded.timezone, Some("Asia/Kolkata".to_string()));
        assert_eq!(loaded.view, Some("json".to_string()));
        assert_eq!(loaded.data_path, Some(PathBuf::from("/srv/attendance")));
        assert_eq!(loaded.refresh_rate, Some(30));
    }

    #[test]
    fn test_last_used_params_clear() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp_config_path(&tmp);
        LastUsedParams {
            theme: Some("light".to_string()),
            ..Default::default()
        }
        .save_to(&path)
        .expect("save");
        assert!(path.exists());

        LastUsedParams::clear_at(&path).expect("clear");
        assert!(!path.exists());
    }

    #[test]
    fn test_last_used_params_default_when_missing_or_corrupt() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp_config_path(&tmp);
        assert!(LastUsedParams::load_from(&path).theme.is_none());

        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{not json").unwrap();
        assert!(LastUsedParams::load_from(&path).view.is_none());
    }

    #[test]
    fn test_settings_default_values() {
        let settings = Settings::parse_from(["attendance-report"]);

        assert!(settings.data_path.is_none());
        assert!(settings.start_date.is_none());
        assert!(settings.view_date.is_none());
        assert_eq!(settings.view, "report");
        assert!(settings.user.is_none());
        assert!(settings.mark.is_none());
        assert_eq!(settings.timezone, "auto");
        assert_eq!(settings.theme, "auto");
        assert_eq!(settings.refresh_rate, 60);
        assert_eq!(settings.log_level, "INFO");
        assert!(!settings.debug);
        assert!(!settings.clear);
    }

    #[test]
    fn test_settings_parses_dates() {
        let settings = Settings::parse_from([
            "attendance-report",
            "--start-date",
            "2024-01-01",
            "--view-date",
            "2024-01-15",
        ]);
        assert_eq!(settings.start_date, Some(d("2024-01-01")));
        assert_eq!(settings.view_date, Some(d("2024-01-15")));
    }

    #[test]
    fn test_settings_rejects_bad_date() {
        let result = Settings::try_parse_from(["attendance-report", "--start-date", "yesterday"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_settings_rejects_unknown_mark() {
        let result = Settings::try_parse_from(["attendance-report", "--mark", "maybe"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_mark_status_parses() {
        let settings = Settings::parse_from([
            "attendance-report",
            "--user",
            "u1",
            "--mark",
            "not_attending",
        ]);
        assert_eq!(
            settings.mark_status().unwrap(),
            Some(AttendanceStatus::NotAttending)
        );
    }

    #[test]
    fn test_effective_start_date_is_clamped_to_today() {
        let mut settings = Settings::parse_from(["attendance-report", "--timezone", "UTC"]);
        let today = settings.today();
        settings.start_date = Some(crate::time_utils::shift_days(today, 30));
        assert_eq!(settings.effective_start_date(), today);

        settings.start_date = Some(d("2020-01-01"));
        assert_eq!(settings.effective_start_date(), d("2020-01-01"));
    }

    #[test]
    fn test_load_with_last_used_merges_persisted_theme() {
        let tmp = TempDir::new().expect("tempdir");
        let config_path = tmp_config_path(&tmp);
        LastUsedParams {
            theme: Some("dark".to_string()),
            timezone: Some("UTC".to_string()),
            ..Default::default()
        }
        .save_to(&config_path)
        .expect("save");

        let settings =
            Settings::load_with_last_used_impl(vec!["attendance-report".into()], &config_path);
        assert_eq!(settings.theme, "dark");
        assert_eq!(settings.timezone, "UTC");
    }

    #[test]
    fn test_load_with_last_used_cli_overrides_persisted() {
        let tmp = TempDir::new().expect("tempdir");
        let config_path = tmp_config_path(&tmp);
        LastUsedParams {
            theme: Some("dark".to_string()),
            timezone: Some("UTC".to_string()),
            ..Default::default()
        }
        .save_to(&config_path)
        .expect("save");

        let settings = Settings::load_with_last_used_impl(
            vec!["attendance-report".into(), "--theme".into(), "light".into()],
            &config_path,
        );
        assert_eq!(settings.theme, "light");
    }

    #[test]
    fn test_load_with_last_used_restores_data_path() {
        let tmp = TempDir::new().expect("tempdir");
        let config_path = tmp_config_path(&tmp);
        LastUsedParams {
            data_path: Some(PathBuf::from("/srv/attendance")),
            timezone: Some("UTC".to_string()),
            ..Default::default()
        }
        .save_to(&config_path)
        .expect("save");

        let settings =
            Settings::load_with_last_used_impl(vec!["attendance-report".into()], &config_path);
        assert_eq!(settings.data_path, Some(PathBuf::from("/srv/attendance")));
    }

    #[test]
    fn test_load_with_last_used_clear_removes_file() {
        let tmp = TempDir::new().expect("tempdir");
        let config_path = tmp_config_path(&tmp);
        LastUsedParams {
            theme: Some("classic".to_string()),
            ..Default::default()
        }
        .save_to(&config_path)
        .expect("save");

        Settings::load_with_last_used_impl(
            vec!["attendance-report".into(), "--clear".into()],
            &config_path,
        );

        assert!(!config_path.exists());
    }

    #[test]
    fn test_load_with_last_used_debug_overrides_log_level() {
        let tmp = TempDir::new().expect("tempdir");
        let config_path = tmp_config_path(&tmp);

        let settings = Settings::load_with_last_used_impl(
            vec!["attendance-report".into(), "--debug".into()],
            &config_path,
        );
        assert_eq!(settings.log_level, "DEBUG");
    }

    #[test]
    fn test_load_with_last_used_persists_after_run() {
        let tmp = TempDir::new().expect("tempdir");
        let config_path = tmp_config_path(&tmp);

        Settings::load_with_last_used_impl(
            vec!["attendance-report".into(), "--theme".into(), "classic".into()],
            &config_path,
        );

        assert!(config_path.exists());
        let loaded = LastUsedParams::load_from(&config_path);
        assert_eq!(loaded.theme, Some("classic".to_string()));
    }

    #[test]
    fn test_history_view_is_not_persisted() {
        let tmp = TempDir::new().expect("tempdir");
        let config_path = tmp_config_path(&tmp);

        Settings::load_with_last_used_impl(
            vec![
                "attendance-report".into(),
                "--view".into(),
                "history".into(),
                "--user".into(),
                "u1".into(),
            ],
            &config_path,
        );

        assert!(!config_path.exists());
    }
}
