//! Config file loading and the merge of CLI, file and built-in defaults.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use fetchbot_core::download::constants::READ_TIMEOUT_SECS;

use crate::cli::Args;

const DEFAULT_DOWNLOAD_DIR: &str = "./d";
const DEFAULT_SESSIONS_DIR: &str = "./s";
const DEFAULT_QUEUE_DIR: &str = ".";
const MAX_SECS: u64 = 3600;
const DEFAULT_REPORT_LOG: &str = "./raports.queue";

/// Values read from the config file; every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileConfig {
    pub download_dir: Option<PathBuf>,
    pub sessions_dir: Option<PathBuf>,
    pub queue_dir: Option<PathBuf>,
    pub report_log: Option<PathBuf>,
    pub diagnostic_log: Option<PathBuf>,
    pub speed_report: Option<PathBuf>,
    pub speed_interval_secs: Option<u64>,
    pub connect_timeout_secs: Option<u64>,
    pub read_timeout_secs: Option<u64>,
    /// Raw `Cookie` header value sent with every request.
    pub cookie: Option<String>,
}

impl FileConfig {
    /// Validates numeric ranges.
    pub fn validate(&self) -> Result<()> {
        validate_secs("speed_interval_secs", self.speed_interval_secs, MAX_SECS)?;
        validate_secs("connect_timeout_secs", self.connect_timeout_secs, MAX_SECS)?;
        validate_secs("read_timeout_secs", self.read_timeout_secs, READ_TIMEOUT_SECS)?;
        Ok(())
    }
}

fn validate_secs(field: &str, value: Option<u64>, max: u64) -> Result<()> {
    let Some(value) = value else {
        return Ok(());
    };
    if !(1..=max).contains(&value) {
        bail!("Invalid config value for `{field}`: {value}. Expected range: 1..={max}");
    }
    Ok(())
}

/// Fully resolved run settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub download_dir: PathBuf,
    pub sessions_dir: PathBuf,
    pub queue_dir: PathBuf,
    pub report_log: PathBuf,
    pub diagnostic_log: Option<PathBuf>,
    pub speed_report: Option<PathBuf>,
    pub speed_interval: Option<Duration>,
    pub connect_timeout: Option<Duration>,
    pub read_timeout: Option<Duration>,
    pub cookie: Option<String>,
}

impl Settings {
    /// Command line wins over the file, the file over built-in defaults.
    #[must_use]
    pub fn resolve(args: &Args, file: Option<FileConfig>) -> Self {
        let file = file.unwrap_or_default();
        let pick = |cli: &Option<PathBuf>, file: Option<PathBuf>, default: &str| {
            cli.clone()
                .or(file)
                .unwrap_or_else(|| PathBuf::from(default))
        };

        Self {
            download_dir: pick(&args.download_dir, file.download_dir, DEFAULT_DOWNLOAD_DIR),
            sessions_dir: pick(&args.sessions_dir, file.sessions_dir, DEFAULT_SESSIONS_DIR),
            queue_dir: pick(&args.queue_dir, file.queue_dir, DEFAULT_QUEUE_DIR),
            report_log: pick(&args.report_log, file.report_log, DEFAULT_REPORT_LOG),
            diagnostic_log: args.diagnostic_log.clone().or(file.diagnostic_log),
            speed_report: args.speed_report.clone().or(file.speed_report),
            speed_interval: args
                .speed_interval
                .or(file.speed_interval_secs)
                .map(Duration::from_secs),
            connect_timeout: file.connect_timeout_secs.map(Duration::from_secs),
            read_timeout: file.read_timeout_secs.map(Duration::from_secs),
            cookie: file.cookie,
        }
    }
}

/// Resolves default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/fetchbot/config.toml`
/// 2. `$HOME/.config/fetchbot/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(
            PathBuf::from(xdg_config_home)
                .join("fetchbot")
                .join("config.toml"),
        );
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("fetchbot")
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads the config file.
///
/// An explicit path must exist; the default path is skipped when absent.
pub fn load_config(explicit: Option<&Path>) -> Result<Option<FileConfig>> {
    if let Some(path) = explicit {
        return load_file_config(path).map(Some);
    }
    match resolve_default_config_path() {
        Some(path) if path.exists() => load_file_config(&path).map(Some),
        _ => Ok(None),
    }
}

fn load_file_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let mut cfg = FileConfig::default();
    for (line_index, raw_line) in raw.lines().enumerate() {
        let line_no = line_index + 1;
        let line = strip_inline_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }

        let Some((raw_key, raw_value)) = line.split_once('=') else {
            bail!("Invalid config syntax on line {line_no}: expected key = value");
        };

        let key = raw_key.trim();
        let value = raw_value.trim();
        let path = || {
            parse_string_literal(value)
                .map(PathBuf::from)
                .with_context(|| format!("Invalid `{key}` value on line {line_no}"))
        };
        let secs = || {
            parse_integer_u64(value)
                .with_context(|| format!("Invalid `{key}` value on line {line_no}"))
        };

        match key {
            "download_dir" => cfg.download_dir = Some(path()?),
            "sessions_dir" => cfg.sessions_dir = Some(path()?),
            "queue_dir" => cfg.queue_dir = Some(path()?),
            "report_log" => cfg.report_log = Some(path()?),
            "diagnostic_log" => cfg.diagnostic_log = Some(path()?),
            "speed_report" => cfg.speed_report = Some(path()?),
            "speed_interval_secs" => cfg.speed_interval_secs = Some(secs()?),
            "connect_timeout_secs" => cfg.connect_timeout_secs = Some(secs()?),
            "read_timeout_secs" => cfg.read_timeout_secs = Some(secs()?),
            "cookie" => {
                let parsed = parse_string_literal(value)
                    .with_context(|| format!("Invalid `cookie` value on line {line_no}"))?;
                cfg.cookie = Some(parsed);
            }
            unknown => {
                bail!("Unknown configuration key: '{unknown}' on line {line_no}");
            }
        }
    }
    cfg.validate()?;
    Ok(cfg)
}

fn strip_inline_comment(line: &str) -> &str {
    let mut in_string = false;
    for (index, ch) in line.char_indices() {
        match ch {
            '"' => in_string = !in_string,
            '#' if !in_string => return &line[..index],
            _ => {}
        }
    }
    line
}

fn parse_string_literal(raw_value: &str) -> Result<String> {
    if raw_value.len() < 2 || !raw_value.starts_with('"') || !raw_value.ends_with('"') {
        bail!("Expected double-quoted string");
    }
    Ok(raw_value[1..raw_value.len() - 1].to_string())
}

fn parse_integer_u64(raw_value: &str) -> Result<u64> {
    let token = raw_value.trim();
    if token.is_empty() {
        bail!("Expected integer value");
    }
    let value = token.parse::<i128>()?;
    if value < 0 {
        bail!("Expected non-negative integer");
    }
    u64::try_from(value).map_err(|_| anyhow::anyhow!("Integer value out of range for u64"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use clap::Parser;

    use super::*;

    #[test]
    fn test_parse_config_all_fields() {
        let cfg = parse_config_str(
            r#"
download_dir = "/srv/files"
sessions_dir = "/srv/sessions" # page dumps
queue_dir = "/srv/q"
report_log = "/srv/report"
diagnostic_log = "/srv/trace.log"
speed_report = "/srv/speed.log"
speed_interval_secs = 30
connect_timeout_secs = 15
read_timeout_secs = 600
cookie = "user=abc#def"
"#,
        )
        .expect("full config should parse");
        assert_eq!(cfg.download_dir, Some(PathBuf::from("/srv/files")));
        assert_eq!(cfg.sessions_dir, Some(PathBuf::from("/srv/sessions")));
        assert_eq!(cfg.speed_interval_secs, Some(30));
        assert_eq!(cfg.read_timeout_secs, Some(600));
        assert_eq!(cfg.cookie.as_deref(), Some("user=abc#def"));
    }

    #[test]
    fn test_parse_config_rejects_unknown_keys() {
        let err = parse_config_str("concurrency = 4").expect_err("unknown key error expected");
        assert!(err.to_string().contains("Unknown configuration key"));
        assert!(err.to_string().contains("concurrency"));
    }

    #[test]
    fn test_parse_config_rejects_unquoted_path() {
        let err = parse_config_str("download_dir = /srv").expect_err("quotes required");
        assert!(err.to_string().contains("download_dir"));
    }

    #[test]
    fn test_parse_config_rejects_out_of_range_interval() {
        let err = parse_config_str("speed_interval_secs = 0").expect_err("0 is below range");
        assert!(err.to_string().contains("speed_interval_secs"));

        let err = parse_config_str("connect_timeout_secs = 3601").expect_err("above range");
        assert!(err.to_string().contains("connect_timeout_secs"));

        let err = parse_config_str("read_timeout_secs = 21601").expect_err("above range");
        assert!(err.to_string().contains("read_timeout_secs"));
    }

    #[test]
    fn test_parse_config_read_timeout_may_lengthen_up_to_default() {
        let cfg = parse_config_str("read_timeout_secs = 21600").unwrap();
        assert_eq!(cfg.read_timeout_secs, Some(READ_TIMEOUT_SECS));

        let cfg = parse_config_str("read_timeout_secs = 7200").unwrap();
        assert_eq!(cfg.read_timeout_secs, Some(7200));
    }

    #[test]
    fn test_parse_config_rejects_missing_equals() {
        let err = parse_config_str("download_dir").expect_err("syntax error expected");
        assert!(err.to_string().contains("line 1"));
    }

    #[test]
    fn test_settings_defaults() {
        let args = Args::try_parse_from(["fetchbot"]).unwrap();
        let settings = Settings::resolve(&args, None);
        assert_eq!(settings.download_dir, PathBuf::from("./d"));
        assert_eq!(settings.sessions_dir, PathBuf::from("./s"));
        assert_eq!(settings.queue_dir, PathBuf::from("."));
        assert_eq!(settings.report_log, PathBuf::from("./raports.queue"));
        assert!(settings.speed_report.is_none());
        assert!(settings.speed_interval.is_none());
    }

    #[test]
    fn test_settings_cli_overrides_file() {
        let args = Args::try_parse_from(["fetchbot", "-d", "/cli/d", "--speed-interval", "5"])
            .unwrap();
        let file = FileConfig {
            download_dir: Some(PathBuf::from("/file/d")),
            sessions_dir: Some(PathBuf::from("/file/s")),
            speed_interval_secs: Some(60),
            ..FileConfig::default()
        };
        let settings = Settings::resolve(&args, Some(file));
        assert_eq!(settings.download_dir, PathBuf::from("/cli/d"));
        assert_eq!(settings.sessions_dir, PathBuf::from("/file/s"));
        assert_eq!(settings.speed_interval, Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_load_config_explicit_missing_file_fails() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = load_config(Some(&dir.path().join("nope.toml"))).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_load_config_explicit_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "queue_dir = \"/q\"\n").unwrap();
        let cfg = load_config(Some(&path)).unwrap().unwrap();
        assert_eq!(cfg.queue_dir, Some(PathBuf::from("/q")));
    }
}
