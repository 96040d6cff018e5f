use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: Server,
    #[serde(default)]
    pub routes: Routes,
    #[serde(default)]
    pub polling: Polling,
    #[serde(default)]
    pub upload: Upload,
    #[serde(default)]
    pub output: Output,
    #[serde(default)]
    pub logging: Logging,
    #[serde(default)]
    pub debug: Debug,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config: {}", path.display()))?;
        let cfg: Config = toml::from_str(&raw).with_context(|| "parsing TOML")?;
        Ok(cfg)
    }

    /// Absolute URL for a route path, e.g. `/upload` -> `http://host/api/v1/upload`.
    pub fn url(&self, route: &str) -> String {
        let base = self.server.base_url.trim_end_matches('/');
        let prefix = self.server.api_prefix.trim_matches('/');
        let route = route.trim_start_matches('/');
        if prefix.is_empty() {
            format!("{base}/{route}")
        } else {
            format!("{base}/{prefix}/{route}")
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Server {
    pub base_url: String,
    pub api_prefix: String,
    pub request_timeout_seconds: u64,
    pub user_agent: String,
}
impl Default for Server {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".into(),
            api_prefix: "".into(),
            request_timeout_seconds: 60,
            user_agent: concat!("pii-check/", env!("CARGO_PKG_VERSION")).into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Routes {
    pub submit: String,
    pub status: String,
    pub report: String,
    pub export_redacted: String,
    pub export_json: String,
    pub export_csv: String,
    pub feedback: String,
}
impl Default for Routes {
    fn default() -> Self {
        Self {
            submit: "/upload".into(),
            status: "/upload_status".into(),
            report: "/report".into(),
            export_redacted: "/export/redacted".into(),
            export_json: "/export/json".into(),
            export_csv: "/export/csv".into(),
            feedback: "/feedback".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Polling {
    pub baseline_delay_ms: u64,
    pub retry_delay_ms: u64,
    /// 0 disables the bound.
    pub max_consecutive_transport_errors: u32,
    /// 0 disables the deadline.
    pub deadline_seconds: u64,
}
impl Default for Polling {
    fn default() -> Self {
        Self {
            baseline_delay_ms: 900,
            retry_delay_ms: 1500,
            max_consecutive_transport_errors: 40,
            deadline_seconds: 1800,
        }
    }
}

impl Polling {
    pub fn baseline_delay(&self) -> Duration {
        Duration::from_millis(self.baseline_delay_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn deadline(&self) -> Option<Duration> {
        (self.deadline_seconds > 0).then(|| Duration::from_secs(self.deadline_seconds))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Upload {
    pub field_name: String,
    pub require_non_empty: bool,
}
impl Default for Upload {
    fn default() -> Self {
        Self {
            field_name: "file".into(),
            require_non_empty: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Output {
    pub out_dir: String,
    pub write_report_json: bool,
    pub report_filename: String,
    pub print_summary: bool,
}
impl Default for Output {
    fn default() -> Self {
        Self {
            out_dir: "out".into(),
            write_report_json: true,
            report_filename: "report.json".into(),
            print_summary: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Logging {
    pub level: String,
    pub json: bool,
    pub write_to_file: bool,
    pub file_path: String,
}
impl Default for Logging {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
            write_to_file: false,
            file_path: "".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Debug {
    pub dump_effective_config: bool,
}
impl Default for Debug {
    fn default() -> Self {
        Self {
            dump_effective_config: false,
        }
    }
}
