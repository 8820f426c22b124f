use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use toml::Value;
use trainhub_core::config::{AppConfig, LoadOptions};

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let source = |key_path: &str, env_key: &str| {
        field_source(key_path, env_key, config_file_doc.as_ref(), config_file_path.as_deref())
    };

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];

    lines.push(render_line(
        "database.url",
        &config.database.url,
        source("database.url", "TRAINHUB_DATABASE_URL"),
    ));
    lines.push(render_line(
        "database.max_connections",
        &config.database.max_connections.to_string(),
        source("database.max_connections", "TRAINHUB_DATABASE_MAX_CONNECTIONS"),
    ));
    lines.push(render_line(
        "database.timeout_secs",
        &config.database.timeout_secs.to_string(),
        source("database.timeout_secs", "TRAINHUB_DATABASE_TIMEOUT_SECS"),
    ));

    lines.push(render_line(
        "email.enabled",
        &config.email.enabled.to_string(),
        source("email.enabled", "TRAINHUB_EMAIL_ENABLED"),
    ));
    lines.push(render_line(
        "email.webhook_url",
        config.email.webhook_url.as_deref().unwrap_or("<unset>"),
        source("email.webhook_url", "TRAINHUB_EMAIL_WEBHOOK_URL"),
    ));
    let api_key = if config.email.api_key.is_some() { "<redacted>" } else { "<unset>" };
    lines.push(render_line(
        "email.api_key",
        api_key,
        source("email.api_key", "TRAINHUB_EMAIL_API_KEY"),
    ));
    lines.push(render_line(
        "email.sender",
        &config.email.sender,
        source("email.sender", "TRAINHUB_EMAIL_SENDER"),
    ));

    lines.push(render_line(
        "server.bind_address",
        &config.server.bind_address,
        source("server.bind_address", "TRAINHUB_SERVER_BIND_ADDRESS"),
    ));
    lines.push(render_line(
        "server.port",
        &config.server.port.to_string(),
        source("server.port", "TRAINHUB_SERVER_PORT"),
    ));
    lines.push(render_line(
        "server.graceful_shutdown_secs",
        &config.server.graceful_shutdown_secs.to_string(),
        source("server.graceful_shutdown_secs", "TRAINHUB_SERVER_GRACEFUL_SHUTDOWN_SECS"),
    ));

    lines.push(render_line(
        "budget.fiscal_year",
        &config.budget.fiscal_year,
        source("budget.fiscal_year", "TRAINHUB_BUDGET_FISCAL_YEAR"),
    ));
    lines.push(render_line(
        "budget.total_budget",
        &format!("{:.2}", config.budget.total_budget),
        source("budget.total_budget", "TRAINHUB_BUDGET_TOTAL"),
    ));

    lines.push(render_line(
        "logging.level",
        &config.logging.level,
        source("logging.level", "TRAINHUB_LOGGING_LEVEL"),
    ));
    lines.push(render_line(
        "logging.format",
        &format!("{:?}", config.logging.format),
        source("logging.format", "TRAINHUB_LOGGING_FORMAT"),
    ));

    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    let root = PathBuf::from("trainhub.toml");
    if root.exists() {
        return Some(root);
    }

    let nested = PathBuf::from("config/trainhub.toml");
    if nested.exists() {
        return Some(nested);
    }

    None
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: &str,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if env::var_os(env_key).is_some() {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}
