use std::env;
use std::sync::{Mutex, OnceLock};

use serde_json::Value;
use trainhub_cli::commands::{migrate, report, seed};

#[test]
fn migrate_returns_success_with_valid_env() {
    with_env(
        &[
            ("TRAINHUB_DATABASE_URL", "sqlite::memory:"),
            ("TRAINHUB_DATABASE_MAX_CONNECTIONS", "1"),
        ],
        || {
            let result = migrate::run();
            assert_eq!(result.exit_code, 0, "expected successful migrate run");

            let payload = parse_payload(&result.output);
            assert_eq!(payload["command"], "migrate");
            assert_eq!(payload["status"], "ok");

            let message = payload["message"].as_str().unwrap_or("");
            assert!(
                message.contains("initial schema"),
                "message should name the applied migrations: {message}"
            );
        },
    );
}

#[test]
fn migrate_reports_config_failure_for_bad_database_url() {
    with_env(&[("TRAINHUB_DATABASE_URL", "postgres://nope")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn seed_returns_deterministic_summary() {
    with_env(
        &[
            ("TRAINHUB_DATABASE_URL", "sqlite::memory:"),
            ("TRAINHUB_DATABASE_MAX_CONNECTIONS", "1"),
        ],
        || {
            let result = seed::run();
            assert_eq!(result.exit_code, 0, "expected seed success");

            let payload = parse_payload(&result.output);
            assert_eq!(payload["command"], "seed");
            assert_eq!(payload["status"], "ok");

            let message = payload["message"].as_str().unwrap_or("");
            assert!(message.contains("roster: 6 sworn members"));
            assert!(message.contains("TR-demo-001"));
        },
    );
}

#[test]
fn seed_is_idempotent_across_runs() {
    with_env(
        &[
            ("TRAINHUB_DATABASE_URL", "sqlite::memory:"),
            ("TRAINHUB_DATABASE_MAX_CONNECTIONS", "1"),
        ],
        || {
            let first = seed::run();
            assert_eq!(first.exit_code, 0, "expected first seed invocation success");
            let first_payload = parse_payload(&first.output);

            let second = seed::run();
            assert_eq!(second.exit_code, 0, "expected second seed invocation success");
            let second_payload = parse_payload(&second.output);

            assert_eq!(first_payload["message"], second_payload["message"]);
        },
    );
}

#[test]
fn report_rejects_unknown_range() {
    with_env(&[("TRAINHUB_DATABASE_URL", "sqlite::memory:")], || {
        let result = report::run("fortnight", "csv", None);
        assert_eq!(result.exit_code, 2, "expected invalid argument failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "report");
        assert_eq!(payload["error_class"], "invalid_argument");
    });
}

#[test]
fn report_writes_csv_to_requested_path() {
    let path = env::temp_dir().join("trainhub-report-test.csv");
    let path_str = path.to_string_lossy().to_string();

    with_env(
        &[
            ("TRAINHUB_DATABASE_URL", "sqlite::memory:"),
            ("TRAINHUB_DATABASE_MAX_CONNECTIONS", "1"),
        ],
        || {
            let result = report::run("year", "csv", Some(&path_str));
            assert_eq!(result.exit_code, 0, "expected report success");

            let payload = parse_payload(&result.output);
            assert_eq!(payload["command"], "report");
            assert_eq!(payload["status"], "ok");

            let written = std::fs::read_to_string(&path).expect("report file should exist");
            assert!(written.starts_with("Date,Officer,Badge,Training"));
        },
    );

    let _ = std::fs::remove_file(&path);
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "TRAINHUB_DATABASE_URL",
        "TRAINHUB_DATABASE_MAX_CONNECTIONS",
        "TRAINHUB_DATABASE_TIMEOUT_SECS",
        "TRAINHUB_EMAIL_ENABLED",
        "TRAINHUB_EMAIL_WEBHOOK_URL",
        "TRAINHUB_EMAIL_API_KEY",
        "TRAINHUB_EMAIL_SENDER",
        "TRAINHUB_SERVER_BIND_ADDRESS",
        "TRAINHUB_SERVER_PORT",
        "TRAINHUB_SERVER_GRACEFUL_SHUTDOWN_SECS",
        "TRAINHUB_BUDGET_FISCAL_YEAR",
        "TRAINHUB_BUDGET_TOTAL",
        "TRAINHUB_LOGGING_LEVEL",
        "TRAINHUB_LOGGING_FORMAT",
        "TRAINHUB_LOG_LEVEL",
        "TRAINHUB_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, previous) in previous_values {
        match previous {
            Some(value) => env::set_var(key, value),
            None => env::remove_var(key),
        }
    }
}
