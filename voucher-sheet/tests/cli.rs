use assert_cmd::Command;
use clap::Parser;
use httpmock::prelude::*;
use predicates::prelude::*;
use serial_test::serial;
use std::fs::{self, write};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::{tempdir, TempDir};
use tracing_subscriber::prelude::*; // needed for .with()
use tracing_subscriber::{layer::Context, Layer, Registry};
use voucher_sheet::cli::{run, Cli, Commands};

fn write_config(dir: &TempDir, extra: &str) -> std::path::PathBuf {
    let out = dir.path().join("out");
    let path = dir.path().join("config.yaml");
    write(
        &path,
        format!("output_dir: {}\n{}", out.display(), extra),
    )
    .expect("Writing temp config failed");
    path
}

fn write_batch(dir: &TempDir, count: usize) -> std::path::PathBuf {
    let items: Vec<String> = (0..count)
        .map(|i| format!(r#"{{"code":"VCH-{i:05}-ZZ","value_minor":1250,"currency":"EUR"}}"#))
        .collect();
    let path = dir.path().join("batch.json");
    write(
        &path,
        format!(
            r#"{{"owner":{{"kind":"campaign","id":"3f2a9c7e-1111"}},"valid_until":"2026-12-31","items":[{}]}}"#,
            items.join(",")
        ),
    )
    .expect("Writing temp batch failed");
    path
}

fn pdfs_in(dir: &Path) -> Vec<std::path::PathBuf> {
    fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok().map(|e| e.path()))
                .filter(|p| p.extension().is_some_and(|ext| ext == "pdf"))
                .collect()
        })
        .unwrap_or_default()
}

#[test]
fn sheet_cli_happy_flow_writes_pdf() {
    let dir = tempdir().unwrap();
    let config = write_config(&dir, "");
    let batch = write_batch(&dir, 30);

    let mut cmd = Command::cargo_bin("voucher-sheet").expect("Binary exists");
    cmd.arg("sheet")
        .arg("--config")
        .arg(&config)
        .arg("--batch")
        .arg(&batch);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Downloaded.").and(predicate::str::contains("campaign-3f2a9c7e")));

    let pdfs = pdfs_in(&dir.path().join("out"));
    assert_eq!(pdfs.len(), 1, "Expected exactly one sheet, got {pdfs:?}");
    let bytes = fs::read(&pdfs[0]).unwrap();
    assert_eq!(&bytes[0..4], b"%PDF");
}

#[test]
fn sheet_cli_rejects_empty_batch() {
    let dir = tempdir().unwrap();
    let config = write_config(&dir, "");
    let batch = write_batch(&dir, 0);

    Command::cargo_bin("voucher-sheet")
        .unwrap()
        .args(["sheet", "--config"])
        .arg(&config)
        .arg("--batch")
        .arg(&batch)
        .assert()
        .failure()
        .stderr(predicate::str::contains("no items"));

    assert!(pdfs_in(&dir.path().join("out")).is_empty());
}

#[test]
fn export_cli_requires_token() {
    let dir = tempdir().unwrap();
    let config = write_config(&dir, "export:\n  base_url: http://127.0.0.1:9/\n");

    Command::cargo_bin("voucher-sheet")
        .unwrap()
        .env_remove("VOUCHER_SHEET_TOKEN")
        .args(["export", "--config"])
        .arg(&config)
        .args(["--path", "/exports/orders", "--fallback", "orders.csv"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--token"));
}

#[test]
fn export_cli_downloads_with_env_token() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET)
            .path("/api/exports/orders")
            .header("authorization", "Bearer env-token");
        then.status(200)
            .header("content-disposition", "attachment; filename*=UTF-8''orders%202026.csv")
            .body("id\n1\n");
    });

    let dir = tempdir().unwrap();
    let config = write_config(
        &dir,
        &format!("export:\n  base_url: {}/api/\n", server.base_url()),
    );

    Command::cargo_bin("voucher-sheet")
        .unwrap()
        .env("VOUCHER_SHEET_TOKEN", "env-token")
        .args(["export", "--config"])
        .arg(&config)
        .args(["--path", "exports/orders", "--fallback", "orders.csv"])
        .assert()
        .success()
        .stdout(predicate::str::contains("orders 2026.csv"));

    mock.assert();
    let saved = dir.path().join("out").join("orders 2026.csv");
    assert_eq!(fs::read(saved).unwrap(), b"id\n1\n");
}

#[tokio::test]
async fn export_run_reports_server_message() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/exports/gone");
            then.status(404).body(r#"{"message":"not found"}"#);
        })
        .await;

    let dir = tempdir().unwrap();
    let config = write_config(&dir, &format!("export:\n  base_url: {}\n", server.base_url()));

    let cli = Cli {
        command: Commands::Export {
            config,
            path: "/exports/gone".into(),
            fallback: "gone.csv".into(),
            token: "t".into(),
        },
    };
    let err = run(cli).await.unwrap_err();
    assert!(err.to_string().contains("not found"), "got: {err}");
    assert!(!dir.path().join("out").join("gone.csv").exists());
}

#[test]
#[serial]
fn export_token_falls_back_to_env() {
    std::env::set_var("VOUCHER_SHEET_TOKEN", "from-env");
    let cli = Cli::try_parse_from([
        "voucher-sheet",
        "export",
        "--config",
        "c.yaml",
        "--path",
        "/x",
        "--fallback",
        "x.csv",
    ]);
    std::env::remove_var("VOUCHER_SHEET_TOKEN");

    match cli.expect("Args should parse").command {
        Commands::Export { token, .. } => assert_eq!(token, "from-env"),
        Commands::Sheet { .. } => panic!("Parsed the wrong subcommand"),
    }
}

#[test]
#[serial]
fn export_token_flag_overrides_env() {
    std::env::set_var("VOUCHER_SHEET_TOKEN", "from-env");
    let cli = Cli::try_parse_from([
        "voucher-sheet",
        "export",
        "--config",
        "c.yaml",
        "--path",
        "/x",
        "--fallback",
        "x.csv",
        "--token",
        "from-flag",
    ]);
    std::env::remove_var("VOUCHER_SHEET_TOKEN");

    match cli.expect("Args should parse").command {
        Commands::Export { token, .. } => assert_eq!(token, "from-flag"),
        Commands::Sheet { .. } => panic!("Parsed the wrong subcommand"),
    }
}

/// Custom Layer to collect emitted event messages.
struct EventCollector {
    events: Arc<Mutex<Vec<String>>>,
}

impl<S> Layer<S> for EventCollector
where
    S: tracing::Subscriber,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        self.events.lock().unwrap().push(format!("{:?}", event));
    }
}

#[tokio::test]
async fn emits_trace_initialised_event() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let collector = EventCollector {
        events: events.clone(),
    };
    let subscriber = Registry::default().with(collector);
    let _guard = tracing::subscriber::set_default(subscriber);

    // The config path does not exist; only the opening event matters here.
    let cli = Cli {
        command: Commands::Sheet {
            config: "dummy.yaml".into(),
            batch: "dummy.json".into(),
        },
    };

    let _ = run(cli).await;

    let event_msgs = events.lock().unwrap();
    assert!(
        event_msgs.iter().any(|msg| msg.contains("trace_initialised")),
        "Expected a 'trace_initialised' trace event, got: {:?}",
        event_msgs
    );
}
