//! Common test utilities for reconciliation-service integration tests.

use reconciliation_service::config::{ReconciliationConfig, ReportConfig, UploadConfig};
use reconciliation_service::models::ReportFormat;
use reconciliation_service::startup::Application;
use service_core::config::Config as CommonConfig;
use std::path::{Path, PathBuf};
use std::sync::Once;
use std::time::Duration;
use tempfile::TempDir;

static INIT: Once = Once::new();

/// Initialize tracing for tests (only once).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("info,reconciliation_service=debug")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

fn test_config(scratch_dir: &Path) -> ReconciliationConfig {
    ReconciliationConfig {
        common: CommonConfig {
            host: [127, 0, 0, 1].into(),
            port: 0,
        },
        service_name: "reconciliation-service".to_string(),
        service_version: "test".to_string(),
        log_level: "debug".to_string(),
        otlp_endpoint: None,
        upload: UploadConfig {
            scratch_dir: scratch_dir.to_path_buf(),
            max_upload_bytes: 5 * 1024 * 1024,
            request_timeout: Duration::from_secs(30),
        },
        report: ReportConfig {
            default_format: ReportFormat::Xlsx,
            missing_user_id: "N/A".to_string(),
        },
    }
}

/// Test application wrapper.
#[allow(dead_code)]
pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub client: reqwest::Client,
    scratch: TempDir,
}

#[allow(dead_code)]
impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    pub fn scratch_dir(&self) -> PathBuf {
        self.scratch.path().to_path_buf()
    }

    /// Entries left behind in the scratch directory.
    pub fn scratch_entries(&self) -> usize {
        std::fs::read_dir(self.scratch.path())
            .expect("Failed to list scratch directory")
            .count()
    }
}

/// Spawn the application on a random port with its own scratch directory.
pub async fn spawn_app() -> TestApp {
    init_tracing();

    let scratch = tempfile::tempdir().expect("Failed to create scratch directory");
    let app = Application::build(test_config(scratch.path()))
        .await
        .expect("Failed to build application");

    let port = app.port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        app.run_until_stopped().await.ok();
    });

    let client = reqwest::Client::new();
    for _ in 0..50 {
        if client.get(format!("{}/health", address)).send().await.is_ok() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    TestApp {
        address,
        port,
        client,
        scratch,
    }
}

/// In-memory xlsx with a single sheet.
#[allow(dead_code)]
pub fn xlsx_bytes(header: &[&str], rows: &[Vec<XlsxCell>]) -> Vec<u8> {
    let mut workbook = rust_xlsxwriter::Workbook::new();
    let sheet = workbook.add_worksheet();
    for (col, title) in header.iter().enumerate() {
        sheet.write_string(0, col as u16, *title).unwrap();
    }
    for (i, row) in rows.iter().enumerate() {
        let r = (i + 1) as u32;
        for (col, cell) in row.iter().enumerate() {
            match cell {
                XlsxCell::Text(s) => {
                    sheet.write_string(r, col as u16, *s).unwrap();
                }
                XlsxCell::Number(n) => {
                    sheet.write_number(r, col as u16, *n).unwrap();
                }
                XlsxCell::Blank => {}
            }
        }
    }
    workbook.save_to_buffer().unwrap()
}

#[allow(dead_code)]
pub enum XlsxCell {
    Text(&'static str),
    Number(f64),
    Blank,
}
