// Copyright 2026 Pagewright Contributors
// SPDX-License-Identifier: Apache-2.0

//! End-to-end runs over scripted pages and a mocked SMS provider.

use anyhow::Result;
use async_trait::async_trait;
use pagewright::testing::{PageCall, ScriptedPage};
use pagewright::{Cookie, PageContext, RetryPolicy, TypingCadence};
use pagewright_runtime::audit::AuditRecord;
use pagewright_runtime::cli::App;
use pagewright_runtime::config::RunConfig;
use pagewright_runtime::cookies::{export_cookies, import_cookies};
use pagewright_runtime::events::RunEvent;
use pagewright_runtime::flows::{extract_phone, LoginCredentials, LoginFlow};
use pagewright_runtime::messaging::{BatchOptions, BatchSender, RowStatus, TwilioGateway};
use pagewright_runtime::renderer::Renderer;
use pagewright_runtime::store::Store;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Hands out pre-built pages in order.
struct ScriptedRenderer {
    pages: Mutex<Vec<ScriptedPage>>,
    shutdowns: AtomicUsize,
}

impl ScriptedRenderer {
    fn new(pages: Vec<ScriptedPage>) -> Self {
        Self {
            pages: Mutex::new(pages.into_iter().rev().collect()),
            shutdowns: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Renderer for ScriptedRenderer {
    async fn new_context(&self) -> Result<Box<dyn PageContext>> {
        let page = self.pages.lock().unwrap().pop();
        match page {
            Some(page) => Ok(Box::new(page)),
            None => anyhow::bail!("out of scripted pages"),
        }
    }
    async fn shutdown(&self) -> Result<()> {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
    fn active_contexts(&self) -> usize {
        0
    }
    fn backend(&self) -> &'static str {
        "scripted"
    }
}

fn test_config(dir: &Path) -> RunConfig {
    let mut config = RunConfig::default();
    config.interaction.selector_timeout_ms = 200;
    config.interaction.settle_ms = 10;
    config.interaction.typing = TypingCadence::new(1, 2).unwrap();
    config.store_path = dir.join("pagewright.db");
    config.audit_path = Some(dir.join("audit.jsonl"));
    config.diagnostics_dir = dir.join("diagnostics");
    config
}

fn read_audit(path: &Path) -> Vec<AuditRecord> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

#[tokio::test]
async fn test_extraction_run_is_audited() {
    let dir = tempfile::tempdir().unwrap();
    let app = App::start(test_config(dir.path()), true).unwrap();
    let run_id = app.run_id.clone();

    let url = "https://listings.example/clinic/42";
    let renderer = ScriptedRenderer::new(vec![ScriptedPage::new().with_document(
        url,
        r#"<div class="contact"><a href="tel:2125551234">Call the front desk</a></div>"#,
    )]);

    let ctx = app.flow_context();
    let mut session = app.session(&renderer).await.unwrap();
    let result = extract_phone(session.page_mut(), &ctx, url, None, 1).await;
    let result = session.finish(result).await.unwrap();

    assert_eq!(result.final_value.as_deref(), Some("+12125551234"));
    assert_eq!(result.selected.unwrap().method, "tel_link");

    app.finish().await;

    let records = read_audit(&dir.path().join("audit.jsonl"));
    assert!(records.iter().all(|r| r.run_id == run_id));
    let names: Vec<&str> = records.iter().map(|r| r.event.name()).collect();
    assert_eq!(
        names,
        vec!["session_opened", "navigated", "field_extracted", "session_closed"]
    );
    match &records[2].event {
        RunEvent::FieldExtracted { value, url: u, .. } => {
            assert_eq!(value.as_deref(), Some("+12125551234"));
            assert_eq!(u, url);
        }
        other => panic!("unexpected event {other:?}"),
    }
}

#[tokio::test]
async fn test_failed_login_leaves_screenshot() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let diagnostics = config.diagnostics_dir.clone();
    let app = App::start(config, false).unwrap();

    let page = ScriptedPage::new().failing_navigation("net::ERR_CONNECTION_REFUSED");
    let log = page.log();
    let renderer = ScriptedRenderer::new(vec![page]);

    let ctx = app.flow_context();
    let creds = LoginCredentials {
        username: "ana@example.com".to_string(),
        password: "s3cret".to_string(),
    };
    let mut session = app.session(&renderer).await.unwrap();
    let result = LoginFlow::new("https://portal.example/login")
        .run(session.page_mut(), &ctx, &creds)
        .await;
    let err = session.finish(result).await.unwrap_err();
    app.release(&renderer).await;
    app.finish().await;

    assert_eq!(renderer.shutdowns.load(Ordering::SeqCst), 1);
    assert!(format!("{err:#}").contains("portal.example"));
    assert!(log.contains(&PageCall::Screenshot));
    assert!(log.contains(&PageCall::Close));
    let shots: Vec<_> = std::fs::read_dir(&diagnostics).unwrap().collect();
    assert_eq!(shots.len(), 1);

    let records = read_audit(&dir.path().join("audit.jsonl"));
    assert!(records
        .iter()
        .any(|r| matches!(r.event, RunEvent::SessionClosed { success: false, .. })));
}

#[tokio::test]
async fn test_login_cookies_carry_over_to_next_session() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.audit_path = None;
    let app = App::start(config, false).unwrap();

    let session_cookie = Cookie {
        name: "sid".to_string(),
        value: "abc123".to_string(),
        domain: "portal.example".to_string(),
        path: "/".to_string(),
        expires: None,
        http_only: true,
        secure: true,
    };
    let login_page = ScriptedPage::new()
        .with_element("#email")
        .with_element("input[type='password']")
        .with_element("button[type='submit']")
        .with_element(".account-menu")
        .with_cookies(vec![session_cookie]);
    let next_page = ScriptedPage::new();
    let next_log = next_page.log();
    let renderer = ScriptedRenderer::new(vec![login_page, next_page]);

    let ctx = app.flow_context();
    let creds = LoginCredentials {
        username: "ana@example.com".to_string(),
        password: "s3cret".to_string(),
    };
    let jar = dir.path().join("cookies.json");

    let mut session = app.session(&renderer).await.unwrap();
    let result = async {
        let report = LoginFlow::new("https://portal.example/login")
            .username_selectors(["#email"])
            .expect_after_login([".account-menu"])
            .run(session.page_mut(), &ctx, &creds)
            .await?;
        let saved = export_cookies(session.page_mut(), &jar).await?;
        Ok::<_, anyhow::Error>((report, saved))
    }
    .await;
    let (report, saved) = session.finish(result).await.unwrap();
    assert!(report.succeeded);
    assert_eq!(saved, 1);

    let mut session = app.session(&renderer).await.unwrap();
    let result = import_cookies(session.page_mut(), &jar).await;
    let imported = session.finish(result).await.unwrap();
    app.finish().await;

    assert_eq!(imported, 1);
    assert!(next_log.contains(&PageCall::SetCookies(1)));
}

#[tokio::test]
async fn test_batch_retries_and_records_outcomes() {
    let server = MockServer::start().await;
    let messages = "/2010-04-01/Accounts/AC1/Messages.json";

    // Ana: one transient failure, then accepted.
    Mock::given(method("POST"))
        .and(path(messages))
        .and(body_string_contains("To=%2B12125551234"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(messages))
        .and(body_string_contains("To=%2B12125551234"))
        .respond_with(
            ResponseTemplate::new(201)
                .set_body_json(serde_json::json!({ "sid": "SM100", "status": "queued" })),
        )
        .mount(&server)
        .await;
    // Cy: permanently rejected.
    Mock::given(method("POST"))
        .and(path(messages))
        .and(body_string_contains("To=%2B13105550000"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "code": 21211,
            "message": "The 'To' number is not a valid phone number.",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let csv_path = dir.path().join("clients.csv");
    std::fs::write(
        &csv_path,
        "name,phone,aux\nAna,(212) 555-1234,Monday 3pm\nBen,,Tuesday\nCy,310.555.0000,Friday\n",
    )
    .unwrap();

    let gateway = TwilioGateway::new(server.uri(), "AC1", "token", Duration::from_secs(5));
    let store = Store::open(&dir.path().join("pagewright.db")).unwrap();
    let bus = pagewright_runtime::events::EventBus::default();
    let options = BatchOptions {
        template: "Hi {name}, see you {aux}.".to_string(),
        from: "+15550001111".to_string(),
        country_code: 1,
        retry: RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(5),
            multiplier: 2.0,
            max_delay: Duration::from_millis(20),
        },
        dry_run: false,
    };

    let report = BatchSender::new(&gateway, &bus, options)
        .with_store(&store)
        .send_file(&csv_path)
        .await
        .unwrap();

    assert_eq!(report.summary.total, 3);
    assert_eq!(report.summary.sent, 1);
    assert_eq!(report.summary.failed, 1);
    assert_eq!(report.summary.invalid, 1);

    match &report.rows[0].status {
        RowStatus::Sent { message_id, attempts } => {
            assert_eq!(message_id.as_deref(), Some("SM100"));
            assert_eq!(*attempts, 2);
        }
        other => panic!("unexpected status {other:?}"),
    }
    assert_eq!(
        report.rows[0].body.as_deref(),
        Some("Hi Ana, see you Monday 3pm.")
    );
    assert!(matches!(report.rows[1].status, RowStatus::Invalid { .. }));
    assert!(matches!(
        report.rows[2].status,
        RowStatus::Failed { attempts: 1, .. }
    ));

    let ana = store.find_client_by_phone("+12125551234").unwrap().unwrap();
    let sent = store.messages_for_client(ana.id).unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].status, "sent");
    assert_eq!(sent[0].attempts, 2);

    let cy = store.find_client_by_phone("+13105550000").unwrap().unwrap();
    let failed = store.messages_for_client(cy.id).unwrap();
    assert_eq!(failed[0].status, "failed");
    assert!(failed[0].error.as_deref().unwrap().contains("not a valid phone number"));

    assert_eq!(store.list_clients().unwrap().len(), 2);
}
