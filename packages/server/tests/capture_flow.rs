//! Capture-pipeline scenarios against mock collaborators: first capture,
//! no-change revisit, noise-only change, and failure gating.

use std::sync::Arc;
use std::time::Duration;

use talemon_server::config::{HasherSettings, OssPathSettings};
use talemon_server::kernel::browser::BrowserError;
use talemon_server::kernel::testing::{MemoryStorage, MockBrowser};
use talemon_server::kernel::{
    sha1_hex, CleanHasher, SnapshotOutcome, SnapshotService, StorageBackend,
};

const URL: &str = "https://example.com/a";
const PLAIN: &str = "<html><body>Hello</body></html>";
const NOISY: &str = "<html><body>Hello<script>x=1</script></body></html>";

fn service(browser: Arc<MockBrowser>, storage: Arc<MemoryStorage>) -> SnapshotService {
    SnapshotService::new(
        browser,
        storage,
        Arc::new(CleanHasher::new(&HasherSettings::default())),
        OssPathSettings::default(),
        Duration::from_secs(60),
    )
}

#[tokio::test]
async fn first_capture_archives_all_four_artifacts() {
    let browser = Arc::new(MockBrowser::new());
    browser.add_page(URL, PLAIN);
    let storage = Arc::new(MemoryStorage::new());
    let service = service(Arc::clone(&browser), Arc::clone(&storage));

    let outcome = service.capture(URL, None).await.unwrap();

    let SnapshotOutcome::Changed {
        http_status,
        content_hash,
        clean_hash,
        oss_path,
        ..
    } = outcome
    else {
        panic!("expected a Changed outcome");
    };

    assert_eq!(http_status, 200);
    assert_eq!(content_hash, sha1_hex(PLAIN.as_bytes()));
    assert_eq!(clean_hash.len(), 40);
    assert!(oss_path.starts_with(&sha1_hex(URL.as_bytes())));
    assert!(oss_path.ends_with('/'));

    let paths = storage.paths();
    assert_eq!(paths.len(), 4);
    for artifact in ["dom.html", "page.mhtml", "screenshot.png", "source.html"] {
        assert!(
            paths.iter().any(|p| p == &format!("{oss_path}{artifact}")),
            "missing {artifact} in {paths:?}"
        );
    }

    // The raw response is archived verbatim.
    let source = storage.read(&format!("{oss_path}source.html")).await.unwrap();
    assert_eq!(source, PLAIN.as_bytes());
}

#[tokio::test]
async fn revisit_without_change_archives_nothing_new() {
    let browser = Arc::new(MockBrowser::new());
    browser.add_page(URL, PLAIN);
    let storage = Arc::new(MemoryStorage::new());
    let service = service(Arc::clone(&browser), Arc::clone(&storage));

    let first = service.capture(URL, None).await.unwrap();
    let SnapshotOutcome::Changed { clean_hash, .. } = first else {
        panic!("expected a Changed outcome");
    };

    let second = service.capture(URL, Some(&clean_hash)).await.unwrap();

    match second {
        SnapshotOutcome::Unchanged {
            clean_hash: revisit_hash,
            http_status,
            ..
        } => {
            assert_eq!(revisit_hash, clean_hash);
            assert_eq!(http_status, 200);
        }
        other => panic!("expected Unchanged, got {other:?}"),
    }

    assert_eq!(storage.object_count(), 4);
    assert_eq!(browser.call_count(), 2);
}

#[tokio::test]
async fn noise_only_change_is_treated_as_unchanged() {
    let browser = Arc::new(MockBrowser::new());
    browser.add_page(URL, PLAIN);
    let storage = Arc::new(MemoryStorage::new());
    let service = service(Arc::clone(&browser), Arc::clone(&storage));

    let first = service.capture(URL, None).await.unwrap();
    let SnapshotOutcome::Changed {
        clean_hash,
        content_hash: first_content,
        ..
    } = first
    else {
        panic!("expected a Changed outcome");
    };

    // Same page, now with an injected script tag.
    browser.add_page(URL, NOISY);
    let second = service.capture(URL, Some(&clean_hash)).await.unwrap();

    match second {
        SnapshotOutcome::Unchanged {
            content_hash,
            clean_hash: revisit_hash,
            ..
        } => {
            assert_ne!(content_hash, first_content);
            assert_eq!(revisit_hash, clean_hash);
        }
        other => panic!("expected Unchanged, got {other:?}"),
    }

    assert_eq!(storage.object_count(), 4);
}

#[tokio::test]
async fn real_change_archives_a_second_snapshot() {
    let browser = Arc::new(MockBrowser::new());
    browser.add_page(URL, PLAIN);
    let storage = Arc::new(MemoryStorage::new());
    let service = service(Arc::clone(&browser), Arc::clone(&storage));

    let first = service.capture(URL, None).await.unwrap();
    let SnapshotOutcome::Changed { clean_hash, .. } = first else {
        panic!("expected a Changed outcome");
    };

    browser.add_page(URL, "<html><body>Goodbye</body></html>");
    let second = service.capture(URL, Some(&clean_hash)).await.unwrap();

    let SnapshotOutcome::Changed {
        clean_hash: new_hash,
        ..
    } = second
    else {
        panic!("expected a Changed outcome");
    };
    assert_ne!(new_hash, clean_hash);
}

#[tokio::test]
async fn http_error_status_is_audit_only() {
    let browser = Arc::new(MockBrowser::new());
    browser.add_status(URL, 503);
    let storage = Arc::new(MemoryStorage::new());
    let service = service(Arc::clone(&browser), Arc::clone(&storage));

    let outcome = service.capture(URL, None).await.unwrap();

    match outcome {
        SnapshotOutcome::Failed {
            http_status,
            error_message,
            ..
        } => {
            assert_eq!(http_status, Some(503));
            assert_eq!(error_message.as_deref(), Some("HTTP 503"));
        }
        other => panic!("expected Failed, got {other:?}"),
    }

    assert_eq!(storage.object_count(), 0);
}

#[tokio::test]
async fn navigation_failure_is_audit_only_without_status() {
    let browser = Arc::new(MockBrowser::new());
    browser.add_failure(URL, BrowserError::Timeout(Duration::from_secs(60)));
    let storage = Arc::new(MemoryStorage::new());
    let service = service(Arc::clone(&browser), Arc::clone(&storage));

    let outcome = service.capture(URL, None).await.unwrap();

    match outcome {
        SnapshotOutcome::Failed {
            http_status,
            error_message,
            ..
        } => {
            assert_eq!(http_status, None);
            assert!(error_message.unwrap().contains("timed out"));
        }
        other => panic!("expected Failed, got {other:?}"),
    }

    assert_eq!(storage.object_count(), 0);
}

#[tokio::test]
async fn undecodable_body_is_audit_only_with_status() {
    let browser = Arc::new(MockBrowser::new());
    browser.add_capture(
        URL,
        talemon_server::kernel::PageCapture {
            http_status: 200,
            html: vec![0xff, 0xfe, 0x00],
            mhtml: Vec::new(),
            screenshot: Vec::new(),
        },
    );
    let storage = Arc::new(MemoryStorage::new());
    let service = service(Arc::clone(&browser), Arc::clone(&storage));

    let outcome = service.capture(URL, None).await.unwrap();

    match outcome {
        SnapshotOutcome::Failed {
            http_status,
            error_message,
            ..
        } => {
            assert_eq!(http_status, Some(200));
            assert!(error_message.unwrap().contains("UTF-8"));
        }
        other => panic!("expected Failed, got {other:?}"),
    }

    assert_eq!(storage.object_count(), 0);
}

#[tokio::test]
async fn archived_dom_is_cleaned() {
    let browser = Arc::new(MockBrowser::new());
    browser.add_page(
        URL,
        "<html><body><p>Hello</p><script>track()</script><div class='ad'>buy</div></body></html>",
    );
    let storage = Arc::new(MemoryStorage::new());
    let service = service(Arc::clone(&browser), Arc::clone(&storage));

    let outcome = service.capture(URL, None).await.unwrap();
    let SnapshotOutcome::Changed { oss_path, .. } = outcome else {
        panic!("expected a Changed outcome");
    };

    let dom = storage.read(&format!("{oss_path}dom.html")).await.unwrap();
    let dom = String::from_utf8(dom).unwrap();

    assert!(dom.contains("<p>Hello</p>"));
    assert!(!dom.contains("script"));
    assert!(!dom.contains("buy"));
}
