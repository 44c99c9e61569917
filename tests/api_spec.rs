use std::sync::Arc;

use axum::http::StatusCode;
use axum_test::TestServer;
use context_journal::api::{create_router, AppState};
use context_journal::config::Config;
use context_journal::engine::Engine;
use context_journal::models::*;
use context_journal::summarizer::mock::{MockReply, MockSummarizer};
use context_journal::vcs::mock::MockVcs;
use serde_json::{json, Value};
use tempfile::TempDir;

fn setup_with(replies: Vec<MockReply>, config: Config) -> (TestServer, Arc<MockVcs>, TempDir) {
    let workspace = tempfile::tempdir().expect("Failed to create workspace");
    let vcs = Arc::new(MockVcs::new());
    let engine = Arc::new(Engine::new(
        config,
        Arc::new(MockSummarizer::scripted(replies)),
        vcs.clone(),
    ));
    let app = create_router(AppState::new(engine, workspace.path()));
    let server = TestServer::new(app).expect("Failed to create test server");
    (server, vcs, workspace)
}

fn setup(replies: Vec<MockReply>) -> (TestServer, Arc<MockVcs>, TempDir) {
    setup_with(replies, Config::default())
}

async fn append(server: &TestServer, project: &str, text: &str) -> JournalEntry {
    server
        .post(&format!("/api/v1/projects/{}/entries", project))
        .json(&json!({ "text": text }))
        .await
        .json::<JournalEntry>()
}

mod health {
    use super::*;

    #[tokio::test]
    async fn reports_ok() {
        let (server, _vcs, _ws) = setup(vec![]);

        let response = server.get("/api/v1/health").await;

        response.assert_status_ok();
        assert_eq!(response.json::<Value>()["status"], "ok");
    }
}

mod journal {
    use super::*;

    #[tokio::test]
    async fn start_returns_the_generation() {
        let (server, _vcs, workspace) = setup(vec![]);

        let response = server.post("/api/v1/projects/alpha/journal").await;

        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["project"], "alpha");
        let generation = body["generation"].as_str().unwrap();
        assert!(generation.ends_with("_journal"));
        assert!(workspace.path().join("alpha/.context").join(generation).exists());
    }

    #[tokio::test]
    async fn append_creates_text_and_structured_entries() {
        let (server, _vcs, _ws) = setup(vec![]);

        let response = server
            .post("/api/v1/projects/alpha/entries")
            .json(&json!({ "text": "Chose axum for the API" }))
            .await;
        response.assert_status(StatusCode::CREATED);
        let entry: JournalEntry = response.json();
        assert_eq!(entry.ordinal, 1);
        assert_eq!(entry.project, "alpha");

        let response = server
            .post("/api/v1/projects/alpha/entries")
            .json(&json!({ "data": { "decision": "axum", "reason": "tower middleware" } }))
            .await;
        response.assert_status(StatusCode::CREATED);
        let entry: JournalEntry = response.json();
        assert_eq!(entry.ordinal, 2);
        assert!(matches!(entry.content, EntryContent::Structured(_)));
    }

    #[tokio::test]
    async fn append_rejects_blank_entries() {
        let (server, _vcs, _ws) = setup(vec![]);

        let response = server
            .post("/api/v1/projects/alpha/entries")
            .json(&json!({ "text": "  \n " }))
            .await;
        response.assert_status_bad_request();

        let entries: Vec<JournalEntry> = server.get("/api/v1/projects/alpha/entries").await.json();
        assert!(entries.is_empty());
    }

    #[tokio::test]
    async fn list_returns_entries_in_order() {
        let (server, _vcs, _ws) = setup(vec![]);
        append(&server, "alpha", "one").await;
        append(&server, "alpha", "two").await;
        append(&server, "beta", "elsewhere").await;

        let response = server.get("/api/v1/projects/alpha/entries").await;

        response.assert_status_ok();
        let entries: Vec<JournalEntry> = response.json();
        let texts: Vec<_> = entries.iter().filter_map(|e| e.content.as_text()).collect();
        assert_eq!(texts, vec!["one", "two"]);
    }

    #[tokio::test]
    async fn rejects_names_that_escape_the_workspace() {
        let (server, _vcs, _ws) = setup(vec![]);

        let response = server.get("/api/v1/projects/a%5Cb/entries").await;
        response.assert_status_bad_request();

        let response = server
            .post("/api/v1/projects/a%2Fb/entries")
            .json(&json!({ "text": "escape" }))
            .await;
        response.assert_status_bad_request();
    }
}

mod compaction {
    use super::*;

    #[tokio::test]
    async fn compact_writes_and_commits_the_snapshot() {
        let (server, vcs, _ws) = setup(vec![MockReply::compaction(
            "Earth is round.",
            "Compact notes; corrected flat-earth claim",
        )]);
        append(&server, "alpha", "Earth is round").await;
        append(&server, "alpha", "Earth is flat").await;

        let response = server.post("/api/v1/projects/alpha/compact").await;

        response.assert_status_ok();
        let outcome: CompactionOutcome = response.json();
        assert_eq!(outcome.entries_compacted, 2);
        assert_eq!(vcs.commits().len(), 1);

        let snapshot: Snapshot = server.get("/api/v1/projects/alpha/snapshot").await.json();
        assert_eq!(snapshot.content, "Earth is round.");
        assert_eq!(snapshot.meta.commit_id, outcome.commit_id);
    }

    #[tokio::test]
    async fn snapshot_is_empty_before_compaction() {
        let (server, _vcs, _ws) = setup(vec![]);

        let response = server.get("/api/v1/projects/alpha/snapshot").await;

        response.assert_status_ok();
        let snapshot: Snapshot = response.json();
        assert!(snapshot.content.is_empty());
        assert!(snapshot.meta.commit_id.is_none());
    }

    #[tokio::test]
    async fn malformed_reply_is_unprocessable() {
        let (server, _vcs, _ws) = setup(vec![MockReply::text("no markers here")]);
        append(&server, "alpha", "note").await;

        let response = server.post("/api/v1/projects/alpha/compact").await;

        response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn collaborator_failure_is_bad_gateway() {
        let (server, _vcs, _ws) = setup(vec![MockReply::Error(
            context_journal::summarizer::SummarizerError::Unavailable("503".into()),
        )]);
        append(&server, "alpha", "note").await;

        let response = server.post("/api/v1/projects/alpha/compact").await;

        response.assert_status(StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn failed_commit_can_be_retried() {
        let (server, vcs, _ws) = setup(vec![MockReply::compaction("state", "Snapshot")]);
        append(&server, "alpha", "note").await;
        vcs.fail_next_commits(1);

        let response = server.post("/api/v1/projects/alpha/compact").await;
        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);

        let status: CommitStatus = server.get("/api/v1/projects/alpha/status").await.json();
        assert_eq!(
            status,
            CommitStatus::Pending {
                message: "Snapshot".into()
            }
        );

        let response = server.post("/api/v1/projects/alpha/commit").await;
        response.assert_status_ok();
        let commit_id = response.json::<Value>()["commit_id"].as_str().unwrap().to_string();

        let status: CommitStatus = server.get("/api/v1/projects/alpha/status").await.json();
        assert_eq!(
            status,
            CommitStatus::Committed {
                commit_id: CommitId(commit_id),
                head_matches: true
            }
        );
    }

    #[tokio::test]
    async fn retry_without_pending_commit_conflicts() {
        let (server, _vcs, _ws) = setup(vec![]);

        let response = server.post("/api/v1/projects/alpha/commit").await;

        response.assert_status(StatusCode::CONFLICT);
    }
}

mod auth {
    use super::*;

    fn protected() -> (TestServer, Arc<MockVcs>, TempDir) {
        let mut config = Config::default();
        config.server.api_key = Some("secret".into());
        setup_with(vec![], config)
    }

    #[tokio::test]
    async fn rejects_missing_token() {
        let (server, _vcs, _ws) = protected();

        let response = server.get("/api/v1/projects/alpha/entries").await;

        response.assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn rejects_wrong_token() {
        let (server, _vcs, _ws) = protected();

        let response = server
            .get("/api/v1/projects/alpha/entries")
            .authorization_bearer("wrong")
            .await;

        response.assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn accepts_configured_token() {
        let (server, _vcs, _ws) = protected();

        let response = server
            .get("/api/v1/projects/alpha/entries")
            .authorization_bearer("secret")
            .await;

        response.assert_status_ok();
    }

    #[tokio::test]
    async fn health_stays_open() {
        let (server, _vcs, _ws) = protected();

        server.get("/api/v1/health").await.assert_status_ok();
    }
}

mod router {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    #[tokio::test]
    async fn serves_requests_without_a_test_server() {
        let workspace = tempfile::tempdir().unwrap();
        let engine = Arc::new(Engine::new(
            Config::default(),
            Arc::new(MockSummarizer::scripted(vec![])),
            Arc::new(MockVcs::new()),
        ));
        let app = create_router(AppState::new(engine, workspace.path()));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/projects/alpha/status")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }
}
