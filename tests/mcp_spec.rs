//! MCP server integration tests.
//!
//! Tool logic is exercised through the server's shared methods, against a
//! temporary project with a scripted summarizer.

use std::sync::Arc;

use context_journal::config::Config;
use context_journal::engine::Engine;
use context_journal::mcp::*;
use context_journal::models::*;
use context_journal::summarizer::mock::{MockReply, MockSummarizer};
use context_journal::vcs::mock::MockVcs;
use tempfile::TempDir;

/// Helper to create a test MCP server bound to a temporary project.
fn setup(replies: Vec<MockReply>) -> (McpServer, TempDir) {
    let (server, _vcs, dir) = setup_with_vcs(replies);
    (server, dir)
}

fn setup_with_vcs(replies: Vec<MockReply>) -> (McpServer, Arc<MockVcs>, TempDir) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let vcs = Arc::new(MockVcs::new());
    let engine = Arc::new(Engine::new(
        Config::default(),
        Arc::new(MockSummarizer::scripted(replies)),
        vcs.clone(),
    ));
    let server = McpServer::new(engine, Project::new("demo", dir.path()));
    (server, vcs, dir)
}

fn text(t: &str) -> AppendEntryRequest {
    AppendEntryRequest {
        text: Some(t.to_string()),
        data: None,
    }
}

mod append_entry {
    use super::*;

    #[tokio::test]
    async fn records_text_entries() {
        let (server, _dir) = setup(vec![]);

        let entry = server.append(text("Switched to JSON-lines storage")).await.unwrap();

        assert_eq!(entry.ordinal, 1);
        assert_eq!(entry.content, "Switched to JSON-lines storage");
        assert!(entry.generation.ends_with("_journal"));
    }

    #[tokio::test]
    async fn records_structured_entries() {
        let (server, _dir) = setup(vec![]);

        let entry = server
            .append(AppendEntryRequest {
                text: None,
                data: Some(serde_json::json!({ "decision": "retry only 5xx" })),
            })
            .await
            .unwrap();

        assert!(entry.content.contains("retry only 5xx"));
    }

    #[tokio::test]
    async fn rejects_requests_without_exactly_one_body() {
        let (server, _dir) = setup(vec![]);

        assert!(server.append(AppendEntryRequest::default()).await.is_err());
        assert!(server.append(text("   ")).await.is_err());
        assert!(server
            .append(AppendEntryRequest {
                text: Some("both".into()),
                data: Some(serde_json::json!({})),
            })
            .await
            .is_err());
    }
}

mod list_entries {
    use super::*;

    #[tokio::test]
    async fn returns_all_entries_by_default() {
        let (server, _dir) = setup(vec![]);
        for t in ["one", "two", "three"] {
            server.append(text(t)).await.unwrap();
        }

        let response = server.list(ListEntriesRequest::default()).unwrap();

        assert_eq!(response.total, 3);
        let contents: Vec<_> = response.entries.iter().map(|e| e.content.as_str()).collect();
        assert_eq!(contents, vec!["one", "two", "three"]);
    }

    #[tokio::test]
    async fn limit_keeps_the_most_recent() {
        let (server, _dir) = setup(vec![]);
        for t in ["one", "two", "three"] {
            server.append(text(t)).await.unwrap();
        }

        let response = server.list(ListEntriesRequest { limit: Some(2) }).unwrap();

        assert_eq!(response.total, 3);
        let contents: Vec<_> = response.entries.iter().map(|e| e.content.as_str()).collect();
        assert_eq!(contents, vec!["two", "three"]);
    }
}

mod compact {
    use super::*;

    #[tokio::test]
    async fn updates_the_snapshot() {
        let (server, _dir) = setup(vec![MockReply::compaction(
            "Storage is JSON-lines.",
            "Record storage decision",
        )]);
        server.append(text("Switched to JSON-lines storage")).await.unwrap();

        let outcome = server.run_compaction().await.unwrap();
        assert_eq!(outcome.entries_compacted, 1);
        assert_eq!(outcome.commit_message.as_deref(), Some("Record storage decision"));
        assert!(outcome.commit_id.is_some());

        let snapshot = server.snapshot().unwrap();
        assert_eq!(snapshot.content, "Storage is JSON-lines.");
        assert_eq!(snapshot.commit_id, outcome.commit_id);
        assert!(snapshot.pending_commit.is_none());
    }

    #[tokio::test]
    async fn reports_malformed_replies_as_errors() {
        let (server, _dir) = setup(vec![MockReply::text("sorry")]);
        server.append(text("note")).await.unwrap();

        let err = server.run_compaction().await.unwrap_err();

        assert!(err.message.contains("malformed"));
        assert!(server.snapshot().unwrap().content.is_empty());
    }
}

mod recommit {
    use super::*;

    #[tokio::test]
    async fn commits_a_snapshot_left_pending() {
        let (server, vcs, _dir) =
            setup_with_vcs(vec![MockReply::compaction("state", "Record state")]);
        server.append(text("note")).await.unwrap();
        vcs.fail_next_commits(1);
        assert!(server.run_compaction().await.is_err());
        assert_eq!(
            server.snapshot().unwrap().pending_commit.as_deref(),
            Some("Record state")
        );

        let response = server.retry_commit().await.unwrap();

        let snapshot = server.snapshot().unwrap();
        assert_eq!(snapshot.commit_id.as_deref(), Some(response.commit_id.as_str()));
        assert!(snapshot.pending_commit.is_none());
        assert_eq!(vcs.commits()[0].message, "Record state");
    }

    #[tokio::test]
    async fn fails_when_nothing_is_pending() {
        let (server, _dir) = setup(vec![]);

        assert!(server.retry_commit().await.is_err());
    }
}
