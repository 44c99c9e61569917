//! MCP server that lets coding agents journal their work.

mod types;

use std::sync::Arc;

pub use types::*;

use rmcp::{
    handler::server::{tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, Content, ServerInfo},
    tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler, ServiceExt,
};
use serde::Serialize;

use crate::engine::Engine;
use crate::error::Error;
use crate::models::*;

#[derive(Clone)]
pub struct McpServer {
    engine: Arc<Engine>,
    project: Project,
    tool_router: ToolRouter<Self>,
}

fn mcp_error(e: Error) -> McpError {
    match e {
        Error::EmptyEntry => McpError::invalid_params(e.to_string(), None),
        Error::InvalidProject(_) | Error::NoPendingCommit(_) | Error::Concurrency(_) => {
            McpError::invalid_request(e.to_string(), None)
        }
        _ => McpError::internal_error(e.to_string(), None),
    }
}

fn json_result(value: &impl Serialize) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| McpError::internal_error(e.to_string(), None))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

impl McpServer {
    pub fn new(engine: Arc<Engine>, project: Project) -> Self {
        Self {
            engine,
            project,
            tool_router: Self::tool_router(),
        }
    }

    pub fn project(&self) -> &Project {
        &self.project
    }

    // ============================================================
    // Tool logic, shared with tests
    // ============================================================

    pub async fn append(&self, req: AppendEntryRequest) -> Result<EntryInfo, McpError> {
        let content = match (req.text, req.data) {
            (Some(text), None) => EntryContent::Text(text),
            (None, Some(data)) => EntryContent::Structured(data),
            _ => {
                return Err(McpError::invalid_params(
                    "Provide exactly one of 'text' or 'data'",
                    None,
                ))
            }
        };

        self.engine
            .append_entry(&self.project, content)
            .await
            .map(EntryInfo::from)
            .map_err(mcp_error)
    }

    pub fn list(&self, req: ListEntriesRequest) -> Result<EntryListResponse, McpError> {
        let entries = self.engine.read_journal(&self.project).map_err(mcp_error)?;
        let total = entries.len();
        let skip = req.limit.map_or(0, |limit| total.saturating_sub(limit));

        Ok(EntryListResponse {
            entries: entries.into_iter().skip(skip).map(EntryInfo::from).collect(),
            total,
        })
    }

    pub fn snapshot(&self) -> Result<SnapshotResponse, McpError> {
        self.engine
            .read_snapshot(&self.project)
            .map(SnapshotResponse::from)
            .map_err(mcp_error)
    }

    pub async fn run_compaction(&self) -> Result<CompactResponse, McpError> {
        self.engine
            .compact(&self.project)
            .await
            .map(CompactResponse::from)
            .map_err(mcp_error)
    }

    pub async fn retry_commit(&self) -> Result<RecommitResponse, McpError> {
        let commit_id = self
            .engine
            .retry_commit(&self.project)
            .await
            .map_err(mcp_error)?;
        Ok(RecommitResponse {
            commit_id: commit_id.to_string(),
        })
    }
}

#[tool_router]
impl McpServer {
    #[tool(
        description = "Record a note in the project journal. Use it for decisions, findings, dead ends and corrections that a future session should know about. Entries are durable and never edited; to correct an earlier note, append a new one saying what was wrong. Pass either 'text' or structured 'data'."
    )]
    async fn append_entry(
        &self,
        params: Parameters<AppendEntryRequest>,
    ) -> Result<CallToolResult, McpError> {
        let entry = self.append(params.0).await?;
        json_result(&entry)
    }

    #[tool(
        description = "List raw journal entries in the order they were written. Use 'limit' to see only the most recent ones. Prefer get_snapshot for the condensed picture."
    )]
    async fn list_entries(
        &self,
        params: Parameters<ListEntriesRequest>,
    ) -> Result<CallToolResult, McpError> {
        let entries = self.list(params.0)?;
        json_result(&entries)
    }

    #[tool(
        description = "Read the condensed project context produced by the last compaction. Call this FIRST when resuming work on the project."
    )]
    async fn get_snapshot(&self) -> Result<CallToolResult, McpError> {
        let snapshot = self.snapshot()?;
        json_result(&snapshot)
    }

    #[tool(
        description = "Fold all entries written since the last compaction into the snapshot and commit it to version control. Notes found to be incorrect are dropped. Returns the new commit and the number of entries folded in."
    )]
    async fn compact(&self) -> Result<CallToolResult, McpError> {
        let outcome = self.run_compaction().await?;
        json_result(&outcome)
    }

    #[tool(
        description = "Commit a snapshot whose commit failed during an earlier compact. Use it when get_snapshot shows a pending_commit. Fails if nothing is pending."
    )]
    async fn recommit(&self) -> Result<CallToolResult, McpError> {
        let response = self.retry_commit().await?;
        json_result(&response)
    }
}

#[tool_handler]
impl ServerHandler for McpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: rmcp::model::Implementation {
                name: "context-journal".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                title: None,
                icons: None,
                website_url: None,
            },
            capabilities: rmcp::model::ServerCapabilities::builder()
                .enable_tools()
                .build(),
            instructions: Some(
                r#"context-journal keeps a durable working memory for this project.

WORKFLOW:
1. Call get_snapshot when you start, to load what earlier sessions learned
2. Call append_entry whenever you make a decision, find something out, or
   discover that an earlier note was wrong
3. Call compact at the end of a session to condense the journal into the
   snapshot and commit it
4. If compact reports that the snapshot was updated but not committed, call
   recommit

WRITING ENTRIES:
- One idea per entry; write for a reader with no context
- Never rewrite history: corrections are new entries that name what was wrong
- Prefer facts and decisions over narration"#
                    .into(),
            ),
            ..Default::default()
        }
    }
}

pub async fn run_stdio_server(engine: Arc<Engine>, project: Project) -> anyhow::Result<()> {
    use tokio::io::{stdin, stdout};

    tracing::info!(project = %project.id, "Starting MCP server via stdio");

    let service = McpServer::new(engine, project);
    let server = service.serve((stdin(), stdout())).await?;

    let quit_reason = server.waiting().await?;
    tracing::info!("MCP server stopped: {:?}", quit_reason);

    Ok(())
}
