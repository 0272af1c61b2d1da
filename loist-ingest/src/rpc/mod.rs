//! RPC tool surface (component I), exposed over the Model Context Protocol
//! via `rmcp`, supporting the `stdio`, `http`, and `sse` transports named
//! in the configuration (`spec.md` §6).

pub mod http_transport;
pub mod tools;

use rmcp::model::{CallToolResult, Content, ListToolsResult, Tool};
use rmcp::{ErrorData as McpError, ServerHandler};

use crate::AppState;

#[derive(Clone)]
pub struct LoistService {
    pub state: AppState,
}

impl LoistService {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    pub fn list_tools(&self) -> Vec<Tool> {
        tools::all_tools()
    }

    pub async fn dispatch(
        &self,
        name: &str,
        arguments: serde_json::Value,
        bearer_token: Option<&str>,
    ) -> CallToolResult {
        if let Err(err) = tools::check_bearer_token(&self.state, bearer_token) {
            return CallToolResult::error(vec![Content::text(
                serde_json::json!({ "success": false, "error": err.kind, "message": err.message }).to_string(),
            )]);
        }

        match name {
            tools::HealthCheckTool::NAME => tools::HealthCheckTool::call(&self.state),
            tools::ProcessAudioCompleteTool::NAME => {
                match serde_json::from_value(arguments) {
                    Ok(params) => tools::ProcessAudioCompleteTool::call(&self.state, params).await,
                    Err(e) => invalid_params(e),
                }
            }
            tools::GetAudioMetadataTool::NAME => match serde_json::from_value(arguments) {
                Ok(params) => tools::GetAudioMetadataTool::call(&self.state, params).await,
                Err(e) => invalid_params(e),
            },
            tools::SearchLibraryTool::NAME => match serde_json::from_value(arguments) {
                Ok(params) => tools::SearchLibraryTool::call(&self.state, params).await,
                Err(e) => invalid_params(e),
            },
            other => CallToolResult::error(vec![Content::text(format!("unknown tool '{other}'"))]),
        }
    }
}

fn invalid_params(err: serde_json::Error) -> CallToolResult {
    CallToolResult::error(vec![Content::text(format!("invalid parameters: {err}"))])
}

impl ServerHandler for LoistService {
    async fn list_tools(
        &self,
        _request: Option<rmcp::model::PaginatedRequestParam>,
        _context: rmcp::service::RequestContext<rmcp::RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        Ok(ListToolsResult {
            tools: self.list_tools(),
            next_cursor: None,
        })
    }

    async fn call_tool(
        &self,
        request: rmcp::model::CallToolRequestParam,
        context: rmcp::service::RequestContext<rmcp::RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        let bearer_token = context
            .extensions
            .get::<crate::http::BearerToken>()
            .map(|t| t.0.as_str());
        let arguments = request
            .arguments
            .map(serde_json::Value::Object)
            .unwrap_or(serde_json::Value::Null);
        Ok(self.dispatch(&request.name, arguments, bearer_token).await)
    }
}
