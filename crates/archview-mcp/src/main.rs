use archview_core::{prune, ModelFile, ModelStore, PrunedView, ViewPolicy};
use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, Content, ServerCapabilities, ServerInfo},
    schemars, tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler, ServiceExt,
};
use serde::Deserialize;
use tracing::info;

// --- Request types ---

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct GetModelRequest {
    /// Name of the model to retrieve
    name: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct SetModelRequest {
    /// Name of the model to create or overwrite
    name: String,
    /// The complete model as a JSON string: {version, parts, relations, views?}. See get_model output for the exact shape.
    data: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct ListViewsRequest {
    /// Name of the model
    name: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct GetViewRequest {
    /// Name of the model to prune
    name: String,
    /// Name of a view stored in the model. Ignored when `policy` is given.
    view: Option<String>,
    /// Inline selection policy. Omit both `view` and `policy` to get an empty view.
    policy: Option<ViewPolicy>,
}

// --- Server ---

#[derive(Clone)]
pub struct ArchviewServer {
    tool_router: ToolRouter<Self>,
    store: ModelStore,
}

#[tool_router]
impl ArchviewServer {
    pub fn new(store: ModelStore) -> Self {
        Self {
            tool_router: Self::tool_router(),
            store,
        }
    }

    #[tool(description = "List all available architecture models")]
    fn list_models(&self) -> Result<CallToolResult, McpError> {
        match self.store.list_models() {
            Ok(names) => {
                let text = if names.is_empty() {
                    "No models found. Use set_model to create one.".to_string()
                } else {
                    names.join("\n")
                };
                Ok(CallToolResult::success(vec![Content::text(text)]))
            }
            Err(e) => Ok(CallToolResult::error(vec![Content::text(e.to_string())])),
        }
    }

    #[tool(
        description = "Get the full JSON content of a model. Returns {version, parts: [{uid, label, kind, description?, children?}], relations: [{source, target, type, description?, resources?, tags?}], views?: {name: policy}}. For a focused subset, prefer get_view."
    )]
    fn get_model(
        &self,
        Parameters(req): Parameters<GetModelRequest>,
    ) -> Result<CallToolResult, McpError> {
        match self.store.read_model(&req.name) {
            Ok(model) => Ok(text_result(to_json(&model))),
            Err(e) => Ok(CallToolResult::error(vec![Content::text(format!(
                "Failed to read model '{}': {}",
                req.name, e
            ))])),
        }
    }

    #[tool(
        description = "Create or overwrite a model with complete data in one call. The model is rejected if a uid repeats, a relation names an unknown uid, or a part is nested where its kind is not allowed (components in modules, modules in domains, domains at the top or in domains, externals at the top only).\n\nExample:\n{\"version\": \"2024-05-01\", \"parts\": [\n  {\"uid\": \"shop\", \"label\": \"Shop\", \"kind\": \"domain\", \"children\": [\n    {\"uid\": \"orders\", \"label\": \"Orders\", \"kind\": \"module\", \"children\": [\n      {\"uid\": \"orders-api\", \"label\": \"Orders API\", \"kind\": \"component\"}]}]},\n  {\"uid\": \"stripe\", \"label\": \"Stripe\", \"kind\": \"external\"}\n], \"relations\": [\n  {\"source\": \"orders-api\", \"target\": \"stripe\", \"type\": \"ask\", \"description\": \"charge card\"}\n], \"views\": {\"overview\": {\"level\": \"module\"}}}"
    )]
    fn set_model(
        &self,
        Parameters(req): Parameters<SetModelRequest>,
    ) -> Result<CallToolResult, McpError> {
        match store_model(&self.store, &req.name, &req.data) {
            Ok(summary) => Ok(CallToolResult::success(vec![Content::text(summary)])),
            Err(e) => Ok(CallToolResult::error(vec![Content::text(e)])),
        }
    }

    #[tool(description = "List the named views stored in a model, with their policies")]
    fn list_views(
        &self,
        Parameters(req): Parameters<ListViewsRequest>,
    ) -> Result<CallToolResult, McpError> {
        match self.store.read_model(&req.name) {
            Ok(model) if model.views.is_empty() => Ok(CallToolResult::success(vec![
                Content::text(format!("Model '{}' has no named views.", req.name)),
            ])),
            Ok(model) => Ok(text_result(to_json(&model.views))),
            Err(e) => Ok(CallToolResult::error(vec![Content::text(format!(
                "Failed to read model '{}': {}",
                req.name, e
            ))])),
        }
    }

    #[tool(
        description = "Prune a model down to a focused view. Pass either the name of a stored view or an inline policy. Returns {version, parts, relations, selected, counts, ignoredUids?}: the pruned containment tree, relations rerouted onto displayed parts and merged, the uids the policy selected, part/relation/selected counts, and any policy uids the model does not contain."
    )]
    fn get_view(
        &self,
        Parameters(req): Parameters<GetViewRequest>,
    ) -> Result<CallToolResult, McpError> {
        match render_view(&self.store, &req.name, req.view.as_deref(), req.policy) {
            Ok(val) => Ok(text_result(val)),
            Err(e) => Ok(CallToolResult::error(vec![Content::text(e)])),
        }
    }
}

#[tool_handler]
impl ServerHandler for ArchviewServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(INSTRUCTIONS.into()),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

// --- Helpers ---

fn to_json<T: serde::Serialize>(value: &T) -> serde_json::Value {
    serde_json::to_value(value).unwrap_or_else(|e| serde_json::json!({ "error": e.to_string() }))
}

fn text_result(val: serde_json::Value) -> CallToolResult {
    let json = serde_json::to_string_pretty(&val)
        .unwrap_or_else(|e| format!("Serialization error: {}", e));
    CallToolResult::success(vec![Content::text(json)])
}

/// Parse, validate and write a model. Returns a one-line summary.
fn store_model(store: &ModelStore, name: &str, data: &str) -> Result<String, String> {
    let model: ModelFile =
        serde_json::from_str(data).map_err(|e| format!("Invalid model JSON: {}", e))?;
    model
        .validate()
        .map_err(|e| format!("Model '{}' rejected: {}", name, e))?;
    store
        .write_model(name, &model)
        .map_err(|e| format!("Failed to write model '{}': {}", name, e))?;
    info!(model = name, parts = model.system.uids().len(), "model stored");
    Ok(format!(
        "Saved model '{}' ({} parts, {} relations, {} views)",
        name,
        model.system.uids().len(),
        model.system.relations.len(),
        model.views.len()
    ))
}

/// Prune a stored model with a named view or an inline policy.
fn render_view(
    store: &ModelStore,
    name: &str,
    view: Option<&str>,
    policy: Option<ViewPolicy>,
) -> Result<serde_json::Value, String> {
    let model = store
        .read_model(name)
        .map_err(|e| format!("Failed to read model '{}': {}", name, e))?;
    model
        .validate()
        .map_err(|e| format!("Model '{}' is invalid: {}", name, e))?;
    let policy = match (policy, view) {
        (Some(policy), _) => policy,
        (None, Some(view)) => model.view(view).cloned().ok_or_else(|| {
            format!(
                "View '{}' not found in model '{}'. Available: {}",
                view,
                name,
                model.views.keys().cloned().collect::<Vec<_>>().join(", ")
            )
        })?,
        (None, None) => ViewPolicy::default(),
    };

    let pruned = prune(&model.system, &policy)
        .map_err(|e| format!("Failed to prune '{}': {}", name, e))?;

    let ignored: Vec<&str> = policy
        .mentioned_uids()
        .filter(|uid| model.system.find(uid).is_none())
        .collect();
    Ok(view_json(&pruned, &ignored))
}

/// The pruned view plus counts, and the policy uids the model does not have.
fn view_json(view: &PrunedView, ignored: &[&str]) -> serde_json::Value {
    let mut val = to_json(view);
    if let Some(map) = val.as_object_mut() {
        map.insert(
            "counts".to_string(),
            serde_json::json!({
                "parts": view.system.uids().len(),
                "relations": view.system.relations.len(),
                "selected": view.selected.len(),
            }),
        );
        if !ignored.is_empty() {
            map.insert("ignoredUids".to_string(), serde_json::json!(ignored));
        }
    }
    val
}

// --- Instructions ---

const INSTRUCTIONS: &str = r#"archview serves focused views of large architecture models. A model is a containment tree of parts plus directed relations between them.

## Parts
- **domain**: groups modules and other domains. Top-level domains are "zones".
- **module**: a deployable unit inside a domain. Holds components.
- **component**: a unit inside a module.
- **external**: a peer module owned elsewhere. Top-level only.

## Relations
`ask` (request), `tell` (fire-and-forget), `listen` (subscription). Relations connect modules, components and externals.

## View policies
Every field is optional:
- `include`: uids always shown.
- `open`: uids whose direct children are shown; the part itself is shown too.
- `exclude`: uids never shown themselves (their children may be).
- `excludeDeep`: uids whose whole subtree is hidden. Overrides everything else.
- `level`: show every part at or above this depth: "nothing", "zone", "domain", "module", "component".
- `relationLevel`: relation ends may be pulled in down to this level even when not otherwise shown.
- `followRelations` / `followInverseRelations`: false, a hop count, or "all". Adds parts reachable along (or against) relations.
- `reverseRelationTypes`: relation types that may be drawn reversed when they cannot be drawn forward, e.g. ["listen"].

Relations whose ends are hidden are redrawn between the nearest shown containers; relations that end up with the same ends and type are merged. Unknown uids in a policy are ignored.

## Workflow
1. `list_models`, then `list_views` to see stored views.
2. `get_view` with a view name, or with an inline `policy` to explore.
3. `get_model` only when the full model is needed; `set_model` to store a model (with optional `views`)."#;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let store = ModelStore::default();
    info!(dir = %store.dir().display(), "serving models");

    let service = ArchviewServer::new(store)
        .serve(rmcp::transport::io::stdio())
        .await
        .inspect_err(|e| tracing::error!("MCP server error: {}", e))?;
    service.waiting().await?;
    Ok(())
}
