//! The `generate_image` MCP tool

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use config::{EnvSource, ImageSettings, ProcessEnv};
use imagegen_core::{
    GenerationClient, ImagePersistor, MAX_PROMPT_CHARS, OUTPUT_MIME_TYPE, OutputLocations,
    PathResolver,
};
use rmcp::{
    ErrorData as McpError,
    handler::server::ServerHandler,
    model::*,
    service::{RequestContext, RoleServer},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, warn};

pub const GENERATE_IMAGE_TOOL: &str = "generate_image";

#[derive(Debug, Deserialize)]
struct GenerateImageArgs {
    prompt: String,
    #[serde(default)]
    save_path: Option<String>,
}

/// Arguments that passed validation.
#[derive(Debug)]
struct ImageRequest {
    prompt: String,
    save_path: Option<String>,
}

impl GenerateImageArgs {
    fn validate(self) -> Result<ImageRequest, String> {
        let prompt = self.prompt.trim();
        if prompt.is_empty() {
            return Err("prompt must not be empty".to_string());
        }
        if prompt.chars().count() > MAX_PROMPT_CHARS {
            return Err(format!(
                "prompt must be at most {} characters",
                MAX_PROMPT_CHARS
            ));
        }

        let save_path = match self.save_path {
            Some(path) if path.trim().is_empty() => {
                return Err("save_path must not be empty".to_string());
            }
            Some(path) if path.contains('\0') => {
                return Err("save_path must not contain NUL bytes".to_string());
            }
            other => other,
        };

        Ok(ImageRequest {
            prompt: prompt.to_string(),
            save_path,
        })
    }
}

/// Structured result of a successful `generate_image` call
#[derive(Debug, Serialize)]
struct GenerateImageRecord {
    file_path: String,
    mime_type: String,
    model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

/// MCP server exposing image generation.
/// Stateless apart from the cached backend handle inside the generator.
#[derive(Clone)]
pub struct ImageGenServer {
    inner: Arc<ImageGenServerInner>,
}

struct ImageGenServerInner {
    env: Arc<dyn EnvSource>,
    generator: GenerationClient,
    persistor: ImagePersistor,
}

impl ImageGenServer {
    pub fn new(env: Arc<dyn EnvSource>, generator: GenerationClient, persistor: ImagePersistor) -> Self {
        Self {
            inner: Arc::new(ImageGenServerInner {
                env,
                generator,
                persistor,
            }),
        }
    }

    /// Server wired to the process environment and the Gemini API.
    pub fn from_env() -> std::io::Result<Self> {
        let env: Arc<dyn EnvSource> = Arc::new(ProcessEnv);
        let generator = GenerationClient::gemini(Arc::clone(&env));
        let persistor = ImagePersistor::new(PathResolver::from_process()?);
        Ok(Self::new(env, generator, persistor))
    }

    fn get_tools() -> Vec<Tool> {
        fn make_schema(value: serde_json::Value) -> Arc<serde_json::Map<String, serde_json::Value>> {
            match value {
                serde_json::Value::Object(map) => Arc::new(map),
                _ => Arc::new(serde_json::Map::new()),
            }
        }

        vec![Tool {
            name: GENERATE_IMAGE_TOOL.into(),
            title: Some("Generate image".into()),
            description: Some(
                "Generate an image from a text prompt and save it as a JPEG. If save_path is \
                 omitted or unusable, the image is saved to a default output directory."
                    .into(),
            ),
            input_schema: make_schema(json!({
                "type": "object",
                "properties": {
                    "prompt": {
                        "type": "string",
                        "minLength": 1,
                        "maxLength": MAX_PROMPT_CHARS,
                        "description": "Description of the image to generate"
                    },
                    "save_path": {
                        "type": "string",
                        "description": "Optional directory or .jpg/.jpeg file path. Relative paths \
                                        resolve against the server's working directory; ~ expands \
                                        to the home directory."
                    }
                },
                "required": ["prompt"]
            })),
            annotations: None,
            output_schema: Some(make_schema(json!({
                "type": "object",
                "properties": {
                    "file_path": { "type": "string" },
                    "mime_type": { "type": "string" },
                    "model": { "type": "string" },
                    "text": { "type": "string" }
                },
                "required": ["file_path", "mime_type", "model"]
            }))),
            icons: None,
            meta: None,
        }]
    }

    pub async fn handle_generate_image(
        &self,
        args: serde_json::Map<String, serde_json::Value>,
    ) -> CallToolResult {
        let request = match serde_json::from_value::<GenerateImageArgs>(serde_json::Value::Object(args))
            .map_err(|e| e.to_string())
            .and_then(GenerateImageArgs::validate)
        {
            Ok(r) => r,
            Err(e) => {
                warn!("generate_image: invalid arguments: {}", e);
                return CallToolResult::error(vec![Content::text(format!(
                    "Invalid arguments: {}",
                    e
                ))]);
            }
        };

        let generated = match self.inner.generator.generate(&request.prompt).await {
            Ok(g) => g,
            Err(e) => {
                error!("generate_image: generation failed: {:?}", e);
                return CallToolResult::error(vec![Content::text(format!("Error: {}", e))]);
            }
        };

        let settings = ImageSettings::load(self.inner.env.as_ref());
        let locations = OutputLocations::from_settings(&settings, self.inner.persistor.resolver());

        let outcome = match self
            .inner
            .persistor
            .save(&generated.image, request.save_path.as_deref(), &locations)
            .await
        {
            Ok(o) => o,
            Err(e) => {
                error!("generate_image: saving failed: {}", e);
                return CallToolResult::error(vec![Content::text(format!("Error: {}", e))]);
            }
        };

        let file_path = outcome.path.display().to_string();
        info!("generate_image: saved {} ({} bytes)", file_path, generated.image.len());

        let mut lines = Vec::new();
        if let Some(text) = &generated.text {
            lines.push(text.clone());
        }
        if let Some(warning) = &outcome.warning {
            lines.push(format!("Warning: {}", warning));
        }
        lines.push(format!("Image saved to: {}", file_path));
        lines.push(format!("Model: {}", generated.model));

        let record = GenerateImageRecord {
            file_path,
            mime_type: generated.mime_type.clone(),
            model: generated.model,
            text: generated.text,
        };

        let mut result = CallToolResult::success(vec![
            Content::text(lines.join("\n")),
            Content::image(BASE64.encode(&generated.image), OUTPUT_MIME_TYPE),
        ]);
        result.structured_content = serde_json::to_value(&record).ok();
        result.is_error = None;
        result
    }
}

impl ServerHandler for ImageGenServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(
                "Image generation MCP server. Use generate_image to render a prompt to a JPEG file."
                    .into(),
            ),
        }
    }

    fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> impl std::future::Future<Output = Result<ListToolsResult, McpError>> + Send + '_ {
        std::future::ready(Ok(ListToolsResult {
            tools: Self::get_tools(),
            next_cursor: None,
        }))
    }

    fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> impl std::future::Future<Output = Result<CallToolResult, McpError>> + Send + '_ {
        async move {
            let name = request.name.as_ref();
            let arguments = request.arguments.clone().unwrap_or_default();

            info!("imagegen-mcp: Calling tool: {}", name);

            match name {
                GENERATE_IMAGE_TOOL => Ok(self.handle_generate_image(arguments).await),
                _ => Ok(CallToolResult::error(vec![Content::text(format!(
                    "Unknown tool: {}",
                    name
                ))])),
            }
        }
    }
}
