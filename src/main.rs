mod config;
mod error;
mod image;
mod llm;
mod mcp;
mod tools;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::config::Config;
use crate::image::ImageOptions;
use crate::llm::OpenRouterClient;
use crate::error::{Result, VisionError};
use crate::mcp::{McpServer, ServerIdentity};
use crate::tools::{ToolContext, ToolRegistry};

#[tokio::main]
async fn main() {
    // Load .env file (if present) before anything reads env vars
    dotenvy::dotenv().ok();

    // Parse CLI arguments
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return;
    }

    if args.iter().any(|a| a == "--default-config") {
        print!("{}", Config::default_config_contents());
        return;
    }

    // Initialize tracing. Stdout is the protocol channel, so logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    // Load config
    let config_path = match config_path_arg(&args) {
        Ok(p) => p,
        Err(e) => {
            error!("{e}");
            std::process::exit(1);
        }
    };

    let config = match Config::load(config_path.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            error!("failed to load config: {e}");
            std::process::exit(1);
        }
    };

    info!(
        server = %config.server.name,
        default_model = %config.openrouter.default_model,
        "openvision-mcp starting"
    );

    // Handle --check
    if args.iter().any(|a| a == "--check") {
        let ok = run_checks(&config, config_path.as_deref());
        std::process::exit(if ok { 0 } else { 1 });
    }

    let vision = match OpenRouterClient::new(&config) {
        Ok(c) => Arc::new(c),
        Err(e) => {
            error!("failed to initialize OpenRouter client: {e}");
            std::process::exit(1);
        }
    };

    let image_options = ImageOptions::from(&config.image);
    if let Some(root) = &image_options.default_project_root {
        if !root.is_dir() {
            warn!(root = %root.display(), "default project root is not a directory");
        }
    }

    let ctx = ToolContext {
        http_client: reqwest::Client::new(),
        vision,
        image: image_options,
        default_model: config.openrouter.default_model.clone(),
    };

    let registry = ToolRegistry::with_vision_tools();
    let names: Vec<&str> = registry.list().into_iter().map(|(name, _)| name).collect();
    info!(tools = ?names, "tool registry initialized");

    let server = McpServer::new(
        ServerIdentity {
            name: config.server.name.clone(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            instructions: config.server.instructions.clone(),
        },
        registry,
        ctx,
    );

    if let Err(e) = server.run_stdio().await {
        error!("server error: {e}");
        std::process::exit(1);
    }
}

/// The value following `--config`, if the flag is present. A flag with no
/// path after it is an error rather than a silent fallback to the default.
fn config_path_arg(args: &[String]) -> Result<Option<PathBuf>> {
    let Some(i) = args.iter().position(|a| a == "--config") else {
        return Ok(None);
    };
    match args.get(i + 1).filter(|v| !v.starts_with("--")) {
        Some(path) => Ok(Some(PathBuf::from(path))),
        None => Err(VisionError::Config("--config requires a path".into())),
    }
}

/// Report the effective configuration. Returns false when the server could
/// not serve tool calls as configured.
fn run_checks(config: &Config, config_path: Option<&Path>) -> bool {
    info!("running pre-flight checks...");

    let path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(Config::default_config_path);
    if path.exists() {
        info!("config file: {}", path.display());
    } else {
        info!("config file: none ({} not found, using defaults)", path.display());
    }

    info!("  server_name: {}", config.server.name);
    info!("  base_url: {}", config.openrouter.base_url);
    info!("  default_model: {}", config.openrouter.default_model);
    info!("  timeout_secs: {}", config.openrouter.timeout_secs);
    info!("  fetch_timeout_secs: {}", config.image.fetch_timeout_secs);

    let mut ok = true;

    match config.api_key() {
        Ok(_) => info!("api key: OK"),
        Err(e) => {
            error!("api key: {e}");
            ok = false;
        }
    }

    if config.openrouter.default_model.trim().is_empty() {
        error!("default_model: empty; every call would have to pass `model`");
        ok = false;
    }

    if !config.image.default_project_root.is_empty() {
        let root = Path::new(&config.image.default_project_root);
        if root.is_dir() {
            info!("default_project_root: OK ({})", root.display());
        } else {
            error!("default_project_root: not a directory ({})", root.display());
            ok = false;
        }
    }

    ok
}

fn print_usage() {
    println!(
        "openvision-mcp: MCP server for image analysis with vision models via OpenRouter

USAGE:
    openvision-mcp [OPTIONS]

The server speaks MCP (JSON-RPC 2.0) over stdin/stdout, one message per line.

OPTIONS:
    --config <PATH>     Path to config file (default: ~/.config/openvision/config.toml)
    --default-config    Print default config to stdout and exit
    --check             Validate config, then exit
    -h, --help          Print this help message

TOOLS:
    image_analysis      Describe or answer questions about one image
    extract_text        Transcribe the text visible in one image
    compare_images      Compare two to four images

ENVIRONMENT:
    OPENROUTER_API_KEY        Required for tool calls. OpenRouter API key.
    OPENROUTER_DEFAULT_MODEL  Optional. Model used when a call names none.
    OPENROUTER_BASE_URL       Optional. API base URL (default: https://openrouter.ai/api/v1)
    OPENROUTER_SITE_URL       Optional. Sent as HTTP-Referer.
    OPENROUTER_APP_NAME       Optional. Sent as X-Title.
    OPENVISION_PROJECT_ROOT   Optional. Root for relative image paths.
    RUST_LOG                  Optional. Tracing filter (default: info). Logs go to stderr.
"
    );
}
