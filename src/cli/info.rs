use anyhow::Result;
use cdp_adapter::detect_chrome_executable;
use serde::Serialize;

use super::context::CliContext;
use super::output::{emit_structured, OutputFormat};

#[derive(Debug, Serialize)]
struct SystemInfo {
    version: &'static str,
    git_commit: &'static str,
    config_path: String,
    config_loaded: bool,
    model: String,
    api_base: String,
    api_key_configured: bool,
    chrome: Option<String>,
    websocket_url: Option<String>,
    headless: bool,
    viewport: String,
    max_turns: u32,
}

pub async fn cmd_info(ctx: &CliContext) -> Result<()> {
    let config = ctx.config();
    let info = SystemInfo {
        version: env!("CARGO_PKG_VERSION"),
        git_commit: option_env!("PAPERPILOT_GIT_COMMIT").unwrap_or("unknown"),
        config_path: ctx.config_path().display().to_string(),
        config_loaded: ctx.config_from_file(),
        model: config.oracle.model.clone(),
        api_base: config.oracle.api_base.clone(),
        api_key_configured: config.oracle.api_key.is_some(),
        chrome: detect_chrome_executable().map(|path| path.display().to_string()),
        websocket_url: config.browser.cdp.websocket_url.clone(),
        headless: config.browser.cdp.headless,
        viewport: config.browser.viewport.to_string(),
        max_turns: config.action_loop.max_turns,
    };

    if ctx.output() != OutputFormat::Human {
        return emit_structured(&info, ctx.output());
    }

    println!("Paperpilot System Information");
    println!("============================");
    println!("Version: {}", info.version);
    println!("Git Commit: {}", info.git_commit);
    println!();

    println!("Configuration:");
    println!(
        "- File: {}{}",
        info.config_path,
        if info.config_loaded { "" } else { " (not found, defaults)" }
    );
    println!("- Model: {} @ {}", info.model, info.api_base);
    println!(
        "- API key: {}",
        if info.api_key_configured { "configured" } else { "missing" }
    );
    println!("- Viewport: {}", info.viewport);
    println!("- Max turns: {}", info.max_turns);
    println!();

    println!("Browser:");
    match (&info.websocket_url, &info.chrome) {
        (Some(ws), _) => println!("- Attach to: {ws}"),
        (None, Some(chrome)) => println!("- Chrome: {chrome} ✓"),
        (None, None) => println!("- Chrome: not found (set PAPERPILOT_CHROME)"),
    }
    println!("- Headless: {}", info.headless);

    Ok(())
}
