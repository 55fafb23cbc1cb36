use agent_core::ActionLoopResult;
use anyhow::Result;
use clap::ValueEnum;
use serde::Serialize;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Human,
    Json,
    Yaml,
}

/// Print a structured payload; `Human` callers print their own summary.
pub fn emit_structured<T: Serialize>(payload: &T, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(payload)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(payload)?),
        OutputFormat::Human => {}
    }
    Ok(())
}

pub fn emit_result(result: &ActionLoopResult, format: OutputFormat) -> Result<()> {
    if format != OutputFormat::Human {
        return emit_structured(result, format);
    }

    println!("Session {}", result.session_id);
    for record in &result.history {
        let quiescent = if record.quiescent == Some(false) {
            " (not quiescent)"
        } else {
            ""
        };
        println!("  turn {:>3}: {}{}", record.turn, record.summary, quiescent);
    }
    println!(
        "Turns: {}  Actions: {}  Elapsed: {}ms",
        result.turns, result.actions_dispatched, result.elapsed_ms
    );
    if let Some(url) = &result.final_url {
        println!("Final URL: {url}");
    }
    match result.failure() {
        None => println!("Completed: {}", result.message().unwrap_or_default()),
        Some(reason) => println!("Failed ({}): {}", reason.kind(), reason),
    }
    Ok(())
}
