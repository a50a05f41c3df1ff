//! Majlis - terminal chat client
//!
//! Interactive front end over the relay facade: pick an expert persona,
//! type questions, watch the answer stream in with usage stats on demand.

use anyhow::Result;
use futures_util::{pin_mut, StreamExt};
use majlis::{Config, ConversationMessage, PersonaRegistry, Relay, RelayError, ALL_PROVIDERS_FAILED};
use std::io::Write;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        println!("Majlis v{}", env!("CARGO_PKG_VERSION"));
        println!();
        println!("Usage: majlis");
        println!();
        println!("Commands inside the chat:");
        println!("  /experts        List available personas");
        println!("  /use <id>       Switch persona");
        println!("  /stats          Show usage statistics");
        println!("  /quit           Exit");
        println!();
        println!("Environment variables:");
        println!("  GEMINI_API_KEY, ANTHROPIC_API_KEY, DEEPSEEK_API_KEY,");
        println!("  TOGETHER_API_KEY, OPENAI_API_KEY    Provider credentials");
        println!("  MAJLIS_FALLBACK_CHAIN    Comma-separated backup providers");
        println!("  MAJLIS_DB_PATH           Cache/usage database path");
        println!("  MAJLIS_PERSONA_FILE      TOML persona file");
        return Ok(());
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let config = Config::from_env()?;
    let registry = match &config.persona_file {
        Some(path) => PersonaRegistry::load(path)?,
        None => PersonaRegistry::builtin(),
    };
    let relay = Relay::from_config(&config);
    let sweeper = relay.spawn_sweeper();

    info!("majlis v{} ready, {} personas", env!("CARGO_PKG_VERSION"), registry.len());

    let mut current = registry
        .iter()
        .next()
        .cloned()
        .ok_or_else(|| anyhow::anyhow!("persona registry is empty"))?;
    println!("Talking to {} ({}). Type /experts for the panel.", current.name, current.title);

    let mut history: Vec<ConversationMessage> = Vec::new();
    let stdin = std::io::stdin();

    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let mut line = String::new();
        if stdin.read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match line {
            "/quit" | "/exit" => break,
            "/experts" => {
                for persona in registry.iter() {
                    println!("  {:<16} {} - {}", persona.id, persona.name, persona.title);
                }
                continue;
            }
            "/stats" => {
                let stats = relay.stats();
                println!("calls: {}  cost: ${:.4}  avg: ${:.4}", stats.total_calls, stats.total_cost, stats.average_cost);
                println!(
                    "cache: {} hits / {} misses ({:.1}% hit rate), saved ~${:.3}",
                    stats.cache_hits, stats.cache_misses, stats.cache_hit_rate, stats.cost_saved_by_cache
                );
                for (model, count) in &stats.model_usage {
                    println!("  {:<30} {}", model, count);
                }
                continue;
            }
            _ if line.starts_with("/use ") => {
                let id = line.trim_start_matches("/use ").trim();
                match registry.get(id) {
                    Some(persona) => {
                        current = persona.clone();
                        history.clear();
                        println!("Now talking to {} ({}).", current.name, current.title);
                        if !current.welcome_message.is_empty() {
                            println!("{}", current.welcome_message);
                        }
                    }
                    None => println!("Unknown persona: {}", id),
                }
                continue;
            }
            _ => {}
        }

        history.push(ConversationMessage::user(line));

        match relay.ask_streaming(&history, &current, None).await {
            Ok(stream) => {
                pin_mut!(stream);
                let mut full = String::new();
                while let Some(fragment) = stream.next().await {
                    print!("{}", fragment);
                    std::io::stdout().flush()?;
                    full.push_str(&fragment);
                }
                println!();
                let reply = full.trim_end();
                // The fixed failure text is user guidance, not a provider answer
                if reply != ALL_PROVIDERS_FAILED {
                    history.push(ConversationMessage::assistant(reply.to_string()));
                }
            }
            Err(RelayError::InvalidRequest(msg)) => {
                println!("Invalid request: {}", msg);
            }
            Err(e) => {
                println!("{}", e);
            }
        }
    }

    sweeper.abort();
    Ok(())
}
