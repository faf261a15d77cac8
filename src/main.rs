//! Point d'entrée de SuriSearch.
//!
//! Usage :
//!   surisearch resolve [--default] <TEXTE...>
//!   surisearch complete [--no-suggest] <TEXTE...>
//!   surisearch engines
//!
//! Exemples :
//!   cargo run -- resolve google rust async      → URL de recherche Google
//!   cargo run -- resolve --default rust async   → idem via le moteur par défaut
//!   cargo run -- complete "google rust"         → mots-clés + suggestions

use std::error::Error;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use surisearch::config::Config;
use surisearch::http::ReqwestFetch;
use surisearch::{CompletionOptions, Item, SearchDispatcher};

#[derive(Debug, Parser)]
#[command(name = "surisearch", version, about = "Keyword and search-engine dispatcher")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Resolve a keyword or engine alias to a URL.
    Resolve {
        /// Prefix the configured default engine.
        #[arg(long)]
        default: bool,
        text: Vec<String>,
    },
    /// Print completions as they arrive.
    Complete {
        /// Keywords and engines only.
        #[arg(long)]
        no_suggest: bool,
        text: Vec<String>,
    },
    /// List installed engines with their normalized aliases.
    Engines,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn Error>> {
    // ── 1. Logging / Tracing ───────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // ── 2. Configuration + collaborateurs ──────────────────────────────
    let config = Config::load();
    let fetch = Arc::new(ReqwestFetch::new(&config.search)?);
    let dispatcher = SearchDispatcher::from_config(&config, fetch)?;

    // ── 3. Commande ────────────────────────────────────────────────────
    match cli.command {
        Command::Resolve { default, text } => {
            let text = text.join(" ");
            match dispatcher.resolve_with_default(&text, default) {
                Some(target) => {
                    println!("{}", target.url);
                    if let Some(post) = target.post_data {
                        println!("POST ({}) {}", post.content_type, post.body);
                    }
                }
                None => println!("no match"),
            }
        }
        Command::Complete { no_suggest, text } => {
            let options = CompletionOptions {
                no_suggest,
                ..CompletionOptions::default()
            };
            let mut session = dispatcher.build_completion_context(&text.join(" "), &options);
            print_items(&session.items());
            while session.next_update().await {
                println!("──");
                print_items(&session.items());
            }
        }
        Command::Engines => {
            for engine in dispatcher.list_engines() {
                let suggest = if engine.supports_suggestions { " [suggest]" } else { "" };
                println!("{:<12} {}{}", engine.alias, engine.description, suggest);
            }
        }
    }

    Ok(())
}

fn print_items(items: &[&Item]) {
    for item in items {
        println!("{:<40} {}", item.text(), item.description());
    }
}
