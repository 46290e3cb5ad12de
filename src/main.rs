//! fixwise CLI: hybrid diagnostic reasoning engine.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};

use fixwise::aggregate::Diagnosis;
use fixwise::category::Category;
use fixwise::classify::KeywordClassifier;
use fixwise::config::{EngineConfig, FileConfig};
use fixwise::engine::Engine;
use fixwise::fact::FactValue;
use fixwise::infer::NeededFact;
use fixwise::knowledge::KnowledgePack;
use fixwise::trace::ClassifierStatus;

#[derive(Parser)]
#[command(name = "fixwise", version, about = "Hybrid diagnostic reasoning engine")]
struct Cli {
    /// Knowledge pack (JSON). Defaults to the built-in pack.
    #[arg(long, global = true)]
    pack: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load and validate a knowledge pack.
    Validate,

    /// Run one diagnosis from facts and an optional description.
    Diagnose {
        /// Engine configuration (TOML).
        #[arg(long)]
        config: Option<PathBuf>,

        /// A user fact as `id=value`; repeatable.
        #[arg(long = "fact", value_name = "ID=VALUE")]
        facts: Vec<String>,

        /// Free-text problem description for the classifier.
        #[arg(long)]
        text: Option<String>,

        /// Print a readable report instead of JSON.
        #[arg(long)]
        report: bool,
    },

    /// List the questions that would help decide a category.
    Questions {
        /// Category name, e.g. "network issues". All categories when omitted.
        #[arg(long)]
        category: Option<String>,

        /// A user fact as `id=value`; repeatable.
        #[arg(long = "fact", value_name = "ID=VALUE")]
        facts: Vec<String>,
    },

    /// List the diagnosis categories.
    Categories,

    /// Write the default engine configuration as TOML.
    InitConfig {
        /// Destination file.
        path: PathBuf,
    },
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate => {
            let pack = load_pack(cli.pack.as_deref())?;
            let symptoms = pack.symptoms.len();
            let rules = pack.into_rule_base()?;
            println!(
                "Knowledge pack OK: {} rules, {} symptoms, {} categories covered",
                rules.len(),
                symptoms,
                rules.voted_categories().len()
            );
        }

        Commands::Diagnose {
            config,
            facts,
            text,
            report,
        } => {
            let config = match config {
                Some(path) => FileConfig::load(&path)?.to_engine_config()?,
                None => EngineConfig::default(),
            };
            let engine = Engine::from_pack(load_pack(cli.pack.as_deref())?, config)?
                .with_classifier(Arc::new(KeywordClassifier::new()));

            let mut session = engine.session();
            for raw in &facts {
                let (id, value) = parse_fact(raw)?;
                session.assert_fact(&id, value)?;
            }
            let diagnosis = session.diagnose(text.as_deref())?;

            if report {
                print_report(&diagnosis);
            } else {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&diagnosis).into_diagnostic()?
                );
            }
        }

        Commands::Questions { category, facts } => {
            let engine = Engine::from_pack(load_pack(cli.pack.as_deref())?, EngineConfig::default())?;
            let mut session = engine.session();
            for raw in &facts {
                let (id, value) = parse_fact(raw)?;
                session.assert_fact(&id, value)?;
            }
            let needed = match category {
                Some(name) => {
                    let Some(category) = Category::parse(&name) else {
                        miette::bail!("unknown category \"{name}\"; run `fixwise categories`");
                    };
                    session.needed_facts(category)?
                }
                None => session.needed_facts_all()?,
            };

            if needed.is_empty() {
                println!("Nothing left to ask.");
            }
            print_needed(&needed);
        }

        Commands::Categories => {
            for category in Category::ALL {
                println!("{:<18} {}", category.key(), category.description());
            }
        }

        Commands::InitConfig { path } => {
            FileConfig::default().save(&path)?;
            println!("Wrote default configuration to {}", path.display());
        }
    }

    Ok(())
}

fn load_pack(path: Option<&Path>) -> Result<KnowledgePack> {
    match path {
        Some(path) => Ok(KnowledgePack::load(path)?),
        None => Ok(KnowledgePack::builtin()),
    }
}

fn parse_fact(raw: &str) -> Result<(String, FactValue)> {
    let Some((id, value)) = raw.split_once('=') else {
        miette::bail!("fact \"{raw}\" must look like id=value");
    };
    Ok((id.trim().to_string(), FactValue::parse(value)))
}

fn print_needed(needed: &[NeededFact]) {
    for (i, n) in needed.iter().enumerate() {
        let question = n.question.as_deref().unwrap_or(&n.fact);
        if n.options.is_empty() {
            println!("  {}. {} [{}]", i + 1, question, n.fact);
        } else {
            println!(
                "  {}. {} [{}: {}]",
                i + 1,
                question,
                n.fact,
                n.options.join("/")
            );
        }
    }
}

fn print_report(diagnosis: &Diagnosis) {
    match diagnosis {
        Diagnosis::Ranked {
            ranked,
            needed_facts,
        } => {
            for (i, r) in ranked.iter().enumerate() {
                println!(
                    "{}. {} (score {:.3}: rules {:.3}, text {:.3})",
                    i + 1,
                    r.category,
                    r.final_score,
                    r.symbolic_score,
                    r.classifier_score
                );
                if let Some(cause) = &r.cause {
                    println!("   Likely cause: {cause}");
                }
                for line in &r.explanation {
                    println!("   - {line}");
                }
                for solution in &r.solutions {
                    println!("   * {solution}");
                }
            }
            if !needed_facts.is_empty() {
                println!("\nThe diagnosis is uncertain. These answers would help:");
                print_needed(needed_facts);
            }
        }
        Diagnosis::InsufficientInformation {
            needed_facts,
            classifier,
        } => {
            println!("Not enough information for a diagnosis.");
            if let ClassifierStatus::Unavailable { reason } = classifier {
                println!("Text classifier: {reason}");
            }
            if !needed_facts.is_empty() {
                println!("\nPlease answer:");
                print_needed(needed_facts);
            }
        }
    }
}
