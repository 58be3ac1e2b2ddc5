//! kgen CLI - Command-line interface
//!
//! Usage:
//!   kgen extract [TEXT] [--file PATH]
//!   kgen prompt [TEXT] [--file PATH]
//!   kgen parse <REPLY_FILE>
//!
//! Text is read from stdin when neither TEXT nor --file is given.
//!
//! Author: hephaex@gmail.com

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use kgen_core::{AppConfig, Graph, LoggingConfig, OutputLanguage, Supplier};
use kgen_extractor::{
    build_prompt, parse_with_diagnostics, Extraction, ParseDiagnostics, PipelineController,
    PipelineResult,
};
use kgen_graph::VisualizationMapper;
use kgen_llm::ChatCompletionsGateway;

#[derive(Parser)]
#[command(name = "kgen")]
#[command(about = "Turn free-form text into a knowledge graph")]
#[command(version)]
struct Cli {
    /// TOML configuration file (environment variables still take precedence)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract a knowledge graph with an LLM
    Extract {
        #[command(flatten)]
        input: InputArgs,

        /// LLM backend: zhipu, azure or deepseek
        #[arg(long)]
        supplier: Option<Supplier>,

        /// Label language: zh or en
        #[arg(long)]
        language: Option<OutputLanguage>,

        /// Sampling temperature in [0, 1]
        #[arg(long)]
        temperature: Option<f32>,

        /// API key for the selected supplier
        #[arg(long)]
        api_key: Option<String>,

        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Print the extraction prompt without calling an LLM
    Prompt {
        #[command(flatten)]
        input: InputArgs,

        /// Label language: zh or en
        #[arg(long)]
        language: Option<OutputLanguage>,

        /// Sampling temperature in [0, 1]
        #[arg(long)]
        temperature: Option<f32>,

        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Validate a saved LLM reply and map it for display
    Parse {
        /// File holding the raw reply
        reply: PathBuf,

        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
}

#[derive(clap::Args)]
struct InputArgs {
    /// Text to analyse
    text: Option<String>,

    /// Read the text from a file
    #[arg(short, long, conflicts_with = "text")]
    file: Option<PathBuf>,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_deref())?;
    init_tracing(&config.logging);
    tracing::debug!(
        supplier = %config.extraction.supplier,
        language = %config.extraction.language,
        "configuration loaded"
    );

    match cli.command {
        Commands::Extract {
            input,
            supplier,
            language,
            temperature,
            api_key,
            format,
        } => {
            if let Some(supplier) = supplier {
                config.extraction.supplier = supplier;
            }
            if let Some(language) = language {
                config.extraction.language = language;
            }
            if let Some(temperature) = temperature {
                config.extraction.temperature = temperature;
            }
            let request = config.extraction_config(api_key)?;
            let text = read_input(&input)?;

            let gateway = Arc::new(ChatCompletionsGateway::new(config.llm.clone())?);
            let controller = PipelineController::new(gateway)
                .with_mapper(VisualizationMapper::new(config.visual.clone()));

            match controller.extract(&text, &request).await {
                PipelineResult::Ready(extraction) => print_extraction(&extraction, format)?,
                PipelineResult::Empty => bail!("No input text given; nothing to extract"),
                PipelineResult::Failed(failure) if failure.is_gateway() => {
                    bail!("LLM request to {} failed: {failure}", request.supplier)
                }
                PipelineResult::Failed(failure) => {
                    bail!("Could not build a knowledge graph: {failure}. Try rephrasing the input text")
                }
            }
        }
        Commands::Prompt {
            input,
            language,
            temperature,
            format,
        } => {
            let text = read_input(&input)?;
            if text.trim().is_empty() {
                bail!("No input text given");
            }
            let prompt = build_prompt(
                &text,
                language.unwrap_or(config.extraction.language),
                temperature.unwrap_or(config.extraction.temperature),
            );
            match format {
                OutputFormat::Text => println!("{}", prompt.render()),
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&prompt)?),
            }
        }
        Commands::Parse { reply, format } => {
            let raw = std::fs::read_to_string(&reply)
                .with_context(|| format!("Failed to read {}", reply.display()))?;
            let outcome = parse_with_diagnostics(&raw)?;
            let descriptor = VisualizationMapper::new(config.visual.clone()).map(&outcome.graph);

            match format {
                OutputFormat::Text => {
                    print!("{}", render_graph(&outcome.graph, &outcome.diagnostics))
                }
                OutputFormat::Json => {
                    let json = serde_json::json!({
                        "graph": outcome.graph,
                        "descriptor": descriptor,
                        "diagnostics": outcome.diagnostics,
                    });
                    println!("{}", serde_json::to_string_pretty(&json)?);
                }
            }
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> anyhow::Result<AppConfig> {
    let config = match path {
        Some(path) => AppConfig::from_file(path)?.with_env_override()?,
        None => AppConfig::from_env()?,
    };
    Ok(config)
}

/// Logs go to stderr so stdout stays machine-readable
fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&logging.level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_file(logging.include_location)
        .with_line_number(logging.include_location);

    if logging.json_format {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn read_input(input: &InputArgs) -> anyhow::Result<String> {
    if let Some(text) = &input.text {
        return Ok(text.clone());
    }
    if let Some(path) = &input.file {
        return std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()));
    }

    let mut text = String::new();
    std::io::stdin()
        .read_to_string(&mut text)
        .context("Failed to read text from stdin")?;
    Ok(text)
}

fn print_extraction(extraction: &Extraction, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Text => print!(
            "{}",
            render_graph(&extraction.graph, &extraction.diagnostics)
        ),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(extraction)?),
    }
    Ok(())
}

fn render_graph(graph: &Graph, diagnostics: &ParseDiagnostics) -> String {
    let mut out = format!("Nodes ({}):\n", graph.node_count());
    for node in graph.nodes() {
        out.push_str(&format!("  [{}] {} ({})\n", node.id(), node.label(), node.group()));
    }

    out.push_str(&format!("Edges ({}):\n", graph.edge_count()));
    for edge in graph.edges() {
        out.push_str(&format!("  {} -> {}: {}\n", edge.from(), edge.to(), edge.label()));
    }

    out.push_str("Triples:\n");
    for triple in graph.triples() {
        out.push_str(&format!("  {triple}\n"));
    }

    if !diagnostics.is_clean() {
        out.push_str(&format!(
            "Dropped entries: {} malformed node(s), {} duplicate node(s), {} malformed edge(s), {} dangling edge(s)\n",
            diagnostics.skipped_nodes,
            diagnostics.duplicate_nodes,
            diagnostics.skipped_edges,
            diagnostics.dangling_edges
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_extract_args() {
        let cli = Cli::try_parse_from([
            "kgen",
            "extract",
            "Alice knows Bob.",
            "--supplier",
            "zhipu",
            "--language",
            "en",
            "--format",
            "json",
        ])
        .unwrap();

        match cli.command {
            Commands::Extract {
                input,
                supplier,
                language,
                format,
                ..
            } => {
                assert_eq!(input.text.as_deref(), Some("Alice knows Bob."));
                assert_eq!(supplier, Some(Supplier::Zhipu));
                assert_eq!(language, Some(OutputLanguage::English));
                assert!(format == OutputFormat::Json);
            }
            _ => panic!("expected extract"),
        }
    }

    #[test]
    fn test_unknown_supplier_rejected() {
        assert!(Cli::try_parse_from(["kgen", "extract", "x", "--supplier", "openai"]).is_err());
    }

    #[test]
    fn test_render_graph() {
        let outcome = parse_with_diagnostics(
            r#"{"nodes":[{"id":1,"label":"Alice","group":"person"},{"id":2,"label":"Acme","group":"org"}],
                "edges":[{"from":1,"to":2,"label":"works at"},{"from":1,"to":9,"label":"knows"}]}"#,
        )
        .unwrap();

        let text = render_graph(&outcome.graph, &outcome.diagnostics);
        assert!(text.contains("Nodes (2):"));
        assert!(text.contains("  [1] Alice (person)"));
        assert!(text.contains("  1 -> 2: works at"));
        assert!(text.contains("(Alice) -[works at]-> (Acme)"));
        assert!(text.contains("1 dangling edge(s)"));
    }
}
