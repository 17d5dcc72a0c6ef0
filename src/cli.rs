use crate::Summary;
use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use log::{info, warn};
use scxmlio_fmt::scxmlio_core::*;
use scxmlio_fmt::{parse_file, write_with, WriterConfig};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Reads, validates and rewrites SCXML (State Chart XML) documents
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Action to perform on the document
    #[command(subcommand)]
    command: Commands,
    /// Accept a custom action, given as `{namespace}name`, keeping its content as is
    #[arg(short, long = "extension", global = true, value_parser = parse_extension)]
    extensions: Vec<(String, String)>,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse and validate a document
    Check {
        /// Path of the SCXML document
        #[arg(value_hint = clap::ValueHint::FilePath)]
        model: PathBuf,
    },
    /// Rewrite a document in normal form
    Fmt {
        /// Path of the SCXML document
        #[arg(value_hint = clap::ValueHint::FilePath)]
        model: PathBuf,
        /// Spaces per indentation level (0 writes everything on one line)
        #[arg(long, default_value = "2")]
        indent: usize,
        /// Write to the given file instead of standard output
        #[arg(short, long, value_hint = clap::ValueHint::FilePath)]
        output: Option<PathBuf>,
    },
    /// Print the outline of a document
    Inspect {
        /// Path of the SCXML document
        #[arg(value_hint = clap::ValueHint::FilePath)]
        model: PathBuf,
        /// Print the outline as JSON
        #[arg(long, default_value = "false")]
        json: bool,
    },
}

/// Custom action accepted through the command line:
/// it only logs when executed, and keeps its content for rewriting.
#[derive(Debug, Default)]
struct PassThrough;

impl CustomActionImpl for PassThrough {
    fn execute(&self, action: &CustomAction, ctx: &mut dyn ActionContext) -> Result<(), ActionError> {
        ctx.log(Some(action.name()), "pass-through custom action");
        Ok(())
    }

    fn accepts_foreign_content(&self) -> bool {
        true
    }
}

fn parse_extension(arg: &str) -> Result<(String, String), String> {
    arg.strip_prefix('{')
        .and_then(|arg| arg.split_once('}'))
        .filter(|(_, name)| !name.is_empty())
        .map(|(namespace, name)| (namespace.to_string(), name.to_string()))
        .ok_or_else(|| format!("'{arg}' is not of the form '{{namespace}}name'"))
}

impl Cli {
    pub fn run(&self) -> anyhow::Result<()> {
        let mut registry = ExtensionRegistry::new();
        for (namespace, name) in &self.extensions {
            if registry
                .register_default::<PassThrough>(namespace.as_str(), name.as_str())
                .is_some()
            {
                warn!("custom action '{{{namespace}}}{name}' given more than once");
            }
        }
        match &self.command {
            Commands::Check { model } => {
                let document = load(model, &registry)?;
                println!(
                    "Document '{}' is valid ({} nodes)",
                    model.display(),
                    document.len()
                );
            }
            Commands::Fmt {
                model,
                indent,
                output,
            } => {
                let document = load(model, &registry)?;
                let config = WriterConfig {
                    indent: (*indent > 0).then_some(*indent),
                };
                match output {
                    Some(path) => {
                        info!("writing document to {}", path.display());
                        let file = File::create(path)
                            .with_context(|| format!("failed creating {}", path.display()))?;
                        let mut sink = BufWriter::new(file);
                        write_with(&document, &mut sink, &config)?;
                        writeln!(sink)?;
                        sink.flush()?;
                    }
                    None => {
                        let mut sink = std::io::stdout().lock();
                        write_with(&document, &mut sink, &config)?;
                        writeln!(sink)?;
                    }
                }
            }
            Commands::Inspect { model, json } => {
                let document = load(model, &registry)?;
                let summary = Summary::new(&document);
                if *json {
                    println!("{}", serde_json::to_string_pretty(&summary)?);
                } else {
                    print!("{summary}");
                }
            }
        }
        Ok(())
    }
}

fn load(model: &Path, registry: &ExtensionRegistry) -> anyhow::Result<Document> {
    info!("parsing document {}", model.display());
    parse_file(model, Some(registry)).map_err(|err| {
        let errors = err.model_errors();
        if errors.is_empty() {
            anyhow!(err).context(format!("failed reading {}", model.display()))
        } else {
            let list = errors
                .iter()
                .map(|error| format!("\n  - {error}"))
                .collect::<String>();
            anyhow!("invalid document {}:{list}", model.display())
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extensions() {
        assert_eq!(
            parse_extension("{http://example/actions}action"),
            Ok(("http://example/actions".to_string(), "action".to_string()))
        );
        assert_eq!(parse_extension("{}action"), Ok((String::new(), "action".to_string())));
        assert!(parse_extension("action").is_err());
        assert!(parse_extension("{http://example/actions}").is_err());
    }

    #[test]
    fn arguments() {
        let cli = Cli::try_parse_from([
            "scxmlio",
            "fmt",
            "model.scxml",
            "--indent",
            "0",
            "-e",
            "{urn:a}x",
            "--extension",
            "{urn:b}y",
        ])
        .expect("valid arguments");
        assert_eq!(cli.extensions.len(), 2);
        assert!(matches!(cli.command, Commands::Fmt { indent: 0, output: None, .. }));
        assert!(Cli::try_parse_from(["scxmlio", "check", "model.scxml", "-e", "x"]).is_err());
    }
}
