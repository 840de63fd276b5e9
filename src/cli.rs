//! CLI Tooling
//!
//! Command-line interface: map peptides against a FASTA database, list the
//! peptides held by the tree, prebuild a persistent index, and clean up stores
//! left behind by older database files.

use crate::cleavage::{CleavageRule, Enzyme};
use crate::config::{ConfigLoader, PeptreeConfig, StoreKind};
use crate::error::ApiError;
use crate::logging::LoggingConfig;
use crate::progress::ProgressCounter;
use crate::sequence::{FastaSequences, SequenceProvider};
use crate::store::persistence::{remove_outdated, PersistentNodeStore};
use crate::store::scratch::FileNodeStore;
use crate::store::NodeStore;
use crate::tree::index::{BuildStatus, ProteinTreeIndex};
use crate::types::Position;
use crate::types::ProteinMapping;
use clap::{Parser, Subcommand};
use serde_json::json;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Peptree CLI - protein tag-tree index
#[derive(Parser)]
#[command(name = "peptree")]
#[command(about = "Map peptides to every protein and position where they occur")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path (overrides the user config file)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file, file+stderr, both)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (if output includes "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Map peptides against a FASTA database
    Map {
        /// Protein database
        #[arg(long)]
        fasta: PathBuf,
        /// Keep the index on disk and reuse it on the next run
        #[arg(long)]
        persistent: bool,
        /// Cleavage enzyme preset (trypsin, lys-c, asp-n)
        #[arg(long)]
        enzyme: Option<String>,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
        /// Only report positions in this protein
        #[arg(long)]
        protein: Option<String>,
        /// Peptides to look up
        #[arg(required = true)]
        peptides: Vec<String>,
    },
    /// List every peptide ending a branch of the tree, alphabetically
    Peptides {
        #[arg(long)]
        fasta: PathBuf,
        #[arg(long)]
        persistent: bool,
        #[arg(long)]
        enzyme: Option<String>,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Build or verify the persistent index of a FASTA database
    Build {
        #[arg(long)]
        fasta: PathBuf,
        #[arg(long)]
        enzyme: Option<String>,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Remove persistent indexes built from earlier versions of a FASTA database
    Purge {
        #[arg(long)]
        fasta: PathBuf,
    },
}

/// CLI context: loaded configuration shared by every command
pub struct CliContext {
    config: PeptreeConfig,
}

impl CliContext {
    /// Create a new CLI context
    pub fn new(config_path: Option<PathBuf>) -> Result<Self, ApiError> {
        let config = ConfigLoader::load(config_path.as_deref())?;
        Self::with_config(config)
    }

    pub fn with_config(config: PeptreeConfig) -> Result<Self, ApiError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PeptreeConfig {
        &self.config
    }

    /// Logging configuration with command-line flags applied
    pub fn logging_config(&self, cli: &Cli) -> LoggingConfig {
        let mut logging = self.config.logging.clone();
        if let Some(level) = &cli.log_level {
            logging.level = level.clone();
        }
        if let Some(format) = &cli.log_format {
            logging.format = format.clone();
        }
        if let Some(output) = &cli.log_output {
            logging.output = output.clone();
        }
        if let Some(file) = &cli.log_file {
            logging.file = Some(file.clone());
        }
        logging
    }

    /// Execute a CLI command
    pub fn execute(&self, command: &Commands) -> Result<String, ApiError> {
        match command {
            Commands::Map {
                fasta,
                persistent,
                enzyme,
                format,
                protein,
                peptides,
            } => {
                let enzyme = self.resolve_enzyme(enzyme.as_deref())?;
                let rule = enzyme.as_ref().map(|e| e as &dyn CleavageRule);
                let sequences = FastaSequences::from_path(fasta)?;
                let protein = protein.as_deref();

                let mappings = if self.use_persistent(*persistent) {
                    let (mut index, _) = self.build_persistent(fasta, &sequences, rule)?;
                    let mappings = run_queries(&mut index, peptides, protein)?;
                    index.close()?;
                    mappings
                } else {
                    let mut index = self.build_scratch(&sequences, rule)?;
                    let mappings = run_queries(&mut index, peptides, protein)?;
                    index.close()?;
                    mappings
                };

                match format.as_str() {
                    "json" => format_mappings_json(&mappings),
                    _ => Ok(format_mappings_text(&mappings)),
                }
            }
            Commands::Peptides {
                fasta,
                persistent,
                enzyme,
                format,
            } => {
                let enzyme = self.resolve_enzyme(enzyme.as_deref())?;
                let rule = enzyme.as_ref().map(|e| e as &dyn CleavageRule);
                let sequences = FastaSequences::from_path(fasta)?;

                let mappings = if self.use_persistent(*persistent) {
                    let (mut index, _) = self.build_persistent(fasta, &sequences, rule)?;
                    let mappings = list_peptides(&mut index)?;
                    index.close()?;
                    mappings
                } else {
                    let mut index = self.build_scratch(&sequences, rule)?;
                    let mappings = list_peptides(&mut index)?;
                    index.close()?;
                    mappings
                };

                match format.as_str() {
                    "json" => format_mappings_json(&mappings),
                    _ => Ok(format_mappings_text(&mappings)),
                }
            }
            Commands::Build {
                fasta,
                enzyme,
                format,
            } => {
                let enzyme = self.resolve_enzyme(enzyme.as_deref())?;
                let rule = enzyme.as_ref().map(|e| e as &dyn CleavageRule);
                let sequences = FastaSequences::from_path(fasta)?;
                let (index, status) = self.build_persistent(fasta, &sequences, rule)?;
                let summary = BuildSummary {
                    status,
                    proteins: sequences.len(),
                    tags: index.tag_count(),
                    store: index.store().dir().to_path_buf(),
                };
                index.close()?;
                match format.as_str() {
                    "json" => format_build_summary_json(&summary),
                    _ => Ok(format_build_summary_text(&summary)),
                }
            }
            Commands::Purge { fasta } => {
                let root = self.config.store.resolve_root()?;
                let removed = remove_outdated(&root, fasta)?;
                Ok(format!("Removed {} outdated store(s) under {}", removed, root.display()))
            }
        }
    }

    /// Command-line preset, else the configured enzyme
    fn resolve_enzyme(&self, name: Option<&str>) -> Result<Option<Enzyme>, ApiError> {
        match name {
            Some(name) => Enzyme::by_name(name)
                .map(Some)
                .ok_or_else(|| ApiError::ConfigError(format!("Unknown enzyme: {}", name))),
            None => Ok(self.config.enzyme.clone()),
        }
    }

    fn use_persistent(&self, requested: bool) -> bool {
        requested || self.config.store.kind == StoreKind::Persistent
    }

    /// Build in a scratch file that is deleted when the index closes
    fn build_scratch<'a>(
        &self,
        sequences: &'a FastaSequences,
        rule: Option<&dyn CleavageRule>,
    ) -> Result<ProteinTreeIndex<&'a FastaSequences, FileNodeStore>, ApiError> {
        let store = FileNodeStore::in_dir(self.config.store.resolve_scratch_dir())?;
        let mut index = ProteinTreeIndex::new(sequences, store, self.config.index.settings());
        let progress = ProgressCounter::new("build");
        let status = index.build(self.config.index.parameters(), rule, Some(&progress))?;
        ensure_built(status)?;
        Ok(index)
    }

    /// Build against the persistent store of `fasta`, rebuilding once if the store is stale
    fn build_persistent<'a>(
        &self,
        fasta: &Path,
        sequences: &'a FastaSequences,
        rule: Option<&dyn CleavageRule>,
    ) -> Result<(ProteinTreeIndex<&'a FastaSequences, PersistentNodeStore>, BuildStatus), ApiError>
    {
        let root = self.config.store.resolve_root()?;
        let params = self.config.index.parameters();
        let progress = ProgressCounter::new("build");

        let store = PersistentNodeStore::open(&root, fasta)?;
        let mut index = ProteinTreeIndex::new(sequences, store, self.config.index.settings());
        let status = match index.build(params, rule, Some(&progress)) {
            Ok(status) => status,
            Err(e) => {
                let Some(reason) = e.stale_reason() else {
                    return Err(e.into());
                };
                warn!(%reason, "Deleting stale node store and rebuilding");
                index.delete_store()?;

                let store = PersistentNodeStore::open(&root, fasta)?;
                index = ProteinTreeIndex::new(sequences, store, self.config.index.settings());
                index.build(params, rule, Some(&progress))?
            }
        };
        ensure_built(status)?;
        info!(?status, store = %index.store().dir().display(), "Persistent index ready");
        Ok((index, status))
    }
}

fn ensure_built(status: BuildStatus) -> Result<(), ApiError> {
    match status {
        BuildStatus::Cancelled => Err(ApiError::ConfigError("Index build was cancelled".to_string())),
        BuildStatus::Completed | BuildStatus::Reused => Ok(()),
    }
}

fn run_queries<P, S>(
    index: &mut ProteinTreeIndex<P, S>,
    peptides: &[String],
    protein: Option<&str>,
) -> Result<Vec<(String, ProteinMapping)>, ApiError>
where
    P: SequenceProvider,
    S: NodeStore,
{
    peptides
        .iter()
        .map(|peptide| {
            let peptide = peptide.to_ascii_uppercase();
            let mapping = match protein {
                Some(accession) => {
                    let positions = index.query_in_protein(&peptide, accession)?;
                    single_protein(accession, positions)
                }
                None => index.query(&peptide)?,
            };
            Ok((peptide, mapping))
        })
        .collect()
}

fn single_protein(accession: &str, positions: Vec<Position>) -> ProteinMapping {
    let mut mapping = ProteinMapping::new();
    if !positions.is_empty() {
        mapping.insert(accession.to_string(), positions);
    }
    mapping
}

fn list_peptides<P, S>(
    index: &mut ProteinTreeIndex<P, S>,
) -> Result<Vec<(String, ProteinMapping)>, ApiError>
where
    P: SequenceProvider,
    S: NodeStore,
{
    Ok(index.peptides()?.collect::<Result<Vec<_>, _>>()?)
}

struct BuildSummary {
    status: BuildStatus,
    proteins: usize,
    tags: usize,
    store: PathBuf,
}

fn status_label(status: BuildStatus) -> &'static str {
    match status {
        BuildStatus::Completed => "built",
        BuildStatus::Reused => "reused",
        BuildStatus::Cancelled => "cancelled",
    }
}

/// Format mappings as text: one line per peptide and protein, positions 0-based
fn format_mappings_text(mappings: &[(String, ProteinMapping)]) -> String {
    let mut output = String::new();
    for (peptide, mapping) in mappings {
        if mapping.is_empty() {
            output.push_str(&format!("{}\t-\n", peptide));
            continue;
        }
        for (accession, positions) in mapping {
            let positions: Vec<String> = positions.iter().map(|p| p.to_string()).collect();
            output.push_str(&format!("{}\t{}\t{}\n", peptide, accession, positions.join(",")));
        }
    }
    output.trim_end().to_string()
}

fn format_mappings_json(mappings: &[(String, ProteinMapping)]) -> Result<String, ApiError> {
    let peptides: Vec<_> = mappings
        .iter()
        .map(|(peptide, mapping)| json!({ "peptide": peptide, "proteins": mapping }))
        .collect();
    Ok(serde_json::to_string_pretty(&json!({ "peptides": peptides }))?)
}

fn format_build_summary_text(summary: &BuildSummary) -> String {
    format!(
        "Index {}: {} proteins, {} tags\nStore: {}",
        status_label(summary.status),
        summary.proteins,
        summary.tags,
        summary.store.display()
    )
}

fn format_build_summary_json(summary: &BuildSummary) -> Result<String, ApiError> {
    Ok(serde_json::to_string_pretty(&json!({
        "status": status_label(summary.status),
        "proteins": summary.proteins,
        "tags": summary.tags,
        "store": summary.store,
    }))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn fixture(temp: &TempDir) -> (CliContext, PathBuf) {
        let fasta = temp.path().join("proteins.fasta");
        let mut file = std::fs::File::create(&fasta).unwrap();
        writeln!(file, ">P1").unwrap();
        writeln!(file, "MKTAYIAK").unwrap();
        writeln!(file, ">P2").unwrap();
        writeln!(file, "TAYIAKQR").unwrap();
        drop(file);

        let mut config = PeptreeConfig::default();
        config.store.root = Some(temp.path().join("stores"));
        config.store.scratch_dir = Some(temp.path().to_path_buf());
        (CliContext::with_config(config).unwrap(), fasta)
    }

    #[test]
    fn test_parse_map_command() {
        let cli = Cli::try_parse_from([
            "peptree", "--log-level", "debug", "map", "--fasta", "db.fasta", "--format", "json",
            "TAY", "AYI",
        ])
        .unwrap();
        let Commands::Map {
            peptides, format, ..
        } = &cli.command
        else {
            panic!("expected map command");
        };
        assert_eq!(peptides, &vec!["TAY".to_string(), "AYI".to_string()]);
        assert_eq!(format, "json");

        let context = CliContext::with_config(PeptreeConfig::default()).unwrap();
        assert_eq!(context.logging_config(&cli).level, "debug");
    }

    #[test]
    fn test_map_with_scratch_store() {
        let temp = TempDir::new().unwrap();
        let (context, fasta) = fixture(&temp);
        let output = context
            .execute(&Commands::Map {
                fasta,
                persistent: false,
                enzyme: None,
                format: "text".to_string(),
                protein: None,
                peptides: vec!["tay".to_string(), "ZZZ".to_string()],
            })
            .unwrap();
        assert_eq!(output, "TAY\tP1\t2\nTAY\tP2\t0\nZZZ\t-");
    }

    #[test]
    fn test_map_restricted_to_one_protein() {
        let temp = TempDir::new().unwrap();
        let (context, fasta) = fixture(&temp);
        let output = context
            .execute(&Commands::Map {
                fasta,
                persistent: false,
                enzyme: None,
                format: "text".to_string(),
                protein: Some("P2".to_string()),
                peptides: vec!["TAY".to_string(), "MKT".to_string()],
            })
            .unwrap();
        assert_eq!(output, "TAY\tP2\t0\nMKT\t-");
    }

    #[test]
    fn test_peptides_listing_is_alphabetical() {
        let temp = TempDir::new().unwrap();
        let (context, fasta) = fixture(&temp);
        let output = context
            .execute(&Commands::Peptides {
                fasta,
                persistent: true,
                enzyme: None,
                format: "text".to_string(),
            })
            .unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 12);
        assert_eq!(lines[0], "AKQ\tP2\t4");
        assert_eq!(lines[1], "AYI\tP1\t3");
        assert_eq!(lines[2], "AYI\tP2\t1");
        assert_eq!(lines[11], "YIA\tP2\t2");
        let mut sorted = lines.clone();
        sorted.sort_unstable();
        assert_eq!(lines, sorted);
    }

    #[test]
    fn test_build_then_reuse_then_purge() {
        let temp = TempDir::new().unwrap();
        let (context, fasta) = fixture(&temp);
        let build = Commands::Build {
            fasta: fasta.clone(),
            enzyme: None,
            format: "json".to_string(),
        };

        let first: serde_json::Value =
            serde_json::from_str(&context.execute(&build).unwrap()).unwrap();
        assert_eq!(first["status"], "built");
        assert_eq!(first["proteins"], 2);
        let second: serde_json::Value =
            serde_json::from_str(&context.execute(&build).unwrap()).unwrap();
        assert_eq!(second["status"], "reused");

        let output = context
            .execute(&Commands::Map {
                fasta: fasta.clone(),
                persistent: true,
                enzyme: None,
                format: "json".to_string(),
                protein: None,
                peptides: vec!["AYI".to_string()],
            })
            .unwrap();
        let mapped: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(mapped["peptides"][0]["proteins"]["P1"][0], 3);

        let output = context.execute(&Commands::Purge { fasta }).unwrap();
        assert!(output.starts_with("Removed 0"));
    }

    #[test]
    fn test_unknown_enzyme_is_config_error() {
        let temp = TempDir::new().unwrap();
        let (context, fasta) = fixture(&temp);
        let err = context
            .execute(&Commands::Build {
                fasta,
                enzyme: Some("pepsin".to_string()),
                format: "text".to_string(),
            })
            .unwrap_err();
        assert!(matches!(err, ApiError::ConfigError(_)));
    }
}
