//! rulelist CLI
//!
//! Compile rule sources to RLC lists, inspect compiled lists, and run the
//! cache-first resolver against directories.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use rl_compiler::{compile_with_stats, CompileOptions};
use rl_core::{CompiledRuleList, Identifier, RawRuleSource, RuleListView};
use rl_resolver::{BlockListManager, DirectorySources, DirectoryStore, ResolverConfig};

#[derive(Parser)]
#[command(name = "rl-cli")]
#[command(about = "Content rule list compiler and resolver")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a JSON content-rule list or text filter list
    Compile {
        /// Input rule source
        #[arg(short, long)]
        input: PathBuf,

        /// Output compiled list
        #[arg(short, long, default_value = "list.rlc")]
        output: PathBuf,

        /// Identifier recorded in the list (defaults to the input file stem)
        #[arg(short = 'n', long)]
        name: Option<String>,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Validate and describe a compiled list
    Info {
        /// Compiled list to inspect
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Resolve identifiers through a directory store and source directory
    Resolve {
        /// Directory holding <id>.json / <id>.txt sources
        #[arg(long)]
        sources: PathBuf,

        /// Directory used as the compiled list store
        #[arg(long)]
        store: PathBuf,

        /// Resolver config (JSON)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Rule set identifiers
        #[arg(required = true)]
        identifiers: Vec<String>,
    },
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Compile {
            input,
            output,
            name,
            verbose,
        } => cmd_compile(&input, &output, name.as_deref(), verbose),
        Commands::Info { input } => cmd_info(&input),
        Commands::Resolve {
            sources,
            store,
            config,
            identifiers,
        } => cmd_resolve(&sources, &store, config.as_deref(), &identifiers),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn cmd_compile(input: &Path, output: &Path, name: Option<&str>, verbose: bool) -> Result<()> {
    let start = Instant::now();
    let bytes = fs::read(input).with_context(|| format!("Failed to read '{}'", input.display()))?;

    let name = match name {
        Some(name) => name.to_string(),
        None => input
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .with_context(|| format!("Cannot derive an identifier from '{}'", input.display()))?,
    };
    let identifier = Identifier::new(&name)?;
    let source = RawRuleSource::from(bytes);

    let (list, stats) = compile_with_stats(&identifier, &source, &CompileOptions::default())
        .with_context(|| format!("Failed to compile '{}'", input.display()))?;

    fs::write(output, list.as_bytes()).with_context(|| format!("Failed to write '{}'", output.display()))?;

    println!("Compiled '{}' as '{}' to '{}'", input.display(), identifier, output.display());
    if verbose {
        println!("  Format:   {:?}", stats.format);
        println!("  Source:   {} bytes (fingerprint {:#010x})", source.len(), source.fingerprint());
    }
    println!(
        "  Rules:    {} -> {} (dedupe removed {})",
        stats.parsed, stats.rules, stats.deduped
    );
    println!("  Domains:  {} host-only blocks", stats.block_domains);
    println!("  Size:     {} bytes ({:.1} KB)", stats.bytes, stats.bytes as f64 / 1024.0);
    println!("  Time:     {:.1}ms", start.elapsed().as_secs_f64() * 1000.0);

    Ok(())
}

fn cmd_info(input: &Path) -> Result<()> {
    let bytes = fs::read(input).with_context(|| format!("Failed to read '{}'", input.display()))?;
    let view = RuleListView::load(&bytes).context("Invalid compiled list")?;

    println!("Rule list: {}", input.display());
    println!("  Magic:        RLC1");
    println!("  Version:      {}", view.version);
    println!("  Source hash:  {:#010x}", view.source_hash);
    println!("  Total size:   {} bytes ({:.1} KB)", bytes.len(), bytes.len() as f64 / 1024.0);
    println!();

    let mut by_action: BTreeMap<&str, usize> = BTreeMap::new();
    let mut constrained = 0usize;
    for rule in view.rules() {
        *by_action.entry(rule.action.as_str()).or_default() += 1;
        if rule.constraint.is_some() {
            constrained += 1;
        }
    }

    println!("Rules:");
    println!("  Count:        {}", view.rule_count());
    for (action, count) in &by_action {
        println!("  {:<13} {}", format!("{}:", action), count);
    }
    println!("  Domain-scoped: {}", constrained);
    println!("  Block domains: {}", view.block_domain_count());

    Ok(())
}

fn cmd_resolve(sources: &Path, store: &Path, config: Option<&Path>, identifiers: &[String]) -> Result<()> {
    let config = match config {
        Some(path) => ResolverConfig::from_json_file(path)?,
        None => ResolverConfig::default(),
    };
    let identifiers = identifiers
        .iter()
        .map(|raw| Identifier::new(raw).with_context(|| format!("Invalid identifier '{}'", raw)))
        .collect::<Result<Vec<_>>>()?;
    if !sources.is_dir() {
        bail!("Source directory '{}' does not exist", sources.display());
    }

    let runtime = tokio::runtime::Runtime::new().context("Failed to start tokio runtime")?;
    runtime.block_on(async {
        let store = Arc::new(DirectoryStore::open(store).await?);
        let provider = Arc::new(DirectorySources::new(sources));
        let manager = BlockListManager::with_default_compiler(store, provider, config)?;

        let start = Instant::now();
        let (mut lists, report) = manager.resolve_with_report(identifiers).await;
        lists.sort_by(|a, b| a.identifier().cmp(b.identifier()));

        println!(
            "Resolved {}/{} rule lists in {:.1}ms",
            report.resolved(),
            report.requested,
            start.elapsed().as_secs_f64() * 1000.0
        );
        println!("  Cached:    {}", report.hits);
        println!("  Compiled:  {}", report.compiled);
        println!("  No source: {}", report.empty);
        println!("  Failed:    {}", report.failed);
        println!("  Timed out: {}", report.timed_out);
        println!();
        for list in &lists {
            print_list_line(list);
        }
        Ok::<(), anyhow::Error>(())
    })
}

fn print_list_line(list: &CompiledRuleList) {
    println!(
        "  {:<24} {:>7} rules {:>9} bytes",
        list.identifier().as_str(),
        list.rule_count(),
        list.as_bytes().len()
    );
}
