//! adcheck: flag regulated claims in cosmetics advertising copy
//!
//! Reads advertisement text from files (or stdin), checks it against a rule
//! database and prints either a JSON report or the text with every finding
//! highlighted.

use std::io::Read;
use std::path::PathBuf;

use adcheck_engine::{
    AdCheckEngine, EngineConfig, PlaceholderTable, ProductClass, RuleDatabase, RuleFilter,
};
use anyhow::Context;
use clap::{Parser, ValueEnum};
use tracing::{debug, info, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod render;

/// Command-line arguments for the advertisement checker
#[derive(Parser, Debug)]
#[command(name = "adcheck", version)]
#[command(about = "Check cosmetics advertising copy for regulated claims")]
struct Args {
    /// Files to check (reads stdin if none provided)
    files: Vec<PathBuf>,

    /// Rule database (JSON)
    #[arg(short, long)]
    rules: PathBuf,

    /// Placeholder substitution table (JSON)
    #[arg(short, long)]
    placeholders: Option<PathBuf>,

    /// Engine configuration (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Product class of the advertised product
    #[arg(long, value_enum, default_value_t = ClassArg::General)]
    class: ClassArg,

    /// Usage category (e.g. スキンケア)
    #[arg(long)]
    usage: Option<String>,

    /// Product name (e.g. 化粧水)
    #[arg(long)]
    product: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = Format::Json)]
    format: Format,

    /// Collapse near-duplicate findings and repeated expressions
    #[arg(long)]
    merge: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ClassArg {
    /// 一般化粧品
    General,
    /// 医薬部外品
    QuasiDrug,
}

impl From<ClassArg> for ProductClass {
    fn from(class: ClassArg) -> Self {
        match class {
            ClassArg::General => ProductClass::GeneralCosmetics,
            ClassArg::QuasiDrug => ProductClass::QuasiDrug,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Json,
    Text,
    Html,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    // stdout carries the report
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let engine = build_engine(&args)?;
    info!(
        version = %engine.rules().version(),
        rules = engine.rules().len(),
        "Rule set loaded"
    );

    let inputs = read_inputs(&args.files)?;
    for (name, text) in &inputs {
        debug!(input = %name, chars = text.chars().count(), "Checking");
        let report = engine.check(text);
        let merge_tolerance = args.merge.then_some(engine.config().merge_tolerance);
        println!("{}", render::render(text, report, args.format, merge_tolerance)?);
    }

    Ok(())
}

fn build_engine(args: &Args) -> anyhow::Result<AdCheckEngine> {
    let config = match &args.config {
        Some(path) => EngineConfig::from_path(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => EngineConfig::default(),
    };

    let placeholders = match &args.placeholders {
        Some(path) => PlaceholderTable::from_path(path)
            .with_context(|| format!("loading placeholders {}", path.display()))?,
        None => PlaceholderTable::default(),
    };

    let database = RuleDatabase::from_path(&args.rules)
        .with_context(|| format!("loading rule database {}", args.rules.display()))?;

    let filter = RuleFilter {
        product_class: args.class.into(),
        usage: args.usage.clone(),
        product: args.product.clone(),
    };

    Ok(AdCheckEngine::new(config, placeholders, &database, &filter)?)
}

fn read_inputs(files: &[PathBuf]) -> anyhow::Result<Vec<(String, String)>> {
    if files.is_empty() {
        let mut input = String::new();
        std::io::stdin()
            .read_to_string(&mut input)
            .context("reading stdin")?;
        return Ok(vec![("<stdin>".to_string(), input)]);
    }

    files
        .iter()
        .map(|path| {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            Ok((path.display().to_string(), text))
        })
        .collect()
}
