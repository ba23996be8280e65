pub mod cli;
pub mod error;
pub mod loader;
pub mod profile;
pub mod report;
pub mod rows;
pub mod schema;
pub mod store;

use std::{
    env,
    fs::File,
    io::{BufWriter, Write},
    sync::OnceLock,
};

use anyhow::{Context, Result};
use clap::Parser;
use log::{LevelFilter, info};

use crate::{
    cli::{Cli, Commands, LoadArgs, ProbeArgs},
    loader::{Loader, LoaderConfig},
    profile::Hint,
    schema::TypePolicy,
    store::ScriptStore,
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("csv_loader", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Probe(args) => handle_probe(&args),
        Commands::Load(args) => handle_load(&args),
    }
}

fn handle_probe(args: &ProbeArgs) -> Result<()> {
    let delimiter = rows::resolve_input_delimiter(&args.input, args.delimiter);
    info!(
        "Probing '{}' with delimiter '{}'",
        args.input.display(),
        printable_delimiter(delimiter)
    );
    let encoding = rows::resolve_encoding(args.input_encoding.as_deref())?;
    let hints = parse_hints(&args.hints)?;
    let policy = TypePolicy {
        short_string_limit: if args.text_only {
            None
        } else {
            Some(args.short_string_limit)
        },
        infer_dates: args.infer_dates,
    };

    let profile = profile::profile_file(
        &args.input,
        delimiter,
        encoding,
        args.sample_rows,
        &hints,
        &policy,
    )
    .with_context(|| format!("Profiling {:?}", args.input))?;

    for diagnostic in &profile.diagnostics {
        diagnostic.report();
    }
    for column in &profile.columns {
        info!("{}: {}", column.name, column.field_type);
    }
    if let Some(meta) = &args.meta {
        let file = File::create(meta).with_context(|| format!("Creating meta file {meta:?}"))?;
        serde_json::to_writer_pretty(file, &profile.columns).context("Writing profile JSON")?;
        info!(
            "Profile for {} column(s) written to {:?}",
            profile.columns.len(),
            meta
        );
    }
    Ok(())
}

fn handle_load(args: &LoadArgs) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => LoaderConfig::from_yaml(path)?,
        None => LoaderConfig::default(),
    };
    if let Some(folder) = &args.folder {
        config.folder = folder.clone();
    }
    if let Some(prefix) = &args.table_prefix {
        config.table_prefix = prefix.clone();
    }
    if let Some(connection) = &args.connection {
        config.connection = connection.clone();
    }
    if let Some(sample_rows) = args.sample_rows {
        config.sample_size = sample_rows;
    }
    if let Some(delimiter) = args.delimiter {
        config.field_separator = delimiter as char;
    }
    if args.local {
        config.bulk_local_mode = true;
    }
    if args.no_normalize {
        config.normalize_after_load = false;
    }
    if args.infer_dates {
        config.infer_dates = true;
    }
    if let Some(report) = &args.report {
        config.report = Some(report.clone());
    }

    let encoding = rows::resolve_encoding(args.input_encoding.as_deref())?;
    let hints = parse_hints(&args.hints)?;

    let out: Box<dyn Write> = match &args.script {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("Creating script file {path:?}"))?,
        )),
        None => Box::new(std::io::stdout()),
    };
    let mut store = ScriptStore::new(out);

    let loader = Loader::new(config);
    let outcome = loader.load(
        &mut store,
        &args.file,
        args.table.as_deref(),
        &hints,
        encoding,
    )?;
    store.into_inner().flush().context("Flushing SQL script")?;

    info!(
        "Generated load script for table '{}' ({} columns)",
        outcome.table,
        outcome.columns.len()
    );
    Ok(())
}

fn parse_hints(specs: &[String]) -> Result<Vec<Hint>> {
    specs.iter().map(|spec| Hint::parse(spec)).collect()
}

pub(crate) fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b',' => ",".to_string(),
        b'\t' => "\\t".to_string(),
        b'\n' => "\\n".to_string(),
        other => (other as char).to_string(),
    }
}
