//! Slicework CLI entry point.

use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use slicework_runtime::{FileAssetProvider, load_from_file, logging};
use slicework_slice::{SliceComponent, SliceConfig, SliceDocument};

/// CLI configuration parsed from arguments.
#[derive(Default)]
struct CliConfig {
    files: Vec<PathBuf>,
    asset_dir: Option<PathBuf>,
    strict: bool,
    verbose: bool,
    show_help: bool,
    show_version: bool,
}

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("\x1b[31mError: {e}\x1b[0m");
            ExitCode::FAILURE
        }
    }
}

fn parse_args(args: Vec<String>) -> Result<CliConfig, Box<dyn std::error::Error>> {
    let mut config = CliConfig::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => config.show_help = true,
            "-V" | "--version" => config.show_version = true,
            "-v" | "--verbose" => config.verbose = true,
            "--strict" => config.strict = true,
            "--instantiate" => {
                i += 1;
                if i >= args.len() {
                    return Err("--instantiate requires an asset directory".into());
                }
                config.asset_dir = Some(PathBuf::from(&args[i]));
            }
            arg if arg.starts_with('-') => {
                return Err(format!("unknown option: {arg}").into());
            }
            path => config.files.push(PathBuf::from(path)),
        }
        i += 1;
    }

    Ok(config)
}

fn run(args: Vec<String>) -> Result<(), Box<dyn std::error::Error>> {
    let config = parse_args(args)?;

    if config.show_help {
        print_help();
        return Ok(());
    }

    if config.show_version {
        println!("slicework {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    logging::init(if config.verbose { "debug" } else { "warn" });

    if config.files.is_empty() {
        return Err("no slice files given (try --help)".into());
    }

    let slice_config = SliceConfig::default().with_allow_partial_instantiation(!config.strict);
    let provider = config
        .asset_dir
        .as_ref()
        .map(|dir| FileAssetProvider::with_config(dir, slice_config.clone()));

    for file in &config.files {
        let document = load_from_file(file)?;
        print_summary(file, &document);

        if let Some(provider) = &provider {
            let mut component = SliceComponent::from_document(document, slice_config.clone());
            let report = component.instantiate(provider)?;
            println!(
                "  instantiated: {} entities, {} references",
                component.entity_ids().len(),
                report.instantiated_references
            );
            for warning in &report.warnings {
                println!("  \x1b[33mwarning:\x1b[0m {warning}");
            }
        }
        println!();
    }

    Ok(())
}

fn print_summary(file: &std::path::Path, document: &SliceDocument) {
    println!("\x1b[1;36m=== {} ===\x1b[0m", file.display());
    match document.asset_id {
        Some(asset) => println!("Asset: {asset}"),
        None => println!("Asset: (none)"),
    }
    println!("Entities: {}", document.entities.len());
    println!("References: {}", document.slices.len());
    println!("Instances: {}", document.instance_count());
    println!("Patch edits: {}", document.patch_edit_count());

    for reference in &document.slices {
        println!("  - {}", reference.asset);
        for instance in &reference.instances {
            println!(
                "      {} ({} mapped ids, {} edits, {} flagged entities)",
                instance.id,
                instance.entity_id_map.len(),
                instance.patch.len(),
                instance.data_flags.len()
            );
        }
    }
}

fn print_help() {
    println!(
        "\x1b[1mSlicework\x1b[0m - Slice composition and data-patch inspector

\x1b[1mUSAGE:\x1b[0m
    slicework [OPTIONS] <FILES...>

\x1b[1mARGUMENTS:\x1b[0m
    <FILES...>    Slice documents (.slice) to summarize

\x1b[1mOPTIONS:\x1b[0m
    -h, --help               Print help information
    -V, --version            Print version information
    -v, --verbose            Log instantiation steps (RUST_LOG overrides)
    --instantiate <DIR>      Instantiate each file against assets in DIR
    --strict                 Fail on missing assets instead of skipping them

\x1b[1mEXAMPLES:\x1b[0m
    slicework street.slice                      Summarize one document
    slicework --instantiate assets street.slice Instantiate against ./assets
    RUST_LOG=slicework_slice=debug slicework --instantiate assets level.slice"
    );
}
