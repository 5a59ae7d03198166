//! tfsynth command-line driver

use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use std::path::PathBuf;
use tfsynth_construct::SchemaRegistry;
use tfsynth_core::{load_app, AssemblyWriter, SynthConfig, Synthesizer};
use tracing_subscriber::EnvFilter;

fn app_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("app")
                .long("app")
                .required(true)
                .value_parser(value_parser!(PathBuf))
                .help("App description (.yaml, .json or .toml)"),
        )
        .arg(
            Arg::new("schema")
                .long("schema")
                .required(true)
                .value_parser(value_parser!(PathBuf))
                .help("Provider schema registry (.yaml, .json or .toml)"),
        )
}

fn cli() -> Command {
    Command::new("tfsynth")
        .version(tfsynth_core::VERSION)
        .about("Synthesize construct trees into Terraform JSON")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            app_args(Command::new("synth").about("Synthesize every stack and write the assembly"))
                .arg(
                    Arg::new("config")
                        .long("config")
                        .value_parser(value_parser!(PathBuf))
                        .help("Synthesis config (TOML)"),
                )
                .arg(
                    Arg::new("out")
                        .long("out")
                        .value_parser(value_parser!(PathBuf))
                        .help("Assembly directory (overrides config and TFSYNTH_OUTDIR)"),
                )
                .arg(
                    Arg::new("compact")
                        .long("compact")
                        .action(ArgAction::SetTrue)
                        .help("Write compact JSON"),
                ),
        )
        .subcommand(app_args(
            Command::new("order").about("Print the emission order of every stack"),
        ))
}

fn path_arg<'a>(args: &'a ArgMatches, name: &str) -> Result<&'a PathBuf> {
    args.get_one::<PathBuf>(name)
        .with_context(|| format!("missing --{name}"))
}

fn load(args: &ArgMatches) -> Result<tfsynth_construct::App> {
    let schema_path = path_arg(args, "schema")?;
    let schemas = SchemaRegistry::load(schema_path)
        .with_context(|| format!("loading schema {}", schema_path.display()))?;
    let app_path = path_arg(args, "app")?;
    load_app(app_path, schemas).with_context(|| format!("loading app {}", app_path.display()))
}

fn synth(args: &ArgMatches) -> Result<bool> {
    let mut config = match args.get_one::<PathBuf>("config") {
        Some(path) => SynthConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => SynthConfig::default(),
    }
    .with_env_overrides();
    if let Some(out) = args.get_one::<PathBuf>("out") {
        config = config.with_output_dir(out);
    }
    if args.get_flag("compact") {
        config = config.with_pretty(false);
    }

    let app = load(args)?;
    let synthesizer = Synthesizer::new(config);
    let synthesis = synthesizer.synthesize(&app);

    let manifest = AssemblyWriter::new(&synthesizer.config().output_dir)
        .with_pretty(synthesizer.config().pretty)
        .write(&synthesis)
        .context("writing assembly")?;

    for entry in manifest.stacks.values() {
        println!("{}: {}", entry.name, entry.synthesized_stack_path);
    }
    for err in synthesis.errors() {
        eprintln!("error: {err}");
    }
    Ok(synthesis.is_success())
}

fn order(args: &ArgMatches) -> Result<bool> {
    let app = load(args)?;
    let synthesis = Synthesizer::default().synthesize(&app);

    for (stack, result) in synthesis.iter() {
        match result {
            Ok(artifact) => {
                println!("{stack}:");
                for id in artifact.order() {
                    println!("  {id}");
                }
            }
            Err(err) => eprintln!("error: {err}"),
        }
    }
    Ok(synthesis.is_success())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tfsynth=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let matches = cli().get_matches();
    let outcome = match matches.subcommand() {
        Some(("synth", args)) => synth(args),
        Some(("order", args)) => order(args),
        _ => Ok(false),
    };

    let code = match outcome {
        Ok(true) => 0,
        Ok(false) => 1,
        Err(err) => {
            eprintln!("error: {err:#}");
            1
        }
    };
    std::process::exit(code);
}
