//! Command-line interface for starmark
//! Compiles starmark documents into HTML pages and a LaTeX document.
//!
//! Usage:
//!   starmark build `<input>` [--html-dir `<dir>`] [--tex `<file>`] [--bib `<file>`] [--footer `<file>`] [--backend html|tex|both]
//!   starmark inspect `<input>`                                     - Print the discovered structure as JSON
//!   starmark list-commands                                       - List the markup commands
//!
//! Every subcommand accepts `--config <file>`; without it `starmark.toml` in the working
//! directory is used when present.

use clap::{Arg, ArgMatches, Command};
use starmark::config::{Loader, Settings};
use starmark::lexing::Command as Markup;
use starmark::{telemetry, BackendKind, Compiler, FileSources, Options};
use std::path::{Path, PathBuf};

fn config_arg() -> Arg {
    Arg::new("config")
        .long("config")
        .short('c')
        .global(true)
        .help("Configuration file layered over the built-in defaults")
}

fn main() {
    let matches = Command::new("starmark")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Compile starmark documents to HTML and LaTeX")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(config_arg())
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .global(true)
                .help("Log level when RUST_LOG is not set (e.g. 'debug', 'warn')"),
        )
        .subcommand(
            Command::new("build")
                .about("Compile a document")
                .arg(
                    Arg::new("input")
                        .help("Root document")
                        .required(true)
                        .index(1),
                )
                .arg(
                    Arg::new("html-dir")
                        .long("html-dir")
                        .help("Directory for the HTML pages")
                        .default_value("html"),
                )
                .arg(
                    Arg::new("tex")
                        .long("tex")
                        .help("LaTeX output file (default: <input stem>.tex)"),
                )
                .arg(
                    Arg::new("bib")
                        .long("bib")
                        .help("Bibliography database used to resolve citations"),
                )
                .arg(
                    Arg::new("footer")
                        .long("footer")
                        .help("HTML fragment appended to every page"),
                )
                .arg(
                    Arg::new("backend")
                        .long("backend")
                        .short('b')
                        .help("Which outputs to produce")
                        .value_parser(["html", "tex", "both"])
                        .default_value("both"),
                ),
        )
        .subcommand(
            Command::new("inspect")
                .about("Print the sections, figures, webpages and metadata as JSON")
                .arg(
                    Arg::new("input")
                        .help("Root document")
                        .required(true)
                        .index(1),
                ),
        )
        .subcommand(Command::new("list-commands").about("List the markup commands"))
        .get_matches();

    match matches.subcommand() {
        Some(("build", build_matches)) => {
            let settings = load_settings(&matches);
            handle_build_command(&settings, build_matches);
        }
        Some(("inspect", inspect_matches)) => {
            let settings = load_settings(&matches);
            let input = inspect_matches.get_one::<String>("input").unwrap();
            handle_inspect_command(&settings, input);
        }
        Some(("list-commands", _)) => {
            handle_list_commands_command();
        }
        _ => unreachable!(),
    }
}

/// Load settings and install the log subscriber
fn load_settings(matches: &ArgMatches) -> Settings {
    let mut loader = Loader::new();
    loader = match matches.get_one::<String>("config") {
        Some(path) => loader.with_file(path),
        None => loader.with_optional_file("starmark.toml"),
    };
    if let Some(level) = matches.get_one::<String>("log-level") {
        loader = loader
            .set_override("logging.level", level.as_str())
            .unwrap_or_else(|e| {
                eprintln!("Configuration error: {}", e);
                std::process::exit(1);
            });
    }
    let settings = loader.build().unwrap_or_else(|e| {
        eprintln!("Configuration error: {}", e);
        std::process::exit(1);
    });

    if let Err(e) = telemetry::init(&settings.logging) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
    settings
}

/// Handle the build command
fn handle_build_command(settings: &Settings, matches: &ArgMatches) {
    let input = PathBuf::from(matches.get_one::<String>("input").unwrap());
    let html_dir = PathBuf::from(matches.get_one::<String>("html-dir").unwrap());
    let tex_path = matches
        .get_one::<String>("tex")
        .map(PathBuf::from)
        .unwrap_or_else(|| default_tex_path(&input));

    let backends = match matches.get_one::<String>("backend").map(String::as_str) {
        Some("html") => vec![BackendKind::Hypertext],
        Some("tex") => vec![BackendKind::Typesetting],
        _ => vec![BackendKind::Hypertext, BackendKind::Typesetting],
    };

    let footer = matches.get_one::<String>("footer").map(|path| {
        std::fs::read_to_string(path).unwrap_or_else(|e| {
            eprintln!("Error reading footer {}: {}", path, e);
            std::process::exit(1);
        })
    });

    let tex_name = tex_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document.tex".to_string());
    let tex_dir = match tex_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };

    let options = Options {
        backends,
        bibliography: matches.get_one::<String>("bib").map(PathBuf::from),
        footer,
        tex_name,
    };

    let sources = FileSources;
    let compilation = Compiler::new(settings, &sources)
        .compile(&input, &options)
        .unwrap_or_else(|e| {
            eprintln!("Compilation error: {}", e);
            std::process::exit(1);
        });

    let written = compilation
        .write_to(&html_dir, &tex_dir)
        .unwrap_or_else(|e| {
            eprintln!("Error writing output: {}", e);
            std::process::exit(1);
        });

    for path in &written {
        println!("{}", path.display());
    }
    if !compilation.diagnostics.is_empty() {
        eprintln!("{} warning(s):", compilation.diagnostics.len());
        for warning in compilation.diagnostics.warnings() {
            eprintln!("  {}", warning);
        }
    }
}

fn default_tex_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    PathBuf::from(format!("{stem}.tex"))
}

/// Handle the inspect command
fn handle_inspect_command(settings: &Settings, input: &str) {
    let sources = FileSources;
    let context = Compiler::new(settings, &sources)
        .prepare(Path::new(input))
        .unwrap_or_else(|e| {
            eprintln!("Compilation error: {}", e);
            std::process::exit(1);
        });

    match serde_json::to_string_pretty(&context) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

/// Handle the list-commands command
fn handle_list_commands_command() {
    println!("Available markup commands:\n");
    for name in Markup::names() {
        let command = Markup::lookup(name);
        let kind = match command {
            Some(command) if command.literal().is_some() => "literal",
            Some(command) if command.is_block() => "block",
            Some(command) if command.is_inline() => "inline",
            _ => "structure",
        };
        println!("  *{}*  ({})", name, kind);
    }
}
