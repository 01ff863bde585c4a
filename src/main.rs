//! wiretree CLI entry point.

use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use wiretree::cli::{Args, OutputFormatter, Repl, ReplCommand, ReplInput, Session};
use wiretree::Converter;

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Set up logging
    let filter = match args.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with_writer(io::stderr)
        .init();

    let traffic_file = args
        .file
        .clone()
        .context("Traffic file required. Use --help for usage.")?;

    let converter = Converter::with_config(args.converter_config());
    let mut session = Session::new(converter, OutputFormatter::new(args.format));
    if let Some(filter) = &args.filter {
        session = session.with_filter(filter)?;
    }

    let loaded = session.load(&traffic_file)?;
    tracing::info!(messages = loaded, file = %traffic_file.display(), "loaded traffic file");

    if !args.is_interactive() {
        let mut stdout = io::stdout().lock();
        if args.tree {
            session.print_trees(&mut stdout)?;
        }
        session.run_paths(&args.paths, &mut stdout)?;
        return Ok(());
    }

    run_repl(&session, &traffic_file)
}

fn run_repl(session: &Session, traffic_file: &Path) -> Result<()> {
    let history_path = std::env::var_os("HOME")
        .map(|home| PathBuf::from(home).join(".wiretree_history"))
        .unwrap_or_else(|| PathBuf::from(".wiretree_history"));

    let mut repl = Repl::new()?.with_history(history_path.to_str().unwrap_or(".wiretree_history"));

    println!("wiretree - Query decoded HTTP traffic");
    println!(
        "Loaded: {} ({} messages)",
        traffic_file.display(),
        session.converter().history().len()
    );
    println!("Type .help for help, .quit to exit");
    println!();

    let mut stdout = io::stdout();
    loop {
        match repl.read_input()? {
            ReplInput::Exit => {
                println!("Goodbye!");
                break;
            }
            ReplInput::Command(cmd) => {
                let result = match cmd {
                    ReplCommand::Empty => continue,
                    ReplCommand::Quit => {
                        println!("Goodbye!");
                        break;
                    }
                    ReplCommand::Help => {
                        print_help();
                        Ok(())
                    }
                    ReplCommand::Messages => session.print_messages(&mut stdout),
                    ReplCommand::Tree(number) => session.print_tree(number, &mut stdout).map(|found| {
                        if !found {
                            eprintln!("No message #{number} in history");
                        }
                    }),
                    ReplCommand::Keys => session.print_keys(&mut stdout),
                    ReplCommand::Stats => session.print_stats(&mut stdout),
                    ReplCommand::Path(expression) => session.run_paths(&[expression], &mut stdout).map(|count| {
                        if count == 0 {
                            println!("(no matches)");
                        }
                    }),
                    ReplCommand::Unknown(s) => {
                        eprintln!("Unknown command: {s}");
                        eprintln!("Type .help for available commands");
                        Ok(())
                    }
                };
                if let Err(e) = result {
                    eprintln!("Error: {e:#}");
                }
            }
        }
    }

    Ok(())
}

fn print_help() {
    println!("Commands:");
    println!("  .help      Show this help");
    println!("  .messages  List loaded messages");
    println!("  .tree N    Print the decoded tree of message N");
    println!("  .keys      List registered keys");
    println!("  .stats     Show history and predicate cache statistics");
    println!("  .quit      Exit");
    println!();
    println!("Anything else is evaluated as a path against every message, e.g.");
    println!("  $.header.Content-Type");
    println!("  $.body..access_token");
    println!("  $.header[?(key =~ 'X-.*')]");
}
