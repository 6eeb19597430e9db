use std::io::{BufRead, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use veza_bridge::{BufferSink, ConsoleSink, LoadOptions, ModuleSource, Session, SharedSink};

mod release;

pub const RUN_REPORT_SCHEMA_VERSION: &str = "veza.playground.run@0.1.0";

pub const ENV_PLAYGROUND_MODULE: &str = "VEZA_PLAYGROUND_MODULE";

#[derive(Parser, Debug)]
#[command(name = "veza-playground")]
#[command(about = "Drive the veza interpreter module from the terminal.", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one source file (or stdin) against a fresh interpreter context.
    Run(RunArgs),
    /// Read lines from stdin and run each against one persistent context.
    Repl(ModuleArgs),
    /// Print the release-asset download URL matching this machine.
    DownloadUrl(release::DownloadUrlArgs),
}

#[derive(Args, Debug)]
struct ModuleArgs {
    /// Path or URL of the guest interpreter module. Falls back to
    /// VEZA_PLAYGROUND_MODULE.
    #[arg(long)]
    module: Option<String>,

    /// Hex SHA-256 the fetched module must hash to.
    #[arg(long)]
    expect_sha256: Option<String>,
}

impl ModuleArgs {
    fn resolve(&self) -> Result<(ModuleSource, LoadOptions)> {
        let arg = match &self.module {
            Some(arg) => arg.clone(),
            None => std::env::var(ENV_PLAYGROUND_MODULE).map_err(|_| {
                anyhow::anyhow!("no module given: pass --module or set {ENV_PLAYGROUND_MODULE}")
            })?,
        };
        let options = LoadOptions {
            expected_sha256: self.expect_sha256.clone(),
        };
        Ok((ModuleSource::from_arg(&arg), options))
    }
}

#[derive(Args, Debug)]
struct RunArgs {
    #[command(flatten)]
    module: ModuleArgs,

    /// Source file; `-` reads stdin.
    source: PathBuf,

    /// Emit a JSON run report on stdout instead of streaming output.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Serialize)]
struct RunReport {
    schema_version: &'static str,
    ok: bool,
    output: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn main() -> ExitCode {
    match real_main() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

fn real_main() -> Result<ExitCode> {
    let cli = Cli::parse();
    match cli.command {
        Command::Run(args) => cmd_run(args),
        Command::Repl(args) => cmd_repl(args),
        Command::DownloadUrl(args) => release::cmd_download_url(args),
    }
}

fn read_source(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("read stdin")?;
        Ok(buf)
    } else {
        std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))
    }
}

fn cmd_run(args: RunArgs) -> Result<ExitCode> {
    let (source, options) = args.module.resolve()?;
    let text = read_source(&args.source)?;

    if args.json {
        let sink = BufferSink::shared();
        let shared: SharedSink = sink.clone();
        let mut session = Session::bootstrap(&source, &options, shared)?;
        let result = session.run(&text);
        let report = RunReport {
            schema_version: RUN_REPORT_SCHEMA_VERSION,
            ok: result.is_ok(),
            output: sink.borrow().text().to_string(),
            error: result.err().map(|e| e.to_string()),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(if report.ok {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        });
    }

    let mut session = Session::bootstrap(&source, &options, ConsoleSink::shared())?;
    session.run(&text)?;
    Ok(ExitCode::SUCCESS)
}

fn cmd_repl(args: ModuleArgs) -> Result<ExitCode> {
    let (source, options) = args.resolve()?;
    // Bootstrap is the only slow step; the prompt appears once the module
    // is instantiated and the persistent context exists.
    let mut session = Session::bootstrap(&source, &options, ConsoleSink::shared())?;
    eprintln!("veza repl: one submission per line, :clear resets output, :quit exits");

    let stdin = std::io::stdin();
    let mut line = String::new();
    loop {
        eprint!("veza> ");
        line.clear();
        if stdin.lock().read_line(&mut line).context("read stdin")? == 0 {
            return Ok(ExitCode::SUCCESS);
        }
        let submission = line.trim_end_matches(['\r', '\n']);
        match submission {
            ":quit" => return Ok(ExitCode::SUCCESS),
            ":clear" => session.clear_output(),
            _ => {
                if let Err(err) = session.run(submission) {
                    eprintln!("{err}");
                    if session.faulted() {
                        anyhow::bail!("interpreter state is unrecoverable; restart the repl");
                    }
                }
                println!();
            }
        }
    }
}
