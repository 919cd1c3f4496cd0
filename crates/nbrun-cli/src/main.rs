//! nbrun CLI - run script-formatted notebooks cell by cell
//!
//! A command-line front end for percent-format (`# %%`) notebook scripts:
//! run the cell under a line, convert between script/ipynb/HTML, inspect
//! cell layout, and list discoverable Jupyter kernels.

use anyhow::{bail, Context, Result};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use colored::Colorize;
use nbrun_core::{
    parse_script, read_ipynb, traceback, write_ipynb, write_script, CellType, HtmlOptions,
    HtmlSerializer, Notebook, OutputType, Surjection,
};
use nbrun_kernel::{list_connection_files, CellExecutor, ExecuteRequest, LocalPythonExecutor};
use serde::Deserialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Verbosity level for output control
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verbosity {
    /// Suppress all output except errors
    Quiet,
    /// Normal output (default)
    Normal,
    /// Verbose output with extra details
    Verbose,
}

impl Verbosity {
    /// Create from CLI flags
    const fn from_flags(quiet: bool, verbose: bool) -> Self {
        if quiet {
            Self::Quiet
        } else if verbose {
            Self::Verbose
        } else {
            Self::Normal
        }
    }
}

/// Configuration file (`.nbrun.toml`) contents.
///
/// A project file in the working directory overrides the user file under
/// the platform config dir, field by field.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct Config {
    /// Default settings for the run command
    run: RunConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct RunConfig {
    /// Default HTML output path
    html: Option<PathBuf>,
    /// Default execution timeout in seconds
    timeout: Option<u64>,
    /// Interpreter for the local executor
    python: Option<String>,
}

impl Config {
    fn discover() -> Self {
        let user = dirs::config_dir()
            .map(|d| d.join("nbrun").join("config.toml"))
            .and_then(|p| Self::load(&p));
        let project = Self::load(Path::new(".nbrun.toml"));
        Self::merge(user, project)
    }

    fn load(path: &Path) -> Option<Self> {
        let content = fs::read_to_string(path).ok()?;
        match toml::from_str(&content) {
            Ok(config) => Some(config),
            Err(e) => {
                log::warn!("ignoring malformed config {}: {e}", path.display());
                None
            }
        }
    }

    fn merge(user: Option<Self>, project: Option<Self>) -> Self {
        let user = user.unwrap_or_default();
        let project = project.unwrap_or_default();
        Self {
            run: RunConfig {
                html: project.run.html.or(user.run.html),
                timeout: project.run.timeout.or(user.run.timeout),
                python: project.run.python.or(user.run.python),
            },
        }
    }
}

/// Output format for the convert command
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// Standalone HTML page
    Html,
    /// Jupyter notebook (nbformat 4.5)
    Ipynb,
    /// Percent-format script
    Script,
}

/// Generate an output path from the input file and format
/// (e.g. "analysis.py" + Html -> "analysis.html").
fn smart_output_path(input: &Path, format: OutputFormat) -> PathBuf {
    let stem = input.file_stem().unwrap_or_default();
    let ext = match format {
        OutputFormat::Html => "html",
        OutputFormat::Ipynb => "ipynb",
        OutputFormat::Script => "py",
    };
    input.with_file_name(format!("{}.{}", stem.to_string_lossy(), ext))
}

#[derive(Parser)]
#[command(
    name = "nbrun",
    version,
    about = "Run script-formatted notebooks cell by cell",
    long_about = "Run percent-format (# %%) notebook scripts cell by cell, with\n\
                  results rendered as HTML and error tracebacks mapped back to\n\
                  script lines.\n\
                  \n\
                  Defaults can be set via a .nbrun.toml configuration file."
)]
struct Args {
    #[command(subcommand)]
    command: Commands,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Verbose output with extra details
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the cell under a given line and export the notebook as HTML
    #[command(long_about = "Run the cell under a given line.\n\
                      \n\
                      The script is parsed into cells, the line is reconciled with\n\
                      cell coordinates, and the cell (plus the code cells before it)\n\
                      is executed. Error tracebacks are printed as quickfix lines\n\
                      with script line numbers; the executed notebook is written as\n\
                      an HTML page that live-reloads in a browser.")]
    Run {
        /// Input script path
        #[arg(value_name = "SCRIPT")]
        input: PathBuf,

        /// 1-based line number the cursor is on
        #[arg(short, long, value_name = "N")]
        line: usize,

        /// HTML output path (default: from config, or nbrun.html in the temp dir)
        #[arg(long, value_name = "PATH")]
        html: Option<PathBuf>,

        /// Skip the HTML export
        #[arg(long, conflicts_with = "html")]
        no_html: bool,

        /// Execution timeout in seconds
        #[arg(short, long, value_name = "SECS")]
        timeout: Option<u64>,

        /// Interpreter to execute cells with (default: python3)
        #[arg(long, value_name = "PROGRAM")]
        python: Option<String>,
    },

    /// Convert a script to HTML, ipynb, or back to a script
    Convert {
        /// Input path (.py script or .ipynb notebook)
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// Output file path (default: auto-generated from input)
        #[arg(short, long, value_name = "OUTPUT")]
        output: Option<PathBuf>,

        /// Output format
        #[arg(short = 't', long = "to", value_enum, default_value = "html")]
        format: OutputFormat,

        /// Overwrite an existing output file
        #[arg(long)]
        force: bool,
    },

    /// Show the cell layout of a script
    Info {
        /// Input script path
        #[arg(value_name = "SCRIPT")]
        input: PathBuf,
    },

    /// List running kernels discoverable in the Jupyter runtime directory
    Kernels,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let config = Config::discover();
    let args = Args::parse();
    let verbosity = Verbosity::from_flags(args.quiet, args.verbose);

    match args.command {
        Commands::Run {
            input,
            line,
            html,
            no_html,
            timeout,
            python,
        } => cmd_run(
            &input,
            line,
            html,
            no_html,
            timeout,
            python,
            &config,
            verbosity,
        ),
        Commands::Convert {
            input,
            output,
            format,
            force,
        } => cmd_convert(&input, output, format, force, verbosity),
        Commands::Info { input } => cmd_info(&input),
        Commands::Kernels => cmd_kernels(),
        Commands::Completions { shell } => {
            generate(shell, &mut Args::command(), "nbrun", &mut io::stdout());
            Ok(())
        }
    }
}

/// Read a script or ipynb input into the core model.
fn load_notebook(input: &Path) -> Result<Notebook> {
    if input.extension().is_some_and(|e| e == "ipynb") {
        read_ipynb(input).with_context(|| format!("failed to read {}", input.display()))
    } else {
        let text = fs::read_to_string(input)
            .with_context(|| format!("failed to read {}", input.display()))?;
        Ok(parse_script(&text))
    }
}

#[allow(clippy::too_many_arguments)]
fn cmd_run(
    input: &Path,
    line: usize,
    html: Option<PathBuf>,
    no_html: bool,
    timeout: Option<u64>,
    python: Option<String>,
    config: &Config,
    verbosity: Verbosity,
) -> Result<()> {
    if line == 0 {
        bail!("line numbers are 1-based");
    }
    let text =
        fs::read_to_string(input).with_context(|| format!("failed to read {}", input.display()))?;
    let mut notebook = parse_script(&text);
    let lines: Vec<&str> = text.lines().collect();
    let surjection = Surjection::map(&lines, &notebook.cells)
        .context("buffer and parsed cells disagree; is the script well-formed?")?;

    let Some(hit) = surjection.cell_at(line - 1) else {
        bail!("current line is out of cell");
    };
    let current = hit.cell;
    if notebook.cells[current].cell_type != CellType::Code {
        bail!(
            "cell {} is a {} cell, nothing to execute",
            current,
            notebook.cells[current].cell_type
        );
    }

    let prefix: Vec<(usize, String)> = notebook
        .code_prefix(current)
        .into_iter()
        .map(|(i, s)| (i, s.to_string()))
        .collect();
    let mut request = ExecuteRequest::new(prefix);
    if let Some(secs) = timeout.or(config.run.timeout) {
        request = request.with_timeout(Duration::from_secs(secs));
    }

    let interpreter = python
        .or_else(|| config.run.python.clone())
        .unwrap_or_else(|| "python3".to_string());
    let mut executor = LocalPythonExecutor::with_interpreter(&interpreter);

    if verbosity == Verbosity::Verbose {
        eprintln!(
            "{} cell {} ({} code cells in prefix) via {}",
            "Running".green().bold(),
            current,
            request.cells.len(),
            interpreter
        );
    }

    notebook.cells[current].outputs = executor
        .execute(&request)
        .with_context(|| format!("failed to execute cell {current}"))?;
    notebook.cells[current].execution_count = Some(1);

    let file_name = input.to_string_lossy();
    let mut failed = false;
    for output in &notebook.cells[current].outputs {
        match output.output_type {
            OutputType::Stream => {
                if let Some(text) = &output.text {
                    print!("{text}");
                }
            }
            OutputType::ExecuteResult | OutputType::DisplayData => {
                if let Some(text) = &output.text {
                    println!("{text}");
                }
            }
            OutputType::Error => {
                failed = true;
                let header = format!(
                    "{}: {}",
                    output.ename.as_deref().unwrap_or("Error"),
                    output.evalue.as_deref().unwrap_or_default()
                );
                eprintln!("{}", header.red().bold());
                for qf in traceback::remap_traceback(
                    &output.traceback,
                    &surjection,
                    current,
                    &file_name,
                ) {
                    eprintln!("{qf}");
                }
            }
        }
    }

    if !no_html {
        let path = html
            .or_else(|| config.run.html.clone())
            .unwrap_or_else(|| std::env::temp_dir().join("nbrun.html"));
        let options = HtmlOptions {
            title: input
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned()),
            ..HtmlOptions::live()
        };
        let page = HtmlSerializer::with_options(options).serialize(&notebook);
        fs::write(&path, page)
            .with_context(|| format!("failed to write {}", path.display()))?;
        if verbosity != Verbosity::Quiet {
            eprintln!("{} {}", "Wrote".green().bold(), path.display());
        }
    }

    if failed {
        std::process::exit(1);
    }
    Ok(())
}

fn cmd_convert(
    input: &Path,
    output: Option<PathBuf>,
    format: OutputFormat,
    force: bool,
    verbosity: Verbosity,
) -> Result<()> {
    let notebook = load_notebook(input)?;
    let output = output.unwrap_or_else(|| smart_output_path(input, format));
    if output.exists() && !force {
        bail!(
            "{} already exists (use --force to overwrite)",
            output.display()
        );
    }

    match format {
        OutputFormat::Html => {
            let options = HtmlOptions {
                title: input
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned()),
                include_styles: true,
                ..HtmlOptions::default()
            };
            let page = HtmlSerializer::with_options(options).serialize(&notebook);
            fs::write(&output, page)?;
        }
        OutputFormat::Ipynb => write_ipynb(&output, &notebook)?,
        OutputFormat::Script => fs::write(&output, write_script(&notebook))?,
    }

    if verbosity != Verbosity::Quiet {
        eprintln!(
            "{} {} -> {}",
            "Converted".green().bold(),
            input.display(),
            output.display()
        );
    }
    Ok(())
}

fn cmd_info(input: &Path) -> Result<()> {
    let text =
        fs::read_to_string(input).with_context(|| format!("failed to read {}", input.display()))?;
    let notebook = parse_script(&text);
    let lines: Vec<&str> = text.lines().collect();
    let surjection = Surjection::map(&lines, &notebook.cells)?;

    println!(
        "{}: {} cells, {} lines",
        input.display().to_string().bold(),
        notebook.cells.len(),
        lines.len()
    );
    println!(
        "{:<6} {:<10} {:<10} {}",
        "Cell".bold(),
        "Type".bold(),
        "Lines".bold(),
        "Title".bold()
    );
    for (i, cell) in notebook.cells.iter().enumerate() {
        let span = match surjection.cell_span(i) {
            Some((first, last)) => format!("{}-{}", first + 1, last + 1),
            None => "-".to_string(),
        };
        println!(
            "{i:<6} {:<10} {span:<10} {}",
            cell.cell_type.to_string(),
            cell.title.as_deref().unwrap_or("")
        );
    }
    Ok(())
}

fn cmd_kernels() -> Result<()> {
    let entries = list_connection_files().context("failed to scan the Jupyter runtime dir")?;
    if entries.is_empty() {
        println!("No running kernels found.");
        return Ok(());
    }
    for entry in entries {
        let started = entry
            .created
            .map(|t| t.format("%m/%d %H:%M").to_string())
            .unwrap_or_else(|| "unknown".to_string());
        println!("{}  {}", entry.id.green(), started.dimmed());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_smart_output_path() {
        let input = Path::new("/work/analysis.py");
        assert_eq!(
            smart_output_path(input, OutputFormat::Html),
            Path::new("/work/analysis.html")
        );
        assert_eq!(
            smart_output_path(input, OutputFormat::Ipynb),
            Path::new("/work/analysis.ipynb")
        );
        assert_eq!(
            smart_output_path(Path::new("nb.ipynb"), OutputFormat::Script),
            Path::new("nb.py")
        );
    }

    #[test]
    fn test_verbosity_from_flags() {
        assert_eq!(Verbosity::from_flags(true, false), Verbosity::Quiet);
        assert_eq!(Verbosity::from_flags(false, true), Verbosity::Verbose);
        assert_eq!(Verbosity::from_flags(false, false), Verbosity::Normal);
    }

    #[test]
    fn test_config_merge_project_wins() {
        let user = Config {
            run: RunConfig {
                html: Some(PathBuf::from("/tmp/user.html")),
                timeout: Some(30),
                python: None,
            },
        };
        let project = Config {
            run: RunConfig {
                html: Some(PathBuf::from("out.html")),
                timeout: None,
                python: Some("python3.12".to_string()),
            },
        };
        let merged = Config::merge(Some(user), Some(project));
        assert_eq!(merged.run.html, Some(PathBuf::from("out.html")));
        assert_eq!(merged.run.timeout, Some(30));
        assert_eq!(merged.run.python.as_deref(), Some("python3.12"));
    }

    #[test]
    fn test_config_parse() {
        let config: Config =
            toml::from_str("[run]\nhtml = \"/tmp/nb.html\"\ntimeout = 10\n").unwrap();
        assert_eq!(config.run.html, Some(PathBuf::from("/tmp/nb.html")));
        assert_eq!(config.run.timeout, Some(10));
        assert_eq!(config.run.python, None);
    }
}
