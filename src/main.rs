use std::path::PathBuf;

use clap::Parser;

use jestrel::config::{self, ExtraArgs, ReportPolicy, RunSettings};
use jestrel::runner::Runner;

#[derive(Debug, Parser)]
#[command(
    name = "jestrel",
    version,
    about = "Runs jest once on the given paths and reports the result"
)]
struct Cli {
    /// Test file paths handed to jest; empty means the configured default set.
    paths: Vec<String>,

    /// Jest executable to invoke.
    #[arg(long)]
    command: Option<String>,

    /// Extra jest arguments, shell-quoted as one string.
    #[arg(long = "cli-args")]
    cli_args: Option<String>,

    /// When to send a desktop notification.
    #[arg(long, value_enum)]
    notification: Option<PolicyArg>,

    /// When to print jest's own output.
    #[arg(long = "print-result", value_enum)]
    print_result: Option<PolicyArg>,

    /// Kill the jest process after this many milliseconds.
    #[arg(long = "timeout-ms")]
    timeout_ms: Option<u64>,

    /// More jestrel diagnostics.
    #[arg(long)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum PolicyArg {
    Never,
    OnFailure,
    Always,
}

impl From<PolicyArg> for ReportPolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Never => ReportPolicy::Never,
            PolicyArg::OnFailure => ReportPolicy::OnFailure,
            PolicyArg::Always => ReportPolicy::Always,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    std::process::exit(run(cli));
}

fn run(cli: Cli) -> i32 {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let project_root = config::find_project_root(&cwd);

    let file_config = match config::load_config(&project_root) {
        Ok(cfg) => cfg,
        Err(err) => {
            eprintln!("jestrel: {err}");
            return 2;
        }
    };

    let mut settings = RunSettings::from_config(&project_root, &file_config);
    if let Some(command) = cli.command {
        settings.command = command;
    }
    if let Some(raw) = cli.cli_args {
        settings.cli = Some(ExtraArgs::Shell(raw));
    }
    if let Some(policy) = cli.notification {
        settings.notification = policy.into();
    }
    if let Some(policy) = cli.print_result {
        settings.print_result = policy.into();
    }
    if let Some(timeout_ms) = cli.timeout_ms {
        settings.timeout_ms = Some(timeout_ms);
    }
    settings.verbose = settings.verbose || cli.verbose;

    if settings.verbose {
        eprintln!(
            "jestrel: project_root={} command={}",
            settings.project_root.display(),
            settings.command
        );
    }

    match Runner::new(settings).run(&cli.paths) {
        Ok(completed) => {
            match completed.summary_text() {
                Ok(summary) => println!("{summary}"),
                Err(err) => eprintln!("jestrel: {err}"),
            }
            if completed.passed() {
                0
            } else {
                if let Ok(failed) = completed.failed_paths() {
                    failed
                        .iter()
                        .for_each(|path| eprintln!("jestrel: failed: {path}"));
                }
                1
            }
        }
        Err(err) => {
            eprintln!("jestrel: {err}");
            2
        }
    }
}
