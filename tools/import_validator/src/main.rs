use clap::{Parser, ValueEnum};
use import_validator_core::report::{sha256_file, ValidationReport};
use import_validator_core::{ImportValidationError, ValidateError, Validator, ValidatorConfig};
use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;
use tracing::error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    Text,
    Json,
    Csv,
}

/// Checks a bulk-import archive offline before it is uploaded.
#[derive(Debug, Parser)]
#[command(name = "import_validator", version)]
struct Args {
    /// Path to the import archive (.zip)
    archive: PathBuf,

    /// Team assumed to exist on the target server (repeatable)
    #[arg(long = "inject-team", value_name = "NAME")]
    inject_teams: Vec<String>,

    /// Stop at the first defect
    #[arg(long)]
    fail_fast: bool,

    /// Stop once this many defects were found
    #[arg(long, value_name = "N")]
    max_errors: Option<usize>,

    #[arg(long, value_enum, default_value = "text")]
    format: Format,

    /// Progress line interval in manifest lines (0 disables)
    #[arg(long, default_value_t = 10_000)]
    progress_interval: u64,
}

fn main() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "import_validator=info,import_validator_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    match run(&args) {
        Ok(true) => std::process::exit(0),
        Ok(false) => std::process::exit(1),
        Err(e) => {
            error!("validator error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Returns whether the archive passed.
fn run(args: &Args) -> anyhow::Result<bool> {
    let config = ValidatorConfig {
        progress_interval: args.progress_interval,
        injected_teams: args.inject_teams.clone(),
        ..ValidatorConfig::default()
    };
    let mut validator = Validator::with_config(&args.archive, config);

    let found: Rc<RefCell<Vec<ImportValidationError>>> = Rc::new(RefCell::new(Vec::new()));
    if !args.fail_fast {
        let sink = Rc::clone(&found);
        let max_errors = args.max_errors;
        validator.on_error(move |e| {
            let mut errors = sink.borrow_mut();
            errors.push(e);
            match max_errors {
                Some(max) if errors.len() >= max => Err(ValidateError::Aborted(format!(
                    "reached the limit of {} errors",
                    max
                ))),
                _ => Ok(()),
            }
        });
    }

    match validator.validate() {
        Ok(()) => {}
        Err(ValidateError::Invalid(e)) => found.borrow_mut().push(*e),
        Err(ValidateError::Aborted(reason)) => error!("{}", reason),
        Err(e) => return Err(e.into()),
    }

    let sha256 = sha256_file(&args.archive)?;
    let errors = found.take();
    let report = ValidationReport::from_validator(&validator, sha256, &errors);
    match args.format {
        Format::Text => print!("{}", report.to_text()),
        Format::Json => println!("{}", report.to_json_pretty()?),
        Format::Csv => print!("{}", report.errors_csv()?),
    }
    Ok(report.passed())
}
