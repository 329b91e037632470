use asyncapi_converter::document::serialize_input;
use asyncapi_converter::version::POSTMAN_TARGET_VERSIONS;
use asyncapi_converter::{
    convert, convert_openapi, convert_postman, latest_version, ConvertError, ConvertOptions,
    DocumentFamily, Input, Perspective, PointOfView,
};
use clap::{Parser, ValueEnum};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use thiserror::Error;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "asyncapi-converter")]
#[command(about = "Convert AsyncAPI documents between versions, and OpenAPI or Postman documents to AsyncAPI")]
#[command(version)]
struct Args {
    /// Path to the AsyncAPI, OpenAPI or Postman document
    document: PathBuf,

    /// Target AsyncAPI version (defaults to the latest supported version)
    #[arg(id = "target_version", value_name = "VERSION")]
    version: Option<String>,

    /// Application id to set on the converted document
    #[arg(long, value_name = "ID")]
    id: Option<String>,

    /// Side the v2 publish/subscribe operations are read from
    #[arg(long, value_enum, value_name = "VIEW")]
    point_of_view: Option<PointOfViewArg>,

    /// Side OpenAPI and Postman operations are described from
    #[arg(long, value_enum, value_name = "SIDE")]
    perspective: Option<PerspectiveArg>,

    /// YAML or JSON file with conversion options
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Write the converted document here instead of stdout
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Log every conversion step
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum PointOfViewArg {
    Application,
    Client,
}

impl From<PointOfViewArg> for PointOfView {
    fn from(arg: PointOfViewArg) -> Self {
        match arg {
            PointOfViewArg::Application => PointOfView::Application,
            PointOfViewArg::Client => PointOfView::Client,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum PerspectiveArg {
    Client,
    Server,
}

impl From<PerspectiveArg> for Perspective {
    fn from(arg: PerspectiveArg) -> Self {
        match arg {
            PerspectiveArg::Client => Perspective::Client,
            PerspectiveArg::Server => Perspective::Server,
        }
    }
}

#[derive(Debug, Error)]
enum CliError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config file {path}: {reason}")]
    Config { path: PathBuf, reason: String },

    #[error(transparent)]
    Convert(#[from] ConvertError),
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.verbose);

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {}", err);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(args: &Args) -> Result<(), CliError> {
    let options = load_options(args)?;
    let text = fs::read_to_string(&args.document).map_err(|source| CliError::Read {
        path: args.document.clone(),
        source,
    })?;

    let family = DocumentFamily::detect(&serialize_input(Input::Text(&text))?.document);
    debug!(document = %args.document.display(), family = %family, "detected document family");

    let output = match family {
        DocumentFamily::OpenApi(_) => convert_openapi(Input::Text(&text), &options)?,
        DocumentFamily::Postman(_) => {
            let target = args
                .version
                .clone()
                .unwrap_or_else(|| POSTMAN_TARGET_VERSIONS[0].to_string());
            convert_postman(Input::Text(&text), &target, &options)?
        }
        DocumentFamily::AsyncApi(_) | DocumentFamily::Unknown => {
            let target = args.version.clone().unwrap_or_else(latest_version);
            convert(Input::Text(&text), &target, &options)?
        }
    };

    let mut rendered = output.to_string();
    if !rendered.ends_with('\n') {
        rendered.push('\n');
    }
    match &args.output {
        Some(path) => fs::write(path, rendered).map_err(|source| CliError::Write {
            path: path.clone(),
            source,
        })?,
        None => print!("{}", rendered),
    }
    Ok(())
}

/// Defaults, overridden by the config file, overridden by flags.
fn load_options(args: &Args) -> Result<ConvertOptions, CliError> {
    let mut options = match &args.config {
        Some(path) => read_config(path)?,
        None => ConvertOptions::default(),
    };
    if let Some(id) = &args.id {
        options = options.with_id(id.clone());
    }
    if let Some(point_of_view) = args.point_of_view {
        options = options.with_point_of_view(point_of_view.into());
    }
    if let Some(perspective) = args.perspective {
        options = options.with_perspective(perspective.into());
    }
    Ok(options)
}

fn read_config(path: &Path) -> Result<ConvertOptions, CliError> {
    let text = fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    if text.trim().is_empty() {
        return Ok(ConvertOptions::default());
    }
    serde_yaml::from_str(&text).map_err(|err| CliError::Config {
        path: path.to_path_buf(),
        reason: err.to_string(),
    })
}
