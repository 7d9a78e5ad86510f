//! deckforge command line.
//!
//! Compiles OpenAPI 3.x documents into Kong declarative configuration.

mod logging;

use std::fs;
use std::io::{self, Read, Write};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand, ValueEnum};
use deckforge_compiler::{compile, CompileOptions, DeclarativeConfig};
use tracing::debug;
use uuid::Uuid;

use logging::{init_logging, LogFormat};

#[derive(Parser, Debug)]
#[command(
    name = "deckforge",
    about = "Compile OpenAPI documents into Kong declarative configuration",
    version
)]
struct Cli {
    /// Log level (RUST_LOG takes precedence).
    #[arg(long, global = true, default_value = "warn", env = "DECKFORGE_LOG_LEVEL")]
    log_level: String,

    /// Log format (json or pretty).
    #[arg(
        long,
        global = true,
        default_value = "pretty",
        env = "DECKFORGE_LOG_FORMAT",
        value_parser = parse_log_format
    )]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compile an OpenAPI document into declarative configuration.
    Compile {
        /// Input document (YAML or JSON), or "-" for stdin.
        #[arg(short, long)]
        spec: String,

        /// Output file, or "-" for stdout.
        #[arg(short, long, default_value = "-")]
        output: String,

        /// Output format.
        #[arg(long, value_enum, default_value_t = OutputFormat::Yaml)]
        format: OutputFormat,

        #[command(flatten)]
        options: OptionArgs,
    },

    /// Check that an OpenAPI document compiles, without writing output.
    Validate {
        /// Input document (YAML or JSON), or "-" for stdin.
        #[arg(short, long)]
        spec: String,

        #[command(flatten)]
        options: OptionArgs,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Yaml,
    Json,
}

#[derive(Args, Debug)]
struct OptionArgs {
    /// Tag every entity with these tags instead of the document's x-kong-tags.
    #[arg(long = "select-tag", env = "DECKFORGE_SELECT_TAG", value_delimiter = ',')]
    select_tag: Vec<String>,

    /// Namespace UUID for identifier derivation.
    #[arg(long, env = "DECKFORGE_UUID_BASE")]
    uuid_base: Option<Uuid>,

    /// Base name of the document (defaults to x-kong-name, then info.title).
    #[arg(long, env = "DECKFORGE_DOC_NAME")]
    doc_name: Option<String>,

    /// Use Insomnia-compatible names.
    #[arg(long)]
    inso_compatible: bool,

    /// Do not generate entity ids.
    #[arg(long)]
    no_id: bool,

    /// Generate openid-connect plugins from security requirements.
    #[arg(long)]
    generate_security: bool,

    /// Keep the inherited configuration when a security requirement is unsupported.
    #[arg(long)]
    ignore_security_errors: bool,

    /// Accept circular schema references.
    #[arg(long)]
    ignore_circular_refs: bool,
}

impl OptionArgs {
    fn into_options(self) -> CompileOptions {
        let mut options = CompileOptions::new()
            .with_inso_compat(self.inso_compatible)
            .with_skip_id(self.no_id)
            .with_oidc(self.generate_security)
            .with_ignore_security_errors(self.ignore_security_errors)
            .with_ignore_circular_refs(self.ignore_circular_refs);
        if !self.select_tag.is_empty() {
            options = options.with_tags(self.select_tag);
        }
        if let Some(namespace) = self.uuid_base {
            options = options.with_uuid_namespace(namespace);
        }
        if let Some(name) = self.doc_name {
            options = options.with_doc_name(name);
        }
        options
    }
}

fn parse_log_format(s: &str) -> Result<LogFormat, String> {
    LogFormat::parse(s)
        .ok_or_else(|| format!("unknown log format '{}' (expected json or pretty)", s))
}

/// Read the input document from a file or stdin.
fn read_spec(spec: &str) -> Result<String, String> {
    if spec == "-" {
        let mut input = String::new();
        io::stdin()
            .read_to_string(&mut input)
            .map_err(|e| format!("failed to read stdin: {}", e))?;
        return Ok(input);
    }
    fs::read_to_string(spec).map_err(|e| format!("failed to read {}: {}", spec, e))
}

fn compile_spec(spec: &str, options: OptionArgs) -> Result<DeclarativeConfig, String> {
    let input = read_spec(spec)?;
    compile(&input, &options.into_options()).map_err(|e| format!("compilation failed: {}", e))
}

fn render(config: &DeclarativeConfig, format: OutputFormat) -> Result<String, String> {
    match format {
        OutputFormat::Yaml => serde_yaml::to_string(config).map_err(|e| e.to_string()),
        OutputFormat::Json => serde_json::to_string_pretty(config)
            .map(|mut json| {
                json.push('\n');
                json
            })
            .map_err(|e| e.to_string()),
    }
}

/// Run the compile command.
fn run_compile(spec: &str, output: &str, format: OutputFormat, options: OptionArgs) -> ExitCode {
    let result = compile_spec(spec, options).and_then(|config| {
        let rendered = render(&config, format)?;
        if output == "-" {
            io::stdout()
                .write_all(rendered.as_bytes())
                .map_err(|e| format!("failed to write stdout: {}", e))?;
        } else {
            fs::write(output, rendered).map_err(|e| format!("failed to write {}: {}", output, e))?;
        }
        debug!(output, routes = config.route_count(), "wrote declarative configuration");
        Ok(())
    });

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::from(1)
        }
    }
}

/// Run the validate command.
fn run_validate(spec: &str, options: OptionArgs) -> ExitCode {
    match compile_spec(spec, options) {
        Ok(config) => {
            eprintln!(
                "✓ {} compiles ({} services, {} routes)",
                spec,
                config.services.len(),
                config.route_count()
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("✗ {}", spec);
            eprintln!("error: {}", e);
            ExitCode::from(1)
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_logging(&cli.log_level, cli.log_format) {
        eprintln!("error: {}", e);
        return ExitCode::from(1);
    }

    match cli.command {
        Commands::Compile {
            spec,
            output,
            format,
            options,
        } => run_compile(&spec, &output, format, options),
        Commands::Validate { spec, options } => run_validate(&spec, options),
    }
}
