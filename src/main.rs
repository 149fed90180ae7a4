//! qrstyle command-line entrypoint

use clap::Parser;
use qrstyle::console::{self, ConsoleCommand};
use qrstyle::output::{self, Rendered};
use qrstyle::{
    ContentRequest, DataType, DirectorySink, Error, Field, QrStyleConfig, QrVerifier,
    RasterEngine, Result, Session, SessionOptions, logging, metrics,
};
use serde_json::{Value, json};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(
    name = "qrstyle",
    version,
    about = "Styled QR code generator with sized PNG downloads"
)]
struct Cli {
    /// Content to encode: URL or text, email address, or phone number
    content: Option<String>,

    /// Content type: url, text, email or phone
    #[arg(long = "type", value_name = "TYPE", default_value = "url")]
    data_type: String,

    /// Email subject (email type only)
    #[arg(long)]
    subject: Option<String>,

    /// Email body (email type only)
    #[arg(long)]
    body: Option<String>,

    /// Optional configuration file (toml/yaml). Defaults to qrstyle.{toml,yaml} in cwd/XDG config.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Module colour (#rgb, #rrggbb)
    #[arg(long, value_name = "HEX")]
    foreground: Option<String>,

    /// Background colour or `transparent`
    #[arg(long, value_name = "HEX")]
    background: Option<String>,

    /// Dot style: square, dots, rounded, extra-rounded, classy, classy-rounded
    #[arg(long, value_name = "STYLE")]
    dot_style: Option<String>,

    /// Corner square style: square, dot, extra-rounded
    #[arg(long, value_name = "STYLE")]
    corner_square_style: Option<String>,

    /// Corner dot style: square, dot
    #[arg(long, value_name = "STYLE")]
    corner_dot_style: Option<String>,

    /// Error correction level: L, M, Q or H
    #[arg(long, value_name = "LEVEL")]
    error_correction: Option<String>,

    /// Logo image composited at the centre
    #[arg(long, value_name = "PATH")]
    logo: Option<PathBuf>,

    /// Logo size relative to the code (0.10 - 0.60)
    #[arg(long, value_name = "FRACTION")]
    logo_size: Option<f32>,

    /// Download size in pixels (200 - 2000, step 50)
    #[arg(long, value_name = "PX")]
    size: Option<u32>,

    /// Directory downloads are written to
    #[arg(long, value_name = "DIR")]
    out_dir: Option<PathBuf>,

    /// Save the transparent-background variant instead of the opaque one
    #[arg(long, conflicts_with = "both")]
    transparent: bool,

    /// Save both the opaque and the transparent variant
    #[arg(long)]
    both: bool,

    /// Scan each saved file back and check it decodes to the payload
    #[arg(long)]
    verify: bool,

    /// Read line commands from stdin instead of generating once
    #[arg(long)]
    interactive: bool,

    /// Output results as formatted JSON instead of human-readable text
    #[arg(long)]
    json: bool,

    /// Enable metrics output regardless of configuration file settings
    #[arg(long)]
    metrics: bool,
}

struct OutputSink {
    json: bool,
}

impl OutputSink {
    fn emit(&self, rendered: &Rendered) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(&rendered.json)?);
        } else {
            for line in &rendered.human {
                println!("{line}");
            }
        }
        Ok(())
    }

    fn emit_all(&self, rendered: &[Rendered]) -> Result<()> {
        if self.json {
            let merged: serde_json::Map<String, Value> = rendered
                .iter()
                .filter_map(|r| r.json.as_object())
                .flat_map(|obj| obj.clone())
                .collect();
            println!("{}", serde_json::to_string_pretty(&Value::Object(merged))?);
            return Ok(());
        }
        for (index, item) in rendered.iter().enumerate() {
            if index > 0 {
                println!();
            }
            self.emit(item)?;
        }
        Ok(())
    }

    fn emit_error(&self, message: &str) -> Result<()> {
        if self.json {
            let payload = json!({ "error": message });
            println!("{}", serde_json::to_string_pretty(&payload)?);
        } else {
            println!("Error: {message}");
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = QrStyleConfig::load(cli.config.as_deref())?;
    apply_cli_overrides(&cli, &mut config)?;

    logging::init(&config.logging)?;
    if config.logging.metrics {
        metrics::enable(config.logging.metrics_interval_secs);
    }

    let data_type: DataType = cli.data_type.parse().map_err(Error::Config)?;
    let options = SessionOptions {
        style: config.style.to_style(),
        download_size: config.download.size,
        data_type,
    };
    info!(dir = %config.download.dir.display(), "Starting qrstyle session");

    let mut session = Session::new(
        Arc::new(RasterEngine::new()),
        Arc::new(DirectorySink::new(&config.download.dir)),
        options,
    );
    let sink = OutputSink { json: cli.json };

    if let Some(path) = config.style.logo.clone() {
        session.load_logo(path);
        if let Err(err) = session.finish_logo().await {
            warn!(error = %err, "Continuing without logo");
            sink.emit_error(&err.to_string())?;
        }
    }

    let outcome = if cli.interactive {
        run_interactive(&mut session, &sink).await
    } else {
        run_once(&cli, &mut session, &sink).await
    };

    session.shutdown().await?;
    if config.logging.metrics {
        metrics::flush();
    }
    outcome
}

fn apply_cli_overrides(cli: &Cli, config: &mut QrStyleConfig) -> Result<()> {
    let style = &mut config.style;
    if let Some(ref value) = cli.foreground {
        style.foreground = value.parse()?;
    }
    if let Some(ref value) = cli.background {
        style.background = value.parse()?;
    }
    if let Some(ref value) = cli.dot_style {
        style.dot_style = value.parse().map_err(Error::Config)?;
    }
    if let Some(ref value) = cli.corner_square_style {
        style.corner_square_style = value.parse().map_err(Error::Config)?;
    }
    if let Some(ref value) = cli.corner_dot_style {
        style.corner_dot_style = value.parse().map_err(Error::Config)?;
    }
    if let Some(ref value) = cli.error_correction {
        style.error_correction = value.parse().map_err(Error::Config)?;
    }
    if let Some(ref path) = cli.logo {
        style.logo = Some(path.clone());
    }
    if let Some(size) = cli.logo_size {
        style.logo_size = size.into();
    }
    if let Some(size) = cli.size {
        config.download.size = size.into();
    }
    if let Some(ref dir) = cli.out_dir {
        config.download.dir = dir.clone();
    }
    if cli.metrics {
        config.logging.metrics = true;
    }
    Ok(())
}

/// Fill the form from the command line
fn fill_form(cli: &Cli, session: &mut Session<RasterEngine>) -> Result<()> {
    let content = cli.content.clone().unwrap_or_default();
    match session.content() {
        ContentRequest::Url { .. } | ContentRequest::Text { .. } => {
            session.set_field(Field::Value, content)?;
        }
        ContentRequest::Email { .. } => {
            session.set_field(Field::EmailTo, content)?;
            if let Some(ref subject) = cli.subject {
                session.set_field(Field::EmailSubject, subject.as_str())?;
            }
            if let Some(ref body) = cli.body {
                session.set_field(Field::EmailBody, body.as_str())?;
            }
        }
        ContentRequest::Phone { .. } => {
            session.set_field(Field::PhoneNumber, content)?;
        }
    }
    Ok(())
}

async fn run_once(cli: &Cli, session: &mut Session<RasterEngine>, sink: &OutputSink) -> Result<()> {
    fill_form(cli, session)?;

    let mut rendered = vec![output::render_details(session.details().as_ref())];
    if session.details().is_none() {
        return sink.emit_all(&rendered);
    }

    let variants: &[bool] = match (cli.both, cli.transparent) {
        (true, _) => &[false, true],
        (false, true) => &[true],
        (false, false) => &[false],
    };

    let verifier = QrVerifier::new();
    let payload = session.payload();
    for &transparent in variants {
        let saved = session.download(transparent).await?;
        rendered.push(output::render_download(saved.as_ref()));

        if let (true, Some(saved)) = (cli.verify, saved) {
            let png = tokio::fs::read(&saved.path).await?;
            let scanned = verifier.decode_png(&png)?;
            let matches = scanned == payload;
            rendered.push(output::render_verification(&payload, &scanned));
            if !matches {
                sink.emit_all(&rendered)?;
                return Err(Error::QrDecode(format!(
                    "{} does not scan back to its payload",
                    saved.file_name
                )));
            }
        }
    }

    sink.emit_all(&rendered)
}

async fn run_interactive(session: &mut Session<RasterEngine>, sink: &OutputSink) -> Result<()> {
    if !sink.json {
        println!("qrstyle interactive mode, type 'help' for commands");
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let command = match line.parse::<ConsoleCommand>() {
            Ok(command) => command,
            Err(message) => {
                sink.emit_error(&message)?;
                continue;
            }
        };
        if command == ConsoleCommand::Quit {
            break;
        }

        match console::execute(session, command).await {
            Ok(Some(rendered)) => sink.emit(&rendered)?,
            Ok(None) => {}
            Err(err) => sink.emit_error(&err.to_string())?,
        }
    }

    Ok(())
}
