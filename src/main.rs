use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use layerplot::{csv_reader, parser, OutputFormat, RenderOptions};
use std::fs::File;
use std::io::{self, BufReader, Read, Write};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Copy, Clone, Debug, ValueEnum)]
enum Format {
    Png,
    Svg,
}

impl From<Format> for OutputFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Png => OutputFormat::Png,
            Format::Svg => OutputFormat::Svg,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "layerplot")]
#[command(about = "Render layered plots from CSV or JSON data using a pipe DSL", long_about = None)]
struct Args {
    /// Plot DSL string (e.g., 'aes(x: time, y: temp) | line(color: "red") | point()')
    dsl: String,

    /// Input file (defaults to stdin)
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Treat the input as a JSON array of objects instead of CSV
    #[arg(long)]
    json: bool,

    /// Output file (defaults to stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Image width in pixels
    #[arg(long)]
    width: Option<u32>,

    /// Image height in pixels
    #[arg(long)]
    height: Option<u32>,

    /// Output format
    #[arg(short, long, value_enum)]
    format: Option<Format>,

    /// Render options as JSON, e.g. '{"width": 1024, "height": 768, "type": "svg"}'
    #[arg(long)]
    options: Option<String>,
}

impl Args {
    /// Explicit flags win over `--options`.
    fn render_options(&self) -> Result<RenderOptions> {
        let mut options = match &self.options {
            Some(json) => serde_json::from_str(json).context("Failed to parse --options JSON")?,
            None => RenderOptions::default(),
        };
        if let Some(width) = self.width {
            options.width = width;
        }
        if let Some(height) = self.height {
            options.height = height;
        }
        if let Some(format) = self.format {
            options.format = format.into();
        }
        Ok(options)
    }
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "layerplot=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let args = Args::parse();
    let options = args.render_options()?;

    let reader: Box<dyn Read> = match &args.input {
        Some(path) => Box::new(BufReader::new(
            File::open(path).with_context(|| format!("Failed to open {}", path.display()))?,
        )),
        None => Box::new(io::stdin().lock()),
    };
    let table = if args.json {
        csv_reader::read_json(reader).context("Failed to read JSON input")?
    } else {
        csv_reader::read_csv(reader).context("Failed to read CSV input")?
    };
    info!(rows = table.num_rows(), "loaded input");

    let scene = parser::parse_scene(&args.dsl, table).context("Failed to parse plot DSL")?;
    let bytes = scene
        .build()
        .and_then(|plot| plot.render(&options))
        .context("Failed to render plot")?;

    match &args.output {
        Some(path) => std::fs::write(path, &bytes)
            .with_context(|| format!("Failed to write {}", path.display()))?,
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle.write_all(&bytes).context("Failed to write image to stdout")?;
            handle.flush().context("Failed to flush stdout")?;
        }
    }

    Ok(())
}
