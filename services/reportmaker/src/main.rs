//! Field report builder.
//!
//! Produces the pieces of a field report:
//! - Georeferenced aerial imagery for a field extent
//! - Map render jobs with categorized, graduated or QML styling
//! - Expense pie charts and profit histograms

mod commands;
mod config;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use symbology::{LabelPlacement, MapType, RenderOptions};
use tokio_util::sync::CancellationToken;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use commands::StyleRequest;
use config::ReportConfig;

#[derive(Parser, Debug)]
#[command(name = "reportmaker")]
#[command(about = "Build imagery, maps and charts for field reports")]
struct Args {
    /// YAML configuration file
    #[arg(long, env = "REPORT_CONFIG")]
    config: Option<PathBuf>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Json)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Json,
    Text,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch and georeference aerial imagery; prints the raster path
    Imagery {
        #[arg(long, allow_hyphen_values = true)]
        west: f64,
        #[arg(long, allow_hyphen_values = true)]
        south: f64,
        #[arg(long, allow_hyphen_values = true)]
        east: f64,
        #[arg(long, allow_hyphen_values = true)]
        north: f64,
        /// CRS of the four edges
        #[arg(long, default_value = "EPSG:4326")]
        crs: String,
        /// Ignore cached downloads
        #[arg(long)]
        refresh: bool,
    },

    /// Write an expense pie chart (.svg or .png)
    Pie {
        output: PathBuf,
        #[arg(long, value_delimiter = ',', required = true)]
        labels: Vec<String>,
        #[arg(long, value_delimiter = ',', required = true, allow_hyphen_values = true)]
        values: Vec<f64>,
        #[arg(long)]
        title: Option<String>,
    },

    /// Write a profit histogram (.svg or .png)
    Histogram {
        output: PathBuf,
        #[arg(long, value_delimiter = ',', required = true, allow_hyphen_values = true)]
        bins: Vec<f64>,
        #[arg(long, value_delimiter = ',', required = true, allow_hyphen_values = true)]
        values: Vec<f64>,
        /// JSON array of [r, g, b, a] colors with channels in [0, 1]
        #[arg(long)]
        colors_json: Option<String>,
    },

    /// Print the resolved style plan as JSON
    Style {
        #[command(flatten)]
        style: StyleArgs,
        /// Layer opacity substituted into QML sheets
        #[arg(long, default_value_t = 1.0)]
        opacity: f64,
    },

    /// Write a map render job, optionally with an imagery basemap
    Map {
        /// Vector layer
        #[arg(long)]
        input: PathBuf,
        /// Image the renderer should produce
        #[arg(long)]
        output: PathBuf,
        #[command(flatten)]
        style: StyleArgs,
        #[command(flatten)]
        render: RenderArgs,
        /// Fetch a basemap for this extent: west,south,east,north
        #[arg(long, allow_hyphen_values = true)]
        with_imagery: Option<String>,
        /// CRS of --with-imagery
        #[arg(long, default_value = "EPSG:4326")]
        crs: String,
    },
}

#[derive(clap::Args, Debug)]
struct StyleArgs {
    /// categorized, graduated, qml or test
    #[arg(long)]
    map_type: MapType,
    /// Attribute to classify
    #[arg(long)]
    field: Option<String>,
    /// JSON array of the attribute's values
    #[arg(long)]
    values_file: Option<PathBuf>,
    /// Number of graduated classes
    #[arg(long)]
    classes: Option<usize>,
    /// QML style sheet
    #[arg(long)]
    qml: Option<PathBuf>,
}

impl From<StyleArgs> for StyleRequest {
    fn from(args: StyleArgs) -> Self {
        StyleRequest {
            map_type: args.map_type,
            field: args.field,
            classes: args.classes,
            qml: args.qml,
            values_file: args.values_file,
        }
    }
}

/// Overrides for the configured render options.
#[derive(clap::Args, Debug, Default)]
struct RenderArgs {
    #[arg(long)]
    width: Option<u32>,
    #[arg(long)]
    height: Option<u32>,
    /// Factor the layer extent is grown by
    #[arg(long)]
    scale: Option<f64>,
    #[arg(long)]
    label_size: Option<u32>,
    #[arg(long)]
    label_placement: Option<LabelPlacement>,
    #[arg(long)]
    no_labels: bool,
    /// Vector layer opacity in [0, 1]
    #[arg(long)]
    opacity: Option<f64>,
    /// Round numeric labels
    #[arg(long)]
    round_labels: bool,
}

impl RenderArgs {
    fn apply(self, mut options: RenderOptions) -> RenderOptions {
        if let Some(width) = self.width {
            options.width = width;
        }
        if let Some(height) = self.height {
            options.height = height;
        }
        if let Some(scale) = self.scale {
            options.scale = scale;
        }
        if let Some(size) = self.label_size {
            options.label_size = size;
        }
        if let Some(placement) = self.label_placement {
            options.label_placement = placement;
        }
        if let Some(opacity) = self.opacity {
            options.layer_opacity = opacity;
        }
        if self.no_labels {
            options.show_labels = false;
        }
        if self.round_labels {
            options.round_labels = true;
        }
        options
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();
    init_tracing(&args.log_level, args.log_format)?;

    let config = ReportConfig::resolve(args.config.as_deref())?;

    // Ctrl-C stops the imagery pipeline at its next blocking step
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Interrupt received, cancelling");
                cancel.cancel();
            }
        });
    }

    match args.command {
        Command::Imagery {
            west,
            south,
            east,
            north,
            crs,
            refresh,
        } => {
            let bbox = commands::parse_bbox(&format!("{west},{south},{east},{north}"), &crs)?;
            let raster = commands::imagery(&config, &bbox, refresh, &cancel).await?;
            println!("{}", raster.render_path().display());
        }
        Command::Pie {
            output,
            labels,
            values,
            title,
        } => commands::pie(&output, labels, values, title)?,
        Command::Histogram {
            output,
            bins,
            values,
            colors_json,
        } => commands::histogram(&output, bins, values, colors_json.as_deref())?,
        Command::Style { style, opacity } => {
            let plan = commands::resolve_style(&style.into(), opacity)?;
            println!("{}", serde_json::to_string_pretty(&plan)?);
        }
        Command::Map {
            input,
            output,
            style,
            render,
            with_imagery,
            crs,
        } => {
            let imagery_bbox = with_imagery
                .map(|s| commands::parse_bbox(&s, &crs))
                .transpose()?;
            let options = render.apply(config.render.clone());
            let job = commands::map(
                &config,
                input,
                output,
                &style.into(),
                options,
                imagery_bbox,
                &cancel,
            )
            .await?;
            println!("{}", job.display());
        }
    }

    Ok(())
}

fn init_tracing(log_level: &str, format: LogFormat) -> Result<()> {
    let level = match log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // stdout carries command output, logs go to stderr
    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(true)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Json => tracing::subscriber::set_global_default(builder.json().finish())?,
        LogFormat::Text => tracing::subscriber::set_global_default(builder.finish())?,
    }
    Ok(())
}
