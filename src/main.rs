use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use devicestats::{
    aggregate::{CategoryField, View},
    config::Config,
    dataset::{load_dataset, Dataset},
    error::PipelineError,
    export,
    fetch,
    filter::{CategoryFilter, RecordFilter, SortDirection, SortKey},
    legacy,
    logging::init_logging,
    stats::{top_categories, yearly_counts, Count, MatrixStats, OverviewStats},
};
use serde::Serialize;
use std::{collections::BTreeMap, path::PathBuf, process::ExitCode, sync::Arc};
use tokio::time::Instant;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(
    author,
    version,
    about = "FDA AI/ML medical device approval statistics from the published device database"
)]
struct Cli {
    /// YAML config file
    #[arg(long, env = "DEVICESTATS_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Override the detailed database CSV URL
    #[arg(long, env = "DEVICESTATS_SOURCE_URL", global = true)]
    source_url: Option<String>,

    /// Override the export directory
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,

    /// Override the minimum field count per data row
    #[arg(long, global = true)]
    min_columns: Option<usize>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Annual and cumulative category x year matrices
    Summary {
        /// Dimensions to compute (default: all)
        #[arg(short, long = "field")]
        fields: Vec<CategoryField>,
        #[command(flatten)]
        table: TableArgs,
        /// Write CSV exports for both views instead of printing JSON
        #[arg(long)]
        export: bool,
    },
    /// Growth, peak year and top categories for one dimension
    Stats {
        #[arg(short, long, default_value = "domain")]
        field: CategoryField,
        #[arg(long, default_value = "annual")]
        view: View,
        #[arg(long, default_value_t = 5)]
        top: usize,
    },
    /// Filter individual device records
    Records {
        #[command(flatten)]
        filter: RecordArgs,
        /// Print at most this many records
        #[arg(long, default_value_t = 50)]
        limit: usize,
        /// Write the filtered records as CSV instead of printing JSON
        #[arg(long)]
        export: bool,
    },
    /// Distinct values available for filtering
    Filters,
    /// Read the older per-dimension summary sheets
    Legacy {
        #[arg(long)]
        export: bool,
    },
    /// Fetch and map only; report layout deviations and dropped rows
    Check,
}

#[derive(Args)]
struct TableArgs {
    /// Keep categories whose name contains this (case-insensitive)
    #[arg(long)]
    search: Option<String>,
    #[arg(long)]
    min_total: Option<u64>,
    #[arg(long)]
    max_total: Option<u64>,
    /// Sort rows: category, total or a year
    #[arg(long)]
    sort: Option<String>,
    #[arg(long)]
    desc: bool,
}

impl TableArgs {
    fn to_filter(&self) -> CategoryFilter {
        let sort = self.sort.as_deref().map(|s| {
            let key = match s.trim().to_lowercase().as_str() {
                "category" => SortKey::Category,
                "total" => SortKey::Total,
                year => SortKey::Year(year.to_string()),
            };
            let dir = if self.desc {
                SortDirection::Desc
            } else {
                SortDirection::Asc
            };
            (key, dir)
        });
        CategoryFilter {
            search: self.search.clone(),
            min_total: self.min_total,
            max_total: self.max_total,
            sort,
        }
    }
}

#[derive(Args)]
struct RecordArgs {
    /// Matches device name, developer or submission number
    #[arg(long)]
    search: Option<String>,
    #[arg(long)]
    specialty: Option<String>,
    #[arg(long)]
    year: Option<String>,
    #[arg(long)]
    domain: Option<String>,
    #[arg(long)]
    task: Option<String>,
    #[arg(long)]
    modality: Option<String>,
}

impl From<RecordArgs> for RecordFilter {
    fn from(a: RecordArgs) -> Self {
        RecordFilter {
            search: a.search,
            specialty: a.specialty,
            year: a.year,
            domain: a.domain,
            task: a.task,
            modality: a.modality,
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let stdout = std::io::stdout();
    serde_json::to_writer_pretty(stdout.lock(), value).context("writing JSON to stdout")?;
    println!();
    Ok(())
}

fn resolve_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(url) = &cli.source_url {
        config.source_url = url.clone();
    }
    if let Some(dir) = &cli.output_dir {
        config.output_dir = dir.clone();
    }
    if let Some(n) = cli.min_columns {
        config.min_columns = n;
    }
    config.validate()?;
    Ok(config)
}

fn check_quality(dataset: &Dataset, config: &Config) {
    let ratio = dataset.drop_ratio();
    if ratio > config.max_drop_ratio {
        warn!(
            dropped = dataset.rejections.total(),
            rows = dataset.rows_seen,
            ratio = %format!("{:.1}%", ratio * 100.0),
            limit = %format!("{:.1}%", config.max_drop_ratio * 100.0),
            "dropped-row share above limit"
        );
    }
}

async fn load(client: &reqwest::Client, config: &Config) -> Result<Arc<Dataset>> {
    let start = Instant::now();
    let dataset = load_dataset(client, &config.source_url, config.min_columns)
        .await
        .with_context(|| format!("loading device database from {}", config.source_url))?;
    info!(records = dataset.len(), elapsed = ?start.elapsed(), "loaded");
    check_quality(&dataset, config);
    Ok(dataset)
}

async fn run(cli: Cli) -> Result<()> {
    let config = resolve_config(&cli)?;
    let client = fetch::build_client(config.request_timeout())?;

    match cli.command {
        Command::Summary {
            fields,
            table,
            export,
        } => {
            let dataset = load(&client, &config).await?;
            let fields = if fields.is_empty() {
                CategoryField::ALL.to_vec()
            } else {
                fields
            };
            let all = dataset.process_all();
            let filter = table.to_filter();

            if export {
                for field in &fields {
                    let data = &all[field];
                    for view in [View::Annual, View::Cumulative] {
                        let rows = filter.apply(data, view);
                        export::export_matrix(&config.output_dir, *field, data, view, &rows)?;
                    }
                }
            } else {
                let selected: BTreeMap<String, _> = fields
                    .iter()
                    .map(|f| {
                        let data = &all[f];
                        (f.to_string(), data.select(&filter.apply(data, View::Annual)))
                    })
                    .collect();
                print_json(&selected)?;
            }
        }

        Command::Stats { field, view, top } => {
            let dataset = load(&client, &config).await?;
            let data = dataset.process(field);
            let mut stats = MatrixStats::compute(&data, view);
            stats.category_totals.truncate(top);

            #[derive(Serialize)]
            #[serde(rename_all = "camelCase")]
            struct Report {
                field: CategoryField,
                overview: OverviewStats,
                #[serde(flatten)]
                stats: MatrixStats,
                yearly_approvals: Vec<Count>,
                top_records: Vec<Count>,
            }
            print_json(&Report {
                field,
                overview: OverviewStats::compute(&dataset.records, Utc::now().date_naive()),
                yearly_approvals: yearly_counts(&dataset.records),
                top_records: top_categories(&dataset.records, field.column(), top),
                stats,
            })?;
        }

        Command::Records {
            filter,
            limit,
            export,
        } => {
            let dataset = load(&client, &config).await?;
            let filter = RecordFilter::from(filter);
            let hits = filter.apply(&dataset.records);
            info!(matched = hits.len(), "filtered records");

            if export {
                let today = Utc::now().date_naive();
                export::export_records(&config.output_dir, today, &hits)?;
            } else {
                let shown: Vec<_> = hits.into_iter().take(limit).collect();
                print_json(&shown)?;
            }
        }

        Command::Filters => {
            let dataset = load(&client, &config).await?;
            print_json(&dataset.summary())?;
        }

        Command::Legacy { export } => {
            if config.legacy_sheets.is_empty() {
                anyhow::bail!("no legacy_sheets configured");
            }
            let sheets =
                legacy::load_summary_sheets(&client, &config.legacy_sheets, config.summary_layout())
                    .await
                    .context("loading legacy summary sheets")?;
            if export {
                for (field, data) in &sheets {
                    for view in [View::Annual, View::Cumulative] {
                        export::export_matrix(
                            &config.output_dir,
                            *field,
                            data,
                            view,
                            &data.categories,
                        )?;
                    }
                }
            } else {
                print_json(&sheets)?;
            }
        }

        Command::Check => {
            let dataset = load(&client, &config).await?;
            let summary = dataset.summary();
            print_json(&summary)?;
            if dataset.drop_ratio() > config.max_drop_ratio {
                anyhow::bail!(
                    "{} of {} rows dropped (limit {:.1}%)",
                    dataset.rejections.total(),
                    dataset.rows_seen,
                    config.max_drop_ratio * 100.0
                );
            }
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging("info");

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{:#}", err);
            eprintln!("error: {:#}", err);
            let retryable = err
                .chain()
                .filter_map(|e| e.downcast_ref::<PipelineError>())
                .any(PipelineError::is_retryable);
            if retryable {
                eprintln!("the data source could not be read; re-run the command to retry");
            }
            ExitCode::FAILURE
        }
    }
}
