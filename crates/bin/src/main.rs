//! credrisk CLI binary.
//!
//! Scores credit-card accounts for next-month default risk and explains each
//! score by its most influential features.

use clap::{Args, Parser, Subcommand};
use credrisk::features::{ColumnKind, FeatureSchema, InteractiveRecord, get_feature_info};
use credrisk::model::CreditModel;
use credrisk::output::{BatchReport, ExportFormat, Exporter};
use credrisk::{AppConfig, LogFormat, LoggingConfig, ScoringPipeline, load_model};
use indicatif::{ProgressBar, ProgressStyle};
use std::error::Error;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "credrisk")]
#[command(about = "Credit-default scoring with per-feature explanations", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Model artifact (XGBoost or logistic JSON)
    #[arg(long, global = true)]
    model: Option<PathBuf>,

    /// Decision threshold in (0, 1)
    #[arg(long, global = true)]
    threshold: Option<f64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score one account entered on the command line
    Score {
        #[command(flatten)]
        account: AccountArgs,

        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Score every account in a CSV file
    Batch {
        /// Input CSV with LIMIT_BAL, AGE, SEX, EDUCATION, MARRIAGE, PAY_*,
        /// BILL_AMT* and PAY_AMT* columns (and optionally ID)
        input: PathBuf,

        /// Write results to this file instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Output format (csv, json, pretty-json, text, markdown)
        #[arg(long, default_value = "text")]
        format: String,

        /// Features explained per account
        #[arg(long)]
        top_k: Option<usize>,

        /// Hide the progress bar
        #[arg(long)]
        no_progress: bool,
    },

    /// List the features the model consumes
    Schema,

    /// Show details of the configured model
    InspectModel,
}

/// Account fields for single-record scoring.
///
/// Omitted fields take the form defaults. Billing history is never asked for,
/// so bill and payment features use placeholder averages.
#[derive(Args, Debug, Default)]
struct AccountArgs {
    /// Credit limit
    #[arg(long)]
    limit_bal: Option<f64>,

    /// Age in years
    #[arg(long)]
    age: Option<u32>,

    /// Sex (1 = male, 2 = female)
    #[arg(long)]
    sex: Option<i64>,

    /// Education (1 = graduate school, 2 = university, 3 = high school, 4 = other)
    #[arg(long)]
    education: Option<i64>,

    /// Marital status (1 = married, 2 = single, 3 = other)
    #[arg(long)]
    marriage: Option<i64>,

    /// Repayment status last month (-2..=9, months of delay when positive)
    #[arg(long = "pay-0", allow_negative_numbers = true)]
    pay_0: Option<i32>,

    /// Repayment status two months ago
    #[arg(long = "pay-2", allow_negative_numbers = true)]
    pay_2: Option<i32>,

    /// Repayment status three months ago
    #[arg(long = "pay-3", allow_negative_numbers = true)]
    pay_3: Option<i32>,

    /// Repayment status four months ago
    #[arg(long = "pay-4", allow_negative_numbers = true)]
    pay_4: Option<i32>,

    /// Repayment status five months ago
    #[arg(long = "pay-5", allow_negative_numbers = true)]
    pay_5: Option<i32>,

    /// Repayment status six months ago
    #[arg(long = "pay-6", allow_negative_numbers = true)]
    pay_6: Option<i32>,
}

impl AccountArgs {
    fn into_record(self) -> InteractiveRecord {
        let defaults = InteractiveRecord::default();
        let status = defaults.repayment_status;
        InteractiveRecord {
            limit_bal: self.limit_bal.unwrap_or(defaults.limit_bal),
            age: self.age.unwrap_or(defaults.age),
            sex: self.sex.unwrap_or(defaults.sex),
            education: self.education.unwrap_or(defaults.education),
            marriage: self.marriage.unwrap_or(defaults.marriage),
            repayment_status: [
                self.pay_0.unwrap_or(status[0]),
                self.pay_2.unwrap_or(status[1]),
                self.pay_3.unwrap_or(status[2]),
                self.pay_4.unwrap_or(status[3]),
                self.pay_5.unwrap_or(status[4]),
                self.pay_6.unwrap_or(status[5]),
            ],
        }
    }
}

/// Rendering of a single-account report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScoreFormat {
    Text,
    Json,
}

impl ScoreFormat {
    fn parse(format: &str) -> Result<Self, Box<dyn Error>> {
        match format.to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown score format '{other}' (expected text or json)").into()),
        }
    }
}

/// Rendering of a batch report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BatchFormat {
    Export(ExportFormat),
    Text,
    Markdown,
}

impl BatchFormat {
    fn parse(format: &str) -> Result<Self, Box<dyn Error>> {
        match format.to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "markdown" | "md" => Ok(Self::Markdown),
            other => Ok(Self::Export(other.parse()?)),
        }
    }

    fn render(self, report: &BatchReport) -> Result<String, Box<dyn Error>> {
        Ok(match self {
            Self::Export(format) => report.export_to_string(format)?,
            Self::Text => report.to_ascii_table(),
            Self::Markdown => report.to_markdown(),
        })
    }
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(model) = cli.model {
        config.model_path = Some(model);
    }
    if let Some(threshold) = cli.threshold {
        config.scoring.threshold = threshold;
    }
    if let Commands::Batch {
        top_k: Some(top_k), ..
    } = &cli.command
    {
        config.scoring.top_k = *top_k;
    }
    config.validate()?;

    init_tracing(&config.logging)?;

    match cli.command {
        Commands::Score { account, format } => {
            let format = ScoreFormat::parse(&format)?;
            let pipeline = build_pipeline(&config)?;
            score_account(&pipeline, account, format)?;
        }
        Commands::Batch {
            input,
            output,
            format,
            no_progress,
            ..
        } => {
            let format = BatchFormat::parse(&format)?;
            let pipeline = build_pipeline(&config)?;
            score_file(&pipeline, &input, output.as_deref(), format, !no_progress)?;
        }
        Commands::Schema => {
            let schema = match &config.model_path {
                Some(path) => FeatureSchema::from_names(load_model(path)?.feature_names())?,
                None => FeatureSchema::credit_default(),
            };
            print_schema(&schema);
        }
        Commands::InspectModel => {
            let model = require_model(&config)?;
            inspect_model(model.as_ref(), &config);
        }
    }

    Ok(())
}

fn init_tracing(logging: &LoggingConfig) -> Result<(), Box<dyn Error>> {
    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(logging.directive()))?;

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match logging.format {
        LogFormat::Pretty => subscriber.init(),
        LogFormat::Json => subscriber.json().init(),
    }
    Ok(())
}

fn require_model(config: &AppConfig) -> Result<Arc<dyn CreditModel>, Box<dyn Error>> {
    let path = config
        .model_path
        .as_deref()
        .ok_or("no model configured; pass --model or set model_path")?;
    Ok(load_model(path)?)
}

fn build_pipeline(config: &AppConfig) -> Result<ScoringPipeline, Box<dyn Error>> {
    let model = require_model(config)?;
    Ok(ScoringPipeline::new(model, config)?)
}

fn score_account(
    pipeline: &ScoringPipeline,
    account: AccountArgs,
    format: ScoreFormat,
) -> Result<(), Box<dyn Error>> {
    let report = pipeline.score_interactive(account.into_record())?;

    match format {
        ScoreFormat::Json => println!("{}", report.export_to_string(ExportFormat::PrettyJson)?),
        ScoreFormat::Text => print!("{}", report.to_ascii_table()),
    }
    Ok(())
}

fn score_file(
    pipeline: &ScoringPipeline,
    input: &Path,
    output: Option<&Path>,
    format: BatchFormat,
    show_progress: bool,
) -> Result<(), Box<dyn Error>> {
    let records = credrisk::features::read_batch_file(input)?;
    info!(records = records.len(), input = %input.display(), "Scoring batch");

    let report = if show_progress {
        let pb = ProgressBar::new(records.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
                .progress_chars("█▓░"),
        );
        pb.set_message("scoring");

        let result = pipeline.score_batch_chunked(&records, |progress| {
            pb.set_position(progress.processed as u64);
        });
        match &result {
            Ok(_) => pb.finish_with_message("done"),
            Err(_) => pb.abandon_with_message("failed"),
        }
        result?
    } else {
        pipeline.score_batch(&records)?
    };

    let rendered = format.render(&report)?;
    match output {
        Some(path) => {
            std::fs::write(path, &rendered)?;
            eprintln!(
                "Wrote {} scores ({} predicted defaults) to {}",
                report.summary.count,
                report.summary.predicted_defaults,
                path.display()
            );
        }
        None => println!("{rendered}"),
    }
    Ok(())
}

fn print_schema(schema: &FeatureSchema) {
    println!("\n{:<4} {:<22} {:<12} Description", "#", "Feature", "Kind");
    println!("{}", "-".repeat(80));

    for (i, column) in schema.columns().iter().enumerate() {
        let (kind, description) = match &column.kind {
            ColumnKind::Numeric => get_feature_info(&column.name).map_or_else(
                || ("numeric", String::new()),
                |info| (info.category.name(), info.description.to_string()),
            ),
            ColumnKind::Indicator { source, level } => (
                "indicator",
                format!(
                    "{} = {} ({})",
                    source.column(),
                    level,
                    source.level_name(*level).unwrap_or("untrained level")
                ),
            ),
        };
        println!("{:<4} {:<22} {:<12} {}", i, column.name, kind, description);
    }
    println!("\n{} features", schema.len());
}

fn inspect_model(model: &dyn CreditModel, config: &AppConfig) {
    println!("\nModel: {}", model.name());
    println!("Features: {}", model.n_features());
    println!("Decision threshold: {:.2}", config.scoring.threshold);

    let default = FeatureSchema::credit_default();
    let names: Vec<&str> = model.feature_names().iter().map(String::as_str).collect();
    if names == default.names() {
        println!("Schema: default credit-default schema");
    } else {
        let unknown: Vec<&str> = names
            .iter()
            .copied()
            .filter(|name| default.position(name).is_none())
            .collect();
        println!("Schema: custom");
        if !unknown.is_empty() {
            println!("  Not in the default schema: {}", unknown.join(", "));
        }
    }

    println!();
    for (i, name) in names.iter().enumerate() {
        println!("{:>4}  {}", i, name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_score_arguments() {
        let cli = Cli::try_parse_from([
            "credrisk",
            "--threshold",
            "0.4",
            "score",
            "--limit-bal",
            "50000",
            "--pay-0",
            "-1",
            "--pay-2",
            "2",
        ])
        .unwrap();

        assert_eq!(cli.threshold, Some(0.4));
        let Commands::Score { account, format } = cli.command else {
            panic!("expected score command");
        };
        assert_eq!(format, "text");

        let record = account.into_record();
        assert_eq!(record.limit_bal, 50_000.0);
        assert_eq!(record.age, InteractiveRecord::default().age);
        assert_eq!(record.repayment_status, [-1, 2, 0, 0, 0, 0]);
    }

    #[test]
    fn test_batch_arguments() {
        let cli = Cli::try_parse_from([
            "credrisk",
            "batch",
            "accounts.csv",
            "--format",
            "csv",
            "--top-k",
            "3",
            "--no-progress",
            "--model",
            "model.json",
        ])
        .unwrap();

        assert_eq!(cli.model, Some(PathBuf::from("model.json")));
        let Commands::Batch {
            input,
            format,
            top_k,
            no_progress,
            ..
        } = cli.command
        else {
            panic!("expected batch command");
        };
        assert_eq!(input, PathBuf::from("accounts.csv"));
        assert_eq!(top_k, Some(3));
        assert!(no_progress);
        assert_eq!(
            BatchFormat::parse(&format).unwrap(),
            BatchFormat::Export(ExportFormat::Csv)
        );
    }

    #[test]
    fn test_batch_formats() {
        assert_eq!(BatchFormat::parse("TEXT").unwrap(), BatchFormat::Text);
        assert_eq!(BatchFormat::parse("markdown").unwrap(), BatchFormat::Markdown);
        assert_eq!(
            BatchFormat::parse("pretty-json").unwrap(),
            BatchFormat::Export(ExportFormat::PrettyJson)
        );
        assert!(BatchFormat::parse("xml").is_err());
    }

    #[test]
    fn test_score_formats() {
        assert_eq!(ScoreFormat::parse("text").unwrap(), ScoreFormat::Text);
        assert_eq!(ScoreFormat::parse("JSON").unwrap(), ScoreFormat::Json);
        assert!(ScoreFormat::parse("csv").is_err());
        assert!(ScoreFormat::parse("markdown").is_err());
    }

    #[test]
    fn test_default_account() {
        let record = AccountArgs::default().into_record();
        assert_eq!(record, InteractiveRecord::default());
    }
}
