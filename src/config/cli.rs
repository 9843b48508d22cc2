use crate::config::toml_config::AppConfig;
use crate::domain::model::{NewModification, NewSource, SourceScope};
use clap::{Parser, Subcommand, ValueEnum};

#[derive(Debug, Clone, Parser)]
#[command(name = "emission-report")]
#[command(about = "GHG emission reports and what-if reduction strategies")]
pub struct CliConfig {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "emission-report.toml")]
    pub config: String,

    /// Override the store directory from the config
    #[arg(long)]
    pub store_path: Option<String>,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    Csv,
    Json,
}

/// Source fields shared by `add-source` and `update-source`.
#[derive(Debug, Clone, clap::Args)]
pub struct SourceArgs {
    #[arg(long)]
    pub value: f64,
    #[arg(long)]
    pub emission_factor: f64,
    /// Amortization period in years (requires --acquisition-year)
    #[arg(long)]
    pub lifetime: Option<u32>,
    #[arg(long)]
    pub acquisition_year: Option<i32>,
    #[arg(long)]
    pub description: Option<String>,
}

impl From<SourceArgs> for NewSource {
    fn from(args: SourceArgs) -> Self {
        NewSource {
            description: args.description,
            value: args.value,
            emission_factor: args.emission_factor,
            lifetime: args.lifetime,
            acquisition_year: args.acquisition_year,
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Create a report
    CreateReport {
        #[arg(long)]
        name: String,
    },
    /// Rename a report
    RenameReport {
        #[arg(long)]
        id: u64,
        #[arg(long)]
        name: String,
    },
    /// Delete a report with its sources and strategies
    DeleteReport {
        #[arg(long)]
        id: u64,
    },
    ListReports {
        #[arg(long)]
        year: Option<String>,
    },
    /// Show a report with its sources; `--year` fills in total_emission
    ShowReport {
        #[arg(long)]
        id: u64,
        #[arg(long)]
        year: Option<String>,
    },
    /// Add a source to a report, or to a strategy with --strategy
    AddSource {
        #[arg(long)]
        report: u64,
        #[arg(long)]
        strategy: Option<u64>,
        #[command(flatten)]
        fields: SourceArgs,
    },
    UpdateSource {
        #[arg(long)]
        report: u64,
        #[arg(long)]
        strategy: Option<u64>,
        #[arg(long)]
        id: u64,
        #[command(flatten)]
        fields: SourceArgs,
    },
    DeleteSource {
        #[arg(long)]
        report: u64,
        #[arg(long)]
        strategy: Option<u64>,
        #[arg(long)]
        id: u64,
    },
    ListSources {
        #[arg(long)]
        report: u64,
        #[arg(long)]
        strategy: Option<u64>,
        #[arg(long)]
        year: Option<String>,
    },
    ShowSource {
        #[arg(long)]
        report: u64,
        #[arg(long)]
        strategy: Option<u64>,
        #[arg(long)]
        id: u64,
        #[arg(long)]
        year: Option<String>,
    },
    CreateStrategy {
        #[arg(long)]
        report: u64,
        #[arg(long)]
        name: String,
    },
    RenameStrategy {
        #[arg(long)]
        report: u64,
        #[arg(long)]
        id: u64,
        #[arg(long)]
        name: String,
    },
    ListStrategies {
        #[arg(long)]
        report: u64,
        #[arg(long)]
        year: Option<String>,
    },
    DeleteStrategy {
        #[arg(long)]
        report: u64,
        #[arg(long)]
        id: u64,
    },
    /// Show a strategy; `--year` fills in delta_total_emission
    ShowStrategy {
        #[arg(long)]
        report: u64,
        #[arg(long)]
        id: u64,
        #[arg(long)]
        year: Option<String>,
    },
    /// Append a modification to the ledger of a (source, strategy) pair
    AddModification {
        #[arg(long)]
        report: u64,
        #[arg(long)]
        strategy: u64,
        #[arg(long)]
        source: u64,
        #[arg(long)]
        start_year: i32,
        #[arg(long, allow_negative_numbers = true)]
        value_modification: Option<f64>,
        #[arg(long)]
        emission_factor_change: Option<f64>,
        #[arg(long)]
        order: Option<u32>,
        #[arg(long)]
        description: Option<String>,
    },
    /// Change the values of a modification; its order stays fixed
    UpdateModification {
        #[arg(long)]
        report: u64,
        #[arg(long)]
        strategy: u64,
        #[arg(long)]
        id: u64,
        #[arg(long)]
        start_year: i32,
        #[arg(long, allow_negative_numbers = true)]
        value_modification: Option<f64>,
        #[arg(long)]
        emission_factor_change: Option<f64>,
        #[arg(long)]
        description: Option<String>,
    },
    ListModifications {
        #[arg(long)]
        report: u64,
        #[arg(long)]
        strategy: u64,
        #[arg(long)]
        year: Option<String>,
    },
    ShowModification {
        #[arg(long)]
        report: u64,
        #[arg(long)]
        strategy: u64,
        #[arg(long)]
        id: u64,
        #[arg(long)]
        year: Option<String>,
    },
    DeleteModification {
        #[arg(long)]
        report: u64,
        #[arg(long)]
        strategy: u64,
        #[arg(long)]
        id: u64,
    },
    /// Print the whole dataset as a snapshot document
    ExportSnapshot,
    /// Baseline and strategy results for a range of years
    Timeline {
        #[arg(long)]
        report: u64,
        /// Defaults to reporting.default_year
        #[arg(long)]
        from: Option<i32>,
        /// Defaults to the current year
        #[arg(long)]
        to: Option<i32>,
        #[arg(long, value_enum, default_value = "csv")]
        format: ExportFormat,
    },
}

pub fn source_scope(report: u64, strategy: Option<u64>) -> SourceScope {
    match strategy {
        Some(strategy) => SourceScope::Strategy { report, strategy },
        None => SourceScope::Report(report),
    }
}

pub fn new_modification(
    source: u64,
    start_year: i32,
    value_modification: Option<f64>,
    emission_factor_change: Option<f64>,
    order: Option<u32>,
    description: Option<String>,
) -> NewModification {
    NewModification {
        source,
        description,
        value_modification,
        emission_factor_change,
        order,
        modification_start_year: start_year,
    }
}

impl CliConfig {
    /// 套用命令列覆蓋設定
    pub fn apply_overrides(&self, config: &mut AppConfig) {
        if let Some(path) = &self.store_path {
            config.store.path = path.clone();
            tracing::info!("🔧 Store path overridden to: {}", path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_add_modification() {
        let cli = CliConfig::try_parse_from([
            "emission-report",
            "add-modification",
            "--report",
            "1",
            "--strategy",
            "2",
            "--source",
            "3",
            "--start-year",
            "2024",
            "--value-modification",
            "-5",
        ])
        .unwrap();

        match cli.command {
            Command::AddModification {
                source,
                start_year,
                value_modification,
                ..
            } => {
                assert_eq!(source, 3);
                assert_eq!(start_year, 2024);
                assert_eq!(value_modification, Some(-5.0));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_store_path_override() {
        let cli = CliConfig::try_parse_from([
            "emission-report",
            "--store-path",
            "/tmp/ghg",
            "list-reports",
        ])
        .unwrap();
        let mut config = AppConfig::default();
        cli.apply_overrides(&mut config);
        assert_eq!(config.store.path, "/tmp/ghg");
    }

    #[test]
    fn test_parse_timeline_defaults() {
        let cli = CliConfig::try_parse_from(["emission-report", "timeline", "--report", "7"])
            .unwrap();
        match cli.command {
            Command::Timeline {
                report,
                from,
                to,
                format,
            } => {
                assert_eq!(report, 7);
                assert_eq!(from, None);
                assert_eq!(to, None);
                assert_eq!(format, ExportFormat::Csv);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_update_modification() {
        let cli = CliConfig::try_parse_from([
            "emission-report",
            "update-modification",
            "--report",
            "1",
            "--strategy",
            "2",
            "--id",
            "9",
            "--start-year",
            "2026",
            "--emission-factor-change",
            "0.4",
        ])
        .unwrap();

        match cli.command {
            Command::UpdateModification {
                id,
                start_year,
                value_modification,
                emission_factor_change,
                ..
            } => {
                assert_eq!(id, 9);
                assert_eq!(start_year, 2026);
                assert_eq!(value_modification, None);
                assert_eq!(emission_factor_change, Some(0.4));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_listing_commands() {
        let cli = CliConfig::try_parse_from([
            "emission-report",
            "list-sources",
            "--report",
            "1",
            "--strategy",
            "3",
            "--year",
            "2030",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Command::ListSources {
                report: 1,
                strategy: Some(3),
                ..
            }
        ));

        let cli = CliConfig::try_parse_from(["emission-report", "export-snapshot"]).unwrap();
        assert!(matches!(cli.command, Command::ExportSnapshot));
    }

    #[test]
    fn test_source_scope() {
        assert_eq!(source_scope(1, None), SourceScope::Report(1));
        assert_eq!(
            source_scope(1, Some(4)),
            SourceScope::Strategy {
                report: 1,
                strategy: 4
            }
        );
    }
}
