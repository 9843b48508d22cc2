use chrono::Datelike;
use clap::Parser;
use emission_report::config::cli::{new_modification, source_scope};
use emission_report::config::{Command, ExportFormat};
use emission_report::core::ConfigProvider;
use emission_report::domain::model::ModificationUpdate;
use emission_report::utils::error::ErrorSeverity;
use emission_report::utils::logger;
use emission_report::utils::validation::{validate_required_field, Validate};
use emission_report::{AppConfig, CliConfig, EmissionError, EmissionService, LocalStorage};
use serde::Serialize;

fn print_json<T: Serialize>(value: &T) -> Result<(), EmissionError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn execute(
    service: &EmissionService<LocalStorage>,
    config: &AppConfig,
    command: Command,
) -> Result<(), EmissionError> {
    // --year 未指定時採用設定檔的預設年份
    let default_year = config.default_year().map(|y| y.to_string());
    let year_or_default = |year: Option<String>| year.or_else(|| default_year.clone());

    match command {
        Command::CreateReport { name } => print_json(&service.create_report(&name).await?),
        Command::RenameReport { id, name } => print_json(&service.update_report(id, &name).await?),
        Command::DeleteReport { id } => print_json(&service.delete_report(id).await?),
        Command::ListReports { year } => {
            let year = year_or_default(year);
            print_json(&service.list_reports(year.as_deref()).await?)
        }
        Command::ShowReport { id, year } => {
            let year = year_or_default(year);
            print_json(&service.get_report(id, year.as_deref()).await?)
        }
        Command::AddSource {
            report,
            strategy,
            fields,
        } => print_json(
            &service
                .create_source(source_scope(report, strategy), fields.into())
                .await?,
        ),
        Command::UpdateSource {
            report,
            strategy,
            id,
            fields,
        } => print_json(
            &service
                .update_source(source_scope(report, strategy), id, fields.into())
                .await?,
        ),
        Command::DeleteSource {
            report,
            strategy,
            id,
        } => print_json(
            &service
                .delete_source(source_scope(report, strategy), id)
                .await?,
        ),
        Command::ListSources {
            report,
            strategy,
            year,
        } => {
            let year = year_or_default(year);
            print_json(
                &service
                    .list_sources(source_scope(report, strategy), year.as_deref())
                    .await?,
            )
        }
        Command::ShowSource {
            report,
            strategy,
            id,
            year,
        } => {
            let year = year_or_default(year);
            print_json(
                &service
                    .get_source(source_scope(report, strategy), id, year.as_deref())
                    .await?,
            )
        }
        Command::CreateStrategy { report, name } => {
            print_json(&service.create_strategy(report, &name).await?)
        }
        Command::RenameStrategy { report, id, name } => {
            print_json(&service.update_strategy(report, id, &name).await?)
        }
        Command::ListStrategies { report, year } => {
            let year = year_or_default(year);
            print_json(&service.list_strategies(report, year.as_deref()).await?)
        }
        Command::DeleteStrategy { report, id } => {
            print_json(&service.delete_strategy(report, id).await?)
        }
        Command::ShowStrategy { report, id, year } => {
            let year = year_or_default(year);
            print_json(&service.get_strategy(report, id, year.as_deref()).await?)
        }
        Command::AddModification {
            report,
            strategy,
            source,
            start_year,
            value_modification,
            emission_factor_change,
            order,
            description,
        } => {
            let candidate = new_modification(
                source,
                start_year,
                value_modification,
                emission_factor_change,
                order,
                description,
            );
            print_json(
                &service
                    .create_modification(report, strategy, candidate)
                    .await?,
            )
        }
        Command::UpdateModification {
            report,
            strategy,
            id,
            start_year,
            value_modification,
            emission_factor_change,
            description,
        } => {
            let update = ModificationUpdate {
                description,
                value_modification,
                emission_factor_change,
                modification_start_year: start_year,
            };
            print_json(
                &service
                    .update_modification(report, strategy, id, update)
                    .await?,
            )
        }
        Command::ListModifications {
            report,
            strategy,
            year,
        } => {
            let year = year_or_default(year);
            print_json(
                &service
                    .list_modifications(report, strategy, year.as_deref())
                    .await?,
            )
        }
        Command::ShowModification {
            report,
            strategy,
            id,
            year,
        } => {
            let year = year_or_default(year);
            print_json(
                &service
                    .get_modification(report, strategy, id, year.as_deref())
                    .await?,
            )
        }
        Command::ExportSnapshot => print_json(&service.snapshot().await),
        Command::DeleteModification {
            report,
            strategy,
            id,
        } => print_json(&service.delete_modification(report, strategy, id).await?),
        Command::Timeline {
            report,
            from,
            to,
            format,
        } => {
            let from = *validate_required_field(
                "reporting.default_year",
                &from.or(config.default_year()),
            )?;
            let to = to.unwrap_or_else(|| chrono::Utc::now().year());
            let timeline = service.timeline(report, from, to).await?;
            match format {
                ExportFormat::Csv => print!("{}", timeline.to_csv()?),
                ExportFormat::Json => println!("{}", timeline.to_json(true)?),
            }
            Ok(())
        }
    }
}

fn exit_with(e: &EmissionError) -> ! {
    tracing::error!(
        "❌ Command failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 {}", e.recovery_suggestion());

    let exit_code = match e.severity() {
        ErrorSeverity::Low => 0,
        ErrorSeverity::Medium => 2,
        ErrorSeverity::High => 1,
        ErrorSeverity::Critical => 3,
    };
    std::process::exit(exit_code);
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = CliConfig::parse();

    let mut config = match AppConfig::load_or_default(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load config file '{}': {}", cli.config, e);
            eprintln!("💡 Make sure the file is valid TOML format");
            std::process::exit(1);
        }
    };

    // 初始化日誌
    logger::init_logger(
        cli.verbose,
        config.logging.level.as_deref(),
        config.log_format(),
    );
    tracing::debug!("CLI config: {:?}", cli);

    cli.apply_overrides(&mut config);

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        exit_with(&e);
    }

    let storage = LocalStorage::new(config.store_path().to_string());
    let service = match EmissionService::open(storage, &config).await {
        Ok(service) => service,
        Err(e) => exit_with(&e),
    };

    if let Err(e) = execute(&service, &config, cli.command).await {
        exit_with(&e);
    }

    Ok(())
}
