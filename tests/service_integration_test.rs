use anyhow::Result;
use emission_report::config::toml_config::AppConfig;
use emission_report::core::{NewModification, NewSource, SourceScope};
use emission_report::domain::model::ModificationUpdate;
use emission_report::{EmissionError, EmissionService, LocalStorage};
use tempfile::TempDir;

fn config_for(temp_dir: &TempDir) -> Result<AppConfig> {
    // 將Windows路徑中的反斜杠轉為正斜杠以避免TOML解析問題
    let normalized_path = temp_dir.path().to_string_lossy().replace('\\', "/");
    let content = format!(
        r#"
[store]
path = "{}"
snapshot_file = "ghg.json"

[reporting]
max_timeline_span = 20
"#,
        normalized_path
    );
    Ok(AppConfig::from_toml_str(&content)?)
}

async fn open(config: &AppConfig) -> Result<EmissionService<LocalStorage>> {
    let storage = LocalStorage::new(config.store.path.clone());
    Ok(EmissionService::open(storage, config).await?)
}

#[tokio::test]
async fn test_snapshot_survives_restart() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let config = config_for(&temp_dir)?;

    let (report_id, strategy_id) = {
        let service = open(&config).await?;
        let report = service.create_report("Office 2023").await?;
        let heating = service
            .create_source(
                SourceScope::Report(report.id),
                NewSource::new(1200.0, 0.2).described("Gas heating"),
            )
            .await?;
        let strategy = service.create_strategy(report.id, "Heat pump").await?;
        service
            .create_modification(
                report.id,
                strategy.id,
                NewModification::new(heating.id, 2024)
                    .emission_factor_change(0.05)
                    .described("Switch to heat pump"),
            )
            .await?;
        (report.id, strategy.id)
    };

    assert!(temp_dir.path().join("ghg.json").exists());

    let service = open(&config).await?;
    let report = service.get_report(report_id, Some("2024")).await?;
    assert_eq!(report.name, "Office 2023");
    assert_eq!(report.sources.len(), 1);
    assert_eq!(report.sources[0].description.as_deref(), Some("Gas heating"));
    assert!((report.total_emission.unwrap_or_default() - 240.0).abs() < 1e-9);

    let strategy = service.get_strategy(report_id, strategy_id, Some("2024")).await?;
    assert_eq!(strategy.modifications.len(), 1);
    assert_eq!(strategy.modifications[0].order, 0);
    let delta = strategy.delta_total_emission.unwrap_or_default();
    assert!((delta - (240.0 - 60.0)).abs() < 1e-9);

    // 重新開啟後的序號要接續
    let next = service.create_report("Office 2024").await?;
    assert_eq!(next.id, report_id + 1);
    Ok(())
}

#[tokio::test]
async fn test_year_parameter_handling() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let service = open(&config_for(&temp_dir)?).await?;
    let report = service.create_report("Report 1").await?;
    service
        .create_source(SourceScope::Report(report.id), NewSource::new(1.0, 10.0))
        .await?;
    let strategy = service.create_strategy(report.id, "S").await?;

    let with_year = service.get_report(report.id, Some("2020")).await?;
    assert_eq!(with_year.total_emission, Some(10.0));

    for raw in [None, Some("abc"), Some("20.20"), Some("")] {
        let view = service.get_report(report.id, raw).await?;
        assert_eq!(view.total_emission, None);
        assert_eq!(view.sources[0].total_emission, None);

        let json = serde_json::to_value(&view)?;
        assert!(json["total_emission"].is_null());

        let strategy = service.get_strategy(report.id, strategy.id, raw).await?;
        assert_eq!(strategy.delta_total_emission, None);
    }
    Ok(())
}

#[tokio::test]
async fn test_collections_are_ordered_by_id() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let service = open(&config_for(&temp_dir)?).await?;
    let report = service.create_report("Report 1").await?;
    let scope = SourceScope::Report(report.id);

    let mut created = Vec::new();
    for i in 0..5 {
        let source = service
            .create_source(scope, NewSource::new(f64::from(i), 1.0))
            .await?;
        created.push(source.id);
    }
    service.delete_source(scope, created[2]).await?;
    created.remove(2);

    let listed: Vec<u64> = service
        .list_sources(scope, None)
        .await?
        .into_iter()
        .map(|s| s.id)
        .collect();
    assert_eq!(listed, created);

    let reports = service.list_reports(Some("2020")).await?;
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].total_emission, Some(0.0 + 1.0 + 3.0 + 4.0));
    Ok(())
}

#[tokio::test]
async fn test_strategy_scoped_sources() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let service = open(&config_for(&temp_dir)?).await?;
    let report = service.create_report("Report 1").await?;
    let strategy = service.create_strategy(report.id, "Solar").await?;
    let scope = SourceScope::Strategy {
        report: report.id,
        strategy: strategy.id,
    };

    let panels = service
        .create_source(scope, NewSource::new(20.0, 30.0).with_lifetime(20, 2025))
        .await?;
    let view = service.get_source(scope, panels.id, Some("2030")).await?;
    assert_eq!(view.strategy, Some(strategy.id));
    assert_eq!(view.report, None);
    assert_eq!(view.total_emission, Some(30.0));

    assert_eq!(service.list_sources(SourceScope::Report(report.id), None).await?.len(), 0);
    assert_eq!(
        service.strategy_year_delta(report.id, strategy.id, 2030).await?,
        -30.0
    );

    // 不能對策略新增的來源建立修正
    let err = service
        .create_modification(report.id, strategy.id, NewModification::new(panels.id, 2030))
        .await
        .unwrap_err();
    assert!(matches!(err, EmissionError::IntegrityError { .. }));
    Ok(())
}

#[tokio::test]
async fn test_update_and_delete_modifications() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let service = open(&config_for(&temp_dir)?).await?;
    let report = service.create_report("Report 1").await?;
    let source = service
        .create_source(SourceScope::Report(report.id), NewSource::new(10.0, 10.0))
        .await?;
    let strategy = service.create_strategy(report.id, "S").await?;

    let first = service
        .create_modification(
            report.id,
            strategy.id,
            NewModification::new(source.id, 2020).value_modification(-2.0),
        )
        .await?;
    let second = service
        .create_modification(
            report.id,
            strategy.id,
            NewModification::new(source.id, 2025).value_modification(-3.0),
        )
        .await?;

    let update = ModificationUpdate {
        description: Some("earlier".to_string()),
        value_modification: Some(-4.0),
        emission_factor_change: None,
        modification_start_year: 2026,
    };
    assert!(service
        .update_modification(report.id, strategy.id, first.id, update.clone())
        .await
        .is_err());

    let updated = service
        .update_modification(
            report.id,
            strategy.id,
            first.id,
            ModificationUpdate {
                modification_start_year: 2021,
                ..update
            },
        )
        .await?;
    assert_eq!(updated.order, 0);
    assert_eq!(updated.value_modification, Some(-4.0));

    service
        .delete_modification(report.id, strategy.id, second.id)
        .await?;
    let third = service
        .create_modification(report.id, strategy.id, NewModification::new(source.id, 2030))
        .await?;
    assert_eq!(third.order, 1);

    let remaining = service
        .list_modifications(report.id, strategy.id, Some("2030"))
        .await?;
    assert_eq!(remaining.len(), 2);
    assert_eq!(remaining[0].delta_total_emission, Some(40.0));
    Ok(())
}

#[tokio::test]
async fn test_delete_report_cascades() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let config = config_for(&temp_dir)?;
    let service = open(&config).await?;
    let report = service.create_report("Report 1").await?;
    let source = service
        .create_source(SourceScope::Report(report.id), NewSource::new(1.0, 1.0))
        .await?;
    let strategy = service.create_strategy(report.id, "S").await?;
    service
        .create_modification(report.id, strategy.id, NewModification::new(source.id, 2020))
        .await?;

    service.delete_report(report.id).await?;

    let snapshot = open(&config).await?.snapshot().await;
    assert!(snapshot.reports.is_empty());
    assert!(snapshot.sources.is_empty());
    assert!(snapshot.strategies.is_empty());
    assert!(snapshot.modifications.is_empty());

    assert!(matches!(
        service.get_report(report.id, None).await,
        Err(EmissionError::NotFound { .. })
    ));
    Ok(())
}

#[tokio::test]
async fn test_timeline_export() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let service = open(&config_for(&temp_dir)?).await?;
    let report = service.create_report("Fleet").await?;
    let van = service
        .create_source(
            SourceScope::Report(report.id),
            NewSource::new(2.0, 50.0).with_lifetime(2, 2020),
        )
        .await?;
    let strategy = service.create_strategy(report.id, "EV").await?;
    service
        .create_modification(
            report.id,
            strategy.id,
            NewModification::new(van.id, 2021).emission_factor_change(0.0),
        )
        .await?;

    let timeline = service.timeline(report.id, 2020, 2023).await?;
    let csv = timeline.to_csv()?;
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines[0], "year,baseline,EV delta,EV projected");
    assert_eq!(lines[1], "2020,50,0,50");
    assert_eq!(lines[2], "2021,50,50,0");
    assert_eq!(lines[4], "2023,0,0,0");

    let json: serde_json::Value = serde_json::from_str(&timeline.to_json(false)?)?;
    assert_eq!(json["report_name"], "Fleet");
    assert_eq!(json["rows"].as_array().map(|r| r.len()), Some(4));

    // 超過設定的年份跨度
    assert!(service.timeline(report.id, 2000, 2030).await.is_err());
    Ok(())
}

#[tokio::test]
async fn test_strategies_are_scoped_to_their_report() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let service = open(&config_for(&temp_dir)?).await?;
    let report = service.create_report("Report 1").await?;
    let other = service.create_report("Report 2").await?;
    let strategy = service.create_strategy(report.id, "Draft").await?;

    let renamed = service
        .update_strategy(report.id, strategy.id, "LED lighting")
        .await?;
    assert_eq!(renamed.name, "LED lighting");
    assert!(service.update_strategy(report.id, strategy.id, "  ").await.is_err());

    assert!(matches!(
        service.get_strategy(other.id, strategy.id, None).await,
        Err(EmissionError::NotFound { .. })
    ));

    let listed = service.list_strategies(report.id, Some("2020")).await?;
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].name, "LED lighting");
    assert_eq!(listed[0].delta_total_emission, Some(0.0));
    assert!(service.list_strategies(other.id, None).await?.is_empty());
    Ok(())
}
