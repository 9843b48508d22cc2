//! Entry point used by request handlers and the CLI.
//!
//! Reads share the dataset lock. Writes take the exclusive lock, mutate a
//! working copy, persist it and only then publish it, so a rejected or
//! unpersisted write leaves nothing behind. Modification order assignment
//! happens under that same exclusive lock.

use crate::core::dataset::{Dataset, Snapshot};
use crate::core::timeline::Timeline;
use crate::core::views::{parse_year, ModificationView, ReportView, SourceView, StrategyView};
use crate::domain::model::{
    ModificationId, ModificationUpdate, NewModification, NewSource, ReductionModification,
    ReductionStrategy, Report, ReportId, Source, SourceId, SourceOwner, SourceScope, StrategyId,
    Year,
};
use crate::domain::ports::{ConfigProvider, Storage};
use crate::utils::error::{EmissionError, Result};
use tokio::sync::RwLock;

pub struct EmissionService<S: Storage> {
    storage: S,
    snapshot_file: String,
    pretty: bool,
    max_timeline_span: u32,
    dataset: RwLock<Dataset>,
}

fn scoped_strategy(
    dataset: &Dataset,
    report: ReportId,
    id: StrategyId,
) -> Result<&ReductionStrategy> {
    dataset.report(report)?;
    let strategy = dataset.strategy(id)?;
    if strategy.report != report {
        return Err(EmissionError::not_found("strategy", id));
    }
    Ok(strategy)
}

fn check_scope(dataset: &Dataset, scope: SourceScope) -> Result<()> {
    match scope {
        SourceScope::Report(report) => dataset.report(report).map(|_| ()),
        SourceScope::Strategy { report, strategy } => {
            scoped_strategy(dataset, report, strategy).map(|_| ())
        }
    }
}

fn scoped_source(dataset: &Dataset, scope: SourceScope, id: SourceId) -> Result<&Source> {
    check_scope(dataset, scope)?;
    let source = dataset.source(id)?;
    if source.owner != scope.owner() {
        return Err(EmissionError::not_found("source", id));
    }
    Ok(source)
}

fn scoped_modification(
    dataset: &Dataset,
    report: ReportId,
    strategy: StrategyId,
    id: ModificationId,
) -> Result<&ReductionModification> {
    scoped_strategy(dataset, report, strategy)?;
    let modification = dataset.modification(id)?;
    if modification.strategy != strategy {
        return Err(EmissionError::not_found("modification", id));
    }
    Ok(modification)
}

fn is_not_found(error: &EmissionError) -> bool {
    matches!(error, EmissionError::IoError(e) if e.kind() == std::io::ErrorKind::NotFound)
}

impl<S: Storage> EmissionService<S> {
    /// Loads the snapshot from storage; a missing snapshot starts empty.
    pub async fn open<C: ConfigProvider>(storage: S, config: &C) -> Result<Self> {
        let snapshot_file = config.snapshot_file().to_string();
        let dataset = match storage.read_file(&snapshot_file).await {
            Ok(bytes) => {
                let snapshot: Snapshot = serde_json::from_slice(&bytes)?;
                let dataset = Dataset::from_snapshot(snapshot)?;
                tracing::info!(
                    "📂 Loaded snapshot '{}' ({} reports)",
                    snapshot_file,
                    dataset.reports().count()
                );
                dataset
            }
            Err(e) if is_not_found(&e) => {
                tracing::info!("📂 No snapshot at '{}', starting empty", snapshot_file);
                Dataset::new()
            }
            Err(e) => return Err(e),
        };

        Ok(Self {
            storage,
            snapshot_file,
            pretty: config.pretty_snapshot(),
            max_timeline_span: config.max_timeline_span(),
            dataset: RwLock::new(dataset),
        })
    }

    pub async fn snapshot(&self) -> Snapshot {
        self.dataset.read().await.to_snapshot()
    }

    async fn persist(&self, dataset: &Dataset) -> Result<()> {
        let snapshot = dataset.to_snapshot();
        let bytes = if self.pretty {
            serde_json::to_vec_pretty(&snapshot)?
        } else {
            serde_json::to_vec(&snapshot)?
        };
        tracing::debug!(
            "Writing snapshot ({} bytes) to '{}'",
            bytes.len(),
            self.snapshot_file
        );
        self.storage.write_file(&self.snapshot_file, &bytes).await
    }

    async fn commit<T, F>(&self, action: &str, mutate: F) -> Result<T>
    where
        F: FnOnce(&mut Dataset) -> Result<T>,
    {
        let mut guard = self.dataset.write().await;
        let mut working = guard.clone();

        let outcome = match mutate(&mut working) {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!("❌ {} rejected: {}", action, e);
                return Err(e);
            }
        };

        if let Err(e) = self.persist(&working).await {
            tracing::error!("❌ {} not persisted: {}", action, e);
            return Err(e);
        }

        *guard = working;
        tracing::info!("✅ {}", action);
        Ok(outcome)
    }

    // ---- reports --------------------------------------------------------

    pub async fn create_report(&self, name: &str) -> Result<Report> {
        self.commit("create report", |ds| ds.insert_report(name))
            .await
    }

    pub async fn update_report(&self, id: ReportId, name: &str) -> Result<Report> {
        self.commit("update report", |ds| ds.rename_report(id, name))
            .await
    }

    pub async fn delete_report(&self, id: ReportId) -> Result<Report> {
        self.commit("delete report", |ds| ds.remove_report(id)).await
    }

    pub async fn list_reports(&self, year: Option<&str>) -> Result<Vec<ReportView>> {
        let year = parse_year(year);
        let ds = self.dataset.read().await;
        ds.reports()
            .map(|r| ReportView::build(&ds, r, year))
            .collect()
    }

    pub async fn get_report(&self, id: ReportId, year: Option<&str>) -> Result<ReportView> {
        let year = parse_year(year);
        let ds = self.dataset.read().await;
        let report = ds.report(id)?;
        ReportView::build(&ds, report, year)
    }

    // ---- sources --------------------------------------------------------

    pub async fn create_source(&self, scope: SourceScope, fields: NewSource) -> Result<Source> {
        self.commit("create source", |ds| {
            check_scope(ds, scope)?;
            ds.insert_source(scope.owner(), fields)
        })
        .await
    }

    pub async fn update_source(
        &self,
        scope: SourceScope,
        id: SourceId,
        fields: NewSource,
    ) -> Result<Source> {
        self.commit("update source", |ds| {
            scoped_source(ds, scope, id)?;
            ds.update_source(id, fields)
        })
        .await
    }

    pub async fn delete_source(&self, scope: SourceScope, id: SourceId) -> Result<Source> {
        self.commit("delete source", |ds| {
            scoped_source(ds, scope, id)?;
            ds.remove_source(id)
        })
        .await
    }

    pub async fn list_sources(
        &self,
        scope: SourceScope,
        year: Option<&str>,
    ) -> Result<Vec<SourceView>> {
        let year = parse_year(year);
        let ds = self.dataset.read().await;
        check_scope(&ds, scope)?;
        Ok(ds
            .sources_of(scope.owner())
            .map(|s| SourceView::build(s, year))
            .collect())
    }

    pub async fn get_source(
        &self,
        scope: SourceScope,
        id: SourceId,
        year: Option<&str>,
    ) -> Result<SourceView> {
        let year = parse_year(year);
        let ds = self.dataset.read().await;
        let source = scoped_source(&ds, scope, id)?;
        Ok(SourceView::build(source, year))
    }

    // ---- strategies -----------------------------------------------------

    pub async fn create_strategy(&self, report: ReportId, name: &str) -> Result<ReductionStrategy> {
        self.commit("create strategy", |ds| ds.insert_strategy(report, name))
            .await
    }

    pub async fn update_strategy(
        &self,
        report: ReportId,
        id: StrategyId,
        name: &str,
    ) -> Result<ReductionStrategy> {
        self.commit("update strategy", |ds| {
            scoped_strategy(ds, report, id)?;
            ds.rename_strategy(id, name)
        })
        .await
    }

    pub async fn delete_strategy(
        &self,
        report: ReportId,
        id: StrategyId,
    ) -> Result<ReductionStrategy> {
        self.commit("delete strategy", |ds| {
            scoped_strategy(ds, report, id)?;
            ds.remove_strategy(id)
        })
        .await
    }

    pub async fn list_strategies(
        &self,
        report: ReportId,
        year: Option<&str>,
    ) -> Result<Vec<StrategyView>> {
        let year = parse_year(year);
        let ds = self.dataset.read().await;
        ds.report(report)?;
        ds.strategies_of(report)
            .map(|s| StrategyView::build(&ds, s, year))
            .collect()
    }

    pub async fn get_strategy(
        &self,
        report: ReportId,
        id: StrategyId,
        year: Option<&str>,
    ) -> Result<StrategyView> {
        let year = parse_year(year);
        let ds = self.dataset.read().await;
        let strategy = scoped_strategy(&ds, report, id)?;
        StrategyView::build(&ds, strategy, year)
    }

    // ---- modifications --------------------------------------------------

    pub async fn create_modification(
        &self,
        report: ReportId,
        strategy: StrategyId,
        candidate: NewModification,
    ) -> Result<ReductionModification> {
        self.commit("create modification", |ds| {
            scoped_strategy(ds, report, strategy)?;
            ds.append_modification(strategy, candidate)
        })
        .await
    }

    pub async fn update_modification(
        &self,
        report: ReportId,
        strategy: StrategyId,
        id: ModificationId,
        update: ModificationUpdate,
    ) -> Result<ReductionModification> {
        self.commit("update modification", |ds| {
            scoped_modification(ds, report, strategy, id)?;
            ds.update_modification(id, update)
        })
        .await
    }

    pub async fn delete_modification(
        &self,
        report: ReportId,
        strategy: StrategyId,
        id: ModificationId,
    ) -> Result<ReductionModification> {
        self.commit("delete modification", |ds| {
            scoped_modification(ds, report, strategy, id)?;
            ds.remove_modification(id)
        })
        .await
    }

    pub async fn list_modifications(
        &self,
        report: ReportId,
        strategy: StrategyId,
        year: Option<&str>,
    ) -> Result<Vec<ModificationView>> {
        let year = parse_year(year);
        let ds = self.dataset.read().await;
        scoped_strategy(&ds, report, strategy)?;
        ds.modifications_of(strategy)
            .map(|m| ModificationView::build(&ds, m, year))
            .collect()
    }

    pub async fn get_modification(
        &self,
        report: ReportId,
        strategy: StrategyId,
        id: ModificationId,
        year: Option<&str>,
    ) -> Result<ModificationView> {
        let year = parse_year(year);
        let ds = self.dataset.read().await;
        let modification = scoped_modification(&ds, report, strategy, id)?;
        ModificationView::build(&ds, modification, year)
    }

    // ---- reporting ------------------------------------------------------

    pub async fn report_year_emission(&self, report: ReportId, year: Year) -> Result<f64> {
        let ds = self.dataset.read().await;
        let total = ds.report_year_emission(report, year)?;
        tracing::debug!("Report {} emits {} kg in {}", report, total, year);
        Ok(total)
    }

    pub async fn strategy_year_delta(
        &self,
        report: ReportId,
        strategy: StrategyId,
        year: Year,
    ) -> Result<f64> {
        let ds = self.dataset.read().await;
        scoped_strategy(&ds, report, strategy)?;
        let delta = ds.strategy_year_delta(strategy, year)?;
        tracing::debug!("Strategy {} saves {} kg in {}", strategy, delta, year);
        Ok(delta)
    }

    pub async fn timeline(&self, report: ReportId, from: Year, to: Year) -> Result<Timeline> {
        let ds = self.dataset.read().await;
        Timeline::build(&ds, report, from, to, self.max_timeline_span)
    }

    /// Number of sources attached to `owner`.
    pub async fn source_count(&self, owner: SourceOwner) -> usize {
        self.dataset.read().await.sources_of(owner).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MemoryStorage;
    use crate::config::toml_config::AppConfig;

    async fn service() -> (EmissionService<MemoryStorage>, MemoryStorage) {
        let storage = MemoryStorage::new();
        let service = EmissionService::open(storage.clone(), &AppConfig::default())
            .await
            .unwrap();
        (service, storage)
    }

    #[tokio::test]
    async fn test_writes_are_persisted() {
        let (service, storage) = service().await;
        let report = service.create_report("Report 1").await.unwrap();
        service
            .create_source(SourceScope::Report(report.id), NewSource::new(1.0, 10.0))
            .await
            .unwrap();

        let bytes = storage.get_file("emissions.json").await.unwrap();
        let snapshot: Snapshot = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(snapshot.reports.len(), 1);
        assert_eq!(snapshot.sources.len(), 1);

        let reopened = EmissionService::open(storage.clone(), &AppConfig::default())
            .await
            .unwrap();
        let view = reopened.get_report(report.id, Some("2020")).await.unwrap();
        assert_eq!(view.total_emission, Some(10.0));
    }

    #[tokio::test]
    async fn test_rejected_write_commits_nothing() {
        let (service, storage) = service().await;
        let report = service.create_report("Report 1").await.unwrap();
        let before = storage.get_file("emissions.json").await.unwrap();

        let err = service
            .create_source(
                SourceScope::Report(report.id),
                NewSource {
                    lifetime: Some(3),
                    ..NewSource::new(1.0, 1.0)
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, EmissionError::IntegrityError { .. }));
        assert_eq!(storage.get_file("emissions.json").await.unwrap(), before);
        assert_eq!(service.source_count(SourceOwner::Report(report.id)).await, 0);
    }

    #[tokio::test]
    async fn test_scope_mismatch_is_not_found() {
        let (service, _) = service().await;
        let r1 = service.create_report("R1").await.unwrap();
        let r2 = service.create_report("R2").await.unwrap();
        let strategy = service.create_strategy(r1.id, "S").await.unwrap();
        let source = service
            .create_source(SourceScope::Report(r1.id), NewSource::new(1.0, 1.0))
            .await
            .unwrap();

        assert!(matches!(
            service.get_strategy(r2.id, strategy.id, None).await,
            Err(EmissionError::NotFound { .. })
        ));
        assert!(matches!(
            service
                .get_source(SourceScope::Report(r2.id), source.id, None)
                .await,
            Err(EmissionError::NotFound { .. })
        ));
        assert!(matches!(
            service
                .get_source(
                    SourceScope::Strategy {
                        report: r1.id,
                        strategy: strategy.id
                    },
                    source.id,
                    None
                )
                .await,
            Err(EmissionError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_concurrent_modifications_get_distinct_orders() {
        let (service, _) = service().await;
        let service = std::sync::Arc::new(service);
        let report = service.create_report("R").await.unwrap();
        let source = service
            .create_source(SourceScope::Report(report.id), NewSource::new(10.0, 10.0))
            .await
            .unwrap();
        let strategy = service.create_strategy(report.id, "S").await.unwrap();
        let (report_id, strategy_id, source_id) = (report.id, strategy.id, source.id);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let service = service.clone();
            handles.push(tokio::spawn(async move {
                service
                    .create_modification(
                        report_id,
                        strategy_id,
                        NewModification::new(source_id, 2020).value_modification(-1.0),
                    )
                    .await
            }));
        }

        let mut orders = Vec::new();
        for handle in handles {
            orders.push(handle.await.unwrap().unwrap().order);
        }
        orders.sort_unstable();
        assert_eq!(orders, (0..8).collect::<Vec<u32>>());
    }
}
