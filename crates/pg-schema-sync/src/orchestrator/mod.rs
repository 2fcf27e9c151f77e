//! Migration orchestrator.
//!
//! Drives the per-target workflow: optional database creation, declaration
//! enumeration, create-vs-diff per table, orphan handling, and one-by-one
//! statement application. Analyze (`plan`) and apply are distinct phases so
//! a caller can interleave confirmation prompts between them.
//!
//! Statements are never wrapped in a transaction: concurrent index creation
//! forbids it, and each statement is its own visible commit point.

pub mod files;

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::config::{Config, NodeConfig, Target};
use crate::core::statement::{Statement, StatementKind};
use crate::diff::diff_table;
use crate::dsl::parser::parse_fields;
use crate::emit;
use crate::error::Result;
use crate::executor::{PgExecutor, PoolRegistry};
use crate::reflect::{database_exists, Reflector};

/// Options for `plan`.
#[derive(Debug, Clone, Default)]
pub struct MigrateOptions {
    /// Restrict to one cluster id or database name.
    pub name: Option<String>,

    /// Restrict to nodes serving this tenant key.
    pub tenant: Option<String>,

    /// Create missing target databases via the admin executor.
    pub create_databases: bool,

    /// Emit DROP TABLE for orphans instead of only reporting them.
    pub drop_orphans: bool,
}

/// Per-table pending-statement count, for `status` output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableStatus {
    pub table: String,
    pub pending: usize,
}

/// The computed plan for one target.
#[derive(Debug, Clone)]
pub struct TargetPlan {
    /// Cluster the node belongs to.
    pub cluster_id: String,

    /// The target node.
    pub node: NodeConfig,

    /// Ordered statements to apply.
    pub statements: Vec<Statement>,

    /// Orphan tables found but not scheduled for drop.
    pub orphans: Vec<String>,

    /// Human-readable warnings gathered while planning.
    pub warnings: Vec<String>,

    /// Per-table statement counts for every declared table.
    pub table_status: Vec<TableStatus>,
}

impl TargetPlan {
    /// True when nothing needs to change.
    pub fn is_up_to_date(&self) -> bool {
        self.statements.is_empty()
    }
}

/// One failed statement, recorded fail-soft.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatementFailure {
    pub table: String,
    pub sql: String,
    pub message: String,
}

/// Application outcome for one target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetReport {
    pub cluster_id: String,
    pub database: String,
    pub executed: usize,
    pub total: usize,
    pub failures: Vec<StatementFailure>,
}

impl TargetReport {
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// Application outcome across all targets.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MigrationReport {
    pub targets: Vec<TargetReport>,
}

impl MigrationReport {
    pub fn has_failures(&self) -> bool {
        self.targets.iter().any(|t| t.has_failures())
    }

    pub fn executed(&self) -> usize {
        self.targets.iter().map(|t| t.executed).sum()
    }

    pub fn total(&self) -> usize {
        self.targets.iter().map(|t| t.total).sum()
    }
}

/// Migration orchestrator: owns the pool registry, borrows the configuration.
pub struct Migrator {
    config: Config,
    pools: PoolRegistry,
}

impl Migrator {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            pools: PoolRegistry::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Executor for a node's own database. Exposed for the seed engine and
    /// raw query execution.
    pub async fn executor(&self, node: &NodeConfig) -> Result<PgExecutor> {
        self.pools.executor(node).await
    }

    /// Admin executor for a node's server.
    pub async fn admin_executor(&self, node: &NodeConfig) -> Result<PgExecutor> {
        self.pools.admin_executor(node).await
    }

    /// Release every pool. Call exactly once when all work is done.
    pub async fn close(&self) {
        self.pools.close_all().await;
    }

    /// Compute plans for every filtered target without changing anything.
    pub async fn plan(&self, options: &MigrateOptions) -> Result<Vec<TargetPlan>> {
        let targets = self
            .config
            .write_targets(options.name.as_deref(), options.tenant.as_deref());
        let mut plans = Vec::with_capacity(targets.len());

        for target in &targets {
            plans.push(self.plan_target(target, options).await?);
        }

        Ok(plans)
    }

    async fn plan_target(&self, target: &Target, options: &MigrateOptions) -> Result<TargetPlan> {
        let node = &target.node;
        let mut statements = Vec::new();
        let mut warnings = Vec::new();
        let mut table_status = Vec::new();

        // Database creation is decided up front; when the database is known
        // to be missing, reflection is pointless and every declared table is
        // create-only. An unreachable admin endpoint downgrades to a warning
        // so the remaining targets still get planned.
        let mut database_missing = false;
        if options.create_databases {
            match self.probe_database(node).await {
                Ok(true) => {}
                Ok(false) => {
                    info!("database {} does not exist, scheduling creation", node.name);
                    statements.push(emit::create_database(&node.name));
                    database_missing = true;
                }
                Err(e) => {
                    let msg = format!("cannot probe database {}: {}", node.name, e);
                    warn!("{}", msg);
                    warnings.push(msg);
                }
            }
        }

        let existing_tables: BTreeSet<String> = if database_missing {
            BTreeSet::new()
        } else {
            match self.list_tables(node).await {
                Ok(tables) => tables,
                Err(e) => {
                    // Cannot enumerate: proceed with create-only semantics.
                    let msg = format!("cannot enumerate tables on {}: {}", node.endpoint(), e);
                    warn!("{}", msg);
                    warnings.push(msg);
                    database_missing = true;
                    BTreeSet::new()
                }
            }
        };

        let aliases = self.config.field_aliases();
        let reflector = if database_missing {
            None
        } else {
            Some(Reflector::new(self.executor(node).await?))
        };

        let mut declared: BTreeSet<String> = BTreeSet::new();

        for path in files::discover_files(&node.schema_paths()) {
            let tables = match files::parse_declaration_file(&path, node.pref.as_deref()) {
                Ok(tables) => tables,
                Err(e) => {
                    let msg = format!("skipping {}: {}", path.display(), e);
                    warn!("{}", msg);
                    warnings.push(msg);
                    continue;
                }
            };

            for table in tables {
                if !declared.insert(table.name.clone()) {
                    continue;
                }

                let schema = match parse_fields(&table.name, &table.fields, &aliases) {
                    Ok(schema) => schema,
                    Err(e) => {
                        let msg = format!("skipping table {}: {}", table.name, e);
                        warn!("{}", msg);
                        warnings.push(msg);
                        continue;
                    }
                };

                let live_reflector = reflector
                    .as_ref()
                    .filter(|_| existing_tables.contains(&table.name));

                let table_statements = if let Some(reflector) = live_reflector {
                    match reflector.table_shape(&table.name).await {
                        Ok(shape) => diff_table(&table.name, &schema, &shape),
                        Err(e) => {
                            let msg =
                                format!("cannot reflect table {}, skipping: {}", table.name, e);
                            warn!("{}", msg);
                            warnings.push(msg);
                            continue;
                        }
                    }
                } else {
                    let mut created = emit::create_table(&table.name, &schema);
                    for column in &schema.individual_indexes {
                        created.push(emit::add_index(&table.name, column));
                    }
                    for (group, columns) in &schema.composite_indexes {
                        created.push(emit::add_composite_index(&table.name, group, columns));
                    }
                    for (group, columns) in &schema.composite_unique_indexes {
                        created.push(emit::add_composite_unique_index(&table.name, group, columns));
                    }
                    created
                };

                table_status.push(TableStatus {
                    table: table.name.clone(),
                    pending: table_statements.len(),
                });
                statements.extend(table_statements);
            }
        }

        // Orphans: reflected tables no declaration accounts for.
        let mut orphans = orphan_tables(&existing_tables, &declared);

        if options.drop_orphans {
            for orphan in orphans.drain(..) {
                statements.push(emit::drop_table(&orphan));
            }
        } else if !orphans.is_empty() {
            warnings.push(format!("orphan tables not in any declaration: {}", orphans.join(", ")));
        }

        Ok(TargetPlan {
            cluster_id: target.cluster_id.clone(),
            node: node.clone(),
            statements,
            orphans,
            warnings,
            table_status,
        })
    }

    async fn probe_database(&self, node: &NodeConfig) -> Result<bool> {
        let admin = self.admin_executor(node).await?;
        database_exists(&admin, &node.name).await
    }

    async fn list_tables(&self, node: &NodeConfig) -> Result<BTreeSet<String>> {
        let reflector = Reflector::new(self.executor(node).await?);
        Ok(reflector.list_tables().await?.into_iter().collect())
    }

    /// Apply plans one statement at a time, fail-soft.
    ///
    /// A failing statement is recorded and the run continues; a target whose
    /// executor cannot be obtained at all is aborted and the run moves on.
    /// When `cancel` flips to true, dispatch stops after the statement in
    /// flight.
    pub async fn apply(
        &self,
        plans: &[TargetPlan],
        cancel: Option<watch::Receiver<bool>>,
    ) -> Result<MigrationReport> {
        let mut report = MigrationReport::default();

        for plan in plans {
            report.targets.push(self.apply_target(plan, cancel.as_ref()).await);
        }

        Ok(report)
    }

    async fn apply_target(
        &self,
        plan: &TargetPlan,
        cancel: Option<&watch::Receiver<bool>>,
    ) -> TargetReport {
        let mut result = TargetReport {
            cluster_id: plan.cluster_id.clone(),
            database: plan.node.name.clone(),
            executed: 0,
            total: plan.statements.len(),
            failures: Vec::new(),
        };

        // The target executor is created lazily: when the plan starts with
        // CREATE DATABASE, connecting to the target before it exists would
        // fail.
        let mut target_executor: Option<PgExecutor> = None;

        for statement in &plan.statements {
            if cancel.map(|rx| *rx.borrow()).unwrap_or(false) {
                warn!(
                    "cancelled, {} of {} statements applied on {}",
                    result.executed,
                    result.total,
                    plan.node.endpoint()
                );
                break;
            }

            let outcome = if statement.kind == StatementKind::CreateDb {
                match self.admin_executor(&plan.node).await {
                    Ok(admin) => admin.batch(&statement.sql).await,
                    Err(e) => Err(e),
                }
            } else {
                let executor = match &target_executor {
                    Some(executor) => Ok(executor.clone()),
                    None => match self.executor(&plan.node).await {
                        Ok(executor) => {
                            target_executor = Some(executor.clone());
                            Ok(executor)
                        }
                        Err(e) => Err(e),
                    },
                };
                match executor {
                    Ok(executor) => executor.batch(&statement.sql).await,
                    Err(e) => {
                        // Hard connectivity failure: abort this target.
                        result.failures.push(StatementFailure {
                            table: statement.table.clone(),
                            sql: statement.sql.clone(),
                            message: e.to_string(),
                        });
                        warn!("aborting {}: {}", plan.node.endpoint(), e);
                        return result;
                    }
                }
            };

            match outcome {
                Ok(()) => {
                    info!("applied {}", statement);
                    result.executed += 1;
                }
                Err(e) => {
                    warn!("statement failed on {}: {}", plan.node.endpoint(), e);
                    result.failures.push(StatementFailure {
                        table: statement.table.clone(),
                        sql: statement.sql.clone(),
                        message: e.to_string(),
                    });
                }
            }
        }

        result
    }
}

/// Tables present in the reflection but absent from every declaration.
fn orphan_tables(existing: &BTreeSet<String>, declared: &BTreeSet<String>) -> Vec<String> {
    existing
        .iter()
        .filter(|t| !declared.contains(*t))
        .cloned()
        .collect()
}
