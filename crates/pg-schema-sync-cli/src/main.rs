//! pg-schema-sync CLI - declarative PostgreSQL schema management and seeding.

use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use pg_schema_sync::core::value::row_to_values;
use pg_schema_sync::seed::{discover_seed_files, parse_seed_file, SeedEngine, SeedReport};
use pg_schema_sync::{
    dump_tables, Config, DisplayMode, DumpOptions, MigrateOptions, Migrator, SyncError, TargetPlan,
};
use tokio::sync::watch;
use tracing::{info, warn, Level};

#[derive(Parser)]
#[command(name = "pg-schema-sync")]
#[command(about = "Declarative PostgreSQL schema management and data seeding")]
#[command(version)]
struct Cli {
    /// Path to the configuration file
    #[arg(long, global = true, default_value = "config.yml")]
    config: PathBuf,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, global = true, default_value = "warn")]
    verbosity: String,

    /// Log format: text or json
    #[arg(long, global = true, default_value = "text")]
    log_format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute and apply schema changes
    Up {
        /// Apply without asking for confirmation
        #[arg(long, short = 'y')]
        yes: bool,

        /// Create missing target databases
        #[arg(long)]
        create: bool,

        /// Restrict to one cluster id or database name
        #[arg(long)]
        name: Option<String>,

        /// Restrict to nodes serving this tenant key
        #[arg(long)]
        tenant: Option<String>,

        /// Do not print individual statements while applying
        #[arg(long)]
        mute: bool,

        /// Dry run: print the plan and change nothing
        #[arg(long)]
        dry: bool,

        /// Drop tables that no declaration accounts for
        #[arg(long)]
        drop_orphans: bool,

        /// Plan rendering: grouped or sql
        #[arg(long)]
        display: Option<DisplayModeArg>,
    },

    /// Print the schema changes that would be applied
    Diff {
        /// Restrict to one cluster id or database name
        #[arg(long)]
        name: Option<String>,

        /// Restrict to nodes serving this tenant key
        #[arg(long)]
        tenant: Option<String>,

        /// Include DROP TABLE statements for orphans
        #[arg(long)]
        drop_orphans: bool,

        /// Plan rendering: grouped or sql
        #[arg(long)]
        display: Option<DisplayModeArg>,
    },

    /// Per-table up-to-date/pending summary
    Status {
        /// Restrict to one cluster id or database name
        #[arg(long)]
        name: Option<String>,

        /// Restrict to nodes serving this tenant key
        #[arg(long)]
        tenant: Option<String>,
    },

    /// Execute raw SQL against the filtered targets
    Query {
        /// The SQL to run
        sql: String,

        /// Restrict to one cluster id or database name
        #[arg(long)]
        name: Option<String>,
    },

    /// Reconcile declared seed rows against live tables
    Seed {
        /// A single seed file (defaults to every file under seedPath)
        file: Option<PathBuf>,

        /// Apply without asking for confirmation
        #[arg(long, short = 'y')]
        yes: bool,

        /// Only reconcile this table
        #[arg(long)]
        table: Option<String>,

        /// Restrict to one cluster id or database name
        #[arg(long)]
        name: Option<String>,
    },

    /// Dump live table contents into seed files
    #[command(name = "seed:dump")]
    SeedDump {
        /// Tables to dump
        #[arg(long)]
        table: Vec<String>,

        /// Tables to leave out
        #[arg(long)]
        exclude: Vec<String>,

        /// Dump every table
        #[arg(long)]
        all: bool,

        /// Row limit per table
        #[arg(long)]
        limit: Option<i64>,

        /// Skip columns with sequence-bound defaults
        #[arg(long)]
        skip_auto: bool,

        /// Restrict to one cluster id or database name
        #[arg(long)]
        name: Option<String>,
    },

    /// Write sample configuration, schema and seed files
    Init,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
enum DisplayModeArg {
    Grouped,
    Sql,
}

impl From<DisplayModeArg> for DisplayMode {
    fn from(arg: DisplayModeArg) -> Self {
        match arg {
            DisplayModeArg::Grouped => DisplayMode::Grouped,
            DisplayModeArg::Sql => DisplayMode::Sql,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<ExitCode, SyncError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format)
        .map_err(|e| SyncError::Config(e.to_string()))?;

    if matches!(cli.command, Commands::Init) {
        return init_samples();
    }

    let config = Config::load(&cli.config)?;
    info!("loaded configuration from {:?}", cli.config);
    let migrator = Migrator::new(config);

    let outcome = dispatch(&cli, &migrator).await;
    migrator.close().await;
    outcome
}

async fn dispatch(cli: &Cli, migrator: &Migrator) -> Result<ExitCode, SyncError> {
    match &cli.command {
        Commands::Up {
            yes,
            create,
            name,
            tenant,
            mute,
            dry,
            drop_orphans,
            display,
        } => {
            let options = MigrateOptions {
                name: name.clone(),
                tenant: tenant.clone(),
                create_databases: *create,
                drop_orphans: *drop_orphans,
            };
            let mode = resolve_display(migrator, *display);
            let plans = migrator.plan(&options).await?;
            render_plans(&plans, mode);

            let pending: usize = plans.iter().map(|p| p.statements.len()).sum();
            if pending == 0 {
                println!("Everything up to date.");
                return Ok(ExitCode::SUCCESS);
            }
            if *dry {
                return Ok(ExitCode::SUCCESS);
            }
            if !*yes && !confirm(&format!("Apply {} statement(s)?", pending)) {
                println!("Aborted.");
                return Ok(ExitCode::SUCCESS);
            }

            let cancel = spawn_cancel_watcher();
            let report = migrator.apply(&plans, Some(cancel)).await?;

            if !*mute {
                for target in &report.targets {
                    println!(
                        "{}/{}: {} of {} statements applied",
                        target.cluster_id, target.database, target.executed, target.total
                    );
                    for failure in &target.failures {
                        eprintln!("  FAILED [{}] {}\n    {}", failure.table, failure.sql, failure.message);
                    }
                }
            }

            Ok(exit_code_for(report.has_failures()))
        }

        Commands::Diff {
            name,
            tenant,
            drop_orphans,
            display,
        } => {
            let options = MigrateOptions {
                name: name.clone(),
                tenant: tenant.clone(),
                create_databases: false,
                drop_orphans: *drop_orphans,
            };
            let mode = resolve_display(migrator, *display);
            let plans = migrator.plan(&options).await?;
            render_plans(&plans, mode);
            if plans.iter().all(|p| p.is_up_to_date()) {
                println!("Everything up to date.");
            }
            Ok(ExitCode::SUCCESS)
        }

        Commands::Status { name, tenant } => {
            let options = MigrateOptions {
                name: name.clone(),
                tenant: tenant.clone(),
                create_databases: false,
                drop_orphans: false,
            };
            let plans = migrator.plan(&options).await?;
            for plan in &plans {
                println!("{}/{}:", plan.cluster_id, plan.node.name);
                for status in &plan.table_status {
                    if status.pending == 0 {
                        println!("  {:<32} up-to-date", status.table);
                    } else {
                        println!("  {:<32} pending ({})", status.table, status.pending);
                    }
                }
                for orphan in &plan.orphans {
                    println!("  {:<32} orphan", orphan);
                }
            }
            Ok(ExitCode::SUCCESS)
        }

        Commands::Query { sql, name } => {
            let targets = migrator.config().write_targets(name.as_deref(), None);
            if targets.is_empty() {
                return Err(SyncError::Config("no matching targets".into()));
            }
            for target in &targets {
                println!("-- {}/{}", target.cluster_id, target.node.name);
                let executor = migrator.executor(&target.node).await?;
                let rows = executor.query(sql, &[]).await?;
                print_rows(&rows)?;
            }
            Ok(ExitCode::SUCCESS)
        }

        Commands::Seed {
            file,
            yes,
            table,
            name,
        } => seed_command(migrator, file.as_deref(), *yes, table.as_deref(), name.as_deref()).await,

        Commands::SeedDump {
            table,
            exclude,
            all,
            limit,
            skip_auto,
            name,
        } => {
            let targets = migrator.config().write_targets(name.as_deref(), None);
            let Some(target) = targets.first() else {
                return Err(SyncError::Config("no matching targets".into()));
            };
            let executor = migrator.executor(&target.node).await?;
            let options = DumpOptions {
                tables: table.clone(),
                exclude: exclude.clone(),
                all: *all,
                limit: *limit,
                skip_auto: *skip_auto,
            };
            let config = migrator.config();
            let dumped =
                dump_tables(&executor, &config.seed_path, &config.seed_suffix, &options).await?;
            for d in &dumped {
                println!("{}: {} rows -> {}", d.table, d.rows, d.file.display());
            }
            Ok(ExitCode::SUCCESS)
        }

        Commands::Init => unreachable!("handled before config load"),
    }
}

async fn seed_command(
    migrator: &Migrator,
    file: Option<&std::path::Path>,
    yes: bool,
    table_filter: Option<&str>,
    name: Option<&str>,
) -> Result<ExitCode, SyncError> {
    let config = migrator.config();

    let files: Vec<PathBuf> = match file {
        Some(f) => vec![f.to_path_buf()],
        None => discover_seed_files(&config.seed_path, &config.seed_suffix),
    };
    if files.is_empty() {
        println!("No seed files found under {}.", config.seed_path);
        return Ok(ExitCode::SUCCESS);
    }

    let mut declared = Vec::new();
    for path in &files {
        match parse_seed_file(path) {
            Ok(mut tables) => declared.append(&mut tables),
            Err(e) => warn!("skipping {}: {}", path.display(), e),
        }
    }
    if let Some(wanted) = table_filter {
        declared.retain(|t| t.table == wanted);
    }
    if declared.is_empty() {
        println!("Nothing to seed.");
        return Ok(ExitCode::SUCCESS);
    }

    let targets = migrator.config().write_targets(name, None);
    if targets.is_empty() {
        return Err(SyncError::Config("no matching targets".into()));
    }

    let mut any_failed = false;

    for target in &targets {
        println!("-- {}/{}", target.cluster_id, target.node.name);
        let executor = migrator.executor(&target.node).await?;
        let engine = SeedEngine::new(executor, target.node.pref.clone());

        let mut analyses = Vec::new();
        let mut reports: Vec<SeedReport> = Vec::new();

        for decl in &declared {
            match engine.analyze(decl).await {
                Ok(analysis) => {
                    let (insert, update, unchanged) = analysis.counts();
                    println!(
                        "  {:<32} {} insert, {} update, {} unchanged{}",
                        analysis.table,
                        insert,
                        update,
                        unchanged,
                        if analysis.skipped > 0 {
                            format!(", {} skipped", analysis.skipped)
                        } else {
                            String::new()
                        }
                    );
                    analyses.push(analysis);
                }
                Err(e) => {
                    warn!("cannot analyze {}: {}", decl.table, e);
                    reports.push(SeedReport {
                        table: decl.table.clone(),
                        skipped: decl.rows.len(),
                        ..Default::default()
                    });
                }
            }
        }

        let work: usize = analyses
            .iter()
            .map(|a| {
                let (insert, update, _) = a.counts();
                insert + update
            })
            .sum();

        if work == 0 {
            println!("  nothing to do");
        } else {
            if !yes && !confirm(&format!("Apply {} row change(s)?", work)) {
                println!("Aborted.");
                return Ok(ExitCode::SUCCESS);
            }
            for analysis in &analyses {
                reports.push(engine.apply(analysis).await);
            }
        }

        for report in &reports {
            println!(
                "  {:<32} {} inserted, {} updated, {} unchanged, {} skipped, {} failed",
                report.table,
                report.inserted,
                report.updated,
                report.unchanged,
                report.skipped,
                report.failed
            );
            if report.failed > 0 {
                any_failed = true;
            }
        }
    }

    Ok(exit_code_for(any_failed))
}

/// Print a plan for every target.
fn render_plans(plans: &[TargetPlan], mode: DisplayMode) {
    for plan in plans {
        println!("-- {}/{}", plan.cluster_id, plan.node.name);
        for warning in &plan.warnings {
            eprintln!("warning: {}", warning);
        }
        match mode {
            DisplayMode::Sql => {
                for statement in &plan.statements {
                    println!("{};", statement.sql);
                }
            }
            DisplayMode::Grouped => {
                for statement in &plan.statements {
                    println!("  {}", statement);
                    println!("    {}", statement.sql);
                }
            }
        }
    }
}

fn resolve_display(migrator: &Migrator, arg: Option<DisplayModeArg>) -> DisplayMode {
    arg.map(DisplayMode::from)
        .unwrap_or(migrator.config().display_mode)
}

/// Render query rows as an aligned text table.
fn print_rows(rows: &[tokio_postgres::Row]) -> Result<(), SyncError> {
    let Some(first) = rows.first() else {
        println!("(0 rows)");
        return Ok(());
    };

    let headers: Vec<String> = first
        .columns()
        .iter()
        .map(|c| c.name().to_string())
        .collect();
    let mut cells: Vec<Vec<String>> = Vec::with_capacity(rows.len());
    for row in rows {
        cells.push(
            row_to_values(row)?
                .into_iter()
                .map(|(_, v)| match v {
                    serde_json::Value::Null => String::new(),
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                })
                .collect(),
        );
    }

    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in &cells {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.len());
        }
    }

    let header_line: Vec<String> = headers
        .iter()
        .zip(&widths)
        .map(|(h, w)| format!("{:<width$}", h, width = w))
        .collect();
    println!("{}", header_line.join(" | "));
    println!("{}", widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>().join("-+-"));
    for row in &cells {
        let line: Vec<String> = row
            .iter()
            .zip(&widths)
            .map(|(c, w)| format!("{:<width$}", c, width = w))
            .collect();
        println!("{}", line.join(" | "));
    }
    println!("({} rows)", rows.len());
    Ok(())
}

/// Ask a y/N question on stdin.
fn confirm(prompt: &str) -> bool {
    print!("{} [y/N] ", prompt);
    let _ = std::io::stdout().flush();
    let mut line = String::new();
    if std::io::stdin().lock().read_line(&mut line).is_err() {
        return false;
    }
    matches!(line.trim(), "y" | "Y" | "yes" | "YES")
}

/// Flip a watch channel to true on ctrl-c.
fn spawn_cancel_watcher() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, finishing the statement in flight");
            let _ = tx.send(true);
        }
    });
    rx
}

fn exit_code_for(failed: bool) -> ExitCode {
    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

/// Write sample config, schema and seed files for a fresh project.
fn init_samples() -> Result<ExitCode, SyncError> {
    let samples: &[(&str, &str)] = &[
        (
            "config.yml",
            "clusters:\n  app:\n    name: app_db\n    host: localhost\n    user: postgres\n    pass: <ENV.PGPASS>\n    path: ./schema\n\ncustomFields:\n  state:\n    type: VARCHAR(16)\n    default: active\n\nseedPath: ./seed\ndisplayMode: grouped\n",
        ),
        (
            "schema/users.yml",
            "users:\n  user_id: id\n  user_name: \"str required\"\n  user_email: \"email unique index\"\n  user_state: \"state\"\n  created_at: \"time default/now()\"\n",
        ),
        (
            "seed/users.yml",
            "users:\n  - { user_id: 1, user_name: admin, user_email: admin@example.com }\n",
        ),
    ];

    for (path, content) in samples {
        let path = std::path::Path::new(path);
        if path.exists() {
            println!("{} already exists, skipping", path.display());
            continue;
        }
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, content)?;
        println!("wrote {}", path.display());
    }

    Ok(ExitCode::SUCCESS)
}

fn setup_logging(verbosity: &str, format: &str) -> Result<(), String> {
    let level = match verbosity {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        other => return Err(format!("invalid verbosity '{}'", other)),
    };

    let builder = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false);

    match format {
        "json" => builder.json().init(),
        "text" => builder.init(),
        other => return Err(format!("invalid log format '{}'", other)),
    }

    Ok(())
}
