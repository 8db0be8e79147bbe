use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use satbench::config::Config;
use satbench::encode;
use satbench::executor::{execute, CancelToken, Limits, Outcome};
use satbench::facade::AccessFacade;
use satbench::instance;
use satbench::parser as model_parser;
use satbench::registry::SolverRegistry;
use satbench::scheduler::{ExperimentScheduler, ExperimentSpec};
use satbench::store::{CatalogStore, ExperimentStatus, InstanceFilter, RunFilter};

const EXIT_OK: i32 = 0;
const EXIT_ERROR: i32 = 1;
const EXIT_USAGE_ERROR: i32 = 2;

#[derive(Parser, Debug)]
#[command(
    name = "satbench",
    version,
    about = "SAT solver benchmarking suite — run bounded experiments and analyse them with competition metrics and non-parametric statistics"
)]
struct Cli {
    /// Configuration file (JSON). Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the data directory from the configuration.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Solver catalogue: list, install, compare.
    Solvers {
        #[command(subcommand)]
        action: SolversAction,
    },
    /// CNF benchmark catalogue.
    Instances {
        #[command(subcommand)]
        action: InstancesAction,
    },
    /// Experiment lifecycle: create, run, inspect, delete.
    Experiment {
        #[command(subcommand)]
        action: ExperimentAction,
    },
    /// Statistical analysis of a finished experiment.
    Analyze {
        #[command(subcommand)]
        action: AnalyzeAction,
    },
    /// Plot data series (JSON) for a finished experiment.
    Report {
        #[command(subcommand)]
        action: ReportAction,
    },
    /// Constraint modelling language: check, compile, solve.
    Model {
        #[command(subcommand)]
        action: ModelAction,
    },
    /// Aggregate catalogue counters.
    Dashboard,
}

#[derive(Subcommand, Debug)]
enum SolversAction {
    /// List all solvers with live status.
    List {
        /// Only solvers whose binary is present and runnable.
        #[arg(long)]
        ready: bool,
    },
    /// Fetch and build a solver from source.
    Install { key: String },
    /// Remove a solver's directory.
    Uninstall { key: String },
    /// Feature/capability comparison matrix.
    Compare,
}

#[derive(Subcommand, Debug)]
enum InstancesAction {
    /// Import CNF files into the catalogue.
    Add { paths: Vec<PathBuf> },
    /// List catalogued instances.
    List {
        #[arg(long)]
        family: Option<String>,
        #[arg(long)]
        search: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
enum ExperimentAction {
    /// Create an experiment over solvers × instances.
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        description: Option<String>,
        /// Wall-time budget per run, seconds.
        #[arg(long, default_value_t = satbench::config::DEFAULT_TIMEOUT_SECONDS)]
        timeout: u64,
        /// Memory ceiling per run, MiB.
        #[arg(long, default_value_t = satbench::config::DEFAULT_MEMORY_LIMIT_MIB)]
        memory: u64,
        #[arg(long, default_value_t = 1)]
        parallelism: u32,
        /// Solver ids, comma separated.
        #[arg(long, value_delimiter = ',', required = true)]
        solvers: Vec<u32>,
        /// Instance ids, comma separated.
        #[arg(long, value_delimiter = ',', required = true)]
        instances: Vec<u32>,
    },
    /// Run (or resume) an experiment in the foreground, streaming progress.
    Run {
        id: u32,
        /// Suppress the progress event stream.
        #[arg(long)]
        quiet: bool,
    },
    List,
    Status { id: u32 },
    /// Raw run rows recorded for an experiment.
    Runs { id: u32 },
    Delete { id: u32 },
}

#[derive(Subcommand, Debug)]
enum AnalyzeAction {
    /// PAR-k scores, VBS, solve matrix, family breakdown, ranking.
    Metrics { experiment: u32 },
    /// Wilcoxon/Mann-Whitney/sign tests plus effect sizes for two solvers.
    Pairwise {
        experiment: u32,
        solver1: String,
        solver2: String,
    },
    /// Friedman with Nemenyi/Conover post-hocs and corrections.
    Multi {
        experiment: u32,
        #[arg(long, default_value_t = 0.05)]
        alpha: f64,
    },
    /// BCa bootstrap confidence intervals.
    Bootstrap {
        experiment: u32,
        #[arg(long, default_value_t = satbench::bootstrap::DEFAULT_REPLICATES)]
        replicates: usize,
        #[arg(long, default_value_t = satbench::bootstrap::DEFAULT_SEED)]
        seed: u64,
        #[arg(long, default_value_t = 0.95)]
        confidence: f64,
    },
    /// Normality diagnostics for one solver's penalised times.
    Normality { experiment: u32, solver: String },
}

#[derive(Subcommand, Debug)]
enum ReportAction {
    Cactus { experiment: u32 },
    Ecdf { experiment: u32 },
    Survival { experiment: u32 },
    Profile {
        experiment: u32,
        #[arg(long, default_value_t = 100.0)]
        tau_max: f64,
    },
    Scatter {
        experiment: u32,
        solver1: String,
        solver2: String,
    },
    Heatmap { experiment: u32 },
    Par2 { experiment: u32 },
    /// Critical-difference diagram data (average ranks + cliques).
    Cd {
        experiment: u32,
        #[arg(long, default_value_t = 0.05)]
        alpha: f64,
    },
}

#[derive(Subcommand, Debug)]
enum ModelAction {
    /// Parse and validate a model; report diagnostics.
    Check { source: PathBuf },
    /// Compile a model to DIMACS CNF.
    Compile {
        source: PathBuf,
        /// Output CNF path (default: stdout).
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Also print the variable map.
        #[arg(long)]
        map: bool,
    },
    /// Compile, run a catalogued solver on the result, and decode.
    Solve {
        source: PathBuf,
        /// Solver key (must be installed).
        #[arg(long)]
        solver: String,
        #[arg(long, default_value_t = 60)]
        timeout: u64,
        #[arg(long, default_value_t = 4096)]
        memory: u64,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let code = run(cli);
    std::process::exit(code);
}

fn run(cli: Cli) -> i32 {
    let mut config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            return EXIT_USAGE_ERROR;
        }
    };
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }

    let registry = match SolverRegistry::bootstrap(config.solvers_dir()) {
        Ok(registry) => Arc::new(registry),
        Err(e) => {
            eprintln!("error: {e}");
            return EXIT_ERROR;
        }
    };
    let store = match CatalogStore::open(config.store_path()) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            eprintln!("error: {e}");
            return EXIT_ERROR;
        }
    };
    let facade = AccessFacade::new(Arc::clone(&store), Arc::clone(&registry));
    let scheduler = ExperimentScheduler::new(Arc::clone(&store), Arc::clone(&registry));

    match cli.command {
        Command::Solvers { action } => solvers_command(action, &registry),
        Command::Instances { action } => instances_command(action, &config, &store),
        Command::Experiment { action } => experiment_command(action, &scheduler),
        Command::Analyze { action } => analyze_command(action, &facade),
        Command::Report { action } => report_command(action, &facade),
        Command::Model { action } => model_command(action, &config, &registry),
        Command::Dashboard => emit_result(facade.dashboard()),
    }
}

// ── Output helpers ──────────────────────────────────────────────────────

fn emit<T: Serialize>(value: &T) -> i32 {
    match serde_json::to_string_pretty(value) {
        Ok(json) => {
            println!("{json}");
            EXIT_OK
        }
        Err(e) => {
            eprintln!("error: serialisation failed: {e}");
            EXIT_ERROR
        }
    }
}

fn emit_result<T: Serialize, E: std::fmt::Display>(result: Result<T, E>) -> i32 {
    match result {
        Ok(value) => emit(&value),
        Err(e) => {
            eprintln!("error: {e}");
            EXIT_ERROR
        }
    }
}

// ── Subcommand bodies ───────────────────────────────────────────────────

fn solvers_command(action: SolversAction, registry: &SolverRegistry) -> i32 {
    match action {
        SolversAction::List { ready } => {
            if ready {
                emit(&registry.ready())
            } else {
                emit(&registry.list())
            }
        }
        SolversAction::Install { key } => match registry.install(&key) {
            Ok(outcome) => {
                let code = if outcome.success { EXIT_OK } else { EXIT_ERROR };
                emit(&outcome);
                code
            }
            Err(e) => {
                eprintln!("error: {e}");
                EXIT_USAGE_ERROR
            }
        },
        SolversAction::Uninstall { key } => match registry.uninstall(&key) {
            Ok(()) => {
                println!("uninstalled {key}");
                EXIT_OK
            }
            Err(e) => {
                eprintln!("error: {e}");
                EXIT_ERROR
            }
        },
        SolversAction::Compare => emit(&registry.comparison_matrix()),
    }
}

fn instances_command(action: InstancesAction, config: &Config, store: &CatalogStore) -> i32 {
    match action {
        InstancesAction::Add { paths } => {
            if paths.is_empty() {
                eprintln!("error: no files given");
                return EXIT_USAGE_ERROR;
            }
            #[derive(Serialize)]
            struct Added {
                id: u32,
                filename: String,
                family: String,
            }
            let mut added = Vec::new();
            for path in &paths {
                let meta = match instance::import(path, &config.families) {
                    Ok(meta) => meta,
                    Err(e) => {
                        eprintln!("error: {e}");
                        return EXIT_ERROR;
                    }
                };
                let filename = meta.filename.clone();
                let family = meta.family.clone();
                match store.add_instance(meta) {
                    Ok(id) => added.push(Added {
                        id,
                        filename,
                        family,
                    }),
                    Err(e) => {
                        eprintln!("error: {e}");
                        return EXIT_ERROR;
                    }
                }
            }
            emit(&added)
        }
        InstancesAction::List { family, search } => emit_result(store.list_instances(
            &InstanceFilter {
                family,
                difficulty: None,
                search,
            },
        )),
    }
}

fn experiment_command(action: ExperimentAction, scheduler: &ExperimentScheduler) -> i32 {
    match action {
        ExperimentAction::Create {
            name,
            description,
            timeout,
            memory,
            parallelism,
            solvers,
            instances,
        } => {
            let spec = ExperimentSpec {
                name,
                description,
                timeout_seconds: timeout,
                memory_limit_mib: memory,
                parallelism,
                solver_ids: solvers,
                instance_ids: instances,
            };
            match scheduler.create(&spec) {
                Ok(id) => {
                    println!("{id}");
                    EXIT_OK
                }
                Err(e) => {
                    eprintln!("error: {e}");
                    EXIT_USAGE_ERROR
                }
            }
        }
        ExperimentAction::Run { id, quiet } => {
            let subscription = scheduler.subscribe(id);
            if let Err(e) = scheduler.start(id) {
                eprintln!("error: {e}");
                return EXIT_ERROR;
            }
            // Stream events until the terminal one; the worker thread owns
            // the run loop, so this is pure observation.
            loop {
                match subscription.recv_timeout(Duration::from_secs(3600)) {
                    Some(event) => {
                        if !quiet {
                            if let Ok(line) = serde_json::to_string(&event) {
                                println!("{line}");
                            }
                        }
                        if event.kind.is_terminal() {
                            break;
                        }
                    }
                    None => {
                        eprintln!("error: progress stream went silent");
                        return EXIT_ERROR;
                    }
                }
            }
            match scheduler.store().experiment(id) {
                Ok(exp) if exp.status == ExperimentStatus::Completed => EXIT_OK,
                Ok(_) => EXIT_ERROR,
                Err(e) => {
                    eprintln!("error: {e}");
                    EXIT_ERROR
                }
            }
        }
        ExperimentAction::List => emit_result(scheduler.store().list_experiments(None)),
        ExperimentAction::Status { id } => emit_result(scheduler.progress(id)),
        ExperimentAction::Runs { id } => emit_result(scheduler.store().runs(&RunFilter {
            experiment_id: Some(id),
            ..Default::default()
        })),
        ExperimentAction::Delete { id } => match scheduler.delete(id) {
            Ok(()) => {
                println!("deleted {id}");
                EXIT_OK
            }
            Err(e) => {
                eprintln!("error: {e}");
                EXIT_ERROR
            }
        },
    }
}

fn analyze_command(action: AnalyzeAction, facade: &AccessFacade) -> i32 {
    match action {
        AnalyzeAction::Metrics { experiment } => emit_result(facade.metrics(experiment)),
        AnalyzeAction::Pairwise {
            experiment,
            solver1,
            solver2,
        } => emit_result(facade.pairwise(experiment, &solver1, &solver2)),
        AnalyzeAction::Multi { experiment, alpha } => {
            emit_result(facade.multi_solver(experiment, alpha))
        }
        AnalyzeAction::Bootstrap {
            experiment,
            replicates,
            seed,
            confidence,
        } => emit_result(facade.bootstrap(experiment, replicates, seed, confidence)),
        AnalyzeAction::Normality { experiment, solver } => {
            emit_result(facade.normality(experiment, &solver))
        }
    }
}

fn report_command(action: ReportAction, facade: &AccessFacade) -> i32 {
    match action {
        ReportAction::Cactus { experiment } => emit_result(facade.cactus(experiment)),
        ReportAction::Ecdf { experiment } => emit_result(facade.ecdf(experiment)),
        ReportAction::Survival { experiment } => emit_result(facade.survival(experiment)),
        ReportAction::Profile {
            experiment,
            tau_max,
        } => emit_result(facade.performance_profile(experiment, tau_max)),
        ReportAction::Scatter {
            experiment,
            solver1,
            solver2,
        } => emit_result(facade.scatter(experiment, &solver1, &solver2)),
        ReportAction::Heatmap { experiment } => emit_result(facade.heatmap(experiment)),
        ReportAction::Par2 { experiment } => emit_result(facade.par2_bars(experiment)),
        ReportAction::Cd { experiment, alpha } => {
            emit_result(facade.critical_difference(experiment, alpha))
        }
    }
}

fn model_command(action: ModelAction, config: &Config, registry: &SolverRegistry) -> i32 {
    match action {
        ModelAction::Check { source } => match compile_model(&source) {
            Ok(compiled) => {
                #[derive(Serialize)]
                struct CheckReport {
                    ok: bool,
                    variables: u32,
                    auxiliaries: u32,
                    clauses: usize,
                }
                emit(&CheckReport {
                    ok: true,
                    variables: compiled.num_user_vars,
                    auxiliaries: compiled.num_aux_vars,
                    clauses: compiled.cnf.clauses.len(),
                })
            }
            Err(code) => code,
        },
        ModelAction::Compile {
            source,
            output,
            map,
        } => match compile_model(&source) {
            Ok(compiled) => {
                let dimacs = compiled.cnf.to_dimacs();
                match output {
                    Some(path) => {
                        if let Err(e) = std::fs::write(&path, &dimacs) {
                            eprintln!("error: {}: {e}", path.display());
                            return EXIT_ERROR;
                        }
                    }
                    None => print!("{dimacs}"),
                }
                if map {
                    return emit(&compiled.var_map);
                }
                EXIT_OK
            }
            Err(code) => code,
        },
        ModelAction::Solve {
            source,
            solver,
            timeout,
            memory,
        } => {
            let compiled = match compile_model(&source) {
                Ok(compiled) => compiled,
                Err(code) => return code,
            };
            let adapter = match registry.by_key(&solver) {
                Ok(adapter) => adapter,
                Err(e) => {
                    eprintln!("error: {e}");
                    return EXIT_USAGE_ERROR;
                }
            };

            let cnf_dir = config.generated_cnf_dir();
            if let Err(e) = std::fs::create_dir_all(&cnf_dir) {
                eprintln!("error: {}: {e}", cnf_dir.display());
                return EXIT_ERROR;
            }
            let stem = source
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "model".to_string());
            let cnf_path = cnf_dir.join(format!("{stem}.cnf"));
            if let Err(e) = std::fs::write(&cnf_path, compiled.cnf.to_dimacs()) {
                eprintln!("error: {}: {e}", cnf_path.display());
                return EXIT_ERROR;
            }

            let limits = Limits {
                timeout_seconds: timeout,
                memory_limit_mib: memory,
            };
            let record = execute(
                adapter,
                registry.solvers_root(),
                &cnf_path,
                &limits,
                &CancelToken::new(),
            );

            #[derive(Serialize)]
            struct SolveReport {
                outcome: Outcome,
                wall_seconds: f64,
                cnf_path: PathBuf,
                #[serde(skip_serializing_if = "Option::is_none")]
                assignment: Option<std::collections::BTreeMap<String, bool>>,
                #[serde(skip_serializing_if = "String::is_empty")]
                error_message: String,
            }
            let assignment = (record.outcome == Outcome::Sat)
                .then(|| compiled.decode_assignment(&record.stdout_prefix));
            emit(&SolveReport {
                outcome: record.outcome,
                wall_seconds: record.wall_seconds,
                cnf_path,
                assignment,
                error_message: record.error_message,
            })
        }
    }
}

/// Parse + compile a model file, printing diagnostics with line/column on
/// failure.
fn compile_model(source: &Path) -> Result<encode::CompiledModel, i32> {
    let text = match std::fs::read_to_string(source) {
        Ok(text) => text,
        Err(e) => {
            eprintln!("error: {}: {e}", source.display());
            return Err(EXIT_USAGE_ERROR);
        }
    };

    let parsed = model_parser::parse(&text);
    if !parsed.errors.is_empty() {
        for diag in parsed.diagnostics() {
            eprintln!("{}: {}", source.display(), diag.render(&text));
        }
        return Err(EXIT_ERROR);
    }
    let model = match parsed.model {
        Some(model) => model,
        None => {
            eprintln!("error: {}: parse produced no model", source.display());
            return Err(EXIT_ERROR);
        }
    };

    match encode::compile(&model) {
        Ok(compiled) => Ok(compiled),
        Err(diags) => {
            for diag in diags {
                eprintln!("{}: {}", source.display(), diag.render(&text));
            }
            Err(EXIT_ERROR)
        }
    }
}
