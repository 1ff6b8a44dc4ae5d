use anyhow::{bail, Context, Result};
use atom_pipeline::cli::commands::{
    apply_var_overrides, ConvertCommand, ExecCommand, HistoryCommand, ListAtomsCommand, PipelineFormat,
    RunCommand, ValidateCommand,
};
use atom_pipeline::cli::output::*;
use atom_pipeline::cli::{Cli, Command};
use atom_pipeline::persistence::{create_summary, HistoryBackend, InMemoryHistory, RunSummary};
use atom_pipeline::{
    AtomRegistry, DslConfig, EventHook, ExecutionContext, ExecutionStatus, Parser,
    PipelineDefinition, TracingHook, UnknownTypePolicy,
};
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging; RUST_LOG wins over --verbose
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set logging subscriber")?;

    let config = match &cli.config {
        Some(path) => DslConfig::from_file(path)?,
        None => DslConfig::default(),
    };
    debug!("Using config {:?}", config);

    match &cli.command {
        Command::Run(cmd) => run_pipeline(cmd, &config, cli.verbose).await?,
        Command::Exec(cmd) => exec_pipeline(cmd, &config, cli.verbose).await?,
        Command::Validate(cmd) => validate_pipeline(cmd, &config)?,
        Command::Convert(cmd) => convert_pipeline(cmd, &config)?,
        Command::ListAtoms(cmd) => list_atoms(cmd)?,
        Command::History(cmd) => show_history(cmd, &config).await?,
    }

    Ok(())
}

/// Load a pipeline file in whichever representation its extension names
fn load_pipeline(path: &Path, parser: &Parser) -> Result<PipelineDefinition> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read pipeline file: {}", path.display()))?;

    let definition = match PipelineFormat::from_path(path) {
        PipelineFormat::Json => PipelineDefinition::from_json(&content)?,
        PipelineFormat::Yaml => PipelineDefinition::from_yaml(&content)?,
        PipelineFormat::Dsl => parser.parse(&content)?,
    };
    Ok(definition)
}

fn apply_overrides(pipeline: &mut PipelineDefinition, vars: &[(String, String)], announce: bool) {
    apply_var_overrides(pipeline, vars);
    if announce {
        for (key, value) in vars {
            println!(
                "{} Variable override: {} = {}",
                INFO,
                style(key).cyan(),
                style(value).dim()
            );
        }
    }
}

fn build_context(data: Option<&str>, domain: Option<&str>) -> Result<ExecutionContext> {
    let mut ctx = ExecutionContext::new();
    if let Some(data) = data {
        ctx.data = serde_json::from_str(data).context("--data is not valid JSON")?;
    }
    if let Some(domain) = domain {
        ctx = ctx.with_domain(domain);
    }
    Ok(ctx)
}

async fn open_history(config: &DslConfig) -> Result<Arc<dyn HistoryBackend>> {
    #[cfg(feature = "sqlite")]
    {
        use atom_pipeline::persistence::SqliteHistory;

        let history = match &config.history_path {
            Some(path) => SqliteHistory::new(path).await?,
            None => SqliteHistory::with_default_path().await?,
        };
        Ok(Arc::new(history))
    }

    #[cfg(not(feature = "sqlite"))]
    {
        let _ = config;
        Ok(Arc::new(InMemoryHistory::new()))
    }
}

async fn run_pipeline(cmd: &RunCommand, config: &DslConfig, verbose: bool) -> Result<()> {
    let parser = Parser::with_config(config.parser_config());
    let mut pipeline = load_pipeline(&cmd.file, &parser).context("Failed to load pipeline")?;

    let announce = cmd.status_lines();
    if announce {
        println!(
            "{} Loaded pipeline: {}",
            INFO,
            style(&pipeline.name).bold()
        );
    }

    apply_overrides(&mut pipeline, &cmd.var, announce);
    let ctx = build_context(cmd.data.as_deref(), cmd.domain.as_deref())?;

    let record = !cmd.no_history && config.history;
    let history: Arc<dyn HistoryBackend> = if record {
        open_history(config).await?
    } else {
        Arc::new(InMemoryHistory::new())
    };

    // Saved as running first so an interrupted run still shows up
    history
        .save_run(&create_summary(&pipeline, &ctx, ExecutionStatus::Running))
        .await?;
    let summary = execute(&pipeline, ctx, config, verbose, cmd.json).await?;
    history.save_run(&summary).await?;
    if record && announce {
        println!(
            "{} Run saved to history (ID: {})",
            INFO,
            style(&summary.execution_id.to_string()[..8]).dim()
        );
    }

    finish(&summary, announce)
}

async fn exec_pipeline(cmd: &ExecCommand, config: &DslConfig, verbose: bool) -> Result<()> {
    let parser = Parser::with_config(config.parser_config());
    let text = if cmd.dsl == "-" {
        std::io::read_to_string(std::io::stdin()).context("Failed to read pipeline from stdin")?
    } else {
        cmd.dsl.clone()
    };
    let mut pipeline = parser.parse(&text)?;

    apply_overrides(&mut pipeline, &cmd.var, cmd.status_lines());
    let ctx = build_context(cmd.data.as_deref(), cmd.domain.as_deref())?;

    let summary = execute(&pipeline, ctx, config, verbose, cmd.json).await?;
    finish(&summary, cmd.status_lines())
}

/// Run `pipeline` with console progress and print the resulting context
async fn execute(
    pipeline: &PipelineDefinition,
    mut ctx: ExecutionContext,
    config: &DslConfig,
    verbose: bool,
    as_json: bool,
) -> Result<RunSummary> {
    let registry = Arc::new(AtomRegistry::with_builtins());
    let mut executor = config.executor(registry);

    let progress = create_progress_bar(pipeline.steps.len());
    let bar = progress.clone();
    executor.add_hook(Box::new(EventHook::new(move |event| {
        bar.println(format_execution_event(&event));
        if matches!(
            event,
            atom_pipeline::ExecutionEvent::StepCompleted { .. }
                | atom_pipeline::ExecutionEvent::StepFailed { .. }
        ) {
            bar.inc(1);
        }
    })));
    if verbose {
        executor.add_hook(Box::new(TracingHook));
    }

    let result = executor.execute_async(pipeline, &mut ctx).await;
    progress.finish_and_clear();

    let status = ExecutionStatus::from_outcome(&result, &ctx);
    if let Err(e) = &result {
        error!("{}", e);
    }

    if as_json {
        let output = json!({
            "status": status.to_string(),
            "data": ctx.data,
            "summary": ctx.summary(),
            "errors": ctx.errors,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("\n{}", style("Result:").bold());
        println!("{}", format_value(&ctx.data, 40));
        if verbose {
            println!("\n{}", style("Log:").bold());
            for entry in &ctx.logs {
                println!("{}", format_log_entry(entry));
            }
        }
    }

    Ok(create_summary(pipeline, &ctx, status))
}

/// Print the closing line; a run that did not succeed exits with status 1
fn finish(summary: &RunSummary, announce: bool) -> Result<()> {
    if !summary.status.is_success() {
        if announce {
            println!(
                "\n{} {} {}",
                CROSS,
                style(&summary.pipeline_name).bold(),
                style("failed").red()
            );
        }
        std::process::exit(1);
    }
    if !announce {
        return Ok(());
    }

    match summary.status {
        ExecutionStatus::CompletedWithErrors => println!(
            "\n{} {} completed with {} error(s)",
            WARN,
            style(&summary.pipeline_name).bold(),
            style(summary.error_count).yellow()
        ),
        _ => println!(
            "\n{} {} completed {}",
            CHECK,
            style(&summary.pipeline_name).bold(),
            style("successfully").green()
        ),
    }
    Ok(())
}

fn validate_pipeline(cmd: &ValidateCommand, config: &DslConfig) -> Result<()> {
    println!("{} Validating pipeline...", INFO);

    let mut parser_config = config.parser_config();
    if cmd.strict {
        parser_config.unknown_type = UnknownTypePolicy::Reject;
    }
    let parser = Parser::with_config(parser_config);

    let pipeline = match load_pipeline(&cmd.file, &parser) {
        Ok(pipeline) => pipeline,
        Err(e) => {
            println!("{} Validation failed:", CROSS);
            println!("  {}", style(format!("{:#}", e)).red());
            std::process::exit(1);
        }
    };

    let registry = AtomRegistry::with_builtins();
    let missing: Vec<String> = pipeline
        .atoms()
        .filter(|atom| !registry.contains(atom.atom_type, &atom.action))
        .map(|atom| atom.qualified_name())
        .collect();

    println!("  Name: {}", style(&pipeline.name).bold());
    println!("  Steps: {}", style(pipeline.steps.len()).cyan());
    println!("  Variables: {}", style(pipeline.variables.len()).cyan());

    if cmd.json {
        println!("\n{}", pipeline.to_json()?);
    }

    if !missing.is_empty() {
        println!("{} Unregistered atoms:", CROSS);
        for name in &missing {
            println!("  {}", style(name).red());
        }
        std::process::exit(1);
    }

    println!("{} Pipeline is valid!", CHECK);
    Ok(())
}

fn convert_pipeline(cmd: &ConvertCommand, config: &DslConfig) -> Result<()> {
    let parser = Parser::with_config(config.parser_config());
    let pipeline = load_pipeline(&cmd.file, &parser)?;

    let output = match cmd.to {
        PipelineFormat::Dsl => pipeline.to_dsl(),
        PipelineFormat::Json => pipeline.to_json()?,
        PipelineFormat::Yaml => pipeline.to_yaml()?,
    };
    println!("{}", output.trim_end());
    Ok(())
}

fn list_atoms(cmd: &ListAtomsCommand) -> Result<()> {
    let registry = AtomRegistry::with_builtins();

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&registry.docs(None))?);
        return Ok(());
    }

    if !cmd.details {
        for (atom_type, actions) in registry.list() {
            println!("{} {}", style(format!("{}:", atom_type)).bold(), actions.join(", "));
        }
        return Ok(());
    }

    for (atom_type, action, info) in registry.describe() {
        let signature: Vec<String> = info.params.iter().map(|p| p.signature()).collect();
        println!(
            "{}",
            style(format!("{}.{}({})", atom_type, action, signature.join(", "))).bold()
        );
        if !info.description.is_empty() {
            println!("  {}", info.description);
        }
        for param in info.params.iter().filter(|p| !p.description.is_empty()) {
            println!("    {} {}", style(&param.name).cyan(), param.description);
        }
        for example in &info.examples {
            println!("  {}", style(example).dim());
        }
    }
    Ok(())
}

async fn show_history(cmd: &HistoryCommand, config: &DslConfig) -> Result<()> {
    let history = open_history(config).await?;

    // If a specific execution ID is requested
    if let Some(exec_id) = &cmd.execution_id {
        let exec_id = uuid::Uuid::parse_str(exec_id).context("Invalid execution ID format")?;
        match history.load_run(exec_id).await? {
            Some(summary) if cmd.json => println!("{}", serde_json::to_string_pretty(&summary)?),
            Some(summary) => print_run_details(&summary),
            None => bail!("Run {} not found", exec_id),
        }
        return Ok(());
    }

    if cmd.pipelines {
        let names = history.list_pipelines().await?;
        if cmd.json {
            println!("{}", serde_json::to_string_pretty(&json!({ "pipelines": names }))?);
        } else if names.is_empty() {
            println!("{} No runs found", INFO);
        } else {
            println!("{} Pipelines with recorded runs:", INFO);
            for name in &names {
                println!("  {}", style(name).bold());
            }
        }
        return Ok(());
    }

    let runs = history.list_runs(cmd.pipeline.as_deref(), cmd.limit).await?;

    if cmd.json {
        let data = json!({ "runs": runs });
        println!("{}", serde_json::to_string_pretty(&data)?);
        return Ok(());
    }

    if runs.is_empty() {
        println!("{} No runs found", INFO);
        return Ok(());
    }

    println!("{} Run history (showing latest {}):", INFO, cmd.limit);
    for summary in &runs {
        println!("  {}", format_run_summary(summary));
    }

    Ok(())
}

fn print_run_details(summary: &RunSummary) {
    println!("{} Run Details", INFO);
    println!("  ID: {}", style(summary.execution_id).cyan());
    println!("  Pipeline: {}", style(&summary.pipeline_name).bold());
    println!("  Status: {}", format_status(summary.status));
    println!("  Started: {}", style(summary.started_at.to_rfc3339()).dim());
    if let Some(completed) = summary.completed_at {
        println!("  Completed: {}", style(completed.to_rfc3339()).dim());
    }
    if let Some(ms) = summary.duration_ms() {
        println!("  Duration: {}", style(format!("{}ms", ms)).dim());
    }
    println!("  Steps: {} ({} errors)", summary.step_count, summary.error_count);
}
