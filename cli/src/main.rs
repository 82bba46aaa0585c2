use std::{
    fmt, fs,
    path::{Path, PathBuf},
};

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use miette::{
    Context as _, Diagnostic, GraphicalReportHandler, IntoDiagnostic as _, Result, Severity,
};
use mynotes_composer::{
    CompositionLint, DeploymentPlan, compose, diff, lint_composition,
    reporter::{DotReporter, GraphIrReporter, Reporter as _, TemplateReporter},
    simulate,
};
use mynotes_config::{AppConfig, config_env_vars};
use mynotes_graph::{Graph, GraphIr, ResourceKind};
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, fmt as tracing_fmt, prelude::*};

#[derive(Parser)]
#[command(name = "mynotes")]
#[command(version)]
#[command(about = "Compose the My Notes backend into a deployable stack graph")]
struct Cli {
    /// Increase log verbosity (-v, -vv, -vvv, -vvvv).
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    verbose: u8,

    /// JSON configuration file. `MYNOTES_CONFIG_*` variables override its values.
    #[arg(short = 'c', long = "config", value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Render the composed graph.
    Synth(SynthArgs),
    /// Compose, plan and simulate without emitting anything.
    Check(CheckArgs),
    /// Print the deployment waves.
    Order,
    /// Compare the composed graph with a previously emitted graph IR.
    Plan(PlanArgs),
    /// Print the resolved environment of every compute unit.
    Env,
}

#[derive(Args)]
struct SynthArgs {
    /// Select the emitted output.
    #[arg(long = "emit", value_enum, default_value_t = EmitKind::Template)]
    emit: EmitKind,

    /// Write the output to a file instead of stdout.
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    output: Option<PathBuf>,
}

#[derive(Args)]
struct CheckArgs {
    /// Treat the given lints as errors (e.g. `warnings`, `composer::over_grant`).
    #[arg(short = 'D', long = "deny", value_name = "LINT")]
    deny: Vec<String>,
}

#[derive(Args)]
struct PlanArgs {
    /// Graph IR from an earlier `synth --emit ir`.
    #[arg(long = "previous", value_name = "FILE")]
    previous: PathBuf,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum EmitKind {
    Template,
    Dot,
    Ir,
}

fn main() -> Result<()> {
    miette::set_panic_hook();
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    let config = load_config(cli.config.as_deref())?;
    match cli.command {
        Command::Synth(args) => synth(&config, args),
        Command::Check(args) => check(&config, args),
        Command::Order => order(&config),
        Command::Plan(args) => plan(&config, args),
        Command::Env => env(&config),
    }
}

fn init_tracing(verbose: u8) -> Result<()> {
    let filter = if std::env::var_os("RUST_LOG").is_some() {
        EnvFilter::try_from_default_env().into_diagnostic()?
    } else {
        let level = match verbose {
            0 => "error",
            1 => "warn",
            2 => "info",
            3 => "debug",
            _ => "trace",
        };
        EnvFilter::new(format!("error,mynotes={level},mynotes_={level}"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_fmt::layer().with_writer(std::io::stderr))
        .with(ErrorLayer::default())
        .init();

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let env = config_env_vars(
        std::env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?))),
    );
    let config = AppConfig::load(path, &env)?;
    tracing::debug!(
        stack = %config.stack_name,
        region = %config.region,
        grant_policy = %config.api.grant_policy,
        "loaded configuration"
    );
    Ok(config)
}

fn synth(config: &AppConfig, args: SynthArgs) -> Result<()> {
    let c = compose(config)?;
    let rendered = match args.emit {
        EmitKind::Template => TemplateReporter.emit(&c.graph),
        EmitKind::Dot => DotReporter.emit(&c.graph),
        EmitKind::Ir => GraphIrReporter.emit(&c.graph),
    }?;

    match args.output {
        Some(path) => fs::write(&path, rendered)
            .into_diagnostic()
            .wrap_err_with(|| format!("failed to write {}", path.display())),
        None => {
            print!("{rendered}");
            Ok(())
        }
    }
}

fn check(config: &AppConfig, args: CheckArgs) -> Result<()> {
    let c = compose(config)?;
    let plan = DeploymentPlan::for_graph(&c.graph).into_diagnostic()?;
    simulate(&c.graph, &config.region)?;

    if print_diagnostics(&lint_composition(&c), &DenySet(&args.deny))? {
        return Err(miette::miette!("check failed"));
    }

    println!(
        "ok: {} resources in {} stacks, {} grants, {} waves",
        c.graph.resource_count(),
        c.graph.stacks_iter().count(),
        c.graph.grants_iter().count(),
        plan.waves.len()
    );
    Ok(())
}

fn order(config: &AppConfig) -> Result<()> {
    let c = compose(config)?;
    let plan = DeploymentPlan::for_graph(&c.graph).into_diagnostic()?;
    for (n, wave) in plan.waves.iter().enumerate() {
        println!("wave {n}");
        for &id in wave {
            let r = c.graph.resource(id);
            println!("  {} ({})", r.path, r.kind);
        }
    }
    Ok(())
}

fn plan(config: &AppConfig, args: PlanArgs) -> Result<()> {
    let raw = fs::read_to_string(&args.previous)
        .into_diagnostic()
        .wrap_err_with(|| format!("failed to read {}", args.previous.display()))?;
    let previous: GraphIr = serde_json::from_str(&raw)
        .into_diagnostic()
        .wrap_err_with(|| format!("{} is not a graph IR document", args.previous.display()))?;
    Graph::try_from(previous.clone())
        .into_diagnostic()
        .wrap_err_with(|| format!("{} is not a consistent graph", args.previous.display()))?;

    let c = compose(config)?;
    let changes = diff(&previous, &GraphIr::from(&c.graph));
    print!("{changes}");
    Ok(())
}

fn env(config: &AppConfig) -> Result<()> {
    let c = compose(config)?;
    let state = simulate(&c.graph, &config.region)?;
    for function in c.graph.resources_of_kind(ResourceKind::ComputeUnit) {
        println!("{}", function.path);
        for (name, value) in state.environment(&c.graph, function.id)? {
            println!("  {name}={value}");
        }
    }
    Ok(())
}

/// `-D` arguments: `warnings` denies every lint, anything else names one lint code.
struct DenySet<'a>(&'a [String]);

impl DenySet<'_> {
    /// The flag that turns `code` into an error, if any.
    fn flag_for(&self, code: &str) -> Option<String> {
        if self.0.iter().any(|d| d == "warnings") {
            Some("-D warnings".to_string())
        } else {
            self.0.iter().find(|d| *d == code).map(|d| format!("-D {d}"))
        }
    }
}

/// Renders every lint to stderr. Returns true if any of them was denied.
fn print_diagnostics(lints: &[CompositionLint], deny: &DenySet) -> Result<bool> {
    let handler = GraphicalReportHandler::new();
    let mut denied_any = false;
    for lint in lints {
        match deny.flag_for(lint.lint_code()) {
            Some(flag) => {
                denied_any = true;
                render_report(&handler, &DeniedLint { lint, flag })?;
            }
            None => render_report(&handler, lint)?,
        }
    }
    Ok(denied_any)
}

fn render_report(handler: &GraphicalReportHandler, diagnostic: &dyn Diagnostic) -> Result<()> {
    let mut out = String::new();
    handler
        .render_report(&mut out, diagnostic)
        .map_err(|_| miette::miette!("failed to render diagnostics"))?;
    eprint!("{out}");
    Ok(())
}

/// A lint promoted to an error by `--deny`.
#[derive(Debug)]
struct DeniedLint<'a> {
    lint: &'a CompositionLint,
    flag: String,
}

impl fmt::Display for DeniedLint<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.lint)
    }
}

impl std::error::Error for DeniedLint<'_> {}

impl Diagnostic for DeniedLint<'_> {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        Some(Box::new(self.lint.lint_code()))
    }

    fn severity(&self) -> Option<Severity> {
        Some(Severity::Error)
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        let denied = format!("denied by `{}`", self.flag);
        Some(Box::new(match self.lint.help() {
            Some(help) => format!("{denied}\n{help}"),
            None => denied,
        }))
    }
}
