use clap::{Args, Parser, Subcommand};
use dotenv::dotenv;
use prompt_workbench::ai::client::GeminiClient;
use prompt_workbench::ai::stages::{StageOutcome, Stages};
use prompt_workbench::config::Config;
use prompt_workbench::core::results::ScoreBand;
use prompt_workbench::core::template::{
    AgenticBehavior, OutputFormat, SystemContext, Template, ThinkingStyle,
};
use prompt_workbench::error::WorkbenchError;
use prompt_workbench::orchestrator::Orchestrator;
use prompt_workbench::session::Session;
use prompt_workbench::store::{FileStore, KeyValueStore, MemoryStore};
use serde::Serialize;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "prompt-workbench", version, about = "Compile, evaluate and upgrade structured prompts")]
struct Cli {
    /// Keep history and versions in memory only
    #[arg(long, global = true)]
    ephemeral: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compile the template and print the prompt
    Compile(TemplateArgs),
    /// Compile, evaluate, save a version and analyze
    Generate(TemplateArgs),
    Analyze(TemplateArgs),
    Evaluate(TemplateArgs),
    Upgrade(TemplateArgs),
    Test(TemplateArgs),
    Optimize(TemplateArgs),
    /// Break the prompt into components and rebuild it as a structured prompt
    Restructure(TemplateArgs),
    /// List past prompts
    History {
        /// Print the entry at this position (0 = newest)
        #[arg(long, conflicts_with = "clear")]
        select: Option<usize>,
        #[arg(long)]
        clear: bool,
    },
    /// List saved versions with their scores
    Versions,
}

#[derive(Args, Debug)]
struct TemplateArgs {
    /// The main task
    #[arg(short, long)]
    input: Option<String>,
    #[arg(long, value_enum, default_value_t)]
    system_context: SystemContext,
    #[arg(long, value_enum, default_value_t)]
    output_format: OutputFormat,
    #[arg(long, value_enum, default_value_t)]
    agentic_behavior: AgenticBehavior,
    #[arg(long, value_enum, default_value_t)]
    thinking_style: ThinkingStyle,
    #[arg(long, default_value = "")]
    constraints: String,
    #[arg(long, default_value = "")]
    examples: String,
    #[arg(long, default_value = "")]
    purpose: String,
    /// Reuse a past prompt instead of compiling a new one
    #[arg(long, conflicts_with = "input")]
    from_history: Option<usize>,
}

impl TemplateArgs {
    fn template(&self) -> Template {
        Template {
            system_context: self.system_context,
            output_format: self.output_format,
            agentic_behavior: self.agentic_behavior,
            thinking_style: self.thinking_style,
            input: self.input.clone().unwrap_or_default(),
            constraints: self.constraints.clone(),
            examples: self.examples.clone(),
            purpose: self.purpose.clone(),
        }
    }
}

/// Puts the requested prompt in place as the session's current prompt.
fn prepare(session: &mut Session, args: &TemplateArgs) -> Result<(), WorkbenchError> {
    session.set_template(args.template());
    match args.from_history {
        Some(index) => session
            .select_history(index)
            .map(|_| ())
            .ok_or_else(|| WorkbenchError::Config(format!("no history entry at {index}"))),
        None => session.compile().map(|_| ()),
    }
}

fn emit<T: Serialize>(outcome: StageOutcome<T>) -> Result<(), WorkbenchError> {
    if let Some(warning) = &outcome.warning {
        eprintln!("⚠️  {warning}");
    }
    println!("{}", serde_json::to_string_pretty(&outcome.result)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();
    let store: Box<dyn KeyValueStore> = if cli.ephemeral {
        Box::new(MemoryStore::default())
    } else {
        Box::new(FileStore::open(&config.store_dir)?)
    };
    let mut session = Session::open(store);

    let args = match cli.command {
        Command::Compile(args) => {
            prepare(&mut session, &args)?;
            if let Some(prompt) = session.compiled() {
                println!("{prompt}");
            }
            return Ok(());
        }
        Command::History { select, clear } => {
            if clear {
                session.clear_history();
                println!("🧹 History cleared");
            } else if let Some(index) = select {
                match session.select_history(index) {
                    Some(prompt) => println!("{prompt}"),
                    None => eprintln!("No history entry at {index}"),
                }
            } else {
                for (i, prompt) in session.history().iter().enumerate() {
                    let first_line = prompt.lines().next().unwrap_or_default();
                    println!("[{i}] {first_line}");
                }
            }
            return Ok(());
        }
        Command::Versions => {
            for (i, v) in session.versions().iter().enumerate() {
                let average = v.evaluation.scores.average();
                println!(
                    "[{i}] {} avg {average} {:?} | {}",
                    v.timestamp,
                    ScoreBand::of(average),
                    v.prompt.lines().next().unwrap_or_default()
                );
            }
            return Ok(());
        }
        other => other,
    };

    // Every remaining command calls the model, so the key must be present.
    let gateway = Arc::new(GeminiClient::new(&config)?);
    let mut orchestrator = Orchestrator::new(Stages::new(gateway), session);

    match args {
        Command::Generate(args) => {
            orchestrator.session_mut().set_template(args.template());
            let cycle = orchestrator.generate().await?;
            println!("{}\n", cycle.prompt);
            emit(cycle.evaluation)?;
            emit(cycle.analysis)?;
        }
        Command::Analyze(args) => {
            prepare(orchestrator.session_mut(), &args)?;
            emit(orchestrator.analyze().await?)?;
        }
        Command::Evaluate(args) => {
            prepare(orchestrator.session_mut(), &args)?;
            emit(orchestrator.evaluate().await?)?;
        }
        Command::Upgrade(args) => {
            prepare(orchestrator.session_mut(), &args)?;
            emit(orchestrator.upgrade().await?)?;
        }
        Command::Test(args) => {
            prepare(orchestrator.session_mut(), &args)?;
            emit(orchestrator.test().await?)?;
        }
        Command::Optimize(args) => {
            prepare(orchestrator.session_mut(), &args)?;
            emit(orchestrator.optimize().await?)?;
        }
        Command::Restructure(args) => {
            prepare(orchestrator.session_mut(), &args)?;
            let restructuring = orchestrator.restructure().await?;
            let rendered = restructuring.upgrade.result.render();
            emit(restructuring.breakdown)?;
            emit(restructuring.upgrade)?;
            println!("\n{rendered}");
        }
        Command::Compile(_) | Command::History { .. } | Command::Versions => {}
    }

    Ok(())
}
