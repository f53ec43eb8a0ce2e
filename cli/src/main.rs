use buffkit_cli::commands::{self, ApplyRequest};
use buffkit_cli::{CliContext, logging, readline};
use clap::{Parser, Subcommand};
use std::io::Write;

fn main() -> Result<(), String> {
    logging::init();
    let mut ctx = CliContext::new();

    while let Some(line) = readline()? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match respond(line, &mut ctx) {
            Ok(quit) => {
                if quit {
                    break;
                }
            }
            Err(err) => {
                write!(std::io::stdout(), "{err}").map_err(|e| e.to_string())?;
                std::io::stdout().flush().map_err(|e| e.to_string())?;
            }
        }
    }

    Ok(())
}

#[derive(Parser)]
#[command(version, about = "status effect sandbox")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Reload bundled definitions plus a user definitions directory
    Load {
        #[arg(short, long)]
        path: Option<String>,
    },
    /// List loaded effect definitions
    Defs,
    Spawn {
        name: String,
        #[arg(short, default_value_t = 0.0)]
        x: f32,
        #[arg(short, default_value_t = 0.0)]
        y: f32,
    },
    /// Apply an effect definition to an entity
    Apply {
        effect: String,
        #[arg(short, long)]
        target: i64,
        #[arg(short, long)]
        caster: Option<i64>,
        #[arg(short, long)]
        stacks: Option<u32>,
        #[arg(short, long)]
        duration: Option<f32>,
        /// Stack policy this application imposes on an active instance
        #[arg(short, long)]
        policy: Option<String>,
        #[arg(long)]
        new_slot: bool,
    },
    /// Advance the clock and run one update pass on every entity
    Advance { seconds: f32 },
    Show {
        target: Option<i64>,
        /// Include hidden effects
        #[arg(short, long)]
        all: bool,
    },
    Remove {
        target: i64,
        id: u64,
    },
    Clear {
        target: i64,
        #[arg(short, long)]
        kind: Option<String>,
        #[arg(short, long)]
        effect: Option<String>,
    },
    /// Remove all detrimental effects
    Cleanse { target: i64 },
    Count {
        target: i64,
        #[arg(short, long)]
        kind: Option<String>,
        #[arg(short, long)]
        effect: Option<String>,
        #[arg(short, long)]
        caster: Option<i64>,
    },
    /// Dump an entity's active effects as TOML
    Snapshot { target: i64 },
    Config,
    Exit,
}

fn respond(line: &str, ctx: &mut CliContext) -> Result<bool, String> {
    let mut args = shlex::split(line).ok_or("error: Invalid quoting")?;
    args.insert(0, "buffkit".to_string());
    let cli = Cli::try_parse_from(args).map_err(|e| e.to_string())?;

    match &cli.command {
        Some(Commands::Load { path }) => commands::load_definitions(path.as_deref(), ctx)?,
        Some(Commands::Defs) => commands::list_definitions(ctx)?,
        Some(Commands::Spawn { name, x, y }) => commands::spawn(name, *x, *y, ctx)?,
        Some(Commands::Apply {
            effect,
            target,
            caster,
            stacks,
            duration,
            policy,
            new_slot,
        }) => {
            let request = ApplyRequest {
                effect,
                target: *target,
                caster: *caster,
                stacks: *stacks,
                duration: *duration,
                policy: policy.as_deref(),
                new_slot: *new_slot,
            };
            commands::apply(&request, ctx)?
        }
        Some(Commands::Advance { seconds }) => commands::advance(*seconds, ctx)?,
        Some(Commands::Show { target, all }) => commands::show(*target, *all, ctx)?,
        Some(Commands::Remove { target, id }) => commands::remove(*target, *id, ctx)?,
        Some(Commands::Clear {
            target,
            kind,
            effect,
        }) => commands::clear(*target, kind.as_deref(), effect.as_deref(), ctx)?,
        Some(Commands::Cleanse { target }) => commands::cleanse(*target, ctx)?,
        Some(Commands::Count {
            target,
            kind,
            effect,
            caster,
        }) => commands::count(
            *target,
            kind.as_deref(),
            effect.as_deref(),
            *caster,
            ctx,
        )?,
        Some(Commands::Snapshot { target }) => commands::snapshot(*target, ctx)?,
        Some(Commands::Config) => commands::show_settings(ctx)?,
        Some(Commands::Exit) => {
            commands::exit()?;
            return Ok(true);
        }
        None => {}
    }
    Ok(false)
}
