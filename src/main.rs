//! MTG Combat - Main Binary
//!
//! Runs or checks combat scenarios described in JSON files

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use mtg_combat::{
    game::{
        Combat, CombatController, CombatEvent, CombatPhase, ControllerSeats, EventLog, NullSink,
        RandomController, TriggerSink, VerbosityLevel, ZeroController,
    },
    scenario::{LoadedScenario, Scenario},
};
use std::path::{Path, PathBuf};

/// Controller type for decision makers
#[derive(Debug, Clone, Copy, ValueEnum)]
enum ControllerType {
    /// Attacks with everything, never blocks
    Zero,
    /// Makes random choices
    Random,
    /// Replays the attacks, blocks and orders written in the scenario
    Scripted,
}

/// Verbosity level for combat output (custom parser supporting both names and numbers)
#[derive(Debug, Clone, Copy)]
struct VerbosityArg(VerbosityLevel);

impl std::str::FromStr for VerbosityArg {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "silent" | "0" => Ok(VerbosityArg(VerbosityLevel::Silent)),
            "minimal" | "1" => Ok(VerbosityArg(VerbosityLevel::Minimal)),
            "normal" | "2" => Ok(VerbosityArg(VerbosityLevel::Normal)),
            "verbose" | "3" => Ok(VerbosityArg(VerbosityLevel::Verbose)),
            _ => Err(format!(
                "invalid verbosity level '{s}' (expected: silent/0, minimal/1, normal/2, verbose/3)"
            )),
        }
    }
}

impl From<VerbosityArg> for VerbosityLevel {
    fn from(arg: VerbosityArg) -> Self {
        arg.0
    }
}

#[derive(Parser)]
#[command(name = "mtg-combat")]
#[command(about = "MTG Combat - declare, validate and resolve Magic: The Gathering combat", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a full combat phase from a scenario file
    Run {
        /// Scenario file (.json)
        #[arg(value_name = "SCENARIO")]
        scenario: PathBuf,

        /// Controller for the attacking player
        #[arg(long, value_enum, default_value = "scripted")]
        attacker: ControllerType,

        /// Controller for every defending player
        #[arg(long, value_enum, default_value = "scripted")]
        defender: ControllerType,

        /// Set random seed for deterministic testing
        #[arg(long)]
        seed: Option<u64>,

        /// Verbosity level for combat output (0=silent, 1=minimal, 2=normal, 3=verbose)
        #[arg(long, short = 'v')]
        verbosity: Option<VerbosityArg>,

        /// Print combat events and the final report as JSON lines
        #[arg(long)]
        json: bool,
    },

    /// Validate the scenario's scripted attacks and blocks without dealing damage
    Check {
        /// Scenario file (.json)
        #[arg(value_name = "SCENARIO")]
        scenario: PathBuf,
    },
}

/// Forwards every event to stdout as a JSON line while keeping a copy
struct JsonSink {
    log: EventLog,
}

impl TriggerSink for JsonSink {
    fn fire(&mut self, event: CombatEvent) {
        match serde_json::to_string(&event) {
            Ok(line) => println!("{line}"),
            Err(e) => eprintln!("could not serialize event: {e}"),
        }
        self.log.fire(event);
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            scenario,
            attacker,
            defender,
            seed,
            verbosity,
            json,
        } => run_combat(scenario, attacker, defender, seed, verbosity, json)?,
        Commands::Check { scenario } => check_declarations(scenario)?,
    }

    Ok(())
}

fn load(path: &Path) -> Result<LoadedScenario> {
    let scenario =
        Scenario::load_from_file(path).with_context(|| format!("loading scenario {}", path.display()))?;
    if let Some(description) = &scenario.description {
        println!("{description}");
    }
    Ok(scenario.build()?)
}

fn make_controller(
    kind: ControllerType,
    loaded: &LoadedScenario,
    player: mtg_combat::core::PlayerId,
    seed: Option<u64>,
) -> Box<dyn CombatController> {
    match kind {
        ControllerType::Zero => Box::new(ZeroController::new(player)),
        ControllerType::Random => match seed {
            // Offset per seat so both sides don't mirror each other
            Some(seed) => Box::new(RandomController::with_seed(
                player,
                seed.wrapping_add(player.as_u32() as u64),
            )),
            None => Box::new(RandomController::new(player)),
        },
        ControllerType::Scripted => Box::new(loaded.scripted_controller(player)),
    }
}

fn run_combat(
    path: PathBuf,
    attacker: ControllerType,
    defender: ControllerType,
    seed: Option<u64>,
    verbosity: Option<VerbosityArg>,
    json: bool,
) -> Result<()> {
    let mut loaded = load(&path)?;
    let mut options = loaded.options.clone();
    if let Some(v) = verbosity {
        options.verbosity = v.into();
    }
    if json {
        options.verbosity = VerbosityLevel::Silent;
    }

    let attacking_player = loaded.attacking_player;
    let mut controllers: Vec<Box<dyn CombatController>> = loaded
        .game
        .player_ids()
        .map(|p| {
            let kind = if p == attacking_player { attacker } else { defender };
            make_controller(kind, &loaded, p, seed)
        })
        .collect();
    let mut seated: Vec<&mut dyn CombatController> = Vec::with_capacity(controllers.len());
    for controller in controllers.iter_mut() {
        seated.push(controller.as_mut());
    }
    let mut seats = ControllerSeats::new(seated);

    let mut sink = JsonSink { log: EventLog::new() };
    let report = CombatPhase::new(&mut loaded.game)
        .with_options(options)
        .run(attacking_player, &mut seats, &mut sink)
        .context("resolving combat")?;

    if json {
        println!("{}", serde_json::to_string(&report)?);
        return Ok(());
    }

    println!("\n=== Combat Over ===");
    println!("Events: {}", sink.log.events().len());
    for id in &report.died {
        println!("  {} died", loaded.game.card_name(*id));
    }
    for (player, life) in &report.life {
        println!("  {}: {} life", loaded.game.player_name(*player), life);
    }
    Ok(())
}

fn check_declarations(path: PathBuf) -> Result<()> {
    let mut loaded = load(&path)?;
    let game = &mut loaded.game;
    let mut combat = Combat::with_options(game, loaded.attacking_player, loaded.options.clone());
    let mut problems = 0;

    game.turn.set_step(mtg_combat::game::Step::DeclareAttackers);
    for (attacker, defender) in &loaded.attacks {
        if let Err(reason) = combat.declare_attacker(game, *attacker, *defender) {
            println!("attack: {reason}");
            problems += 1;
        }
    }
    if let Err(reason) = combat.validate_attacker_declaration(game) {
        println!("attack declaration: {reason}");
        problems += 1;
    }
    combat.finish_attacker_declaration(game, &mut NullSink)?;

    game.turn.set_step(mtg_combat::game::Step::DeclareBlockers);
    for (blocker, attacker) in &loaded.blocks {
        if let Err(reason) = combat.declare_blocker(game, *attacker, *blocker) {
            println!("block: {reason}");
            problems += 1;
        }
    }
    for defending_player in combat.defending_players(game) {
        if let Err(reason) = combat.validate_blocker_declaration(game, defending_player) {
            println!("blocks by {}: {reason}", game.player_name(defending_player));
            problems += 1;
        }
    }

    if problems == 0 {
        println!("OK: {} attackers, {} blocks", combat.attackers().len(), loaded.blocks.len());
        Ok(())
    } else {
        anyhow::bail!("{problems} illegal declaration(s)")
    }
}
