use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;

use salmon_chess::{AiController, Color, Difficulty, Game, GameStatus, StyleWeights};

/// Plays the computer opponent against itself.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Difficulty for White (1-5)
    #[arg(long, default_value_t = 3)]
    white: u8,

    /// Difficulty for Black (1-5)
    #[arg(long, default_value_t = 3)]
    black: u8,

    /// Stop after this many half-moves
    #[arg(long, default_value_t = 200)]
    max_plies: usize,

    /// Seed for the random tiers; entropy when omitted
    #[arg(long)]
    seed: Option<u64>,

    /// Preset name (balanced, aggressive, defensive, positional) or a JSON file
    #[arg(long)]
    style: Option<String>,

    /// Start from this FEN instead of the initial position
    #[arg(long)]
    fen: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

fn load_style(arg: &str) -> Result<StyleWeights> {
    if let Some(style) = StyleWeights::by_name(arg) {
        return Ok(style);
    }
    let path = PathBuf::from(arg);
    let text = fs::read_to_string(&path).with_context(|| format!("reading style {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing style {}", path.display()))
}

fn controller(seed: Option<u64>, offset: u64) -> AiController {
    match seed {
        Some(seed) => AiController::new(StdRng::seed_from_u64(seed.wrapping_add(offset))),
        None => AiController::from_entropy(),
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, log_level),
    )
    .init();

    let mut game = match &args.fen {
        Some(fen) => Game::from_fen(fen).context("loading start position")?,
        None => Game::new(),
    };
    let levels = [Difficulty::from_level(args.white), Difficulty::from_level(args.black)];
    let mut players = [controller(args.seed, 0), controller(args.seed, 1)];
    if let Some(style) = &args.style {
        let style = load_style(style)?;
        for player in players.iter_mut() {
            player.set_style(style.clone());
        }
    }

    let mut plies = 0;
    while plies < args.max_plies && !game.is_over() {
        let color = game.turn();
        let Some(mv) = players[color.index()].choose_move(&game, color, levels[color.index()]) else {
            break;
        };
        let result = game.apply_move(mv.from, mv.to, mv.promotion);
        if result.is_invalid() {
            anyhow::bail!("{} produced a move the game rejected: {} ({:?})", color, mv, result);
        }
        plies += 1;
        println!("{:>3}. {} {}", plies, color, mv);
    }

    println!("{}", game.board());
    println!("{}", game.board().to_fen());
    match game.status() {
        GameStatus::Checkmate { winner } => println!("checkmate, {} wins", winner),
        GameStatus::Stalemate => println!("stalemate"),
        GameStatus::InProgress => {
            let balance = salmon_chess::evaluation::material_balance(game.board(), Color::White);
            println!("stopped after {} plies, material {:+}", plies, balance);
        }
    }
    Ok(())
}
