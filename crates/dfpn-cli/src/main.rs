mod batch;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use dfpn_core::SolverConfig;

#[derive(Parser, Debug, Clone)]
struct EngineParams {
    #[arg(long)]
    threads: Option<usize>,

    #[arg(long = "time-limit", default_value = "0")]
    time_limit_sec: u64,

    #[arg(long = "tt-mb", default_value = "256")]
    tt_size_mb: usize,

    #[arg(long = "spawn-max-generation", default_value = "1")]
    spawn_max_generation: u32,

    #[arg(long = "spawn-min-depth", default_value = "5")]
    spawn_min_depth: u32,

    #[arg(long = "spawn-limit")]
    spawn_limit: Option<usize>,

    #[arg(long = "no-eval")]
    no_eval: bool,
}

impl From<EngineParams> for SolverConfig {
    fn from(p: EngineParams) -> SolverConfig {
        SolverConfig::default()
            .with_threads(p.threads)
            .with_time_limit(p.time_limit_sec)
            .with_tt_size_mb(p.tt_size_mb)
            .with_spawn_max_generation(p.spawn_max_generation)
            .with_spawn_min_depth(p.spawn_min_depth)
            .with_spawn_limit(p.spawn_limit)
            .with_use_evaluation(!p.no_eval)
    }
}

#[derive(Parser, Debug)]
#[command(name = "dfpn-solve")]
struct Cli {
    #[command(subcommand)]
    command: SubCommands,
}

#[derive(Debug, Subcommand)]
enum SubCommands {
    /// Solve every position in a file, one per line:
    /// `<64-char board>;<side-to-move char X/O>`.
    Solve {
        #[arg()]
        file: PathBuf,

        #[command(flatten)]
        engine_params: EngineParams,
    },
    /// Solve a single position given as raw hex bitboards.
    Probe {
        #[arg(long, value_parser = parse_hex_u64)]
        player: u64,

        #[arg(long, value_parser = parse_hex_u64)]
        opponent: u64,

        #[command(flatten)]
        engine_params: EngineParams,
    },
}

fn parse_hex_u64(s: &str) -> Result<u64, String> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    u64::from_str_radix(s, 16).map_err(|e| format!("invalid hex bitboard {s:?}: {e}"))
}

fn main() {
    let args = Cli::parse();
    let result = match args.command {
        SubCommands::Solve { file, engine_params } => batch::solve_file(&file, engine_params.into()),
        SubCommands::Probe {
            player,
            opponent,
            engine_params,
        } => batch::solve_one(player, opponent, engine_params.into()),
    };
    if let Err(err) = result {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
