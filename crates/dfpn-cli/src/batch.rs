//! Position-file parsing and result printing.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::time::Duration;

use dfpn_core::board::Board;
use dfpn_core::piece::Piece;
use dfpn_core::{GameResult, SolverConfig, solve};

pub fn solve_file(path: &Path, config: SolverConfig) -> Result<(), Box<dyn std::error::Error>> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);

    print_header();

    let mut total_time = Duration::ZERO;
    let mut total_nodes: u64 = 0;

    for (line_num, line) in reader.lines().enumerate() {
        let line = line?;
        let line = if let Some(comment_pos) = line.find('%') {
            &line[..comment_pos]
        } else {
            &line
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match parse_position_line(line) {
            Ok((player, opponent)) => {
                let outcome = solve(player, opponent, config.clone());
                print_row(line_num + 1, &outcome);
                total_time += outcome.stats.elapsed;
                total_nodes += outcome.stats.total_nodes;
            }
            Err(e) => eprintln!("error parsing line {}: {e}", line_num + 1),
        }
    }

    print_summary(total_time, total_nodes);
    Ok(())
}

pub fn solve_one(player: u64, opponent: u64, config: SolverConfig) -> Result<(), Box<dyn std::error::Error>> {
    print_header();
    let outcome = solve(player, opponent, config);
    print_row(1, &outcome);
    print_summary(outcome.stats.elapsed, outcome.stats.total_nodes);
    Ok(())
}

/// Parses `<64-char board>;<side-to-move char X/O>`, the FFO test-suite
/// line shape.
fn parse_position_line(line: &str) -> Result<(u64, u64), String> {
    let fields: Vec<&str> = line.split(';').collect();
    let board_field = fields[0].trim();
    if board_field.len() < 64 {
        return Err(format!("expected a 64-character board, got {} chars", board_field.len()));
    }
    let board_str = &board_field[..64];
    let side_char = fields.get(1).and_then(|s| s.trim().chars().next()).unwrap_or('X');
    let side_to_move = match side_char {
        'X' | 'x' | 'b' | 'B' => Piece::Black,
        'O' | 'o' | 'w' | 'W' => Piece::White,
        _ => return Err(format!("invalid side to move: {side_char}")),
    };
    let board = Board::from_string(board_str, side_to_move);
    Ok((board.player, board.opponent))
}

fn print_header() {
    println!(
        "| {:^3} | {:^10} | {:^5} | {:^9} | {:^12} | {:^10} |",
        "#", "Result", "Move", "Time", "Nodes", "N/s"
    );
    println!("|-----|------------|-------|-----------|--------------|------------|");
}

fn print_row(index: usize, outcome: &dfpn_core::SolveOutcome) {
    let result_str = match outcome.result {
        GameResult::Win => "WIN",
        GameResult::Lose => "LOSE",
        GameResult::Draw => "DRAW",
        GameResult::Unknown => "UNKNOWN",
    };
    let move_str = outcome.best_move.map(|m| m.to_string()).unwrap_or_else(|| "-".to_string());
    println!(
        "| {:^3} | {:^10} | {:^5} | {:^9.3} | {:^12} | {:^10.0} |",
        index,
        result_str,
        move_str,
        outcome.stats.elapsed.as_secs_f64(),
        outcome.stats.total_nodes,
        outcome.stats.nps,
    );
}

fn print_summary(total_time: Duration, total_nodes: u64) {
    let total_secs = total_time.as_secs_f64();
    let total_nps = if total_secs > 0.0 { total_nodes as f64 / total_secs } else { 0.0 };
    println!("Total: {total_secs:.3}s, {total_nodes} nodes, {total_nps:.0} N/s");
}
