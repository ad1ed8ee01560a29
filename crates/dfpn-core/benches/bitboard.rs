use criterion::{Criterion, criterion_group, criterion_main};
use dfpn_core::bitboard;
use dfpn_core::board::Board;
use dfpn_core::square::Square;
use std::hint::black_box;

fn bench_get_moves(c: &mut Criterion) {
    let p_initial = Square::D5.bitboard() | Square::E4.bitboard();
    let o_initial = Square::D4.bitboard() | Square::E5.bitboard();

    c.bench_function("bitboard_get_moves", |b| {
        b.iter(|| bitboard::get_moves(black_box(p_initial), black_box(o_initial)))
    });
}

fn bench_flip(c: &mut Criterion) {
    let p = Square::D5.bitboard() | Square::E4.bitboard();
    let o = Square::D4.bitboard() | Square::E5.bitboard();

    c.bench_function("bitboard_flip", |b| {
        b.iter(|| bitboard::flip(black_box(Square::C4), black_box(p), black_box(o)))
    });
}

fn bench_canonical(c: &mut Criterion) {
    let board = Board::default();

    c.bench_function("board_canonical", |b| {
        b.iter(|| black_box(board).canonical())
    });
}

criterion_group!(benches, bench_get_moves, bench_flip, bench_canonical);
criterion_main!(benches);
