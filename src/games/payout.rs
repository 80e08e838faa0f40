//! Fair-odds payout multiplier with a fixed house edge.
//!
//! After `k` safe reveals on a grid with `m` mines the fair multiplier is
//! `C(grid, k) / C(grid - m, k)`; the house keeps `house_edge_bps` basis
//! points of that. Settlement is exact integer arithmetic in micros so
//! repeated small reveals never accumulate rounding drift; the float form
//! exists only for display.

/// Basis points in a whole (100% = 10_000 bps).
pub const BPS_SCALE: u32 = 10_000;

/// Binomial coefficient C(n, k) computed iteratively with the symmetry
/// C(n, k) = C(n, n - k). Returns 0 when k > n.
pub fn binomial(n: u32, k: u32) -> u128 {
    if k > n {
        return 0;
    }
    let k = k.min(n - k);
    let mut acc: u128 = 1;
    for i in 1..=u128::from(k) {
        // Multiply before dividing: the running product after step i is
        // C(n-k+i, i), always an integer, so the division is exact.
        acc = acc * (u128::from(n) - u128::from(k) + i) / i;
    }
    acc
}

/// Display multiplier for `revealed` safe tiles. `revealed = 0` returns
/// exactly the house edge factor; revealing more safe tiles than exist
/// returns 0.0 rather than dividing by zero.
pub fn multiplier(revealed: u8, mine_count: u8, grid_size: u8, house_edge_bps: u32) -> f64 {
    let c_all = binomial(u32::from(grid_size), u32::from(revealed));
    let c_safe = binomial(
        u32::from(grid_size) - u32::from(mine_count),
        u32::from(revealed),
    );
    if c_safe == 0 {
        return 0.0;
    }
    let edge = f64::from(BPS_SCALE - house_edge_bps) / f64::from(BPS_SCALE);
    edge * c_all as f64 / c_safe as f64
}

/// Exact winnings in micros for a cashout after `revealed` safe tiles:
/// `bet * (10000 - edge_bps) * C(grid, k) / (10000 * C(grid - m, k))`,
/// floored. Returns 0 on the impossible `k > grid - m` path.
pub fn winnings_micros(
    bet_micros: u64,
    revealed: u8,
    mine_count: u8,
    grid_size: u8,
    house_edge_bps: u32,
) -> u64 {
    let c_all = binomial(u32::from(grid_size), u32::from(revealed));
    let c_safe = binomial(
        u32::from(grid_size) - u32::from(mine_count),
        u32::from(revealed),
    );
    if c_safe == 0 {
        return 0;
    }
    let numerator = u128::from(bet_micros) * u128::from(BPS_SCALE - house_edge_bps) * c_all;
    let denominator = u128::from(BPS_SCALE) * c_safe;
    (numerator / denominator) as u64
}
