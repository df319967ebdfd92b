// Fixed-point and token benchmarks for the ALOC protocol.
//
// Covers 256-bit mul_div in both rounding directions, the per-second
// interest accrual product, share conversions at growing supply sizes,
// and transfers on the in-memory asset token.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use aloc_protocol::config::{ACCRUAL_DENOMINATOR, SECONDS_PER_YEAR};
use aloc_protocol::{mul_div, Address, AssetToken, Assets, InMemoryToken, Rounding, U256};

fn bench_mul_div(c: &mut Criterion) {
    let a = U256::from(1_234_567_890_123_u64);
    let b = U256::from(987_654_321_u64);
    let d = U256::from(1_000_003_u64);

    c.bench_function("mul_div/round_down", |bench| {
        bench.iter(|| mul_div(black_box(a), black_box(b), black_box(d), Rounding::Down));
    });
    c.bench_function("mul_div/round_up", |bench| {
        bench.iter(|| mul_div(black_box(a), black_box(b), black_box(d), Rounding::Up));
    });
}

fn bench_accrual(c: &mut Criterion) {
    // 10M USDC of principal at 4% for one day.
    let principal = U256::from(10_000_000_000_000_u64);
    let rate_times_elapsed = U256::from(400_u64 * 86_400);
    let denominator = U256::from(ACCRUAL_DENOMINATOR);

    c.bench_function("accrual/one_day", |bench| {
        bench.iter(|| {
            mul_div(
                black_box(principal),
                black_box(rate_times_elapsed),
                denominator,
                Rounding::Down,
            )
        });
    });
}

fn bench_share_conversion(c: &mut Criterion) {
    let mut group = c.benchmark_group("shares/convert_to_shares");

    for exponent in [6u32, 12, 18, 30] {
        let supply = U256::exp10(exponent as usize);
        // Vault worth 5% more than its supply after a year of interest.
        let total_assets = supply + supply / U256::from(20_u64);
        let deposit = U256::from(SECONDS_PER_YEAR);

        group.bench_with_input(BenchmarkId::from_parameter(exponent), &exponent, |bench, _| {
            bench.iter(|| {
                mul_div(
                    black_box(deposit),
                    black_box(supply),
                    black_box(total_assets),
                    Rounding::Down,
                )
            });
        });
    }

    group.finish();
}

fn bench_token_transfer(c: &mut Criterion) {
    let minter = Address::new("bench:minter").unwrap();
    let alice = Address::new("bench:alice").unwrap();
    let vault = Address::new("bench:vault").unwrap();
    let token = InMemoryToken::new("USDC", 6, minter.clone());
    token
        .mint(&minter, &alice, Assets::from(u64::MAX))
        .unwrap();
    token
        .approve(&alice, &vault, Assets::from(u64::MAX))
        .unwrap();

    c.bench_function("token/transfer_from", |bench| {
        bench.iter(|| token.transfer_from(&vault, &alice, &vault, black_box(Assets::from(1_u64))));
    });
}

criterion_group!(
    benches,
    bench_mul_div,
    bench_accrual,
    bench_share_conversion,
    bench_token_transfer,
);
criterion_main!(benches);
