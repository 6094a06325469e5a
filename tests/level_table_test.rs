//! Property tests for level classification
//!
//! Level tables are generated from seeded random numbers: strictly
//! increasing boundaries anywhere in the ADC range. Every table is swept over
//! the whole sample range.

use pixel_readout::calibration::{LevelTable, RocLevels, TbmLevels};
use rand::prelude::*;
use rand::rngs::StdRng;

/// Random strictly increasing table with ultra-black < black <= level[0]
fn random_table<const N: usize>(rng: &mut StdRng) -> LevelTable<N> {
    let mut values: Vec<i32> = Vec::with_capacity(N + 1);
    while values.len() < N + 1 {
        let v = rng.gen_range(-3000..=3000);
        if !values.contains(&v) {
            values.push(v);
        }
    }
    values.sort_unstable();

    let ultra_black = values[0];
    let mut levels = [0i32; N];
    levels.copy_from_slice(&values[1..]);
    LevelTable::new(ultra_black, levels[0], levels)
}

/// Sweep every i16 sample and check the classification contract
fn check_table<const N: usize>(table: &LevelTable<N>) {
    assert!(table.is_strictly_increasing(), "{:?}", table);
    let top = table.levels()[N - 1];
    let mut previous = 0u8;

    for s in i16::MIN..=i16::MAX {
        match table.classify(s) {
            Some(symbol) => {
                assert!(i32::from(s) <= top, "{:?}: {} above top classified", table, s);
                assert!(symbol >= previous, "{:?}: not monotonic at {}", table, s);
                assert!((symbol as usize) < N);
                previous = symbol;
            }
            None => assert!(i32::from(s) > top, "{:?}: {} not classified", table, s),
        }
    }
}

#[test]
fn test_classify_monotonic_random_roc_tables() {
    let mut rng = StdRng::seed_from_u64(0xC1A5);
    for _ in 0..200 {
        let table: RocLevels = random_table(&mut rng);
        check_table(&table);
    }
}

#[test]
fn test_classify_monotonic_random_tbm_tables() {
    let mut rng = StdRng::seed_from_u64(0x7B3);
    for _ in 0..200 {
        let table: TbmLevels = random_table(&mut rng);
        check_table(&table);
    }
}

#[test]
fn test_bands_partition_below_first_level() {
    let mut rng = StdRng::seed_from_u64(42);
    for _ in 0..100 {
        let table: RocLevels = random_table(&mut rng);
        for s in i16::MIN..=i16::MAX {
            let v = i32::from(s);
            assert_eq!(table.is_ultra_black(s), v <= table.ultra_black());
            assert_eq!(
                table.is_black(s),
                table.ultra_black() < v && v <= table.black()
            );
            // Ultra-black and black are never both true
            assert!(!(table.is_ultra_black(s) && table.is_black(s)));
        }
    }
}
