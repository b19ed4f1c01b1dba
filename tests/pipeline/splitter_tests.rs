//! Splitter pipeline tests

use std::collections::BTreeSet;
use std::fs;

use proptest::prelude::*;

use dexshard::{
    CompiledUnit, DirectorySplitSink, ManifestSource, MemorySource, MemorySplitSink, ShardError,
    ShardSplitter, ShardSummary, SplitOptions, UnitCatalog, UnitSource,
};

use crate::common::{
    assert_capacity, assert_complete, max_index, shuffled_unit_list, unit, unit_list, TestInputs,
    UnitSpec,
};

fn options(max_index: usize) -> SplitOptions {
    SplitOptions {
        max_index,
        ..SplitOptions::default()
    }
}

fn main_list(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(|s| s.to_string()).collect()
}

fn split_names(sink: &MemorySplitSink) -> Vec<Vec<String>> {
    sink.shards()
        .iter()
        .map(|s| s.entry_names().iter().map(|n| n.to_string()).collect())
        .collect()
}

fn split_all(
    units: &[CompiledUnit],
    max: usize,
    main: Option<&BTreeSet<String>>,
    minimal: bool,
) -> (Vec<Vec<String>>, Vec<ShardSummary>) {
    let catalog = UnitCatalog::new(vec![Box::new(MemorySource::from_units("gen", units))]);
    let sink = MemorySplitSink::new();
    let mut splitter = ShardSplitter::new(sink.clone(), options(max));
    splitter.run(&catalog, main, minimal).unwrap();
    let summaries = splitter.close().unwrap();
    (split_names(&sink), summaries)
}

// ============================================================================
// CAPACITY AND COMPLETENESS
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(96))]

    #[test]
    fn test_split_respects_limit_and_covers_input(units in unit_list(150), max in max_index()) {
        let (shards, summaries) = split_all(&units, max, None, false);

        prop_assert_eq!(shards.len(), summaries.len());
        assert_capacity(&shards, &units, max);
        assert_complete(&shards, &units);
        for summary in &summaries {
            prop_assert!(summary.units == 1 || (summary.fields <= max && summary.methods <= max));
        }
    }

    #[test]
    fn test_split_is_deterministic(units in unit_list(100), max in max_index()) {
        prop_assert_eq!(split_all(&units, max, None, false), split_all(&units, max, None, false));
    }

    #[test]
    fn test_input_order_does_not_matter((units, shuffled) in shuffled_unit_list(60), max in max_index()) {
        prop_assert_eq!(split_all(&units, max, None, false).0, split_all(&shuffled, max, None, false).0);
    }

    #[test]
    fn test_main_list_contained_in_first_shard(
        units in unit_list(100),
        mask in prop::collection::vec(any::<bool>(), 100),
        max in 60usize..100,
    ) {
        // Symbol pools hold 40 fields and 60 methods, so the main list always fits
        let main: BTreeSet<String> = units
            .iter()
            .zip(&mask)
            .filter(|(_, keep)| **keep)
            .map(|(u, _)| u.name().to_string())
            .collect();
        let (shards, _) = split_all(&units, max, Some(&main), true);

        let first: BTreeSet<String> = shards[0].iter().cloned().collect();
        prop_assert_eq!(first, main);
        assert_complete(&shards, &units);
        assert_capacity(&shards, &units, max);
    }
}

#[test]
fn test_distinct_owners_count_separately() {
    use crate::common::unit_owned;
    // Same field name on two owners: two distinct symbols
    let units = vec![
        unit_owned("A", "LA;", &["x"], &[]),
        unit_owned("B", "LB;", &["x"], &[]),
    ];
    let catalog = UnitCatalog::new(vec![Box::new(MemorySource::from_units("m", &units))]);
    let sink = MemorySplitSink::new();
    let mut splitter = ShardSplitter::new(sink.clone(), options(1));
    splitter.run(&catalog, None, false).unwrap();
    splitter.close().unwrap();
    assert_eq!(split_names(&sink), vec![vec!["A"], vec!["B"]]);
}

// ============================================================================
// MAIN LIST
// ============================================================================

#[test]
fn test_main_list_minimal_example() {
    let units = vec![unit("A", &["a"], &["a"]), unit("B", &["b"], &["b"]), unit("C", &["c"], &["c"])];
    let catalog = UnitCatalog::new(vec![Box::new(MemorySource::from_units("m", &units))]);
    let sink = MemorySplitSink::new();
    let mut splitter = ShardSplitter::new(sink.clone(), options(100));

    splitter.run(&catalog, Some(&main_list(&["A"])), true).unwrap();
    splitter.close().unwrap();

    let shards = sink.shards();
    assert_eq!(shards[0].name, "classes");
    assert_eq!(shards[0].entry_names(), vec!["A"]);
    assert_eq!(shards[1].name, "classes2");
    assert_eq!(shards[1].entry_names(), vec!["B", "C"]);
}

#[test]
fn test_empty_main_list_minimal_leaves_empty_first_shard() {
    let units = vec![unit("A", &["a"], &[])];
    let catalog = UnitCatalog::new(vec![Box::new(MemorySource::from_units("m", &units))]);
    let sink = MemorySplitSink::new();
    let mut splitter = ShardSplitter::new(sink.clone(), options(10));
    splitter.run(&catalog, Some(&main_list(&["Missing"])), true).unwrap();
    splitter.close().unwrap();

    let shards = sink.shards();
    assert_eq!(shards.len(), 2);
    assert!(shards[0].entries.is_empty());
    assert_eq!(shards[1].entry_names(), vec!["A"]);
}

#[test]
fn test_oversized_main_list_fails() {
    let units = vec![unit("A", &["a", "b"], &[]), unit("B", &["c", "d"], &[])];
    let catalog = UnitCatalog::new(vec![Box::new(MemorySource::from_units("m", &units))]);
    let mut splitter = ShardSplitter::new(MemorySplitSink::new(), options(3));
    let err = splitter
        .run(&catalog, Some(&main_list(&["A", "B"])), false)
        .unwrap_err();
    assert!(matches!(err, ShardError::Configuration { .. }));
}

// ============================================================================
// SOURCES AND DUPLICATES
// ============================================================================

#[test]
fn test_duplicate_across_manifests_first_wins() {
    let inputs = TestInputs::new();
    let first = inputs.manifest("first", &[UnitSpec::new("Dup").payload(b"first bytes")]);
    let second = inputs.manifest(
        "second",
        &[
            UnitSpec::new("Dup").payload(b"second bytes"),
            UnitSpec::new("Other"),
        ],
    );

    let catalog = UnitCatalog::from_manifests(&[first, second]).unwrap();
    let sink = MemorySplitSink::new();
    let mut splitter = ShardSplitter::new(sink.clone(), options(10));
    splitter.run(&catalog, None, false).unwrap();
    splitter.close().unwrap();

    let shards = sink.shards();
    assert_eq!(shards.len(), 1);
    assert_eq!(shards[0].entries.len(), 2);
    assert_eq!(shards[0].entries[0], ("Dup".to_string(), b"first bytes".to_vec()));
}

#[test]
fn test_losing_duplicate_is_never_read() {
    let inputs = TestInputs::new();
    let first = inputs.manifest("first", &[UnitSpec::new("Dup")]);
    let second = inputs.manifest("second", &[UnitSpec::new("Dup")]);
    // Break the losing entry's payload; reading it would fail
    fs::remove_file(inputs.path().join("second/0.bin")).unwrap();

    let catalog = UnitCatalog::from_manifests(&[first, second.clone()]).unwrap();
    let mut splitter = ShardSplitter::new(MemorySplitSink::new(), options(10));
    splitter.run(&catalog, None, false).unwrap();
    splitter.close().unwrap();

    assert!(ManifestSource::open(&second).unwrap().read("Dup").is_err());
}

#[test]
fn test_size_mismatch_aborts_split() {
    let inputs = TestInputs::new();
    let manifest = inputs.manifest(
        "units",
        &[UnitSpec::new("Good"), UnitSpec::new("Bad").payload(b"1234").declared_size(5)],
    );
    let catalog = UnitCatalog::from_manifests(&[manifest]).unwrap();
    let mut splitter = ShardSplitter::new(MemorySplitSink::new(), options(10));
    let err = splitter.run(&catalog, None, false).unwrap_err();
    match err {
        ShardError::CorruptInput { unit, .. } => assert_eq!(unit, "Bad"),
        other => panic!("unexpected error: {}", other),
    }
}

#[test]
fn test_compressed_entry_aborts_split() {
    let inputs = TestInputs::new();
    let manifest = inputs.manifest("units", &[UnitSpec::new("Zipped").compressed()]);
    let catalog = UnitCatalog::from_manifests(&[manifest]).unwrap();
    let mut splitter = ShardSplitter::new(MemorySplitSink::new(), options(10));
    assert!(matches!(
        splitter.run(&catalog, None, false),
        Err(ShardError::CorruptInput { .. })
    ));
}

#[test]
fn test_directory_output_layout() {
    let inputs = TestInputs::new();
    let manifest = inputs.manifest(
        "units",
        &[
            UnitSpec::new("com/a/A.class.dex").fields(&["a"]).payload(b"AAA"),
            UnitSpec::new("com/b/B.class.dex").fields(&["b"]).payload(b"BBB"),
        ],
    );
    let catalog = UnitCatalog::from_manifests(&[manifest]).unwrap();
    let sink = DirectorySplitSink::new(inputs.out()).unwrap();
    let mut splitter = ShardSplitter::new(sink, options(1));
    splitter.run(&catalog, None, false).unwrap();
    assert_eq!(splitter.close().unwrap().len(), 2);

    let out = inputs.out();
    assert_eq!(fs::read(out.join("classes/com/a/A.class.dex")).unwrap(), b"AAA");
    assert_eq!(fs::read(out.join("classes2/com/b/B.class.dex")).unwrap(), b"BBB");
}
