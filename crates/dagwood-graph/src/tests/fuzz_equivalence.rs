//! Randomized equivalence against the petgraph oracle: the engine and
//! the oracle must agree on every cycle rejection, on the final edge
//! set, and on all-pairs reachability.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rustc_hash::FxHashMap;

use super::common::{
    dag_edges, dag_with, id, random_unlinked_pair, EdgeBook, OracleDag,
};
use crate::{GraphError, ReachMode, Trit};

fn fuzz_against_oracle(mode: ReachMode, nodes: u32, remove_probability: f64, seed: u64) {
    let mut dag = dag_with(mode);
    let mut oracle = OracleDag::new();
    let mut rng = StdRng::seed_from_u64(seed);
    let mut book = EdgeBook::new();
    let mut tristates: FxHashMap<(u32, u32), u8> = FxHashMap::default();

    for v in 0..nodes {
        dag.create_vertex(id(v)).unwrap();
        oracle.create_vertex(v);
    }

    let steps = (nodes as usize * nodes as usize) / 4;
    let mut rejected = 0u32;
    for _ in 0..steps {
        let remove = book.len() > 0 && rng.gen_bool(remove_probability);
        if remove {
            let (from, to) = book.random_edge(&mut rng);
            assert!(oracle.clear_edge(from, to));
            assert_eq!(dag.clear_edge(id(from), id(to)), Ok(true));
            book.remove((from, to));
            tristates.remove(&(from, to));
            continue;
        }

        let (from, to) = random_unlinked_pair(&dag, nodes, &mut rng);
        let oracle_rejected = oracle.set_edge(from, to).is_err();
        match dag.set_edge(id(from), id(to)) {
            Ok(true) => {
                assert!(
                    !oracle_rejected,
                    "engine admitted {from} -> {to} but the oracle saw a cycle"
                );
                book.insert((from, to));
                if mode == ReachMode::CachedUserTristate {
                    let value = rng.gen_range(0..3u8);
                    dag.set_edge_tristate(id(from), id(to), Trit::new(value).unwrap())
                        .unwrap();
                    tristates.insert((from, to), value);
                }
            }
            Err(GraphError::CycleWouldBeIntroduced { .. }) => {
                assert!(
                    oracle_rejected,
                    "engine rejected {from} -> {to} but the oracle found no cycle"
                );
                rejected += 1;
            }
            other => panic!("unexpected outcome for {from} -> {to}: {other:?}"),
        }
    }
    if remove_probability == 0.0 {
        // a quarter-dense insert-only schedule always runs into cycles
        assert!(rejected > 0, "schedule never exercised a rejection");
    }

    assert_eq!(dag_edges(&dag, nodes), oracle.edges());

    for from in 0..nodes {
        for to in 0..nodes {
            assert_eq!(
                dag.can_reach(id(from), id(to)),
                Ok(oracle.can_reach(from, to)),
                "reachability diverges for {from} -> {to}"
            );
        }
    }

    for (&(from, to), &value) in &tristates {
        assert_eq!(
            dag.edge_tristate(id(from), id(to)),
            Ok(Trit::new(value).unwrap())
        );
    }

    assert!(dag.is_internally_consistent());
}

#[test]
fn insert_only_schedules_match_the_oracle() {
    fuzz_against_oracle(ReachMode::Cached, 48, 0.0, 0xDA6);
    fuzz_against_oracle(ReachMode::CachedUserTristate, 48, 0.0, 0xDA6);
    fuzz_against_oracle(ReachMode::CachedReachWithoutLink, 48, 0.0, 0xDA6);
    fuzz_against_oracle(ReachMode::Uncached, 48, 0.0, 0xDA6);
}

#[test]
fn removal_heavy_schedules_match_the_oracle() {
    fuzz_against_oracle(ReachMode::Cached, 32, 0.25, 0xBEEF);
    fuzz_against_oracle(ReachMode::CachedUserTristate, 32, 0.25, 0xBEEF);
    fuzz_against_oracle(ReachMode::CachedReachWithoutLink, 32, 0.25, 0xBEEF);
    fuzz_against_oracle(ReachMode::Uncached, 32, 0.25, 0xBEEF);
}

#[test]
fn light_removal_schedules_match_the_oracle() {
    for seed in 0..4 {
        fuzz_against_oracle(ReachMode::Cached, 24, 0.125, seed);
        fuzz_against_oracle(ReachMode::CachedReachWithoutLink, 24, 0.125, seed);
    }
}
