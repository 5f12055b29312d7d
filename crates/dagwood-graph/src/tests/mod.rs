mod common;

mod fuzz_equivalence;
