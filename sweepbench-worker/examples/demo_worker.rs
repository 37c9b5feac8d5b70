//! A small worker executable with example payload tasks, useful for trying
//! the controller end to end:
//!
//! ```sh
//! cargo run --example demo_worker  # then speak the line protocol on stdin
//! ```

use std::any::Any;
use std::collections::BTreeSet;
use sweepbench_worker::{TaskDef, WorkerMain};

fn prepare_values(size: usize) -> Option<Box<dyn Any + Send>> {
    // A fixed multiplicative scramble keeps the inputs deterministic per size
    // without being pre-sorted.
    let values: Vec<u64> = (0..size as u64)
        .map(|i| i.wrapping_mul(0x9e37_79b9_7f4a_7c15))
        .collect();
    Some(Box::new(values))
}

fn values(instance: &(dyn Any + Send)) -> &Vec<u64> {
    instance
        .downcast_ref::<Vec<u64>>()
        .expect("demo tasks prepare Vec<u64> instances")
}

inventory::submit! {
    TaskDef {
        name: "array.sum",
        prepare: prepare_values,
        run: |instance| {
            let total: u64 = values(instance).iter().copied().fold(0, u64::wrapping_add);
            std::hint::black_box(total);
        },
    }
}

inventory::submit! {
    TaskDef {
        name: "array.sort",
        prepare: prepare_values,
        run: |instance| {
            let mut data = values(instance).clone();
            data.sort_unstable();
            std::hint::black_box(data.len());
        },
    }
}

inventory::submit! {
    TaskDef {
        name: "btree.insert",
        prepare: prepare_values,
        run: |instance| {
            let set: BTreeSet<u64> = values(instance).iter().copied().collect();
            std::hint::black_box(set.len());
        },
    }
}

fn main() {
    if let Err(e) = WorkerMain::new().run() {
        eprintln!("demo_worker: {e}");
        std::process::exit(1);
    }
}
