//! Run-level invariants checked across random seeds and configurations.

use bookstore_core::{
    rules, ActivationOrder, BookId, BookstoreModel, EventKind, InventoryId, ModelConfig,
    QuantityPolicy, RestockScope,
};
use proptest::prelude::*;
use std::collections::{BTreeMap, BTreeSet};

fn config_strategy() -> impl Strategy<Value = ModelConfig> {
    (
        0i64..i64::MAX,
        1usize..8,
        1usize..4,
        1u64..15,
        1u32..10,
        0u32..10,
        (1u32..4, 0u32..3),
        any::<bool>(),
        any::<bool>(),
    )
        .prop_map(
            |(seed, customers, employees, steps, threshold, headroom, (min, spread), shuffled, global)| {
                ModelConfig::default()
                    .with_seed(Some(seed))
                    .with_customers(customers)
                    .with_employees(employees)
                    .with_steps(steps)
                    .with_restock(threshold, threshold + headroom)
                    .with_quantity(QuantityPolicy::Uniform {
                        min,
                        max: min + spread,
                    })
                    .with_activation(if shuffled {
                        ActivationOrder::Shuffled
                    } else {
                        ActivationOrder::Sequential
                    })
                    .with_restock_scope(if global {
                        RestockScope::Global
                    } else {
                        RestockScope::Managed
                    })
            },
        )
}

fn run(config: ModelConfig) -> BookstoreModel {
    let mut model = BookstoreModel::new(config).expect("valid config");
    model.run_configured().expect("classic catalog has no setup defects");
    model
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn orders_match_purchase_ok_events(config in config_strategy()) {
        let model = run(config);
        let store = model.store();

        let ok_books: Vec<(BookId, u32)> = model
            .events()
            .into_iter()
            .filter_map(|record| match record.kind {
                EventKind::PurchaseOk { book, qty, .. } => Some((book, qty)),
                _ => None,
            })
            .collect();
        let order_books: Vec<(BookId, u32)> = store
            .orders()
            .iter()
            .map(|order| (order.book.clone(), order.qty))
            .collect();

        prop_assert_eq!(ok_books, order_books);
    }

    #[test]
    fn stock_is_conserved_every_tick(config in config_strategy()) {
        let model = run(config);
        let store = model.store();
        let book_to_inventory: BTreeMap<BookId, InventoryId> = store
            .inventories()
            .map(|inv| (inv.book.clone(), inv.id.clone()))
            .collect();

        // Net change per (tick, inventory) from the event log
        let mut delta: BTreeMap<(u64, InventoryId), i64> = BTreeMap::new();
        for record in model.events() {
            match record.kind {
                EventKind::PurchaseOk { book, qty, .. } => {
                    let inventory = book_to_inventory[&book].clone();
                    *delta.entry((record.tick, inventory)).or_default() -= i64::from(qty);
                }
                EventKind::Restock { inventory, qty, .. } => {
                    *delta.entry((record.tick, inventory)).or_default() += i64::from(qty);
                }
                _ => {}
            }
        }

        let mut expected: BTreeMap<InventoryId, i64> = model
            .initial_levels()
            .iter()
            .map(|(id, qty)| (id.clone(), i64::from(*qty)))
            .collect();
        for snapshot in model.snapshots() {
            for (inventory, level) in expected.iter_mut() {
                *level += delta.get(&(snapshot.tick, inventory.clone())).copied().unwrap_or(0);
                prop_assert!(*level >= 0);
                prop_assert_eq!(i64::from(snapshot.levels[inventory]), *level);
            }
        }
    }

    #[test]
    fn unrestocked_inventories_never_grow(config in config_strategy()) {
        let model = run(config);
        let restocked: BTreeSet<InventoryId> = model
            .events()
            .into_iter()
            .filter_map(|record| match record.kind {
                EventKind::Restock { inventory, .. } => Some(inventory),
                _ => None,
            })
            .collect();

        for (inventory, initial) in model.initial_levels() {
            if restocked.contains(inventory) {
                continue;
            }
            let mut previous = *initial;
            for snapshot in model.snapshots() {
                let level = snapshot.levels[inventory];
                prop_assert!(level <= previous);
                previous = level;
            }

            let book = model.store().inventory(inventory).unwrap().book.clone();
            let sold: u32 = model
                .store()
                .orders()
                .iter()
                .filter(|order| order.book == book)
                .map(|order| order.qty)
                .sum();
            prop_assert_eq!(initial - previous, sold);
        }
    }

    #[test]
    fn same_seed_same_event_stream(config in config_strategy()) {
        let first = run(config.clone()).events();
        let second = run(config).events();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn low_stock_is_idempotent(config in config_strategy()) {
        let model = run(config);
        let threshold = model.config().restock_threshold;
        let store = model.store();

        let first = rules::low_stock(&store, threshold);
        let second = rules::low_stock(&store, threshold);
        prop_assert_eq!(&first, &second);

        for inventory in store.inventories() {
            prop_assert_eq!(
                first.contains(&inventory.id),
                inventory.available_quantity < threshold
            );
        }
    }

    #[test]
    fn snapshot_ticks_are_consecutive(config in config_strategy()) {
        let steps = config.steps;
        let model = run(config);
        let ticks: Vec<u64> = model.snapshots().iter().map(|s| s.tick).collect();
        prop_assert_eq!(ticks, (0..steps).collect::<Vec<_>>());

        let mut last = 0;
        for record in model.events() {
            prop_assert!(record.tick >= last);
            prop_assert!(record.tick < steps);
            last = record.tick;
        }
    }
}
