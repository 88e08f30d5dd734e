use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use chrono::Utc;
use serde_json::Value as JsonValue;
use std::sync::Arc;

use wms_core::OrderId;
use wms_events::{EventEnvelope, InMemoryEventBus};
use wms_infra::{FulfillmentConfig, FulfillmentService, WarehouseRegistry};
use wms_inventory::{Address, Warehouse};
use wms_products::{Product, ProductId};
use wms_sales::{reserve_items, Item};

fn warehouses(count: usize, per_shelf: u32) -> Vec<Warehouse> {
    let sku = ProductId::new("X").unwrap();
    (0..count)
        .map(|i| {
            let address = Address::new(format!("City{i}"), "Dock Rd", "1").unwrap();
            let mut warehouse = Warehouse::new(format!("DC {i}"), address).unwrap();
            warehouse.add_stock(&sku, per_shelf, Utc::now()).unwrap();
            warehouse.drain_events();
            warehouse
        })
        .collect()
}

/// Pure split: one item drawn from every candidate warehouse.
fn bench_split_reservation(c: &mut Criterion) {
    let mut group = c.benchmark_group("split_reservation");
    let item = Item::new(Product::new("X", "Widget", 100).unwrap(), 1).unwrap();

    for count in [1usize, 8, 64, 256] {
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            // Each warehouse holds one unit, so the item must visit all of them.
            let items = vec![Item::new(item.product().clone(), count as u32).unwrap()];
            b.iter_batched(
                || warehouses(count, 1),
                |mut stock| {
                    let mut refs: Vec<&mut Warehouse> = stock.iter_mut().collect();
                    black_box(reserve_items(OrderId::new(), &items, &mut refs, Utc::now()).unwrap())
                },
                criterion::BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

/// Full service path: lock, reserve with fallback, publish, for a fresh order each time.
fn bench_start_completing(c: &mut Criterion) {
    let mut group = c.benchmark_group("start_completing");
    group.sample_size(200);

    for count in [2usize, 16, 64] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            let bus: Arc<InMemoryEventBus<EventEnvelope<JsonValue>>> =
                Arc::new(InMemoryEventBus::new());
            let service =
                FulfillmentService::new(Arc::new(WarehouseRegistry::new()), bus, FulfillmentConfig::default());
            for warehouse in warehouses(count, u32::MAX / 2) {
                service.register_warehouse(warehouse).unwrap();
            }
            let product = Product::new("X", "Widget", 100).unwrap();
            let home = Address::new("City0", "Elm St", "3").unwrap();

            b.iter(|| {
                let order_id = service.place_order(home.clone()).unwrap();
                service.add_item(order_id, product.clone(), black_box(3)).unwrap();
                service.start_completing(order_id).unwrap();
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_split_reservation, bench_start_completing);
criterion_main!(benches);
