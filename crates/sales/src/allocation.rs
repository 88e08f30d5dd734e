//! Split reservation of order items across candidate warehouses.
//!
//! Candidates are consulted in slice order (home warehouse first, then fallbacks).
//! Each item takes whatever a candidate holds, up to the remaining quantity, and
//! moves on to the next candidate until the item is covered. If any item cannot be
//! covered, every reserve made during the call is released again, so the
//! warehouses end with the quantities they started with.

use chrono::{DateTime, Utc};

use wms_core::{DomainError, DomainResult, OrderId};
use wms_inventory::{ProductReserve, Warehouse};

use crate::order::Item;

/// Reserve every item in `items` for `order_id`, all or nothing.
pub fn reserve_items(
    order_id: OrderId,
    items: &[Item],
    candidates: &mut [&mut Warehouse],
    occurred_at: DateTime<Utc>,
) -> DomainResult<Vec<ProductReserve>> {
    let mut made = Vec::new();
    for item in items {
        match reserve_item(order_id, item, candidates, occurred_at) {
            Ok(mut reserves) => made.append(&mut reserves),
            Err(err) => return Err(rolled_back(err, &made, candidates, occurred_at)),
        }
    }
    Ok(made)
}

/// Give every reserve's units back to the warehouse it was taken from.
pub fn release_reserves(
    reserves: &[ProductReserve],
    candidates: &mut [&mut Warehouse],
    occurred_at: DateTime<Utc>,
) -> DomainResult<()> {
    for reserve in reserves.iter().rev() {
        let warehouse = candidates
            .iter_mut()
            .find(|w| w.id_typed() == reserve.warehouse_id())
            .ok_or_else(|| {
                DomainError::not_found(format!("warehouse {}", reserve.warehouse_id()))
            })?;
        reserve.return_stock(warehouse, occurred_at)?;
    }
    Ok(())
}

fn reserve_item(
    order_id: OrderId,
    item: &Item,
    candidates: &mut [&mut Warehouse],
    occurred_at: DateTime<Utc>,
) -> DomainResult<Vec<ProductReserve>> {
    let product_id = item.product().id();
    let wanted = item.quantity();

    let total: u64 = candidates
        .iter()
        .map(|w| u64::from(w.available(product_id)))
        .sum();
    if total < u64::from(wanted) {
        let available = u32::try_from(total).unwrap_or(u32::MAX);
        return Err(DomainError::insufficient_stock(
            product_id.as_str(),
            wanted,
            available,
        ));
    }

    let mut remaining = wanted;
    let mut reserves = Vec::new();
    for idx in 0..candidates.len() {
        if remaining == 0 {
            break;
        }
        let take = remaining.min(candidates[idx].available(product_id));
        if take == 0 {
            continue;
        }
        match candidates[idx].reserve(product_id, take, order_id, occurred_at) {
            Ok(reserve) => {
                remaining -= take;
                reserves.push(reserve);
            }
            Err(err) => return Err(rolled_back(err, &reserves, candidates, occurred_at)),
        }
    }

    if remaining > 0 {
        let err = DomainError::insufficient_stock(product_id.as_str(), wanted, wanted - remaining);
        return Err(rolled_back(err, &reserves, candidates, occurred_at));
    }
    Ok(reserves)
}

/// Undo `reserves` and hand back the error that caused it.
fn rolled_back(
    cause: DomainError,
    reserves: &[ProductReserve],
    candidates: &mut [&mut Warehouse],
    occurred_at: DateTime<Utc>,
) -> DomainError {
    match release_reserves(reserves, candidates, occurred_at) {
        Ok(()) => cause,
        Err(rollback) => {
            DomainError::invariant(format!("rollback after '{cause}' failed: {rollback}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wms_inventory::Address;
    use wms_products::{Product, ProductId};

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn product(sku: &str) -> Product {
        Product::new(sku, format!("Product {sku}"), 100).unwrap()
    }

    fn warehouse(city: &str, stock: &[(&str, u32)]) -> Warehouse {
        let address = Address::new(city, "Dock Rd", "1").unwrap();
        let mut warehouse = Warehouse::new(format!("{city} DC"), address).unwrap();
        for (sku, quantity) in stock {
            warehouse
                .add_stock(&ProductId::new(*sku).unwrap(), *quantity, test_time())
                .unwrap();
        }
        warehouse
    }

    #[test]
    fn home_warehouse_is_used_when_it_has_enough() {
        let mut home = warehouse("CityA", &[("X", 5)]);
        let mut other = warehouse("CityB", &[("X", 5)]);
        let items = vec![Item::new(product("X"), 5).unwrap()];

        let reserves =
            reserve_items(OrderId::new(), &items, &mut [&mut home, &mut other], test_time())
                .unwrap();

        assert_eq!(reserves.len(), 1);
        assert_eq!(reserves[0].warehouse_id(), home.id_typed());
        assert_eq!(home.available(&ProductId::new("X").unwrap()), 0);
        assert_eq!(other.available(&ProductId::new("X").unwrap()), 5);
    }

    #[test]
    fn shortage_is_split_across_candidates_in_order() {
        let mut home = warehouse("CityA", &[("X", 3)]);
        let mut empty = warehouse("CityC", &[]);
        let mut other = warehouse("CityB", &[("X", 4)]);
        let items = vec![Item::new(product("X"), 5).unwrap()];

        let reserves = reserve_items(
            OrderId::new(),
            &items,
            &mut [&mut home, &mut empty, &mut other],
            test_time(),
        )
        .unwrap();

        let split: Vec<_> = reserves
            .iter()
            .map(|r| (r.warehouse_id(), r.quantity()))
            .collect();
        assert_eq!(split, vec![(home.id_typed(), 3), (other.id_typed(), 2)]);
        assert_eq!(home.available(&ProductId::new("X").unwrap()), 0);
        assert_eq!(other.available(&ProductId::new("X").unwrap()), 2);
    }

    #[test]
    fn insufficient_total_fails_without_touching_stock() {
        let mut home = warehouse("CityA", &[("X", 3)]);
        let mut other = warehouse("CityB", &[("X", 1)]);
        let items = vec![Item::new(product("X"), 5).unwrap()];

        let err = reserve_items(OrderId::new(), &items, &mut [&mut home, &mut other], test_time())
            .unwrap_err();

        assert_eq!(err, DomainError::insufficient_stock("X", 5, 4));
        assert_eq!(home.available(&ProductId::new("X").unwrap()), 3);
        assert_eq!(other.available(&ProductId::new("X").unwrap()), 1);
        assert!(home.pending_events().len() == 1 && other.pending_events().len() == 1);
    }

    #[test]
    fn later_item_failure_rolls_back_earlier_items() {
        let mut home = warehouse("CityA", &[("X", 3), ("Y", 1)]);
        let mut other = warehouse("CityB", &[("X", 4)]);
        let items = vec![
            Item::new(product("X"), 5).unwrap(),
            Item::new(product("Y"), 2).unwrap(),
        ];

        let err = reserve_items(OrderId::new(), &items, &mut [&mut home, &mut other], test_time())
            .unwrap_err();

        assert_eq!(err, DomainError::insufficient_stock("Y", 2, 1));
        assert_eq!(home.available(&ProductId::new("X").unwrap()), 3);
        assert_eq!(home.available(&ProductId::new("Y").unwrap()), 1);
        assert_eq!(other.available(&ProductId::new("X").unwrap()), 4);
    }

    #[test]
    fn repeated_product_lines_see_each_others_reservations() {
        let mut home = warehouse("CityA", &[("X", 4)]);
        let items = vec![
            Item::new(product("X"), 3).unwrap(),
            Item::new(product("X"), 2).unwrap(),
        ];

        let err = reserve_items(OrderId::new(), &items, &mut [&mut home], test_time()).unwrap_err();

        assert_eq!(err, DomainError::insufficient_stock("X", 2, 1));
        assert_eq!(home.available(&ProductId::new("X").unwrap()), 4);
    }

    #[test]
    fn no_candidates_means_insufficient_stock() {
        let items = vec![Item::new(product("X"), 1).unwrap()];
        let err = reserve_items(OrderId::new(), &items, &mut [], test_time()).unwrap_err();
        assert_eq!(err, DomainError::insufficient_stock("X", 1, 0));
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Property: units are conserved. Whatever is reserved leaves the
            /// shelves, and a failed call leaves every shelf as it was.
            #[test]
            fn reservation_conserves_units(
                shelves in proptest::collection::vec(0u32..20, 1..5),
                wanted in 1u32..60,
            ) {
                let mut warehouses: Vec<Warehouse> = shelves
                    .iter()
                    .enumerate()
                    .map(|(i, qty)| {
                        let mut w = warehouse(&format!("City{i}"), &[]);
                        if *qty > 0 {
                            w.add_stock(&ProductId::new("X").unwrap(), *qty, test_time()).unwrap();
                        }
                        w
                    })
                    .collect();
                let before: u32 = shelves.iter().sum();
                let items = vec![Item::new(product("X"), wanted).unwrap()];

                let mut refs: Vec<&mut Warehouse> = warehouses.iter_mut().collect();
                let result = reserve_items(OrderId::new(), &items, &mut refs, test_time());
                let after: u32 = warehouses
                    .iter()
                    .map(|w| w.available(&ProductId::new("X").unwrap()))
                    .sum();

                match result {
                    Ok(reserves) => {
                        let reserved: u32 = reserves.iter().map(|r| r.quantity()).sum();
                        prop_assert_eq!(reserved, wanted);
                        prop_assert_eq!(after, before - wanted);
                    }
                    Err(_) => {
                        prop_assert!(wanted > before);
                        prop_assert_eq!(after, before);
                    }
                }
            }
        }
    }
}
