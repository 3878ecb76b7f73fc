//! Property-based tests for cart arithmetic and line-item uniqueness.

use proptest::prelude::*;
use qkart_api::models::{Cart, CartError, Email, PaymentOption, Product};
use rust_decimal::Decimal;
use std::collections::HashSet;

fn empty_cart() -> Cart {
    Cart::new(
        Email::parse("crio-user@gmail.com").unwrap(),
        PaymentOption::default(),
    )
}

/// Cost in cents up to 10 000.00 and a quantity up to 1 000.
fn line() -> impl Strategy<Value = (i64, u32)> {
    (0i64..1_000_000, 1u32..1_000)
}

proptest! {
    #[test]
    fn total_is_exact_sum_of_cost_times_quantity(lines in prop::collection::vec(line(), 0..20)) {
        let mut cart = empty_cart();
        let mut expected = Decimal::ZERO;
        for (cents, qty) in &lines {
            let cost = Decimal::new(*cents, 2);
            cart.add_item(Product::new("p", "c", cost), *qty).unwrap();
            expected += cost * Decimal::from(*qty);
        }
        prop_assert_eq!(cart.total(), expected);
    }

    #[test]
    fn product_ids_stay_unique(ops in prop::collection::vec((0usize..5, 1u32..10, any::<bool>()), 1..40)) {
        let products: Vec<Product> = (0..5)
            .map(|i| Product::new(format!("p{}", i), "c", Decimal::from(i + 1)))
            .collect();
        let mut cart = empty_cart();

        for (index, qty, remove) in ops {
            let product = &products[index];
            if remove {
                let was_present = cart.contains(product.id);
                let result = cart.remove_item(product.id);
                prop_assert_eq!(result.is_ok(), was_present);
            } else {
                let was_present = cart.contains(product.id);
                match cart.add_item(product.clone(), qty) {
                    Ok(()) => prop_assert!(!was_present),
                    Err(CartError::AlreadyPresent(id)) => {
                        prop_assert!(was_present);
                        prop_assert_eq!(id, product.id);
                    }
                    Err(other) => prop_assert!(false, "unexpected error {:?}", other),
                }
            }

            let ids: HashSet<_> = cart.items().iter().map(|i| i.product_id()).collect();
            prop_assert_eq!(ids.len(), cart.len());
        }
    }

    #[test]
    fn removal_preserves_relative_order(count in 2usize..8, victim in 0usize..8) {
        let victim = victim % count;
        let products: Vec<Product> = (0..count)
            .map(|i| Product::new(format!("p{}", i), "c", Decimal::ONE))
            .collect();
        let mut cart = empty_cart();
        for product in &products {
            cart.add_item(product.clone(), 1).unwrap();
        }

        cart.remove_item(products[victim].id).unwrap();

        let expected: Vec<_> = products
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != victim)
            .map(|(_, p)| p.id)
            .collect();
        let actual: Vec<_> = cart.items().iter().map(|i| i.product_id()).collect();
        prop_assert_eq!(actual, expected);
    }
}
