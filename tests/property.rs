use itchbook::book::MarketBook;
use itchbook::message::{
    AddOrder, Body, DeleteOrder, Message, OrderCancelled, OrderExecuted, OrderExecutedWithPrice,
    ReplaceOrder,
};
use itchbook::types::{Price4, Side, Symbol};
use proptest::prelude::*;
use proptest::sample::select;

proptest! {
    #[test]
    fn book_invariants_hold(msgs in prop::collection::vec(any_msg(), 1..5000)) {
        let mut book = MarketBook::new();
        book.reserve_orders(10_000);

        for msg in &msgs {
            let _ = book.apply(msg);
        }
        book.assert_invariants();
    }

    #[test]
    fn deleting_every_reference_empties_the_book(msgs in prop::collection::vec(any_msg(), 1..1000)) {
        let mut book = MarketBook::new();
        for msg in &msgs {
            let _ = book.apply(msg);
        }

        for msg in &msgs {
            for reference in named_references(msg) {
                let _ = book.apply(&Message::new(
                    0,
                    0,
                    0,
                    Body::DeleteOrder(DeleteOrder { reference }),
                ));
            }
        }

        prop_assert!(book.is_empty());
        prop_assert_eq!(book.open_orders(), 0);
        book.assert_invariants();
    }

    #[test]
    fn add_then_delete_leaves_empty_book(
        reference in any::<u64>(),
        side in any_side(),
        shares in 1u32..1_000_000,
        price in 1u32..10_000_000,
    ) {
        let stock = Symbol::new(b"TEST");
        let mut book = MarketBook::new();

        let _ = book.apply(&Message::new(1, 0, 10, Body::AddOrder(AddOrder {
            reference,
            side,
            shares,
            stock,
            price: Price4::from_raw(price),
            mpid: None,
        })));
        let _ = book.apply(&Message::new(1, 0, 11, Body::DeleteOrder(DeleteOrder {
            reference,
        })));

        prop_assert!(book.is_empty());
        prop_assert_eq!(book.best_prices(&stock), (Price4::ZERO, Price4::ZERO));
        prop_assert_eq!(book.side_volumes(&stock), (0, 0));
        book.assert_invariants();
    }
}

/// Every order reference a message can introduce or address.
fn named_references(msg: &Message) -> Vec<u64> {
    match &msg.body {
        Body::AddOrder(b) => vec![b.reference],
        Body::OrderExecuted(b) => vec![b.reference],
        Body::OrderExecutedWithPrice(b) => vec![b.reference],
        Body::OrderCancelled(b) => vec![b.reference],
        Body::DeleteOrder(b) => vec![b.reference],
        Body::ReplaceOrder(b) => vec![b.old_reference, b.new_reference],
        _ => Vec::new(),
    }
}

fn any_side() -> impl Strategy<Value = Side> {
    select(vec![Side::Buy, Side::Sell])
}

fn any_sym() -> impl Strategy<Value = Symbol> {
    select(vec![
        Symbol::new(b"AAPL"),
        Symbol::new(b"MSFT"),
        Symbol::new(b"TSLA"),
    ])
}

// A narrow reference/price universe so executes, cancels and replaces
// frequently hit live orders.
fn any_msg() -> impl Strategy<Value = Message> {
    let body = prop_oneof![
        (1u64..400, any_side(), 0u32..5_000, any_sym(), 1u32..2_000).prop_map(
            |(reference, side, shares, stock, px)| Body::AddOrder(AddOrder {
                reference,
                side,
                shares,
                stock,
                price: Price4::from_raw(px),
                mpid: None,
            })
        ),
        (1u64..400, 1u32..6_000, any::<u64>()).prop_map(|(reference, executed, match_number)| {
            Body::OrderExecuted(OrderExecuted {
                reference,
                executed,
                match_number,
            })
        }),
        (1u64..400, 1u32..6_000, any::<u64>(), any::<bool>(), 1u32..2_000).prop_map(
            |(reference, executed, match_number, printable, px)| {
                Body::OrderExecutedWithPrice(OrderExecutedWithPrice {
                    reference,
                    executed,
                    match_number,
                    printable,
                    price: Price4::from_raw(px),
                })
            }
        ),
        (1u64..400, 1u32..6_000).prop_map(|(reference, cancelled)| {
            Body::OrderCancelled(OrderCancelled {
                reference,
                cancelled,
            })
        }),
        (1u64..400).prop_map(|reference| Body::DeleteOrder(DeleteOrder { reference })),
        (1u64..400, 400u64..900, 0u32..5_000, 1u32..2_000).prop_map(
            |(old_reference, new_reference, shares, px)| {
                Body::ReplaceOrder(ReplaceOrder {
                    old_reference,
                    new_reference,
                    shares,
                    price: Price4::from_raw(px),
                })
            }
        ),
    ];

    (any::<u16>(), 0u64..(1 << 48), body)
        .prop_map(|(locate, ts, body)| Message::new(locate, 0, ts, body))
}
