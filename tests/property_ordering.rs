//! Property tests for result ordering of parallel waits.

use genloop::{IoLoop, Value, Wait};
use proptest::prelude::*;

/// A permutation of `0..n` for some small `n`.
fn arb_completion_order() -> impl Strategy<Value = Vec<u32>> {
    (1u32..24).prop_flat_map(|n| Just((0..n).collect::<Vec<u32>>()).prop_shuffle())
}

/// Registers one callback per index, fires them in `order` from the loop and
/// waits on all of them, with `wait_all` or as a parallel list.
fn fire_in_order(order: Vec<u32>, as_wait_all: bool) -> genloop::Result<Value> {
    let io_loop = IoLoop::new();

    io_loop.run_sync(move |co| async move {
        let n = order.len() as u32;
        let mut callbacks = (0..n)
            .map(|i| co.callback(i).map(Some))
            .collect::<genloop::Result<Vec<_>>>()?;

        for index in order {
            if let Some(callback) = callbacks[index as usize].take() {
                IoLoop::current().add_callback(move || {
                    callback.call_with(index * 10);
                    Ok(())
                });
            }
        }

        let value = if as_wait_all {
            co.wait_all(0..n).await?
        } else {
            co.suspend((0..n).map(Wait::new).collect::<Vec<_>>()).await?
        };
        Ok(value)
    })
}

fn expected(n: u32) -> Value {
    Value::List((0..n).map(|i| Value::from(i * 10)).collect())
}

proptest! {
    #[test]
    fn parallel_wait_preserves_input_order(order in arb_completion_order()) {
        let n = order.len() as u32;
        let value = fire_in_order(order, false).unwrap();
        prop_assert_eq!(value, expected(n));
    }

    #[test]
    fn wait_all_preserves_key_order(order in arb_completion_order()) {
        let n = order.len() as u32;
        let value = fire_in_order(order, true).unwrap();
        prop_assert_eq!(value, expected(n));
    }
}
