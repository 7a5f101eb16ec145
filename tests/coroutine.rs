use genloop::time::sleep;
use genloop::{coroutine, engine, return_future, yield_now, Future, IoLoop, Value};
use std::rc::Rc;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
#[error("division by zero")]
struct ZeroDivision;

#[derive(Debug, thiserror::Error)]
#[error("replaced")]
struct Replaced;

fn zero_division() -> genloop::Result<()> {
    Err(ZeroDivision.into())
}

fn async_add(a: i64, b: i64) -> Future {
    return_future(move |callback| {
        IoLoop::current().add_callback(move || {
            callback.call_with(a + b);
            Ok(())
        });
        Ok(())
    })
}

#[test]
fn test_sync_return() {
    let future = coroutine(|_co| async { Ok(42) });

    assert!(future.done(), "Coroutine without yield points settles immediately");
    assert_eq!(future.result().unwrap(), Value::Int(42));
}

#[test]
fn test_async_return() {
    let value = IoLoop::new()
        .run_sync(|co| async move {
            co.suspend(yield_now()).await?;
            Ok(42)
        })
        .unwrap();

    assert_eq!(value, Value::Int(42));
}

#[test]
fn test_fallthrough_returns_none() {
    let future = coroutine(|_co| async { Ok(()) });
    assert_eq!(future.result().unwrap(), Value::None);
}

#[test]
fn test_sync_raise() {
    // Nothing is raised at the call site.
    let future = coroutine(|_co| async {
        zero_division()?;
        Ok(())
    });

    assert!(future.failed());
    assert!(future.result().unwrap_err().is::<ZeroDivision>());
}

#[test]
fn test_async_raise() {
    let err = IoLoop::new()
        .run_sync(|co| async move {
            co.suspend(yield_now()).await?;
            zero_division()?;
            Ok(())
        })
        .unwrap_err();

    assert!(err.is::<ZeroDivision>());
}

#[test]
fn test_pass_callback() {
    let value = IoLoop::new()
        .run_sync(|co| async move {
            let value = co
                .task(|callback| {
                    callback.call_with(42);
                    Ok(())
                })
                .await?;
            Ok(value)
        })
        .unwrap();

    assert_eq!(value, Value::Int(42));
}

#[test]
fn test_coroutine_awaits_coroutine() {
    let value = IoLoop::new()
        .run_sync(|co| async move {
            let inner = coroutine(|co| async move {
                co.suspend(sleep(Duration::from_millis(1))).await?;
                Ok("inner")
            });
            let value = co.suspend(inner).await?;
            Ok(value)
        })
        .unwrap();

    assert_eq!(value, Value::from("inner"));
}

#[test]
fn test_replace_yieldpoint_exception() {
    let future = coroutine(|co| async move {
        let failing = co.task(|_callback| engine(|_co| async { zero_division() }));
        match failing.await {
            Err(err) if err.is::<ZeroDivision>() => Err(Replaced.into()),
            other => other,
        }
    });

    assert!(future.result().unwrap_err().is::<Replaced>());
}

#[test]
fn test_swallow_yieldpoint_exception() {
    let future = coroutine(|co| async move {
        let failing = co.task(|_callback| engine(|_co| async { zero_division() }));
        match failing.await {
            Err(err) if err.is::<ZeroDivision>() => Ok(Value::Int(42)),
            other => other,
        }
    });

    assert_eq!(future.result().unwrap(), Value::Int(42));
}

#[test]
fn test_replace_context_exception() {
    let err = IoLoop::new()
        .run_sync(|co| async move {
            let io_loop = IoLoop::current();
            io_loop.add_callback(zero_division);

            let waited = co.task(move |callback| {
                io_loop.call_later(Duration::from_secs(10), move || {
                    callback.notify();
                    Ok(())
                });
                Ok(())
            });
            match waited.await {
                Err(err) if err.is::<ZeroDivision>() => Err(Replaced.into()),
                other => other,
            }
        })
        .unwrap_err();

    assert!(err.is::<Replaced>(), "Expected the replaced error, got {err}");
}

#[test]
fn test_swallow_context_exception() {
    let value = IoLoop::new()
        .run_sync(|co| async move {
            let io_loop = IoLoop::current();
            io_loop.add_callback(zero_division);

            let waited = co.task(move |callback| {
                io_loop.call_later(Duration::from_secs(10), move || {
                    callback.notify();
                    Ok(())
                });
                Ok(())
            });
            match waited.await {
                Err(err) if err.is::<ZeroDivision>() => Ok(Value::Int(42)),
                other => other,
            }
        })
        .unwrap();

    assert_eq!(value, Value::Int(42));
}

#[test]
fn test_return_future() {
    let value = IoLoop::new()
        .run_sync(|co| async move {
            let sum = co.suspend(async_add(1, 2)).await?;
            Ok(sum)
        })
        .unwrap();

    assert_eq!(value, Value::Int(3));
}

#[test]
fn test_return_future_failure_before_callback() {
    let future = return_future(|_callback| zero_division());

    assert!(future.failed(), "Immediate failure should become the future's failure");
    assert!(future.result().unwrap_err().is::<ZeroDivision>());
}

#[test]
fn test_multi_future() {
    let value = IoLoop::new()
        .run_sync(|co| async move {
            let sums = co.suspend(vec![async_add(1, 2), async_add(3, 4)]).await?;
            Ok(sums)
        })
        .unwrap();

    assert_eq!(value, Value::List(vec![Value::Int(3), Value::Int(7)]));
}

#[test]
fn test_multi_delayed() {
    let value = IoLoop::new()
        .run_sync(|co| async move {
            let slow = coroutine(|co| async move {
                co.suspend(sleep(Duration::from_millis(20))).await?;
                Ok("v1")
            });
            let fast = coroutine(|co| async move {
                co.suspend(sleep(Duration::from_millis(5))).await?;
                Ok("v2")
            });
            let both = co.suspend(vec![slow, fast]).await?;
            Ok(both)
        })
        .unwrap();

    assert_eq!(
        value,
        Value::List(vec![Value::from("v1"), Value::from("v2")]),
        "Results should follow input order, not completion order"
    );
}

#[derive(Debug, thiserror::Error)]
#[error("{0} failed")]
struct Named(&'static str);

#[test]
fn test_multi_first_failure_in_completion_order() {
    let err = IoLoop::new()
        .run_sync(|co| async move {
            let slow = coroutine(|co| async move {
                co.suspend(sleep(Duration::from_millis(20))).await?;
                Err::<(), _>(Named("slow").into())
            });
            let fast = coroutine(|co| async move {
                co.suspend(sleep(Duration::from_millis(5))).await?;
                Err::<(), _>(Named("fast").into())
            });
            let both = co.suspend(vec![slow, fast]).await?;
            Ok(both)
        })
        .unwrap_err();

    let named = err.downcast_ref::<Named>().expect("application error");
    assert_eq!(named.0, "fast");
}

#[test]
fn test_run_sync_unfinished() {
    let never = Future::new();
    let token = Rc::new(());
    let weak = Rc::downgrade(&token);

    let err = IoLoop::new()
        .run_sync(move |co| async move {
            let _held = token;
            let value = co.suspend(never).await?;
            Ok(value)
        })
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<genloop::GenError>(),
        Some(genloop::GenError::Unfinished)
    ));
    assert!(weak.upgrade().is_none(), "Unfinished computation should not be kept alive");
}

#[test]
fn test_same_future_twice_in_parallel() {
    let future = Future::resolved(1);
    let both = coroutine(move |co| async move {
        let both = co.suspend(vec![future.clone(), future]).await?;
        Ok(both)
    });

    assert_eq!(both.result().unwrap(), Value::List(vec![Value::Int(1), Value::Int(1)]));
}

#[test]
fn test_same_failing_future_twice_in_parallel() {
    let pending = Future::new();
    let waited = pending.clone();
    let both = coroutine(move |co| async move {
        let both = co.suspend(vec![waited.clone(), waited]).await?;
        Ok(both)
    });
    assert!(!both.done());

    pending.set_exception(ZeroDivision).unwrap();
    assert!(both.result().unwrap_err().is::<ZeroDivision>());
}
