use genloop::time::{timeout, with_timeout};
use genloop::{engine, yield_now, Future, GenError, IoLoop, IoLoopBuilder, UnhandledPolicy, Value};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::{Duration, Instant};

#[derive(Debug, thiserror::Error)]
#[error("boom")]
struct Boom;

#[test]
fn test_empty_loop_returns() {
    let io_loop = IoLoop::new();
    io_loop.run().unwrap();
    assert!(!io_loop.is_running());
}

#[test]
fn test_callbacks_run_in_order() {
    let io_loop = IoLoop::new();
    let order = Rc::new(RefCell::new(Vec::new()));

    for i in 0..5 {
        let order = order.clone();
        io_loop.add_callback(move || {
            order.borrow_mut().push(i);
            Ok(())
        });
    }
    io_loop.run().unwrap();

    assert_eq!(*order.borrow(), vec![0, 1, 2, 3, 4]);
}

#[test]
fn test_current_loop_is_installed_while_running() {
    assert!(IoLoop::try_current().is_none(), "No loop outside of run()");

    let io_loop = IoLoop::new();
    let seen = Rc::new(Cell::new(false));

    let s = seen.clone();
    io_loop.add_callback(move || {
        s.set(IoLoop::current().is_running());
        Ok(())
    });
    io_loop.run().unwrap();

    assert!(seen.get());
    assert!(IoLoop::try_current().is_none(), "Loop should be uninstalled after run()");
}

#[test]
fn test_timers_fire_in_deadline_order() {
    let io_loop = IoLoop::new();
    let order = Rc::new(RefCell::new(Vec::new()));

    for (label, delay) in [("late", 15), ("early", 5), ("middle", 10)] {
        let order = order.clone();
        io_loop.call_later(Duration::from_millis(delay), move || {
            order.borrow_mut().push(label);
            Ok(())
        });
    }
    io_loop.run().unwrap();

    assert_eq!(*order.borrow(), vec!["early", "middle", "late"]);
}

#[test]
fn test_remove_timeout() {
    let io_loop = IoLoop::new();
    let fired = Rc::new(Cell::new(false));

    let f = fired.clone();
    let handle = io_loop.call_later(Duration::from_millis(5), move || {
        f.set(true);
        Ok(())
    });

    assert!(io_loop.remove_timeout(handle));
    assert!(!io_loop.remove_timeout(handle), "Second removal should report nothing removed");
    io_loop.run().unwrap();

    assert!(!fired.get(), "Removed timeout should never fire");
}

#[test]
fn test_sleep() {
    let io_loop = IoLoop::new();
    let start = Instant::now();

    let future = io_loop.sleep(Duration::from_millis(20));
    io_loop.run().unwrap();

    assert!(future.done());
    assert!(start.elapsed() >= Duration::from_millis(20));
}

#[test]
fn test_stop() {
    let io_loop = IoLoop::new();
    let ran = Rc::new(Cell::new(false));

    let lp = io_loop.clone();
    io_loop.add_callback(move || {
        lp.stop();
        Ok(())
    });
    let r = ran.clone();
    io_loop.add_callback(move || {
        r.set(true);
        Ok(())
    });

    io_loop.run().unwrap();
    assert!(!ran.get(), "Callbacks after stop() should wait for the next run()");

    io_loop.run().unwrap();
    assert!(ran.get());
}

#[test]
fn test_unhandled_error_stops_loop() {
    let io_loop = IoLoop::new();
    let ran = Rc::new(Cell::new(false));

    io_loop.add_callback(|| Err(Boom.into()));
    let r = ran.clone();
    io_loop.add_callback(move || {
        r.set(true);
        Ok(())
    });

    let err = io_loop.run().unwrap_err();
    assert!(err.is::<Boom>());
    assert!(!ran.get(), "Loop should stop at the first unhandled error");
}

#[test]
fn test_unhandled_error_logged() {
    let io_loop = IoLoopBuilder::new().unhandled(UnhandledPolicy::Log).build();
    let ran = Rc::new(Cell::new(false));

    io_loop.add_callback(|| Err(Boom.into()));
    let r = ran.clone();
    io_loop.add_callback(move || {
        r.set(true);
        Ok(())
    });

    io_loop.run().unwrap();
    assert!(ran.get(), "Log policy should keep the loop running");
}

#[test]
fn test_engine_failure_surfaces_as_unhandled() {
    let io_loop = IoLoop::new();

    io_loop.add_callback(|| {
        engine(|co| async move {
            co.suspend(yield_now()).await?;
            Err::<(), _>(Boom.into())
        })
    });

    let err = io_loop.run().unwrap_err();
    assert!(err.is::<Boom>());
}

#[test]
fn test_yield_now_lets_queued_callbacks_run() {
    let io_loop = IoLoop::new();
    let order = Rc::new(RefCell::new(Vec::new()));

    let o = order.clone();
    io_loop.add_callback(move || {
        let queued = o.clone();
        IoLoop::current().add_callback(move || {
            queued.borrow_mut().push("queued");
            Ok(())
        });

        engine(move |co| async move {
            o.borrow_mut().push("before");
            co.suspend(yield_now()).await?;
            o.borrow_mut().push("after");
            Ok(())
        })
    });
    io_loop.run().unwrap();

    assert_eq!(*order.borrow(), vec!["before", "queued", "after"]);
}

#[test]
fn test_run_sync_value() {
    let io_loop = IoLoop::builder().max_idle_sleep(Duration::from_millis(1)).build();
    let value = io_loop.run_sync(|_co| async { Ok("done") }).unwrap();
    assert_eq!(value, Value::from("done"));
}

#[test]
fn test_with_timeout_expires() {
    let io_loop = IoLoop::new();
    let never = Future::new();

    let bounded = timeout(&io_loop, Duration::from_millis(5), never.clone());
    io_loop.run().unwrap();

    let err = bounded.result().unwrap_err();
    assert!(matches!(err.downcast_ref::<GenError>(), Some(GenError::Timeout)));

    // A late outcome is dropped without touching the timed-out future.
    never.set_result(1).unwrap();
}

#[test]
fn test_with_timeout_completes_in_time() {
    let io_loop = IoLoop::new();
    let start = Instant::now();

    let quick = io_loop.sleep(Duration::from_millis(5));
    let bounded = with_timeout(&io_loop, io_loop.time() + Duration::from_secs(10), quick);
    io_loop.run().unwrap();

    assert_eq!(bounded.result().unwrap(), Value::None);
    assert!(
        start.elapsed() < Duration::from_secs(5),
        "Timer should be removed once the future settles"
    );
}

#[test]
fn test_with_timeout_inside_coroutine() {
    let io_loop = IoLoop::new();
    let lp = io_loop.clone();

    let err = io_loop
        .run_sync(move |co| async move {
            let value = co
                .suspend(timeout(&lp, Duration::from_millis(5), Future::new()))
                .await?;
            Ok(value)
        })
        .unwrap_err();

    assert!(matches!(err.downcast_ref::<GenError>(), Some(GenError::Timeout)));
}
