//! Integration tests for Tickwork
//!
//! These tests drive the primitives end to end on a paused clock, so loop
//! time is virtual and deterministic.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use tickwork::{
    DebounceEngine, Deferred, EventLoop, LoopConfig, Operation, Promise, ThrottleEngine, TickError, TimerService,
    delay_from_secs,
};

fn timers() -> TimerService {
    let event_loop = EventLoop::new(LoopConfig::paused()).expect("Failed to build event loop");
    TimerService::new(&event_loop)
}

// =============================================================================
// Throttle
// =============================================================================

#[test]
fn test_throttle_burst_runs_twice() {
    let timers = timers();
    let throttle = ThrottleEngine::<()>::new(&timers);
    let count = Rc::new(Cell::new(0));
    let index = Rc::new(Cell::new(0));

    let callback = {
        let index = index.clone();
        move || {
            index.set(index.get() + 1);
            Ok(())
        }
    };

    let c = count.clone();
    timers.every(delay_from_secs(0.1), move |timer| {
        c.set(c.get() + 1);
        if c.get() >= 5 {
            timer.cancel();
        }
        throttle.throttle(delay_from_secs(0.3), callback.clone());
        Ok(())
    });
    timers.event_loop().run().unwrap();

    assert_eq!(count.get(), 5, "interval ticks 5 times");
    assert_eq!(index.get(), 2, "only twice");
}

#[test]
fn test_throttle_window_returns_same_promise() {
    let timers = timers();
    let throttle = ThrottleEngine::<u32>::new(&timers);
    let promises = Rc::new(RefCell::new(Vec::new()));

    let p = promises.clone();
    let t = throttle.clone();
    let calls = Rc::new(Cell::new(0u32));
    let c = calls.clone();
    timers.every(Duration::from_millis(50), move |timer| {
        c.set(c.get() + 1);
        if c.get() >= 4 {
            timer.cancel();
        }
        let n = c.get();
        p.borrow_mut()
            .push(t.throttle_by_id("window", Duration::from_millis(300), move || Ok(n)));
        Ok(())
    });
    timers.event_loop().run().unwrap();

    let promises = promises.borrow();
    assert_eq!(promises.len(), 4);
    assert!(promises.iter().all(|p| p.ptr_eq(&promises[0])));
    assert!(matches!(promises[0].outcome(), Some(Ok(1))), "first call's callback wins");
    assert!(throttle.is_empty());
}

#[test]
fn test_throttle_cancel_in_every_call() {
    let timers = timers();
    let throttle = ThrottleEngine::<()>::new(&timers);
    let index = Rc::new(Cell::new(0));
    let count = Rc::new(Cell::new(0));
    let last_error: Rc<RefCell<Option<TickError>>> = Rc::new(RefCell::new(None));

    let c = count.clone();
    let i = index.clone();
    let e = last_error.clone();
    let t = throttle.clone();
    timers.every(delay_from_secs(0.1), move |timer| {
        c.set(c.get() + 1);
        if c.get() >= 5 {
            timer.cancel();
        }
        let i = i.clone();
        let promise = t.throttle(delay_from_secs(0.3), move || {
            i.set(i.get() + 1);
            Ok(())
        });
        promise.cancel();
        *e.borrow_mut() = promise.outcome().and_then(|o| o.err());
        Ok(())
    });
    timers.event_loop().run().unwrap();

    assert_eq!(count.get(), 5);
    assert_eq!(index.get(), 0, "throttle promise cancelled");
    let err = last_error.borrow().clone().expect("promise should be rejected");
    assert_eq!(err.to_string(), "throttleById() was cancelled");
    assert_eq!(err.operation(), Some(Operation::ThrottleById));
    assert!(throttle.is_empty());
}

// =============================================================================
// Debounce
// =============================================================================

#[test]
fn test_debounce_burst_runs_once_after_last_call() {
    let timers = timers();
    let event_loop = timers.event_loop().clone();
    let debounce = DebounceEngine::<()>::new(&timers);
    let count = Rc::new(Cell::new(0));
    let fired: Rc<RefCell<Vec<tokio::time::Instant>>> = Rc::new(RefCell::new(Vec::new()));
    let last_call = Rc::new(Cell::new(None));
    let start = event_loop.now();

    let c = count.clone();
    let f = fired.clone();
    let l = last_call.clone();
    let el = event_loop.clone();
    timers.every(delay_from_secs(0.1), move |timer| {
        c.set(c.get() + 1);
        if c.get() >= 5 {
            timer.cancel();
        }
        l.set(Some(el.now()));
        let f = f.clone();
        let clock = el.clone();
        debounce.debounce(delay_from_secs(0.3), move || {
            f.borrow_mut().push(clock.now());
            Ok(())
        });
        Ok(())
    });
    event_loop.run().unwrap();

    assert!(count.get() >= 5, "interval ticks at least 5 times");
    let fired = fired.borrow();
    assert_eq!(fired.len(), 1, "only once");

    let last_call = last_call.get().unwrap();
    assert!(last_call.duration_since(start) >= Duration::from_millis(500));
    assert!(fired[0].duration_since(last_call) >= Duration::from_millis(300));
}

#[test]
fn test_debounce_cancel_in_every_call() {
    let timers = timers();
    let debounce = DebounceEngine::<()>::new(&timers);
    let index = Rc::new(Cell::new(0));
    let count = Rc::new(Cell::new(0));
    let last_error: Rc<RefCell<Option<TickError>>> = Rc::new(RefCell::new(None));

    let c = count.clone();
    let i = index.clone();
    let e = last_error.clone();
    let d = debounce.clone();
    timers.every(delay_from_secs(0.1), move |timer| {
        c.set(c.get() + 1);
        if c.get() >= 5 {
            timer.cancel();
        }
        let i = i.clone();
        let promise = d.debounce(delay_from_secs(0.3), move || {
            i.set(i.get() + 1);
            Ok(())
        });
        promise.cancel();
        *e.borrow_mut() = promise.outcome().and_then(|o| o.err());
        Ok(())
    });
    timers.event_loop().run().unwrap();

    assert!(count.get() >= 5);
    assert_eq!(index.get(), 0, "promise cancelled");
    let err = last_error.borrow().clone().expect("promise should be rejected");
    assert_eq!(err.to_string(), "debounceById() was cancelled");
    assert!(debounce.is_empty());
}

#[test]
fn test_debounce_registry_does_not_grow() {
    let timers = timers();
    let debounce = DebounceEngine::<()>::new(&timers);
    let max_len = Rc::new(Cell::new(0));
    let count = Rc::new(Cell::new(0));
    let index = Rc::new(Cell::new(0));

    let c = count.clone();
    let m = max_len.clone();
    let i = index.clone();
    let d = debounce.clone();
    timers.every(delay_from_secs(0.1), move |timer| {
        c.set(c.get() + 1);
        if c.get() >= 30 {
            timer.cancel();
        }
        let i = i.clone();
        d.debounce(delay_from_secs(0.3), move || {
            i.set(i.get() + 1);
            Ok(())
        });
        m.set(m.get().max(d.len()));
        Ok(())
    });
    timers.event_loop().run().unwrap();

    assert_eq!(count.get(), 30);
    assert_eq!(max_len.get(), 1);
    assert_eq!(index.get(), 1);
    assert!(debounce.is_empty());
    assert_eq!(timers.event_loop().pending(), 0);
}

// =============================================================================
// Timers, next tick and wait
// =============================================================================

#[test]
fn test_after_error_keeps_loop_alive() {
    let timers = timers();
    let event_loop = timers.event_loop().clone();
    let start = event_loop.now();
    let end = Rc::new(Cell::new(None));

    timers.after(Duration::ZERO, || Err(eyre::eyre!("division by zero")));
    let e = end.clone();
    let el = event_loop.clone();
    timers.after(Duration::from_secs(1), move || {
        e.set(Some(el.now()));
        Ok(())
    });
    event_loop.run().unwrap();

    let end = end.get().expect("second timer should fire");
    assert!(end.duration_since(start) >= Duration::from_secs(1), "loop lasts for 1 second");
}

#[test]
fn test_every_with_error_is_cancelled() {
    let timers = timers();
    let runs = Rc::new(Cell::new(0));

    let r = runs.clone();
    timers.every(Duration::ZERO, move |_| {
        r.set(r.get() + 1);
        Err(eyre::eyre!("division by zero"))
    });
    timers.after(Duration::from_secs(1), || Ok(()));
    timers.event_loop().run().unwrap();

    assert_eq!(runs.get(), 1);
}

#[test]
fn test_cancelled_every_never_runs() {
    let timers = timers();
    let event_loop = timers.event_loop().clone();
    let ran = Rc::new(Cell::new(false));

    let r = ran.clone();
    let handle = timers.every(Duration::from_millis(100), move |_| {
        r.set(true);
        Ok(())
    });
    assert!(timers.cancel(&handle));
    assert!(!timers.cancel(&handle));

    let start = event_loop.now();
    event_loop.run().unwrap();
    assert!(!ran.get());
    assert_eq!(event_loop.now(), start, "loop exits immediately");
}

#[test]
fn test_next_tick_stops_loop_before_timer() {
    let timers = timers();
    let event_loop = timers.event_loop().clone();
    let start = event_loop.now();

    timers.after(Duration::from_secs(1), || Ok(()));
    let el = event_loop.clone();
    timers.next_tick(move || {
        el.stop();
        Ok(())
    });
    event_loop.run().unwrap();

    assert!(event_loop.now().duration_since(start) < Duration::from_secs(1));
}

#[test]
fn test_next_tick_cancel() {
    let timers = timers();
    let event_loop = timers.event_loop().clone();
    let start = event_loop.now();

    timers.after(Duration::from_secs(1), || Ok(()));
    let el = event_loop.clone();
    let promise = timers.next_tick(move || {
        el.stop();
        Ok(())
    });

    let seen: Rc<RefCell<Option<TickError>>> = Rc::new(RefCell::new(None));
    let s = seen.clone();
    promise.on_failure(move |e| *s.borrow_mut() = Some(e));
    promise.cancel();
    event_loop.run().unwrap();

    assert!(
        event_loop.now().duration_since(start) >= Duration::from_secs(1),
        "stop never ran, loop waited for the timer"
    );
    let err = seen.borrow().clone().expect("cancellation should reject");
    assert_eq!(err.to_string(), "nextTick() was cancelled");
}

#[test]
fn test_wait_timeout_on_never_settling_promise() {
    let timers = timers();
    let event_loop = timers.event_loop().clone();
    let never: Deferred<()> = Deferred::new();
    let start = event_loop.now();

    let err = event_loop.wait(&never.promise(), Some(delay_from_secs(0.5))).unwrap_err();

    assert!(err.is_timeout());
    assert!(event_loop.now().duration_since(start) >= Duration::from_millis(500));
}

#[test]
fn test_wait_on_debounced_promise() {
    let timers = timers();
    let debounce = DebounceEngine::<String>::new(&timers);

    let mut last: Option<Promise<String>> = None;
    for word in ["t", "ti", "tic", "tick"] {
        last = Some(debounce.debounce_by_id("search", Duration::from_millis(250), move || Ok(word.to_string())));
    }

    let value = timers
        .event_loop()
        .wait(&last.unwrap(), Some(Duration::from_secs(5)))
        .unwrap();
    assert_eq!(value, "tick");
}

#[test]
fn test_wait_on_chained_throttle() {
    let timers = timers();
    let throttle = ThrottleEngine::<u32>::new(&timers);

    let promise = throttle.throttle_by_id("answer", Duration::from_millis(100), || Ok(41));
    let chained = promise.then(|v| Ok(v + 1));

    let value = timers.event_loop().wait(&chained, None).unwrap();
    assert_eq!(value, 42);
    assert!(throttle.is_empty());
}

#[test]
fn test_next_tick_runs_before_zero_delay_timer() {
    let timers = timers();
    let order = Rc::new(RefCell::new(Vec::new()));

    let o = order.clone();
    timers.after(Duration::ZERO, move || {
        o.borrow_mut().push("timer");
        Ok(())
    });
    let o = order.clone();
    let tick = timers.next_tick(move || {
        o.borrow_mut().push("tick");
        Ok(())
    });
    timers.event_loop().run().unwrap();

    assert_eq!(*order.borrow(), vec!["tick", "timer"]);
    assert!(matches!(tick.outcome(), Some(Ok(()))));
}

#[test]
fn test_never_delay_does_not_fire() {
    let timers = timers();
    let event_loop = timers.event_loop().clone();
    let throttle = ThrottleEngine::<()>::new(&timers);
    let fired = Rc::new(Cell::new(0));

    let f = fired.clone();
    timers.after(Duration::MAX, move || {
        f.set(f.get() + 1);
        Ok(())
    });
    let f = fired.clone();
    let promise = throttle.throttle_by_id("never", delay_from_secs(f64::INFINITY), move || {
        f.set(f.get() + 1);
        Ok(())
    });

    let el = event_loop.clone();
    timers.after(Duration::from_secs(5), move || {
        el.stop();
        Ok(())
    });
    event_loop.run().unwrap();

    assert_eq!(fired.get(), 0);
    assert!(promise.is_pending());
    assert!(throttle.cancel("never"));
    assert!(throttle.is_empty());
}
