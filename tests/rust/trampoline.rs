// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

mod common;

//======================================================================================================================
// Imports
//======================================================================================================================

use ::anyhow::Result;
use ::std::{
    cell::RefCell,
    rc::Rc,
};
use ::swirl::{
    early_return,
    early_return_call,
    runtime::scheduler::SharedEventLoop,
    Arg,
    AsyncCoroutine,
    AsyncReturn,
    BoxCoroutine,
    Coroutine,
    Fail,
    Operation,
    Received,
    Reply,
    Resumption,
    Routine,
    SharedScheduler,
    SharedSink,
    Status,
    Step,
    Trampoline,
};
use common::{
    Collector,
    CountingSink,
    MAX_TURNS,
};

//======================================================================================================================
// Helpers
//======================================================================================================================

/// Suspends a fixed number of times and tracks how deeply its resumptions nest.
struct DepthTracker {
    remaining: usize,
    depth: Rc<RefCell<usize>>,
    max_depth: Rc<RefCell<usize>>,
}

impl Coroutine<i64> for DepthTracker {
    fn resume(&mut self, _resumption: Resumption<i64>) -> Step<i64> {
        *self.depth.borrow_mut() += 1;
        let depth: usize = *self.depth.borrow();
        if depth > *self.max_depth.borrow() {
            *self.max_depth.borrow_mut() = depth;
        }

        let step: Step<i64> = if self.remaining == 0 {
            Step::Completed
        } else {
            self.remaining -= 1;
            Step::Pending(Operation::ready(self.remaining as i64))
        };

        *self.depth.borrow_mut() -= 1;
        step
    }
}

fn start(
    event_loop: &SharedEventLoop,
    coroutine: BoxCoroutine<i64>,
    sink: Option<SharedSink>,
    collector: &Collector<i64>,
) -> Result<::swirl::SharedTrampoline<i64>> {
    Ok(Trampoline::start(
        "test",
        event_loop.scheduler(),
        coroutine,
        sink,
        Some(collector.callback()),
    )?)
}

//======================================================================================================================
// Tests
//======================================================================================================================

/// Resumptions never nest, even when every operation completes synchronously.
#[test]
fn resumptions_never_nest() -> Result<()> {
    let event_loop: SharedEventLoop = SharedEventLoop::default();
    let depth: Rc<RefCell<usize>> = Rc::new(RefCell::new(0));
    let max_depth: Rc<RefCell<usize>> = Rc::new(RefCell::new(0));
    let coroutine: BoxCoroutine<i64> = Box::new(DepthTracker {
        remaining: 500,
        depth: depth.clone(),
        max_depth: max_depth.clone(),
    });
    let collector: Collector<i64> = Collector::new();

    let trampoline = start(&event_loop, coroutine, None, &collector)?;
    event_loop.run_until_idle(MAX_TURNS)?;

    swirl::ensure_eq!(trampoline.status(), Status::Completed);
    swirl::ensure_eq!(trampoline.steps(), 501);
    swirl::ensure_eq!(*max_depth.borrow(), 1);
    swirl::ensure_eq!(*depth.borrow(), 0);
    Ok(())
}

/// The sink is finished exactly once when a coroutine completes.
#[test]
fn sink_is_finished_once_on_completion() -> Result<()> {
    let event_loop: SharedEventLoop = SharedEventLoop::default();
    let sink: Rc<RefCell<CountingSink>> = CountingSink::shared();
    let scheduler: SharedScheduler = event_loop.scheduler();
    let coroutine: BoxCoroutine<i64> = AsyncCoroutine::boxed(move |co| async move {
        co.wait_value(Operation::later(scheduler.clone(), vec![Arg::Value(1)])).await?;
        co.wait_value(Operation::later(scheduler, vec![Arg::Value(2)])).await?;
        Ok(None)
    });
    let collector: Collector<i64> = Collector::new();

    let trampoline = start(&event_loop, coroutine, Some(sink.clone()), &collector)?;
    event_loop.run_until_idle(MAX_TURNS)?;

    swirl::ensure_eq!(trampoline.status(), Status::Completed);
    swirl::ensure_eq!(sink.borrow().finished, 1);
    swirl::ensure_eq!(sink.borrow().failures.len(), 0);
    swirl::ensure_eq!(collector.take().len(), 0);
    Ok(())
}

/// A trailing null is dropped and several values arrive as one composite.
#[test]
fn trailing_null_is_stripped() -> Result<()> {
    let event_loop: SharedEventLoop = SharedEventLoop::default();
    let scheduler: SharedScheduler = event_loop.scheduler();
    let seen: Rc<RefCell<Vec<Received<i64>>>> = Rc::new(RefCell::new(Vec::new()));
    let seen_: Rc<RefCell<Vec<Received<i64>>>> = seen.clone();
    let coroutine: BoxCoroutine<i64> = AsyncCoroutine::boxed(move |co| async move {
        let one: Received<i64> = co
            .wait(Operation::later(scheduler.clone(), vec![Arg::Value(5), Arg::Null]))
            .await?;
        seen_.borrow_mut().push(one);
        let many: Received<i64> = co
            .wait(Operation::later(scheduler, vec![Arg::Value(1), Arg::Value(2), Arg::Null]))
            .await?;
        seen_.borrow_mut().push(many);
        Ok(None)
    });
    let collector: Collector<i64> = Collector::new();

    start(&event_loop, coroutine, None, &collector)?;
    event_loop.run_until_idle(MAX_TURNS)?;

    swirl::ensure_eq!(
        *seen.borrow(),
        vec![Received::One(5), Received::Many(vec![Some(1), Some(2)])]
    );
    Ok(())
}

/// A lone null resumes without a value and null members of a composite are kept.
#[test]
fn null_results_resume_coroutine() -> Result<()> {
    let event_loop: SharedEventLoop = SharedEventLoop::default();
    let scheduler: SharedScheduler = event_loop.scheduler();
    let seen: Rc<RefCell<Vec<Received<i64>>>> = Rc::new(RefCell::new(Vec::new()));
    let seen_: Rc<RefCell<Vec<Received<i64>>>> = seen.clone();
    let coroutine: BoxCoroutine<i64> = AsyncCoroutine::boxed(move |co| async move {
        let nothing: Received<i64> = co
            .wait(Operation::later(scheduler.clone(), vec![Arg::Null, Arg::Null]))
            .await?;
        seen_.borrow_mut().push(nothing);
        let values: Vec<Option<i64>> = co
            .wait_values(Operation::later(scheduler, vec![Arg::Value(1), Arg::Null, Arg::Null]))
            .await?;
        seen_.borrow_mut().push(Received::Many(values));
        Ok(Some(early_return(7)))
    });
    let collector: Collector<i64> = Collector::new();

    let trampoline = start(&event_loop, coroutine, None, &collector)?;
    event_loop.run_until_idle(MAX_TURNS)?;

    swirl::ensure_eq!(trampoline.status(), Status::Returned);
    swirl::ensure_eq!(
        *seen.borrow(),
        vec![Received::Nothing, Received::Many(vec![Some(1), None])]
    );
    swirl::ensure_eq!(collector.take(), vec![7]);
    Ok(())
}

/// An error carried by a result is thrown instead of being delivered.
#[test]
fn wrapped_error_takes_precedence() -> Result<()> {
    let event_loop: SharedEventLoop = SharedEventLoop::default();
    let scheduler: SharedScheduler = event_loop.scheduler();
    let e: Fail = Fail::new(libc::ECONNREFUSED, "upstream refused");
    let reply: Reply = Reply::failed(599, e.clone());
    let caught: Rc<RefCell<Option<Fail>>> = Rc::new(RefCell::new(None));
    let caught_: Rc<RefCell<Option<Fail>>> = caught.clone();
    let coroutine: BoxCoroutine<Reply> = AsyncCoroutine::boxed(move |co| async move {
        match co.wait_value(Operation::later(scheduler, vec![Arg::Value(reply), Arg::Null])).await {
            Ok(_) => (),
            Err(e) => *caught_.borrow_mut() = Some(e),
        }
        Ok(Some(early_return(Reply::new(200, b"recovered".to_vec()))))
    });
    let collector: Collector<Reply> = Collector::new();

    Trampoline::start("fetch", event_loop.scheduler(), coroutine, None, Some(collector.callback()))?;
    event_loop.run_until_idle(MAX_TURNS)?;

    swirl::ensure_eq!(caught.borrow().clone(), Some(e));
    let replies: Vec<Reply> = collector.take();
    swirl::ensure_eq!(replies.len(), 1);
    swirl::ensure_eq!(replies[0].code, 200);
    Ok(())
}

/// An early return ends the coroutine, reaches the final callback and still finishes the sink.
#[test]
fn early_return_short_circuits() -> Result<()> {
    let event_loop: SharedEventLoop = SharedEventLoop::default();
    let sink: Rc<RefCell<CountingSink>> = CountingSink::shared();
    let coroutine: BoxCoroutine<i64> = AsyncCoroutine::boxed(|_co| async move { Ok(Some(early_return(42))) });
    let collector: Collector<i64> = Collector::new();

    let trampoline = start(&event_loop, coroutine, Some(sink.clone()), &collector)?;
    event_loop.run_until_idle(MAX_TURNS)?;

    swirl::ensure_eq!(trampoline.status(), Status::Returned);
    swirl::ensure_eq!(collector.take(), vec![42]);
    swirl::ensure_eq!(sink.borrow().finished, 1);
    swirl::ensure_eq!(event_loop.dispatched(), 0);
    Ok(())
}

/// Returning a deferred call early hands the final callback to the callee.
#[test]
fn chained_early_return_reaches_outer_callback() -> Result<()> {
    let event_loop: SharedEventLoop = SharedEventLoop::default();
    let scheduler: SharedScheduler = event_loop.scheduler();
    let inner: AsyncReturn<(), i64> = AsyncReturn::new(
        "inner",
        event_loop.scheduler(),
        Routine::coroutine(move |_: ()| {
            let scheduler: SharedScheduler = scheduler.clone();
            AsyncCoroutine::boxed(move |co| async move {
                let x: i64 = co.wait_value(Operation::later(scheduler, vec![Arg::Value(7)])).await?;
                Ok(Some(early_return(x)))
            })
        }),
    )?;
    let coroutine: BoxCoroutine<i64> = AsyncCoroutine::boxed(move |_co| async move {
        Ok(Some(early_return_call(inner.call(()))))
    });
    let collector: Collector<i64> = Collector::new();

    let trampoline = start(&event_loop, coroutine, None, &collector)?;
    swirl::ensure_eq!(trampoline.status(), Status::Returned);
    swirl::ensure_eq!(collector.take().len(), 0);

    event_loop.run_until_idle(MAX_TURNS)?;
    swirl::ensure_eq!(collector.take(), vec![7]);
    Ok(())
}

/// An awaited operation reports `(5, null)` and the coroutine returns its square.
#[test]
fn awaited_value_is_squared() -> Result<()> {
    let event_loop: SharedEventLoop = SharedEventLoop::default();
    let scheduler: SharedScheduler = event_loop.scheduler();
    let sink: Rc<RefCell<CountingSink>> = CountingSink::shared();
    let coroutine: BoxCoroutine<i64> = AsyncCoroutine::boxed(move |co| async move {
        let x: i64 = co
            .wait_value(Operation::later(scheduler, vec![Arg::Value(5), Arg::Null]))
            .await?;
        Ok(Some(early_return(x * x)))
    });
    let collector: Collector<i64> = Collector::new();

    start(&event_loop, coroutine, Some(sink.clone()), &collector)?;
    event_loop.run_until_idle(MAX_TURNS)?;

    swirl::ensure_eq!(collector.take(), vec![25]);
    swirl::ensure_eq!(sink.borrow().finished, 1);
    swirl::ensure_eq!(sink.borrow().failures.len(), 0);
    Ok(())
}

/// An unrecovered error reaches the sink's failure handler once and the sink is not finished separately.
#[test]
fn unrecovered_error_reaches_sink_once() -> Result<()> {
    let event_loop: SharedEventLoop = SharedEventLoop::default();
    let scheduler: SharedScheduler = event_loop.scheduler();
    let sink: Rc<RefCell<CountingSink>> = CountingSink::shared();
    let e: Fail = Fail::new(libc::EIO, "backend exploded");
    let e_: Fail = e.clone();
    let coroutine: BoxCoroutine<i64> = AsyncCoroutine::boxed(move |co| async move {
        co.wait_value(Operation::later(scheduler, vec![Arg::Error(e_)])).await?;
        Ok(Some(early_return(1)))
    });
    let collector: Collector<i64> = Collector::new();

    let trampoline = start(&event_loop, coroutine, Some(sink.clone()), &collector)?;
    event_loop.run_until_idle(MAX_TURNS)?;

    swirl::ensure_eq!(trampoline.status(), Status::Failed);
    swirl::ensure_eq!(sink.borrow().failures.clone(), vec![e]);
    swirl::ensure_eq!(sink.borrow().finished, 0);
    swirl::ensure_eq!(collector.take().len(), 0);
    Ok(())
}

/// A failure after output was committed is only logged.
#[test]
fn failure_after_commit_is_not_reported() -> Result<()> {
    let event_loop: SharedEventLoop = SharedEventLoop::default();
    let scheduler: SharedScheduler = event_loop.scheduler();
    let sink: Rc<RefCell<CountingSink>> = CountingSink::shared();
    sink.borrow_mut().committed = true;
    let coroutine: BoxCoroutine<i64> = AsyncCoroutine::boxed(move |co| async move {
        co.wait_value(Operation::later(scheduler, vec![Arg::Error(Fail::new(libc::EIO, "late"))]))
            .await?;
        Ok(None)
    });
    let collector: Collector<i64> = Collector::new();

    start(&event_loop, coroutine, Some(sink.clone()), &collector)?;
    event_loop.run_until_idle(MAX_TURNS)?;

    swirl::ensure_eq!(sink.borrow().failures.len(), 0);
    swirl::ensure_eq!(sink.borrow().finished, 0);
    Ok(())
}

/// Without a sink an unrecovered error surfaces from the event loop.
#[test]
fn unrecovered_error_without_sink_surfaces() -> Result<()> {
    let event_loop: SharedEventLoop = SharedEventLoop::default();
    let scheduler: SharedScheduler = event_loop.scheduler();
    let coroutine: BoxCoroutine<i64> = AsyncCoroutine::boxed(move |co| async move {
        co.wait_value(Operation::later(scheduler, vec![Arg::Error(Fail::new(libc::EIO, "lost"))]))
            .await?;
        Ok(None)
    });
    let collector: Collector<i64> = Collector::new();

    start(&event_loop, coroutine, None, &collector)?;
    match event_loop.run_until_idle(MAX_TURNS) {
        Err(e) => swirl::ensure_eq!(e.errno, libc::EIO),
        Ok(_) => anyhow::bail!("failure should surface from the event loop"),
    }
    Ok(())
}
