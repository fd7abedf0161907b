//! Lane priority: preemption replay, time slicing, transitions.

use std::cell::RefCell;
use std::rc::Rc;

use pretty_assertions::assert_eq;
use spark_reconciler::element::{component, component_fn, host, text};
use spark_reconciler::render::{Dispatch, StartTransition};
use spark_reconciler::schedule::SchedulerPriority;
use spark_reconciler::testkit::rig;

type Slot<T> = Rc<RefCell<Option<T>>>;

fn counter_app(slot: Slot<Dispatch<i32>>) -> spark_reconciler::ComponentFn {
    component_fn(move |cx, _| {
        let (n, set_n) = cx.use_state(|| 0);
        *slot.borrow_mut() = Some(set_n);
        Ok(host("div").child(text(n.to_string())).into())
    })
}

#[test]
fn test_high_priority_preempts_and_low_priority_replays_in_order() {
    let slot: Slot<Dispatch<i32>> = Rc::new(RefCell::new(None));
    let app = counter_app(slot.clone());

    let r = rig();
    r.root.render(component(&app).into());
    r.flush();
    let set = slot.borrow().clone().unwrap();

    // Arrival order: +1 at default priority, then ×2 at immediate priority.
    set.update(|n| n + 1);
    r.scheduler
        .run_at(SchedulerPriority::Immediate, || set.update(|n| n * 2));

    // The sync flush computes without waiting for the default update:
    // it rewinds to the state before the skip, so only ×2 applies.
    r.host.flush_microtasks();
    assert_eq!(r.snapshot(), "<#container><div>\"0\"</div></#container>");

    // The skipped update is not lost: rendering the default lane replays
    // both transitions in arrival order, (0 + 1) * 2.
    r.flush();
    assert_eq!(r.snapshot(), "<#container><div>\"2\"</div></#container>");
}

#[test]
fn test_time_sliced_pass_resumes_across_yields() {
    let slot: Slot<Dispatch<i32>> = Rc::new(RefCell::new(None));
    let captured = slot.clone();
    // A wide tree, so one pass spans several yield checks.
    let app = component_fn(move |cx, _| {
        let (n, set_n) = cx.use_state(|| 0);
        *captured.borrow_mut() = Some(set_n);
        Ok(host("ul")
            .children((0..8).map(|i| host("li").key(i.to_string()).child(text(format!("{i}:{n}"))).into()))
            .into())
    });

    let r = rig();
    r.root.render(component(&app).into());
    r.flush();
    slot.borrow().clone().unwrap().set(1);

    let mut task_runs = 0;
    while r.scheduler.has_tasks() {
        // Re-arm the yield signal so every slice performs a few units.
        r.scheduler.set_yield_after(Some(3));
        assert!(r.scheduler.run_next_task(false));
        task_runs += 1;
        assert!(task_runs < 100, "pass never completed");
        r.host.flush_microtasks();
    }

    assert!(task_runs > 1, "expected the pass to be sliced");
    assert!(r.snapshot().contains("7:1"));
}

#[test]
fn test_overdue_task_stops_yielding() {
    let slot: Slot<Dispatch<i32>> = Rc::new(RefCell::new(None));
    let app = counter_app(slot.clone());

    let r = rig();
    r.root.render(component(&app).into());
    r.flush();
    slot.borrow().clone().unwrap().set(3);

    // Yield immediately on every check, but mark the task overdue: it must
    // run to completion anyway.
    r.scheduler.set_yield_after(Some(0));
    assert!(r.scheduler.run_next_task(true));
    r.scheduler.set_yield_after(None);
    assert_eq!(r.snapshot(), "<#container><div>\"3\"</div></#container>");
}

#[test]
fn test_transition_keeps_pending_flag_up_until_transition_commits() {
    let slot: Slot<(Dispatch<i32>, StartTransition)> = Rc::new(RefCell::new(None));
    let captured = slot.clone();
    let app = component_fn(move |cx, _| {
        let (n, set_n) = cx.use_state(|| 0);
        let (pending, start) = cx.use_transition();
        *captured.borrow_mut() = Some((set_n, start));
        Ok(text(format!("{pending}:{n}")))
    });

    let r = rig();
    r.root.render(component(&app).into());
    r.flush();
    assert_eq!(r.snapshot(), "<#container>\"false:0\"</#container>");

    let (set_n, start) = slot.borrow().clone().unwrap();
    start.run(|| set_n.set(7));

    // First pass renders the urgent lanes: the pending flag is up, the
    // transition-tagged update is still parked.
    assert!(r.scheduler.run_next_task(false));
    assert_eq!(r.snapshot(), "<#container>\"true:0\"</#container>");

    // The transition lane then commits both the value and the flag reset.
    r.flush();
    assert_eq!(r.snapshot(), "<#container>\"false:7\"</#container>");
}
