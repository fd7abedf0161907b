//! Hook behavior: state retention, the positional-pairing contract, effect
//! ordering, and context shadowing.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use pretty_assertions::assert_eq;
use spark_reconciler::element::{component, component_fn, host, text};
use spark_reconciler::render::{Context, Dispatch};
use spark_reconciler::testkit::rig;

type Slot<T> = Rc<RefCell<Option<Dispatch<T>>>>;

#[test]
fn test_state_survives_rerenders_and_folds_in_order() {
    let slot: Slot<i32> = Rc::new(RefCell::new(None));
    let captured = slot.clone();
    let app = component_fn(move |cx, _| {
        let (n, set_n) = cx.use_state(|| 0);
        *captured.borrow_mut() = Some(set_n);
        Ok(host("div").child(text(n.to_string())).into())
    });

    let r = rig();
    r.root.render(component(&app).into());
    r.flush();
    assert_eq!(r.snapshot(), "<#container><div>\"0\"</div></#container>");

    let set = slot.borrow().clone().unwrap();
    set.update(|n| n + 1);
    set.update(|n| n * 10);
    r.flush();

    // Same result as folding the transitions left-to-right: (0 + 1) * 10.
    assert_eq!(r.snapshot(), "<#container><div>\"10\"</div></#container>");
}

#[test]
#[should_panic(expected = "rendered fewer hooks")]
fn test_conditional_hook_call_is_fatal_on_update() {
    let extra_hook = Rc::new(Cell::new(true));
    let toggle = extra_hook.clone();
    let app = component_fn(move |cx, _| {
        let (n, _) = cx.use_state(|| 1);
        if toggle.get() {
            let _ = cx.use_state(|| 2);
        }
        Ok(text(n.to_string()))
    });

    let r = rig();
    r.root.render(component(&app).into());
    r.flush();

    extra_hook.set(false);
    r.root.render(component(&app).into());
    r.flush();
}

#[test]
#[should_panic(expected = "changed kind between renders")]
fn test_hook_kind_swap_is_fatal_on_update() {
    let swap = Rc::new(Cell::new(false));
    let toggle = swap.clone();
    let app = component_fn(move |cx, _| {
        if toggle.get() {
            cx.use_effect((), || None);
        } else {
            let _ = cx.use_state(|| 0);
        }
        Ok(text("x"))
    });

    let r = rig();
    r.root.render(component(&app).into());
    r.flush();

    swap.set(true);
    r.root.render(component(&app).into());
    r.flush();
}

#[test]
fn test_effect_destroys_run_before_any_create() {
    let log: Rc<RefCell<Vec<String>>> = Rc::new(RefCell::new(Vec::new()));
    let slot: Slot<i32> = Rc::new(RefCell::new(None));

    let x_log = log.clone();
    let x = component_fn(move |cx, props| {
        let n = props.payload_as::<i32>().copied().unwrap_or(0);
        let create_log = x_log.clone();
        cx.use_effect(n, move || {
            create_log.borrow_mut().push(format!("x:create:{n}"));
            let destroy_log = create_log.clone();
            Some(Box::new(move || {
                destroy_log.borrow_mut().push("x:destroy".to_string());
            }) as Box<dyn FnOnce()>)
        });
        Ok(text(format!("x{n}")))
    });

    let y_log = log.clone();
    let y = component_fn(move |cx, _| {
        let create_log = y_log.clone();
        cx.use_effect((), move || {
            create_log.borrow_mut().push("y:create".to_string());
            None
        });
        Ok(text("y"))
    });

    let captured = slot.clone();
    let x_inner = x.clone();
    let y_inner = y.clone();
    let app = component_fn(move |cx, _| {
        let (n, set_n) = cx.use_state(|| 0);
        *captured.borrow_mut() = Some(set_n);
        let mut children = vec![component(&x_inner).key("x").payload(n).into()];
        if n > 0 {
            children.push(component(&y_inner).key("y").into());
        }
        Ok(host("div").children(children).into())
    });

    let r = rig();
    r.root.render(component(&app).into());
    r.flush();
    assert_eq!(*log.borrow(), vec!["x:create:0".to_string()]);
    log.borrow_mut().clear();

    // One commit in which X's effect re-runs and Y's mounts: X's destroy
    // precedes X's create, and every destroy precedes any create.
    slot.borrow().clone().unwrap().set(1);
    r.flush();
    assert_eq!(
        *log.borrow(),
        vec![
            "x:destroy".to_string(),
            "x:create:1".to_string(),
            "y:create".to_string(),
        ]
    );
}

#[test]
fn test_unmount_runs_effect_destroy() {
    let log: Rc<RefCell<Vec<String>>> = Rc::new(RefCell::new(Vec::new()));

    let effect_log = log.clone();
    let unit = component_fn(move |cx, _| {
        let create_log = effect_log.clone();
        cx.use_effect((), move || {
            create_log.borrow_mut().push("create".to_string());
            let destroy_log = create_log.clone();
            Some(Box::new(move || {
                destroy_log.borrow_mut().push("destroy".to_string());
            }) as Box<dyn FnOnce()>)
        });
        Ok(text("unit"))
    });

    let r = rig();
    r.root.render(host("div").child(component(&unit)).into());
    r.flush();
    assert_eq!(*log.borrow(), vec!["create".to_string()]);

    r.root.render(host("div").child(text("gone")).into());
    r.flush();
    assert_eq!(
        *log.borrow(),
        vec!["create".to_string(), "destroy".to_string()]
    );
}

#[test]
fn test_use_memo_recomputes_only_on_dep_change() {
    let computes = Rc::new(Cell::new(0));
    let slot: Slot<i32> = Rc::new(RefCell::new(None));

    let counter = computes.clone();
    let captured = slot.clone();
    let app = component_fn(move |cx, _| {
        let (n, set_n) = cx.use_state(|| 0);
        *captured.borrow_mut() = Some(set_n);
        let bucket = n / 2;
        let count = counter.clone();
        let label = cx.use_memo(bucket, move || {
            count.set(count.get() + 1);
            format!("bucket-{bucket}")
        });
        Ok(text(format!("{label}:{n}")))
    });

    let r = rig();
    r.root.render(component(&app).into());
    r.flush();
    assert_eq!(computes.get(), 1);

    // 0 -> 1 keeps the bucket; the memoized value is reused.
    slot.borrow().clone().unwrap().set(1);
    r.flush();
    assert_eq!(computes.get(), 1);
    assert!(r.snapshot().contains("bucket-0:1"));

    // 1 -> 2 changes the bucket; recompute.
    slot.borrow().clone().unwrap().set(2);
    r.flush();
    assert_eq!(computes.get(), 2);
    assert!(r.snapshot().contains("bucket-1:2"));
}

#[test]
fn test_context_nearest_provider_wins() {
    let theme: Context<String> = Context::new();

    let reader = component_fn(move |cx, _| {
        let value = cx
            .use_context(&theme)
            .map(|v| (*v).clone())
            .unwrap_or_else(|| "none".to_string());
        Ok(host("span").child(text(value)).into())
    });

    let inner = theme.provide("inner".to_string(), [component(&reader).into()]);
    let tree = theme.provide(
        "outer".to_string(),
        [
            component(&reader).key("a").into(),
            host("div").child(inner).into(),
        ],
    );

    let r = rig();
    r.root.render(host("main").child(tree).into());
    r.flush();

    assert_eq!(
        r.snapshot(),
        "<#container><main><span>\"outer\"</span><div><span>\"inner\"</span></div></main></#container>"
    );
}

#[test]
fn test_use_ref_is_stable_across_renders() {
    let slot: Slot<i32> = Rc::new(RefCell::new(None));
    let captured = slot.clone();
    let app = component_fn(move |cx, _| {
        let (n, set_n) = cx.use_state(|| 0);
        *captured.borrow_mut() = Some(set_n);
        let renders = cx.use_ref(|| 0_u32);
        *renders.borrow_mut() += 1;
        Ok(text(format!("{n}:{}", renders.borrow())))
    });

    let r = rig();
    r.root.render(component(&app).into());
    r.flush();
    assert!(r.snapshot().contains("0:1"));

    slot.borrow().clone().unwrap().set(5);
    r.flush();
    // Same cell observed on the second render.
    assert!(r.snapshot().contains("5:2"));
}
