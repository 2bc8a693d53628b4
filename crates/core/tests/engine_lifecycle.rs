use std::cell::{Cell, RefCell};
use std::rc::Rc;

use decision_core::{
    Action, ActionEngine, Engine, ExecutionContext, ExecutionError, ExecutionStatusPerception,
    FunctionalAction, Perception, Status, StatusFlags, SubsystemAction, share,
};

/// Action succeeding on its `n`-th update after each start.
fn succeed_after(n: u32) -> FunctionalAction {
    let count = Rc::new(Cell::new(0));
    let reset = count.clone();
    FunctionalAction::new(move || {
        count.set(count.get() + 1);
        if count.get() >= n {
            Status::Success
        } else {
            Status::Running
        }
    })
    .on_start(move || reset.set(0))
}

#[test]
fn strict_lifecycle_rejects_misuse() {
    let mut engine = ActionEngine::new("single", succeed_after(1));

    assert_eq!(
        engine.update(),
        Err(ExecutionError::NotStarted("single".into()))
    );
    assert_eq!(
        engine.stop(),
        Err(ExecutionError::NotStarted("single".into()))
    );

    engine.start().unwrap();
    assert_eq!(
        engine.start(),
        Err(ExecutionError::AlreadyStarted("single".into()))
    );
    assert_eq!(
        engine.finish(Status::Running),
        Err(ExecutionError::InvalidFinishStatus(Status::Running))
    );

    engine.update().unwrap();
    assert_eq!(engine.status(), Status::Success);

    // finished engines ignore further ticks
    engine.update().unwrap();
    assert_eq!(engine.status(), Status::Success);

    engine.stop().unwrap();
    assert_eq!(engine.status(), Status::None);
}

#[test]
fn finish_overrides_the_running_status() {
    let mut engine = ActionEngine::new("forced", succeed_after(10));
    engine.start().unwrap();
    engine.update().unwrap();
    assert_eq!(engine.status(), Status::Running);

    engine.finish(Status::Failure).unwrap();
    assert_eq!(engine.status(), Status::Failure);
}

#[test]
fn observers_fire_once_per_change() {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let log = seen.clone();
    let mut engine = ActionEngine::new("observed", succeed_after(2));
    engine
        .lifecycle_mut()
        .subscribe(move |status| log.borrow_mut().push(status));

    engine.start().unwrap();
    engine.update().unwrap();
    engine.update().unwrap();
    engine.stop().unwrap();

    assert_eq!(
        *seen.borrow(),
        vec![Status::Running, Status::Success, Status::None]
    );
}

#[test]
fn pause_resumes_on_next_update() {
    let mut engine = ActionEngine::new("paused", succeed_after(3));
    engine.pause();
    assert!(!engine.is_paused());

    engine.start().unwrap();
    engine.pause();
    assert!(engine.is_paused());
    assert!(engine.task().is_paused());

    engine.update().unwrap();
    assert!(!engine.is_paused());
    assert!(!engine.task().is_paused());
}

#[test]
fn subsystem_action_drives_nested_engine() {
    let inner = share(ActionEngine::new("inner", succeed_after(2)));
    let mut outer = ActionEngine::new("outer", SubsystemAction::new(inner.clone()));

    outer.start().unwrap();
    assert_eq!(inner.borrow().status(), Status::Running);

    outer.update().unwrap();
    assert_eq!(outer.status(), Status::Running);
    outer.update().unwrap();
    assert_eq!(outer.status(), Status::Success);
    assert_eq!(inner.borrow().status(), Status::Success);

    outer.stop().unwrap();
    assert_eq!(inner.borrow().status(), Status::None);
}

#[test]
fn looping_subsystem_keeps_running() {
    let inner = share(ActionEngine::new("inner", succeed_after(1)));
    let action = SubsystemAction::new(inner.clone()).execute_on_loop(true);
    let mut outer = ActionEngine::new("outer", action);

    outer.start().unwrap();
    for _ in 0..3 {
        outer.update().unwrap();
        assert_eq!(outer.status(), Status::Running);
        assert_eq!(inner.borrow().status(), Status::Running);
    }
}

#[test]
fn interrupted_subsystem_can_be_kept_alive() {
    let inner = share(ActionEngine::new("inner", succeed_after(5)));
    let mut action = SubsystemAction::new(inner.clone()).dont_stop_on_interrupt(true);
    let ctx = ExecutionContext::empty();

    action.on_start(&ctx).unwrap();
    action.on_update(&ctx).unwrap();
    action.on_stop(&ctx).unwrap();
    assert_eq!(inner.borrow().status(), Status::Running);
    assert!(inner.borrow().is_paused());

    action.on_start(&ctx).unwrap();
    assert_eq!(action.on_update(&ctx), Ok(Status::Running));
    assert!(!inner.borrow().is_paused());
}

#[test]
fn busy_or_missing_subsystem_is_reported() {
    let ctx = ExecutionContext::empty();
    assert_eq!(
        SubsystemAction::unassigned().on_start(&ctx),
        Err(ExecutionError::MissingSubsystem)
    );

    let inner = share(ActionEngine::new("inner", succeed_after(1)));
    let mut action = SubsystemAction::new(inner.clone());
    let _guard = inner.borrow_mut();
    assert_eq!(action.on_start(&ctx), Err(ExecutionError::SubsystemBusy));
}

#[test]
fn execution_status_perception_reads_shared_engine() {
    let engine = share(ActionEngine::new("watched", succeed_after(1)));
    let mut finished = ExecutionStatusPerception::new(engine.clone(), StatusFlags::FINISHED);
    let ctx = ExecutionContext::empty();

    assert_eq!(finished.check(&ctx), Ok(false));
    engine.borrow_mut().start().unwrap();
    assert_eq!(finished.check(&ctx), Ok(false));
    engine.borrow_mut().update().unwrap();
    assert_eq!(finished.check(&ctx), Ok(true));
}
