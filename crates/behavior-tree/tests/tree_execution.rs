use std::cell::RefCell;
use std::rc::Rc;

use behavior_tree::{BehaviorTree, BtNode, builder};
use decision_core::testing::{FlagPerception, ScriptedAction};
use decision_core::{
    Blackboard, Engine, ExecutionError, FunctionalAction, GraphError, Parameter, Status,
    SubsystemAction, share,
};

#[test]
fn empty_tree_cannot_start() {
    let mut tree = BehaviorTree::new("empty");
    assert_eq!(
        tree.start(),
        Err(ExecutionError::EmptyGraph("empty".into()))
    );
}

#[test]
fn tree_connections_are_validated() {
    let mut tree = BehaviorTree::new("shape");
    let root = tree.add("root", BtNode::sequence());
    let other = tree.add("other", BtNode::selector());
    let leaf = tree.add("leaf", BtNode::action(ScriptedAction::success()));
    let wrap = tree.add("wrap", BtNode::inverter());

    tree.connect(root, other).unwrap();
    assert!(matches!(
        tree.connect(leaf, root),
        Err(GraphError::OutputLimitReached { .. })
    ));
    assert!(matches!(
        tree.connect(wrap, other),
        Err(GraphError::InputLimitReached { .. })
    ));

    tree.connect(other, wrap).unwrap();
    tree.connect(wrap, leaf).unwrap();
    assert!(matches!(
        tree.connect(wrap, root),
        Err(GraphError::OutputLimitReached { .. })
    ));
    tree.disconnect(wrap, leaf).unwrap();
    assert!(matches!(
        tree.connect(wrap, root),
        Err(GraphError::LoopDetected { .. })
    ));
}

#[test]
fn decorator_without_child_is_missing_connection() {
    let mut tree = BehaviorTree::new("bare");
    tree.add("inverter", BtNode::inverter());
    assert_eq!(
        tree.start(),
        Err(ExecutionError::MissingConnection("inverter".into()))
    );
}

#[test]
fn change_root_moves_execution() {
    let mut tree = BehaviorTree::new("roots");
    let failing = builder::action(&mut tree, "fail", ScriptedAction::failure());
    let root = builder::inverter(&mut tree, "not", failing).unwrap();
    assert_eq!(tree.root(), Some(failing));

    tree.change_root(root).unwrap();
    assert_eq!(tree.root(), Some(root));

    tree.start().unwrap();
    tree.update().unwrap();
    assert_eq!(tree.status(), Status::Success);
    assert_eq!(tree.status_of(failing), Some(Status::Failure));
}

#[test]
fn stop_reaches_every_active_descendant_once() {
    let deep = ScriptedAction::running();
    let side = ScriptedAction::running();
    let (deep_probe, side_probe) = (deep.probe(), side.probe());

    let mut tree = BehaviorTree::new("nested");
    let root = tree.add("root", BtNode::parallel(Default::default()));
    let seq = tree.add("seq", BtNode::sequence());
    let deep = tree.add("deep", BtNode::action(deep));
    let side = tree.add("side", BtNode::action(side));
    tree.connect(root, seq).unwrap();
    tree.connect(seq, deep).unwrap();
    tree.connect(root, side).unwrap();

    tree.start().unwrap();
    tree.update().unwrap();
    tree.stop().unwrap();

    assert_eq!(deep_probe.stops(), 1);
    assert_eq!(side_probe.stops(), 1);
    for id in [root, seq, deep, side] {
        assert_eq!(tree.status_of(id), Some(Status::None));
    }
}

#[test]
fn pause_propagates_and_resumes_on_next_tick() {
    let action = ScriptedAction::new([Status::Running, Status::Running, Status::Success]);
    let probe = action.probe();
    let mut tree = BehaviorTree::new("pausable");
    let root = tree.add("root", BtNode::succeeder());
    let leaf = tree.add("leaf", BtNode::action(action));
    tree.connect(root, leaf).unwrap();

    tree.start().unwrap();
    tree.update().unwrap();
    tree.pause();
    assert!(tree.is_paused());
    assert_eq!(tree.is_node_paused(leaf), Some(true));
    assert_eq!(probe.pauses(), 1);

    tree.update().unwrap();
    assert!(!tree.is_paused());
    assert_eq!(tree.is_node_paused(leaf), Some(false));
    assert_eq!(probe.resumes(), 1);

    tree.update().unwrap();
    assert_eq!(tree.status(), Status::Success);
}

#[test]
fn node_observers_see_each_status_change() {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let log = seen.clone();
    let mut tree = BehaviorTree::new("observed");
    let leaf = tree.add(
        "leaf",
        BtNode::action(ScriptedAction::new([Status::Running, Status::Success])),
    );
    tree.node_mut(leaf)
        .unwrap()
        .subscribe(move |status| log.borrow_mut().push(status));

    tree.start().unwrap();
    tree.update().unwrap();
    tree.update().unwrap();
    tree.stop().unwrap();

    assert_eq!(
        *seen.borrow(),
        vec![Status::Running, Status::Success, Status::None]
    );
}

#[test]
fn subtree_runs_as_subsystem() {
    let mut inner = BehaviorTree::new("inner");
    inner.add(
        "work",
        BtNode::action(ScriptedAction::new([Status::Running, Status::Success])),
    );
    let inner = share(inner);

    let mut outer = BehaviorTree::new("outer");
    let root = outer.add("root", BtNode::sequence());
    let sub = outer.add("sub", BtNode::action(SubsystemAction::new(inner.clone())));
    let done = outer.add("done", BtNode::action(ScriptedAction::success()));
    outer.connect(root, sub).unwrap();
    outer.connect(root, done).unwrap();

    outer.start().unwrap();
    outer.update().unwrap();
    assert_eq!(inner.borrow().status(), Status::Running);
    outer.update().unwrap();
    assert_eq!(inner.borrow().status(), Status::None);
    outer.update().unwrap();
    assert_eq!(outer.status(), Status::Success);
}

#[test]
fn actions_read_blackboard_parameters() {
    let mut blackboard = Blackboard::new();
    let enemies = blackboard.create_field("enemies", 0_u32).unwrap();
    let mut threshold = Parameter::new(1_u32);
    threshold.bind(&enemies).unwrap();

    let mut tree = BehaviorTree::new("alert");
    tree.add(
        "check",
        BtNode::condition(FlagPerception::new(true), false),
    );
    let check = tree.root().unwrap();
    let fight = tree.add(
        "fight",
        BtNode::action(FunctionalAction::new(move || {
            if threshold.get() > 0 {
                Status::Success
            } else {
                Status::Failure
            }
        })),
    );
    tree.connect(check, fight).unwrap();

    tree.start().unwrap();
    tree.update().unwrap();
    assert_eq!(tree.status(), Status::Failure);

    enemies.set(2);
    tree.stop().unwrap();
    tree.start().unwrap();
    tree.update().unwrap();
    assert_eq!(tree.status(), Status::Success);

    // without the field the parameter falls back to its own value
    blackboard.remove_field("enemies").unwrap();
    tree.stop().unwrap();
    tree.start().unwrap();
    tree.update().unwrap();
    assert_eq!(tree.status(), Status::Success);
}
