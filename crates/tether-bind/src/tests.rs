#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::rc::Rc;

    use tether_core::context::Context;
    use tether_core::diag::{self, Diagnostic};
    use tether_core::error::{RenderError, StreamError};
    use tether_core::scope::Scope;
    use tether_core::stream::stream;

    use crate::exit::ExitHandle;
    use crate::list::{mount_list, mount_list_keyed};
    use crate::subtree::VecContainer;
    use crate::value::mount_value;

    fn new_container() -> Rc<RefCell<VecContainer<String>>> {
        Rc::new(RefCell::new(VecContainer::new()))
    }

    fn items(c: &Rc<RefCell<VecContainer<String>>>) -> Vec<String> {
        c.borrow().items().to_vec()
    }

    fn capture_diags() -> Rc<RefCell<Vec<Diagnostic>>> {
        let seen: Rc<RefCell<Vec<Diagnostic>>> = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        diag::set_sink(Some(Rc::new(move |d| sink.borrow_mut().push(d.clone()))));
        seen
    }

    // --- single-value mount ---

    #[test]
    fn value_mount_renders_and_replaces() {
        let s = stream("one".to_string());
        let c = new_container();
        let root = Scope::root();
        let renders = Rc::new(RefCell::new(0));

        let mount = mount_value(&s, &c, root, Context::new(), {
            let renders = renders.clone();
            move |v: &String, _cx| {
                *renders.borrow_mut() += 1;
                Ok(format!("view:{v}"))
            }
        });
        assert_eq!(items(&c), vec!["view:one"]);

        s.emit("two".to_string());
        assert_eq!(items(&c), vec!["view:two"]);
        assert_eq!(*renders.borrow(), 2);

        mount.close();
        assert!(items(&c).is_empty());
        root.cancel();
    }

    #[test]
    fn value_mount_cancels_superseded_scope() {
        let s = stream(1);
        let c = new_container();
        let root = Scope::root();
        let scopes: Rc<RefCell<Vec<Scope>>> = Rc::new(RefCell::new(Vec::new()));

        let _mount = mount_value(&s, &c, root, Context::new(), {
            let scopes = scopes.clone();
            move |v: &i32, cx| {
                scopes.borrow_mut().push(cx.scope());
                Ok(format!("view:{v}"))
            }
        });
        s.emit(2);

        let scopes = scopes.borrow();
        assert_eq!(scopes.len(), 2);
        assert!(scopes[0].is_cancelled());
        assert!(!scopes[1].is_cancelled());
        root.cancel();
        assert!(scopes[1].is_cancelled());
        assert!(items(&c).is_empty());
    }

    #[test]
    fn value_mount_render_failure_is_contained() {
        let seen = capture_diags();
        let s = stream("bad".to_string());
        let c = new_container();
        let root = Scope::root();

        let _mount = mount_value(&s, &c, root, Context::new(), |v: &String, _cx| {
            if v == "bad" {
                Err(RenderError::new("refused"))
            } else {
                Ok(format!("view:{v}"))
            }
        });
        assert!(items(&c).is_empty());

        s.emit("good".to_string());
        assert_eq!(items(&c), vec!["view:good"]);

        diag::set_sink(None);
        let diags = seen.borrow();
        assert!(matches!(
            diags.as_slice(),
            [Diagnostic::RenderFailed { detail }] if detail == "refused"
        ));
        root.cancel();
    }

    #[test]
    fn value_mount_applies_reentrant_emissions_in_order() {
        let s = stream("first".to_string());
        let c = new_container();
        let root = Scope::root();
        let order: Rc<RefCell<Vec<String>>> = Rc::new(RefCell::new(Vec::new()));

        let _mount = mount_value(&s, &c, root, Context::new(), {
            let order = order.clone();
            let s = s.clone();
            move |v: &String, _cx| {
                order.borrow_mut().push(v.clone());
                if v == "first" {
                    // lands mid-application; must queue, not interleave
                    s.emit("second".to_string());
                }
                Ok(format!("view:{v}"))
            }
        });

        assert_eq!(*order.borrow(), vec!["first", "second"]);
        assert_eq!(items(&c), vec!["view:second"]);
        root.cancel();
    }

    #[test]
    fn value_mount_stops_on_upstream_failure() {
        let seen = capture_diags();
        let s = stream(7);
        let c = new_container();
        let root = Scope::root();

        let _mount = mount_value(&s, &c, root, Context::new(), |v: &i32, _cx| {
            Ok(format!("view:{v}"))
        });
        assert_eq!(items(&c), vec!["view:7"]);

        s.fail(StreamError::new("upstream gone"));
        diag::set_sink(None);

        // rendered state stays; the mount just stops processing
        assert_eq!(items(&c), vec!["view:7"]);
        assert!(
            seen.borrow()
                .iter()
                .any(|d| matches!(d, Diagnostic::UpstreamFailed { .. }))
        );
        root.cancel();
    }

    // --- list mount ---

    #[test]
    fn list_mount_scenario_grow_then_shrink() {
        let s = stream(vec![1, 2, 3]);
        let c = new_container();
        let root = Scope::root();
        let counts: Rc<RefCell<HashMap<i32, u32>>> = Rc::new(RefCell::new(HashMap::new()));

        let mount = mount_list_keyed(&s, |v: &i32| *v, &c, root, Context::new(), {
            let counts = counts.clone();
            move |v, _cx| {
                *counts.borrow_mut().entry(*v).or_insert(0) += 1;
                Ok(format!("item:{v}"))
            }
        });
        assert_eq!(items(&c), vec!["item:1", "item:2", "item:3"]);

        let scope1 = mount.entry_scope(&1).expect("entry 1 live");
        let scope2 = mount.entry_scope(&2).expect("entry 2 live");
        let cancels = Rc::new(RefCell::new(0));
        {
            let cancels = cancels.clone();
            scope1.on_cancel(move || *cancels.borrow_mut() += 1);
        }

        s.emit(vec![1, 2, 3, 4]);
        s.emit(vec![2, 3, 4]);

        assert_eq!(items(&c), vec!["item:2", "item:3", "item:4"]);
        assert_eq!(*cancels.borrow(), 1);
        assert!(scope1.is_cancelled());
        assert_eq!(mount.entry_scope(&2), Some(scope2));

        let counts = counts.borrow();
        for key in [1, 2, 3, 4] {
            assert_eq!(counts.get(&key), Some(&1), "item {key} rendered once");
        }
        root.cancel();
    }

    #[test]
    fn list_mount_reorders_without_rerendering() {
        let s = stream(vec!["a".to_string(), "b".to_string(), "c".to_string()]);
        let c = new_container();
        let root = Scope::root();
        let renders = Rc::new(RefCell::new(0));

        let mount = mount_list(&s, &c, root, Context::new(), {
            let renders = renders.clone();
            move |v: &String, _cx| {
                *renders.borrow_mut() += 1;
                Ok(format!("row:{v}"))
            }
        });
        let scope_a = mount.entry_scope(&"a".to_string()).expect("a live");

        s.emit(vec!["b".to_string(), "c".to_string(), "a".to_string()]);

        assert_eq!(items(&c), vec!["row:b", "row:c", "row:a"]);
        assert_eq!(*renders.borrow(), 3);
        assert_eq!(mount.entry_scope(&"a".to_string()), Some(scope_a));
        root.cancel();
    }

    #[test]
    fn list_mount_middle_delete_keeps_neighbors() {
        let s = stream(vec!["a".to_string(), "b".to_string(), "c".to_string()]);
        let c = new_container();
        let root = Scope::root();

        let mount = mount_list(&s, &c, root, Context::new(), |v: &String, _cx| {
            Ok(format!("row:{v}"))
        });
        let scope_a = mount.entry_scope(&"a".to_string()).expect("a live");
        let scope_b = mount.entry_scope(&"b".to_string()).expect("b live");
        let scope_c = mount.entry_scope(&"c".to_string()).expect("c live");

        s.emit(vec!["a".to_string(), "c".to_string()]);

        assert_eq!(items(&c), vec!["row:a", "row:c"]);
        assert!(scope_b.is_cancelled());
        assert_eq!(mount.entry_scope(&"a".to_string()), Some(scope_a));
        assert_eq!(mount.entry_scope(&"c".to_string()), Some(scope_c));
        root.cancel();
    }

    #[test]
    fn exit_gate_defers_detach_but_not_inserts() {
        let s = stream(vec!["a".to_string(), "b".to_string(), "c".to_string()]);
        let c = new_container();
        let root = Scope::root();

        let mount = mount_list(&s, &c, root, Context::new(), |v: &String, _cx| {
            Ok(format!("row:{v}"))
        });
        let handles: Rc<RefCell<Vec<ExitHandle>>> = Rc::new(RefCell::new(Vec::new()));
        {
            let handles = handles.clone();
            mount.set_exit_gate(move |_subtree, handle| handles.borrow_mut().push(handle));
        }
        let scope_b = mount.entry_scope(&"b".to_string()).expect("b live");

        s.emit(vec!["a".to_string(), "c".to_string(), "d".to_string()]);

        // b's nodes stay attached mid-transition; the insert landed at once
        assert_eq!(items(&c), vec!["row:a", "row:b", "row:c", "row:d"]);
        assert_eq!(mount.len(), 3);
        assert!(!scope_b.is_cancelled());

        let handle = handles.borrow()[0].clone();
        handle.done();
        assert_eq!(items(&c), vec!["row:a", "row:c", "row:d"]);
        assert!(scope_b.is_cancelled());

        handle.done(); // idempotent
        assert_eq!(items(&c), vec!["row:a", "row:c", "row:d"]);
        root.cancel();
    }

    #[test]
    fn simultaneous_exits_complete_independently() {
        let s = stream(vec!["a".to_string(), "b".to_string(), "c".to_string()]);
        let c = new_container();
        let root = Scope::root();

        let mount = mount_list(&s, &c, root, Context::new(), |v: &String, _cx| {
            Ok(format!("row:{v}"))
        });
        let handles: Rc<RefCell<Vec<ExitHandle>>> = Rc::new(RefCell::new(Vec::new()));
        {
            let handles = handles.clone();
            mount.set_exit_gate(move |_subtree, handle| handles.borrow_mut().push(handle));
        }

        s.emit(vec!["c".to_string()]);
        assert_eq!(items(&c), vec!["row:a", "row:b", "row:c"]);
        assert_eq!(handles.borrow().len(), 2);

        // completing one exit never releases the other
        let (first, second) = {
            let h = handles.borrow();
            (h[0].clone(), h[1].clone())
        };
        second.done();
        assert_eq!(items(&c), vec!["row:b", "row:c"]);
        first.done();
        assert_eq!(items(&c), vec!["row:c"]);
        root.cancel();
    }

    #[test]
    fn close_flushes_pending_exits() {
        let s = stream(vec!["a".to_string(), "b".to_string()]);
        let c = new_container();
        let root = Scope::root();

        let mount = mount_list(&s, &c, root, Context::new(), |v: &String, _cx| {
            Ok(format!("row:{v}"))
        });
        let handles: Rc<RefCell<Vec<ExitHandle>>> = Rc::new(RefCell::new(Vec::new()));
        {
            let handles = handles.clone();
            mount.set_exit_gate(move |_subtree, handle| handles.borrow_mut().push(handle));
        }
        s.emit(vec!["a".to_string()]);
        assert_eq!(items(&c), vec!["row:a", "row:b"]);

        mount.close();
        assert!(items(&c).is_empty());

        // late completion of an already-flushed exit is a no-op
        let handle = handles.borrow()[0].clone();
        handle.done();
        assert!(items(&c).is_empty());
        root.cancel();
    }

    #[test]
    fn duplicate_identity_skips_the_emission() {
        let seen = capture_diags();
        let s = stream(vec![1, 2, 3]);
        let c = new_container();
        let root = Scope::root();

        let mount = mount_list_keyed(&s, |v: &i32| *v, &c, root, Context::new(), |v, _cx| {
            Ok(format!("item:{v}"))
        });
        s.emit(vec![1, 2, 2]);
        diag::set_sink(None);

        assert!(
            seen.borrow()
                .iter()
                .any(|d| matches!(d, Diagnostic::DuplicateIdentity { .. }))
        );
        // registry untouched, and the mount still processes later emissions
        assert_eq!(items(&c), vec!["item:1", "item:2", "item:3"]);
        s.emit(vec![3, 1]);
        assert_eq!(items(&c), vec!["item:3", "item:1"]);
        assert_eq!(mount.len(), 2);
        root.cancel();
    }

    #[test]
    fn failed_insert_skips_entry_but_keeps_pass_aligned() {
        let seen = capture_diags();
        let s = stream(vec![1, 2]);
        let c = new_container();
        let root = Scope::root();

        let _mount = mount_list_keyed(&s, |v: &i32| *v, &c, root, Context::new(), |v, _cx| {
            if *v == 13 {
                Err(RenderError::new("unlucky"))
            } else {
                Ok(format!("item:{v}"))
            }
        });
        assert_eq!(items(&c), vec!["item:1", "item:2"]);

        // the failed insert leaves a hole; the move after it still lands right
        s.emit(vec![13, 2, 1]);
        assert_eq!(items(&c), vec!["item:2", "item:1"]);

        // a later emission without the poison value applies cleanly
        s.emit(vec![2, 1, 3]);
        assert_eq!(items(&c), vec!["item:2", "item:1", "item:3"]);

        diag::set_sink(None);
        let render_failures = seen
            .borrow()
            .iter()
            .filter(|d| matches!(d, Diagnostic::RenderFailed { .. }))
            .count();
        assert_eq!(render_failures, 1);
        root.cancel();
    }

    #[test]
    fn update_rerenders_under_the_same_entry_scope() {
        let s = stream(vec![(1, "a".to_string())]);
        let c = new_container();
        let root = Scope::root();
        let renders = Rc::new(RefCell::new(0));
        let torn_down: Rc<RefCell<Vec<String>>> = Rc::new(RefCell::new(Vec::new()));

        let mount = mount_list_keyed(&s, |v: &(i32, String)| v.0, &c, root, Context::new(), {
            let renders = renders.clone();
            let torn_down = torn_down.clone();
            move |v, cx| {
                *renders.borrow_mut() += 1;
                let text = v.1.clone();
                let torn_down = torn_down.clone();
                cx.scope().on_cancel(move || torn_down.borrow_mut().push(text));
                Ok(format!("{}:{}", v.0, v.1))
            }
        });
        assert_eq!(items(&c), vec!["1:a"]);
        let entry = mount.entry_scope(&1).expect("entry live");

        s.emit(vec![(1, "b".to_string())]);

        assert_eq!(items(&c), vec!["1:b"]);
        assert_eq!(*renders.borrow(), 2);
        // same entry scope; only the render child was replaced
        assert_eq!(mount.entry_scope(&1), Some(entry));
        assert_eq!(*torn_down.borrow(), vec!["a".to_string()]);

        mount.close();
        assert_eq!(*torn_down.borrow(), vec!["a".to_string(), "b".to_string()]);
        root.cancel();
    }

    #[test]
    fn move_refreshes_value_without_rerender() {
        let s = stream(vec![(1, "a".to_string()), (2, "b".to_string())]);
        let c = new_container();
        let root = Scope::root();
        let renders = Rc::new(RefCell::new(0));

        let _mount = mount_list_keyed(&s, |v: &(i32, String)| v.0, &c, root, Context::new(), {
            let renders = renders.clone();
            move |v, _cx| {
                *renders.borrow_mut() += 1;
                Ok(format!("{}:{}", v.0, v.1))
            }
        });

        // entry 2 moves to the front with changed content: repositioned,
        // value refreshed in the registry, but never re-rendered
        s.emit(vec![(2, "b2".to_string()), (1, "a".to_string())]);
        assert_eq!(items(&c), vec!["2:b", "1:a"]);
        assert_eq!(*renders.borrow(), 2);

        // the refreshed value is the next diff's baseline: re-emitting the
        // same sequence is a no-op
        s.emit(vec![(2, "b2".to_string()), (1, "a".to_string())]);
        assert_eq!(*renders.borrow(), 2);
        root.cancel();
    }

    #[test]
    fn context_reaches_render_contracts() {
        #[derive(Debug, PartialEq)]
        struct Prefix(&'static str);

        let s = stream(vec![1]);
        let c = new_container();
        let root = Scope::root();
        let context = Context::new().with(Prefix("№"));

        let _mount = mount_list_keyed(&s, |v: &i32| *v, &c, root, context, |v, cx| {
            let prefix = cx.context().get::<Prefix>().map(|p| p.0).unwrap_or("-");
            Ok(format!("{prefix}{v}"))
        });
        assert_eq!(items(&c), vec!["№1"]);
        root.cancel();
    }

    #[test]
    fn ancestor_cancellation_tears_the_list_down() {
        let s = stream(vec![1, 2]);
        let c = new_container();
        let root = Scope::root();

        let mount = mount_list_keyed(&s, |v: &i32| *v, &c, root, Context::new(), |v, _cx| {
            Ok(format!("item:{v}"))
        });
        let scope1 = mount.entry_scope(&1).expect("entry live");

        root.cancel();
        assert!(items(&c).is_empty());
        assert!(scope1.is_cancelled());

        // a post-cancellation emission is ignored
        s.emit(vec![3]);
        assert!(items(&c).is_empty());
    }
}
