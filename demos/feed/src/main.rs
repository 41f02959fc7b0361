//! Headless feed demo: a title bound through a value mount, a post list
//! reconciled through the list mount, and an exit gate standing in for a
//! fade-out animation. Run with `RUST_LOG=info` to see the gate fire.

use std::cell::RefCell;
use std::rc::Rc;

use anyhow::Result;
use tether_bind::exit::ExitHandle;
use tether_bind::list::mount_list_keyed;
use tether_bind::subtree::VecContainer;
use tether_bind::value::mount_value;
use tether_core::prelude::*;

#[derive(Clone, PartialEq)]
struct Post {
    id: u64,
    author: &'static str,
    body: &'static str,
}

/// Tree-wide display knob, inherited through the context.
#[derive(Debug)]
struct Compact(bool);

fn main() -> Result<()> {
    env_logger::init();

    let root = Scope::root();
    let context = Context::new().with(Compact(false));

    let title = stream("home timeline".to_string());
    let header = Rc::new(RefCell::new(VecContainer::new()));
    let _header_mount = mount_value(&title, &header, root, context.clone(), |t: &String, _cx| {
        Ok(format!("== {t} =="))
    });

    let posts = stream(vec![
        Post { id: 1, author: "ada", body: "hello" },
        Post { id: 2, author: "grace", body: "compiling…" },
    ]);
    let rows = Rc::new(RefCell::new(VecContainer::new()));
    let feed = mount_list_keyed(&posts, |p: &Post| p.id, &rows, root, context, |p, cx| {
        let compact = cx.context().get::<Compact>().map(|c| c.0).unwrap_or(false);
        Ok(if compact {
            format!("@{}", p.author)
        } else {
            format!("@{}: {}", p.author, p.body)
        })
    });

    // Removed rows "fade out": their nodes stay attached until the handle
    // reports completion.
    let pending: Rc<RefCell<Vec<ExitHandle>>> = Rc::new(RefCell::new(Vec::new()));
    {
        let pending = pending.clone();
        feed.set_exit_gate(move |row, handle| {
            log::info!("fading out: {row}");
            pending.borrow_mut().push(handle);
        });
    }

    print_state("initial", &header, &rows);

    posts.update(|list| {
        list.insert(
            0,
            Post { id: 3, author: "edsger", body: "goto considered harmful" },
        );
    });
    print_state("after insert", &header, &rows);

    posts.update(|list| list.retain(|p| p.id != 1));
    print_state("delete pending exit", &header, &rows);

    for handle in pending.borrow_mut().drain(..) {
        handle.done();
    }
    print_state("exit complete", &header, &rows);

    title.emit("notifications".to_string());
    print_state("header swapped", &header, &rows);

    feed.close();
    root.cancel();
    print_state("closed", &header, &rows);
    Ok(())
}

fn print_state(
    label: &str,
    header: &Rc<RefCell<VecContainer<String>>>,
    rows: &Rc<RefCell<VecContainer<String>>>,
) {
    println!("-- {label}");
    for line in header.borrow().items() {
        println!("  {line}");
    }
    for line in rows.borrow().items() {
        println!("  {line}");
    }
}
