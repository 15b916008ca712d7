use std::cell::{Cell, RefCell};
use std::rc::Rc;

use page_state::{Error, Page, PageConfig, PollOptions, PollStatus, Result, StorageKind};

#[test]
fn login_flag_unblocks_a_waiting_poll() -> Result<()> {
    let mut page = Page::new();
    let events = Rc::new(RefCell::new(Vec::new()));

    let log = events.clone();
    let handle = page.poll(
        |page| Ok(page.flags("eux").has("login")),
        move |page| {
            log.borrow_mut().push(format!("ready@{}", page.now_ms()));
            page.flags("eux").remove("login");
            Ok(())
        },
        200,
    )?;

    page.advance_time(450)?;
    assert!(events.borrow().is_empty());

    page.flags("eux").add("login");
    page.advance_time(149)?;
    assert!(events.borrow().is_empty());
    page.advance_time(1)?;

    assert_eq!(events.borrow().as_slice(), ["ready@600".to_string()]);
    assert_eq!(page.poll_status(handle), Some(PollStatus::Done));
    assert!(!page.flags("eux").has("login"));
    assert_eq!(
        page.session_storage().get_item("eux").as_deref(),
        Some("{}")
    );
    Ok(())
}

#[test]
fn many_polls_complete_in_due_order() -> Result<()> {
    let mut page = Page::new();
    let order = Rc::new(RefCell::new(String::new()));

    for (label, ready_at, interval) in [("a", 90, 30), ("b", 40, 20), ("c", 0, 50)] {
        let out = order.clone();
        page.poll(
            move |page| Ok(page.now_ms() >= ready_at),
            move |_| {
                out.borrow_mut().push_str(label);
                Ok(())
            },
            interval,
        )?;
    }

    assert_eq!(order.borrow().as_str(), "c");
    page.flush()?;
    assert_eq!(order.borrow().as_str(), "cba");
    assert_eq!(page.now_ms(), 90);
    assert_eq!(page.active_poll_count(), 0);
    Ok(())
}

#[test]
fn poll_started_inside_completion_runs_on_the_same_clock() -> Result<()> {
    let mut page = Page::new();
    let finished_at = Rc::new(Cell::new(None));

    let record = finished_at.clone();
    page.poll(
        |page| Ok(page.now_ms() >= 100),
        move |page| {
            page.poll(
                |page| Ok(page.flags_in(StorageKind::Local, "eux").has("synced")),
                move |page| {
                    record.set(Some(page.now_ms()));
                    Ok(())
                },
                10,
            )?;
            page.set_timeout(35, |page| {
                page.flags_in(StorageKind::Local, "eux").add("synced");
                Ok(())
            });
            Ok(())
        },
        50,
    )?;

    page.advance_time(1_000)?;
    assert_eq!(finished_at.get(), Some(140));
    Ok(())
}

#[test]
fn bounded_poll_gives_up_and_unbounded_poll_keeps_going() -> Result<()> {
    let mut page = Page::new();
    let bounded = page.poll_with(
        |_| Ok(false),
        |_| Ok(()),
        PollOptions::every(100).max_attempts(5),
    )?;
    let unbounded = page.poll(|_| Ok(false), |_| Ok(()), 100)?;

    page.advance_time(10_000)?;
    assert_eq!(page.poll_status(bounded), Some(PollStatus::Exhausted));
    assert_eq!(page.poll_status(unbounded), Some(PollStatus::Pending));
    assert_eq!(page.pending_timers().len(), 1);
    assert_eq!(page.pending_timers()[0].due_at, 10_100);
    Ok(())
}

#[test]
fn errors_from_callers_are_not_rewrapped() -> Result<()> {
    let mut page = Page::new();
    page.poll(
        |page| {
            if page.now_ms() == 0 {
                Ok(false)
            } else {
                Err(Error::Config("predicate misconfigured".into()))
            }
        },
        |_| Ok(()),
        10,
    )?;

    let err = page.flush().expect_err("predicate error should surface");
    assert_eq!(err, Error::Config("predicate misconfigured".into()));
    assert_eq!(err.to_string(), "config error: predicate misconfigured");
    Ok(())
}

#[test]
fn tracing_config_records_page_activity() -> Result<()> {
    let mut page = Page::with_config(PageConfig {
        debug: true,
        trace_to_log: false,
        ..PageConfig::default()
    })?;
    page.log("polling");
    page.poll(|_| Ok(true), |_| Ok(()), 0)?;
    page.reload();

    let logs = page.take_trace_logs();
    assert_eq!(logs.first().map(String::as_str), Some("[log] polling"));
    assert!(logs.iter().any(|line| line == "[poll] start id=1 interval_ms=200 max_attempts=none"));
    assert!(logs.iter().any(|line| line == "[poll] done id=1 attempts=1"));
    assert_eq!(logs.last().map(String::as_str), Some("[page] reload torn_down=0"));
    Ok(())
}
