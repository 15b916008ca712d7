use super::*;

#[test]
fn default_config_matches_documented_values() -> Result<()> {
    let config = PageConfig::default();
    assert!(!config.debug);
    assert_eq!(config.default_poll_interval_ms, 200);
    assert_eq!(config.timer_step_limit, 10_000);
    assert_eq!(config.trace_log_limit, 10_000);
    assert!(config.trace_to_log);
    assert_eq!(config.flag_namespace, "eux");
    config.validate()?;
    Ok(())
}

#[test]
fn config_from_json_fills_missing_fields_with_defaults() -> Result<()> {
    let config = PageConfig::from_json_str(r#"{"debug": true, "flag_namespace": "app"}"#)?;
    assert!(config.debug);
    assert_eq!(config.flag_namespace, "app");
    assert_eq!(config.default_poll_interval_ms, DEFAULT_POLL_INTERVAL_MS);
    assert_eq!(config.timer_step_limit, DEFAULT_TIMER_STEP_LIMIT);
    Ok(())
}

#[test]
fn config_from_json_rejects_malformed_and_invalid_values() -> Result<()> {
    match PageConfig::from_json_str("{debug") {
        Err(Error::Config(msg)) => assert!(msg.starts_with("invalid page config"), "{msg}"),
        other => panic!("unexpected result: {other:?}"),
    }
    match PageConfig::from_json_str(r#"{"timer_step_limit": 0}"#) {
        Err(Error::Config(msg)) => assert!(msg.contains("timer_step_limit"), "{msg}"),
        other => panic!("unexpected result: {other:?}"),
    }
    match PageConfig::from_json_str(r#"{"default_poll_interval_ms": -1}"#) {
        Err(Error::Config(msg)) => assert!(msg.contains("got -1"), "{msg}"),
        other => panic!("unexpected result: {other:?}"),
    }
    Ok(())
}

#[test]
fn with_config_validates() -> Result<()> {
    let err = Page::with_config(PageConfig {
        trace_log_limit: 0,
        ..PageConfig::default()
    })
    .expect_err("zero trace log limit should be rejected");
    assert_eq!(
        err,
        Error::Config("trace_log_limit requires at least 1 entry".into())
    );
    Ok(())
}

#[test]
fn setters_reject_zero_limits() -> Result<()> {
    let mut page = quiet_page();
    assert!(matches!(page.set_timer_step_limit(0), Err(Error::Config(_))));
    assert!(matches!(page.set_trace_log_limit(0), Err(Error::Config(_))));
    Ok(())
}

#[test]
fn default_flags_use_configured_namespace() -> Result<()> {
    let page = Page::with_config(PageConfig {
        flag_namespace: "app".into(),
        ..PageConfig::default()
    })?;
    page.default_flags().add("ready");
    assert_eq!(
        page.session_storage().get_item("app").as_deref(),
        Some(r#"{"ready":1}"#)
    );
    Ok(())
}

#[test]
fn seeded_storage_is_visible_to_flag_sets() -> Result<()> {
    let page = Page::with_seeded_storage(
        PageConfig::default(),
        &[("eux", r#"{"local":1}"#)],
        &[("eux", r#"{"session":1}"#)],
    )?;
    assert!(page.flags_in(StorageKind::Local, "eux").has("local"));
    assert!(page.flags("eux").has("session"));
    Ok(())
}

#[test]
fn open_tab_shares_local_storage_only() -> Result<()> {
    let page = quiet_page();
    page.local_storage().set_item("theme", "dark");
    page.flags("eux").add("login");

    let tab = page.open_tab();
    assert!(tab.local_storage().shares_area_with(&page.local_storage()));
    assert_eq!(tab.local_storage().get_item("theme").as_deref(), Some("dark"));
    assert!(!tab.flags("eux").has("login"));
    assert!(tab.session_storage().is_empty());
    assert_eq!(tab.now_ms(), 0);
    Ok(())
}

#[test]
fn log_is_recorded_only_in_debug_mode() -> Result<()> {
    let mut quiet = quiet_page();
    quiet.enable_trace(true);
    quiet.log("hidden");
    assert!(quiet.take_trace_logs().is_empty());

    let mut debug = traced_page()?;
    debug.log("polling done");
    assert_eq!(debug.take_trace_logs(), vec!["[log] polling done".to_string()]);
    Ok(())
}

#[test]
fn timer_trace_lines_follow_category_switch() -> Result<()> {
    let mut page = traced_page()?;
    page.set_timeout(5, |_| Ok(()));
    page.advance_time(5)?;
    let logs = page.take_trace_logs();
    assert_eq!(
        logs,
        vec![
            "[timer] schedule id=1 due_at=5 delay_ms=5 job=Callback(..)".to_string(),
            "[timer] run id=1 due_at=5 now_ms=5".to_string(),
            "[timer] advance delta_ms=5 from=0 to=5 ran_due=1".to_string(),
        ]
    );

    page.set_trace_timers(false);
    page.set_timeout(5, |_| Ok(()));
    page.flush()?;
    assert!(page.take_trace_logs().is_empty());
    Ok(())
}

#[test]
fn trace_log_limit_keeps_most_recent_lines() -> Result<()> {
    let mut page = traced_page()?;
    page.set_trace_polls(false);
    for _ in 0..4 {
        page.set_timeout(1, |_| Ok(()));
    }
    page.set_trace_log_limit(2)?;
    let logs = page.take_trace_logs();
    assert_eq!(
        logs,
        vec![
            "[timer] schedule id=3 due_at=1 delay_ms=1 job=Callback(..)".to_string(),
            "[timer] schedule id=4 due_at=1 delay_ms=1 job=Callback(..)".to_string(),
        ]
    );
    Ok(())
}

#[test]
fn trace_is_off_unless_debug_or_enabled() -> Result<()> {
    let mut page = quiet_page();
    page.set_timeout(1, |_| Ok(()));
    page.poll(|_| Ok(true), |_| Ok(()), 10)?;
    assert!(page.take_trace_logs().is_empty());
    Ok(())
}
