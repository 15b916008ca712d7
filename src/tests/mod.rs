use super::*;

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

mod page_config_and_trace;

fn quiet_page() -> Page {
    let mut page = Page::new();
    page.set_trace_to_log(false);
    page
}

fn traced_page() -> Result<Page> {
    let mut page = Page::with_config(PageConfig::debug())?;
    page.set_trace_to_log(false);
    Ok(page)
}
