#![allow(dead_code)]

use std::sync::Arc;

use fpm::sheets::MemorySheets;

pub const BOOK: &str = "book";
pub const RESULTS: &str = "FINAL_FOCUS_SELECTION";
pub const USERS: &str = "users";
pub const USER_TAB: &str = "info";

pub fn rows(data: &[&[&str]]) -> Vec<Vec<String>> {
    data.iter()
        .map(|r| r.iter().map(|s| s.to_string()).collect())
        .collect()
}

/// A results tab plus a users tab with one account per role
///
/// Passwords are stored in plain text, like rows created before hashing.
pub fn fixture() -> Arc<MemorySheets> {
    let sheets = MemorySheets::new();
    sheets.insert_tab(
        BOOK,
        RESULTS,
        rows(&[
            &["CLIENT_ID", "STATUS", "MATCH_DATE", "NAME"],
            &["C2001", "W", "01.08.2025", "Ada"],
            &["C2002", "L", "15.08.2025", "Bob"],
            &["C2003", "X", "20.08.2025", "Cem"],
            &["C2004", "D", "2025-09-03", "Dee"],
        ]),
    );
    sheets.insert_tab(BOOK, "LOG_FOCUS_MODEL_A", rows(&[&["STATUS"]]));
    sheets.insert_tab(BOOK, "Notes", rows(&[&["TEXT"]]));
    sheets.insert_tab(
        USERS,
        USER_TAB,
        rows(&[
            &["IS_VERIFIED", "CLIENT_ID", "USERNAME", "PASSWORD", "USER_TYPE", "NAME", "BIRTHYEAR", "COMMENT"],
            &["YES", "C2001", "boss", "boss-pw", "admin", "Boss", "1980", ""],
            &["YES", "C2002", "helper", "helper-pw", "co-admin", "Helper", "1990", ""],
            &["YES", "C2005", "viewer", "viewer-pw", "read", "Viewer", "2000", ""],
            &["YES", "ADMIN", "root", "root-pw", "admin", "", "", ""],
        ]),
    );
    Arc::new(sheets)
}
