//! Server responses, always CRLF terminated.

use std::fmt;

use crate::sasl::SUPPORTED_MECHANISMS;

pub const AUTH_FAILED: &str = "Authentication failed";
pub const INVALID_COMMAND: &str = "invalid command";
pub const UNSUPPORTED_MECHANISM: &str = "Unsupported authentication mechanism";
pub const AUTH_CANCELLED: &str = "AUTHENTICATE cancelled";
pub const LITERAL_READY: &str = "Ready for literal data";
pub const BYE_LOGOUT: &str = "IMAP4rev1 Server logging out";
pub const BYE_TOO_MANY_FAILURES: &str = "Too many authentication failures";
pub const BYE_LINE_TOO_LONG: &str = "Line too long";
pub const BYE_IDLE: &str = "Autologout; idle for too long";

/// Tag used when a broken line carries no recoverable tag.
pub const UNTAGGED: &str = "*";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    No,
    Bad,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Status::Ok => "OK",
            Status::No => "NO",
            Status::Bad => "BAD",
        })
    }
}

/// `<tag> <status> <text>`
pub fn tagged(tag: &str, status: Status, text: &str) -> String {
    format!("{} {} {}\r\n", tag, status, text)
}

/// `* <text>`
pub fn untagged(text: &str) -> String {
    format!("* {}\r\n", text)
}

pub fn bye(text: &str) -> String {
    untagged(&format!("BYE {}", text))
}

/// `+ <text>`; the prompt keeps its trailing space when `text` is empty.
pub fn continuation(text: &str) -> String {
    format!("+ {}\r\n", text)
}

pub fn completed(tag: &str, command: &str) -> String {
    tagged(tag, Status::Ok, &format!("{} completed", command))
}

/// `IMAP4rev1` followed by one `AUTH=` entry per supported mechanism.
pub fn capability_list() -> String {
    SUPPORTED_MECHANISMS
        .iter()
        .fold(String::from("IMAP4rev1"), |list, mechanism| {
            format!("{} AUTH={}", list, mechanism)
        })
}

/// Greeting line. The configured banner is sent verbatim.
pub fn greeting(banner: &str) -> String {
    format!("{}\r\n", banner)
}
