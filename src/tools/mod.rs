//! In-Process Tool Handlers
//!
//! Rule evaluators that run inside the serving process. Each handler is a
//! pure function over the text payload returning a report-shaped JSON
//! object; none of them block on external I/O and none of them panic on
//! user input. Tool-level failures (empty password, invalid encryptor
//! mode) come back as `ok: false` reports, not pipeline errors; those
//! are legitimate tool outputs.

pub mod bughunter;
pub mod encryptor;
pub mod password;
