//! Binary entrypoint for the message filter plugin.

use std::io::{self, Write};

use conduit_sample_plugins::{MessageFilter, run};

fn main() {
    if let Err(error) = run(&MessageFilter) {
        writeln!(io::stderr().lock(), "{error}").ok();
        std::process::exit(1);
    }
}
