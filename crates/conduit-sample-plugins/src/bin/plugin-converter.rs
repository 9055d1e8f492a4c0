//! Binary entrypoint for the media converter plugin.

use std::io::{self, Write};

use conduit_sample_plugins::{MediaConverter, run};

fn main() {
    if let Err(error) = run(&MediaConverter) {
        writeln!(io::stderr().lock(), "{error}").ok();
        std::process::exit(1);
    }
}
