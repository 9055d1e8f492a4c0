//! Binary entrypoint for the upload plugin.

use std::io::{self, Write};

use conduit_sample_plugins::{S3Uploader, run};

fn main() {
    if let Err(error) = run(&S3Uploader) {
        writeln!(io::stderr().lock(), "{error}").ok();
        std::process::exit(1);
    }
}
