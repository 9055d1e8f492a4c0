//! Build script: stamp the sample plugins with a reproducible build time.
//!
//! `CONDUIT_BUILD_TIME` wins when set. Otherwise the stamp comes from
//! `SOURCE_DATE_EPOCH`, falling back to the Unix epoch so builds stay
//! reproducible.

use std::env;

use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

const FALLBACK_STAMP: &str = "1970-01-01T00:00:00Z";

fn source_date_stamp() -> String {
    let Ok(raw) = env::var("SOURCE_DATE_EPOCH") else {
        return FALLBACK_STAMP.into();
    };

    let Ok(seconds) = raw.parse::<i64>() else {
        println!(
            "cargo:warning=Invalid SOURCE_DATE_EPOCH '{raw}'; expected integer seconds since \
             Unix epoch; falling back to {FALLBACK_STAMP}"
        );
        return FALLBACK_STAMP.into();
    };

    let Ok(stamp) = OffsetDateTime::from_unix_timestamp(seconds) else {
        println!(
            "cargo:warning=Invalid SOURCE_DATE_EPOCH '{raw}'; not a valid Unix timestamp; \
             falling back to {FALLBACK_STAMP}"
        );
        return FALLBACK_STAMP.into();
    };

    stamp
        .format(&Rfc3339)
        .unwrap_or_else(|_| FALLBACK_STAMP.into())
}

fn main() {
    println!("cargo:rerun-if-env-changed=CONDUIT_BUILD_TIME");
    println!("cargo:rerun-if-env-changed=SOURCE_DATE_EPOCH");
    let stamp = env::var("CONDUIT_BUILD_TIME")
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(source_date_stamp);
    println!("cargo:rustc-env=CONDUIT_BUILD_TIME={stamp}");
}
