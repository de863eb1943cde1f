//! Stamps the exporter build time into the header comment of every scene file.

use time::format_description;
use time::OffsetDateTime;

fn stamp() -> String {
    if let Ok(fixed) = std::env::var("VRSCENE_BUILD_STAMP") {
        return fixed;
    }
    let Ok(fmt) = format_description::parse("[year]-[month]-[day] [hour]:[minute]:[second] UTC") else {
        return "unknown".to_string();
    };
    OffsetDateTime::now_utc()
        .format(&fmt)
        .unwrap_or_else(|_| "unknown".to_string())
}

fn main() {
    println!("cargo:rustc-env=VRSCENE_BUILD_STAMP={}", stamp());
    println!("cargo:rerun-if-env-changed=VRSCENE_BUILD_STAMP");
}
