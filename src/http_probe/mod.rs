pub mod catalog;
pub mod classifier;
pub mod probe;
pub mod result;

pub mod prelude {
    pub use super::catalog::BypassHeader;
    pub use super::classifier::classify;
    pub use super::probe::{ProbeContext, ProbeError, build_client, probe_url};
    pub use super::result::{ProbeResult, SentRequest};
}

use std::fmt::Write;

fn report(mut err: &(dyn std::error::Error + 'static)) -> String {
    let mut s = format!("{}", err);
    while let Some(src) = err.source() {
        let _ = write!(s, ": {}", src);
        err = src;
    }
    s
}
