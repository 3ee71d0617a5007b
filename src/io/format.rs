//! Nice fcirdm output formatting.

use std::fmt;

use log;

const FCIRDM_BANNER_LENGTH: usize = 79;

/// Level of the `fcirdm-output` records, visible under the default `info` filter.
pub(crate) const RDM_OUTPUT_LEVEL: log::Level = log::Level::Info;

/// Logs a main output line to the `fcirdm-output` logger.
macro_rules! rdm_output {
    ($fmt:expr $(, $($arg:tt)*)?) => { log::log!(target: "fcirdm-output", $crate::io::format::RDM_OUTPUT_LEVEL, $fmt, $($($arg)*)?); }
}

pub(crate) use rdm_output;

/// Logs a nicely formatted section title to the `fcirdm-output` logger.
pub(crate) fn log_title(title: &str) {
    let length = title.chars().count().max(FCIRDM_BANNER_LENGTH - 6);
    let bar = "─".repeat(length);
    rdm_output!("┌──{bar}──┐");
    rdm_output!("│§ {title:^length$} §│");
    rdm_output!("└──{bar}──┘");
}

/// Turns a boolean into a string of `yes` or `no`.
pub(crate) fn nice_bool(b: bool) -> String {
    if b {
        "yes".to_string()
    } else {
        "no".to_string()
    }
}

/// A trait for logging fcirdm outputs nicely.
pub(crate) trait RdmOutput: fmt::Debug + fmt::Display {
    /// Logs display output nicely.
    fn log_output_display(&self) {
        let lines = self.to_string();
        lines.lines().for_each(|line| {
            rdm_output!("{line}");
        })
    }
}

// Blanket implementation
impl<T> RdmOutput for T where T: fmt::Debug + fmt::Display {}
