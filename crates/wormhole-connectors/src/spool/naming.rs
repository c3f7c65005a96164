//! Spool file names.

use chrono::{DateTime, Local};
use rand::Rng;

use super::state::READY_EXT;

/// Base name of every file the writer creates.
pub const BASE_NAME: &str = "message";

/// Exclusive upper bound of the random component.
const RANDOM_BOUND: u32 = 100_000;

/// Generates a fresh spool file name: `message_{timestamp}_{n}.hsxa`.
#[must_use]
pub fn generate() -> String {
    let n = rand::thread_rng().gen_range(0..RANDOM_BOUND);
    format_name(BASE_NAME, Local::now(), n, READY_EXT)
}

/// Formats `{base}_{%Y%m%d%H%M%S}_{n}{ext}`.
#[must_use]
pub fn format_name(base: &str, at: DateTime<Local>, n: u32, ext: &str) -> String {
    format!("{base}_{}_{n}{ext}", at.format("%Y%m%d%H%M%S"))
}

/// Name of the temporary copy used when a move has to fall back to copying.
#[must_use]
pub fn partial_name(name: &str) -> String {
    format!("{name}.part")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spool::state::SpoolFileState;
    use chrono::TimeZone;
    use proptest::prelude::*;

    #[test]
    fn test_format_name() {
        let at = Local.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        assert_eq!(
            format_name("message", at, 42, ".hsxa"),
            "message_20240309070501_42.hsxa"
        );
    }

    #[test]
    fn test_partial_name_is_not_ready() {
        let name = generate();
        assert_eq!(SpoolFileState::from_file_name(&name), Some(SpoolFileState::Ready));
        assert_eq!(SpoolFileState::from_file_name(&partial_name(&name)), None);
    }

    proptest! {
        /// Every generated name is a Ready name with the expected shape.
        #[test]
        fn generated_names_are_ready(_seed in 0u8..16) {
            let name = generate();
            prop_assert!(name.starts_with("message_"));
            prop_assert_eq!(SpoolFileState::from_file_name(&name), Some(SpoolFileState::Ready));

            let stem = name.strip_suffix(READY_EXT).unwrap();
            let parts: Vec<&str> = stem.split('_').collect();
            prop_assert_eq!(parts.len(), 3);
            prop_assert_eq!(parts[1].len(), 14);
            let n: u32 = parts[2].parse().unwrap();
            prop_assert!(n < RANDOM_BOUND);
        }
    }
}
