//! Provides miscellaneous utilities.

use crate::error::{Error, Result};

/// Reads a required environment variable.
///
/// Fails with a configuration error naming the variable; the binaries call
/// this at cold-start so a misdeployed function never starts polling.
pub fn required_env(name: &str) -> Result<String> {
    std::env::var(name).map_err(|_| {
        Error::Config(format!("missing environment variable {name}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_env_should_return_the_value_when_set() {
        std::env::set_var("RECOMMENDER_TEST_PRESENT", "value");
        assert_eq!(
            required_env("RECOMMENDER_TEST_PRESENT").unwrap(),
            "value",
        );
    }

    #[test]
    fn required_env_should_fail_when_unset() {
        let result = required_env("RECOMMENDER_TEST_ABSENT");
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
