//! Executable presence checks

use tracing::debug;

use crate::error::CoreError;

/// Ensure every executable in `names` is on `PATH`
///
/// # Errors
/// Returns `CoreError::MissingDependencies` listing each missing name
pub fn check_dependencies(names: &[&str]) -> Result<(), CoreError> {
    let missing: Vec<String> = names
        .iter()
        .filter(|name| match which::which(name) {
            Ok(path) => {
                debug!(dependency = %name, path = %path.display(), "found dependency");
                false
            }
            Err(error) => {
                debug!(dependency = %name, error = %error, "missing dependency");
                true
            }
        })
        .map(|name| (*name).to_string())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(CoreError::MissingDependencies(missing))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finds_sh() {
        assert!(check_dependencies(&["sh"]).is_ok());
    }

    #[test]
    fn test_reports_every_missing_name() {
        let err = check_dependencies(&["sh", "nixfleet-missing-a", "nixfleet-missing-b"])
            .unwrap_err();

        match err {
            CoreError::MissingDependencies(missing) => {
                assert_eq!(missing, vec!["nixfleet-missing-a", "nixfleet-missing-b"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_empty_list_is_ok() {
        assert!(check_dependencies(&[]).is_ok());
    }
}
