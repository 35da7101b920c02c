//! Flow variable resolution.

use crate::error::FlowmapError;

/// Names under which routing models publish discharge, in order of preference.
pub const FLOW_VARIABLE_ALIASES: [&str; 4] = ["flow", "streamflow", "q", "discharge"];

/// Name of the optional velocity variable.
pub const VELOCITY_VARIABLE: &str = "velocity";

/// Name of the optional depth variable.
pub const DEPTH_VARIABLE: &str = "depth";

/// Returns the first flow alias present in `available_names`.
///
/// # Arguments
///
/// * `available_names`: Names of every variable in the dataset, coordinates included
pub fn resolve_flow_variable<'a, I>(available_names: I) -> Result<&'static str, FlowmapError>
where
    I: IntoIterator<Item = &'a str>,
{
    let available: hashbrown::HashSet<&str> = available_names.into_iter().collect();
    FLOW_VARIABLE_ALIASES
        .into_iter()
        .find(|candidate| available.contains(candidate))
        .ok_or_else(|| FlowmapError::VariableNotFound {
            candidates: FLOW_VARIABLE_ALIASES.join(", "),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_flow() {
        assert_eq!("flow", resolve_flow_variable(["time", "flow"]).unwrap());
    }

    #[test]
    fn resolve_alias() {
        assert_eq!(
            "streamflow",
            resolve_flow_variable(["streamflow", "feature_id"]).unwrap()
        );
        assert_eq!("q", resolve_flow_variable(["q"]).unwrap());
        assert_eq!("discharge", resolve_flow_variable(["discharge"]).unwrap());
    }

    #[test]
    fn resolve_prefers_earlier_alias() {
        assert_eq!(
            "streamflow",
            resolve_flow_variable(["discharge", "q", "streamflow"]).unwrap()
        );
    }

    #[test]
    fn resolve_is_case_sensitive() {
        assert!(resolve_flow_variable(["Flow"]).is_err());
    }

    #[test]
    fn resolve_not_found() {
        match resolve_flow_variable(["time", "feature_id", "temperature"]).unwrap_err() {
            FlowmapError::VariableNotFound { candidates } => {
                assert_eq!("flow, streamflow, q, discharge", candidates)
            }
            err => panic!("unexpected error {err:?}"),
        }
    }

    #[test]
    fn resolve_empty() {
        assert!(resolve_flow_variable([]).is_err());
    }
}
