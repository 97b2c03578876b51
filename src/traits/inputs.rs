use anyhow::Result;
#[cfg(test)]
use std::collections::HashMap;

/// Key-value configuration supplied by the job host.
///
/// Every lookup funnels through [`TaskInputs::lookup`], which resolves a raw
/// job-host variable name; the provided methods apply the host's naming
/// convention on top of it.
pub trait TaskInputs: Send + Sync {
    /// Look up a raw job-host variable such as `INPUT_COMMAND`
    fn lookup(&self, key: &str) -> Option<String>;

    /// Task input by name; empty values are treated as absent
    fn input(&self, name: &str) -> Option<String> {
        non_empty(self.lookup(&input_key(name)))
    }

    /// Task input that must be present
    fn required_input(&self, name: &str) -> Result<String> {
        match self.input(name) {
            Some(value) => Ok(value),
            None => anyhow::bail!("Input required: {}", name),
        }
    }

    /// Boolean task input; anything other than `true` is false
    fn bool_input(&self, name: &str) -> bool {
        self.input(name)
            .map(|v| v.trim().eq_ignore_ascii_case("true"))
            .unwrap_or(false)
    }

    /// Pipeline variable such as `System.DefaultWorkingDirectory`
    fn variable(&self, name: &str) -> Option<String> {
        non_empty(self.lookup(&variable_key(name)))
    }

    /// Authorization scheme of a service connection, as stored
    fn endpoint_auth_scheme(&self, connection: &str) -> Option<String> {
        non_empty(self.lookup(&format!("ENDPOINT_AUTH_SCHEME_{}", connection)))
    }

    fn endpoint_auth_parameter(&self, connection: &str, key: &str) -> Option<String> {
        non_empty(self.lookup(&format!(
            "ENDPOINT_AUTH_PARAMETER_{}_{}",
            connection,
            key.to_uppercase()
        )))
    }

    fn required_endpoint_auth_parameter(&self, connection: &str, key: &str) -> Result<String> {
        match self.endpoint_auth_parameter(connection, key) {
            Some(value) => Ok(value),
            None => anyhow::bail!(
                "Endpoint auth data not present: {} (parameter '{}')",
                connection,
                key
            ),
        }
    }

    fn endpoint_data_parameter(&self, connection: &str, key: &str) -> Option<String> {
        non_empty(self.lookup(&format!(
            "ENDPOINT_DATA_{}_{}",
            connection,
            key.to_uppercase()
        )))
    }

    fn required_endpoint_data_parameter(&self, connection: &str, key: &str) -> Result<String> {
        match self.endpoint_data_parameter(connection, key) {
            Some(value) => Ok(value),
            None => anyhow::bail!(
                "Endpoint data not present: {} (parameter '{}')",
                connection,
                key
            ),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// `workingDirectory` -> `INPUT_WORKINGDIRECTORY`
pub fn input_key(name: &str) -> String {
    format!("INPUT_{}", name.replace(' ', "_").to_uppercase())
}

/// `System.AccessToken` -> `SYSTEM_ACCESSTOKEN`
pub fn variable_key(name: &str) -> String {
    name.replace(['.', ' '], "_").to_uppercase()
}

/// Inputs read from the process environment, with optional command-line
/// overrides layered on top
pub struct EnvTaskInputs {
    overrides: Vec<(String, String)>,
}

impl EnvTaskInputs {
    pub fn new() -> Self {
        Self {
            overrides: Vec::new(),
        }
    }

    /// Override a task input (by input name, not raw key)
    pub fn with_input(mut self, name: &str, value: &str) -> Self {
        self.overrides.push((input_key(name), value.to_string()));
        self
    }
}

impl Default for EnvTaskInputs {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskInputs for EnvTaskInputs {
    fn lookup(&self, key: &str) -> Option<String> {
        self.overrides
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
            .or_else(|| std::env::var(key).ok())
    }
}

/// In-memory inputs for tests, keyed the same way the job host keys them
#[cfg(test)]
pub struct MockTaskInputs {
    values: HashMap<String, String>,
}

#[cfg(test)]
impl MockTaskInputs {
    pub fn new() -> Self {
        Self {
            values: HashMap::new(),
        }
    }

    pub fn with_input(mut self, name: &str, value: &str) -> Self {
        self.values.insert(input_key(name), value.to_string());
        self
    }

    pub fn with_variable(mut self, name: &str, value: &str) -> Self {
        self.values.insert(variable_key(name), value.to_string());
        self
    }

    pub fn with_auth_scheme(mut self, connection: &str, scheme: &str) -> Self {
        self.values
            .insert(format!("ENDPOINT_AUTH_SCHEME_{}", connection), scheme.to_string());
        self
    }

    pub fn with_auth_parameter(mut self, connection: &str, key: &str, value: &str) -> Self {
        self.values.insert(
            format!("ENDPOINT_AUTH_PARAMETER_{}_{}", connection, key.to_uppercase()),
            value.to_string(),
        );
        self
    }

    pub fn with_data_parameter(mut self, connection: &str, key: &str, value: &str) -> Self {
        self.values.insert(
            format!("ENDPOINT_DATA_{}_{}", connection, key.to_uppercase()),
            value.to_string(),
        );
        self
    }
}

#[cfg(test)]
impl Default for MockTaskInputs {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
impl TaskInputs for MockTaskInputs {
    fn lookup(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_key_naming() {
        assert_eq!(input_key("workingDirectory"), "INPUT_WORKINGDIRECTORY");
        assert_eq!(input_key("output to"), "INPUT_OUTPUT_TO");
        assert_eq!(variable_key("System.AccessToken"), "SYSTEM_ACCESSTOKEN");
    }

    #[test]
    fn test_required_input_rejects_empty() {
        let inputs = MockTaskInputs::new()
            .with_input("command", "plan")
            .with_input("commandOptions", "   ");

        assert_eq!(inputs.required_input("command").unwrap(), "plan");
        assert!(inputs.input("commandOptions").is_none());
        let err = inputs.required_input("commandOptions").unwrap_err();
        assert_eq!(err.to_string(), "Input required: commandOptions");
    }

    #[test]
    fn test_bool_input() {
        let inputs = MockTaskInputs::new()
            .with_input("a", "True")
            .with_input("b", "yes");

        assert!(inputs.bool_input("a"));
        assert!(!inputs.bool_input("b"));
        assert!(!inputs.bool_input("missing"));
    }

    #[test]
    fn test_endpoint_parameters_are_case_insensitive_on_key() {
        let inputs = MockTaskInputs::new()
            .with_auth_scheme("AzureRM", "WorkloadIdentityFederation")
            .with_auth_parameter("AzureRM", "tenantid", "tenant")
            .with_data_parameter("AzureRM", "subscriptionid", "sub");

        assert_eq!(
            inputs.endpoint_auth_scheme("AzureRM").as_deref(),
            Some("WorkloadIdentityFederation")
        );
        assert_eq!(
            inputs.endpoint_auth_parameter("AzureRM", "TenantId").as_deref(),
            Some("tenant")
        );
        assert_eq!(
            inputs
                .required_endpoint_data_parameter("AzureRM", "subscriptionid")
                .unwrap(),
            "sub"
        );
        assert!(
            inputs
                .required_endpoint_auth_parameter("AzureRM", "serviceprincipalkey")
                .is_err()
        );
    }

    #[test]
    fn test_env_inputs_overrides_win() {
        let inputs = EnvTaskInputs::new()
            .with_input("command", "init")
            .with_input("command", "plan");
        assert_eq!(inputs.input("command").as_deref(), Some("plan"));
    }
}
