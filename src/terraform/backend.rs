use indexmap::IndexMap;

/// Backend keys whose values must never appear in logs
const SECRET_KEYS: &[&str] = &["client_secret", "oidc_token", "access_key", "secret_key"];

/// Ordered backend settings for one `init` call, flushed as
/// `-backend-config=key=value` arguments in insertion order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackendConfig {
    entries: IndexMap<String, String>,
}

impl BackendConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a key; overwriting keeps the original position
    pub fn set(&mut self, key: &str, value: &str) {
        self.entries.insert(key.to_string(), value.to_string());
    }

    #[cfg(test)]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn to_args(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|(k, v)| format!("-backend-config={}={}", k, v))
            .collect()
    }
}

/// Mask secret values in a single `-backend-config=key=value` argument
pub fn mask_backend_arg(arg: &str) -> String {
    if let Some(setting) = arg.strip_prefix("-backend-config=") {
        if let Some((key, _)) = setting.split_once('=') {
            if SECRET_KEYS.contains(&key) {
                return format!("-backend-config={}=***", key);
            }
        }
    }
    arg.to_string()
}

/// Generate a `terraform { backend "http" { ... } }` block for state stored
/// behind a pre-authenticated request URL
pub fn generate_http_backend_block(address: &str) -> String {
    let mut hcl = String::new();
    hcl.push_str("# Auto-generated backend configuration\n");
    hcl.push_str("terraform {\n");
    hcl.push_str("  backend \"http\" {\n");
    hcl.push_str(&format!("    address = \"{}\"\n", escape_hcl_string(address)));
    hcl.push_str("    update_method = \"PUT\"\n");
    hcl.push_str("  }\n");
    hcl.push_str("}\n");
    hcl
}

/// Escape special characters in HCL strings
fn escape_hcl_string(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('\"', "\\\"")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
        .replace('\t', "\\t")
}
