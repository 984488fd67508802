//! Boot script loading.
//!
//! A boot script is the initialization snippet injected into the evaluator to
//! set up a scripting client for a node endpoint. Loaders produce it
//! asynchronously; the controller sequences its injection.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Host and port the scripting client connects to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    /// Create a validated endpoint.
    pub fn new(host: impl Into<String>, port: u16) -> Result<Self> {
        let host = host.into();
        let trimmed = host.trim();

        if trimmed.is_empty() {
            return Err(Error::Config("endpoint host must not be empty".to_string()));
        }
        if trimmed.chars().any(char::is_whitespace) {
            return Err(Error::Config(format!(
                "endpoint host '{}' contains whitespace",
                trimmed
            )));
        }
        if port == 0 {
            return Err(Error::Config("endpoint port must be non-zero".to_string()));
        }

        Ok(Self {
            host: trimmed.to_string(),
            port,
        })
    }

    /// HTTP URL of the endpoint.
    pub fn url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Produces the boot script for an endpoint.
#[async_trait]
pub trait BootScriptLoader: Send + Sync {
    /// Load the boot script for `endpoint`.
    async fn load(&self, endpoint: &Endpoint) -> Result<String>;
}

/// Default template: binds a client description readable by
/// [`BindingEvaluator`](crate::evaluator::BindingEvaluator).
pub const DEFAULT_BOOT_TEMPLATE: &str = r#"let provider = "{url}"
let web3 = {"client": "{client}", "provider": "{url}", "host": "{host}", "port": {port}}"#;

/// Renders a boot script from a template.
///
/// Placeholders: `{host}`, `{port}`, `{url}`, `{client}`.
#[derive(Debug, Clone)]
pub struct TemplateBootLoader {
    template: String,
    client: String,
}

impl Default for TemplateBootLoader {
    fn default() -> Self {
        Self::new(DEFAULT_BOOT_TEMPLATE)
    }
}

impl TemplateBootLoader {
    /// Create a loader for `template`.
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            client: "Web3".to_string(),
        }
    }

    /// Set the client name substituted for `{client}`.
    pub fn with_client(mut self, client: impl Into<String>) -> Self {
        self.client = client.into();
        self
    }

    /// Render the template for `endpoint`.
    pub fn render(&self, endpoint: &Endpoint) -> String {
        self.template
            .replace("{url}", &endpoint.url())
            .replace("{host}", &endpoint.host)
            .replace("{port}", &endpoint.port.to_string())
            .replace("{client}", &self.client)
    }
}

#[async_trait]
impl BootScriptLoader for TemplateBootLoader {
    async fn load(&self, endpoint: &Endpoint) -> Result<String> {
        let script = self.render(endpoint);
        if script.trim().is_empty() {
            return Err(Error::boot_script("boot template rendered an empty script"));
        }
        tracing::debug!(%endpoint, bytes = script.len(), "rendered boot script");
        Ok(script)
    }
}
