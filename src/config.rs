use std::{collections::HashMap, path::PathBuf};

use config::{Config as ConfigLib, ConfigError, Environment, File};
use secrecy::SecretString;
use serde::Deserialize;

use crate::xmldsig::SignerOptions;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub signer: SignerConfig,
    #[serde(default)]
    pub certificate: CertificateConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignerConfig {
    pub require_element_id: bool,
    #[serde(default)]
    pub default_tag: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CertificateConfig {
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default)]
    pub passphrase: Option<SecretString>,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_sources(None)
    }

    pub fn load_with_sources(
        env_vars: Option<HashMap<String, String>>,
    ) -> Result<Self, ConfigError> {
        let mut builder = ConfigLib::builder()
            .set_default("signer.require_element_id", false)?
            .add_source(File::with_name("config/settings").required(false));

        // Explicit overrides replace the process environment so tests stay isolated
        if let Some(vars) = env_vars {
            for (key, value) in vars {
                builder = builder.set_override(&key, value)?;
            }
        } else {
            // XMLSIGNER_SIGNER__DEFAULT_TAG, XMLSIGNER_CERTIFICATE__PATH, ...
            builder = builder.add_source(
                Environment::with_prefix("XMLSIGNER")
                    .prefix_separator("_")
                    .separator("__"),
            );
        }

        builder.build()?.try_deserialize()
    }

    /// Signer behaviour described by this configuration
    pub fn signer_options(&self) -> SignerOptions {
        SignerOptions {
            require_element_id: self.signer.require_element_id,
            default_tag: self
                .signer
                .default_tag
                .clone()
                .filter(|tag| !tag.trim().is_empty()),
        }
    }
}
