//  Copyright 2024, The Tari Project
//
//  Redistribution and use in source and binary forms, with or without modification, are permitted provided that the
//  following conditions are met:
//
//  1. Redistributions of source code must retain the above copyright notice, this list of conditions and the following
//  disclaimer.
//
//  2. Redistributions in binary form must reproduce the above copyright notice, this list of conditions and the
//  following disclaimer in the documentation and/or other materials provided with the distribution.
//
//  3. Neither the name of the copyright holder nor the names of its contributors may be used to endorse or promote
//  products derived from this software without specific prior written permission.
//
//  THIS SOFTWARE IS PROVIDED BY THE COPYRIGHT HOLDERS AND CONTRIBUTORS "AS IS" AND ANY EXPRESS OR IMPLIED WARRANTIES,
//  INCLUDING, BUT NOT LIMITED TO, THE IMPLIED WARRANTIES OF MERCHANTABILITY AND FITNESS FOR A PARTICULAR PURPOSE ARE
//  DISCLAIMED. IN NO EVENT SHALL THE COPYRIGHT HOLDER OR CONTRIBUTORS BE LIABLE FOR ANY DIRECT, INDIRECT, INCIDENTAL,
//  SPECIAL, EXEMPLARY, OR CONSEQUENTIAL DAMAGES (INCLUDING, BUT NOT LIMITED TO, PROCUREMENT OF SUBSTITUTE GOODS OR
//  SERVICES; LOSS OF USE, DATA, OR PROFITS; OR BUSINESS INTERRUPTION) HOWEVER CAUSED AND ON ANY THEORY OF LIABILITY,
//  WHETHER IN CONTRACT, STRICT LIABILITY, OR TORT (INCLUDING NEGLIGENCE OR OTHERWISE) ARISING IN ANY WAY OUT OF THE
//  USE OF THIS SOFTWARE, EVEN IF ADVISED OF THE POSSIBILITY OF SUCH DAMAGE.

//! # Application configuration
//!
//! Component configuration structs implement [`serde::Deserialize`], [`Default`] and [`ConfigPath`]. That grants a
//! [`ConfigLoader`] implementation which extracts the struct from the [`ConfigPath::main_key_prefix`] section of a
//! loaded [`config::Config`].
//!
//! ## Example
//!
//! ```
//! # use config::Config;
//! # use serde::Deserialize;
//! # use chainsync_common::{ConfigLoader, ConfigPath};
//! #[derive(Deserialize, Default)]
//! #[serde(default)]
//! struct MyNodeConfig {
//!     welcome_message: String,
//! }
//! impl ConfigPath for MyNodeConfig {
//!     fn main_key_prefix() -> &'static str {
//!         "my_node"
//!     }
//! }
//!
//! let config = Config::builder()
//!     .set_override("my_node.welcome_message", "nice to see you")
//!     .unwrap()
//!     .build()
//!     .unwrap();
//! let my_config = MyNodeConfig::load_from(&config).unwrap();
//! assert_eq!(my_config.welcome_message, "nice to see you");
//! ```

use std::path::Path;

use config::{Config, Environment, File};
use log::*;
use serde::de::DeserializeOwned;

use super::ConfigError;

const LOG_TARGET: &str = "common::configuration";

/// The configuration section a struct is read from
pub trait ConfigPath {
    /// Main configuration section
    fn main_key_prefix() -> &'static str;
}

/// Configuration loader based on [`ConfigPath`] selectors
pub trait ConfigLoader: ConfigPath + DeserializeOwned + Default {
    /// Try to load configuration from the supplied `Config` under `main_key_prefix()`.
    ///
    /// A missing section yields `Self::default()`. Missing fields inside a present section are filled from the
    /// struct's `#[serde(default)]` values.
    fn load_from(config: &Config) -> Result<Self, ConfigError> {
        match config.get::<Self>(Self::main_key_prefix()) {
            Ok(loaded) => Ok(loaded),
            Err(config::ConfigError::NotFound(key)) => {
                debug!(
                    target: LOG_TARGET,
                    "Configuration section `{}` not found, using defaults", key
                );
                Ok(Self::default())
            },
            Err(err) => Err(ConfigError::new("Invalid configuration section", Some(err.to_string()))),
        }
    }
}

impl<C> ConfigLoader for C where C: ConfigPath + DeserializeOwned + Default {}

/// Loads the configuration file at `path` (if it exists) and overlays any `CHAINSYNC__SECTION__KEY` environment
/// variables.
pub fn load_configuration<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    if !path.exists() {
        info!(
            target: LOG_TARGET,
            "Configuration file {} not found, using defaults and environment",
            path.display()
        );
    }
    let config = Config::builder()
        .add_source(File::from(path).required(false))
        .add_source(Environment::with_prefix("CHAINSYNC").separator("__"))
        .build()?;
    Ok(config)
}
