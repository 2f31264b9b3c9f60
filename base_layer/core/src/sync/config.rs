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

use std::time::Duration;

use chainsync_common::configuration::{serializers, ConfigPath};
use serde::{Deserialize, Serialize};

use crate::{
    fetcher::FetcherConfig,
    protocol::{FlowControlParams, ProtocolConfig},
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    /// Download full blocks over eth
    #[default]
    Fast,
    /// Download headers only over les
    Light,
}

impl SyncMode {
    pub fn default_min_peers(self) -> usize {
        match self {
            SyncMode::Fast => 2,
            SyncMode::Light => 1,
        }
    }

    pub fn default_max_per_request(self) -> u64 {
        match self {
            SyncMode::Fast => 128,
            SyncMode::Light => 192,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
#[serde(default)]
pub struct SyncConfig {
    /// Network peers must be on to pass the handshake
    /// Default: 1
    pub network_id: u64,
    pub mode: SyncMode,
    /// Serve headers to light peers from the local chain
    /// Default: false
    pub light_serve: bool,
    /// Number of syncable peers required before a target is selected. `None` uses the default of the mode, 2 for
    /// fast sync and 1 for light sync.
    pub min_peers: Option<usize>,
    /// Select a target even when fewer than `min_peers` peers are connected
    /// Default: false
    pub force_sync: bool,
    /// Time between sync cycles.
    /// Default: 1 second
    #[serde(with = "serializers::seconds")]
    pub interval: Duration,
    /// How long stopping the synchronizer may take before giving up on its tasks.
    /// Default: 10 seconds
    #[serde(with = "serializers::seconds")]
    pub stop_timeout: Duration,
    pub fetcher: FetcherConfig,
    pub protocol: ProtocolConfig,
    /// Parameters announced to, and charged from, light peers we serve
    pub flow_control: FlowControlParams,
}

impl SyncConfig {
    pub fn min_peers(&self) -> usize {
        self.min_peers.unwrap_or_else(|| self.mode.default_min_peers())
    }

    pub fn max_per_request(&self) -> u64 {
        self.fetcher
            .max_per_request
            .unwrap_or_else(|| self.mode.default_max_per_request())
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            network_id: 1,
            mode: SyncMode::default(),
            light_serve: false,
            min_peers: None,
            force_sync: false,
            interval: Duration::from_secs(1),
            stop_timeout: Duration::from_secs(10),
            fetcher: FetcherConfig::default(),
            protocol: ProtocolConfig::default(),
            flow_control: FlowControlParams::default(),
        }
    }
}

impl ConfigPath for SyncConfig {
    fn main_key_prefix() -> &'static str {
        "sync"
    }
}

#[cfg(test)]
mod test {
    use chainsync_common::configuration::ConfigLoader;
    use config::Config;

    use super::*;

    #[test]
    fn mode_defaults_apply_unless_overridden() {
        let config = SyncConfig::default();
        assert_eq!(config.min_peers(), 2);
        assert_eq!(config.max_per_request(), 128);

        let config = SyncConfig {
            mode: SyncMode::Light,
            ..Default::default()
        };
        assert_eq!(config.min_peers(), 1);
        assert_eq!(config.max_per_request(), 192);

        let config = SyncConfig {
            mode: SyncMode::Light,
            min_peers: Some(3),
            ..Default::default()
        };
        assert_eq!(config.min_peers(), 3);
    }

    #[test]
    fn it_loads_from_the_sync_section() {
        let config = Config::builder()
            .set_override("sync.mode", "light")
            .unwrap()
            .set_override("sync.force_sync", true)
            .unwrap()
            .set_override("sync.fetcher.timeout", 12)
            .unwrap()
            .set_override("sync.fetcher.max_queue", 4)
            .unwrap()
            .build()
            .unwrap();
        let loaded = SyncConfig::load_from(&config).unwrap();
        assert_eq!(loaded.mode, SyncMode::Light);
        assert!(loaded.force_sync);
        assert_eq!(loaded.fetcher.timeout, Duration::from_secs(12));
        assert_eq!(loaded.fetcher.max_queue, 4);
        assert_eq!(loaded.fetcher.ban_time, Duration::from_secs(60));
        assert_eq!(loaded.interval, Duration::from_secs(1));
        assert_eq!(loaded.flow_control, FlowControlParams::default());
    }
}
