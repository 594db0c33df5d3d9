//! Interactive session domain types

use serde::{Deserialize, Serialize};

/// Parameters needed to reach an interactive session's display
///
/// Produced once per job record when it reaches `ready`; never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionDescriptor {
    pub host: String,
    /// Port of the browser-embeddable display (noVNC web client)
    pub display_port: u16,
    /// Port for native VNC clients
    pub direct_port: u16,
    /// Single-session credential
    pub auth_token: String,
}

impl ConnectionDescriptor {
    /// URL of the embeddable web display, connecting automatically
    pub fn display_url(&self) -> String {
        format!(
            "http://{}:{}/vnc.html?password={}&autoconnect=true",
            self.host, self.display_port, self.auth_token
        )
    }

    /// `host:port` for out-of-band native clients
    pub fn direct_address(&self) -> String {
        format!("{}:{}", self.host, self.direct_port)
    }
}
