//! Download categories.

use std::fmt;
use std::str::FromStr;

use super::error::DownloadError;

/// What kind of content a download request fetches.
///
/// The category selects both the orchestration branch (direct URL or rapid
/// source list) and the finish action run after a successful transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Engine,
    EngineLinux,
    EngineLinux64,
    EngineWindows,
    EngineWindows64,
    EngineMacosx,
    /// Self-update package for the lobby client.
    SpringLobby,
    /// Arbitrary file by URL.
    Http,
    Map,
    Game,
    /// Rapid metadata lookup with no follow-up action.
    Rapid,
}

impl Category {
    /// Every category, in declaration order.
    pub const ALL: [Category; 11] = [
        Category::Engine,
        Category::EngineLinux,
        Category::EngineLinux64,
        Category::EngineWindows,
        Category::EngineWindows64,
        Category::EngineMacosx,
        Category::SpringLobby,
        Category::Http,
        Category::Map,
        Category::Game,
        Category::Rapid,
    ];

    /// Stable name, as stored in persisted download lists.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Engine => "engine",
            Self::EngineLinux => "engine_linux",
            Self::EngineLinux64 => "engine_linux64",
            Self::EngineWindows => "engine_windows",
            Self::EngineWindows64 => "engine_windows64",
            Self::EngineMacosx => "engine_macosx",
            Self::SpringLobby => "springlobby",
            Self::Http => "http",
            Self::Map => "map",
            Self::Game => "game",
            Self::Rapid => "rapid",
        }
    }

    /// Engine build for any platform.
    pub fn is_engine(&self) -> bool {
        matches!(
            self,
            Self::Engine
                | Self::EngineLinux
                | Self::EngineLinux64
                | Self::EngineWindows
                | Self::EngineWindows64
                | Self::EngineMacosx
        )
    }

    /// Downloaded by URL in a single attempt, without the rapid source list.
    pub fn is_direct_url(&self) -> bool {
        matches!(self, Self::SpringLobby | Self::Http)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Category {
    type Err = DownloadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|c| c.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| DownloadError::UnknownCategory(s.to_string()))
    }
}
