//! Generation tracks.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// One of the two independent generation workflows.
///
/// Each track owns its own history and active reference state; nothing
/// done on one track blocks the other.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Track {
    /// Image generation and editing.
    Image,
    /// 3D scene code generation, rendered in a sandbox.
    #[strum(to_string = "object", serialize = "3d")]
    Object,
}

impl Track {
    /// Human-readable noun used in notifications.
    pub fn noun(&self) -> &'static str {
        match self {
            Track::Image => "image",
            Track::Object => "3D object",
        }
    }
}
