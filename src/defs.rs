//! Achievement definitions as served by the RetroAchievements patch JSON
//!
//! The remote service describes each achievement as a JSON object whose
//! `MemAddr` field holds the condition string. This module deserializes
//! those records and compiles their triggers; everything beyond that
//! (unlock persistence, the network client, UI) lives in the host.

use serde::{Deserialize, Serialize};

use crate::condition::Trigger;
use crate::error::ParseResult;

/// Flags value for achievements in the official set
pub const FLAGS_OFFICIAL: u32 = 3;
/// Flags value for unofficial/test achievements
pub const FLAGS_UNOFFICIAL: u32 = 5;

fn default_flags() -> u32 {
    FLAGS_OFFICIAL
}

/// One achievement record from the patch data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AchievementDef {
    #[serde(rename = "ID")]
    pub id: u32,
    #[serde(rename = "Title")]
    pub title: String,
    #[serde(rename = "Description", default)]
    pub description: String,
    #[serde(rename = "Points", default)]
    pub points: u32,
    #[serde(rename = "Author", default)]
    pub author: String,
    #[serde(rename = "Badge", default)]
    pub badge: String,
    #[serde(rename = "MemAddr")]
    pub mem_addr: String,
    #[serde(rename = "Flags", default = "default_flags")]
    pub flags: u32,
}

impl AchievementDef {
    /// Whether this achievement belongs to the official set
    pub fn is_official(&self) -> bool {
        self.flags == FLAGS_OFFICIAL
    }

    /// Compile the `MemAddr` condition string into an evaluatable trigger
    pub fn compile(&self) -> ParseResult<Trigger> {
        Trigger::parse(&self.mem_addr)
    }
}

/// A definition paired with its compiled trigger
#[derive(Debug, Clone)]
pub struct CompiledAchievement {
    pub def: AchievementDef,
    pub trigger: Trigger,
}

/// Deserialize a JSON array of achievement records
pub fn parse_achievement_list(json: &str) -> serde_json::Result<Vec<AchievementDef>> {
    serde_json::from_str(json)
}

/// Compile every parseable achievement in the list.
///
/// Definitions whose condition string fails to parse are skipped with a
/// warning; a single malformed achievement must not take down the rest of
/// the set.
pub fn compile_all(defs: Vec<AchievementDef>) -> Vec<CompiledAchievement> {
    let mut compiled = Vec::with_capacity(defs.len());
    for def in defs {
        match def.compile() {
            Ok(trigger) => {
                log::debug!("compiled achievement {} ({})", def.id, def.title);
                compiled.push(CompiledAchievement { def, trigger });
            }
            Err(err) => {
                log::warn!(
                    "skipping achievement {} ({}): {}",
                    def.id,
                    def.title,
                    err
                );
            }
        }
    }
    compiled
}
