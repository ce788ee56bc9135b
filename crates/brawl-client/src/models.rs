//! Typed domain entities for data-API payloads
//!
//! Plain serde structs over the API's camelCase JSON. Collections are
//! ordinary `Vec<T>`s; shape violations surface as deserialization
//! errors at the dispatcher, which reports them as protocol errors.

use serde::{Deserialize, Serialize};

/// Cursor markers from a list response, fed back via [`crate::Page`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Cursors {
    #[serde(default)]
    pub after: Option<String>,
    #[serde(default)]
    pub before: Option<String>,
}

/// Paging block attached to list responses.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Paging {
    #[serde(default)]
    pub cursors: Cursors,
}

/// A page of items from a list endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PagedList<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
    #[serde(default)]
    pub paging: Option<Paging>,
}

/// A club, as returned by `clubs/{tag}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Club {
    pub tag: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub trophies: u32,
    pub required_trophies: u32,
    #[serde(default)]
    pub members: Vec<ClubMember>,
    #[serde(rename = "type")]
    pub kind: String,
    pub badge_id: u32,
}

/// A member entry inside a club.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClubMember {
    pub tag: String,
    pub name: String,
    #[serde(default)]
    pub name_color: Option<String>,
    pub role: String,
    pub trophies: u32,
    pub icon: PlayerIcon,
}

/// Profile icon reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerIcon {
    pub id: u32,
}

/// The club block embedded in a player profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerClub {
    pub tag: String,
    pub name: String,
}

/// A player profile, as returned by `players/{tag}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub tag: String,
    pub name: String,
    #[serde(default)]
    pub name_color: Option<String>,
    pub icon: PlayerIcon,
    pub trophies: u32,
    pub highest_trophies: u32,
    pub exp_level: u32,
    pub exp_points: u32,
    #[serde(default)]
    pub is_qualified_from_championship_challenge: bool,
    #[serde(rename = "3vs3Victories", default)]
    pub three_vs_three_victories: u32,
    #[serde(default)]
    pub solo_victories: u32,
    #[serde(default)]
    pub duo_victories: u32,
    #[serde(default)]
    pub best_robo_rumble_time: u32,
    #[serde(default)]
    pub best_time_as_big_brawler: u32,
    #[serde(default)]
    pub club: Option<PlayerClub>,
    #[serde(default)]
    pub brawlers: Vec<BrawlerStat>,
}

/// Per-brawler progression inside a player profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrawlerStat {
    pub id: u32,
    pub name: String,
    pub power: u32,
    pub rank: u32,
    pub trophies: u32,
    #[serde(default)]
    pub highest_trophies: u32,
    #[serde(default)]
    pub gears: Vec<GearStat>,
    #[serde(default)]
    pub star_powers: Vec<StarPower>,
    #[serde(default)]
    pub gadgets: Vec<Accessory>,
}

/// An unlocked star power.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StarPower {
    pub id: u32,
    pub name: String,
}

/// An unlocked gadget.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Accessory {
    pub id: u32,
    pub name: String,
}

/// An equipped gear.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GearStat {
    pub id: u32,
    pub name: String,
    pub level: u32,
}
