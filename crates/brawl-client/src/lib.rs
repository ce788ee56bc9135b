//! Brawl Stars data-API client with self-provisioned credentials
//!
//! Wraps the data API (`api.brawlstars.com`) behind a dispatcher that
//! pulls bearer tokens from `brawl-auth`'s lifecycle manager and recovers
//! from authorization rejections by forcing a key refresh and replaying
//! the request exactly once.
//!
//! ```no_run
//! # async fn run() -> brawl_client::Result<()> {
//! let config = brawl_client::Config::load(std::path::Path::new("brawl.toml"))
//!     .map_err(|e| brawl_client::Error::Validation(e.to_string()))?;
//! let client = brawl_client::ApiClient::from_config(&config)?;
//! let player = client.get_player("#2R0VLG89J").await?;
//! println!("{} has {} trophies", player.name, player.trophies);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod paging;

pub use client::ApiClient;
pub use config::Config;
pub use error::{Error, Result};
pub use models::{
    Accessory, BrawlerStat, Club, ClubMember, Cursors, GearStat, PagedList, Paging, Player,
    PlayerClub, PlayerIcon, StarPower,
};
pub use paging::Page;
