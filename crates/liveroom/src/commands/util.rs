//! Shared helpers for command handlers.

use std::time::Duration;

use clap::ValueEnum;

use liveroom_config::Config;
use liveroom_core::{RoomSummary, Transport};

use crate::cli::{ColorMode, GlobalOpts, OutputFormat};
use crate::error::CliError;
use crate::output;

/// Effective settings for one invocation: config file + env, then flags.
#[derive(Debug)]
pub struct Context {
    pub config: Config,
    pub format: OutputFormat,
    pub color: bool,
    pub quiet: bool,
}

impl Context {
    pub fn load(global: &GlobalOpts) -> Result<Self, CliError> {
        let config = liveroom_config::load_config()?;
        Self::from_config(config, global)
    }

    pub fn from_config(mut config: Config, global: &GlobalOpts) -> Result<Self, CliError> {
        if let Some(ref server) = global.server {
            config.server.clone_from(server);
        }
        if let Some(timeout) = global.timeout {
            config.timeout = timeout;
        }
        if global.insecure {
            config.insecure = true;
        }

        let format = match global.output {
            Some(format) => format,
            None => parse_choice::<OutputFormat>("output", &config.output)?,
        };
        let color_mode = match global.color {
            Some(mode) => mode,
            None => parse_choice::<ColorMode>("color", &config.color)?,
        };

        Ok(Self {
            config,
            format,
            color: output::should_color(color_mode),
            quiet: global.quiet,
        })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeout)
    }

    pub fn print(&self, rendered: &str) {
        output::print_output(rendered, self.quiet);
    }
}

/// Parse a clap value enum from a config string.
pub fn parse_choice<E: ValueEnum>(field: &str, value: &str) -> Result<E, CliError> {
    E::from_str(value, true).map_err(|_| CliError::Validation {
        field: field.into(),
        reason: format!("unknown value '{value}'"),
    })
}

/// Resolve a room identifier (id, streamer name or room title) via a fresh list pull.
pub async fn resolve_room<T: Transport>(
    transport: &T,
    identifier: &str,
) -> Result<RoomSummary, CliError> {
    let rooms: Vec<RoomSummary> = transport
        .list_lives()
        .await?
        .into_iter()
        .map(RoomSummary::from)
        .collect();
    find_room(rooms, identifier).ok_or_else(|| CliError::NotFound {
        identifier: identifier.into(),
    })
}

/// Exact id match wins over a name or title match.
fn find_room(rooms: Vec<RoomSummary>, identifier: &str) -> Option<RoomSummary> {
    if let Some(room) = rooms.iter().find(|r| r.id.as_str() == identifier) {
        return Some(room.clone());
    }
    rooms
        .into_iter()
        .find(|r| r.name == identifier || r.room_name == identifier)
}
