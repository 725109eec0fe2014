//! `liveroom config`: inspect and edit the settings file.

use std::str::FromStr;

use liveroom_config::{Config, config_path, update_config_at};
use liveroom_core::{SortColumn, SortOrder};

use crate::cli::{ColorMode, ConfigArgs, ConfigCommand, GlobalOpts, OutputFormat};
use crate::error::CliError;
use crate::output;

use super::util::{Context, parse_choice};

/// One validated `config set` assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Setting {
    Server(String),
    Timeout(u64),
    Insecure(bool),
    PollIntervalMs(u64),
    PushEnabled(bool),
    LogLines(usize),
    Output(String),
    Color(String),
    SortColumn(SortColumn),
    SortOrder(SortOrder),
}

impl Setting {
    fn parse(key: &str, value: &str) -> Result<Self, CliError> {
        let invalid = |reason: String| CliError::Validation {
            field: key.into(),
            reason,
        };
        let setting = match key {
            "server" => {
                let url = url::Url::parse(value).map_err(|e| invalid(e.to_string()))?;
                if !matches!(url.scheme(), "http" | "https") {
                    return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
                }
                Self::Server(value.trim_end_matches('/').to_owned())
            }
            "timeout" => Self::Timeout(parse_positive(value).map_err(invalid)?),
            "poll_interval_ms" => Self::PollIntervalMs(parse_positive(value).map_err(invalid)?),
            "insecure" => Self::Insecure(parse_bool(value).map_err(invalid)?),
            "push_enabled" => Self::PushEnabled(parse_bool(value).map_err(invalid)?),
            "log_lines" => Self::LogLines(
                value
                    .parse()
                    .map_err(|e: std::num::ParseIntError| invalid(e.to_string()))?,
            ),
            "output" => {
                parse_choice::<OutputFormat>(key, value)?;
                Self::Output(value.to_ascii_lowercase())
            }
            "color" => {
                parse_choice::<ColorMode>(key, value)?;
                Self::Color(value.to_ascii_lowercase())
            }
            "sort.column_key" => Self::SortColumn(
                SortColumn::from_str(value).map_err(|_| invalid(format!("unknown column '{value}'")))?,
            ),
            "sort.order" => Self::SortOrder(
                SortOrder::from_str(value).map_err(|_| invalid(format!("unknown order '{value}'")))?,
            ),
            _ => {
                return Err(CliError::Validation {
                    field: "key".into(),
                    reason: format!("unknown config key '{key}'"),
                });
            }
        };
        Ok(setting)
    }

    fn apply(self, cfg: &mut Config) {
        match self {
            Self::Server(v) => cfg.server = v,
            Self::Timeout(v) => cfg.timeout = v,
            Self::Insecure(v) => cfg.insecure = v,
            Self::PollIntervalMs(v) => cfg.poll_interval_ms = v,
            Self::PushEnabled(v) => cfg.push_enabled = v,
            Self::LogLines(v) => cfg.log_lines = v,
            Self::Output(v) => cfg.output = v,
            Self::Color(v) => cfg.color = v,
            Self::SortColumn(v) => cfg.sort.column_key = Some(v),
            Self::SortOrder(v) => cfg.sort.order = Some(v),
        }
    }
}

fn parse_positive(value: &str) -> Result<u64, String> {
    match value.parse::<u64>() {
        Ok(0) => Err("must be greater than zero".into()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}

fn parse_bool(value: &str) -> Result<bool, String> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => Err(format!("expected true or false, got '{value}'")),
    }
}

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Show => {
            let ctx = Context::load(global)?;
            let path = config_path();
            let rendered = output::render_single(
                ctx.format,
                &ctx.config,
                |cfg| {
                    let body = toml::to_string_pretty(cfg).unwrap_or_else(|e| format!("# {e}\n"));
                    format!("# {}\n{}", path.display(), body.trim_end())
                },
                |cfg| cfg.server.clone(),
            )?;
            ctx.print(&rendered);
            Ok(())
        }

        ConfigCommand::Path => {
            output::print_output(&config_path().display().to_string(), global.quiet);
            Ok(())
        }

        ConfigCommand::Set { key, value } => {
            let setting = Setting::parse(&key, &value)?;
            let path = config_path();
            update_config_at(&path, |cfg| setting.apply(cfg))?;
            tracing::info!(%key, path = %path.display(), "config updated");
            if !global.quiet {
                eprintln!("{key} = {value}");
            }
            Ok(())
        }
    }
}
