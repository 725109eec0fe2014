//! Command dispatch: bridges CLI args -> sync engine / transport -> output.

pub mod config_cmd;
pub mod listen;
pub mod lives;
pub mod refresh;
pub mod rooms;
pub mod show;
pub mod util;
pub mod watch;

use std::sync::Arc;

use liveroom_core::{EngineConfig, LiveTransport};

use crate::cli::Command;
use crate::error::CliError;

use self::util::Context;

/// Dispatch a recorder-bound command to the appropriate handler.
pub async fn dispatch(
    cmd: Command,
    transport: Arc<LiveTransport>,
    engine_config: EngineConfig,
    ctx: &Context,
) -> Result<(), CliError> {
    match cmd {
        Command::Lives(args) => lives::handle(transport.as_ref(), &args, ctx).await,
        Command::Show(args) => show::handle(transport.as_ref(), &args, ctx).await,
        Command::Watch(args) => watch::handle(transport, engine_config, &args, ctx).await,
        Command::Refresh(args) => refresh::handle(transport, engine_config, &args, ctx).await,
        Command::Start(args) => listen::start(transport.as_ref(), &args, ctx).await,
        Command::Stop(args) => listen::stop(transport.as_ref(), &args, ctx).await,
        Command::Add(args) => rooms::add(transport.as_ref(), &args, ctx).await,
        Command::Remove(args) => rooms::remove(transport.as_ref(), &args, ctx).await,
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => unreachable!(),
    }
}
