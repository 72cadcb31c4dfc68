//! Command handler table
//!
//! Each [`CommandKind`] maps to one handler. Handlers run on the supervisor
//! task with exclusive access to its state, so they never interleave with a
//! tick. Thermal protection is never bypassed: anything that could energize
//! the lights checks the lockout first.

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::time::Instant;
use tracing::info;

use super::{Command, CommandKind};
use crate::error::CommandError;
use crate::hardware::{display, settle, HardwareError};
use crate::supervisor::Supervisor;

type CommandResult = Result<(), CommandError>;

/// Handler signature: exclusive supervisor access plus the decoded command
pub type Handler = for<'a> fn(&'a mut Supervisor, &'a Command) -> BoxFuture<'a, CommandResult>;

/// Kind-to-handler lookup table
pub const HANDLERS: [(CommandKind, Handler); 8] = [
    (CommandKind::PowerOn, power_on),
    (CommandKind::PowerOff, power_off),
    (CommandKind::Test, select_test_position),
    (CommandKind::FullTestCycle, full_test_cycle),
    (CommandKind::OverrideTemperature, override_temperature),
    (CommandKind::SetRunIndex, set_run_index),
    (CommandKind::ForceStartupSequence, force_startup_sequence),
    (CommandKind::ForceShutdownSequence, force_shutdown_sequence),
];

pub fn handler_for(kind: CommandKind) -> Option<Handler> {
    HANDLERS.iter().find(|(k, _)| *k == kind).map(|(_, handler)| *handler)
}

fn failed(kind: CommandKind) -> impl FnOnce(HardwareError) -> CommandError {
    move |source| CommandError::Hardware {
        command: kind.name(),
        source,
    }
}

fn mismatched(kind: CommandKind, command: &Command) -> CommandError {
    CommandError::InvalidArgument {
        command: kind.name(),
        reason: format!("handler received {}", command),
    }
}

fn power_on<'a>(sup: &'a mut Supervisor, _: &'a Command) -> BoxFuture<'a, CommandResult> {
    async move {
        let kind = CommandKind::PowerOn;
        sup.check_lockout(kind)?;

        let hw = sup.actuators();
        sup.state.power.set_relay(&*hw, true).await.map_err(failed(kind))?;
        info!("main relay energized by command");
        Ok(())
    }
    .boxed()
}

fn power_off<'a>(sup: &'a mut Supervisor, _: &'a Command) -> BoxFuture<'a, CommandResult> {
    async move {
        let hw = sup.actuators();
        sup.state
            .power
            .set_relay(&*hw, false)
            .await
            .map_err(failed(CommandKind::PowerOff))?;
        info!("main relay cut by command");
        Ok(())
    }
    .boxed()
}

fn select_test_position<'a>(sup: &'a mut Supervisor, command: &'a Command) -> BoxFuture<'a, CommandResult> {
    async move {
        let kind = CommandKind::Test;
        let &Command::Test { position } = command else {
            return Err(mismatched(kind, command));
        };

        let (lower, count) = (sup.state.phase.lower(), sup.state.phase.count());
        if !(lower..=count).contains(&position) {
            return Err(CommandError::InvalidArgument {
                command: kind.name(),
                reason: format!("phase index {} outside {}..={}", position, lower, count),
            });
        }
        sup.check_lockout(kind)?;

        let hw = sup.actuators();
        sup.state.power.start(&*hw).await.map_err(failed(kind))?;
        sup.state.phase.select(&*hw, position).await.map_err(failed(kind))?;
        info!(position, "test position selected");
        Ok(())
    }
    .boxed()
}

fn full_test_cycle<'a>(sup: &'a mut Supervisor, _: &'a Command) -> BoxFuture<'a, CommandResult> {
    async move {
        let kind = CommandKind::FullTestCycle;
        sup.check_lockout(kind)?;

        let hw = sup.actuators();
        let (lower, count) = (sup.state.phase.lower(), sup.state.phase.count());
        let (step, keepalive) = (sup.settings.test_step, sup.settings.watchdog);
        info!(lower, count, step_secs = step.as_secs(), "🔦 Full test cycle started");

        sup.state.power.start(&*hw).await.map_err(failed(kind))?;
        for position in lower..=count {
            sup.state.phase.select(&*hw, position).await.map_err(failed(kind))?;
            settle(&*hw, step, keepalive).await;
        }
        sup.state.phase.select(&*hw, 0).await.map_err(failed(kind))?;

        // Hand control straight back to the schedule
        sup.state.manual_hold_until = None;
        info!("full test cycle complete");
        Ok(())
    }
    .boxed()
}

fn override_temperature<'a>(sup: &'a mut Supervisor, command: &'a Command) -> BoxFuture<'a, CommandResult> {
    async move {
        let kind = CommandKind::OverrideTemperature;
        let &Command::OverrideTemperature { channel, value } = command else {
            return Err(mismatched(kind, command));
        };

        if sup.state.thermal.state(channel).is_none() {
            return Err(CommandError::InvalidArgument {
                command: kind.name(),
                reason: format!("channel {} is not monitored", channel),
            });
        }

        sup.state.overrides.record(channel, value, Instant::now().into_std());
        info!(
            channel = %channel,
            value,
            ttl_secs = sup.settings.override_ttl.as_secs(),
            "temperature override recorded"
        );
        Ok(())
    }
    .boxed()
}

fn set_run_index<'a>(sup: &'a mut Supervisor, command: &'a Command) -> BoxFuture<'a, CommandResult> {
    async move {
        let kind = CommandKind::SetRunIndex;
        let &Command::SetRunIndex { index } = command else {
            return Err(mismatched(kind, command));
        };

        sup.actuators()
            .send_display_command(display::FOREGROUND_RUN_INDEX, index)
            .await
            .map_err(failed(kind))?;
        info!(index, "foreground run index set");
        Ok(())
    }
    .boxed()
}

fn force_startup_sequence<'a>(sup: &'a mut Supervisor, _: &'a Command) -> BoxFuture<'a, CommandResult> {
    async move {
        let kind = CommandKind::ForceStartupSequence;
        sup.check_lockout(kind)?;

        let hw = sup.actuators();
        sup.state.power.startup_sequence(&*hw).await.map_err(failed(kind))?;
        info!("forced startup sequence complete");
        Ok(())
    }
    .boxed()
}

fn force_shutdown_sequence<'a>(sup: &'a mut Supervisor, _: &'a Command) -> BoxFuture<'a, CommandResult> {
    async move {
        let hw = sup.actuators();
        sup.state
            .power
            .shutdown_sequence(&*hw)
            .await
            .map_err(failed(CommandKind::ForceShutdownSequence))?;
        info!("forced shutdown sequence complete");
        Ok(())
    }
    .boxed()
}
