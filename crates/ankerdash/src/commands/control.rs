//! One-shot control commands: set-points, light, quality, stop.

use ankerdash_core::{Heater, VideoQuality};

use crate::cli::{HeaterArg, LightArgs, QualityArg, QualityArgs, Switch, TempArgs};
use crate::config::Context;
use crate::error::CliError;

use super::util::{self, Sent};

pub async fn temp(args: TempArgs, ctx: &Context) -> Result<(), CliError> {
    let heater = match args.heater {
        HeaterArg::Nozzle => Heater::Nozzle,
        HeaterArg::Bed => Heater::Bed,
    };
    util::send_once(ctx, |dash| dash.set_temperature(heater, args.celsius)).await?;

    util::print_sent(
        &Sent {
            command: "temp",
            detail: format!("{heater} target set to {}°C", args.celsius),
        },
        ctx,
    )
}

pub async fn light(args: LightArgs, ctx: &Context) -> Result<(), CliError> {
    let on = args.state == Switch::On;
    util::send_once(ctx, |dash| dash.set_light(on)).await?;

    util::print_sent(
        &Sent {
            command: "light",
            detail: format!("light {}", if on { "on" } else { "off" }),
        },
        ctx,
    )
}

pub async fn quality(args: QualityArgs, ctx: &Context) -> Result<(), CliError> {
    let quality = match args.level {
        QualityArg::Low => VideoQuality::Low,
        QualityArg::High => VideoQuality::High,
    };
    util::send_once(ctx, |dash| dash.set_quality(quality)).await?;

    util::print_sent(
        &Sent {
            command: "quality",
            detail: format!("video quality {quality}"),
        },
        ctx,
    )
}

/// Stop any retract or extrude, whether or not this process started it.
pub async fn stop(ctx: &Context) -> Result<(), CliError> {
    util::send_once(ctx, ankerdash_core::Dashboard::stop_action).await?;

    util::print_sent(
        &Sent {
            command: "stop",
            detail: "material action stopped".into(),
        },
        ctx,
    )
}
