use crate::Context;
use crate::commands::connect;
use crate::config::Settings;
use crate::progress;
use anyhow::{Context as _, Result};

pub fn run(ctx: &Context, settings: &Settings) -> Result<()> {
    let client = connect(ctx, settings)?;

    let pb = (!ctx.quiet).then(|| progress::spinner("Refreshing classes..."));
    let result = client
        .refresh_classes()
        .context("Could not refresh classes");
    match (&pb, &result) {
        (Some(pb), Ok(())) => progress::finish_success(pb, "Classes refreshed"),
        (Some(pb), Err(_)) => progress::finish_error(pb, "Class refresh failed"),
        (None, _) => {}
    }
    result
}
