use crate::Context;
use crate::cli::BatchArgs;
use crate::commands::{connect, fail};
use crate::config::Settings;
use crate::progress::BatchReporter;
use crate::runner::ShellDeploy;
use crate::ui;
use anyhow::Result;
use reconcile::{BatchOptions, BatchRunner, load_document};
use std::time::Duration;

pub fn run(ctx: &Context, settings: &Settings, args: BatchArgs) -> Result<()> {
    // read the document before touching the network so input errors surface first
    let doc = load_document(args.yaml_file.as_deref(), args.json_file.as_deref()).map_err(fail)?;
    if doc.is_empty() {
        ui::warn("Document lists no groups, nothing to do");
        return Ok(());
    }

    let client = connect(ctx, settings)?;
    let deployer = ShellDeploy::new(settings.deploy_command.clone());
    let options = BatchOptions {
        smart_update: args.smart_update,
        settle: args.settle.map_or(settings.settle, Duration::from_secs),
    };

    let runner = BatchRunner::new(&client, &deployer, options);
    let mut reporter = BatchReporter::new(ctx.quiet);
    let summary = runner.run(&doc, &mut reporter).map_err(fail)?;

    if !ctx.quiet {
        println!();
        ui::success(&format!(
            "{} group(s) processed: {} change(s) saved, {} already up to date",
            summary.groups, summary.writes, summary.up_to_date
        ));
    }
    Ok(())
}
