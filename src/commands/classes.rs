use crate::Context;
use crate::cli::ClassesArgs;
use crate::commands::{connect, fail};
use crate::config::Settings;
use crate::runner::ShellDeploy;
use crate::ui;
use anyhow::Result;
use reconcile::{ClassEdit, EditOutcome, edit_classes};
use serde_json::Value;

impl From<ClassesArgs> for ClassEdit {
    fn from(args: ClassesArgs) -> Self {
        Self {
            group: args.group_name,
            class: args.class_name,
            param: args.param_name,
            value: args.param_value.map(Value::String),
            delete_class: args.delete_class,
            delete_param: args.delete_param,
            rule: args.rule,
            rule_mode: args.rule_mode,
            smart_update: args.smart_update,
        }
    }
}

pub fn run(ctx: &Context, settings: &Settings, args: ClassesArgs) -> Result<()> {
    let edit = ClassEdit::from(args);
    let client = connect(ctx, settings)?;
    let deployer = ShellDeploy::new(settings.deploy_command.clone());

    match edit_classes(&client, &deployer, &edit).map_err(fail)? {
        EditOutcome::Saved { .. } => ui::success(&format!("{}: changes saved", edit.group)),
        EditOutcome::UpToDate => {
            if !ctx.quiet {
                ui::info(&format!("{}: already up-to-date", edit.group));
            }
        }
    }
    Ok(())
}
