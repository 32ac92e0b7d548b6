use crate::Context;
use crate::cli::GroupsArgs;
use crate::commands::{connect, fail};
use crate::config::Settings;
use crate::ui;
use anyhow::Result;
use reconcile::{EditOutcome, GroupEdit, edit_group};

impl From<GroupsArgs> for GroupEdit {
    fn from(args: GroupsArgs) -> Self {
        Self {
            group: args.group_name,
            environment: args.environment,
            environment_trumps: args.environment_trumps.then_some(true),
            rule: args.rule,
            rule_mode: args.rule_mode,
        }
    }
}

pub fn run(ctx: &Context, settings: &Settings, args: GroupsArgs) -> Result<()> {
    let edit = GroupEdit::from(args);
    let client = connect(ctx, settings)?;

    match edit_group(&client, &edit).map_err(fail)? {
        EditOutcome::Saved { writes } => {
            ui::success(&format!("{}: {writes} change(s) saved", edit.group));
        }
        EditOutcome::UpToDate => {
            if !ctx.quiet {
                ui::info(&format!("{}: already up-to-date", edit.group));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Command};
    use clap::Parser;
    use reconcile::RuleMode;

    fn parse(args: &[&str]) -> GroupEdit {
        let cli = Cli::try_parse_from(args).unwrap();
        let Command::Groups(args) = cli.command else {
            panic!("Expected groups command");
        };
        GroupEdit::from(args)
    }

    #[test]
    fn test_trumps_flag_only_when_given() {
        let edit = parse(&["ncedit", "groups", "--group-name", "Prod", "--environment", "production"]);
        assert_eq!(edit.environment.as_deref(), Some("production"));
        assert_eq!(edit.environment_trumps, None);
        assert_eq!(edit.rule_mode, RuleMode::Append);

        let edit = parse(&["ncedit", "groups", "--group-name", "Prod", "--environment-trumps"]);
        assert_eq!(edit.environment_trumps, Some(true));
    }
}
