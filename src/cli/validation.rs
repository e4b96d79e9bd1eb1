use crate::cli::args::{CliArgs, Command};
use crate::output::OutputFormat;

fn check_format(raw: Option<&str>) -> Result<(), String> {
    if let Some(raw) = raw {
        if OutputFormat::parse(raw).is_none() {
            return Err(format!("invalid --format '{raw}', expected text or json"));
        }
    }
    Ok(())
}

fn check_id(id: &str) -> Result<(), String> {
    let id = id.trim();
    if id.is_empty() {
        return Err("record id must not be empty".to_string());
    }
    // The id is embedded in an `id=eq.<id>` filter.
    if id.contains(',') || id.contains('(') || id.contains(')') {
        return Err(format!("invalid record id '{id}'"));
    }
    Ok(())
}

pub fn validate(args: &CliArgs) -> Result<(), String> {
    if let Some(timeout) = args.timeout {
        if timeout == 0 {
            return Err("invalid timeout, expected positive integer".to_string());
        }
    }
    if let Some(table) = args.table.as_deref() {
        if table.trim().is_empty() || table.contains('/') {
            return Err(format!("invalid table name '{table}'"));
        }
    }
    match &args.command {
        Command::List(list) => check_format(list.render.format.as_deref())?,
        Command::Show { id, render } => {
            check_id(id)?;
            check_format(render.format.as_deref())?;
        }
        Command::Edit { id, fields } => {
            check_id(id)?;
            if fields.is_empty() {
                return Err("nothing to change, pass at least one field flag".to_string());
            }
        }
        Command::Delete { id, .. } => check_id(id)?,
        Command::Diagnose { format } => check_format(format.as_deref())?,
        Command::Cities | Command::Add(_) | Command::Browse | Command::InitConfig => {}
    }
    Ok(())
}
