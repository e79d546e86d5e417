use super::{command_builder, render_value, with_values, Command, CommandState};
use crate::core::{QueryKitError, Result};

/// `UPDATE <table> SET <col>=<val>,... [WHERE <filter>]`
#[derive(Debug, Clone, Default)]
pub struct Update {
    state: CommandState,
}

command_builder!(Update);
with_values!(Update);

impl Update {
    pub fn new() -> Self {
        Update::default()
    }
}

impl Command for Update {
    fn state(&self) -> &CommandState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut CommandState {
        &mut self.state
    }

    fn to_sql(&self) -> Result<String> {
        let table = self.state.require_table("UPDATE")?;
        let values = self.state.values();
        if values.is_empty() {
            return Err(QueryKitError::CommandIncomplete(format!(
                "UPDATE {} has no values",
                table
            )));
        }

        let quoting = self.state.quoting();
        let assignments: Vec<String> = values
            .iter()
            .map(|(key, value)| format!("{}={}", quoting.enclose(key), render_value(value)))
            .collect();

        Ok(format!(
            "UPDATE {} SET {}{}",
            quoting.enclose(table),
            assignments.join(","),
            self.state.where_clause()?
        ))
    }
}
