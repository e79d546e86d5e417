use super::{command_builder, render_value, with_values, Command, CommandState};
use crate::core::{QueryKitError, Result};

/// `INSERT INTO <table> (<cols>) VALUES (<vals>)` built from the ordered value map.
#[derive(Debug, Clone, Default)]
pub struct Insert {
    state: CommandState,
}

command_builder!(Insert);
with_values!(Insert);

impl Insert {
    pub fn new() -> Self {
        Insert::default()
    }
}

impl Command for Insert {
    fn state(&self) -> &CommandState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut CommandState {
        &mut self.state
    }

    fn returns_generated_key(&self) -> bool {
        true
    }

    fn to_sql(&self) -> Result<String> {
        let table = self.state.require_table("INSERT")?;
        let values = self.state.values();
        if values.is_empty() {
            return Err(QueryKitError::CommandIncomplete(format!(
                "INSERT INTO {} has no values",
                table
            )));
        }

        let quoting = self.state.quoting();
        let columns: Vec<String> = values.iter().map(|(key, _)| quoting.enclose(key)).collect();
        let rendered: Vec<String> = values.iter().map(|(_, value)| render_value(value)).collect();

        Ok(format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quoting.enclose(table),
            columns.join(","),
            rendered.join(",")
        ))
    }
}
