use super::{command_builder, Command, CommandState};
use crate::core::Result;

/// `DELETE FROM <table> [WHERE <filter>]`
#[derive(Debug, Clone, Default)]
pub struct Delete {
    state: CommandState,
}

command_builder!(Delete);

impl Delete {
    pub fn new() -> Self {
        Delete::default()
    }
}

impl Command for Delete {
    fn state(&self) -> &CommandState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut CommandState {
        &mut self.state
    }

    fn to_sql(&self) -> Result<String> {
        let table = self.state.require_table("DELETE")?;
        Ok(format!(
            "DELETE FROM {}{}",
            self.state.quoting().enclose(table),
            self.state.where_clause()?
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Filter;
    use crate::core::QueryKitError;

    #[test]
    fn test_delete_renders() {
        let delete = Delete::new()
            .table("users")
            .filter(Filter::new().field("id").eq(5));
        assert_eq!(delete.to_sql().unwrap(), "DELETE FROM users WHERE id =5");
        assert_eq!(Delete::new().table("users").to_sql().unwrap(), "DELETE FROM users");
    }

    #[test]
    fn test_delete_requires_table() {
        assert!(matches!(
            Delete::new().to_sql(),
            Err(QueryKitError::CommandIncomplete(_))
        ));
    }
}
