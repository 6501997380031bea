//! Scriptable Definitions
//!
//! Sequences and stored procedures are engine-neutral data here; rendering
//! them into concrete creation/drop statements is the adapter layer's job,
//! expressed through the `ScriptDialect` capability trait. This keeps
//! dialect knowledge behind static dispatch instead of runtime lookup of
//! dialect helpers.

use serde::{Deserialize, Serialize};

use crate::constants::{SEQUENCE_INCREMENT_DEFAULT, SEQUENCE_START_DEFAULT};
use crate::error::DataResult;

use super::column::DataType;

// =============================================================================
// Definitions
// =============================================================================

/// Engine-neutral description of a number sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceDef {
    /// Sequence name.
    pub name: String,
    /// First value issued.
    pub start: i64,
    /// Step between issued values.
    pub increment: i64,
}

impl SequenceDef {
    /// Create a sequence definition with default start and increment.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            start: SEQUENCE_START_DEFAULT,
            increment: SEQUENCE_INCREMENT_DEFAULT,
        }
    }

    /// Set the first issued value.
    #[must_use]
    pub fn with_start(mut self, start: i64) -> Self {
        self.start = start;
        self
    }

    /// Set the step between issued values.
    #[must_use]
    pub fn with_increment(mut self, increment: i64) -> Self {
        self.increment = increment;
        self
    }
}

/// One parameter of a stored procedure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcedureParam {
    /// Parameter name.
    pub name: String,
    /// Declared type.
    pub data_type: DataType,
}

/// Engine-neutral description of a stored procedure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcedureDef {
    /// Procedure name.
    pub name: String,
    /// Ordered parameter list.
    pub parameters: Vec<ProcedureParam>,
}

impl ProcedureDef {
    /// Create a procedure definition without parameters.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: Vec::new(),
        }
    }

    /// Append a parameter.
    #[must_use]
    pub fn with_param(mut self, name: impl Into<String>, data_type: DataType) -> Self {
        self.parameters.push(ProcedureParam {
            name: name.into(),
            data_type,
        });
        self
    }
}

// =============================================================================
// Scripting
// =============================================================================

/// Adapter-implemented rendering of creation/drop statements.
///
/// Each backend adapter that supports server-side sequences or procedures
/// implements this once; the engine-neutral definitions stay free of
/// dialect knowledge.
pub trait ScriptDialect {
    /// Render the statement that creates a sequence.
    fn create_sequence(&self, def: &SequenceDef) -> DataResult<String>;

    /// Render the statement that drops a sequence.
    fn drop_sequence(&self, def: &SequenceDef) -> DataResult<String>;

    /// Render the statement that creates a procedure.
    fn create_procedure(&self, def: &ProcedureDef) -> DataResult<String>;

    /// Render the statement that drops a procedure.
    fn drop_procedure(&self, def: &ProcedureDef) -> DataResult<String>;
}

/// A definition capable of producing creation/drop statements through a
/// dialect.
pub trait Scriptable {
    /// Render this object's creation statement.
    fn create_statement(&self, dialect: &dyn ScriptDialect) -> DataResult<String>;

    /// Render this object's drop statement.
    fn drop_statement(&self, dialect: &dyn ScriptDialect) -> DataResult<String>;
}

impl Scriptable for SequenceDef {
    fn create_statement(&self, dialect: &dyn ScriptDialect) -> DataResult<String> {
        dialect.create_sequence(self)
    }

    fn drop_statement(&self, dialect: &dyn ScriptDialect) -> DataResult<String> {
        dialect.drop_sequence(self)
    }
}

impl Scriptable for ProcedureDef {
    fn create_statement(&self, dialect: &dyn ScriptDialect) -> DataResult<String> {
        dialect.create_procedure(self)
    }

    fn drop_statement(&self, dialect: &dyn ScriptDialect) -> DataResult<String> {
        dialect.drop_procedure(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct PlainDialect;

    impl ScriptDialect for PlainDialect {
        fn create_sequence(&self, def: &SequenceDef) -> DataResult<String> {
            Ok(format!(
                "CREATE SEQUENCE {} START WITH {} INCREMENT BY {}",
                def.name, def.start, def.increment
            ))
        }

        fn drop_sequence(&self, def: &SequenceDef) -> DataResult<String> {
            Ok(format!("DROP SEQUENCE {}", def.name))
        }

        fn create_procedure(&self, def: &ProcedureDef) -> DataResult<String> {
            Ok(format!(
                "CREATE PROCEDURE {} ({} params)",
                def.name,
                def.parameters.len()
            ))
        }

        fn drop_procedure(&self, def: &ProcedureDef) -> DataResult<String> {
            Ok(format!("DROP PROCEDURE {}", def.name))
        }
    }

    #[test]
    fn test_sequence_scripts_through_dialect() {
        let def = SequenceDef::new("seq_student").with_start(100).with_increment(5);
        let dialect = PlainDialect;
        assert_eq!(
            def.create_statement(&dialect).unwrap(),
            "CREATE SEQUENCE seq_student START WITH 100 INCREMENT BY 5"
        );
        assert_eq!(def.drop_statement(&dialect).unwrap(), "DROP SEQUENCE seq_student");
    }

    #[test]
    fn test_procedure_scripts_through_dialect() {
        let def = ProcedureDef::new("recalc_grades")
            .with_param("id_student", DataType::Integer)
            .with_param("term", DataType::varchar());
        let dialect = PlainDialect;
        assert_eq!(
            def.create_statement(&dialect).unwrap(),
            "CREATE PROCEDURE recalc_grades (2 params)"
        );
    }
}
