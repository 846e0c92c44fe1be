use duckdb::Connection;
use tracing::debug;

use crate::entity::{Additives, Entity, Microorganisms, People};
use crate::error::Result;
use crate::schema::{create_keyed_table_sql, Column};
use crate::view::{TASK_SOURCE, TASK_TABLE};

/// Join behind `task_table`: each microorganism observation paired with the
/// additive given to the matching study group.
const TASK_SOURCE_SQL: &str = "
    SELECT m.taxonname,
           a.composition,
           m.change_in_abundance,
           a.frequency,
           a.additive_type
    FROM microorganisms m
    JOIN people p
      ON p.id_group = m.id_group
     AND p.id_subgroup = m.id_subgroup
    JOIN additives a
      ON a.id_additive = p.id_additive";

/// Idempotent DDL for the entity tables, the task join and its snapshot table.
pub fn apply(conn: &Connection) -> Result<()> {
    create_entity_table::<People>(conn)?;
    create_entity_table::<Microorganisms>(conn)?;
    create_entity_table::<Additives>(conn)?;

    conn.execute_batch(&format!(
        "CREATE OR REPLACE VIEW {TASK_SOURCE} AS {TASK_SOURCE_SQL};"
    ))?;
    // Snapshot starts empty; only an explicit refresh fills it.
    conn.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS {TASK_TABLE} AS SELECT * FROM {TASK_SOURCE} LIMIT 0;"
    ))?;

    debug!("bootstrap schema applied");
    Ok(())
}

fn create_entity_table<E: Entity>(conn: &Connection) -> Result<()> {
    let cols: Vec<Column> = E::COLUMNS
        .iter()
        .map(|f| Column::new(f.name, f.kind))
        .collect();
    conn.execute_batch(&create_keyed_table_sql(E::TABLE, &cols, E::KEY))?;
    Ok(())
}
