use duckdb::{Row, ToSql};
use serde::{Deserialize, Serialize};

use super::{Entity, FieldDef};
use crate::schema::ColumnKind;

/// Declares a record struct whose fields are its table's columns, in order,
/// together with its [`Entity`] impl.
macro_rules! entity {
    (
        $(#[$meta:meta])*
        pub struct $name:ident in $table:literal as $label:literal keyed by $key:ident {
            $($field:ident : $ty:ty => $kind:ident),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
        pub struct $name {
            $(pub $field: $ty,)*
        }

        impl Entity for $name {
            const TABLE: &'static str = $table;
            const KEY: &'static str = stringify!($key);
            const LABEL: &'static str = $label;
            const COLUMNS: &'static [FieldDef] = &[
                $(FieldDef { name: stringify!($field), kind: ColumnKind::$kind },)*
            ];

            fn key(&self) -> i64 {
                self.$key
            }

            fn from_row(row: &Row<'_>) -> duckdb::Result<Self> {
                Ok(Self {
                    $($field: row.get(stringify!($field))?,)*
                })
            }

            fn params(&self) -> Vec<&dyn ToSql> {
                vec![$(&self.$field as &dyn ToSql,)*]
            }
        }
    };
}

entity! {
    /// Study participant group, keyed by article.
    pub struct People in "people" as "Person" keyed by id_article {
        blank: Option<i64> => Integer,
        id_article: i64 => Integer,
        doi: Option<String> => Text,
        id_group: Option<i64> => Integer,
        id_subgroup: Option<f64> => Float,
        control_experimental: Option<String> => Text,
        id_disease: Option<i64> => Integer,
        id_drug: Option<i64> => Integer,
        intakeperiod: Option<String> => Text,
        id_additive: Option<i64> => Integer,
        id_diet: Option<i64> => Integer,
        id_activity: Option<i64> => Integer,
        physique_level: Option<String> => Text,
        sex: Option<String> => Text,
        age_min: Option<f64> => Float,
        age_max: Option<f64> => Float,
        physique_stage: Option<String> => Text,
        weight_min: Option<f64> => Float,
        weight_max: Option<f64> => Float,
        bmi_min: Option<f64> => Float,
        bmi_max: Option<f64> => Float,
        country: Option<String> => Text,
        alcohol: Option<String> => Text,
        smoking: Option<String> => Text,
        pregnancy_lactation: Option<String> => Text,
        additional_information: Option<String> => Text,
        author: Option<String> => Text,
    }
}

entity! {
    /// Abundance change of one taxon observed in a study group.
    pub struct Microorganisms in "microorganisms" as "Microorganism" keyed by id_microorganisms {
        blank: Option<i64> => Integer,
        id_microorganisms: i64 => Integer,
        id_taxon: Option<i64> => Integer,
        taxonname: Option<String> => Text,
        id_group: Option<i64> => Integer,
        id_subgroup: Option<f64> => Float,
        quantity: Option<f64> => Float,
        units: Option<String> => Text,
        significance: Option<f64> => Float,
        type_of_value: Option<String> => Text,
        change_in_abundance: Option<String> => Text,
        relative_change: Option<f64> => Float,
    }
}

entity! {
    /// Supplement given in a study.
    pub struct Additives in "additives" as "Additive" keyed by id_additive {
        blank: Option<i64> => Integer,
        id_article: Option<i64> => Integer,
        doi: Option<String> => Text,
        id_additive: i64 => Integer,
        id_supplement: Option<i64> => Integer,
        additive_type: Option<String> => Text,
        ad_category: Option<String> => Text,
        composition: Option<String> => Text,
        dose: Option<String> => Text,
        frequency: Option<String> => Text,
        ad_consumption_time: Option<String> => Text,
    }
}

/// One row of the `task_table` snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub taxonname: Option<String>,
    pub composition: Option<String>,
    pub change_in_abundance: Option<String>,
    pub frequency: Option<String>,
    pub additive_type: Option<String>,
}

impl Task {
    pub const COLUMNS: &'static str =
        "taxonname, composition, change_in_abundance, frequency, additive_type";

    pub fn from_row(row: &Row<'_>) -> duckdb::Result<Self> {
        Ok(Self {
            taxonname: row.get(0)?,
            composition: row.get(1)?,
            change_in_abundance: row.get(2)?,
            frequency: row.get(3)?,
            additive_type: row.get(4)?,
        })
    }
}
