//! Declarative `Entity` implementation.
//!
//! ```ignore
//! #[derive(Debug, Clone, Default)]
//! pub struct Teacher {
//!     pub id: i64,
//!     pub name: String,
//!     pub sex: u8,
//!     pub created_at: Option<i64>,
//! }
//!
//! txmapper_core::impl_entity!(Teacher {
//!     table: "demo_teacher",
//!     key: id,
//!     backend: "school",
//!     fields: [id, name, sex, created_at => "create_time"],
//! });
//! ```
//!
//! Every struct field must be listed; field types implement `ColumnValue`,
//! `FromSql` and `Default`, and the key field implements `GeneratedKey`.
//! The key column is the key field's column, so a renamed key field
//! (`id => "tag_id"`) keys on `tag_id`.

#[macro_export]
macro_rules! impl_entity {
    (@column $field:ident) => {
        stringify!($field)
    };
    (@column $field:ident $column:literal) => {
        $column
    };
    (
        $ty:ident {
            table: $table:literal,
            key: $key:ident,
            $(backend: $backend:literal,)?
            fields: [$($field:ident $(=> $column:literal)?),+ $(,)?] $(,)?
        }
    ) => {
        impl $crate::model::entity::Entity for $ty {
            fn table_name() -> &'static str {
                $table
            }

            fn primary_key() -> &'static str {
                const KEY: &str = stringify!($key);
                const FIELD_COLUMNS: &[(&str, &str)] = &[$(
                    (stringify!($field), $crate::impl_entity!(@column $field $($column)?))
                ),+];
                FIELD_COLUMNS
                    .iter()
                    .find(|(field, _)| *field == KEY)
                    .map_or(KEY, |(_, column)| *column)
            }

            fn backend() -> Option<&'static str> {
                #[allow(unused_mut)]
                let mut backend = None;
                $(backend = Some($backend);)?
                backend
            }

            fn columns() -> &'static [&'static str] {
                &[$($crate::impl_entity!(@column $field $($column)?)),+]
            }

            fn fields(&self) -> Vec<$crate::model::entity::Field> {
                vec![$(
                    $crate::model::entity::Field::new(
                        $crate::impl_entity!(@column $field $($column)?),
                        &self.$field,
                    )
                ),+]
            }

            fn from_row(row: &$crate::rusqlite::Row<'_>) -> $crate::rusqlite::Result<Self> {
                Ok(Self {
                    $($field: $crate::model::entity::decode_column(
                        row,
                        $crate::impl_entity!(@column $field $($column)?),
                    )?,)+
                })
            }

            fn assign_generated_key(&mut self, row_id: i64) {
                $crate::model::entity::GeneratedKey::assign_row_id(&mut self.$key, row_id);
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use crate::model::entity::Entity;

    #[derive(Debug, Clone, Default)]
    struct Tag {
        id: i64,
        name: String,
        created_at: Option<i64>,
    }

    crate::impl_entity!(Tag {
        table: "tag",
        key: id,
        fields: [id => "tag_id", name, created_at => "create_time"],
    });

    #[test]
    fn renamed_key_field_keys_on_its_column() {
        assert_eq!(Tag::primary_key(), "tag_id");
        assert_eq!(Tag::columns(), &["tag_id", "name", "create_time"]);

        let tag = Tag {
            id: 9,
            ..Tag::default()
        };
        let key = tag.key_field().unwrap();
        assert_eq!(key.column, "tag_id");
        assert!(key.is_set);
    }
}
