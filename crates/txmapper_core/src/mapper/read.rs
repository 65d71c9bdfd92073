use super::{Mapper, MapperResult, Page, PageRequest};
use crate::model::entity::{ColumnMap, ColumnValue, Entity};
use crate::query::{self, Condition, ReadOptions, Window};
use rusqlite::types::Value;

impl<T: Entity> Mapper<'_, T> {
    pub fn select_by_id<K: ColumnValue + ?Sized>(
        &self,
        id: &K,
        options: &ReadOptions<'_>,
    ) -> MapperResult<Option<T>> {
        let condition = Condition::by_key(T::primary_key(), id.to_value());
        self.select_one(&condition, options)
    }

    pub fn select_by_ids<K: ColumnValue>(
        &self,
        ids: &[K],
        options: &ReadOptions<'_>,
    ) -> MapperResult<Vec<T>> {
        let values = ids.iter().map(ColumnValue::to_value).collect();
        let condition = Condition::by_keys(T::primary_key(), values);
        self.select(&condition, options)
    }

    /// First row equal to every set field of `filter`.
    pub fn select_one_by_condition(
        &self,
        filter: &T,
        options: &ReadOptions<'_>,
    ) -> MapperResult<Option<T>> {
        self.select_one(&Condition::from_entity(filter), options)
    }

    pub fn select_by_condition(
        &self,
        filter: &T,
        options: &ReadOptions<'_>,
    ) -> MapperResult<Vec<T>> {
        self.select(&Condition::from_entity(filter), options)
    }

    pub fn select_one_by_map(
        &self,
        filter: &ColumnMap,
        options: &ReadOptions<'_>,
    ) -> MapperResult<Option<T>> {
        self.select_one(&Condition::from_map::<T>(filter)?, options)
    }

    pub fn select_by_map(
        &self,
        filter: &ColumnMap,
        options: &ReadOptions<'_>,
    ) -> MapperResult<Vec<T>> {
        self.select(&Condition::from_map::<T>(filter)?, options)
    }

    pub fn select_one_by_where(
        &self,
        predicate: &str,
        args: Vec<Value>,
        options: &ReadOptions<'_>,
    ) -> MapperResult<Option<T>> {
        self.select_one(&Condition::raw(predicate, args), options)
    }

    pub fn select_by_where(
        &self,
        predicate: &str,
        args: Vec<Value>,
        options: &ReadOptions<'_>,
    ) -> MapperResult<Vec<T>> {
        self.select(&Condition::raw(predicate, args), options)
    }

    pub fn count_by_condition(&self, filter: &T) -> MapperResult<u64> {
        self.count(&Condition::from_entity(filter))
    }

    pub fn count_by_map(&self, filter: &ColumnMap) -> MapperResult<u64> {
        self.count(&Condition::from_map::<T>(filter)?)
    }

    pub fn count_by_where(&self, predicate: &str, args: Vec<Value>) -> MapperResult<u64> {
        self.count(&Condition::raw(predicate, args))
    }

    pub fn select_page_by_condition(
        &self,
        filter: &T,
        page: PageRequest,
        options: &ReadOptions<'_>,
    ) -> MapperResult<Page<T>> {
        self.select_page(&Condition::from_entity(filter), page, options)
    }

    pub fn select_page_by_map(
        &self,
        filter: &ColumnMap,
        page: PageRequest,
        options: &ReadOptions<'_>,
    ) -> MapperResult<Page<T>> {
        self.select_page(&Condition::from_map::<T>(filter)?, page, options)
    }

    pub fn select_page_by_where(
        &self,
        predicate: &str,
        args: Vec<Value>,
        page: PageRequest,
        options: &ReadOptions<'_>,
    ) -> MapperResult<Page<T>> {
        self.select_page(&Condition::raw(predicate, args), page, options)
    }

    /// Runs any prepared condition.
    pub fn select(&self, condition: &Condition, options: &ReadOptions<'_>) -> MapperResult<Vec<T>> {
        let statement =
            query::select(T::table_name(), T::columns(), condition, options, None)?;
        self.run(|conn| Ok(query::query_entities(conn, &statement)?))
    }

    pub fn select_one(
        &self,
        condition: &Condition,
        options: &ReadOptions<'_>,
    ) -> MapperResult<Option<T>> {
        let window = Window {
            limit: 1,
            offset: 0,
        };
        let statement = query::select(
            T::table_name(),
            T::columns(),
            condition,
            options,
            Some(window),
        )?;
        let rows = self.run(|conn| Ok(query::query_entities::<T>(conn, &statement)?))?;
        Ok(rows.into_iter().next())
    }

    pub fn count(&self, condition: &Condition) -> MapperResult<u64> {
        let statement = query::count(T::table_name(), condition)?;
        self.run(|conn| Ok(query::query_count(conn, &statement)?))
    }

    /// Counts first and skips the page query when nothing matches.
    pub fn select_page(
        &self,
        condition: &Condition,
        page: PageRequest,
        options: &ReadOptions<'_>,
    ) -> MapperResult<Page<T>> {
        let window = page.window()?;
        let count = query::count(T::table_name(), condition)?;
        let select = query::select(
            T::table_name(),
            T::columns(),
            condition,
            options,
            Some(window),
        )?;
        self.run(|conn| {
            let total = query::query_count(conn, &count)?;
            if total == 0 {
                return Ok(Page::empty(page));
            }
            let rows = query::query_entities(conn, &select)?;
            Ok(Page {
                total,
                number: page.number,
                size: page.size,
                rows,
            })
        })
    }
}
