pub mod csv_table;
pub mod encoding;
pub mod rows;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};

use crate::error::{AppError, AppResult};

pub use csv_table::CsvTable;

/// A domain record that can be persisted as one row of a flat table.
pub trait Record: Clone + Send + Sync + 'static {
    type Row: Serialize + DeserializeOwned;

    /// Human name used in `NotFound` messages and logs.
    const KIND: &'static str;
    const HEADERS: &'static [&'static str];

    fn id(&self) -> i64;
    fn to_row(&self) -> Self::Row;
    fn from_row(row: Self::Row) -> anyhow::Result<Self>;
}

pub type Build<T> = Box<dyn FnOnce(i64) -> T + Send>;
pub type Mutate<T> = Box<dyn FnOnce(&mut T) -> AppResult<()> + Send>;
pub type Guard<T> = Box<dyn FnOnce(&T) -> AppResult<()> + Send>;

/// Storage seam for a collection. Every mutating call runs its closure inside
/// the collection's exclusive section, so checks made there see the same
/// state that gets written back.
#[async_trait]
pub trait Repository<T: Record>: Send + Sync {
    /// All records in storage (insertion) order.
    async fn list(&self) -> AppResult<Vec<T>>;

    async fn get(&self, id: i64) -> AppResult<Option<T>>;

    /// Assign `max(id) + 1` (or 1) and store the record `build` returns for it.
    async fn insert(&self, build: Build<T>) -> AppResult<T>;

    /// `NotFound` if absent; otherwise apply `mutate` and persist. An `Err`
    /// from `mutate` aborts without writing.
    async fn update(&self, id: i64, mutate: Mutate<T>) -> AppResult<T>;

    /// Remove the record if `guard` allows it. Returns `false` when there was
    /// nothing to remove; the guard is not consulted in that case.
    async fn delete(&self, id: i64, guard: Guard<T>) -> AppResult<bool>;
}

/// `max(id) + 1`, or 1 for an empty collection. A hand-edited file holding
/// `i64::MAX` has no successor; that is reported rather than wrapped.
pub fn next_id<T: Record>(records: &[T]) -> AppResult<i64> {
    match records.iter().map(Record::id).max() {
        None => Ok(1),
        Some(max) => max.checked_add(1).ok_or_else(|| {
            AppError::Internal(anyhow::anyhow!("{} ids are exhausted (largest is {max})", T::KIND))
        }),
    }
}
