//! Page-at-a-time cursor over a filtered table scan.

use crate::store::{RowKey, StoreResult, TableScanner};

/// Lazy cursor over the matching row keys of a table.
///
/// Each call to [`next_page`](ScanCursor::next_page) fetches and releases
/// one page, so the read phase never holds the whole table in memory. Any
/// backend error fails the whole scan; the cursor carries no partial-result
/// recovery.
pub struct ScanCursor<'a, S: TableScanner> {
    store: &'a S,
    token: Option<S::Token>,
    exhausted: bool,
}

impl<'a, S: TableScanner> ScanCursor<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self {
            store,
            token: None,
            exhausted: false,
        }
    }

    /// Fetch the next page of matching row keys.
    ///
    /// Returns `Ok(None)` once the backend signals no further continuation
    /// token. Pages may be empty when a stretch of the table matched
    /// nothing.
    pub async fn next_page(&mut self) -> StoreResult<Option<Vec<RowKey>>> {
        if self.exhausted {
            return Ok(None);
        }

        let page = self.store.scan_page(self.token.take()).await?;
        match page.next {
            Some(token) => self.token = Some(token),
            None => self.exhausted = true,
        }

        Ok(Some(page.keys))
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::store::{MemoryTable, ScanPage, StoreError};

    #[tokio::test]
    async fn cursor_walks_all_pages_in_order() {
        let table = MemoryTable::new().with_page_size(3);
        for i in 0..10 {
            table.insert(format!("key-{i:02}"), i % 2 == 0);
        }

        let mut cursor = ScanCursor::new(&table);
        let mut keys = Vec::new();
        while let Some(page) = cursor.next_page().await.unwrap() {
            keys.extend(page);
        }

        let expected: Vec<String> = (0..10)
            .filter(|i| i % 2 == 0)
            .map(|i| format!("key-{i:02}"))
            .collect();
        assert_eq!(keys, expected);

        // Exhausted cursor stays exhausted.
        assert!(cursor.next_page().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn empty_table_yields_one_empty_page() {
        let table = MemoryTable::new();
        let mut cursor = ScanCursor::new(&table);

        assert_eq!(cursor.next_page().await.unwrap(), Some(Vec::new()));
        assert!(cursor.next_page().await.unwrap().is_none());
    }

    struct FailingScanner;

    #[async_trait]
    impl TableScanner for FailingScanner {
        type Token = usize;

        async fn scan_page(&self, _start: Option<usize>) -> StoreResult<ScanPage<usize>> {
            Err(StoreError::Backend("connection reset".into()))
        }
    }

    #[tokio::test]
    async fn backend_error_surfaces() {
        let mut cursor = ScanCursor::new(&FailingScanner);
        assert!(cursor.next_page().await.is_err());
    }
}
