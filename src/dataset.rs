use std::sync::Arc;

use anyhow::Result;
use blob_store::BlobStorage;
use futures::StreamExt;
use tracing::error;
use uuid::Uuid;

use crate::{
    dataset::{
        enrich::{article_text, cover_image, ArticleFetcher},
        parse::{raw_rows, RawRow},
    },
    http_objects::DatasetRow,
};

pub mod enrich;
pub mod parse;

/// Reads the backing CSV object and serves the list, by-id and
/// by-category views of it. Rows are reconstructed on every request;
/// nothing is cached between calls.
pub struct DatasetService {
    storage: Arc<BlobStorage>,
    dataset_object: String,
    fetcher: Arc<dyn ArticleFetcher>,
}

impl DatasetService {
    pub fn new(
        storage: Arc<BlobStorage>,
        dataset_object: String,
        fetcher: Arc<dyn ArticleFetcher>,
    ) -> Self {
        Self {
            storage,
            dataset_object,
            fetcher,
        }
    }

    /// Full listing with per-row enrichment. Fetch failures are logged
    /// and leave the row without an `article`; they never abort the
    /// listing.
    pub async fn list_all(&self) -> Result<Vec<DatasetRow>> {
        let data = self.storage.get(&self.dataset_object).await?;
        let mut rows = raw_rows(data);
        let mut dataset = Vec::new();
        while let Some(row) = rows.next().await {
            dataset.push(self.enrich(row?).await);
        }
        Ok(dataset)
    }

    /// Ids are generated per read, so a lookup only matches ids handed
    /// out in the same listing pass. A miss is `None`, not an error.
    pub async fn get_by_id(&self, id: &str) -> Result<Option<DatasetRow>> {
        let data = self.storage.get(&self.dataset_object).await?;
        let mut rows = raw_rows(data);
        while let Some(row) = rows.next().await {
            let row = row?;
            let row_id = Uuid::new_v4().to_string();
            if row_id == id {
                // early return drops the stream and stops the blob read
                return Ok(Some(DatasetRow {
                    id: Some(row_id),
                    ..bare_row(row)
                }));
            }
        }
        Ok(None)
    }

    pub async fn get_by_category(&self, category: &str) -> Result<Vec<DatasetRow>> {
        let data = self.storage.get(&self.dataset_object).await?;
        let mut rows = raw_rows(data);
        let wanted = category.to_lowercase();
        let mut matches = Vec::new();
        while let Some(row) = rows.next().await {
            let row = row?;
            if row.category.to_lowercase() == wanted {
                matches.push(bare_row(row));
            }
        }
        Ok(matches)
    }

    async fn enrich(&self, row: RawRow) -> DatasetRow {
        let article = match self.fetcher.fetch(&row.url).await {
            Ok(body) => Some(article_text(&body)),
            Err(e) => {
                error!("error fetching url {}: {:?}", row.url, e);
                None
            }
        };
        let cover = cover_image(&row.category);
        DatasetRow {
            id: Some(Uuid::new_v4().to_string()),
            article,
            category_cover_image: Some(cover),
            ..bare_row(row)
        }
    }
}

fn bare_row(row: RawRow) -> DatasetRow {
    DatasetRow {
        id: None,
        title: row.title,
        created_date: row.created_date,
        author: row.author,
        url: row.url,
        article: None,
        category: row.category,
        category_cover_image: None,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use anyhow::anyhow;
    use async_trait::async_trait;
    use blob_store::{BlobStorageConfig, DiskStorageConfig};
    use bytes::Bytes;
    use futures::stream;
    use tempfile::TempDir;

    use super::*;

    struct StubFetcher {
        pages: HashMap<String, String>,
    }

    #[async_trait]
    impl ArticleFetcher for StubFetcher {
        async fn fetch(&self, url: &str) -> Result<String> {
            self.pages
                .get(url)
                .cloned()
                .ok_or_else(|| anyhow!("unreachable url: {}", url))
        }
    }

    const CSV: &str = "Title, Created_date, Author, Url, Category\n\
                       A,2023-01-01,jo,http://x,Sci Fi\n\
                       B,2023-01-02,mo,http://y,Art\n\
                       C,2023-01-03,jo,http://z,sci fi\n";

    async fn service(dir: &TempDir, pages: Vec<(&str, &str)>) -> DatasetService {
        let storage = Arc::new(
            BlobStorage::new(BlobStorageConfig {
                s3: None,
                disk: Some(DiskStorageConfig {
                    path: dir.path().to_str().unwrap().to_string(),
                }),
            })
            .unwrap(),
        );
        storage
            .put(
                "dataset.csv",
                stream::iter(vec![Ok(Bytes::from_static(CSV.as_bytes()))]),
            )
            .await
            .unwrap();
        let pages = pages
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        DatasetService::new(
            storage,
            "dataset.csv".to_string(),
            Arc::new(StubFetcher { pages }),
        )
    }

    #[tokio::test]
    async fn test_list_all_enriches_rows() {
        let dir = TempDir::new().unwrap();
        let service = service(
            &dir,
            vec![
                ("http://x", "<html><article>story one</article></html>"),
                ("http://z", "<html><body>no tag</body></html>"),
            ],
        )
        .await;

        let rows = service.list_all().await.unwrap();
        assert_eq!(rows.len(), 3);

        assert_eq!(rows[0].title, "A");
        assert_eq!(rows[0].article.as_deref(), Some("story one"));
        assert_eq!(rows[0].category_cover_image.as_deref(), Some("Sci_Fi.jpg"));
        assert!(rows[0].id.is_some());

        // fetch failed, row kept without article
        assert_eq!(rows[1].title, "B");
        assert!(rows[1].article.is_none());
        assert_eq!(rows[1].category_cover_image.as_deref(), Some("Art.jpg"));

        // fetched fine but the page has no article element
        assert_eq!(rows[2].article.as_deref(), Some(""));

        // ids are unique within a pass
        assert_ne!(rows[0].id, rows[1].id);
    }

    #[tokio::test]
    async fn test_get_by_id_only_matches_same_pass_ids() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir, vec![]).await;

        let rows = service.list_all().await.unwrap();
        let id = rows[0].id.clone().unwrap();

        // ids are regenerated on every read, so an id from a previous
        // listing does not resolve
        let found = service.get_by_id(&id).await.unwrap();
        assert!(found.is_none());

        let found = service.get_by_id("not-even-a-uuid").await.unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_get_by_category_is_case_insensitive() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir, vec![]).await;

        let rows = service.get_by_category("SCI FI").await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].title, "A");
        assert_eq!(rows[1].title, "C");

        // matches are the raw fields only
        assert!(rows[0].id.is_none());
        assert!(rows[0].article.is_none());
        assert!(rows[0].category_cover_image.is_none());

        let rows = service.get_by_category("unknown").await.unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn test_category_listing_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir, vec![]).await;

        let first = service.get_by_category("art").await.unwrap();
        let second = service.get_by_category("art").await.unwrap();
        let titles = |rows: &[DatasetRow]| {
            rows.iter().map(|r| r.title.clone()).collect::<Vec<_>>()
        };
        assert_eq!(titles(&first), titles(&second));
    }

    #[tokio::test]
    async fn test_missing_dataset_object_is_an_error() {
        let dir = TempDir::new().unwrap();
        let storage = Arc::new(
            BlobStorage::new(BlobStorageConfig {
                s3: None,
                disk: Some(DiskStorageConfig {
                    path: dir.path().to_str().unwrap().to_string(),
                }),
            })
            .unwrap(),
        );
        let service = DatasetService::new(
            storage,
            "dataset.csv".to_string(),
            Arc::new(StubFetcher {
                pages: HashMap::new(),
            }),
        );
        assert!(service.list_all().await.is_err());
    }
}
