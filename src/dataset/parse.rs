use anyhow::Result;
use bytes::Bytes;
use csv_async::{AsyncReaderBuilder, Trim};
use futures::{stream::BoxStream, Stream, StreamExt};
use serde::Deserialize;
use tokio_util::io::StreamReader;

/// One record of the backing CSV object, keyed by its header columns.
#[derive(Debug, Clone, Deserialize)]
pub struct RawRow {
    #[serde(rename = "Title")]
    pub title: String,
    #[serde(rename = "Created_date")]
    pub created_date: String,
    #[serde(rename = "Author")]
    pub author: String,
    #[serde(rename = "Url")]
    pub url: String,
    #[serde(rename = "Category")]
    pub category: String,
}

/// Turns a blob byte stream into a stream of parsed rows. Rows are
/// decoded incrementally, so dropping the returned stream early stops
/// the underlying read as well.
pub fn raw_rows(
    data: impl Stream<Item = Result<Bytes>> + Send + Unpin + 'static,
) -> BoxStream<'static, Result<RawRow>> {
    let reader = StreamReader::new(data.map(|chunk| chunk.map_err(std::io::Error::other)));
    // headers are written as "Title, Created_date, ..." with padding
    let deserializer = AsyncReaderBuilder::new()
        .trim(Trim::All)
        .create_deserializer(reader);
    deserializer
        .into_deserialize::<RawRow>()
        .map(|row| row.map_err(Into::into))
        .boxed()
}

#[cfg(test)]
mod tests {
    use futures::stream;

    use super::*;

    fn chunked(data: &str, chunk_size: usize) -> impl Stream<Item = Result<Bytes>> + Unpin {
        let chunks: Vec<Result<Bytes>> = data
            .as_bytes()
            .chunks(chunk_size)
            .map(|c| Ok(Bytes::copy_from_slice(c)))
            .collect();
        stream::iter(chunks)
    }

    const CSV: &str = "Title, Created_date, Author, Url, Category\n\
                       A,2023-01-01,jo,http://x,Sci Fi\n\
                       B,2023-01-02,mo,http://y,Art\n";

    #[tokio::test]
    async fn test_rows_across_chunk_boundaries() {
        // tiny chunks force records to straddle reads
        let mut rows = raw_rows(chunked(CSV, 7));
        let first = rows.next().await.unwrap().unwrap();
        assert_eq!(first.title, "A");
        assert_eq!(first.created_date, "2023-01-01");
        assert_eq!(first.author, "jo");
        assert_eq!(first.url, "http://x");
        assert_eq!(first.category, "Sci Fi");

        let second = rows.next().await.unwrap().unwrap();
        assert_eq!(second.title, "B");
        assert!(rows.next().await.is_none());
    }

    #[tokio::test]
    async fn test_header_padding_is_trimmed() {
        let csv = "Title,   Created_date  , Author , Url , Category\n\
                   A, 2023-01-01 , jo , http://x , Sci Fi\n";
        let mut rows = raw_rows(Box::pin(chunked(csv, 1024)));
        let row = rows.next().await.unwrap().unwrap();
        assert_eq!(row.created_date, "2023-01-01");
        assert_eq!(row.category, "Sci Fi");
    }

    #[tokio::test]
    async fn test_ragged_row_is_an_error() {
        let csv = "Title, Created_date, Author, Url, Category\n\
                   A,2023-01-01,jo\n";
        let mut rows = raw_rows(chunked(csv, 1024));
        assert!(rows.next().await.unwrap().is_err());
    }

    #[tokio::test]
    async fn test_read_error_propagates() {
        let chunks: Vec<Result<Bytes>> = vec![
            Ok(Bytes::from_static(b"Title, Created_date, Author, Url, Category\n")),
            Err(anyhow::anyhow!("connection reset")),
        ];
        let mut rows = raw_rows(stream::iter(chunks));
        assert!(rows.next().await.unwrap().is_err());
    }
}
