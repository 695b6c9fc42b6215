use async_trait::async_trait;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::future::Future;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, error, info};

use crate::config::EvalConfig;
use crate::datasets::{DatasetSource, LocalDatasetSource, QrelRecord, SplitGroup};
use crate::error::{EvalError, Result};
use crate::tasks::Task;

pub const DEFAULT_DATASET_ID: &str = "jfkback/crumb";
pub const DEFAULT_DATASETS_SERVER_URL: &str = "https://datasets-server.huggingface.co";

// The datasets server rejects pages longer than this.
const MAX_PAGE_SIZE: usize = 100;

#[derive(Debug, Deserialize)]
struct RowsResponse {
    rows: Vec<RowEntry>,
    num_rows_total: usize,
}

#[derive(Debug, Deserialize)]
struct RowEntry {
    row_idx: usize,
    row: Map<String, Value>,
    #[serde(default)]
    truncated_cells: Vec<String>,
}

/// Reads benchmark splits from the Hugging Face datasets server, caching each
/// downloaded split on disk.
pub struct HuggingFaceSource {
    client: Client,
    base_url: String,
    dataset_id: String,
    page_size: usize,
    cache: Option<LocalDatasetSource>,
}

impl HuggingFaceSource {
    pub fn new(base_url: &str, dataset_id: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            dataset_id: dataset_id.to_string(),
            page_size: MAX_PAGE_SIZE,
            cache: None,
        })
    }

    pub fn from_config(config: &EvalConfig) -> Result<Self> {
        let source = Self::new(
            &config.datasets_server_url,
            &config.dataset_id,
            Duration::from_secs(config.request_timeout_secs),
        )?
        .with_page_size(config.page_size);

        Ok(match config.resolved_cache_dir() {
            Some(cache_dir) => source.with_cache_dir(cache_dir),
            None => source,
        })
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        self
    }

    pub fn with_cache_dir(mut self, cache_dir: impl AsRef<Path>) -> Self {
        let dataset_dir = cache_dir.as_ref().join(self.dataset_id.replace('/', "__"));
        self.cache = Some(LocalDatasetSource::new(dataset_dir));
        self
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn cache(&self) -> Option<&LocalDatasetSource> {
        self.cache.as_ref()
    }

    async fn fetch_page(
        &self,
        split_group: SplitGroup,
        task: Task,
        offset: usize,
    ) -> Result<RowsResponse> {
        let url = format!("{}/rows", self.base_url);
        debug!(
            "Requesting rows {}..{} of {}/{} from {}",
            offset,
            offset + self.page_size,
            split_group,
            task,
            url
        );

        let response = self
            .client
            .get(&url)
            .query(&[
                ("dataset", self.dataset_id.as_str()),
                ("config", split_group.as_str()),
                ("split", task.as_str()),
            ])
            .query(&[("offset", offset), ("length", self.page_size)])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            error!(
                "Rows request for {}/{} failed with status {}: {}",
                split_group, task, status, error_text
            );
            return Err(EvalError::Dataset(format!(
                "Rows request for {}/{} failed with status {}: {}",
                split_group, task, status, error_text
            )));
        }

        Ok(response.json().await?)
    }

    async fn download_split(&self, split_group: SplitGroup, task: Task) -> Result<Vec<QrelRecord>> {
        info!(
            "Downloading {} split {}/{} from {}",
            self.dataset_id, split_group, task, self.base_url
        );

        let progress_bar = ProgressBar::new(0);
        if let Ok(style) = ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} queries ({eta})",
        ) {
            progress_bar.set_style(style.progress_chars("#>-"));
        }

        let records = collect_pages(&progress_bar, move |offset| {
            self.fetch_page(split_group, task, offset)
        })
        .await?;

        progress_bar.finish_and_clear();
        info!("Downloaded {} query records for {}", records.len(), task);
        Ok(records)
    }
}

/// Requests pages at increasing offsets until `num_rows_total` rows were read
/// or a page comes back empty.
async fn collect_pages<F, Fut>(progress_bar: &ProgressBar, mut fetch_page: F) -> Result<Vec<QrelRecord>>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<RowsResponse>>,
{
    let mut records = Vec::new();

    loop {
        let page = fetch_page(records.len()).await?;
        let total = page.num_rows_total;
        progress_bar.set_length(total as u64);

        let page_len = page.rows.len();
        for entry in page.rows {
            records.push(parse_row(entry)?);
        }
        progress_bar.set_position(records.len() as u64);

        if page_len == 0 || records.len() >= total {
            break;
        }
    }

    Ok(records)
}

/// Converts one datasets-server row into a record. A truncated query text is
/// dropped; a truncated judgment list is an error since the judgments would be
/// incomplete.
fn parse_row(entry: RowEntry) -> Result<QrelRecord> {
    let RowEntry {
        row_idx,
        mut row,
        truncated_cells,
    } = entry;

    for cell in &truncated_cells {
        if cell == "query_content" {
            debug!("Dropping truncated query_content of row {}", row_idx);
            row.remove(cell);
        } else {
            return Err(EvalError::Dataset(format!(
                "Cell {} of row {} was truncated by the datasets server",
                cell, row_idx
            )));
        }
    }

    serde_json::from_value(Value::Object(row)).map_err(|e| {
        EvalError::Dataset(format!("Row {} does not match the qrel schema: {}", row_idx, e))
    })
}

#[async_trait]
impl DatasetSource for HuggingFaceSource {
    async fn fetch_split(&self, split_group: SplitGroup, task: Task) -> Result<Vec<QrelRecord>> {
        if let Some(cache) = &self.cache {
            if cache.contains(split_group, task) {
                info!("Split {}/{} already cached, skipping download", split_group, task);
                return cache.read_split(split_group, task);
            }
        }

        let records = self.download_split(split_group, task).await?;

        if let Some(cache) = &self.cache {
            cache.write_split(split_group, task, &records)?;
            debug!(
                "Cached split at {}",
                cache.split_path(split_group, task).display()
            );
        }

        Ok(records)
    }

    fn get_name(&self) -> String {
        format!("huggingface:{}", self.dataset_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasets::QrelEntry;
    use crate::qrels::QrelKey;
    use serde_json::json;
    use tempfile::TempDir;

    fn row_entry(row: Value, truncated_cells: Vec<&str>) -> RowEntry {
        RowEntry {
            row_idx: 3,
            row: row.as_object().cloned().unwrap(),
            truncated_cells: truncated_cells.into_iter().map(String::from).collect(),
        }
    }

    #[test]
    fn test_parse_row() {
        let entry = row_entry(
            json!({
                "query_id": "q9",
                "query_content": "a patient with ...",
                "full_document_qrels": [{"id": "NCT42", "label": 2}],
                "passage_qrels": [{"id": "NCT42:0", "label": 1}, {"id": "NCT42:1", "label": 0}]
            }),
            vec![],
        );

        let record = parse_row(entry).unwrap();
        assert_eq!(record.query_id, "q9");
        assert_eq!(record.judgments(QrelKey::Passage).unwrap().len(), 2);
        assert_eq!(
            record.judgments(QrelKey::FullDocument).unwrap(),
            &[QrelEntry {
                id: "NCT42".to_string(),
                label: 2.0
            }]
        );
    }

    #[test]
    fn test_parse_row_drops_truncated_query_content() {
        let entry = row_entry(
            json!({"query_id": "q1", "query_content": "trunc", "passage_qrels": []}),
            vec!["query_content"],
        );

        let record = parse_row(entry).unwrap();
        assert!(record.query_content.is_none());
    }

    #[test]
    fn test_parse_row_rejects_truncated_judgments() {
        let entry = row_entry(
            json!({"query_id": "q1", "passage_qrels": "[{\"id\": \"a"}),
            vec!["passage_qrels"],
        );

        assert!(matches!(parse_row(entry), Err(EvalError::Dataset(_))));
    }

    #[test]
    fn test_page_size_is_clamped() {
        let source =
            HuggingFaceSource::new(DEFAULT_DATASETS_SERVER_URL, DEFAULT_DATASET_ID, Duration::from_secs(5))
                .unwrap();
        assert_eq!(source.page_size(), 100);
        assert_eq!(source.with_page_size(1000).page_size(), 100);

        let source =
            HuggingFaceSource::new(DEFAULT_DATASETS_SERVER_URL, DEFAULT_DATASET_ID, Duration::from_secs(5))
                .unwrap();
        assert_eq!(source.with_page_size(0).page_size(), 1);
    }

    #[tokio::test]
    async fn test_cached_split_is_served_without_network() {
        let temp_dir = TempDir::new().unwrap();
        // Unroutable server: any request would fail
        let source = HuggingFaceSource::new("http://127.0.0.1:9", "jfkback/crumb", Duration::from_secs(1))
            .unwrap()
            .with_cache_dir(temp_dir.path());

        let cache = source.cache().unwrap();
        assert!(cache.root().ends_with("jfkback__crumb"));
        cache
            .write_split(
                SplitGroup::Validation,
                Task::TheoremRetrieval,
                &[QrelRecord {
                    query_id: "q1".to_string(),
                    query_content: None,
                    passage_qrels: Some(vec![]),
                    passage_binary_qrels: None,
                    full_document_qrels: None,
                    full_document_binary_qrels: None,
                }],
            )
            .unwrap();

        let records = source
            .fetch_split(SplitGroup::Validation, Task::TheoremRetrieval)
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(source.get_name(), "huggingface:jfkback/crumb");
    }

    fn page(query_ids: &[&str], total: usize) -> RowsResponse {
        RowsResponse {
            rows: query_ids
                .iter()
                .enumerate()
                .map(|(i, id)| RowEntry {
                    row_idx: i,
                    row: json!({"query_id": id, "passage_qrels": []})
                        .as_object()
                        .cloned()
                        .unwrap(),
                    truncated_cells: vec![],
                })
                .collect(),
            num_rows_total: total,
        }
    }

    async fn collect_from(pages: Vec<RowsResponse>) -> (Result<Vec<QrelRecord>>, Vec<usize>) {
        let mut pages = std::collections::VecDeque::from(pages);
        let mut offsets = Vec::new();
        let result = collect_pages(&ProgressBar::hidden(), |offset| {
            offsets.push(offset);
            let next = pages.pop_front().unwrap_or_else(|| page(&[], 0));
            std::future::ready(Ok(next))
        })
        .await;
        (result, offsets)
    }

    #[tokio::test]
    async fn test_collect_pages_advances_offset() {
        let (records, offsets) = collect_from(vec![
            page(&["q1", "q2"], 5),
            page(&["q3", "q4"], 5),
            page(&["q5"], 5),
        ])
        .await;

        let ids: Vec<String> = records.unwrap().into_iter().map(|r| r.query_id).collect();
        assert_eq!(ids, vec!["q1", "q2", "q3", "q4", "q5"]);
        assert_eq!(offsets, vec![0, 2, 4]);
    }

    #[tokio::test]
    async fn test_collect_pages_stops_at_total() {
        let (records, offsets) = collect_from(vec![
            page(&["q1", "q2", "q3"], 3),
            page(&["never"], 3),
        ])
        .await;

        assert_eq!(records.unwrap().len(), 3);
        assert_eq!(offsets, vec![0]);
    }

    #[tokio::test]
    async fn test_collect_pages_stops_on_empty_page() {
        let (records, offsets) = collect_from(vec![page(&["q1", "q2"], 10), page(&[], 10)]).await;

        assert_eq!(records.unwrap().len(), 2);
        assert_eq!(offsets, vec![0, 2]);
    }

    #[tokio::test]
    async fn test_collect_pages_propagates_fetch_errors() {
        let result = collect_pages(&ProgressBar::hidden(), |_| {
            std::future::ready(Err::<RowsResponse, _>(EvalError::Dataset("boom".to_string())))
        })
        .await;

        assert!(matches!(result, Err(EvalError::Dataset(_))));
    }
}
