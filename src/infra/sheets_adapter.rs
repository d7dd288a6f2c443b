use crate::app::ports::SheetWriter;
use crate::error::{Result, ShopError};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::info;

/// Google Sheets `values:append` over plain HTTP with a bearer token
pub struct HttpSheetWriter {
    client: reqwest::Client,
    api_base: String,
    spreadsheet_id: String,
    access_token: String,
}

impl HttpSheetWriter {
    pub fn new(api_base: &str, spreadsheet_id: &str, access_token: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            spreadsheet_id: spreadsheet_id.to_string(),
            access_token: access_token.to_string(),
        })
    }

    fn append_url(&self, range: &str) -> String {
        format!(
            "{}/v4/spreadsheets/{}/values/{}:append?valueInputOption=RAW",
            self.api_base, self.spreadsheet_id, range
        )
    }
}

#[async_trait]
impl SheetWriter for HttpSheetWriter {
    async fn append_rows(&self, range: &str, rows: &[Vec<Value>]) -> Result<()> {
        let response = self
            .client
            .post(self.append_url(range))
            .bearer_auth(&self.access_token)
            .json(&json!({ "values": rows }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ShopError::Task(format!("Sheets append failed with {status}: {body}")));
        }
        info!(rows = rows.len(), range, "Appended rows to spreadsheet");
        Ok(())
    }
}

/// Appends tab-separated rows to a local file
pub struct FileSheetWriter {
    path: PathBuf,
}

impl FileSheetWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

fn cell(value: &Value) -> String {
    match value {
        Value::String(s) => s.replace(['\t', '\n'], " "),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[async_trait]
impl SheetWriter for FileSheetWriter {
    async fn append_rows(&self, range: &str, rows: &[Vec<Value>]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut text = String::new();
        for row in rows {
            let cells: Vec<String> = row.iter().map(cell).collect();
            text.push_str(&cells.join("\t"));
            text.push('\n');
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(text.as_bytes()).await?;
        file.flush().await?;

        info!(rows = rows.len(), range, path = %self.path.display(), "Appended rows to report file");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_url() {
        let writer = HttpSheetWriter::new("https://sheets.googleapis.com", "sheet-1", "t").unwrap();
        assert_eq!(
            writer.append_url("A:C"),
            "https://sheets.googleapis.com/v4/spreadsheets/sheet-1/values/A:C:append?valueInputOption=RAW"
        );
    }

    #[tokio::test]
    async fn test_file_writer_appends_tsv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports").join("products.tsv");
        let writer = FileSheetWriter::new(&path);

        writer
            .append_rows("A:C", &[vec![json!("Tea"), json!(3.5), json!("Green\tleaf")]])
            .await
            .unwrap();
        writer
            .append_rows("A:C", &[vec![json!("Cake"), json!(12.0), json!("")]])
            .await
            .unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "Tea\t3.5\tGreen leaf\nCake\t12.0\t\n");
    }
}
