use crate::app_dirs::AppDirs;
use crate::collaborators::ReportSink;
use crate::error::Result;
use crate::scoring::{CompletionReason, MetricsReport};
use rusqlite::{params, Connection};
use std::path::Path;
use tracing::{debug, error};

/// Aggregate view over every stored playthrough.
#[derive(Debug, Clone, PartialEq)]
pub struct HistorySummary {
    pub playthroughs: u32,
    pub successes: u32,
    pub best_score: Option<f64>,
    pub mean_score: Option<f64>,
}

/// SQLite store of completed playthrough reports
#[derive(Debug)]
pub struct ReportStore {
    conn: Connection,
}

impl ReportStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::init(Connection::open(path)?)
    }

    /// Opens the store under the user's state directory.
    pub fn open_default() -> Result<Self> {
        Self::open(&AppDirs::db_path())
    }

    pub fn in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS playthroughs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                completed_at TEXT NOT NULL,
                reason TEXT NOT NULL,
                score REAL NOT NULL,
                duration_secs INTEGER NOT NULL,
                success_interactions INTEGER NOT NULL,
                total_interactions INTEGER NOT NULL,
                report_json TEXT NOT NULL
            )
            "#,
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_playthroughs_completed ON playthroughs(completed_at)",
            [],
        )?;
        Ok(ReportStore { conn })
    }

    pub fn record(&self, report: &MetricsReport) -> Result<i64> {
        let json = serde_json::to_string(report)?;
        self.conn.execute(
            r#"
            INSERT INTO playthroughs
            (completed_at, reason, score, duration_secs, success_interactions, total_interactions, report_json)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                report.completed_at.to_rfc3339(),
                report.reason.to_string(),
                report.aggregate_score,
                report.duration_secs as i64,
                report.success_interactions,
                report.total_interactions,
                json,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Most recent reports first.
    pub fn recent(&self, limit: usize) -> Result<Vec<MetricsReport>> {
        let mut stmt = self
            .conn
            .prepare("SELECT report_json FROM playthroughs ORDER BY id DESC LIMIT ?1")?;
        let rows = stmt.query_map(params![limit as i64], |row| row.get::<_, String>(0))?;

        let mut reports = Vec::new();
        for row in rows {
            reports.push(serde_json::from_str(&row?)?);
        }
        Ok(reports)
    }

    pub fn summary(&self) -> Result<HistorySummary> {
        let mut stmt = self.conn.prepare("SELECT reason, score FROM playthroughs")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?))
        })?;

        let mut playthroughs = 0u32;
        let mut successes = 0u32;
        let mut scores = Vec::new();
        for row in rows {
            let (reason, score) = row?;
            playthroughs += 1;
            if reason == CompletionReason::Success.to_string() {
                successes += 1;
            }
            scores.push(score);
        }

        let best_score = scores.iter().copied().reduce(f64::max);
        let mean_score = if scores.is_empty() {
            None
        } else {
            Some(scores.iter().sum::<f64>() / scores.len() as f64)
        };
        Ok(HistorySummary {
            playthroughs,
            successes,
            best_score,
            mean_score,
        })
    }

    pub fn clear(&self) -> Result<()> {
        self.conn.execute("DELETE FROM playthroughs", [])?;
        Ok(())
    }
}

/// Persists every delivered report.
#[derive(Debug)]
pub struct HistorySink {
    store: ReportStore,
}

impl HistorySink {
    pub fn new(store: ReportStore) -> Self {
        Self { store }
    }
}

impl ReportSink for HistorySink {
    fn deliver(&mut self, report: &MetricsReport) {
        match self.store.record(report) {
            Ok(id) => debug!(id, "report stored"),
            Err(e) => error!(error = %e, "failed to store report"),
        }
    }
}
