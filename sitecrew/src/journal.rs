//! Session journal backed by SQLite.
//!
//! Keeps an append-only log of rounds, turns and action outcomes, plus
//! keyed values such as the current project counters, so escalation state
//! survives between runs.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result, anyhow};
use chrono::Utc;
use rusqlite::Connection;

use crate::context::{Phase, ProjectState};

/// A stored journal entry.
#[derive(Debug, Clone)]
pub struct Entry {
    pub id: i64,
    pub project: String,
    pub kind: String,
    pub key: String,
    pub value: String,
    pub created_at: String,
}

pub struct Journal {
    db: Mutex<Connection>,
}

impl Journal {
    /// Open or create a journal database.
    pub fn open(path: &Path) -> Result<Self> {
        let db = Connection::open(path)
            .with_context(|| format!("Failed to open journal {}", path.display()))?;
        db.execute_batch(
            "CREATE TABLE IF NOT EXISTS journal (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                project TEXT NOT NULL,
                kind TEXT NOT NULL,
                key TEXT NOT NULL,
                value TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_journal_project_kind
                ON journal(project, kind);
            CREATE INDEX IF NOT EXISTS idx_journal_project_key
                ON journal(project, key);",
        )?;
        Ok(Self { db: Mutex::new(db) })
    }

    /// Open an in-memory database (for testing).
    pub fn in_memory() -> Result<Self> {
        Self::open(Path::new(":memory:"))
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.db.lock().map_err(|_| anyhow!("journal lock poisoned"))
    }

    /// Store a value, replacing any previous value for project+kind+key.
    pub fn set(&self, project: &str, kind: &str, key: &str, value: &str) -> Result<()> {
        let mut db = self.conn()?;
        let now = Utc::now().to_rfc3339();
        let tx = db.transaction()?;
        tx.execute(
            "DELETE FROM journal WHERE project = ?1 AND kind = ?2 AND key = ?3",
            rusqlite::params![project, kind, key],
        )?;
        tx.execute(
            "INSERT INTO journal (project, kind, key, value, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![project, kind, key, value, now],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Get a specific value.
    pub fn get(&self, project: &str, kind: &str, key: &str) -> Result<Option<String>> {
        let db = self.conn()?;
        let mut stmt = db.prepare(
            "SELECT value FROM journal WHERE project = ?1 AND kind = ?2 AND key = ?3
             ORDER BY id DESC LIMIT 1",
        )?;
        let mut rows = stmt.query(rusqlite::params![project, kind, key])?;
        match rows.next()? {
            Some(row) => Ok(Some(row.get(0)?)),
            None => Ok(None),
        }
    }

    /// Append an entry (never overwrites).
    pub fn log(&self, project: &str, kind: &str, key: &str, value: &str) -> Result<()> {
        let db = self.conn()?;
        let now = Utc::now().to_rfc3339();
        db.execute(
            "INSERT INTO journal (project, kind, key, value, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![project, kind, key, value, now],
        )?;
        Ok(())
    }

    /// Log entries (rounds, turns, actions) for a project, oldest first.
    pub fn history(&self, project: &str) -> Result<Vec<Entry>> {
        let db = self.conn()?;
        let mut stmt = db.prepare(
            "SELECT id, project, kind, key, value, created_at
             FROM journal WHERE project = ?1 AND kind IN ('round', 'turn', 'action')
             ORDER BY id ASC",
        )?;
        let entries = stmt
            .query_map(rusqlite::params![project], |row| {
                Ok(Entry {
                    id: row.get(0)?,
                    project: row.get(1)?,
                    kind: row.get(2)?,
                    key: row.get(3)?,
                    value: row.get(4)?,
                    created_at: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    pub fn save_state(&self, project: &str, state: &ProjectState, phase: Phase) -> Result<()> {
        let json = serde_json::to_string(state)?;
        self.set(project, "state", "current", &json)?;
        self.set(project, "phase", "current", phase.as_str())
    }

    /// Last saved counters and phase, if any.
    pub fn load_state(&self, project: &str) -> Result<Option<(ProjectState, Phase)>> {
        let Some(json) = self.get(project, "state", "current")? else {
            return Ok(None);
        };
        let state: ProjectState =
            serde_json::from_str(&json).context("Corrupt project state in journal")?;
        let phase = self
            .get(project, "phase", "current")?
            .and_then(|p| Phase::parse(&p))
            .unwrap_or(Phase::Planning);
        Ok(Some((state, phase)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_replaces_and_log_appends() {
        let j = Journal::in_memory().unwrap();
        j.set("shop", "phase", "current", "design").unwrap();
        j.set("shop", "phase", "current", "testing").unwrap();
        assert_eq!(j.get("shop", "phase", "current").unwrap().as_deref(), Some("testing"));
        assert_eq!(j.get("other", "phase", "current").unwrap(), None);

        j.log("shop", "turn", "Developer", "on it").unwrap();
        j.log("shop", "turn", "Developer", "done").unwrap();
        j.log("shop", "action", "Developer", "✅ Created file: index.html").unwrap();
        let h = j.history("shop").unwrap();
        assert_eq!(h.len(), 3);
        assert_eq!(h[1].value, "done");
        assert_eq!(h[2].kind, "action");
    }

    #[test]
    fn state_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("journal.db");
        let state = ProjectState {
            stuck_count: 4,
            satisfaction_level: 0.2,
            ..ProjectState::default()
        };
        Journal::open(&path)
            .unwrap()
            .save_state("shop", &state, Phase::Testing)
            .unwrap();

        let j = Journal::open(&path).unwrap();
        let (loaded, phase) = j.load_state("shop").unwrap().unwrap();
        assert_eq!(loaded, state);
        assert_eq!(phase, Phase::Testing);
        assert!(j.load_state("blog").unwrap().is_none());
    }
}
