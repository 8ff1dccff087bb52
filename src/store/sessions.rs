//! File-backed session records: one JSON document per session, filed under
//! a `YYYY-MM-DD` folder derived from the session's start time.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

use crate::models::{
    new_session_id, DistractionReason, Interruption, Reflection, Session, TASK_SLOTS,
};

#[derive(Clone)]
pub struct SessionStore {
    root: PathBuf,
}

impl SessionStore {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)
            .with_context(|| format!("failed to create session store root {}", root.display()))?;
        Ok(Self { root })
    }

    pub fn create_session(
        &self,
        started_at: DateTime<Utc>,
        length_ms: u64,
        focus_goal: &str,
        tasks: Option<Vec<String>>,
    ) -> Result<Session> {
        let tasks = tasks.map(|mut slots| {
            slots.truncate(TASK_SLOTS);
            slots
        });

        let session = Session {
            id: new_session_id(started_at),
            started_at,
            ends_at: started_at + chrono::Duration::milliseconds(length_ms as i64),
            length_ms,
            focus_goal: focus_goal.to_string(),
            tasks,
            interruptions: Vec::new(),
            distractions: Vec::new(),
            reflections: Vec::new(),
            summaries: Vec::new(),
            final_summary: None,
            created_at: started_at,
            updated_at: started_at,
        };

        self.write(&session)?;
        Ok(session)
    }

    pub fn load_session(&self, id: &str, date_folder: &str) -> Result<Option<Session>> {
        let path = self.session_path(id, date_folder);
        if !path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("failed to read session {}", path.display()))?;
        let session = serde_json::from_str(&contents)
            .with_context(|| format!("corrupt session document {}", path.display()))?;
        Ok(Some(session))
    }

    pub fn add_summary(&self, id: &str, date_folder: &str, summary: &str) -> Result<bool> {
        self.mutate(id, date_folder, |session| {
            session.summaries.push(summary.to_string());
        })
    }

    /// Appends a resolved interruption and advances the scheduled end by its
    /// duration, keeping the persisted document consistent with the live
    /// projection.
    pub fn add_interruption(
        &self,
        id: &str,
        date_folder: &str,
        interruption: &Interruption,
    ) -> Result<bool> {
        let interruption = interruption.clone();
        self.mutate(id, date_folder, move |session| {
            if let Some(duration_ms) = interruption.duration_ms {
                session.ends_at += chrono::Duration::milliseconds(duration_ms as i64);
            }
            session.interruptions.push(interruption);
        })
    }

    pub fn add_distraction(
        &self,
        id: &str,
        date_folder: &str,
        distraction: &DistractionReason,
    ) -> Result<bool> {
        let distraction = distraction.clone();
        self.mutate(id, date_folder, move |session| {
            session.distractions.push(distraction);
        })
    }

    pub fn add_reflection(
        &self,
        id: &str,
        date_folder: &str,
        reflection: &Reflection,
    ) -> Result<bool> {
        let reflection = reflection.clone();
        self.mutate(id, date_folder, move |session| {
            session.reflections.push(reflection);
        })
    }

    pub fn set_final_summary(&self, id: &str, date_folder: &str, text: &str) -> Result<bool> {
        let text = text.to_string();
        self.mutate(id, date_folder, move |session| {
            session.final_summary = Some(text);
        })
    }

    pub fn list_by_date(&self, date_folder: &str) -> Result<Vec<Session>> {
        let dir = self.root.join(date_folder);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut sessions = read_sessions_in(&dir)?;
        sessions.sort_by(|a, b| a.started_at.cmp(&b.started_at));
        Ok(sessions)
    }

    pub fn list_all(&self) -> Result<BTreeMap<String, Vec<Session>>> {
        let mut by_date = BTreeMap::new();
        for entry in fs::read_dir(&self.root)
            .with_context(|| format!("failed to list session root {}", self.root.display()))?
        {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let folder = entry.file_name().to_string_lossy().to_string();
            let sessions = self.list_by_date(&folder)?;
            if !sessions.is_empty() {
                by_date.insert(folder, sessions);
            }
        }
        Ok(by_date)
    }

    fn mutate(
        &self,
        id: &str,
        date_folder: &str,
        apply: impl FnOnce(&mut Session),
    ) -> Result<bool> {
        let Some(mut session) = self.load_session(id, date_folder)? else {
            return Ok(false);
        };
        apply(&mut session);
        session.updated_at = Utc::now();
        self.write(&session)?;
        Ok(true)
    }

    fn write(&self, session: &Session) -> Result<()> {
        let dir = self.root.join(session.date_folder());
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create date folder {}", dir.display()))?;
        let path = dir.join(format!("{}.json", session.id));
        let serialized = serde_json::to_string_pretty(session)?;
        fs::write(&path, serialized)
            .with_context(|| format!("failed to write session {}", path.display()))
    }

    fn session_path(&self, id: &str, date_folder: &str) -> PathBuf {
        self.root.join(date_folder).join(format!("{id}.json"))
    }
}

fn read_sessions_in(dir: &Path) -> Result<Vec<Session>> {
    let mut sessions = Vec::new();
    for entry in
        fs::read_dir(dir).with_context(|| format!("failed to list {}", dir.display()))?
    {
        let entry = entry?;
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
            continue;
        }
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("failed to read session {}", path.display()))?;
        match serde_json::from_str(&contents) {
            Ok(session) => sessions.push(session),
            Err(err) => log::warn!("skipping corrupt session document {}: {err}", path.display()),
        }
    }
    Ok(sessions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 4, 9, 30, 0).unwrap()
    }

    #[test]
    fn create_then_load_round_trips() {
        let dir = tempdir().expect("tempdir");
        let store = SessionStore::new(dir.path()).expect("store");

        let created = store
            .create_session(t0(), 1_500_000, "write report", None)
            .expect("create");

        let loaded = store
            .load_session(&created.id, &created.date_folder())
            .expect("load")
            .expect("present");

        assert_eq!(loaded.started_at, t0());
        assert_eq!(
            loaded.ends_at,
            t0() + chrono::Duration::milliseconds(1_500_000)
        );
        assert_eq!(loaded.length_ms, 1_500_000);
        assert_eq!(loaded.focus_goal, "write report");
        assert!(loaded.interruptions.is_empty());
        assert!(loaded.distractions.is_empty());
        assert!(loaded.reflections.is_empty());
        assert!(loaded.summaries.is_empty());
        assert!(loaded.final_summary.is_none());
    }

    #[test]
    fn tasks_are_capped_at_three_slots() {
        let dir = tempdir().expect("tempdir");
        let store = SessionStore::new(dir.path()).expect("store");
        let created = store
            .create_session(
                t0(),
                60_000,
                "goal",
                Some(vec!["a".into(), "b".into(), "c".into(), "d".into()]),
            )
            .expect("create");
        assert_eq!(created.tasks.as_ref().map(Vec::len), Some(3));
    }

    #[test]
    fn appends_accumulate_in_order() {
        let dir = tempdir().expect("tempdir");
        let store = SessionStore::new(dir.path()).expect("store");
        let session = store
            .create_session(t0(), 60_000, "goal", None)
            .expect("create");
        let folder = session.date_folder();

        assert!(store.add_summary(&session.id, &folder, "first").unwrap());
        assert!(store.add_summary(&session.id, &folder, "second").unwrap());
        assert!(store
            .set_final_summary(&session.id, &folder, "done")
            .unwrap());

        let loaded = store
            .load_session(&session.id, &folder)
            .unwrap()
            .expect("present");
        assert_eq!(loaded.summaries, vec!["first", "second"]);
        assert_eq!(loaded.final_summary.as_deref(), Some("done"));
    }

    #[test]
    fn distractions_append_in_order() {
        let dir = tempdir().expect("tempdir");
        let store = SessionStore::new(dir.path()).expect("store");
        let session = store
            .create_session(t0(), 60_000, "goal", None)
            .expect("create");
        let folder = session.date_folder();

        for (offset, content) in [(10_000, "checked messages"), (20_000, "news tab")] {
            let distraction = DistractionReason {
                timestamp: t0() + chrono::Duration::milliseconds(offset),
                content: content.to_string(),
            };
            assert!(store
                .add_distraction(&session.id, &folder, &distraction)
                .unwrap());
        }

        let loaded = store
            .load_session(&session.id, &folder)
            .unwrap()
            .expect("present");
        assert_eq!(loaded.distractions.len(), 2);
        assert_eq!(loaded.distractions[0].content, "checked messages");
        assert_eq!(loaded.distractions[1].content, "news tab");
    }

    #[test]
    fn add_interruption_extends_persisted_end_time() {
        let dir = tempdir().expect("tempdir");
        let store = SessionStore::new(dir.path()).expect("store");
        let session = store
            .create_session(t0(), 1_500_000, "goal", None)
            .expect("create");
        let folder = session.date_folder();

        let mut interruption = Interruption::open(t0() + chrono::Duration::milliseconds(500_000));
        interruption.resolve(t0() + chrono::Duration::milliseconds(700_000));
        assert!(store
            .add_interruption(&session.id, &folder, &interruption)
            .unwrap());

        let loaded = store
            .load_session(&session.id, &folder)
            .unwrap()
            .expect("present");
        assert_eq!(
            loaded.ends_at,
            t0() + chrono::Duration::milliseconds(1_500_000 + 200_000)
        );
        assert_eq!(loaded.interruptions.len(), 1);
    }

    #[test]
    fn mutating_a_missing_session_reports_false() {
        let dir = tempdir().expect("tempdir");
        let store = SessionStore::new(dir.path()).expect("store");
        assert!(!store.add_summary("nope", "2026-03-04", "text").unwrap());
    }

    #[test]
    fn list_all_groups_by_date_folder() {
        let dir = tempdir().expect("tempdir");
        let store = SessionStore::new(dir.path()).expect("store");
        store.create_session(t0(), 60_000, "a", None).unwrap();
        store
            .create_session(t0() + chrono::Duration::days(1), 60_000, "b", None)
            .unwrap();

        let all = store.list_all().expect("list");
        assert_eq!(all.len(), 2);
        assert_eq!(all["2026-03-04"].len(), 1);
        assert_eq!(all["2026-03-05"].len(), 1);
    }
}
