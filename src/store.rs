use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::error::SyncError;
use crate::model::{Assignment, AssignmentGroup, Counts, Course, Term};

/// Store binds four mirrored collections to an existing SQLite connection.
/// The host owns the connection; all mutations commit per unit of work.
pub struct Store<'c> {
    conn: &'c Connection,
}

impl<'c> Store<'c> {
    pub fn new(conn: &'c Connection) -> Result<Self, SyncError> {
        Ok(Self { conn })
    }

    /// Create the mirrored tables and indexes.
    /// Safe to call multiple times; must run once per connection so the
    /// foreign-key pragma is in effect for cascades.
    pub fn init_schema(&self) -> Result<(), SyncError> {
        self.conn.execute_batch(
            r#"
PRAGMA journal_mode=WAL;
PRAGMA foreign_keys=ON;

CREATE TABLE IF NOT EXISTS terms (
id INTEGER NOT NULL UNIQUE, -- remote id; rowid keeps insertion order
name TEXT,
start_at TEXT,
end_at TEXT
);

CREATE TABLE IF NOT EXISTS courses (
id INTEGER NOT NULL UNIQUE,
name TEXT,
account_id INTEGER,
uuid TEXT,
course_code TEXT,
enrollment_term_id INTEGER,
term_id INTEGER NOT NULL REFERENCES terms(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_courses_term
ON courses(term_id);

CREATE TABLE IF NOT EXISTS assignment_groups (
id INTEGER NOT NULL UNIQUE,
name TEXT,
weight REAL,
course_id INTEGER NOT NULL REFERENCES courses(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_groups_course
ON assignment_groups(course_id);

CREATE TABLE IF NOT EXISTS assignments (
id INTEGER NOT NULL UNIQUE,
name TEXT,
description TEXT,
due_at TEXT,
points_possible REAL,
uuid TEXT,
group_id INTEGER NOT NULL REFERENCES assignment_groups(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_assignments_group
ON assignments(group_id);

CREATE TABLE IF NOT EXISTS sync_meta (
k TEXT PRIMARY KEY,
v TEXT NOT NULL
);
"#,
        )?;
        // Ensure a schema version exists; default to 1
        self.conn.execute(
            "INSERT INTO sync_meta(k,v) VALUES('schema_version','1')
ON CONFLICT(k) DO NOTHING",
            [],
        )?;
        Ok(())
    }

    // ---- upserts ----------------------------------------------------------

    /// Insert-or-update keyed by remote id. A record that already exists
    /// updates in place; repeated passes never duplicate a row.
    pub fn upsert_term(&self, term: &Term) -> Result<(), SyncError> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO terms(id,name,start_at,end_at) VALUES (?1,?2,?3,?4)
ON CONFLICT(id) DO UPDATE SET
name=excluded.name, start_at=excluded.start_at, end_at=excluded.end_at",
            params![term.id, term.name, term.start_at, term.end_at],
        )?;
        tx.commit()?;
        Ok(())
    }

    pub fn upsert_course(&self, course: &Course) -> Result<(), SyncError> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO courses(id,name,account_id,uuid,course_code,enrollment_term_id,term_id)
VALUES (?1,?2,?3,?4,?5,?6,?7)
ON CONFLICT(id) DO UPDATE SET
name=excluded.name, account_id=excluded.account_id, uuid=excluded.uuid,
course_code=excluded.course_code, enrollment_term_id=excluded.enrollment_term_id,
term_id=excluded.term_id",
            params![
                course.id,
                course.name,
                course.account_id,
                course.uuid,
                course.course_code,
                course.enrollment_term_id,
                course.term_id,
            ],
        )?;
        tx.commit()?;
        Ok(())
    }

    pub fn upsert_group(&self, group: &AssignmentGroup) -> Result<(), SyncError> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO assignment_groups(id,name,weight,course_id) VALUES (?1,?2,?3,?4)
ON CONFLICT(id) DO UPDATE SET
name=excluded.name, weight=excluded.weight, course_id=excluded.course_id",
            params![group.id, group.name, group.weight, group.course_id],
        )?;
        tx.commit()?;
        Ok(())
    }

    pub fn upsert_assignment(&self, assignment: &Assignment) -> Result<(), SyncError> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO assignments(id,name,description,due_at,points_possible,uuid,group_id)
VALUES (?1,?2,?3,?4,?5,?6,?7)
ON CONFLICT(id) DO UPDATE SET
name=excluded.name, description=excluded.description, due_at=excluded.due_at,
points_possible=excluded.points_possible, uuid=excluded.uuid, group_id=excluded.group_id",
            params![
                assignment.id,
                assignment.name,
                assignment.description,
                assignment.due_at,
                assignment.points_possible,
                assignment.uuid,
                assignment.group_id,
            ],
        )?;
        tx.commit()?;
        Ok(())
    }

    // ---- lookups ----------------------------------------------------------

    pub fn get_term(&self, id: i64) -> Result<Option<Term>, SyncError> {
        let row = self
            .conn
            .query_row(
                "SELECT id,name,start_at,end_at FROM terms WHERE id=?1",
                params![id],
                term_from_row,
            )
            .optional()?;
        Ok(row)
    }

    pub fn get_course(&self, id: i64) -> Result<Option<Course>, SyncError> {
        let row = self
            .conn
            .query_row(
                "SELECT id,name,account_id,uuid,course_code,enrollment_term_id,term_id
FROM courses WHERE id=?1",
                params![id],
                course_from_row,
            )
            .optional()?;
        Ok(row)
    }

    pub fn get_group(&self, id: i64) -> Result<Option<AssignmentGroup>, SyncError> {
        let row = self
            .conn
            .query_row(
                "SELECT id,name,weight,course_id FROM assignment_groups WHERE id=?1",
                params![id],
                group_from_row,
            )
            .optional()?;
        Ok(row)
    }

    pub fn get_assignment(&self, id: i64) -> Result<Option<Assignment>, SyncError> {
        let row = self
            .conn
            .query_row(
                "SELECT id,name,description,due_at,points_possible,uuid,group_id
FROM assignments WHERE id=?1",
                params![id],
                assignment_from_row,
            )
            .optional()?;
        Ok(row)
    }

    /// All terms in insertion order.
    pub fn list_terms(&self) -> Result<Vec<Term>, SyncError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id,name,start_at,end_at FROM terms ORDER BY rowid ASC")?;
        let rows = stmt.query_map([], term_from_row)?;
        let mut out = Vec::new();
        for t in rows {
            out.push(t?);
        }
        Ok(out)
    }

    pub fn list_courses(&self, term_id: i64) -> Result<Vec<Course>, SyncError> {
        let mut stmt = self.conn.prepare(
            "SELECT id,name,account_id,uuid,course_code,enrollment_term_id,term_id
FROM courses WHERE term_id=?1 ORDER BY rowid ASC",
        )?;
        let rows = stmt.query_map(params![term_id], course_from_row)?;
        let mut out = Vec::new();
        for c in rows {
            out.push(c?);
        }
        Ok(out)
    }

    pub fn list_groups(&self, course_id: i64) -> Result<Vec<AssignmentGroup>, SyncError> {
        let mut stmt = self.conn.prepare(
            "SELECT id,name,weight,course_id
FROM assignment_groups WHERE course_id=?1 ORDER BY rowid ASC",
        )?;
        let rows = stmt.query_map(params![course_id], group_from_row)?;
        let mut out = Vec::new();
        for g in rows {
            out.push(g?);
        }
        Ok(out)
    }

    pub fn list_assignments(&self, group_id: i64) -> Result<Vec<Assignment>, SyncError> {
        let mut stmt = self.conn.prepare(
            "SELECT id,name,description,due_at,points_possible,uuid,group_id
FROM assignments WHERE group_id=?1 ORDER BY rowid ASC",
        )?;
        let rows = stmt.query_map(params![group_id], assignment_from_row)?;
        let mut out = Vec::new();
        for a in rows {
            out.push(a?);
        }
        Ok(out)
    }

    // ---- deletes (cascade via foreign keys) -------------------------------

    pub fn delete_term(&self, id: i64) -> Result<usize, SyncError> {
        Ok(self
            .conn
            .execute("DELETE FROM terms WHERE id=?1", params![id])?)
    }

    pub fn delete_all_terms(&self) -> Result<usize, SyncError> {
        Ok(self.conn.execute("DELETE FROM terms", [])?)
    }

    pub fn delete_course(&self, id: i64) -> Result<usize, SyncError> {
        Ok(self
            .conn
            .execute("DELETE FROM courses WHERE id=?1", params![id])?)
    }

    pub fn delete_courses_in_term(&self, term_id: i64) -> Result<usize, SyncError> {
        Ok(self
            .conn
            .execute("DELETE FROM courses WHERE term_id=?1", params![term_id])?)
    }

    pub fn delete_group(&self, id: i64) -> Result<usize, SyncError> {
        Ok(self
            .conn
            .execute("DELETE FROM assignment_groups WHERE id=?1", params![id])?)
    }

    pub fn delete_groups_in_course(&self, course_id: i64) -> Result<usize, SyncError> {
        Ok(self.conn.execute(
            "DELETE FROM assignment_groups WHERE course_id=?1",
            params![course_id],
        )?)
    }

    pub fn delete_assignment(&self, id: i64) -> Result<usize, SyncError> {
        Ok(self
            .conn
            .execute("DELETE FROM assignments WHERE id=?1", params![id])?)
    }

    pub fn delete_assignments_in_group(&self, group_id: i64) -> Result<usize, SyncError> {
        Ok(self.conn.execute(
            "DELETE FROM assignments WHERE group_id=?1",
            params![group_id],
        )?)
    }

    // ---- metadata ---------------------------------------------------------

    pub fn counts(&self) -> Result<Counts, SyncError> {
        let count = |table: &str| -> Result<i64, rusqlite::Error> {
            self.conn
                .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |r| r.get(0))
        };
        Ok(Counts {
            terms: count("terms")?,
            courses: count("courses")?,
            groups: count("assignment_groups")?,
            assignments: count("assignments")?,
        })
    }

    /// Stamp the completion of a sync pass.
    pub fn mark_synced(&self) -> Result<(), SyncError> {
        self.conn.execute(
            "INSERT INTO sync_meta(k,v) VALUES('last_synced_at',?1)
            ON CONFLICT(k) DO UPDATE SET v=excluded.v",
            params![Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn last_synced_at(&self) -> Result<Option<String>, SyncError> {
        let stamp: Option<String> = self
            .conn
            .query_row("SELECT v FROM sync_meta WHERE k='last_synced_at'", [], |r| {
                r.get(0)
            })
            .optional()?;
        Ok(stamp)
    }

    /// Return the current integer schema version stored in `sync_meta`.
    pub fn schema_version(&self) -> Result<i32, SyncError> {
        let ver: Option<String> = self
            .conn
            .query_row("SELECT v FROM sync_meta WHERE k='schema_version'", [], |r| {
                r.get(0)
            })
            .optional()?;
        Ok(ver.and_then(|s| s.parse::<i32>().ok()).unwrap_or(1))
    }

    /// Execute closure `f` inside a transaction and commit if `f` returns Ok.
    pub fn with_tx<R, F>(&self, f: F) -> Result<R, SyncError>
    where
        F: FnOnce(&rusqlite::Transaction<'_>) -> Result<R, SyncError>,
    {
        let tx = self.conn.unchecked_transaction()?;
        let result = f(&tx)?;
        tx.commit()?;
        Ok(result)
    }
}

fn term_from_row(r: &Row<'_>) -> rusqlite::Result<Term> {
    Ok(Term {
        id: r.get(0)?,
        name: r.get(1)?,
        start_at: r.get(2)?,
        end_at: r.get(3)?,
    })
}

fn course_from_row(r: &Row<'_>) -> rusqlite::Result<Course> {
    Ok(Course {
        id: r.get(0)?,
        name: r.get(1)?,
        account_id: r.get(2)?,
        uuid: r.get(3)?,
        course_code: r.get(4)?,
        enrollment_term_id: r.get(5)?,
        term_id: r.get(6)?,
    })
}

fn group_from_row(r: &Row<'_>) -> rusqlite::Result<AssignmentGroup> {
    Ok(AssignmentGroup {
        id: r.get(0)?,
        name: r.get(1)?,
        weight: r.get(2)?,
        course_id: r.get(3)?,
    })
}

fn assignment_from_row(r: &Row<'_>) -> rusqlite::Result<Assignment> {
    Ok(Assignment {
        id: r.get(0)?,
        name: r.get(1)?,
        description: r.get(2)?,
        due_at: r.get(3)?,
        points_possible: r.get(4)?,
        uuid: r.get(5)?,
        group_id: r.get(6)?,
    })
}
