use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, info};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{migrate::MigrateDatabase, Row, Sqlite};

use crate::config::Config;
use crate::error::ResultsError;
use crate::models::{
    Ballot, BallotChoice, Candidate, Election, ElectionStatus, QuorumPolicy, Voter,
};
use crate::store::ElectionStore;

pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn from_config(config: &Config) -> Result<Self, ResultsError> {
        Self::connect(&config.database_url, config.max_connections).await
    }

    pub async fn connect(db_url: &str, max_connections: u32) -> Result<Self, ResultsError> {
        // Create database file if it doesn't exist
        if !db_url.contains(":memory:") && !Sqlite::database_exists(db_url).await.unwrap_or(false) {
            info!("Creating database at {}", db_url);
            Sqlite::create_database(db_url).await?;
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(db_url)
            .await?;

        Self::init_schema(&pool).await?;

        Ok(Self { pool })
    }

    async fn init_schema(pool: &SqlitePool) -> Result<(), ResultsError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS elections (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                description TEXT NOT NULL,
                voting_method TEXT NOT NULL,
                is_secret BOOLEAN NOT NULL,
                is_weighted BOOLEAN NOT NULL,
                allow_abstention BOOLEAN NOT NULL,
                quorum_type TEXT NOT NULL,
                quorum_value REAL NOT NULL,
                status TEXT NOT NULL,
                start_at TEXT NOT NULL,
                end_at TEXT NOT NULL
            );
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS candidates (
                id TEXT PRIMARY KEY,
                election_id TEXT NOT NULL,
                name TEXT NOT NULL,
                description TEXT NOT NULL,
                position INTEGER NOT NULL,
                list_id TEXT,
                FOREIGN KEY (election_id) REFERENCES elections(id) ON DELETE CASCADE
            );
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS voters (
                id TEXT PRIMARY KEY,
                election_id TEXT NOT NULL,
                email TEXT NOT NULL,
                name TEXT NOT NULL,
                weight REAL NOT NULL DEFAULT 1.0,
                has_voted BOOLEAN NOT NULL DEFAULT FALSE,
                invited_at TEXT NOT NULL,
                FOREIGN KEY (election_id) REFERENCES elections(id) ON DELETE CASCADE
            );
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS ballots (
                voter_id TEXT NOT NULL,
                election_id TEXT NOT NULL,
                choice TEXT NOT NULL,
                cast_at TEXT NOT NULL,
                PRIMARY KEY (voter_id, election_id),
                FOREIGN KEY (election_id) REFERENCES elections(id) ON DELETE CASCADE,
                FOREIGN KEY (voter_id) REFERENCES voters(id) ON DELETE CASCADE
            );
            "#,
        )
        .execute(pool)
        .await?;

        Ok(())
    }

    pub async fn create_election(&self, election: &Election) -> Result<(), ResultsError> {
        sqlx::query(
            r#"
            INSERT INTO elections (id, title, description, voting_method, is_secret, is_weighted,
                allow_abstention, quorum_type, quorum_value, status, start_at, end_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&election.id)
        .bind(&election.title)
        .bind(&election.description)
        .bind(election.voting_method.as_str())
        .bind(election.is_secret)
        .bind(election.is_weighted)
        .bind(election.allow_abstention)
        .bind(election.quorum.kind.as_str())
        .bind(election.quorum.threshold)
        .bind(election.status.as_str())
        .bind(election.start_at.to_rfc3339())
        .bind(election.end_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn add_candidate(&self, candidate: &Candidate) -> Result<(), ResultsError> {
        sqlx::query(
            r#"
            INSERT INTO candidates (id, election_id, name, description, position, list_id)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&candidate.id)
        .bind(&candidate.election_id)
        .bind(&candidate.name)
        .bind(&candidate.description)
        .bind(candidate.position)
        .bind(&candidate.list_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn add_voter(&self, voter: &Voter) -> Result<(), ResultsError> {
        if !voter.weight.is_finite() || voter.weight <= 0.0 {
            return Err(ResultsError::Validation(format!(
                "voter weight must be positive, got {}",
                voter.weight
            )));
        }

        sqlx::query(
            r#"
            INSERT INTO voters (id, election_id, email, name, weight, has_voted, invited_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&voter.id)
        .bind(&voter.election_id)
        .bind(&voter.email)
        .bind(&voter.name)
        .bind(voter.weight)
        .bind(voter.has_voted)
        .bind(voter.invited_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // Record a ballot and mark the voter as having voted, atomically
    pub async fn cast_ballot(&self, ballot: &Ballot) -> Result<(), ResultsError> {
        let mut tx = self.pool.begin().await?;

        let status: Option<String> = sqlx::query_scalar("SELECT status FROM elections WHERE id = ?")
            .bind(&ballot.election_id)
            .fetch_optional(&mut *tx)
            .await?;
        match status {
            None => return Err(ResultsError::not_found("election", ballot.election_id.as_str())),
            Some(s) if s != ElectionStatus::Active.as_str() => {
                return Err(ResultsError::Validation(format!(
                    "election {} is {}, not accepting ballots",
                    ballot.election_id, s
                )));
            }
            Some(_) => {}
        }

        let has_voted: Option<bool> =
            sqlx::query_scalar("SELECT has_voted FROM voters WHERE id = ? AND election_id = ?")
                .bind(&ballot.voter_id)
                .bind(&ballot.election_id)
                .fetch_optional(&mut *tx)
                .await?;
        match has_voted {
            None => return Err(ResultsError::not_found("voter", ballot.voter_id.as_str())),
            Some(true) => {
                return Err(ResultsError::Validation(format!(
                    "voter {} has already voted",
                    ballot.voter_id
                )));
            }
            Some(false) => {}
        }

        sqlx::query(
            r#"
            INSERT INTO ballots (voter_id, election_id, choice, cast_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(&ballot.voter_id)
        .bind(&ballot.election_id)
        .bind(serde_json::to_string(&ballot.choice)?)
        .bind(ballot.cast_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE voters SET has_voted = TRUE WHERE id = ?")
            .bind(&ballot.voter_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        debug!("Recorded ballot for voter {} in election {}", ballot.voter_id, ballot.election_id);
        Ok(())
    }

    pub async fn set_status(&self, election_id: &str, status: ElectionStatus) -> Result<(), ResultsError> {
        let result = sqlx::query("UPDATE elections SET status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(election_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ResultsError::not_found("election", election_id));
        }
        Ok(())
    }

    /// Move an active election to closed. Returns false if it was not active.
    pub async fn close_election(&self, election_id: &str) -> Result<bool, ResultsError> {
        let result = sqlx::query(
            r#"
            UPDATE elections
            SET status = 'closed'
            WHERE id = ? AND status = 'active'
            "#,
        )
        .bind(election_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    // Active elections whose end time has passed
    pub async fn get_elections_due_for_close(&self, now: DateTime<Utc>) -> Result<Vec<String>, ResultsError> {
        let ids = sqlx::query_scalar(
            r#"
            SELECT id
            FROM elections
            WHERE status = 'active' AND end_at < ?
            ORDER BY end_at
            "#,
        )
        .bind(now.to_rfc3339())
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }
}

#[async_trait]
impl ElectionStore for Database {
    async fn fetch_election(&self, election_id: &str) -> Result<Election, ResultsError> {
        let row = sqlx::query(
            r#"
            SELECT id, title, description, voting_method, is_secret, is_weighted, allow_abstention,
                quorum_type, quorum_value, status, start_at, end_at
            FROM elections
            WHERE id = ?
            "#,
        )
        .bind(election_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| ResultsError::not_found("election", election_id))?;

        election_from_row(&row)
    }

    async fn fetch_candidates(&self, election_id: &str) -> Result<Vec<Candidate>, ResultsError> {
        let candidates = sqlx::query(
            r#"
            SELECT id, election_id, name, description, position, list_id
            FROM candidates
            WHERE election_id = ?
            ORDER BY position
            "#,
        )
        .bind(election_id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(|row| Candidate {
            id: row.get("id"),
            election_id: row.get("election_id"),
            name: row.get("name"),
            description: row.get("description"),
            position: row.get("position"),
            list_id: row.get("list_id"),
        })
        .collect();

        Ok(candidates)
    }

    async fn fetch_voters(&self, election_id: &str) -> Result<Vec<Voter>, ResultsError> {
        let rows = sqlx::query(
            r#"
            SELECT id, election_id, email, name, weight, has_voted, invited_at
            FROM voters
            WHERE election_id = ?
            "#,
        )
        .bind(election_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<Voter, ResultsError> {
                Ok(Voter {
                    id: row.get("id"),
                    election_id: row.get("election_id"),
                    email: row.get("email"),
                    name: row.get("name"),
                    weight: row.get("weight"),
                    has_voted: row.get("has_voted"),
                    invited_at: parse_timestamp(row, "invited_at")?,
                })
            })
            .collect()
    }

    async fn fetch_ballots(&self, election_id: &str) -> Result<Vec<Ballot>, ResultsError> {
        let rows = sqlx::query(
            r#"
            SELECT voter_id, election_id, choice, cast_at
            FROM ballots
            WHERE election_id = ?
            "#,
        )
        .bind(election_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<Ballot, ResultsError> {
                let choice: BallotChoice = serde_json::from_str(row.get::<&str, _>("choice"))?;
                Ok(Ballot {
                    voter_id: row.get("voter_id"),
                    election_id: row.get("election_id"),
                    choice,
                    cast_at: parse_timestamp(row, "cast_at")?,
                })
            })
            .collect()
    }
}

fn election_from_row(row: &SqliteRow) -> Result<Election, ResultsError> {
    Ok(Election {
        id: row.get("id"),
        title: row.get("title"),
        description: row.get("description"),
        voting_method: row.get::<&str, _>("voting_method").parse()?,
        is_secret: row.get("is_secret"),
        is_weighted: row.get("is_weighted"),
        allow_abstention: row.get("allow_abstention"),
        quorum: QuorumPolicy {
            kind: row.get::<&str, _>("quorum_type").parse()?,
            threshold: row.get("quorum_value"),
        },
        status: row.get::<&str, _>("status").parse()?,
        start_at: parse_timestamp(row, "start_at")?,
        end_at: parse_timestamp(row, "end_at")?,
    })
}

fn parse_timestamp(row: &SqliteRow, column: &str) -> Result<DateTime<Utc>, ResultsError> {
    let raw: &str = row.get(column);
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| ResultsError::Validation(format!("Failed to parse {}: {}", column, e)))
}
