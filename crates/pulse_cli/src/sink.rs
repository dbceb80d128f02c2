//! JSON-lines record output.
//!
//! Every created or changed record is written as one line:
//! `{"kind":"pull_request","target":"owner/name","record":{...}}`.
//! A record identical to one already written in this run is not written again.

use std::collections::HashMap;
use std::io::Write;
use std::sync::Mutex;

use async_trait::async_trait;
use pulse::api::{Member, PullRequest, RepoRef};
use pulse::sync::{ApplyOutcome, RecordSink, SinkError};
use serde::Serialize;

#[derive(Serialize)]
struct Line<'a, T> {
    kind: &'static str,
    target: &'a str,
    record: &'a T,
}

struct SinkState<W> {
    out: W,
    /// Last serialized record per key.
    written: HashMap<String, String>,
}

/// A [`RecordSink`] writing JSON lines to `W`.
pub struct JsonLinesSink<W> {
    state: Mutex<SinkState<W>>,
}

impl JsonLinesSink<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            state: Mutex::new(SinkState {
                out,
                written: HashMap::new(),
            }),
        }
    }

    /// Consume the sink and return the writer.
    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.state
            .into_inner()
            .unwrap_or_else(|e| e.into_inner())
            .out
    }

    fn write<T: Serialize>(
        &self,
        kind: &'static str,
        target: &str,
        key: String,
        record: &T,
    ) -> Result<ApplyOutcome, SinkError> {
        let line = serde_json::to_string(&Line {
            kind,
            target,
            record,
        })
        .map_err(|e| SinkError::new(format!("Failed to encode {kind}: {e}")))?;

        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let outcome = match state.written.get(&key) {
            Some(previous) if *previous == line => return Ok(ApplyOutcome::Unchanged),
            Some(_) => ApplyOutcome::Updated,
            None => ApplyOutcome::Created,
        };

        writeln!(state.out, "{line}")
            .and_then(|()| state.out.flush())
            .map_err(|e| SinkError::new(format!("Failed to write {kind}: {e}")))?;
        state.written.insert(key, line);
        Ok(outcome)
    }
}

#[async_trait]
impl<W: Write + Send> RecordSink for JsonLinesSink<W> {
    async fn apply_pull_request(
        &self,
        repo: &RepoRef,
        pull_request: &PullRequest,
    ) -> Result<ApplyOutcome, SinkError> {
        let target = repo.to_string();
        let key = format!("{target}#{}", pull_request.number);
        self.write("pull_request", &target, key, pull_request)
    }

    async fn apply_member(&self, org: &str, member: &Member) -> Result<ApplyOutcome, SinkError> {
        let key = format!("{org}@{}", member.id);
        self.write("member", org, key, member)
    }
}
