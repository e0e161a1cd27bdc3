//! Merge Orchestrator - groups -> prompts -> service calls -> extraction -> fallback
//!
//! Groups are processed one at a time in first-seen key order. A merge group
//! whose call, extraction or result shape fails keeps all of its original rows,
//! so no input record is ever dropped.

use crate::config::{FieldPolicy, MergeConfig};
use crate::error::{MergeError, Result};
use crate::extract::extract_json_with_strategy;
use crate::grouping::{build_groups, DuplicateGroup, GroupKind};
use crate::llm::MergeService;
use crate::normalize::attach_group_key;
use crate::prompt::compose_merge_prompt;
use crate::record::{OutputTable, Record, FULL_NAME, GROUP_KEY_FIELD};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackKind {
    Transport,
    Extraction,
    MalformedResult,
    Prompt,
    CapReached,
}

impl FallbackKind {
    fn from_error(err: &MergeError) -> Self {
        match err {
            MergeError::Transport(_) => FallbackKind::Transport,
            MergeError::Extraction(_) => FallbackKind::Extraction,
            MergeError::MalformedResult(_) => FallbackKind::MalformedResult,
            _ => FallbackKind::Prompt,
        }
    }
}

/// A merge group that kept its original rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupFallback {
    pub key: String,
    pub rows: usize,
    pub kind: FallbackKind,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub input_rows: usize,
    pub output_rows: usize,
    pub groups: usize,
    pub merge_groups: usize,
    pub merged: usize,
    pub fell_back: usize,
    pub skipped_by_cap: usize,
    pub fallbacks: Vec<GroupFallback>,
}

impl MergeReport {
    fn new(input_rows: usize) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            input_rows,
            output_rows: 0,
            groups: 0,
            merge_groups: 0,
            merged: 0,
            fell_back: 0,
            skipped_by_cap: 0,
            fallbacks: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub table: OutputTable,
    pub report: MergeReport,
}

pub struct MergeOrchestrator {
    service: Box<dyn MergeService>,
    config: MergeConfig,
}

impl MergeOrchestrator {
    pub fn new(service: Box<dyn MergeService>, config: MergeConfig) -> Self {
        Self { service, config }
    }

    /// Run the whole pipeline over harmonized records.
    pub async fn run(&self, mut records: Vec<Record>) -> MergeOutcome {
        let mut report = MergeReport::new(records.len());
        info!("Merge run {} starting with {} rows", report.run_id, records.len());

        for record in records.iter_mut() {
            attach_group_key(record);
        }

        let groups = build_groups(records);
        report.groups = groups.len();
        report.merge_groups = groups.iter().filter(|g| g.kind() == GroupKind::Merge).count();
        info!("Found {} potential duplicate groups to process...", report.merge_groups);

        let mut output: Vec<Record> = Vec::new();

        for group in groups {
            if group.kind() == GroupKind::Passthrough {
                output.extend(group.records);
                continue;
            }

            if let Some(cap) = self.config.max_groups {
                if report.merged >= cap {
                    debug!("Merge cap of {} reached; keeping '{}' as is", cap, group.display_name());
                    report.skipped_by_cap += 1;
                    report.fallbacks.push(GroupFallback {
                        key: group.key.clone(),
                        rows: group.len(),
                        kind: FallbackKind::CapReached,
                        reason: format!("merge cap of {} reached", cap),
                    });
                    output.extend(group.records);
                    continue;
                }
            }

            info!("Merging records for '{}'... ({} candidates)", group.display_name(), group.len());

            match self.merge_group(&group).await {
                Ok(merged) => {
                    report.merged += 1;
                    output.push(merged);
                }
                Err(e) => {
                    if e.is_recoverable() {
                        warn!(
                            "LLM merge failed for '{}': {}. Keeping original records for this group.",
                            group.display_name(),
                            e
                        );
                    } else {
                        error!(
                            "Could not prepare merge for '{}': {}. Keeping original records for this group.",
                            group.display_name(),
                            e
                        );
                    }
                    report.fell_back += 1;
                    report.fallbacks.push(GroupFallback {
                        key: group.key.clone(),
                        rows: group.len(),
                        kind: FallbackKind::from_error(&e),
                        reason: e.to_string(),
                    });
                    output.extend(group.records);
                }
            }
        }

        let table = OutputTable::from_records(output);
        report.output_rows = table.len();
        info!(
            "Merge run {} finished: {} merged, {} fell back, {} skipped by cap, {} output rows",
            report.run_id, report.merged, report.fell_back, report.skipped_by_cap, report.output_rows
        );

        MergeOutcome { table, report }
    }

    /// Fold one merge group into a single record via the service.
    pub async fn merge_group(&self, group: &DuplicateGroup) -> Result<Record> {
        let prompt = compose_merge_prompt(&group.records)?;
        let raw = self.service.generate(&prompt).await?;

        let (value, strategy) = extract_json_with_strategy(&raw).ok_or_else(|| {
            MergeError::Extraction("LLM response was not valid JSON after multiple extraction attempts".to_string())
        })?;
        debug!("Extracted merge result for '{}' via {:?}", group.key, strategy);

        let object = match value {
            Value::Object(object) => object,
            other => {
                return Err(MergeError::MalformedResult(format!(
                    "expected a JSON object, got {}",
                    json_kind(&other)
                )))
            }
        };

        let mut merged = Record::from_json_object(&object);
        merged.remove(GROUP_KEY_FIELD);

        if self.config.field_policy == FieldPolicy::RestrictToInput {
            restrict_to_input_fields(&mut merged, &group.records);
        }

        attach_group_key(&mut merged);
        Ok(merged)
    }
}

/// Drop fields the service invented; `FullName` always survives.
fn restrict_to_input_fields(merged: &mut Record, inputs: &[Record]) {
    let allowed: HashSet<&str> = inputs.iter().flat_map(|r| r.field_names()).collect();
    let invented: Vec<String> = merged
        .field_names()
        .filter(|f| *f != FULL_NAME && !allowed.contains(f))
        .map(str::to_string)
        .collect();
    for field in invented {
        debug!("Dropping field '{}' not present in the input rows", field);
        merged.remove(&field);
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Replies with queued responses in order; an exhausted queue is a transport error.
    struct Scripted {
        replies: Mutex<Vec<Result<String>>>,
        prompts: std::sync::Arc<Mutex<Vec<String>>>,
    }

    impl Scripted {
        fn new(replies: Vec<Result<String>>) -> Self {
            let mut replies = replies;
            replies.reverse();
            Self { replies: Mutex::new(replies), prompts: Default::default() }
        }
    }

    #[async_trait]
    impl MergeService for Scripted {
        async fn generate(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.replies
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Err(MergeError::Transport("no scripted reply".to_string())))
        }
    }

    fn jane_rows() -> Vec<Record> {
        vec![
            Record::from_pairs([("FullName", Some("Jane Doe")), ("email", Some("jane@x.com"))]),
            Record::from_pairs([("FullName", Some("jane doe")), ("company", Some("Acme"))]),
        ]
    }

    fn orchestrator(replies: Vec<Result<String>>, config: MergeConfig) -> MergeOrchestrator {
        MergeOrchestrator::new(Box::new(Scripted::new(replies)), config)
    }

    #[tokio::test]
    async fn test_successful_merge_replaces_group() {
        let reply = r#"{"FullName":"Jane Doe","email":"jane@x.com","company":"Acme","normalized_name":"bogus"}"#;
        let orch = orchestrator(vec![Ok(reply.to_string())], MergeConfig::default());
        let outcome = orch.run(jane_rows()).await;

        assert_eq!(outcome.table.len(), 1);
        assert_eq!(outcome.table.columns, vec!["FullName", "email", "company"]);
        assert_eq!(outcome.table.rows[0].get("company"), Some("Acme"));
        assert_eq!(outcome.report.merged, 1);
        assert_eq!(outcome.report.fell_back, 0);
    }

    #[tokio::test]
    async fn test_transport_failure_keeps_originals() {
        let orch = orchestrator(vec![Err(MergeError::Transport("503".to_string()))], MergeConfig::default());
        let outcome = orch.run(jane_rows()).await;

        assert_eq!(outcome.table.len(), 2);
        assert_eq!(outcome.table.rows[0].get("email"), Some("jane@x.com"));
        assert_eq!(outcome.table.rows[1].get("company"), Some("Acme"));
        assert_eq!(outcome.report.fallbacks[0].kind, FallbackKind::Transport);
    }

    #[tokio::test]
    async fn test_unparseable_and_non_object_replies_fall_back() {
        for (reply, kind) in [
            ("Sorry, I can't do that.", FallbackKind::Extraction),
            (r#"[{"FullName":"Jane Doe"}]"#, FallbackKind::MalformedResult),
            ("\"Jane Doe\"", FallbackKind::MalformedResult),
        ] {
            let orch = orchestrator(vec![Ok(reply.to_string())], MergeConfig::default());
            let outcome = orch.run(jane_rows()).await;
            assert_eq!(outcome.table.len(), 2, "{}", reply);
            assert_eq!(outcome.report.fallbacks[0].kind, kind);
        }
    }

    #[tokio::test]
    async fn test_passthrough_groups_skip_the_service() {
        let rows = vec![
            Record::from_pairs([("FullName", Some("")), ("email", Some("a@x.com"))]),
            Record::from_pairs([("FullName", Some("")), ("email", Some("b@x.com"))]),
            Record::from_pairs([("FullName", Some("Solo"))]),
        ];
        let service = Scripted::new(vec![]);
        let prompts = service.prompts.clone();
        let orch = MergeOrchestrator::new(Box::new(service), MergeConfig::default());
        let outcome = orch.run(rows).await;

        assert_eq!(outcome.table.len(), 3);
        assert_eq!(outcome.report.merge_groups, 0);
        assert!(prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cap_stops_new_merges_only() {
        let rows = vec![
            Record::from_pairs([("FullName", Some("Ann"))]),
            Record::from_pairs([("FullName", Some("ann"))]),
            Record::from_pairs([("FullName", Some("Bob"))]),
            Record::from_pairs([("FullName", Some("bob"))]),
            Record::from_pairs([("FullName", Some("Cy"))]),
        ];
        let config = MergeConfig { max_groups: Some(1), ..MergeConfig::default() };
        let orch = orchestrator(vec![Ok(r#"{"FullName":"Ann"}"#.to_string())], config);
        let outcome = orch.run(rows).await;

        let names: Vec<&str> = outcome.table.rows.iter().map(|r| r.full_name()).collect();
        assert_eq!(names, vec!["Ann", "Bob", "bob", "Cy"]);
        assert_eq!(outcome.report.skipped_by_cap, 1);
        assert_eq!(outcome.report.fallbacks[0].kind, FallbackKind::CapReached);
    }

    #[tokio::test]
    async fn test_restrict_policy_drops_invented_fields() {
        let reply = r#"{"FullName":"Jane Doe","email":"jane@x.com","linkedin":"jdoe"}"#;
        let config = MergeConfig { field_policy: FieldPolicy::RestrictToInput, ..MergeConfig::default() };
        let orch = orchestrator(vec![Ok(reply.to_string())], config);
        let outcome = orch.run(jane_rows()).await;

        assert_eq!(outcome.table.columns, vec!["FullName", "email"]);
    }

    #[tokio::test]
    async fn test_trust_policy_keeps_invented_fields() {
        let reply = r#"{"FullName":"Jane Doe","linkedin":"jdoe"}"#;
        let orch = orchestrator(vec![Ok(reply.to_string())], MergeConfig::default());
        let outcome = orch.run(jane_rows()).await;

        assert_eq!(outcome.table.rows[0].get("linkedin"), Some("jdoe"));
    }

    #[tokio::test]
    async fn test_prompt_sent_for_merge_group() {
        let service = Scripted::new(vec![Ok("{}".to_string())]);
        let prompts = service.prompts.clone();
        let orch = MergeOrchestrator::new(Box::new(service), MergeConfig::default());
        orch.run(jane_rows()).await;

        let prompts = prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("\"company\": \"Acme\""));
        assert!(!prompts[0].contains(GROUP_KEY_FIELD));
    }
}
