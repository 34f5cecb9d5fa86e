use std::collections::HashMap;
use std::time::Duration;

use crate::app_config::PollingConfig;
use crate::upstream::{Candidate, UpstreamApi, UpstreamError};

/// A single discovered candidate, carrying enough metadata to shape the
/// final output without a second upstream round-trip.
#[derive(Debug, Clone)]
pub struct AccumulatedCandidate {
    pub user_id: String,
    pub name: Option<String>,
    pub avatar: Option<String>,
    pub matched_intent_ids: Vec<String>,
}

impl From<Candidate> for AccumulatedCandidate {
    fn from(c: Candidate) -> Self {
        Self {
            user_id: c.user_id,
            name: c.name,
            avatar: c.avatar,
            matched_intent_ids: c.matched_intent_ids,
        }
    }
}

/// Runs the accumulate-and-stabilize polling loop against the upstream
/// candidate-filter endpoint. First-seen metadata wins; later polls never
/// overwrite an already-accumulated candidate's fields. `UpstreamTokenInvalid`
/// is the only error that aborts the loop instead of being tolerated.
pub async fn accumulate_and_stabilize(
    client: &dyn UpstreamApi,
    upstream_bearer: &str,
    intent_ids: &[String],
    max_connections: usize,
    pagination_limit: usize,
    config: &PollingConfig,
) -> Result<Vec<AccumulatedCandidate>, UpstreamError> {
    let mut accumulated: Vec<AccumulatedCandidate> = Vec::new();
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut last_count = 0usize;
    let mut stable_runs = 0u32;
    let mut elapsed_sleep_ms: u64 = 0;

    for attempt in 0..config.max_attempts {
        let page = match client
            .filter_candidates(
                upstream_bearer,
                intent_ids,
                1,
                max_connections.min(pagination_limit),
                true,
            )
            .await
        {
            Ok(page) => page,
            Err(err) if err.is_token_invalid() => return Err(err),
            Err(_) => continue,
        };

        for candidate in page.results {
            if accumulated.len() >= max_connections {
                break;
            }
            if !seen.contains_key(&candidate.user_id) {
                seen.insert(candidate.user_id.clone(), accumulated.len());
                accumulated.push(candidate.into());
            }
        }

        if accumulated.len() >= max_connections {
            break;
        }

        if accumulated.len() == last_count && !accumulated.is_empty() {
            stable_runs += 1;
        } else {
            stable_runs = 0;
            last_count = accumulated.len();
        }

        if stable_runs >= config.stable_threshold {
            break;
        }
        if attempt + 1 >= config.max_attempts {
            break;
        }

        let next_delay = config.base_delay_ms + (attempt as u64) * config.delay_step_ms;
        let remaining = config.max_total_wait_ms.saturating_sub(elapsed_sleep_ms);
        let sleep_for = next_delay.min(remaining);
        if sleep_for == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(sleep_for)).await;
        elapsed_sleep_ms += sleep_for;
    }

    Ok(accumulated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upstream::{CandidatePage, Candidate, ExtractIntentsResult, Pagination, SynthesisResult};
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct ScriptedUpstream {
        pages: Mutex<Vec<Vec<Candidate>>>,
    }

    fn candidate(id: &str) -> Candidate {
        Candidate {
            user_id: id.to_string(),
            name: Some(id.to_string()),
            avatar: None,
            matched_intent_ids: vec!["intent-1".to_string()],
        }
    }

    #[async_trait]
    impl UpstreamApi for ScriptedUpstream {
        async fn extract_intents(
            &self,
            _upstream_bearer: &str,
            _text: &str,
        ) -> Result<ExtractIntentsResult, UpstreamError> {
            unimplemented!("not exercised by the polling test")
        }

        async fn filter_candidates(
            &self,
            _upstream_bearer: &str,
            _intent_ids: &[String],
            _page: u32,
            _limit: usize,
            _exclude_discovered: bool,
        ) -> Result<CandidatePage, UpstreamError> {
            let mut pages = self.pages.lock().unwrap();
            let results = if pages.is_empty() {
                Vec::new()
            } else {
                pages.remove(0)
            };
            Ok(CandidatePage {
                results,
                pagination: Pagination { has_next: false },
            })
        }

        async fn synthesize(
            &self,
            _upstream_bearer: &str,
            target_user_id: &str,
            _intent_ids: &[String],
            _character_limit: Option<usize>,
        ) -> Result<SynthesisResult, UpstreamError> {
            Ok(SynthesisResult {
                target_user_id: target_user_id.to_string(),
                synthesis: String::new(),
            })
        }
    }

    fn fast_config() -> PollingConfig {
        PollingConfig {
            max_attempts: 8,
            base_delay_ms: 1,
            delay_step_ms: 1,
            stable_threshold: 2,
            max_total_wait_ms: 100,
        }
    }

    #[tokio::test]
    async fn stabilizes_on_the_exact_spec_sequence() {
        // [], [A], [A,B], [A,B] -- stable_threshold=2 should stop right after
        // the second identical poll, having accumulated both A and B.
        let upstream = ScriptedUpstream {
            pages: Mutex::new(vec![
                vec![],
                vec![candidate("A")],
                vec![candidate("A"), candidate("B")],
                vec![candidate("A"), candidate("B")],
            ]),
        };

        let result = accumulate_and_stabilize(
            &upstream,
            "upstream-bearer",
            &["intent-1".to_string()],
            50,
            100,
            &fast_config(),
        )
        .await
        .unwrap();

        let ids: Vec<&str> = result.iter().map(|c| c.user_id.as_str()).collect();
        assert_eq!(ids, vec!["A", "B"]);
    }

    #[tokio::test]
    async fn stops_at_max_connections_without_waiting_for_stability() {
        let upstream = ScriptedUpstream {
            pages: Mutex::new(vec![vec![candidate("A"), candidate("B"), candidate("C")]]),
        };

        let result = accumulate_and_stabilize(
            &upstream,
            "upstream-bearer",
            &["intent-1".to_string()],
            1,
            100,
            &fast_config(),
        )
        .await
        .unwrap();

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].user_id, "A");
    }

    #[test]
    fn stability_config_defaults_match_spec() {
        let config = PollingConfig {
            max_attempts: 8,
            base_delay_ms: 300,
            delay_step_ms: 200,
            stable_threshold: 2,
            max_total_wait_ms: 5000,
        };
        assert_eq!(config.base_delay_ms + config.delay_step_ms, 500);
    }
}
