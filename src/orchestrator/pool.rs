use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::app_config::SynthesisPoolConfig;
use crate::upstream::{UpstreamApi, UpstreamError};

use super::polling::AccumulatedCandidate;

/// Runs `synthesize` calls for every accumulated candidate with a bounded
/// number of concurrent workers. Workers claim the next candidate through a
/// shared atomic index rather than being handed a fixed slice, so the
/// concurrency bound is exact regardless of how unevenly the calls complete.
/// A single `UpstreamTokenInvalid` cancels the remaining work; any other
/// per-candidate failure degrades to an empty synthesis string.
pub async fn synthesize_all(
    client: Arc<dyn UpstreamApi>,
    upstream_bearer: Arc<String>,
    intent_ids: Arc<Vec<String>>,
    candidates: &[AccumulatedCandidate],
    character_limit: Option<usize>,
    config: &SynthesisPoolConfig,
) -> Result<HashMap<String, String>, UpstreamError> {
    if candidates.is_empty() {
        return Ok(HashMap::new());
    }

    let effective = config
        .default_concurrency
        .min(config.max_concurrency)
        .min(candidates.len())
        .max(1);

    let claim_index = Arc::new(AtomicUsize::new(0));
    let user_ids: Arc<Vec<String>> = Arc::new(candidates.iter().map(|c| c.user_id.clone()).collect());
    let throttle = Duration::from_millis(config.throttle_ms);

    let mut join_set = tokio::task::JoinSet::new();
    for _ in 0..effective {
        let client = client.clone();
        let bearer = upstream_bearer.clone();
        let intent_ids = intent_ids.clone();
        let user_ids = user_ids.clone();
        let claim_index = claim_index.clone();

        join_set.spawn(async move {
            let mut results: Vec<(String, String)> = Vec::new();
            loop {
                let index = claim_index.fetch_add(1, Ordering::SeqCst);
                if index >= user_ids.len() {
                    break;
                }
                let user_id = &user_ids[index];
                match client
                    .synthesize(&bearer, user_id, &intent_ids, character_limit)
                    .await
                {
                    Ok(result) => results.push((user_id.clone(), result.synthesis)),
                    Err(err) if err.is_token_invalid() => return Err(err),
                    Err(_) => results.push((user_id.clone(), String::new())),
                }
                tokio::time::sleep(throttle).await;
            }
            Ok(results)
        });
    }

    let mut synthesis_by_user = HashMap::new();
    while let Some(joined) = join_set.join_next().await {
        let worker_result = joined.map_err(|err| UpstreamError::Transport(err.to_string()))?;
        match worker_result {
            Ok(pairs) => {
                for (user_id, synthesis) in pairs {
                    synthesis_by_user.insert(user_id, synthesis);
                }
            }
            Err(err) => {
                join_set.abort_all();
                return Err(err);
            }
        }
    }

    Ok(synthesis_by_user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upstream::{CandidatePage, ExtractIntentsResult, SynthesisResult};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize as StdAtomicUsize};

    struct InflightTrackingUpstream {
        inflight: Arc<StdAtomicUsize>,
        max_observed: Arc<StdAtomicUsize>,
    }

    #[async_trait]
    impl UpstreamApi for InflightTrackingUpstream {
        async fn extract_intents(
            &self,
            _upstream_bearer: &str,
            _text: &str,
        ) -> Result<ExtractIntentsResult, UpstreamError> {
            unimplemented!()
        }

        async fn filter_candidates(
            &self,
            _upstream_bearer: &str,
            _intent_ids: &[String],
            _page: u32,
            _limit: usize,
            _exclude_discovered: bool,
        ) -> Result<CandidatePage, UpstreamError> {
            unimplemented!()
        }

        async fn synthesize(
            &self,
            _upstream_bearer: &str,
            target_user_id: &str,
            _intent_ids: &[String],
            _character_limit: Option<usize>,
        ) -> Result<SynthesisResult, UpstreamError> {
            let current = self.inflight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_observed.fetch_max(current, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.inflight.fetch_sub(1, Ordering::SeqCst);
            Ok(SynthesisResult {
                target_user_id: target_user_id.to_string(),
                synthesis: format!("synthesis-for-{target_user_id}"),
            })
        }
    }

    fn candidates(n: usize) -> Vec<AccumulatedCandidate> {
        (0..n)
            .map(|i| AccumulatedCandidate {
                user_id: format!("user-{i}"),
                name: None,
                avatar: None,
                matched_intent_ids: vec![],
            })
            .collect()
    }

    #[tokio::test]
    async fn never_exceeds_the_concurrency_bound() {
        let inflight = Arc::new(StdAtomicUsize::new(0));
        let max_observed = Arc::new(StdAtomicUsize::new(0));
        let upstream: Arc<dyn UpstreamApi> = Arc::new(InflightTrackingUpstream {
            inflight: inflight.clone(),
            max_observed: max_observed.clone(),
        });

        let config = SynthesisPoolConfig {
            default_concurrency: 2,
            max_concurrency: 5,
            throttle_ms: 0,
        };

        let result = synthesize_all(
            upstream,
            Arc::new("bearer".to_string()),
            Arc::new(vec!["intent-1".to_string()]),
            &candidates(5),
            None,
            &config,
        )
        .await
        .unwrap();

        assert_eq!(result.len(), 5);
        assert!(max_observed.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn partial_failures_yield_empty_synthesis_not_an_error() {
        struct FlakyUpstream;

        #[async_trait]
        impl UpstreamApi for FlakyUpstream {
            async fn extract_intents(
                &self,
                _upstream_bearer: &str,
                _text: &str,
            ) -> Result<ExtractIntentsResult, UpstreamError> {
                unimplemented!()
            }

            async fn filter_candidates(
                &self,
                _upstream_bearer: &str,
                _intent_ids: &[String],
                _page: u32,
                _limit: usize,
                _exclude_discovered: bool,
            ) -> Result<CandidatePage, UpstreamError> {
                unimplemented!()
            }

            async fn synthesize(
                &self,
                _upstream_bearer: &str,
                target_user_id: &str,
                _intent_ids: &[String],
                _character_limit: Option<usize>,
            ) -> Result<SynthesisResult, UpstreamError> {
                Err(UpstreamError::Status(503))
            }
        }

        let config = SynthesisPoolConfig {
            default_concurrency: 2,
            max_concurrency: 5,
            throttle_ms: 0,
        };

        let result = synthesize_all(
            Arc::new(FlakyUpstream),
            Arc::new("bearer".to_string()),
            Arc::new(vec![]),
            &candidates(3),
            None,
            &config,
        )
        .await
        .unwrap();

        assert_eq!(result.len(), 3);
        assert!(result.values().all(|s| s.is_empty()));
    }
}
