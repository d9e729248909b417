//! Compile many VUs at once on a small pool of worker threads.
//!
//! The schema is read-only and every VU compiles independently, so workers
//! share nothing but the queue of pending indices and the result slots.

use std::collections::VecDeque;
use std::num::NonZeroUsize;
use std::thread;

use parking_lot::Mutex;

use crate::dsl::optimize::Build;
use crate::dsl::{compile_vu, RenderOptions, VuOutcome, VuRequest};
use crate::schema::Schema;

/// Worker count when none is given: one per core.
pub fn default_workers() -> usize {
    thread::available_parallelism().map_or(1, NonZeroUsize::get)
}

/// Compile every request, returning outcomes in request order. A failing VU
/// only fails its own slot.
pub fn compile_all(
    requests: &[VuRequest],
    schema: &Schema,
    build: &Build,
    options: RenderOptions,
    workers: usize,
) -> Vec<VuOutcome> {
    let workers = workers.clamp(1, requests.len().max(1));
    if workers == 1 {
        return requests
            .iter()
            .map(|r| compile_vu(r, schema, build, options))
            .collect();
    }

    let queue: Mutex<VecDeque<usize>> = Mutex::new((0..requests.len()).collect());
    let results: Mutex<Vec<Option<VuOutcome>>> = Mutex::new(vec![None; requests.len()]);

    thread::scope(|scope| {
        for _ in 0..workers {
            scope.spawn(|| loop {
                // Hold the queue lock only long enough to take one index.
                let next = queue.lock().pop_front();
                let Some(index) = next else {
                    break;
                };
                let Some(request) = requests.get(index) else {
                    continue;
                };
                let outcome = compile_vu(request, schema, build, options);
                if let Some(slot) = results.lock().get_mut(index) {
                    *slot = Some(outcome);
                }
            });
        }
    });

    results
        .into_inner()
        .into_iter()
        .map(|outcome| {
            outcome.unwrap_or_else(|| VuOutcome::Failed {
                diagnostics: vec!["VU was not compiled".to_string()],
            })
        })
        .collect()
}

/// Totals for a summary line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    pub compiled: usize,
    pub eliminated: usize,
    pub failed: usize,
}

impl Summary {
    pub fn of(outcomes: &[VuOutcome]) -> Self {
        outcomes.iter().fold(Self::default(), |mut s, outcome| {
            match outcome {
                VuOutcome::Compiled { .. } => s.compiled += 1,
                VuOutcome::Eliminated { .. } => s.eliminated += 1,
                VuOutcome::Failed { .. } => s.failed += 1,
            }
            s
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::schema::tests::fixture;

    fn request(line: usize, text: &str) -> VuRequest {
        VuRequest {
            api: "VkSubpassDescriptionDepthStencilResolveKHR".to_string(),
            file: "renderpass.adoc".to_string(),
            line,
            macros: String::new(),
            text: text.to_string(),
        }
    }

    fn requests() -> Vec<VuRequest> {
        (0..24)
            .map(|i| match i % 3 {
                0 => request(i, "require(depthResolveMode == VK_RESOLVE_MODE_MAX_BIT)"),
                1 => request(i, "require(noSuchMember == 0)"),
                _ => request(i, "if is_version(1, 3):\n  require(stencilResolveMode == VK_RESOLVE_MODE_MAX_BIT)"),
            })
            .collect()
    }

    #[test]
    fn results_keep_request_order() {
        let schema = fixture();
        let build = Build::new(["1.2"], Vec::<String>::new());
        let requests = requests();
        let outcomes = compile_all(&requests, &schema, &build, RenderOptions::default(), 4);

        assert_eq!(outcomes.len(), requests.len());
        for (i, outcome) in outcomes.iter().enumerate() {
            match i % 3 {
                0 => assert!(matches!(outcome, VuOutcome::Compiled { .. })),
                1 => {
                    assert!(outcome.is_failed());
                    let line = format!("renderpass.adoc:{i}:");
                    assert!(outcome.warnings().iter().all(|d| d.starts_with(&line)));
                }
                _ => assert!(matches!(outcome, VuOutcome::Eliminated { .. })),
            }
        }
        assert_eq!(
            Summary::of(&outcomes),
            Summary {
                compiled: 8,
                eliminated: 8,
                failed: 8
            }
        );
    }

    #[test]
    fn pool_matches_sequential() {
        let schema = fixture();
        let build = Build::new(["1.0"], ["VK_KHR_depth_stencil_resolve"]);
        let requests = requests();
        let options = RenderOptions::default();
        assert_eq!(
            compile_all(&requests, &schema, &build, options, 1),
            compile_all(&requests, &schema, &build, options, 8)
        );
    }

    #[test]
    fn empty_batch() {
        let schema = fixture();
        let outcomes = compile_all(&[], &schema, &Build::default(), RenderOptions::default(), 0);
        assert!(outcomes.is_empty());
        assert!(default_workers() >= 1);
    }
}
