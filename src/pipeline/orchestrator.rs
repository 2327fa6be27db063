//! Ordered strategy execution
//!
//! Strategies run one after another against a shared, read-only context.
//! Each one fetches, then parses; its failures are recorded and the run
//! moves on. The run stops as soon as the requested number of posts has
//! been merged.

use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::crawler::fetcher::FetchedPage;
use crate::error::FeedsiftErrorTrait;
use crate::models::{Post, StrategyOutcome, StrategyReport};
use crate::pipeline::merge::ResultMerger;
use crate::pipeline::{ScrapeState, StateMachine};
use crate::utils::error::{FetchError, ParseError};
use crate::utils::jittered_delay;

/// One way of obtaining posts for a target
#[async_trait]
pub trait Strategy<C>: Send + Sync
where
    C: Sync,
{
    /// Stable name used in reports and logs
    fn name(&self) -> &'static str;

    /// Whether the strategy should run, given the posts merged so far
    fn applies(&self, _ctx: &C, _accumulated: usize) -> bool {
        true
    }

    /// Whether `fetch` goes to the network (politeness delays apply)
    fn needs_network(&self) -> bool {
        true
    }

    /// Fetch the raw responses this strategy parses
    async fn fetch(&self, ctx: &C, quota: usize) -> Result<Vec<FetchedPage>, FetchError>;

    /// Turn fetched responses into validated posts, at most `quota`
    fn parse(&self, ctx: &C, pages: &[FetchedPage], quota: usize) -> Result<Vec<Post>, ParseError>;
}

/// Randomized pause between network-bound strategies
#[derive(Debug, Clone, Copy)]
pub struct Politeness {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl Default for Politeness {
    fn default() -> Self {
        Self {
            min_ms: 400,
            max_ms: 1500,
        }
    }
}

impl Politeness {
    /// No pauses at all
    pub fn none() -> Self {
        Self { min_ms: 0, max_ms: 0 }
    }

    pub fn delay(&self) -> Duration {
        jittered_delay(self.min_ms, self.max_ms)
    }

    pub async fn pause(&self) {
        let delay = self.delay();
        if !delay.is_zero() {
            debug!(delay_ms = delay.as_millis() as u64, "Politeness pause");
            tokio::time::sleep(delay).await;
        }
    }
}

/// Runs strategies in order and merges their output
#[derive(Debug, Clone, Default)]
pub struct StrategyOrchestrator {
    politeness: Politeness,
}

impl StrategyOrchestrator {
    pub fn new(politeness: Politeness) -> Self {
        Self { politeness }
    }

    pub fn politeness(&self) -> Politeness {
        self.politeness
    }

    /// Run `strategies` until they are exhausted or `merger` is full
    ///
    /// `after_request` is set when the caller already hit the network for
    /// this target, so the first network-bound strategy pauses too.
    ///
    /// Returns one report per strategy, in order; strategies that never ran
    /// are reported as skipped. Leaves `machine` in `Merging`.
    pub async fn run<C>(
        &self,
        ctx: &C,
        strategies: &[Box<dyn Strategy<C>>],
        merger: &mut ResultMerger,
        machine: &mut StateMachine,
        after_request: bool,
    ) -> Vec<StrategyReport>
    where
        C: Sync,
    {
        let mut reports = Vec::with_capacity(strategies.len());
        let mut network_used = after_request;

        for (index, strategy) in strategies.iter().enumerate() {
            let name = strategy.name();

            if merger.is_full() || !strategy.applies(ctx, merger.len()) {
                debug!(strategy = name, "Strategy skipped");
                reports.push(report(name, 0, StrategyOutcome::Skipped));
                continue;
            }

            if strategy.needs_network() {
                if network_used {
                    self.politeness.pause().await;
                }
                network_used = true;
            }

            machine.transition(ScrapeState::Fetching(index));
            let quota = merger.remaining();

            let pages = match strategy.fetch(ctx, quota).await {
                Ok(pages) => pages,
                Err(e) => {
                    warn!(
                        strategy = name,
                        category = e.category().as_str(),
                        error = %e,
                        "Strategy fetch failed"
                    );
                    reports.push(report(name, 0, StrategyOutcome::Failed(e.to_string())));
                    machine.transition(ScrapeState::NextStrategy);
                    continue;
                }
            };

            machine.transition(ScrapeState::Parsing(index));

            let outcome = match strategy.parse(ctx, &pages, quota) {
                Ok(posts) => {
                    let found = posts.len();
                    let accepted = merger.add(posts);
                    info!(
                        strategy = name,
                        found = found,
                        accepted = accepted,
                        total = merger.len(),
                        "Strategy finished"
                    );
                    let outcome = if accepted > 0 {
                        StrategyOutcome::Succeeded
                    } else {
                        StrategyOutcome::Empty
                    };
                    report(name, accepted, outcome)
                }
                Err(e) => {
                    warn!(
                        strategy = name,
                        category = e.category().as_str(),
                        error = %e,
                        "Strategy parse failed"
                    );
                    report(name, 0, StrategyOutcome::Failed(e.to_string()))
                }
            };
            reports.push(outcome);
            machine.transition(ScrapeState::NextStrategy);
        }

        machine.transition(ScrapeState::Merging);
        reports
    }
}

fn report(name: &str, posts_found: usize, outcome: StrategyOutcome) -> StrategyReport {
    StrategyReport {
        name: name.to_string(),
        posts_found,
        outcome,
    }
}
