//! Round loop: create tables, then drive generated pairs through the oracle.

use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::config::DiffConfig;
use crate::error::{DiffError, DiffResult};
use crate::generator::{QueryGenerator, SharedClauseSet};
use crate::mapping::{Dialect, QueryPair};
use crate::oracle::{DivergenceVerdict, ExecutionResult, Executor, Oracle, PairOutcome};
use crate::report::{Record, RecordSink};

/// Counters for one round.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoundSummary {
    pub round: usize,
    /// Pairs sent to the engines.
    pub executed: usize,
    /// Pairs both engines ran without error.
    pub succeeded: usize,
    /// Statements Engine A ran without error.
    pub engine_a_ok: usize,
    /// Statements Engine B ran without error.
    pub engine_b_ok: usize,
    pub divergent: usize,
    pub inconclusive: usize,
    /// Generated statements the pipeline rejected.
    pub skipped: usize,
}

impl RoundSummary {
    pub fn success_rate(&self) -> f64 {
        if self.executed == 0 {
            0.0
        } else {
            self.succeeded as f64 / self.executed as f64
        }
    }

    /// Share of statements one engine ran without error.
    pub fn engine_success_rate(&self, dialect: Dialect) -> f64 {
        let ok = match dialect {
            Dialect::EngineA => self.engine_a_ok,
            Dialect::EngineB => self.engine_b_ok,
        };
        if self.executed == 0 {
            0.0
        } else {
            ok as f64 / self.executed as f64
        }
    }

    fn tally(&mut self, outcome: &PairOutcome) {
        self.executed += 1;
        match &outcome.verdict {
            Some(DivergenceVerdict::Divergent(_)) => self.divergent += 1,
            Some(DivergenceVerdict::Inconclusive(_)) => self.inconclusive += 1,
            _ => {}
        }
        let a_ok = !failed(&outcome.engine_a);
        let b_ok = !failed(&outcome.engine_b);
        self.engine_a_ok += usize::from(a_ok);
        self.engine_b_ok += usize::from(b_ok);
        self.succeeded += usize::from(a_ok && b_ok);
    }
}

fn failed(result: &ExecutionResult) -> bool {
    matches!(result, ExecutionResult::Failure(_))
}

/// Round driver settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunnerOptions {
    pub queries_per_round: usize,
    pub reconnect_on_failure: bool,
    pub progress_every: usize,
}

impl From<&DiffConfig> for RunnerOptions {
    fn from(config: &DiffConfig) -> Self {
        Self {
            queries_per_round: config.queries_per_round,
            reconnect_on_failure: config.reconnect_on_failure,
            progress_every: config.progress_every,
        }
    }
}

/// A sequence of rounds against one pair of engines.
pub struct Campaign<'a> {
    generator: QueryGenerator,
    rng: StdRng,
    options: RunnerOptions,
    engine_a: &'a mut dyn Executor,
    engine_b: &'a mut dyn Executor,
    sink: &'a mut dyn RecordSink,
    round: usize,
}

impl<'a> Campaign<'a> {
    pub fn new(
        generator: QueryGenerator,
        seed: u64,
        options: RunnerOptions,
        engine_a: &'a mut dyn Executor,
        engine_b: &'a mut dyn Executor,
        sink: &'a mut dyn RecordSink,
    ) -> Self {
        Self {
            generator,
            rng: StdRng::seed_from_u64(seed),
            options,
            engine_a,
            engine_b,
            sink,
            round: 0,
        }
    }

    /// Build the generator from configuration.
    pub fn from_config(
        config: &DiffConfig,
        shared: SharedClauseSet,
        seed: u64,
        engine_a: &'a mut dyn Executor,
        engine_b: &'a mut dyn Executor,
        sink: &'a mut dyn RecordSink,
    ) -> DiffResult<Self> {
        let generator = QueryGenerator::new(shared, config.generator_options())?;
        Ok(Self::new(generator, seed, config.into(), engine_a, engine_b, sink))
    }

    /// Tables of the current round.
    pub fn tables(&self) -> &[String] {
        self.generator.tables()
    }

    /// Run `rounds` rounds, or forever when `None`.
    pub fn run(&mut self, rounds: Option<usize>) -> DiffResult<Vec<RoundSummary>> {
        let mut summaries = Vec::new();
        while rounds.is_none_or(|n| self.round < n) {
            summaries.push(self.run_round()?);
        }
        Ok(summaries)
    }

    /// Drop the previous round's tables, create fresh ones on both engines,
    /// then run the query budget. A failed table statement ends the round
    /// with an error.
    pub fn run_round(&mut self) -> DiffResult<RoundSummary> {
        self.round += 1;
        let round = self.round;
        tracing::info!(round, "starting round");

        for table in self.generator.tables().to_vec() {
            let drop = self.generator.drop_table(&table)?;
            self.setup(round, table, drop)?;
        }
        for (table, create) in self.generator.init_round(&mut self.rng)? {
            // replaying the input log starts from a clean table
            let drop = self.generator.drop_table(&table)?;
            self.setup(round, table.clone(), drop)?;
            self.setup(round, table, create)?;
        }

        let mut summary = RoundSummary {
            round,
            ..Default::default()
        };
        for i in 1..=self.options.queries_per_round {
            match self.generator.random_query(&mut self.rng) {
                Ok(pair) => {
                    let outcome = Oracle::run(&mut *self.engine_a, &mut *self.engine_b, &pair);
                    summary.tally(&outcome);
                    self.after_failures(round, &outcome)?;
                    self.sink.record(&Record::from_outcome(round, outcome))?;
                }
                Err(e) => {
                    tracing::warn!(round, "generated statement rejected: {}", e);
                    summary.skipped += 1;
                }
            }
            if self.options.progress_every > 0 && i % self.options.progress_every == 0 {
                tracing::info!(
                    round,
                    queries = i,
                    "success rate A {:.1}%, B {:.1}%, both {:.1}%",
                    summary.engine_success_rate(Dialect::EngineA) * 100.0,
                    summary.engine_success_rate(Dialect::EngineB) * 100.0,
                    summary.success_rate() * 100.0
                );
            }
        }
        self.sink.flush()?;

        tracing::info!(
            round,
            divergent = summary.divergent,
            inconclusive = summary.inconclusive,
            "round finished"
        );
        Ok(summary)
    }

    /// Run one table statement on both engines and record it.
    fn setup(&mut self, round: usize, table: String, pair: QueryPair) -> DiffResult<()> {
        tracing::debug!(round, %table, sql = %pair.engine_a, "table setup");
        let outcome = Oracle::run(&mut *self.engine_a, &mut *self.engine_b, &pair);
        self.after_failures(round, &outcome)?;
        self.sink.record(&Record::Ddl { round, table, pair })?;

        for (dialect, result) in [
            (Dialect::EngineA, &outcome.engine_a),
            (Dialect::EngineB, &outcome.engine_b),
        ] {
            if let ExecutionResult::Failure(reason) = result {
                self.sink.flush()?;
                return Err(DiffError::execution(
                    dialect.to_string(),
                    format!("table setup failed: {}", reason),
                ));
            }
        }
        Ok(())
    }

    /// Record each failed side and optionally reconnect it.
    fn after_failures(&mut self, round: usize, outcome: &PairOutcome) -> DiffResult<()> {
        for dialect in [Dialect::EngineA, Dialect::EngineB] {
            let result = match dialect {
                Dialect::EngineA => &outcome.engine_a,
                Dialect::EngineB => &outcome.engine_b,
            };
            let ExecutionResult::Failure(reason) = result else {
                continue;
            };
            self.sink.record(&Record::Exception {
                round,
                dialect,
                sql: outcome.pair.get(dialect).to_string(),
                reason: reason.clone(),
            })?;
            if self.options.reconnect_on_failure {
                let executor = match dialect {
                    Dialect::EngineA => &mut *self.engine_a,
                    Dialect::EngineB => &mut *self.engine_b,
                };
                if let Err(e) = executor.reconnect() {
                    tracing::warn!(engine = executor.name(), "reconnect failed: {}", e);
                }
            }
        }
        Ok(())
    }
}
