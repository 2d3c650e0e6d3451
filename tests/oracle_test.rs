use std::collections::HashMap;

use pretty_assertions::assert_eq;
use qdiff::oracle::{DivergenceDetail, Row, Value};
use qdiff::prelude::*;

/// Returns canned rows per exact statement; anything else is an error.
struct Canned {
    name: &'static str,
    answers: HashMap<String, Vec<Row>>,
    seen: Vec<String>,
}

impl Canned {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            answers: HashMap::new(),
            seen: Vec::new(),
        }
    }

    fn answer(mut self, sql: &str, rows: Vec<Row>) -> Self {
        self.answers.insert(sql.to_string(), rows);
        self
    }
}

impl Executor for Canned {
    fn name(&self) -> &str {
        self.name
    }

    fn query(&mut self, sql: &str) -> DiffResult<Vec<Row>> {
        self.seen.push(sql.to_string());
        self.answers
            .get(sql)
            .cloned()
            .ok_or_else(|| DiffError::execution(self.name, format!("unexpected statement: {sql}")))
    }

    fn write_query(&mut self, sql: &str) -> DiffResult<()> {
        self.seen.push(sql.to_string());
        Ok(())
    }
}

#[test]
fn test_guarded_in_on_empty_tables_is_equivalent() {
    let pair = qdiff::map_query("SELECT * FROM t WHERE c1 IN (0,1,NULL)").unwrap();
    let mut a = Canned::new("a").answer(&pair.engine_a, vec![]);
    let mut b = Canned::new("b").answer(&pair.engine_b, vec![]);

    let outcome = Oracle::run(&mut a, &mut b, &pair);
    assert_eq!(outcome.verdict, Some(DivergenceVerdict::Equivalent));
    assert_eq!(a.seen, vec![pair.engine_a.clone()]);
    assert_eq!(b.seen, vec![pair.engine_b.clone()]);
}

#[test]
fn test_sampled_counts_compare_across_engines() {
    let pair = qdiff::map_query("SELECT COUNT(*) FROM t SAMPLE BY 1d").unwrap();
    let mut a = Canned::new("a").answer(&pair.engine_a, vec![vec![Value::Int(2)], vec![Value::Int(1)]]);
    let mut b = Canned::new("b").answer(
        &pair.engine_b,
        vec![vec![Value::Decimal(rust_decimal::Decimal::from(1i64))], vec![Value::Float(2.0)]],
    );

    let outcome = Oracle::run(&mut a, &mut b, &pair);
    assert_eq!(outcome.verdict, Some(DivergenceVerdict::Equivalent));
}

#[test]
fn test_extra_row_is_reported() {
    let pair = QueryPair::splat("SELECT c0 FROM t");
    let mut a = Canned::new("a").answer(&pair.engine_a, vec![vec![Value::Int(1)], vec![Value::Null]]);
    let mut b = Canned::new("b").answer(&pair.engine_b, vec![vec![Value::Int(1)]]);

    let outcome = Oracle::run(&mut a, &mut b, &pair);
    assert_eq!(
        outcome.verdict,
        Some(DivergenceVerdict::Divergent(DivergenceDetail {
            only_in_a: vec![vec![Value::Null]],
            only_in_b: vec![],
        }))
    );
}

#[test]
fn test_one_side_failing_is_inconclusive() {
    let pair = QueryPair::new("SELECT 1", "SELECT 2");
    let mut a = Canned::new("a").answer("SELECT 1", vec![vec![Value::Int(1)]]);
    let mut b = Canned::new("b");

    let outcome = Oracle::run(&mut a, &mut b, &pair);
    assert!(matches!(outcome.engine_b, ExecutionResult::Failure(_)));
    assert!(matches!(outcome.verdict, Some(DivergenceVerdict::Inconclusive(_))));
}

#[test]
fn test_writes_are_acknowledged_not_compared() {
    let pair = qdiff::map_query("INSERT INTO t VALUES (1, 'a', '2024-11-11 11:11:00');").unwrap();
    let mut a = Canned::new("a");
    let mut b = Canned::new("b");

    let outcome = Oracle::run(&mut a, &mut b, &pair);
    assert_eq!(outcome.engine_a, ExecutionResult::WriteAcknowledged);
    assert_eq!(outcome.engine_b, ExecutionResult::WriteAcknowledged);
    assert_eq!(outcome.verdict, None);
}

#[test]
fn test_campaign_records_round() {
    struct Echo(&'static str);
    impl Executor for Echo {
        fn name(&self) -> &str {
            self.0
        }
        fn query(&mut self, _sql: &str) -> DiffResult<Vec<Row>> {
            Ok(vec![])
        }
        fn write_query(&mut self, _sql: &str) -> DiffResult<()> {
            Ok(())
        }
    }

    let config = DiffConfig {
        queries_per_round: 40,
        select_mode: SelectMode::Predicated,
        shared_clauses: vec!["IN".into(), "BETWEEN".into(), "SAMPLE BY".into()],
        ..Default::default()
    };
    let (mut a, mut b) = (Echo("a"), Echo("b"));
    let mut sink = MemorySink::default();
    let summaries = Campaign::from_config(&config, config.shared_clause_set(), 17, &mut a, &mut b, &mut sink)
        .unwrap()
        .run(Some(1))
        .unwrap();

    assert_eq!(summaries.len(), 1);
    let summary = &summaries[0];
    assert_eq!(summary.executed + summary.skipped, 40);
    assert_eq!(summary.divergent, 0);
    assert_eq!(summary.success_rate(), 1.0);
    assert!(matches!(sink.records[0], Record::Ddl { round: 1, .. }));
}
