use std::{path::PathBuf, time::Duration};

use crate::{
    judge::{self, Tolerance},
    testing::{self, ExecutionRequest, Executor, ExitState, JudgeCode, TestCase, TestOutcome},
};

/// One evaluation of a target over an ordered list of cases.
#[derive(Debug, Clone)]
pub struct EvaluationJob {
    pub target: PathBuf,
    pub cases: Vec<TestCase>,
    pub tolerance: Option<Tolerance>,
    pub case_timeout: Duration,
}

impl EvaluationJob {
    /// Runs every case in order, handing each outcome to `on_case` as soon as it is judged.
    pub async fn run(
        &self,
        executor: &Executor,
        mut on_case: impl FnMut(&TestCase, &TestOutcome),
    ) -> testing::Result<Vec<TestOutcome>> {
        let mut outcomes = Vec::with_capacity(self.cases.len());
        for case in self.cases.iter() {
            let outcome = self.run_case(executor, case).await?;
            on_case(case, &outcome);
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }

    pub async fn run_case(&self, executor: &Executor, case: &TestCase) -> testing::Result<TestOutcome> {
        let req = ExecutionRequest::new(&self.target)
            .input(case.input.as_str())
            .deadline(self.case_timeout);
        let output = executor.execute(&req).await?;

        let (judge, max_error) = match (&output.status, &case.expected) {
            (ExitState::TimedOut, _) => (JudgeCode::TLE, None),
            (status, _) if !status.is_success() => (JudgeCode::RE, None),
            (_, None) => (JudgeCode::IO, None),
            (_, Some(expected)) => {
                let verdict = judge::judge(expected, &output.stdout, self.tolerance);
                let code = if verdict.is_accepted() {
                    JudgeCode::AC
                } else {
                    JudgeCode::WA
                };
                (code, verdict.max_error())
            }
        };

        Ok(TestOutcome {
            name: case.name.clone(),
            judge,
            max_error,
            expected: case.expected.clone(),
            output,
        })
    }
}

#[cfg(all(test, unix))]
mod test {
    use super::*;
    use crate::testing::executor::test::script;

    struct X {
        case: TestCase,
        tolerance: Option<f64>,
        want: JudgeCode,
    }

    async fn run_test(body: &str, xs: Vec<X>) {
        let dir = tempfile::tempdir().unwrap();
        let target = script(dir.path(), "main", body);
        for x in xs {
            let job = EvaluationJob {
                target: target.clone(),
                cases: vec![x.case.clone()],
                tolerance: x.tolerance.map(|t| Tolerance::new(t).unwrap()),
                case_timeout: Duration::from_millis(500),
            };
            let got = job.run_case(&Executor::default(), &x.case).await.unwrap();
            assert_eq!(got.judge, x.want, "case {:?}", x.case);
        }
    }

    #[tokio::test]
    async fn judge_codes() {
        let body = r#"
read x
case $x in
  loop) exec sleep 10 ;;
  crash) exit 2 ;;
  half) echo 0.5 ;;
  *) echo $x ;;
esac"#;
        run_test(
            body,
            vec![
                X {
                    case: TestCase::new("ac", "7\n", Some("7\n")),
                    tolerance: None,
                    want: JudgeCode::AC,
                },
                X {
                    case: TestCase::new("wa", "7\n", Some("8\n")),
                    tolerance: None,
                    want: JudgeCode::WA,
                },
                X {
                    case: TestCase::new("tle", "loop\n", Some("x\n")),
                    tolerance: None,
                    want: JudgeCode::TLE,
                },
                X {
                    case: TestCase::new("re", "crash\n", Some("x\n")),
                    tolerance: None,
                    want: JudgeCode::RE,
                },
                X {
                    case: TestCase::new("io", "7\n", None::<String>),
                    tolerance: None,
                    want: JudgeCode::IO,
                },
                X {
                    case: TestCase::new("tol", "half\n", Some("0.5000001\n")),
                    tolerance: Some(1e-3),
                    want: JudgeCode::AC,
                },
            ],
        )
        .await;
    }

    #[tokio::test]
    async fn cases_are_reported_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let target = script(dir.path(), "main", "cat");
        let cases: Vec<_> = (0..4)
            .map(|i| TestCase::new(format!("in{}", i), format!("{}\n", i), Some(format!("{}\n", i))))
            .collect();
        let job = EvaluationJob {
            target,
            cases,
            tolerance: None,
            case_timeout: Duration::from_secs(5),
        };
        let mut seen = Vec::new();
        let outcomes = job
            .run(&Executor::default(), |case, _| seen.push(case.name.clone()))
            .await
            .unwrap();
        assert_eq!(seen, ["in0", "in1", "in2", "in3"]);
        assert!(outcomes.iter().all(|o| o.judge == JudgeCode::AC));
    }
}
