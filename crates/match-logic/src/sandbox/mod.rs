//! Strategy sandbox.
//!
//! Participant strategies are short snippets in a small, indentation-based
//! decision language. They are never handed to a host runtime: the sandbox
//! screens the raw text, parses it into its own AST, and walks that AST with
//! an interpreter that only knows a fixed set of pure primitives.
//!
//! Every evaluation step burns fuel and checks the wall-clock deadline, so a
//! strategy stuck in a tight loop is stopped by the interpreter itself rather
//! than by cooperation from the strategy.
//!
//! Any fault (denylisted token, syntax error, missing entry point, runtime
//! error, fuel or deadline exhaustion, illegal return) defaults to Defect,
//! the "fail-safe" rule: a broken strategy can neither abstain nor stall.

mod budget;
mod builtins;
mod eval;
mod lexer;
mod parser;
mod screen;
mod value;

use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::debug;

use crate::strategy::Move;

pub use parser::Program;

/// Reference wall-clock budget for one strategy call.
pub const DEFAULT_DEADLINE: Duration = Duration::from_millis(5);

/// Reference evaluation step budget for one strategy call.
pub const DEFAULT_FUEL: u64 = 100_000;

/// Largest accepted strategy source, in bytes.
pub const MAX_SOURCE_LEN: usize = 16 * 1024;

/// Name of the entry point every strategy must define.
pub const ENTRY_POINT: &str = "strategy";

/// Every way a strategy can fail to produce a move.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum StrategyFault {
    #[error("strategy source exceeds {0} bytes")]
    SourceTooLong(usize),
    #[error("`{0}` is not allowed in strategies")]
    Denylisted(String),
    #[error("syntax error on line {line}: {message}")]
    Syntax { line: usize, message: String },
    #[error("strategy must define a `strategy` function")]
    MissingEntryPoint,
    #[error("`strategy` takes {found} parameters, expected {expected}")]
    WrongArity { expected: usize, found: usize },
    #[error("runtime error: {0}")]
    Runtime(String),
    #[error("step budget of {0} exhausted")]
    FuelExhausted(u64),
    #[error("deadline of {0:?} exceeded")]
    DeadlineExceeded(Duration),
    #[error("strategy returned {0}, expected 'C' or 'D'")]
    IllegalReturn(String),
}

/// Resource limits applied to each strategy call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SandboxLimits {
    /// Wall-clock budget for one call, including module-level setup.
    pub deadline: Duration,
    /// Maximum evaluation steps for one call.
    pub fuel: u64,
    /// Maximum length of any list or string built during evaluation.
    pub max_collection_len: usize,
    /// Maximum nested function calls.
    pub max_call_depth: usize,
}

impl Default for SandboxLimits {
    fn default() -> Self {
        Self {
            deadline: DEFAULT_DEADLINE,
            fuel: DEFAULT_FUEL,
            max_collection_len: 10_000,
            max_call_depth: 64,
        }
    }
}

/// Evaluates strategies. Holds only its limits, so one instance can be shared
/// across threads and matches.
#[derive(Clone, Debug, Default)]
pub struct Sandbox {
    limits: SandboxLimits,
}

impl Sandbox {
    pub fn new(limits: SandboxLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &SandboxLimits {
        &self.limits
    }

    /// Screen and parse a strategy once so it can be called every round.
    pub fn compile(&self, source: &str) -> Result<Arc<Program>, StrategyFault> {
        if source.len() > MAX_SOURCE_LEN {
            return Err(StrategyFault::SourceTooLong(MAX_SOURCE_LEN));
        }
        screen::screen(source)?;
        let tokens = lexer::tokenize(source)?;
        let program = parser::parse(tokens)?;
        Ok(Arc::new(program))
    }

    /// Decide the next move. Never fails: every fault becomes Defect.
    ///
    /// `opponents` holds one history per opponent in stable match order,
    /// `own` the caller's history.
    pub fn decide(&self, source: &str, opponents: &[&[Move]], own: &[Move]) -> Move {
        match self
            .compile(source)
            .and_then(|program| self.try_call(&program, opponents, own))
        {
            Ok(m) => m,
            Err(fault) => {
                debug!(%fault, "strategy fault, defaulting to Defect");
                Move::Defect
            }
        }
    }

    /// Like [`Sandbox::decide`] for an already compiled program.
    pub fn decide_compiled(&self, program: &Program, opponents: &[&[Move]], own: &[Move]) -> Move {
        match self.try_call(program, opponents, own) {
            Ok(m) => m,
            Err(fault) => {
                debug!(%fault, "strategy fault, defaulting to Defect");
                Move::Defect
            }
        }
    }

    /// Run the entry point and report the fault instead of absorbing it.
    pub fn try_call(
        &self,
        program: &Program,
        opponents: &[&[Move]],
        own: &[Move],
    ) -> Result<Move, StrategyFault> {
        let deadline = Instant::now() + self.limits.deadline;
        eval::call_strategy(program, &self.limits, deadline, opponents, own)
    }

    /// Check a strategy before it is accepted onto the roster.
    ///
    /// Beyond compiling, the entry point must take `match_size` parameters and
    /// a trial call on empty histories must return a legal move.
    pub fn validate(&self, source: &str, match_size: usize) -> Result<(), StrategyFault> {
        let program = self.compile(source)?;
        let arity = program
            .arity(ENTRY_POINT)
            .ok_or(StrategyFault::MissingEntryPoint)?;
        if arity != match_size {
            return Err(StrategyFault::WrongArity {
                expected: match_size,
                found: arity,
            });
        }
        let no_moves: &[Move] = &[];
        let opponents = vec![no_moves; match_size.saturating_sub(1)];
        self.try_call(&program, &opponents, no_moves)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::sample_strategies;
    use Move::{Cooperate as C, Defect as D};

    fn sandbox() -> Sandbox {
        Sandbox::default()
    }

    fn two(source: &str, opp: &[Move], own: &[Move]) -> Move {
        sandbox().decide(source, &[opp], own)
    }

    fn fault(source: &str, opponents: &[&[Move]], own: &[Move]) -> StrategyFault {
        let sb = sandbox();
        sb.compile(source)
            .and_then(|p| sb.try_call(&p, opponents, own))
            .unwrap_err()
    }

    const TIT_FOR_TAT: &str = "\
def strategy(opponent_history, my_history):
    if len(opponent_history) == 0:
        return 'C'
    return opponent_history[-1]
";

    #[test]
    fn test_always_cooperate() {
        let src = "def strategy(o, m):\n    return 'C'\n";
        assert_eq!(two(src, &[], &[]), C);
        assert_eq!(two(src, &[D, D], &[C, C]), C);
    }

    #[test]
    fn test_tit_for_tat() {
        assert_eq!(two(TIT_FOR_TAT, &[], &[]), C);
        assert_eq!(two(TIT_FOR_TAT, &[C], &[C]), C);
        assert_eq!(two(TIT_FOR_TAT, &[C, D], &[C, C]), D);
    }

    #[test]
    fn test_three_player_argument_order() {
        // Opponents first, own history last.
        let src = "\
def strategy(first, second, mine):
    if len(mine) == 3:
        return second[0]
    return 'C'
";
        let m = sandbox().decide(src, &[&[C, C, C], &[D, C, C]], &[C, C, C]);
        assert_eq!(m, D);
    }

    #[test]
    fn test_denylisted_source_defects_without_running() {
        for src in [
            "import os\ndef strategy(o, m):\n    return 'C'",
            "def strategy(o, m):\n    return open('x')",
            "def strategy(o, m):\n    x = __builtins__\n    return 'C'",
            "def strategy(o, m):\n    return eval('1')",
            "def strategy(o, m):\n    # from here on\n    return 'C'",
        ] {
            assert_eq!(two(src, &[], &[]), D, "source should be screened: {src}");
            assert!(matches!(fault(src, &[&[]], &[]), StrategyFault::Denylisted(_)));
        }
    }

    #[test]
    fn test_missing_entry_point() {
        let src = "def other(o, m):\n    return 'C'\n";
        assert_eq!(two(src, &[], &[]), D);
        assert_eq!(fault(src, &[&[]], &[]), StrategyFault::MissingEntryPoint);
    }

    #[test]
    fn test_illegal_return_values() {
        for body in ["return 'X'", "return 1", "return None", "pass", "return ['C']", "return 'c'"] {
            let src = format!("def strategy(o, m):\n    {}\n", body);
            assert_eq!(two(&src, &[], &[]), D, "{body}");
            assert!(matches!(fault(&src, &[&[]], &[]), StrategyFault::IllegalReturn(_)));
        }
    }

    #[test]
    fn test_runtime_error_defects() {
        let src = "def strategy(o, m):\n    return o[5]\n";
        assert_eq!(two(src, &[], &[]), D);
        assert!(matches!(fault(src, &[&[]], &[]), StrategyFault::Runtime(_)));

        let src = "def strategy(o, m):\n    return 1 // 0\n";
        assert!(matches!(fault(src, &[&[]], &[]), StrategyFault::Runtime(_)));
    }

    #[test]
    fn test_syntax_error_defects() {
        let src = "def strategy(o, m)\n    return 'C'\n";
        assert_eq!(two(src, &[], &[]), D);
        assert!(matches!(fault(src, &[&[]], &[]), StrategyFault::Syntax { .. }));
    }

    #[test]
    fn test_infinite_loop_exhausts_fuel() {
        let src = "def strategy(o, m):\n    while True:\n        pass\n";
        assert_eq!(two(src, &[], &[]), D);

        // A generous deadline so the step budget is what trips.
        let sb = Sandbox::new(SandboxLimits {
            deadline: Duration::from_secs(30),
            ..SandboxLimits::default()
        });
        let program = sb.compile(src).unwrap();
        assert_eq!(
            sb.try_call(&program, &[&[]], &[]),
            Err(StrategyFault::FuelExhausted(DEFAULT_FUEL))
        );
    }

    #[test]
    fn test_tight_loop_stopped_by_deadline() {
        let sb = Sandbox::new(SandboxLimits {
            deadline: Duration::from_millis(20),
            fuel: u64::MAX,
            ..SandboxLimits::default()
        });
        let src = "def strategy(o, m):\n    n = 0\n    while True:\n        n += 1\n";
        let program = sb.compile(src).unwrap();

        let started = Instant::now();
        let result = sb.try_call(&program, &[&[]], &[]);
        let elapsed = started.elapsed();

        assert_eq!(result, Err(StrategyFault::DeadlineExceeded(Duration::from_millis(20))));
        assert!(elapsed < Duration::from_millis(20) + Duration::from_millis(250), "took {:?}", elapsed);
        assert_eq!(sb.decide_compiled(&program, &[&[]], &[]), D);
    }

    #[test]
    fn test_unbounded_recursion_is_caught() {
        let src = "def f(n):\n    return f(n + 1)\n\ndef strategy(o, m):\n    return f(0)\n";
        assert_eq!(two(src, &[], &[]), D);
        assert!(matches!(fault(src, &[&[]], &[]), StrategyFault::Runtime(_)));
    }

    #[test]
    fn test_memory_bomb_is_caught() {
        let src = "def strategy(o, m):\n    x = [0] * 100000000\n    return 'C'\n";
        assert_eq!(two(src, &[], &[]), D);
    }

    #[test]
    fn test_deeply_nested_lists_are_refused() {
        // Generous limits, so only the nesting cap can stop these.
        let sb = Sandbox::new(SandboxLimits {
            deadline: Duration::from_secs(30),
            fuel: u64::MAX,
            ..SandboxLimits::default()
        });
        for body in [
            "    x = []\n    for i in range(10000):\n        x = [x]\n    return x",
            "    x = []\n    for i in range(10000):\n        y = [0]\n        y.append(x)\n        x = y\n    return x",
            "    x = [0]\n    for i in range(10000):\n        x[0] = x\n    return x",
        ] {
            let src = format!("def strategy(o, m):\n{}\n", body);
            let program = sb.compile(&src).unwrap();
            match sb.try_call(&program, &[&[]], &[]) {
                Err(StrategyFault::Runtime(msg)) => assert!(msg.contains("nested"), "{msg}"),
                other => panic!("expected a nesting fault, got {:?}", other),
            }
            assert_eq!(sb.decide_compiled(&program, &[&[]], &[]), D);
        }

        let src = "def strategy(o, m):\n    x = [[['C']]]\n    return x[0][0][0]\n";
        assert_eq!(two(src, &[], &[]), C);
    }

    #[test]
    fn test_walking_large_values_is_charged() {
        let setup = "    s = 'C' * 10000\n    l = [s] * 10000\n    l2 = [l] * 200\n";
        let checks = [
            "    return str(l)",
            "    return 'C' if l2 == l2 else 'D'",
            "    return 'C' if l in l2 else 'D'",
            "    return 'C' if l2.count(l) > 0 else 'D'",
            "    return 'C' if l2 < l2 else 'D'",
        ];

        // The step budget trips first on the reference fuel.
        let sb = Sandbox::new(SandboxLimits {
            deadline: Duration::from_secs(30),
            ..SandboxLimits::default()
        });
        for check in checks {
            let src = format!("def strategy(o, m):\n{}{}\n", setup, check);
            let program = sb.compile(&src).unwrap();
            let fault = sb.try_call(&program, &[&[]], &[]).unwrap_err();
            assert!(
                matches!(fault, StrategyFault::FuelExhausted(_) | StrategyFault::Runtime(_)),
                "{check}: {fault:?}"
            );
        }

        // Without a step budget, the deadline still holds.
        let sb = Sandbox::new(SandboxLimits {
            deadline: Duration::from_millis(20),
            fuel: u64::MAX,
            ..SandboxLimits::default()
        });
        for check in checks {
            let src = format!("def strategy(o, m):\n{}{}\n", setup, check);
            let program = sb.compile(&src).unwrap();
            let started = Instant::now();
            let result = sb.try_call(&program, &[&[]], &[]);
            let elapsed = started.elapsed();
            assert!(result.is_err(), "{check}");
            assert!(elapsed < Duration::from_millis(20) + Duration::from_millis(250), "{check} took {:?}", elapsed);
        }
    }

    #[test]
    fn test_source_too_long() {
        let src = format!("def strategy(o, m):\n    return 'C'\n#{}", "x".repeat(MAX_SOURCE_LEN));
        assert_eq!(two(&src, &[], &[]), D);
        assert_eq!(fault(&src, &[&[]], &[]), StrategyFault::SourceTooLong(MAX_SOURCE_LEN));
    }

    #[test]
    fn test_validate() {
        let sb = sandbox();
        assert!(sb.validate(TIT_FOR_TAT, 2).is_ok());
        assert_eq!(
            sb.validate(TIT_FOR_TAT, 3),
            Err(StrategyFault::WrongArity { expected: 3, found: 2 })
        );
        assert_eq!(
            sb.validate("x = 1\n", 2),
            Err(StrategyFault::MissingEntryPoint)
        );
        assert!(matches!(
            sb.validate("def strategy(o, m):\n    return 'maybe'\n", 2),
            Err(StrategyFault::IllegalReturn(_))
        ));
        assert!(matches!(
            sb.validate("import sys\n", 2),
            Err(StrategyFault::Denylisted(_))
        ));
    }

    #[test]
    fn test_samples_validate() {
        let sb = sandbox();
        for n in 2..=4 {
            for sample in sample_strategies(n) {
                assert_eq!(sb.validate(&sample.code, n), Ok(()), "{} ({n} players)", sample.name);
            }
        }
    }

    #[test]
    fn test_samples_behave() {
        let samples = sample_strategies(3);
        let sb = sandbox();
        let by_name = |name: &str| samples.iter().find(|s| s.name == name).unwrap().code.clone();

        let grudger = by_name("Grudger");
        assert_eq!(sb.decide(&grudger, &[&[C, C], &[C, C]], &[C, C]), C);
        assert_eq!(sb.decide(&grudger, &[&[C, C], &[D, C]], &[C, C]), D);

        let tft = by_name("Tit-for-Tat (All)");
        assert_eq!(sb.decide(&tft, &[&[], &[]], &[]), C);
        assert_eq!(sb.decide(&tft, &[&[C], &[D]], &[C]), D);
        assert_eq!(sb.decide(&tft, &[&[D, C], &[D, C]], &[C, D]), C);

        let majority = by_name("Majority Rules");
        assert_eq!(sb.decide(&majority, &[&[C], &[D]], &[C]), C);
        assert_eq!(sb.decide(&majority, &[&[D], &[D]], &[C]), D);
    }

    #[test]
    fn test_module_level_constants() {
        let src = "\
THRESHOLD = 2

def defections(history):
    return history.count('D')

def strategy(o, m):
    if defections(o) >= THRESHOLD:
        return 'D'
    return 'C'
";
        assert_eq!(two(src, &[D], &[C]), C);
        assert_eq!(two(src, &[D, C, D], &[C, C, C]), D);
    }

    #[test]
    fn test_sandbox_is_shareable_across_threads() {
        let sb = std::sync::Arc::new(sandbox());
        let program = sb.compile(TIT_FOR_TAT).unwrap();
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let sb = sb.clone();
                let program = program.clone();
                std::thread::spawn(move || {
                    let opp = if i % 2 == 0 { vec![C] } else { vec![D] };
                    (i, sb.decide_compiled(&program, &[opp.as_slice()], &[C]))
                })
            })
            .collect();
        for h in handles {
            let (i, m) = h.join().unwrap();
            assert_eq!(m, if i % 2 == 0 { C } else { D });
        }
    }
}
