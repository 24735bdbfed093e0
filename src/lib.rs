#![forbid(unsafe_code)]

//! Spyglass: test doubles and invocation verification for behavior tests.
//!
//! Four layers, bottom up:
//! 1. **Object space**: dynamic objects with per-object override tables,
//!    emulated access levels and a `method_missing` fallback
//! 2. **Interception**: pass-through proxies and replacing stubs that record
//!    every call in an ordered journal, undone exactly by the restorer
//! 3. **Expectations**: count, arguments, call site, ordering, return value,
//!    raised error, thrown signal and yielded values, checked against the
//!    journal after the test (`expect`) or right away (`verify`)
//! 4. **Runner**: per-test lifecycle with hooks that always validates and
//!    restores, plus a JSONL run log
//!
//! # Library usage
//!
//! ```rust,no_run
//! use spyglass::prelude::*;
//!
//! let space = ObjectSpace::new();
//! let class = ClassDef::new("Mailer")
//!     .public("deliver", |_| Ok(Value::from(true)))
//!     .shared();
//! let mailer = space.spawn(&class);
//!
//! let report = Suite::new("mailer")
//!     .test("delivers once", move |ctx| {
//!         ctx.expect(mailer).to_receive(&["deliver"])?.once()?;
//!         ctx.space().send(mailer, "deliver", args!["hi"]).ok();
//!         Ok(())
//!     })
//!     .run_in(&space, &RunLog::disabled())
//!     .unwrap();
//! assert!(report.is_success());
//! ```

pub mod prelude;

pub mod core;
pub mod expect;
pub mod logger;
pub mod mocks;
pub mod object;
pub mod runner;
